//! 处理器注册表（Handler Registry）
//!
//! 以类型标识为键登记处理器，供命令总线与查询总线共享：
//! - 命令：`TypeId(C)` → 有序处理器列表（扇出，按注册顺序执行）；
//! - 带返回值的命令：`(TypeId(C), TypeId(R))` → 唯一主处理器；
//! - 查询：`(TypeId(Q), TypeId(R))` → 唯一处理器。
//!
//! 处理器在注册时被擦除为对象安全的适配器，调度时按运行时类型标识查找，
//! 调用端再还原具体类型。
//!
use crate::{
    command::Command,
    command_handler::{CommandHandler, CommandHandlerWithResult},
    context::AppContext,
    descriptor::HandlerDescriptor,
    error::AppError,
    query::Query,
    query_handler::QueryHandler,
    unit_of_work::UnitOfWork,
};
use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::any::{Any, TypeId, type_name};
use std::marker::PhantomData;
use std::sync::Arc;

pub(crate) type AnyCommand = dyn Any + Send + Sync;
pub(crate) type BoxAnySend = Box<dyn Any + Send>;

#[async_trait]
pub(crate) trait ErasedCommandHandler: Send + Sync {
    fn handler_name(&self) -> &'static str;
    fn descriptor(&self) -> HandlerDescriptor;
    async fn handle(
        &self,
        ctx: &AppContext,
        uow: &UnitOfWork,
        cmd: &AnyCommand,
    ) -> Result<(), AppError>;
    async fn handle_exception(&self, cmd: &mut AnyCommand, error: AppError)
    -> Result<(), AppError>;
}

#[async_trait]
pub(crate) trait ErasedResultHandler: Send + Sync {
    fn handler_name(&self) -> &'static str;
    fn descriptor(&self) -> HandlerDescriptor;
    async fn handle(
        &self,
        ctx: &AppContext,
        uow: &UnitOfWork,
        cmd: &AnyCommand,
    ) -> Result<BoxAnySend, AppError>;
    async fn handle_exception(&self, cmd: &mut AnyCommand, error: AppError)
    -> Result<(), AppError>;
}

#[async_trait]
pub(crate) trait ErasedQueryHandler: Send + Sync {
    fn handler_name(&self) -> &'static str;
    async fn handle(
        &self,
        ctx: &AppContext,
        uow: &UnitOfWork,
        q: BoxAnySend,
    ) -> Result<BoxAnySend, AppError>;
}

// 正常情况下这里的 downcast 永远不会失败（键与适配器同一泛型）
fn downcast_ref<C: Command>(cmd: &AnyCommand) -> Result<&C, AppError> {
    cmd.downcast_ref::<C>().ok_or(AppError::TypeMismatch {
        expected: C::NAME,
        found: "unknown",
    })
}

fn downcast_mut<C: Command>(cmd: &mut AnyCommand) -> Result<&mut C, AppError> {
    cmd.downcast_mut::<C>().ok_or(AppError::TypeMismatch {
        expected: C::NAME,
        found: "unknown",
    })
}

struct CommandAdapter<C, H> {
    handler: Arc<H>,
    _command: PhantomData<fn() -> C>,
}

#[async_trait]
impl<C, H> ErasedCommandHandler for CommandAdapter<C, H>
where
    C: Command,
    H: CommandHandler<C> + 'static,
{
    fn handler_name(&self) -> &'static str {
        self.handler.handler_name()
    }

    fn descriptor(&self) -> HandlerDescriptor {
        self.handler.descriptor()
    }

    async fn handle(
        &self,
        ctx: &AppContext,
        uow: &UnitOfWork,
        cmd: &AnyCommand,
    ) -> Result<(), AppError> {
        let cmd = downcast_ref::<C>(cmd)?;
        self.handler.handle(ctx, uow, cmd).await
    }

    async fn handle_exception(
        &self,
        cmd: &mut AnyCommand,
        error: AppError,
    ) -> Result<(), AppError> {
        let cmd = downcast_mut::<C>(cmd)?;
        self.handler.handle_exception(cmd, error).await
    }
}

struct ResultAdapter<C, R, H> {
    handler: Arc<H>,
    _command: PhantomData<fn() -> (C, R)>,
}

#[async_trait]
impl<C, R, H> ErasedResultHandler for ResultAdapter<C, R, H>
where
    C: Command,
    R: Send + 'static,
    H: CommandHandlerWithResult<C, R> + 'static,
{
    fn handler_name(&self) -> &'static str {
        self.handler.handler_name()
    }

    fn descriptor(&self) -> HandlerDescriptor {
        self.handler.descriptor()
    }

    async fn handle(
        &self,
        ctx: &AppContext,
        uow: &UnitOfWork,
        cmd: &AnyCommand,
    ) -> Result<BoxAnySend, AppError> {
        let cmd = downcast_ref::<C>(cmd)?;
        let value = self.handler.handle(ctx, uow, cmd).await?;
        Ok(Box::new(value) as BoxAnySend)
    }

    async fn handle_exception(
        &self,
        cmd: &mut AnyCommand,
        error: AppError,
    ) -> Result<(), AppError> {
        let cmd = downcast_mut::<C>(cmd)?;
        self.handler.handle_exception(cmd, error).await
    }
}

struct QueryAdapter<Q, R, H> {
    handler: Arc<H>,
    _query: PhantomData<fn() -> (Q, R)>,
}

#[async_trait]
impl<Q, R, H> ErasedQueryHandler for QueryAdapter<Q, R, H>
where
    Q: Query,
    R: Send + 'static,
    H: QueryHandler<Q, R> + 'static,
{
    fn handler_name(&self) -> &'static str {
        self.handler.handler_name()
    }

    async fn handle(
        &self,
        ctx: &AppContext,
        uow: &UnitOfWork,
        q: BoxAnySend,
    ) -> Result<BoxAnySend, AppError> {
        match q.downcast::<Q>() {
            Ok(q) => {
                let value = self.handler.handle(ctx, uow, *q).await?;
                Ok(Box::new(value) as BoxAnySend)
            }
            Err(_) => Err(AppError::TypeMismatch {
                expected: Q::NAME,
                found: "unknown",
            }),
        }
    }
}

/// 一个请求类型下登记的处理器
pub(crate) struct Registered<T: ?Sized> {
    pub(crate) request: &'static str,
    pub(crate) handlers: Vec<Arc<T>>,
}

impl<T: ?Sized> Registered<T> {
    fn new(request: &'static str) -> Self {
        Self {
            request,
            handlers: Vec::new(),
        }
    }
}

type ResultKey = (TypeId, TypeId);

/// 基于 DashMap 的处理器注册表，可在多个调用方之间并发共享
#[derive(Default)]
pub struct HandlerRegistry {
    pub(crate) commands: DashMap<TypeId, Registered<dyn ErasedCommandHandler>>,
    pub(crate) commands_with_result: DashMap<ResultKey, Registered<dyn ErasedResultHandler>>,
    pub(crate) queries: DashMap<ResultKey, Registered<dyn ErasedQueryHandler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册无返回值的命令处理器（可多次注册，按顺序扇出）
    pub fn register_command<C, H>(&self, handler: Arc<H>)
    where
        C: Command,
        H: CommandHandler<C> + 'static,
    {
        let erased: Arc<dyn ErasedCommandHandler> = Arc::new(CommandAdapter::<C, H> {
            handler,
            _command: PhantomData,
        });

        self.commands
            .entry(TypeId::of::<C>())
            .or_insert_with(|| Registered::new(C::NAME))
            .handlers
            .push(erased);
    }

    /// 注册带返回值的命令处理器（每个 `(C, R)` 仅一个）
    pub fn register_command_with_result<C, R, H>(&self, handler: Arc<H>) -> Result<(), AppError>
    where
        C: Command,
        R: Send + 'static,
        H: CommandHandlerWithResult<C, R> + 'static,
    {
        let erased: Arc<dyn ErasedResultHandler> = Arc::new(ResultAdapter::<C, R, H> {
            handler,
            _command: PhantomData,
        });

        match self
            .commands_with_result
            .entry((TypeId::of::<C>(), TypeId::of::<R>()))
        {
            Entry::Occupied(_) => Err(AppError::AlreadyRegisteredCommand {
                command: C::NAME,
                result: type_name::<R>(),
            }),
            Entry::Vacant(slot) => {
                let mut registered = Registered::new(C::NAME);
                registered.handlers.push(erased);
                slot.insert(registered);
                Ok(())
            }
        }
    }

    /// 注册查询处理器（每个 `(Q, R)` 仅一个）
    pub fn register_query<Q, R, H>(&self, handler: Arc<H>) -> Result<(), AppError>
    where
        Q: Query,
        R: Send + 'static,
        H: QueryHandler<Q, R> + 'static,
    {
        let erased: Arc<dyn ErasedQueryHandler> = Arc::new(QueryAdapter::<Q, R, H> {
            handler,
            _query: PhantomData,
        });

        match self.queries.entry((TypeId::of::<Q>(), TypeId::of::<R>())) {
            Entry::Occupied(_) => Err(AppError::AlreadyRegisteredQuery {
                query: Q::NAME,
                result: type_name::<R>(),
            }),
            Entry::Vacant(slot) => {
                let mut registered = Registered::new(Q::NAME);
                registered.handlers.push(erased);
                slot.insert(registered);
                Ok(())
            }
        }
    }

    // 解析时克隆出处理器列表，避免在 await 期间持有 DashMap 的分片锁

    pub(crate) fn resolve_all_commands(&self, command: TypeId) -> Vec<Arc<dyn ErasedCommandHandler>> {
        self.commands
            .get(&command)
            .map(|r| r.handlers.clone())
            .unwrap_or_default()
    }

    pub(crate) fn resolve_all_commands_with_result(
        &self,
        key: ResultKey,
    ) -> Vec<Arc<dyn ErasedResultHandler>> {
        self.commands_with_result
            .get(&key)
            .map(|r| r.handlers.clone())
            .unwrap_or_default()
    }

    /// 仅当恰好登记了一个主处理器时返回
    pub(crate) fn resolve_command_with_result(
        &self,
        key: ResultKey,
    ) -> Option<Arc<dyn ErasedResultHandler>> {
        single(self.resolve_all_commands_with_result(key))
    }

    pub(crate) fn resolve_all_queries(&self, key: ResultKey) -> Vec<Arc<dyn ErasedQueryHandler>> {
        self.queries
            .get(&key)
            .map(|r| r.handlers.clone())
            .unwrap_or_default()
    }

    /// 已登记处理器的命令名（含带返回值的命令，去重）
    pub fn registered_commands(&self) -> Vec<&'static str> {
        let mut names: Vec<&'static str> = self
            .commands
            .iter()
            .map(|e| e.value().request)
            .chain(self.commands_with_result.iter().map(|e| e.value().request))
            .collect();
        names.sort_unstable();
        names.dedup();
        names
    }

    /// 已登记处理器的查询名
    pub fn registered_queries(&self) -> Vec<&'static str> {
        let mut names: Vec<&'static str> = self.queries.iter().map(|e| e.value().request).collect();
        names.sort_unstable();
        names.dedup();
        names
    }

    /// 某命令类型的无返回值处理器数量
    pub fn command_handler_count<C: Command>(&self) -> usize {
        self.commands
            .get(&TypeId::of::<C>())
            .map_or(0, |r| r.handlers.len())
    }
}

fn single<T: ?Sized>(mut handlers: Vec<Arc<T>>) -> Option<Arc<T>> {
    if handlers.len() == 1 { handlers.pop() } else { None }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::unit_of_work::{InMemoryTransactionManager, ScopeOption, TransactionOptions};

    struct Rename;
    impl Command for Rename {
        const NAME: &'static str = "Rename";
    }

    struct Lookup;
    impl Query for Lookup {
        const NAME: &'static str = "Lookup";
    }

    struct Named(&'static str);

    #[async_trait]
    impl CommandHandler<Rename> for Named {
        async fn handle(&self, _: &AppContext, _: &UnitOfWork, _: &Rename) -> Result<(), AppError> {
            Ok(())
        }

        fn handler_name(&self) -> &'static str {
            self.0
        }
    }

    #[async_trait]
    impl CommandHandlerWithResult<Rename, u32> for Named {
        async fn handle(&self, _: &AppContext, _: &UnitOfWork, _: &Rename) -> Result<u32, AppError> {
            Ok(7)
        }
    }

    #[async_trait]
    impl QueryHandler<Lookup, String> for Named {
        async fn handle(&self, _: &AppContext, _: &UnitOfWork, _: Lookup) -> Result<String, AppError> {
            Ok(self.0.to_string())
        }
    }

    #[test]
    fn command_handlers_fan_out_in_registration_order() {
        let registry = HandlerRegistry::new();
        registry.register_command::<Rename, _>(Arc::new(Named("first")));
        registry.register_command::<Rename, _>(Arc::new(Named("second")));

        let names: Vec<_> = registry
            .resolve_all_commands(TypeId::of::<Rename>())
            .iter()
            .map(|h| h.handler_name())
            .collect();
        assert_eq!(names, ["first", "second"]);
        assert_eq!(registry.command_handler_count::<Rename>(), 2);
        assert!(registry.resolve_all_commands(TypeId::of::<Lookup>()).is_empty());
    }

    #[test]
    fn duplicate_result_registrations_are_rejected() {
        let registry = HandlerRegistry::new();
        registry
            .register_command_with_result::<Rename, u32, _>(Arc::new(Named("a")))
            .unwrap();
        let err = registry
            .register_command_with_result::<Rename, u32, _>(Arc::new(Named("b")))
            .unwrap_err();
        assert!(matches!(
            err,
            AppError::AlreadyRegisteredCommand {
                command: "Rename",
                result: "u32"
            }
        ));

        registry
            .register_query::<Lookup, String, _>(Arc::new(Named("a")))
            .unwrap();
        let err = registry
            .register_query::<Lookup, String, _>(Arc::new(Named("b")))
            .unwrap_err();
        assert!(matches!(err, AppError::AlreadyRegisteredQuery { query: "Lookup", .. }));
    }

    #[test]
    fn registered_names_are_listed_once() {
        let registry = HandlerRegistry::new();
        registry.register_command::<Rename, _>(Arc::new(Named("a")));
        registry
            .register_command_with_result::<Rename, u32, _>(Arc::new(Named("b")))
            .unwrap();
        registry
            .register_query::<Lookup, String, _>(Arc::new(Named("c")))
            .unwrap();

        assert_eq!(registry.registered_commands(), ["Rename"]);
        assert_eq!(registry.registered_queries(), ["Lookup"]);
    }

    #[test]
    fn resolve_requires_exactly_one() {
        let registry = HandlerRegistry::new();
        let key = (TypeId::of::<Rename>(), TypeId::of::<u32>());
        assert!(registry.resolve_command_with_result(key).is_none());

        registry
            .register_command_with_result::<Rename, u32, _>(Arc::new(Named("a")))
            .unwrap();
        assert!(registry.resolve_command_with_result(key).is_some());

        // 绕过注册校验再塞入一个，模拟容器配置错误
        let extra: Arc<dyn ErasedResultHandler> = Arc::new(ResultAdapter::<Rename, u32, Named> {
            handler: Arc::new(Named("b")),
            _command: PhantomData,
        });
        registry
            .commands_with_result
            .get_mut(&key)
            .unwrap()
            .handlers
            .push(extra);
        assert!(registry.resolve_command_with_result(key).is_none());
    }

    #[tokio::test]
    async fn erased_adapters_restore_concrete_types() {
        let registry = HandlerRegistry::new();
        registry
            .register_query::<Lookup, String, _>(Arc::new(Named("ledger")))
            .unwrap();
        registry
            .register_command_with_result::<Rename, u32, _>(Arc::new(Named("r")))
            .unwrap();

        let tm = InMemoryTransactionManager::new();
        let uow = UnitOfWork::begin(&tm, ScopeOption::Suppress, &TransactionOptions::default())
            .await
            .unwrap();
        let ctx = AppContext::default();

        let handler = registry
            .resolve_all_queries((TypeId::of::<Lookup>(), TypeId::of::<String>()))
            .pop()
            .unwrap();
        let out = handler.handle(&ctx, &uow, Box::new(Lookup)).await.unwrap();
        assert_eq!(*out.downcast::<String>().unwrap(), "ledger");

        let wrong = handler.handle(&ctx, &uow, Box::new(Rename)).await.unwrap_err();
        assert!(matches!(wrong, AppError::TypeMismatch { expected: "Lookup", .. }));

        let primary = registry
            .resolve_command_with_result((TypeId::of::<Rename>(), TypeId::of::<u32>()))
            .unwrap();
        let out = primary.handle(&ctx, &uow, &Rename).await.unwrap();
        assert_eq!(*out.downcast::<u32>().unwrap(), 7);

        uow.complete().await.unwrap();
    }
}
