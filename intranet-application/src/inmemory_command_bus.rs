use crate::{
    command::{Command, DynCommand},
    command_bus::CommandBus,
    config::BusConfig,
    context::AppContext,
    error::{AppError, chained_message},
    registry::{AnyCommand, ErasedCommandHandler, HandlerRegistry},
    unit_of_work::{ScopeOption, TransactionManager, UnitOfWork},
};
use async_trait::async_trait;
use bon::Builder;
use std::any::{TypeId, type_name};
use std::sync::Arc;
use tracing::{Instrument, debug, debug_span, warn};

/// 进程内的 CommandBus 实现
/// - 处理器从共享的 [`HandlerRegistry`] 按命令的运行时类型解析
/// - 每个处理器的事务作用域由其描述符决定，通过 [`TransactionManager`] 开启
#[derive(Builder)]
pub struct InMemoryCommandBus {
    registry: Arc<HandlerRegistry>,
    transaction_manager: Arc<dyn TransactionManager>,
    #[builder(default)]
    config: BusConfig,
}

impl InMemoryCommandBus {
    pub fn new(
        registry: Arc<HandlerRegistry>,
        transaction_manager: Arc<dyn TransactionManager>,
    ) -> Self {
        Self::builder()
            .registry(registry)
            .transaction_manager(transaction_manager)
            .build()
    }

    pub fn registry(&self) -> &Arc<HandlerRegistry> {
        &self.registry
    }

    /// 在可选的外层作用域内，依次交给该命令类型的全部处理器
    async fn publish_in(
        &self,
        ctx: &AppContext,
        parent: Option<&UnitOfWork>,
        cmd: &mut AnyCommand,
        name: &'static str,
        type_id: TypeId,
    ) -> Result<(), AppError> {
        let handlers = self.registry.resolve_all_commands(type_id);
        if handlers.is_empty() {
            warn!(command = name, "no command handler registered");
            return Err(AppError::command_bus(format!(
                "no command handler registered for {name}"
            )));
        }

        debug!(command = name, handlers = handlers.len(), "publishing command");
        for handler in &handlers {
            self.execute_handler(ctx, parent, handler.as_ref(), cmd, name)
                .await?;
        }
        Ok(())
    }

    /// 在处理器自己的作用域内执行一次，失败时按描述符决定原样返回或交给 `handle_exception`
    async fn execute_handler(
        &self,
        ctx: &AppContext,
        parent: Option<&UnitOfWork>,
        handler: &dyn ErasedCommandHandler,
        cmd: &mut AnyCommand,
        name: &'static str,
    ) -> Result<(), AppError> {
        let descriptor = handler.descriptor();
        let uow = UnitOfWork::open(
            self.transaction_manager.as_ref(),
            parent,
            descriptor.scope(),
            &descriptor.transaction_options(),
        )
        .await?;

        let outcome = uow.within_deadline(handler.handle(ctx, &uow, &*cmd)).await;
        match outcome {
            Ok(Ok(())) => uow.complete().await,
            Ok(Err(err)) => {
                uow.abort(&err.to_string()).await;
                if descriptor.rethrows(&err) {
                    debug!(
                        command = name,
                        handler = handler.handler_name(),
                        error = %err,
                        "rethrowing handler error"
                    );
                    return Err(err);
                }

                warn!(
                    command = name,
                    handler = handler.handler_name(),
                    error = %err,
                    "command handler failed"
                );
                handler.handle_exception(cmd, err).await
            }
            Err(aborted) => {
                uow.abort(&aborted.to_string()).await;
                Err(aborted)
            }
        }
    }

    fn transaction_manager(&self) -> &dyn TransactionManager {
        self.transaction_manager.as_ref()
    }
}

/// 事务中止包装为命令总线错误，消息携带完整的错误链；其余错误原样返回
fn into_dispatch_error(subject: &str, err: AppError) -> AppError {
    match err {
        aborted @ AppError::TransactionAborted { .. } => AppError::CommandBus {
            message: format!(
                "error in command bus while publishing {subject}: {}",
                chained_message(&aborted)
            ),
            source: Some(Box::new(aborted)),
        },
        other => other,
    }
}

#[async_trait]
impl CommandBus for InMemoryCommandBus {
    async fn publish<C>(&self, ctx: &AppContext, cmd: C) -> Result<(), AppError>
    where
        C: Command,
    {
        self.publish_dyn(ctx, Box::new(cmd)).await
    }

    async fn publish_dyn(
        &self,
        ctx: &AppContext,
        mut cmd: Box<dyn DynCommand>,
    ) -> Result<(), AppError> {
        let name = cmd.command_name();
        let type_id = cmd.command_type_id();
        let span = debug_span!("publish", command = name, correlation_id = ctx.correlation_id());

        self.publish_in(ctx, None, cmd.as_any_mut(), name, type_id)
            .instrument(span)
            .await
            .map_err(|err| into_dispatch_error(name, err))
    }

    async fn publish_batch(
        &self,
        ctx: &AppContext,
        commands: Vec<Box<dyn DynCommand>>,
    ) -> Result<(), AppError> {
        let subject = format!("a batch of {} commands", commands.len());
        let outer = UnitOfWork::open(
            self.transaction_manager(),
            None,
            ScopeOption::Suppress,
            &self.config.transaction_options(),
        )
        .await?;

        for mut cmd in commands {
            let name = cmd.command_name();
            let type_id = cmd.command_type_id();
            let span = debug_span!("publish", command = name, correlation_id = ctx.correlation_id());

            let published = self
                .publish_in(ctx, Some(&outer), cmd.as_any_mut(), name, type_id)
                .instrument(span)
                .await;
            if let Err(err) = published {
                warn!(command = name, error = %err, "batch aborted");
                outer.abort(&err.to_string()).await;
                return Err(into_dispatch_error(&subject, err));
            }
        }

        outer
            .complete()
            .await
            .map_err(|err| into_dispatch_error(&subject, err))
    }

    async fn publish_with_result<C, R>(&self, ctx: &AppContext, mut cmd: C) -> Result<R, AppError>
    where
        C: Command,
        R: Send + 'static,
    {
        let key = (TypeId::of::<C>(), TypeId::of::<R>());
        let Some(primary) = self.registry.resolve_command_with_result(key) else {
            warn!(command = C::NAME, result = type_name::<R>(), "no command handler registered");
            return Err(AppError::command_bus(format!(
                "no command handler registered for {} returning {}",
                C::NAME,
                type_name::<R>()
            )));
        };
        let extras = self.registry.resolve_all_commands(TypeId::of::<C>());
        debug!(
            command = C::NAME,
            handler = primary.handler_name(),
            extras = extras.len(),
            "publishing command with result"
        );

        let descriptor = primary.descriptor();
        let uow = UnitOfWork::open(
            self.transaction_manager(),
            None,
            descriptor.scope(),
            &descriptor.transaction_options(),
        )
        .await
        .map_err(|err| into_dispatch_error(C::NAME, err))?;

        let value = match uow.within_deadline(primary.handle(ctx, &uow, &cmd)).await {
            Ok(Ok(value)) => value,
            Ok(Err(err)) => {
                uow.abort(&err.to_string()).await;
                if descriptor.rethrows(&err) {
                    return Err(err);
                }

                warn!(
                    command = C::NAME,
                    handler = primary.handler_name(),
                    error = %err,
                    "command handler failed"
                );
                primary.handle_exception(&mut cmd, err).await?;
                return Err(AppError::command_bus(format!(
                    "no handler handled the error raised while publishing {}",
                    C::NAME
                )));
            }
            Err(aborted) => {
                uow.abort(&aborted.to_string()).await;
                return Err(into_dispatch_error(C::NAME, aborted));
            }
        };

        // 附加处理器在主处理器成功后执行，嵌套于主处理器的作用域内
        for extra in &extras {
            let executed = self
                .execute_handler(ctx, Some(&uow), extra.as_ref(), &mut cmd, C::NAME)
                .await;
            if let Err(err) = executed {
                uow.abort(&err.to_string()).await;
                return Err(into_dispatch_error(C::NAME, err));
            }
        }

        uow.complete()
            .await
            .map_err(|err| into_dispatch_error(C::NAME, err))?;

        value
            .downcast::<R>()
            .map(|v| *v)
            .map_err(|_| AppError::TypeMismatch {
                expected: type_name::<R>(),
                found: "unknown",
            })
    }
}
