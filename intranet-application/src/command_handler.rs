use crate::{
    command::Command,
    context::AppContext,
    descriptor::HandlerDescriptor,
    error::AppError,
    error_builder::{ErrorBuilder, HandlerOrigin, IntranetErrorBuilder},
    unit_of_work::UnitOfWork,
};
use async_trait::async_trait;
use std::any::type_name;

/// 无返回值的命令处理器
///
/// 同一命令可注册多个，总线按注册顺序逐一执行，每个处理器拥有独立的事务作用域。
#[async_trait]
pub trait CommandHandler<C>: Send + Sync
where
    C: Command,
{
    async fn handle(&self, ctx: &AppContext, uow: &UnitOfWork, cmd: &C) -> Result<(), AppError>;

    /// 处理 `handle` 返回的错误（描述符中声明需原样抛出的种类除外）
    ///
    /// 返回 `Ok(())` 表示错误已被吸收，总线继续执行；返回 `Err` 则传播给调用方。
    /// 默认将错误重分类为内网错误后返回。
    async fn handle_exception(&self, cmd: &mut C, error: AppError) -> Result<(), AppError> {
        let _ = cmd;
        Err(IntranetErrorBuilder.build(error, &HandlerOrigin::command::<C>()))
    }

    fn descriptor(&self) -> HandlerDescriptor {
        HandlerDescriptor::default()
    }

    fn handler_name(&self) -> &'static str {
        type_name::<Self>()
    }
}

/// 带返回值的命令处理器
///
/// 每个 `(命令, 返回类型)` 只能注册一个；同一命令的无返回值处理器作为附加处理器，
/// 在其成功后于同一外层作用域内执行。
#[async_trait]
pub trait CommandHandlerWithResult<C, R>: Send + Sync
where
    C: Command,
    R: Send + 'static,
{
    async fn handle(&self, ctx: &AppContext, uow: &UnitOfWork, cmd: &C) -> Result<R, AppError>;

    /// 处理 `handle` 返回的错误
    ///
    /// 此处无法产出返回值：返回 `Ok(())` 时总线报告“错误未被处理”。
    async fn handle_exception(&self, cmd: &mut C, error: AppError) -> Result<(), AppError> {
        let _ = cmd;
        Err(IntranetErrorBuilder.build(error, &HandlerOrigin::command_with_result::<C, R>()))
    }

    fn descriptor(&self) -> HandlerDescriptor {
        HandlerDescriptor::default()
    }

    fn handler_name(&self) -> &'static str {
        type_name::<Self>()
    }
}
