use crate::{
    command::{Command, DynCommand},
    context::AppContext,
    error::AppError,
};
use async_trait::async_trait;

/// 命令总线（Command Bus）
///
/// - 根据命令的实际类型路由到其全部处理器，每个处理器在自己的事务作用域内执行；
/// - 处理器失败时交给它自己的 `handle_exception`，描述符声明需原样抛出的错误除外；
/// - 事务中止（提交失败、作用域作废、超时）统一包装为 `AppError::CommandBus`。
///
/// 该 trait 带有泛型方法，通常以具体实现类型注入使用。
#[async_trait]
pub trait CommandBus: Send + Sync {
    /// 发布命令；未登记任何处理器时返回 `AppError::CommandBus`
    async fn publish<C>(&self, ctx: &AppContext, cmd: C) -> Result<(), AppError>
    where
        C: Command;

    /// 发布仅知运行时类型的命令
    async fn publish_dyn(&self, ctx: &AppContext, cmd: Box<dyn DynCommand>) -> Result<(), AppError>;

    /// 在同一个抑制事务的外层作用域内依次发布一批命令；任一失败即终止整批
    async fn publish_batch(
        &self,
        ctx: &AppContext,
        commands: Vec<Box<dyn DynCommand>>,
    ) -> Result<(), AppError>;

    /// 发布带返回值的命令：恰好一个主处理器，外加零或多个无返回值的附加处理器
    async fn publish_with_result<C, R>(&self, ctx: &AppContext, cmd: C) -> Result<R, AppError>
    where
        C: Command,
        R: Send + 'static;
}
