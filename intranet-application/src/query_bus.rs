use crate::{context::AppContext, error::AppError, query::Query};
use async_trait::async_trait;

/// 查询总线（Query Bus）
///
/// - 每个 `(查询, 返回类型)` 恰好对应一个处理器，零个或多个均返回 `AppError::QueryBus`；
/// - 处理器在抑制环境事务的作用域中执行（可串行化隔离级别、30 分钟超时）；
/// - 处理器自身的错误原样返回，事务中止包装为 `AppError::QueryBus`。
#[async_trait]
pub trait QueryBus: Send + Sync {
    async fn query<Q, R>(&self, ctx: &AppContext, q: Q) -> Result<R, AppError>
    where
        Q: Query,
        R: Send + 'static;
}
