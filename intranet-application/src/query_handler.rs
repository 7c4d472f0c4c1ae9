use crate::{context::AppContext, error::AppError, query::Query, unit_of_work::UnitOfWork};
use async_trait::async_trait;
use std::any::type_name;

/// 查询处理器：在抑制事务的作用域中执行，只读
#[async_trait]
pub trait QueryHandler<Q, R>: Send + Sync
where
    Q: Query,
    R: Send + 'static,
{
    async fn handle(&self, ctx: &AppContext, uow: &UnitOfWork, q: Q) -> Result<R, AppError>;

    fn handler_name(&self) -> &'static str {
        type_name::<Self>()
    }
}
