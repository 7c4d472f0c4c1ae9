use crate::{
    config::BusConfig,
    context::AppContext,
    error::{AppError, chained_message},
    query::Query,
    query_bus::QueryBus,
    registry::HandlerRegistry,
    unit_of_work::{ScopeOption, TransactionManager, UnitOfWork},
};
use async_trait::async_trait;
use bon::Builder;
use std::any::{TypeId, type_name};
use std::sync::Arc;
use tracing::{Instrument, debug, debug_span, warn};

/// 进程内的 QueryBus 实现
/// - 使用 (QueryTypeId, ResultTypeId) 作为键，同一查询可按不同返回类型各有一个处理器
/// - 以类型擦除方式调度，并在调用端进行结果还原
#[derive(Builder)]
pub struct InMemoryQueryBus {
    registry: Arc<HandlerRegistry>,
    transaction_manager: Arc<dyn TransactionManager>,
    #[builder(default)]
    config: BusConfig,
}

impl InMemoryQueryBus {
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

    async fn dispatch_impl<Q, R>(&self, ctx: &AppContext, q: Q) -> Result<R, AppError>
    where
        Q: Query,
        R: Send + 'static,
    {
        let key = (TypeId::of::<Q>(), TypeId::of::<R>());
        let mut handlers = self.registry.resolve_all_queries(key);
        let handler = match handlers.len() {
            1 => handlers.remove(0),
            0 => {
                warn!(query = Q::NAME, result = type_name::<R>(), "no query handler registered");
                return Err(AppError::query_bus(format!(
                    "no query handler registered for {} returning {}",
                    Q::NAME,
                    type_name::<R>()
                )));
            }
            n => {
                warn!(query = Q::NAME, handlers = n, "ambiguous query handlers");
                return Err(AppError::query_bus(format!(
                    "{n} query handlers registered for {} returning {}; exactly one is required",
                    Q::NAME,
                    type_name::<R>()
                )));
            }
        };
        debug!(query = Q::NAME, handler = handler.handler_name(), "dispatching query");

        let uow = UnitOfWork::open(
            self.transaction_manager.as_ref(),
            None,
            ScopeOption::Suppress,
            &self.config.transaction_options(),
        )
        .await?;

        let out = match uow.within_deadline(handler.handle(ctx, &uow, Box::new(q))).await {
            Ok(Ok(out)) => out,
            Ok(Err(err)) => {
                uow.abort(&err.to_string()).await;
                return Err(err);
            }
            Err(aborted) => {
                uow.abort(&aborted.to_string()).await;
                return Err(into_dispatch_error::<Q>(aborted));
            }
        };
        uow.complete().await.map_err(into_dispatch_error::<Q>)?;

        match out.downcast::<R>() {
            Ok(value) => Ok(*value),
            Err(_) => Err(AppError::TypeMismatch {
                expected: type_name::<R>(),
                found: "unknown",
            }),
        }
    }
}

fn into_dispatch_error<Q: Query>(err: AppError) -> AppError {
    match err {
        aborted @ AppError::TransactionAborted { .. } => AppError::QueryBus {
            message: format!(
                "error in query bus while querying {}: {}",
                Q::NAME,
                chained_message(&aborted)
            ),
            source: Some(Box::new(aborted)),
        },
        other => other,
    }
}

#[async_trait]
impl QueryBus for InMemoryQueryBus {
    async fn query<Q, R>(&self, ctx: &AppContext, q: Q) -> Result<R, AppError>
    where
        Q: Query,
        R: Send + 'static,
    {
        let span = debug_span!("query", query = Q::NAME, correlation_id = ctx.correlation_id());
        self.dispatch_impl::<Q, R>(ctx, q).instrument(span).await
    }
}
