use intranet_domain::BusinessContext;

/// 应用层上下文（Application Context）
///
/// 承载一次服务操作内所有命令/查询共享的横切信息：
/// - 业务语境（`BusinessContext`）：关联追踪、调用方主体与客户端；
/// - 服务操作名（`operation`）：仅用于日志，如 `FinansstyringService/CreateBookkeepingLine`。
///
/// 事务不在此处传递，而是由总线为每个处理器显式打开 [`UnitOfWork`](crate::unit_of_work::UnitOfWork)。
#[derive(Clone, Debug, Default)]
pub struct AppContext {
    pub biz: BusinessContext,
    pub operation: Option<String>,
}

impl AppContext {
    pub fn new(biz: BusinessContext) -> Self {
        Self {
            biz,
            operation: None,
        }
    }

    pub fn with_operation(mut self, service: &str, method: &str) -> Self {
        self.operation = Some(format!("{service}/{method}"));
        self
    }

    pub fn correlation_id(&self) -> Option<&str> {
        self.biz.correlation_id()
    }
}
