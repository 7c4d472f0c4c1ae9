use crate::context::AppContext;
use crate::error::AppError;
use crate::fault::{FaultDetails, FaultException, FaultExceptionBuilder, FaultType, stack_trace};
use std::future::Future;
use tracing::{Instrument, error, info_span};

/// 服务边界
///
/// 包裹一次服务操作：执行总线调用，并把任何失败转换为恰好一个 [`FaultException`]。
#[derive(Clone, Debug)]
pub struct ServiceBoundary {
    service_name: String,
    faults: FaultExceptionBuilder,
}

impl ServiceBoundary {
    pub fn new(service_name: impl Into<String>) -> Result<Self, AppError> {
        let service_name = service_name.into();
        if service_name.trim().is_empty() {
            return Err(AppError::validation("service name must not be empty"));
        }
        Ok(Self {
            service_name,
            faults: FaultExceptionBuilder,
        })
    }

    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    /// 为操作创建带服务/方法名的上下文
    pub fn context(&self, ctx: AppContext, method: &str) -> AppContext {
        ctx.with_operation(&self.service_name, method)
    }

    pub async fn invoke<T, F>(&self, method: &str, work: F) -> Result<T, FaultException>
    where
        F: Future<Output = Result<T, AppError>>,
    {
        let span = info_span!("operation", service = %self.service_name, method);
        match work.instrument(span).await {
            Ok(value) => Ok(value),
            Err(err) => Err(self.fault(&err, method)),
        }
    }

    fn fault(&self, err: &AppError, method: &str) -> FaultException {
        error!(
            service = %self.service_name,
            method,
            kind = ?err.kind(),
            error = %err,
            "service operation failed"
        );

        match self.faults.build(err, &self.service_name, method) {
            Ok(fault) => fault,
            // 方法名为空：仍返回一个故障，描述校验错误，原始错误记入调用栈
            Err(invalid) => {
                let reason = invalid.to_string();
                FaultException {
                    detail: FaultDetails {
                        error_message: reason.clone(),
                        service_name: self.service_name.clone(),
                        service_method: method.to_string(),
                        stack_trace: format!(
                            "{}\nwhile reporting: {}",
                            reason,
                            stack_trace(err)
                        ),
                        fault_type: FaultType::SystemFault,
                    },
                    reason,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use intranet_domain::DomainError;

    #[test]
    fn empty_service_name_is_rejected() {
        assert!(matches!(
            ServiceBoundary::new("  "),
            Err(AppError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn success_passes_through() {
        let boundary = ServiceBoundary::new("FinansstyringService").unwrap();
        let value = boundary
            .invoke("GetAccount", async { Ok::<_, AppError>(42) })
            .await
            .unwrap();
        assert_eq!(value, 42);
    }

    #[tokio::test]
    async fn failures_become_one_fault() {
        let boundary = ServiceBoundary::new("FinansstyringService").unwrap();
        let fault = boundary
            .invoke("DeleteAccount", async {
                Err::<(), _>(DomainError::business("account has postings").into())
            })
            .await
            .unwrap_err();

        assert_eq!(fault.fault_type(), FaultType::BusinessFault);
        assert_eq!(fault.detail.error_message, "account has postings");
        assert_eq!(fault.detail.service_method, "DeleteAccount");
    }

    #[tokio::test]
    async fn empty_method_still_yields_a_fault() {
        let boundary = ServiceBoundary::new("FinansstyringService").unwrap();
        let fault = boundary
            .invoke("", async { Err::<(), _>(AppError::command_bus("boom")) })
            .await
            .unwrap_err();

        assert_eq!(fault.fault_type(), FaultType::SystemFault);
        assert!(fault.detail.error_message.starts_with("validation:"));
        assert!(
            fault.detail.stack_trace.contains("while reporting: boom"),
            "{}",
            fault.detail.stack_trace
        );
    }

    #[test]
    fn context_carries_the_operation() {
        let boundary = ServiceBoundary::new("FinansstyringService").unwrap();
        let ctx = boundary.context(AppContext::default(), "GetAccount");
        assert_eq!(ctx.operation.as_deref(), Some("FinansstyringService/GetAccount"));
    }
}
