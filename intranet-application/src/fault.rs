//! 服务故障（Service Fault）
//!
//! 服务边界上的最后一道转换：任何 [`AppError`] 都被转换为恰好一个 [`FaultException`]，
//! 调用方只能看到 [`FaultDetails`] 中的信息。
//!
//! 故障类型按错误的顶层种类精确匹配，未识别的错误一律归为 `SystemFault`。

use crate::dto::Dto;
use crate::error::{AppError, ErrorKind, error_chain};
use serde::{Deserialize, Serialize};
use std::backtrace::{Backtrace, BacktraceStatus};
use std::error::Error as StdError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FaultType {
    RepositoryFault,
    SystemFault,
    BusinessFault,
}

impl FaultType {
    pub fn of(err: &AppError) -> Self {
        match err.kind() {
            ErrorKind::Repository => Self::RepositoryFault,
            ErrorKind::Business => Self::BusinessFault,
            _ => Self::SystemFault,
        }
    }
}

/// 故障详情（返回给远端调用方的唯一信息）
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct FaultDetails {
    pub error_message: String,
    pub service_name: String,
    pub service_method: String,
    pub stack_trace: String,
    pub fault_type: FaultType,
}

impl Dto for FaultDetails {}

#[derive(Debug, thiserror::Error)]
#[error("{reason}")]
pub struct FaultException {
    pub reason: String,
    pub detail: FaultDetails,
}

impl FaultException {
    pub fn fault_type(&self) -> FaultType {
        self.detail.fault_type
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct FaultExceptionBuilder;

impl FaultExceptionBuilder {
    /// 服务名或方法名为空时返回校验错误
    pub fn build(
        &self,
        err: &AppError,
        service_name: &str,
        service_method: &str,
    ) -> Result<FaultException, AppError> {
        if service_name.trim().is_empty() {
            return Err(AppError::validation("service name must not be empty"));
        }
        if service_method.trim().is_empty() {
            return Err(AppError::validation("service method must not be empty"));
        }

        let reason = err.to_string();
        Ok(FaultException {
            detail: FaultDetails {
                error_message: reason.clone(),
                service_name: service_name.to_string(),
                service_method: service_method.to_string(),
                stack_trace: stack_trace(err),
                fault_type: FaultType::of(err),
            },
            reason,
        })
    }
}

/// 错误链（每个原因一行），启用 `RUST_BACKTRACE` 时附加捕获的调用栈
pub fn stack_trace(err: &(dyn StdError + 'static)) -> String {
    let mut trace = error_chain(err).join("\ncaused by: ");

    let backtrace = Backtrace::capture();
    if backtrace.status() == BacktraceStatus::Captured {
        trace.push_str("\n\n");
        trace.push_str(&backtrace.to_string());
    }
    trace
}

#[cfg(test)]
mod tests {
    use super::*;
    use intranet_domain::DomainError;

    fn build(err: AppError) -> FaultException {
        FaultExceptionBuilder
            .build(&err, "FinansstyringService", "CreateBookkeepingLine")
            .unwrap()
    }

    #[test]
    fn repository_errors_become_repository_faults() {
        let fault = build(DomainError::repository("unable to open connection").into());
        assert_eq!(fault.fault_type(), FaultType::RepositoryFault);
        assert_eq!(fault.detail.error_message, "unable to open connection");
        assert_eq!(fault.detail.service_name, "FinansstyringService");
        assert_eq!(fault.detail.service_method, "CreateBookkeepingLine");
        assert_eq!(fault.to_string(), "unable to open connection");
    }

    #[test]
    fn business_and_system_keep_their_kind() {
        assert_eq!(
            build(DomainError::business("period is closed").into()).fault_type(),
            FaultType::BusinessFault
        );
        assert_eq!(
            build(DomainError::system("out of ids").into()).fault_type(),
            FaultType::SystemFault
        );
    }

    #[test]
    fn unclassified_errors_default_to_system_fault() {
        for err in [
            AppError::command_bus("no command handler registered for PostLine"),
            AppError::transaction_aborted("deadlock"),
            DomainError::not_supported("foreign currency").into(),
        ] {
            assert_eq!(build(err).fault_type(), FaultType::SystemFault);
        }
    }

    #[test]
    fn classification_uses_the_outermost_error_only() {
        let inner: AppError = DomainError::repository("deadlock detected").into();
        let wrapped = AppError::TransactionAborted {
            reason: "commit failed".into(),
            source: Some(Box::new(inner)),
        };
        assert_eq!(build(wrapped).fault_type(), FaultType::SystemFault);
    }

    #[test]
    fn stack_trace_lists_every_cause() {
        let io = std::io::Error::other("socket closed");
        let err: AppError = DomainError::repository("unable to commit")
            .with_source(io)
            .into();

        let trace = build(err).detail.stack_trace;
        assert!(trace.starts_with("unable to commit\ncaused by: socket closed"));
    }

    #[test]
    fn stack_trace_does_not_repeat_causes_quoted_by_the_bus() {
        let inner: AppError = DomainError::repository("deadlock detected").into();
        let aborted = AppError::TransactionAborted {
            reason: "commit failed".into(),
            source: Some(Box::new(inner)),
        };
        let wrapped = AppError::QueryBus {
            message: "error in query bus while querying GetAccount: transaction aborted: commit failed -> deadlock detected".into(),
            source: Some(Box::new(aborted)),
        };

        let trace = build(wrapped).detail.stack_trace;
        assert_eq!(trace.matches("deadlock detected").count(), 1);
        assert!(!trace.contains("caused by:"));
    }

    #[test]
    fn empty_names_are_rejected() {
        let err = AppError::command_bus("boom");
        let res = FaultExceptionBuilder.build(&err, "", "Method");
        assert!(matches!(res, Err(AppError::Validation(_))));
        let res = FaultExceptionBuilder.build(&err, "Service", " ");
        assert!(matches!(res, Err(AppError::Validation(_))));
    }

    #[test]
    fn details_serialise_with_wire_field_names() {
        let fault = build(DomainError::business("period is closed").into());
        let json = serde_json::to_value(&fault.detail).unwrap();
        assert_eq!(json["ErrorMessage"], "period is closed");
        assert_eq!(json["ServiceMethod"], "CreateBookkeepingLine");
        assert_eq!(json["FaultType"], "BusinessFault");
    }
}
