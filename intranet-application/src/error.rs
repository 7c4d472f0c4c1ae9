use intranet_domain::error::DomainError;
use std::error::Error as StdError;

#[non_exhaustive]
#[derive(thiserror::Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error("validation: {0}")]
    Validation(String),

    #[error("{message}")]
    CommandBus {
        message: String,
        #[source]
        source: Option<Box<AppError>>,
    },

    #[error("{message}")]
    QueryBus {
        message: String,
        #[source]
        source: Option<Box<AppError>>,
    },

    #[error("transaction aborted: {reason}")]
    TransactionAborted {
        reason: String,
        #[source]
        source: Option<Box<AppError>>,
    },

    #[error("infra: {0}")]
    Infra(String),

    #[error("handler already registered: command={command}, result={result}")]
    AlreadyRegisteredCommand {
        command: &'static str,
        result: &'static str,
    },

    #[error("handler already registered: query={query}, result={result}")]
    AlreadyRegisteredQuery {
        query: &'static str,
        result: &'static str,
    },

    #[error("type mismatch: expected={expected}, found={found}")]
    TypeMismatch {
        expected: &'static str,
        found: &'static str,
    },
}

/// 错误种类：处理器描述符中的“需原样抛出”列表按种类精确匹配
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Repository,
    Business,
    System,
    NotSupported,
    InvalidOperation,
    InvalidValue,
    NotFound,
    Validation,
    CommandBus,
    QueryBus,
    TransactionAborted,
    Infra,
    AlreadyRegistered,
    TypeMismatch,
    /// 未来新增的领域错误变体
    Other,
}

impl AppError {
    pub fn validation(reason: impl Into<String>) -> Self {
        Self::Validation(reason.into())
    }

    pub fn command_bus(message: impl Into<String>) -> Self {
        Self::CommandBus {
            message: message.into(),
            source: None,
        }
    }

    pub fn query_bus(message: impl Into<String>) -> Self {
        Self::QueryBus {
            message: message.into(),
            source: None,
        }
    }

    pub fn transaction_aborted(reason: impl Into<String>) -> Self {
        Self::TransactionAborted {
            reason: reason.into(),
            source: None,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Domain(err) => match err {
                DomainError::Repository { .. } => ErrorKind::Repository,
                DomainError::Business { .. } => ErrorKind::Business,
                DomainError::System { .. } => ErrorKind::System,
                DomainError::NotSupported { .. } => ErrorKind::NotSupported,
                DomainError::InvalidOperation { .. } => ErrorKind::InvalidOperation,
                DomainError::InvalidValue { .. } => ErrorKind::InvalidValue,
                DomainError::NotFound { .. } => ErrorKind::NotFound,
                _ => ErrorKind::Other,
            },
            Self::Validation(_) => ErrorKind::Validation,
            Self::CommandBus { .. } => ErrorKind::CommandBus,
            Self::QueryBus { .. } => ErrorKind::QueryBus,
            Self::TransactionAborted { .. } => ErrorKind::TransactionAborted,
            Self::Infra(_) => ErrorKind::Infra,
            Self::AlreadyRegisteredCommand { .. } | Self::AlreadyRegisteredQuery { .. } => {
                ErrorKind::AlreadyRegistered
            }
            Self::TypeMismatch { .. } => ErrorKind::TypeMismatch,
        }
    }

    /// 是否属于三类内网错误（仓储/业务/系统）之一
    pub fn is_intranet(&self) -> bool {
        matches!(self, Self::Domain(err) if err.is_intranet())
    }
}

/// 错误及其 `source()` 链的各层消息
///
/// 已被上一层消息包含的原因（总线把整条链写进了自己的消息）不再重复列出。
pub fn error_chain(err: &(dyn StdError + 'static)) -> Vec<String> {
    let mut chain = vec![err.to_string()];
    let mut cause = err.source();
    while let Some(inner) = cause {
        let message = inner.to_string();
        if !chain.last().is_some_and(|outer| outer.contains(&message)) {
            chain.push(message);
        }
        cause = inner.source();
    }
    chain
}

/// 将错误及其全部 `source()` 链拼接为 `a -> b -> c`
pub fn chained_message(err: &(dyn StdError + 'static)) -> String {
    error_chain(err).join(" -> ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_follows_domain_variant() {
        let err: AppError = DomainError::business("period is closed").into();
        assert_eq!(err.kind(), ErrorKind::Business);
        assert!(err.is_intranet());

        let err: AppError = DomainError::not_supported("foreign currency").into();
        assert_eq!(err.kind(), ErrorKind::NotSupported);
        assert!(!err.is_intranet());

        assert_eq!(AppError::validation("x").kind(), ErrorKind::Validation);
        assert!(!AppError::command_bus("x").is_intranet());
    }

    #[test]
    fn domain_errors_are_transparent() {
        let err: AppError = DomainError::repository("unable to open connection").into();
        assert_eq!(err.to_string(), "unable to open connection");
    }

    #[test]
    fn chained_message_walks_every_source() {
        let io = std::io::Error::other("socket closed");
        let repo: AppError = DomainError::repository("unable to commit").with_source(io).into();
        let aborted = AppError::TransactionAborted {
            reason: "commit failed".into(),
            source: Some(Box::new(repo)),
        };

        assert_eq!(
            chained_message(&aborted),
            "transaction aborted: commit failed -> unable to commit -> socket closed"
        );
    }

    #[test]
    fn causes_already_in_the_message_are_not_repeated() {
        let io = std::io::Error::other("socket closed");
        let repo: AppError = DomainError::repository("unable to commit").with_source(io).into();
        let aborted = AppError::TransactionAborted {
            reason: "commit failed".into(),
            source: Some(Box::new(repo)),
        };
        let wrapped = AppError::CommandBus {
            message: format!(
                "error in command bus while publishing PostLine: {}",
                chained_message(&aborted)
            ),
            source: Some(Box::new(aborted)),
        };

        assert_eq!(chained_message(&wrapped), wrapped.to_string());
        assert_eq!(error_chain(&wrapped).len(), 1);
    }

    #[test]
    fn chained_message_without_source_is_plain_message() {
        let err = AppError::query_bus("no query handler registered");
        assert_eq!(chained_message(&err), "no query handler registered");
    }
}
