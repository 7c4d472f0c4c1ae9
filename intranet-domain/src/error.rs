//! 领域层统一错误定义
//!
//! 对外只区分三类内网错误：
//! - `Repository`：数据访问失败（连接、SQL、映射等）；
//! - `Business`：业务规则被违反，可直接展示给调用方；
//! - `System`：其余所有无法归类的失败。
//!
//! 其余变体是处理器内部常见的通用错误，跨越服务边界时会被归入系统错误。
//!
use std::error::Error as StdError;
use thiserror::Error;

/// 可跨线程传递的底层错误
pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// 统一错误类型
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum DomainError {
    // --- 内网错误（三类） ---
    #[error("{message}")]
    Repository {
        message: String,
        #[source]
        source: Option<BoxError>,
    },
    #[error("{message}")]
    Business {
        message: String,
        #[source]
        source: Option<BoxError>,
    },
    #[error("{message}")]
    System {
        message: String,
        #[source]
        source: Option<BoxError>,
    },

    // --- 通用 ---
    #[error("not supported: {reason}")]
    NotSupported { reason: String },
    #[error("invalid operation: {reason}")]
    InvalidOperation { reason: String },
    #[error("invalid value: {reason}")]
    InvalidValue { reason: String },
    #[error("not found: {reason}")]
    NotFound { reason: String },
}

/// 统一 Result 类型别名
pub type DomainResult<T> = Result<T, DomainError>;

impl DomainError {
    pub fn repository(message: impl Into<String>) -> Self {
        Self::Repository {
            message: message.into(),
            source: None,
        }
    }

    pub fn business(message: impl Into<String>) -> Self {
        Self::Business {
            message: message.into(),
            source: None,
        }
    }

    pub fn system(message: impl Into<String>) -> Self {
        Self::System {
            message: message.into(),
            source: None,
        }
    }

    pub fn not_supported(reason: impl Into<String>) -> Self {
        Self::NotSupported {
            reason: reason.into(),
        }
    }

    pub fn invalid_operation(reason: impl Into<String>) -> Self {
        Self::InvalidOperation {
            reason: reason.into(),
        }
    }

    /// 为三类内网错误附加底层原因；其余变体原样返回
    pub fn with_source(self, cause: impl Into<BoxError>) -> Self {
        let cause = Some(cause.into());
        match self {
            Self::Repository { message, .. } => Self::Repository {
                message,
                source: cause,
            },
            Self::Business { message, .. } => Self::Business {
                message,
                source: cause,
            },
            Self::System { message, .. } => Self::System {
                message,
                source: cause,
            },
            other => other,
        }
    }

    /// 是否属于三类内网错误之一
    pub fn is_intranet(&self) -> bool {
        matches!(
            self,
            Self::Repository { .. } | Self::Business { .. } | Self::System { .. }
        )
    }
}

// 允许在仓储/处理器中直接使用 `?` 将解析错误转换为 DomainError

impl From<std::num::ParseIntError> for DomainError {
    fn from(err: std::num::ParseIntError) -> Self {
        DomainError::InvalidValue {
            reason: err.to_string(),
        }
    }
}

impl From<std::num::ParseFloatError> for DomainError {
    fn from(err: std::num::ParseFloatError) -> Self {
        DomainError::InvalidValue {
            reason: err.to_string(),
        }
    }
}
