use crate::config::DEFAULT_TRANSACTION_TIMEOUT;
use crate::error::{AppError, ErrorKind};
use crate::unit_of_work::{IsolationLevel, ScopeOption, TransactionOptions};
use bon::Builder;
use std::time::Duration;

/// 处理器描述符
///
/// 在注册时随处理器一同登记，每次执行读取一次：
/// - `scope` / `isolation_level` / `timeout`：处理器所需的事务作用域；
/// - `rethrow`：这些种类的错误不交给 `handle_exception`，由总线原样返回给调用方。
///
/// 默认：`Required`、`Serializable`、30 分钟、无需原样抛出的错误。
#[derive(Builder, Clone, Debug, PartialEq, Eq)]
pub struct HandlerDescriptor {
    #[builder(default)]
    scope: ScopeOption,
    #[builder(default)]
    isolation_level: IsolationLevel,
    #[builder(default = DEFAULT_TRANSACTION_TIMEOUT)]
    timeout: Duration,
    #[builder(default)]
    rethrow: Vec<ErrorKind>,
}

impl Default for HandlerDescriptor {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl HandlerDescriptor {
    pub fn scope(&self) -> ScopeOption {
        self.scope
    }

    pub fn isolation_level(&self) -> IsolationLevel {
        self.isolation_level
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn rethrow(&self) -> &[ErrorKind] {
        &self.rethrow
    }

    /// 该错误是否必须绕过 `handle_exception` 原样返回
    pub fn rethrows(&self, error: &AppError) -> bool {
        self.rethrow.contains(&error.kind())
    }

    pub fn transaction_options(&self) -> TransactionOptions {
        TransactionOptions {
            isolation_level: self.isolation_level,
            timeout: self.timeout,
        }
    }
}
