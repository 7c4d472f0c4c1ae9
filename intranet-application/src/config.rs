use crate::unit_of_work::{IsolationLevel, TransactionOptions};
use bon::Builder;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// 事务作用域的默认超时（30 分钟）
pub const DEFAULT_TRANSACTION_TIMEOUT: Duration = Duration::from_secs(30 * 60);

/// 作用域超时的上限，更长的超时按此截断（1 天）
pub const MAX_TRANSACTION_TIMEOUT: Duration = Duration::from_secs(24 * 60 * 60);

/// 总线配置
///
/// 用于总线自身打开的“抑制环境事务”作用域（批量发布、查询），
/// 处理器自身的事务要求由 [`HandlerDescriptor`](crate::descriptor::HandlerDescriptor) 声明。
#[derive(Builder, Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BusConfig {
    /// 总线级作用域的超时
    #[builder(default = DEFAULT_TRANSACTION_TIMEOUT)]
    pub transaction_timeout: Duration,
    /// 总线级作用域的隔离级别
    #[builder(default)]
    pub isolation_level: IsolationLevel,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            transaction_timeout: DEFAULT_TRANSACTION_TIMEOUT,
            isolation_level: IsolationLevel::Serializable,
        }
    }
}

impl BusConfig {
    pub fn transaction_options(&self) -> TransactionOptions {
        TransactionOptions {
            isolation_level: self.isolation_level,
            timeout: self.transaction_timeout,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_serializable_for_thirty_minutes() {
        let cfg = BusConfig::default();
        assert_eq!(cfg.transaction_timeout, Duration::from_secs(1800));
        assert_eq!(cfg.isolation_level, IsolationLevel::Serializable);
        assert_eq!(BusConfig::builder().build(), cfg);
    }

    #[test]
    fn partial_config_keeps_remaining_defaults() {
        let cfg: BusConfig =
            serde_json::from_str(r#"{ "transaction_timeout": { "secs": 60, "nanos": 0 } }"#)
                .unwrap();
        assert_eq!(cfg.transaction_timeout, Duration::from_secs(60));
        assert_eq!(cfg.isolation_level, IsolationLevel::Serializable);

        let cfg: BusConfig = serde_json::from_str(r#"{ "isolation_level": "ReadCommitted" }"#)
            .unwrap();
        assert_eq!(cfg.isolation_level, IsolationLevel::ReadCommitted);
        assert_eq!(cfg.transaction_timeout, DEFAULT_TRANSACTION_TIMEOUT);
    }
}
