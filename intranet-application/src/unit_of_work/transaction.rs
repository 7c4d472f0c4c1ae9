use crate::config::DEFAULT_TRANSACTION_TIMEOUT;
use crate::error::AppError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

/// 事务隔离级别
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IsolationLevel {
    #[default]
    Serializable,
    RepeatableRead,
    ReadCommitted,
    ReadUncommitted,
    Snapshot,
    Chaos,
    Unspecified,
}

/// 作用域如何对待外层事务
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ScopeOption {
    /// 有外层事务则加入，否则新建
    #[default]
    Required,
    /// 总是新建独立事务
    RequiresNew,
    /// 不参与任何事务
    Suppress,
}

/// 开启事务时的选项
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TransactionOptions {
    pub isolation_level: IsolationLevel,
    pub timeout: Duration,
}

impl Default for TransactionOptions {
    fn default() -> Self {
        Self {
            isolation_level: IsolationLevel::Serializable,
            timeout: DEFAULT_TRANSACTION_TIMEOUT,
        }
    }
}

/// 一个已开启的底层事务
///
/// 既未提交也未回滚就被丢弃时，实现应自行回滚。
#[async_trait]
pub trait Transaction: Send + Sync {
    fn id(&self) -> Uuid;
    async fn commit(&mut self) -> Result<(), AppError>;
    async fn rollback(&mut self) -> Result<(), AppError>;
}

/// 事务管理器：按选项开启底层事务
#[async_trait]
pub trait TransactionManager: Send + Sync {
    async fn begin(&self, options: &TransactionOptions) -> Result<Box<dyn Transaction>, AppError>;
}
