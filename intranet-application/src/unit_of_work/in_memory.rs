//! 内存版事务管理器
//!
//! 不连接任何数据库，只按顺序记录事务的开启、提交与回滚，
//! 便于测试断言作用域的行为；可通过 `fail_commits(true)` 模拟提交失败。

use super::{IsolationLevel, Transaction, TransactionManager, TransactionOptions};
use crate::error::AppError;
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TransactionEvent {
    Begun {
        id: Uuid,
        isolation_level: IsolationLevel,
    },
    Committed {
        id: Uuid,
    },
    RolledBack {
        id: Uuid,
    },
}

type Journal = Arc<Mutex<Vec<TransactionEvent>>>;

fn record(journal: &Journal, event: TransactionEvent) {
    journal
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .push(event);
}

#[derive(Clone, Default)]
pub struct InMemoryTransactionManager {
    journal: Journal,
    fail_commits: Arc<AtomicBool>,
}

impl InMemoryTransactionManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// 之后的提交一律失败（已开启的事务同样生效）
    pub fn fail_commits(&self, fail: bool) {
        self.fail_commits.store(fail, Ordering::SeqCst);
    }

    pub fn journal(&self) -> Vec<TransactionEvent> {
        self.journal
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn begun(&self) -> usize {
        self.count(|e| matches!(e, TransactionEvent::Begun { .. }))
    }

    pub fn committed(&self) -> usize {
        self.count(|e| matches!(e, TransactionEvent::Committed { .. }))
    }

    pub fn rolled_back(&self) -> usize {
        self.count(|e| matches!(e, TransactionEvent::RolledBack { .. }))
    }

    fn count(&self, pred: impl Fn(&TransactionEvent) -> bool) -> usize {
        self.journal
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|e| pred(e))
            .count()
    }
}

#[async_trait]
impl TransactionManager for InMemoryTransactionManager {
    async fn begin(&self, options: &TransactionOptions) -> Result<Box<dyn Transaction>, AppError> {
        let id = Uuid::new_v4();
        record(
            &self.journal,
            TransactionEvent::Begun {
                id,
                isolation_level: options.isolation_level,
            },
        );

        Ok(Box::new(InMemoryTransaction {
            id,
            journal: self.journal.clone(),
            fail_commits: self.fail_commits.clone(),
            finished: false,
        }))
    }
}

struct InMemoryTransaction {
    id: Uuid,
    journal: Journal,
    fail_commits: Arc<AtomicBool>,
    finished: bool,
}

impl InMemoryTransaction {
    fn ensure_active(&self) -> Result<(), AppError> {
        if self.finished {
            return Err(AppError::Infra(format!(
                "transaction {} already finished",
                self.id
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl Transaction for InMemoryTransaction {
    fn id(&self) -> Uuid {
        self.id
    }

    async fn commit(&mut self) -> Result<(), AppError> {
        self.ensure_active()?;
        if self.fail_commits.load(Ordering::SeqCst) {
            return Err(AppError::Infra(format!(
                "commit of transaction {} rejected",
                self.id
            )));
        }
        self.finished = true;
        record(&self.journal, TransactionEvent::Committed { id: self.id });
        Ok(())
    }

    async fn rollback(&mut self) -> Result<(), AppError> {
        self.ensure_active()?;
        self.finished = true;
        record(&self.journal, TransactionEvent::RolledBack { id: self.id });
        Ok(())
    }
}

impl Drop for InMemoryTransaction {
    fn drop(&mut self) {
        if !self.finished {
            record(&self.journal, TransactionEvent::RolledBack { id: self.id });
        }
    }
}
