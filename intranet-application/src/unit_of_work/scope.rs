use super::{IsolationLevel, ScopeOption, Transaction, TransactionManager, TransactionOptions};
use crate::config::MAX_TRANSACTION_TIMEOUT;
use crate::error::AppError;
use std::fmt;
use std::future::Future;
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tokio::time::{self, Instant};
use tracing::{debug, warn};
use uuid::Uuid;

/// 根作用域与加入它的子作用域共享的事务状态
#[derive(Debug)]
struct Ambient {
    id: Uuid,
    isolation_level: IsolationLevel,
    doomed: OnceLock<String>,
}

impl Ambient {
    fn doom(&self, reason: &str) {
        // 只保留第一个作废原因
        let _ = self.doomed.set(reason.to_string());
    }
}

enum Participation {
    Root {
        transaction: Box<dyn Transaction>,
        ambient: Arc<Ambient>,
    },
    Joined {
        ambient: Arc<Ambient>,
    },
    Suppressed {
        isolation_level: IsolationLevel,
    },
    Finished,
}

/// 事务作用域
///
/// 由总线为每次处理器执行打开，以 `&UnitOfWork` 传给处理器；
/// 处理器从中取得事务ID 与隔离级别交给仓储，本身不负责提交或回滚。
pub struct UnitOfWork {
    scope: ScopeOption,
    /// 已截断至 [`MAX_TRANSACTION_TIMEOUT`]
    timeout: Duration,
    deadline: Instant,
    participation: Participation,
}

impl UnitOfWork {
    /// 打开一个没有外层作用域的作用域
    pub async fn begin(
        manager: &dyn TransactionManager,
        scope: ScopeOption,
        options: &TransactionOptions,
    ) -> Result<Self, AppError> {
        Self::open(manager, None, scope, options).await
    }

    /// 在当前作用域内打开子作用域
    pub async fn nested(
        &self,
        manager: &dyn TransactionManager,
        scope: ScopeOption,
        options: &TransactionOptions,
    ) -> Result<Self, AppError> {
        Self::open(manager, Some(self), scope, options).await
    }

    pub(crate) async fn open(
        manager: &dyn TransactionManager,
        parent: Option<&UnitOfWork>,
        scope: ScopeOption,
        options: &TransactionOptions,
    ) -> Result<Self, AppError> {
        let timeout = options.timeout.min(MAX_TRANSACTION_TIMEOUT);
        let mut deadline = Instant::now() + timeout;
        if let Some(parent) = parent {
            deadline = deadline.min(parent.deadline);
        }

        let enclosing = parent.and_then(UnitOfWork::ambient);
        let participation = match (scope, enclosing) {
            (ScopeOption::Suppress, _) => Participation::Suppressed {
                isolation_level: options.isolation_level,
            },
            (ScopeOption::Required, Some(ambient)) => {
                if ambient.isolation_level != options.isolation_level {
                    return Err(AppError::validation(format!(
                        "isolation level {:?} differs from enclosing transaction {} ({:?})",
                        options.isolation_level, ambient.id, ambient.isolation_level
                    )));
                }
                Participation::Joined {
                    ambient: ambient.clone(),
                }
            }
            (ScopeOption::Required, None) | (ScopeOption::RequiresNew, _) => {
                let transaction = manager.begin(options).await?;
                let ambient = Arc::new(Ambient {
                    id: transaction.id(),
                    isolation_level: options.isolation_level,
                    doomed: OnceLock::new(),
                });
                debug!(
                    transaction_id = %ambient.id,
                    isolation_level = ?options.isolation_level,
                    "transaction begun"
                );
                Participation::Root {
                    transaction,
                    ambient,
                }
            }
        };

        Ok(Self {
            scope,
            timeout,
            deadline,
            participation,
        })
    }

    fn ambient(&self) -> Option<&Arc<Ambient>> {
        match &self.participation {
            Participation::Root { ambient, .. } | Participation::Joined { ambient } => Some(ambient),
            Participation::Suppressed { .. } | Participation::Finished => None,
        }
    }

    pub fn scope_option(&self) -> ScopeOption {
        self.scope
    }

    /// 当前参与的事务；抑制作用域返回 `None`
    pub fn transaction_id(&self) -> Option<Uuid> {
        self.ambient().map(|a| a.id)
    }

    /// 参与事务的隔离级别；抑制作用域返回打开时配置的级别
    pub fn isolation_level(&self) -> Option<IsolationLevel> {
        match &self.participation {
            Participation::Suppressed { isolation_level } => Some(*isolation_level),
            _ => self.ambient().map(|a| a.isolation_level),
        }
    }

    /// 是否拥有（并负责提交）事务
    pub fn is_root(&self) -> bool {
        matches!(self.participation, Participation::Root { .. })
    }

    pub fn is_doomed(&self) -> bool {
        self.ambient().is_some_and(|a| a.doomed.get().is_some())
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    /// 在截止时间内等待 `work`
    ///
    /// 外层 `Err` 表示作用域超时（事务中止），内层为 `work` 自身的结果。
    pub async fn within_deadline<T, F>(&self, work: F) -> Result<Result<T, AppError>, AppError>
    where
        F: Future<Output = Result<T, AppError>>,
    {
        match time::timeout_at(self.deadline, work).await {
            Ok(outcome) => Ok(outcome),
            Err(_) => Err(self.timed_out()),
        }
    }

    /// 完成作用域
    ///
    /// 根作用域提交事务；子作用域只表示同意提交；抑制作用域无操作。
    pub async fn complete(mut self) -> Result<(), AppError> {
        let participation = std::mem::replace(&mut self.participation, Participation::Finished);
        let Participation::Root {
            mut transaction,
            ambient,
        } = participation
        else {
            return Ok(());
        };

        if let Some(reason) = ambient.doomed.get() {
            rollback_quietly(transaction.as_mut(), ambient.id).await;
            return Err(AppError::transaction_aborted(reason.clone()));
        }

        if Instant::now() >= self.deadline {
            rollback_quietly(transaction.as_mut(), ambient.id).await;
            return Err(self.timed_out());
        }

        match transaction.commit().await {
            Ok(()) => {
                debug!(transaction_id = %ambient.id, "transaction committed");
                Ok(())
            }
            Err(err) => {
                warn!(transaction_id = %ambient.id, error = %err, "commit failed");
                Err(AppError::TransactionAborted {
                    reason: format!("commit of transaction {} failed", ambient.id),
                    source: Some(Box::new(err)),
                })
            }
        }
    }

    /// 放弃作用域：根作用域回滚，子作用域使外层事务作废
    pub async fn abort(mut self, reason: &str) {
        match std::mem::replace(&mut self.participation, Participation::Finished) {
            Participation::Root {
                mut transaction,
                ambient,
            } => {
                ambient.doom(reason);
                rollback_quietly(transaction.as_mut(), ambient.id).await;
            }
            Participation::Joined { ambient } => {
                debug!(transaction_id = %ambient.id, reason, "enclosing transaction doomed");
                ambient.doom(reason);
            }
            Participation::Suppressed { .. } | Participation::Finished => {}
        }
    }

    fn timed_out(&self) -> AppError {
        AppError::transaction_aborted(format!("transaction timed out after {:?}", self.timeout))
    }
}

async fn rollback_quietly(transaction: &mut dyn Transaction, id: Uuid) {
    match transaction.rollback().await {
        Ok(()) => debug!(transaction_id = %id, "transaction rolled back"),
        Err(err) => warn!(transaction_id = %id, error = %err, "rollback failed"),
    }
}

impl Drop for UnitOfWork {
    fn drop(&mut self) {
        match &self.participation {
            Participation::Root { ambient, .. } => {
                // 底层事务随 Box 一同丢弃，由实现负责回滚
                warn!(transaction_id = %ambient.id, "transaction scope dropped without completion");
                ambient.doom("transaction scope dropped without completion");
            }
            Participation::Joined { ambient } => {
                ambient.doom("nested scope dropped without completion");
            }
            Participation::Suppressed { .. } | Participation::Finished => {}
        }
    }
}

impl fmt::Debug for UnitOfWork {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UnitOfWork")
            .field("scope", &self.scope)
            .field("transaction_id", &self.transaction_id())
            .field("root", &self.is_root())
            .field("doomed", &self.is_doomed())
            .field("deadline", &self.deadline)
            .finish()
    }
}
