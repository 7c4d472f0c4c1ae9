//! 工作单元（Unit of Work）
//!
//! 以显式作用域对象取代线程隐式的“环境事务”：
//! - `TransactionManager` / `Transaction`：底层事务资源（如 MySQL 连接）的最小协议；
//! - `UnitOfWork`：一个事务作用域，按 `ScopeOption` 加入外层事务、新建事务或抑制事务，
//!   并携带隔离级别与截止时间；
//! - `InMemoryTransactionManager`：记录开启/提交/回滚日志的内存实现，用于测试与示例。
//!
//! 作用域嵌套语义：
//! - 子作用域 `Required` 加入外层事务，只“投票”不提交；未完成即结束会使整个外层事务作废；
//! - 根作用域 `complete()` 时若事务已作废或已超时，则回滚并返回 `TransactionAborted`。
//!
mod in_memory;
mod scope;
mod transaction;

pub use in_memory::{InMemoryTransactionManager, TransactionEvent};
pub use scope::UnitOfWork;
pub use transaction::{IsolationLevel, ScopeOption, Transaction, TransactionManager, TransactionOptions};
