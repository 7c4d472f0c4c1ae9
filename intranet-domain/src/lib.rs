//! 内网业务系统领域层基础库（intranet-domain）
//!
//! 只定义应用层与服务边界共同依赖的最小领域概念：
//! - 领域错误（`error`）：仓储错误、业务错误、系统错误三类内网错误，以及通用领域错误；
//! - 业务语境（`business_context`）：一次调用的关联追踪与执行者信息。
//!
//! 本 crate 不涉及任何数据访问或传输实现，便于在 MySQL 仓储、服务宿主等
//! 不同基础设施之上复用。
//!
pub mod business_context;
pub mod error;

pub use business_context::BusinessContext;
pub use error::{DomainError, DomainResult};
