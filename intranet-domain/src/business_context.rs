use bon::Builder;
use serde::{Deserialize, Serialize};

/// 业务语境：描述一次服务调用是由谁、因何发起
#[derive(Builder, Default, Debug, Clone, Serialize, Deserialize)]
pub struct BusinessContext {
    /// 关联ID（同一次外部请求内的所有命令/查询共享）
    correlation_id: Option<String>,
    /// 因果ID（触发本次调用的上一个请求）
    causation_id: Option<String>,
    /// 调用方主体（已通过身份验证的用户或系统账户）
    actor_id: Option<String>,
    /// 调用方客户端（如 Web 前端、批处理作业）
    client: Option<String>,
}

impl BusinessContext {
    pub fn correlation_id(&self) -> Option<&str> {
        self.correlation_id.as_deref()
    }

    pub fn causation_id(&self) -> Option<&str> {
        self.causation_id.as_deref()
    }

    pub fn actor_id(&self) -> Option<&str> {
        self.actor_id.as_deref()
    }

    pub fn client(&self) -> Option<&str> {
        self.client.as_deref()
    }

    /// 派生一个由当前请求引发的子语境：关联ID 保持不变，因果ID 指向当前关联ID
    pub fn caused_by_current(&self) -> Self {
        Self {
            correlation_id: self.correlation_id.clone(),
            causation_id: self.correlation_id.clone(),
            actor_id: self.actor_id.clone(),
            client: self.client.clone(),
        }
    }
}
