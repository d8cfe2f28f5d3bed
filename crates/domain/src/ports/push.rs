use async_trait::async_trait;

use crate::events::PushMessage;
use ridehail_errors::DispatchResult;

/// 推送通道抽象接口
///
/// 投递是 fire-and-forget：除"是否送出"外没有任何回执。
/// 目标连接不存在时返回 `Ok(false)`，这是稳态事件而不是错误。
#[async_trait]
pub trait PushChannel: Send + Sync {
    async fn deliver(&self, connection_id: &str, message: &PushMessage) -> DispatchResult<bool>;
}

/// 活跃连接注册表
///
/// 以注入能力的形式提供可达性查询，派单器不依赖任何进程级单例。
#[async_trait]
pub trait ConnectionRegistry: Send + Sync {
    async fn is_reachable(&self, connection_id: &str) -> bool;
}
