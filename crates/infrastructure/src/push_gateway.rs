//! 进程内推送网关
//!
//! 以连接标识为键，把事件投递到对应的消费端通道。生产部署里这层
//! 通常是 WebSocket 网关；派单核心只依赖 `PushChannel` 与
//! `ConnectionRegistry` 两个接口，换实现不影响状态机。

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::sync::RwLock;
use tracing::debug;

use ridehail_domain::events::PushMessage;
use ridehail_domain::ports::{ConnectionRegistry, PushChannel};
use ridehail_errors::DispatchResult;

#[derive(Default)]
pub struct InProcessPushGateway {
    connections: RwLock<HashMap<String, UnboundedSender<PushMessage>>>,
}

impl InProcessPushGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册连接，返回该连接的事件接收端
    pub async fn register(&self, connection_id: &str) -> UnboundedReceiver<PushMessage> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.connections
            .write()
            .await
            .insert(connection_id.to_string(), tx);
        debug!("连接 {} 已注册", connection_id);
        rx
    }

    pub async fn unregister(&self, connection_id: &str) {
        self.connections.write().await.remove(connection_id);
        debug!("连接 {} 已注销", connection_id);
    }

    pub async fn connection_count(&self) -> usize {
        self.connections.read().await.len()
    }
}

#[async_trait]
impl PushChannel for InProcessPushGateway {
    async fn deliver(&self, connection_id: &str, message: &PushMessage) -> DispatchResult<bool> {
        let sent = {
            let connections = self.connections.read().await;
            match connections.get(connection_id) {
                Some(tx) => tx.send(message.clone()).is_ok(),
                None => return Ok(false),
            }
        };

        if !sent {
            // 接收端已丢弃，连接视为断开
            self.connections.write().await.remove(connection_id);
            debug!("连接 {} 的接收端已关闭，清除注册", connection_id);
            return Ok(false);
        }
        Ok(true)
    }
}

#[async_trait]
impl ConnectionRegistry for InProcessPushGateway {
    async fn is_reachable(&self, connection_id: &str) -> bool {
        self.connections.read().await.contains_key(connection_id)
    }
}
