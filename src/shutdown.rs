use tokio::sync::broadcast;
use tracing::info;

/// 进程级关闭信号的广播端
pub struct ShutdownManager {
    tx: broadcast::Sender<()>,
}

impl ShutdownManager {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(4);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.tx.subscribe()
    }

    /// 通知所有订阅者退出；没有订阅者时发送失败，忽略即可
    pub fn shutdown(&self) {
        info!("向 {} 个订阅者广播关闭信号", self.tx.receiver_count());
        let _ = self.tx.send(());
    }
}

impl Default for ShutdownManager {
    fn default() -> Self {
        Self::new()
    }
}
