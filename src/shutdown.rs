use tokio::sync::broadcast;

/// 优雅关闭管理器
///
/// 持有一个广播通道，各组件订阅后在收到信号时自行退出。
pub struct ShutdownManager {
    shutdown_tx: broadcast::Sender<()>,
}

impl ShutdownManager {
    pub fn new() -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        Self { shutdown_tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.shutdown_tx.subscribe()
    }

    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
    }
}

impl Default for ShutdownManager {
    fn default() -> Self {
        Self::new()
    }
}
