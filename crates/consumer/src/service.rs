use std::sync::Arc;
use std::time::Duration;

use helmsman_core::{ActionMessage, HelmsmanError, MessageQueue, Result};
use helmsman_dispatcher::Dispatcher;
use tokio::sync::broadcast::error::TryRecvError;
use tokio::sync::{broadcast, RwLock};
use tracing::{error, info};

/// 出队失败后的退避间隔
const FETCH_ERROR_BACKOFF: Duration = Duration::from_millis(500);

/// 队列消费者服务构建器
pub struct ConsumerServiceBuilder {
    queue: Arc<dyn MessageQueue>,
    dispatcher: Arc<Dispatcher>,
    queue_name: String,
    legacy_queue_name: String,
    poll_timeout: Duration,
}

impl ConsumerServiceBuilder {
    pub fn new(
        queue: Arc<dyn MessageQueue>,
        dispatcher: Arc<Dispatcher>,
        queue_name: String,
        legacy_queue_name: String,
    ) -> Self {
        Self {
            queue,
            dispatcher,
            queue_name,
            legacy_queue_name,
            poll_timeout: Duration::from_secs(5),
        }
    }

    /// 设置单次出队的最长等待
    pub fn poll_timeout(mut self, poll_timeout: Duration) -> Self {
        self.poll_timeout = poll_timeout;
        self
    }

    pub fn build(self) -> ConsumerService {
        ConsumerService {
            queue: self.queue,
            dispatcher: self.dispatcher,
            queues: vec![self.queue_name.clone(), self.legacy_queue_name],
            queue_name: self.queue_name,
            poll_timeout: self.poll_timeout,
            shutdown_tx: Arc::new(RwLock::new(None)),
            is_running: Arc::new(RwLock::new(false)),
        }
    }
}

/// 队列消费者
///
/// 订阅自有队列和迁移期的别名队列，两者路由到同一个调度器，
/// 行为没有差别。每条消息至多处理一次：分发完成后无论成败都从
/// 传输层删除，失败只进日志，不重投递。
#[derive(Clone)]
pub struct ConsumerService {
    queue: Arc<dyn MessageQueue>,
    dispatcher: Arc<Dispatcher>,
    /// 订阅的队列：自有队列在前，别名队列在后
    queues: Vec<String>,
    /// 生产侧入队用的自有队列名
    queue_name: String,
    poll_timeout: Duration,
    shutdown_tx: Arc<RwLock<Option<broadcast::Sender<()>>>>,
    is_running: Arc<RwLock<bool>>,
}

impl ConsumerService {
    pub fn builder(
        queue: Arc<dyn MessageQueue>,
        dispatcher: Arc<Dispatcher>,
        queue_name: String,
        legacy_queue_name: String,
    ) -> ConsumerServiceBuilder {
        ConsumerServiceBuilder::new(queue, dispatcher, queue_name, legacy_queue_name)
    }

    /// 订阅的队列名集合
    pub fn queues(&self) -> &[String] {
        &self.queues
    }

    /// 生产侧入队：固定发布到自有队列，不做任何校验
    pub async fn enqueue(&self, message: &ActionMessage) -> Result<()> {
        self.queue.publish(&self.queue_name, message).await
    }

    /// 取出并处理一条消息；队列为空时返回 false
    pub async fn poll_once(&self, queue: &str) -> Result<bool> {
        let Some(delivery) = self.queue.fetch(queue, self.poll_timeout).await? else {
            return Ok(false);
        };
        self.dispatcher.dispatch(&delivery.message).await;
        // 无论处理结果如何都删除：至多一次尝试
        if let Err(err) = self.queue.delete(&delivery.receipt).await {
            error!(
                "删除消息 {} 失败: {}",
                delivery.receipt.message_id, err
            );
        }
        Ok(true)
    }

    /// 单个队列的消费循环
    ///
    /// 关停只在消息边界生效：已分发的处理器总是运行到完成。
    async fn run_queue_loop(&self, queue: String, mut shutdown_rx: broadcast::Receiver<()>) {
        info!("开始消费队列: {}", queue);
        loop {
            match shutdown_rx.try_recv() {
                Err(TryRecvError::Empty) => {}
                _ => break,
            }
            if let Err(err) = self.poll_once(&queue).await {
                error!("从队列 {} 取消息失败: {}", queue, err);
                tokio::time::sleep(FETCH_ERROR_BACKOFF).await;
            }
        }
        info!("队列 {} 消费循环已退出", queue);
    }

    /// 启动消费：每个订阅队列一个轮询任务
    pub async fn start(&self) -> Result<()> {
        let mut is_running = self.is_running.write().await;
        if *is_running {
            return Err(HelmsmanError::Internal(
                "consumer is already running".to_string(),
            ));
        }
        for queue in &self.queues {
            self.queue.create_queue(queue).await?;
        }

        let (shutdown_tx, _) = broadcast::channel(1);
        for queue in self.queues.clone() {
            let service = self.clone();
            let shutdown_rx = shutdown_tx.subscribe();
            tokio::spawn(async move {
                service.run_queue_loop(queue, shutdown_rx).await;
            });
        }
        *self.shutdown_tx.write().await = Some(shutdown_tx);
        *is_running = true;
        info!("消费者已启动: queues={:?}", self.queues);
        Ok(())
    }

    /// 停止消费，幂等
    pub async fn stop(&self) -> Result<()> {
        let mut is_running = self.is_running.write().await;
        if !*is_running {
            return Ok(());
        }
        if let Some(shutdown_tx) = self.shutdown_tx.write().await.take() {
            let _ = shutdown_tx.send(());
        }
        *is_running = false;
        info!("消费者已停止");
        Ok(())
    }

    pub async fn is_running(&self) -> bool {
        *self.is_running.read().await
    }
}
