use std::sync::Arc;

use anyhow::Result;
use helmsman_consumer::ConsumerService;
use helmsman_core::{AppConfig, MessageQueue, QueueBackend};
use helmsman_dispatcher::{Dispatcher, HandlerContext};
use helmsman_infrastructure::{
    InMemoryAppStore, InMemoryMessageQueue, InMemoryServiceInstanceStore, RabbitMqMessageQueue,
    ShellProvisioner,
};
use tokio::sync::broadcast;
use tracing::info;

/// 按配置组装好的应用实例
pub struct Application {
    consumer: ConsumerService,
}

impl Application {
    pub async fn new(config: AppConfig) -> Result<Self> {
        let queue: Arc<dyn MessageQueue> = match config.message_queue.backend {
            QueueBackend::Memory => {
                info!("使用内存消息队列");
                Arc::new(InMemoryMessageQueue::new())
            }
            QueueBackend::Rabbitmq => {
                info!("使用RabbitMQ消息队列: {}", config.message_queue.url);
                Arc::new(RabbitMqMessageQueue::new(config.message_queue.clone()).await?)
            }
        };

        // 嵌入式部署：文档存储与执行后端都在本进程内
        let apps = Arc::new(InMemoryAppStore::new());
        let instances = Arc::new(InMemoryServiceInstanceStore::new());
        let provisioner = Arc::new(ShellProvisioner::new(&config.provisioner));

        let ctx = HandlerContext::new(apps, instances, provisioner);
        let dispatcher = Arc::new(Dispatcher::new(ctx));
        let consumer = ConsumerService::builder(
            queue,
            dispatcher,
            config.message_queue.queue_name.clone(),
            config.message_queue.legacy_queue_name.clone(),
        )
        .poll_timeout(config.consumer.poll_timeout())
        .build();

        Ok(Self { consumer })
    }

    /// 运行到收到关闭信号为止
    pub async fn run(&self, mut shutdown_rx: broadcast::Receiver<()>) -> Result<()> {
        self.consumer.start().await?;
        let _ = shutdown_rx.recv().await;
        self.consumer.stop().await?;
        Ok(())
    }
}
