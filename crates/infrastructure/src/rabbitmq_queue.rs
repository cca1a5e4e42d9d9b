use std::time::{Duration, Instant};

use async_trait::async_trait;
use helmsman_core::{
    ActionMessage, Delivery, DeliveryReceipt, HelmsmanError, MessageQueue, MessageQueueConfig,
    Result,
};
use lapin::{
    options::*, types::FieldTable, BasicProperties, Channel, Connection, ConnectionProperties,
};
use tokio::sync::Mutex;
use tracing::{debug, info};

/// basic_get 轮询的间隔
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// RabbitMQ消息队列实现
///
/// 队列声明为durable，消息持久化发布。delete 通过回执里的
/// delivery tag 做ack，保证消息在处理完成之后才离开broker。
pub struct RabbitMqMessageQueue {
    connection: Connection,
    channel: Mutex<Channel>,
    config: MessageQueueConfig,
}

impl RabbitMqMessageQueue {
    /// 连接broker并声明订阅的队列
    pub async fn new(config: MessageQueueConfig) -> Result<Self> {
        let connection = Connection::connect(&config.url, ConnectionProperties::default())
            .await
            .map_err(|e| HelmsmanError::Queue(format!("connect to rabbitmq: {e}")))?;
        let channel = connection
            .create_channel()
            .await
            .map_err(|e| HelmsmanError::Queue(format!("create channel: {e}")))?;

        info!("已连接到RabbitMQ: {}", config.url);

        let queue = Self {
            connection,
            channel: Mutex::new(channel),
            config,
        };
        for name in queue.config.subscribed_queues() {
            queue.create_queue(&name).await?;
        }
        Ok(queue)
    }

    async fn declare_queue(&self, channel: &Channel, queue: &str) -> Result<()> {
        channel
            .queue_declare(
                queue,
                QueueDeclareOptions {
                    durable: true,
                    exclusive: false,
                    auto_delete: false,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await
            .map_err(|e| HelmsmanError::Queue(format!("declare queue {queue}: {e}")))?;
        debug!("队列 {} 声明成功", queue);
        Ok(())
    }

    fn decode(&self, data: &[u8]) -> Result<ActionMessage> {
        ActionMessage::deserialize_bytes(data)
            .map_err(|e| HelmsmanError::Serialization(format!("decode message: {e}")))
    }

    pub fn is_connected(&self) -> bool {
        self.connection.status().connected()
    }

    pub async fn close(&self) -> Result<()> {
        self.connection
            .close(200, "shutting down")
            .await
            .map_err(|e| HelmsmanError::Queue(format!("close connection: {e}")))?;
        info!("RabbitMQ连接已关闭");
        Ok(())
    }
}

#[async_trait]
impl MessageQueue for RabbitMqMessageQueue {
    async fn publish(&self, queue: &str, message: &ActionMessage) -> Result<()> {
        let payload = message
            .serialize_bytes()
            .map_err(|e| HelmsmanError::Serialization(format!("encode message: {e}")))?;
        let channel = self.channel.lock().await;
        let confirm = channel
            .basic_publish(
                "",
                queue,
                BasicPublishOptions::default(),
                &payload,
                BasicProperties::default().with_delivery_mode(2), // 2 = persistent
            )
            .await
            .map_err(|e| HelmsmanError::Queue(format!("publish to {queue}: {e}")))?;
        confirm
            .await
            .map_err(|e| HelmsmanError::Queue(format!("publish confirm: {e}")))?;
        debug!("消息已发布到队列: {}", queue);
        Ok(())
    }

    async fn fetch(&self, queue: &str, timeout: Duration) -> Result<Option<Delivery>> {
        let deadline = Instant::now() + timeout;
        loop {
            let get_result = {
                let channel = self.channel.lock().await;
                channel.basic_get(queue, BasicGetOptions::default()).await
            };
            match get_result {
                Ok(Some(delivery)) => {
                    let message = self.decode(&delivery.data)?;
                    let receipt = DeliveryReceipt {
                        queue: queue.to_string(),
                        message_id: message.id.clone(),
                        tag: delivery.delivery_tag,
                    };
                    return Ok(Some(Delivery { message, receipt }));
                }
                Ok(None) => {
                    if Instant::now() >= deadline {
                        return Ok(None);
                    }
                    tokio::time::sleep(POLL_INTERVAL.min(timeout)).await;
                }
                Err(e) => {
                    // 队列尚未声明时按空处理
                    let error_msg = e.to_string();
                    if error_msg.contains("NOT_FOUND") || error_msg.contains("404") {
                        debug!("队列 {} 不存在，按空队列处理", queue);
                        return Ok(None);
                    }
                    return Err(HelmsmanError::Queue(format!(
                        "fetch from {queue}: {e}"
                    )));
                }
            }
        }
    }

    async fn delete(&self, receipt: &DeliveryReceipt) -> Result<()> {
        let channel = self.channel.lock().await;
        channel
            .basic_ack(receipt.tag, BasicAckOptions::default())
            .await
            .map_err(|e| {
                HelmsmanError::Queue(format!(
                    "ack message {} on {}: {e}",
                    receipt.message_id, receipt.queue
                ))
            })?;
        debug!("消息 {} 已确认删除", receipt.message_id);
        Ok(())
    }

    async fn create_queue(&self, queue: &str) -> Result<()> {
        let channel = self.channel.lock().await;
        self.declare_queue(&channel, queue).await
    }

    async fn queue_size(&self, queue: &str) -> Result<u32> {
        let channel = self.channel.lock().await;
        let queue_info = channel
            .queue_declare(
                queue,
                QueueDeclareOptions {
                    passive: true,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await;
        match queue_info {
            Ok(info) => Ok(info.message_count()),
            Err(e) => {
                let error_msg = e.to_string();
                if error_msg.contains("NOT_FOUND") || error_msg.contains("404") {
                    Ok(0)
                } else {
                    Err(HelmsmanError::Queue(format!("inspect queue {queue}: {e}")))
                }
            }
        }
    }

    async fn purge_queue(&self, queue: &str) -> Result<()> {
        let channel = self.channel.lock().await;
        channel
            .queue_purge(queue, QueuePurgeOptions::default())
            .await
            .map_err(|e| HelmsmanError::Queue(format!("purge queue {queue}: {e}")))?;
        debug!("队列 {} 已清空", queue);
        Ok(())
    }
}
