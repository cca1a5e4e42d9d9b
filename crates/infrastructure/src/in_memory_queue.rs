use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use helmsman_core::{
    ActionMessage, Delivery, DeliveryReceipt, HelmsmanError, MessageQueue, Result,
};
use tokio::sync::{mpsc, RwLock};
use tracing::debug;

/// 内存消息队列实现
///
/// 每个队列一对 Tokio channel，适用于嵌入式部署和测试。
/// fetch 一次只取一条消息并在 timeout 内阻塞等待。
#[derive(Debug, Default)]
pub struct InMemoryMessageQueue {
    /// 队列存储：队列名 -> channel对
    queues: Arc<RwLock<HashMap<String, QueueChannel>>>,
    /// 已按回执删除的消息id，消费侧验证用
    deleted: Arc<Mutex<Vec<String>>>,
}

#[derive(Debug)]
struct QueueChannel {
    sender: mpsc::UnboundedSender<ActionMessage>,
    /// 接收端用 Arc 包装，允许多个消费者竞争取数
    receiver: Arc<tokio::sync::Mutex<mpsc::UnboundedReceiver<ActionMessage>>>,
    size: Arc<AtomicU32>,
}

impl QueueChannel {
    fn new() -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        Self {
            sender,
            receiver: Arc::new(tokio::sync::Mutex::new(receiver)),
            size: Arc::new(AtomicU32::new(0)),
        }
    }
}

impl InMemoryMessageQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// 取出（必要时创建）队列的channel句柄
    async fn channel(
        &self,
        queue: &str,
    ) -> (
        mpsc::UnboundedSender<ActionMessage>,
        Arc<tokio::sync::Mutex<mpsc::UnboundedReceiver<ActionMessage>>>,
        Arc<AtomicU32>,
    ) {
        {
            let queues = self.queues.read().await;
            if let Some(ch) = queues.get(queue) {
                return (ch.sender.clone(), ch.receiver.clone(), ch.size.clone());
            }
        }
        let mut queues = self.queues.write().await;
        let ch = queues
            .entry(queue.to_string())
            .or_insert_with(QueueChannel::new);
        (ch.sender.clone(), ch.receiver.clone(), ch.size.clone())
    }

    /// 已删除消息的id列表
    pub fn deleted_ids(&self) -> Vec<String> {
        self.deleted.lock().unwrap().clone()
    }
}

#[async_trait]
impl MessageQueue for InMemoryMessageQueue {
    async fn publish(&self, queue: &str, message: &ActionMessage) -> Result<()> {
        let (sender, _, size) = self.channel(queue).await;
        sender
            .send(message.clone())
            .map_err(|e| HelmsmanError::Queue(format!("publish to {queue}: {e}")))?;
        size.fetch_add(1, Ordering::SeqCst);
        debug!("消息 {} 已入队: {}", message.id, queue);
        Ok(())
    }

    async fn fetch(&self, queue: &str, timeout: Duration) -> Result<Option<Delivery>> {
        let (_, receiver, size) = self.channel(queue).await;
        let mut receiver = receiver.lock().await;
        match tokio::time::timeout(timeout, receiver.recv()).await {
            Ok(Some(message)) => {
                size.fetch_sub(1, Ordering::SeqCst);
                let receipt = DeliveryReceipt {
                    queue: queue.to_string(),
                    message_id: message.id.clone(),
                    tag: 0,
                };
                Ok(Some(Delivery { message, receipt }))
            }
            // sender 常驻于队列表中，channel不会关闭
            Ok(None) => Err(HelmsmanError::Queue(format!("queue {queue} is closed"))),
            Err(_) => Ok(None),
        }
    }

    async fn delete(&self, receipt: &DeliveryReceipt) -> Result<()> {
        // 内存实现里消息在 fetch 时已经离开channel，这里只记账
        self.deleted
            .lock()
            .unwrap()
            .push(receipt.message_id.clone());
        debug!("消息 {} 已从 {} 删除", receipt.message_id, receipt.queue);
        Ok(())
    }

    async fn create_queue(&self, queue: &str) -> Result<()> {
        self.channel(queue).await;
        Ok(())
    }

    async fn queue_size(&self, queue: &str) -> Result<u32> {
        let queues = self.queues.read().await;
        Ok(queues
            .get(queue)
            .map(|ch| ch.size.load(Ordering::SeqCst))
            .unwrap_or(0))
    }

    async fn purge_queue(&self, queue: &str) -> Result<()> {
        let (_, receiver, size) = self.channel(queue).await;
        let mut receiver = receiver.lock().await;
        while receiver.try_recv().is_ok() {}
        size.store(0, Ordering::SeqCst);
        Ok(())
    }
}
