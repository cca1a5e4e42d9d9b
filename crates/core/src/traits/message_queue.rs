use std::time::Duration;

use async_trait::async_trait;

use crate::models::{ActionMessage, Delivery, DeliveryReceipt};
use crate::Result;

/// 消息队列抽象接口
///
/// 消费方语义：fetch 最多阻塞 timeout，取到一条就返回；消息处理完后
/// 无论成败都用回执 delete，本核心不做重投递。
#[async_trait]
pub trait MessageQueue: Send + Sync {
    /// 发布消息到指定队列
    async fn publish(&self, queue: &str, message: &ActionMessage) -> Result<()>;

    /// 从指定队列取出下一条消息，最多等待 timeout
    ///
    /// 超时返回 Ok(None)。
    async fn fetch(&self, queue: &str, timeout: Duration) -> Result<Option<Delivery>>;

    /// 按回执从传输层删除消息
    async fn delete(&self, receipt: &DeliveryReceipt) -> Result<()>;

    /// 创建队列（幂等）
    async fn create_queue(&self, queue: &str) -> Result<()>;

    /// 获取队列中的消息数量
    async fn queue_size(&self, queue: &str) -> Result<u32>;

    /// 清空队列
    async fn purge_queue(&self, queue: &str) -> Result<()>;
}
