use std::collections::BTreeMap;

use async_trait::async_trait;

use crate::models::{App, EnvVar, ServiceInstance};
use crate::Result;

/// 应用仓储接口
///
/// 应用是以名称为键的持久化文档。本核心只读取既有应用并更新其
/// 环境变量字段，创建和销毁在部署流程里完成。
#[async_trait]
pub trait AppRepository: Send + Sync {
    /// 按名称读取应用
    async fn get_by_name(&self, name: &str) -> Result<Option<App>>;

    /// 整体写回应用文档
    async fn save(&self, app: &App) -> Result<()>;

    /// 只更新应用的环境变量集合
    ///
    /// 窄更新：读取-合并-写回在调用方完成，这里以文档粒度
    /// last-writer-wins 落盘，避免覆盖无关字段的并发修改。
    async fn update_env(&self, name: &str, env: BTreeMap<String, EnvVar>) -> Result<()>;
}

/// 服务实例仓储接口
#[async_trait]
pub trait ServiceInstanceRepository: Send + Sync {
    /// 按名称读取实例
    async fn get_by_name(&self, name: &str) -> Result<Option<ServiceInstance>>;

    /// 列出把该应用计入绑定集合的全部实例
    async fn find_bound_to_app(&self, app: &str) -> Result<Vec<ServiceInstance>>;

    /// 整体写回实例文档
    async fn save(&self, instance: &ServiceInstance) -> Result<()>;
}
