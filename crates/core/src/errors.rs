use thiserror::Error;

use crate::models::AppState;

/// 协调器错误类型定义
///
/// 错误文案是操作员诊断的唯一出口（见调度边界的日志策略），
/// 因此保持为完整的英文句子。
#[derive(Debug, Error)]
pub enum HelmsmanError {
    #[error("invalid action")]
    InvalidAction,

    #[error("this action requires at least {min} argument(s)")]
    MissingArguments { min: usize },

    #[error("app {name:?} does not exist")]
    AppNotFound { name: String },

    #[error("unit {unit:?} does not belong to the app {app:?}")]
    UnitNotFound { app: String, unit: String },

    #[error("the app is down")]
    AppDown,

    #[error("the app is in \"error\" state")]
    AppBroken,

    #[error("The status of the app and all units should be \"started\" (the app is \"{state}\")")]
    AppNotReady { state: AppState },

    #[error("service instance {instance:?} has no {environment:?} endpoint")]
    EndpointNotConfigured { instance: String, environment: String },

    #[error("provisioner error: {0}")]
    Provisioner(String),

    #[error("message queue error: {0}")]
    Queue(String),

    #[error("service endpoint error: {0}")]
    Endpoint(String),

    #[error("store error: {0}")]
    Store(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("internal error: {0}")]
    Internal(String),
}
