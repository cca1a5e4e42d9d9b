pub mod config;
pub mod errors;
pub mod models;
pub mod traits;

pub use self::config::*;
pub use errors::*;
pub use models::{
    units_started, Action, ActionMessage, App, AppState, Delivery, DeliveryReceipt, EnvVar,
    ServiceInstance, Unit, UnitState, DEFAULT_BIND_ENVIRONMENT,
};
pub use traits::*;

/// 统一的Result类型
pub type Result<T> = std::result::Result<T, HelmsmanError>;
