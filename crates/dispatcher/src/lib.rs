pub mod apprc;
pub mod dispatcher;
pub mod handlers;

pub use apprc::{apprc_script, APPRC_PATH};
pub use dispatcher::Dispatcher;
pub use handlers::{ActionHandler, HandlerContext, APP_CONF_PATH, RESTART_HOOK};
