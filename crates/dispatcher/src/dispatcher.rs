use std::collections::HashMap;
use std::sync::Arc;

use helmsman_core::{Action, ActionMessage, HelmsmanError, Result};
use tracing::{debug, error};

use crate::handlers::{
    ActionHandler, BindServiceHandler, HandlerContext, RegenerateAndRestartHandler,
    RegenerateApprcHandler, StartAppHandler,
};

/// 动作调度器
///
/// 按动作标签精确匹配处理器。所有错误在 dispatch 边界收口成一条
/// 结构化日志，不向消费者传播：消息无论成败都视为已消费，
/// 是否重发由外部编排决定。
pub struct Dispatcher {
    handlers: HashMap<Action, Arc<dyn ActionHandler>>,
}

impl Dispatcher {
    /// 注册全部动作处理器
    pub fn new(ctx: HandlerContext) -> Self {
        let handlers: Vec<Arc<dyn ActionHandler>> = vec![
            Arc::new(RegenerateApprcHandler::new(ctx.clone())),
            Arc::new(StartAppHandler::new(ctx.clone())),
            Arc::new(RegenerateAndRestartHandler::new(ctx.clone())),
            Arc::new(BindServiceHandler::new(ctx)),
        ];
        Self {
            handlers: handlers.into_iter().map(|h| (h.action(), h)).collect(),
        }
    }

    /// 执行一条消息：标签解析、参数个数校验、调用处理器
    pub async fn execute(&self, message: &ActionMessage) -> Result<()> {
        let action: Action = message.action.parse()?;
        let handler = self
            .handlers
            .get(&action)
            .ok_or(HelmsmanError::InvalidAction)?;
        let min = handler.min_args();
        if message.args.len() < min {
            return Err(HelmsmanError::MissingArguments { min });
        }
        debug!("执行动作: {} args={:?}", message.action, message.args);
        handler.handle(&message.args).await
    }

    /// 调度一条消息；失败只记日志
    pub async fn dispatch(&self, message: &ActionMessage) {
        if let Err(err) = self.execute(message).await {
            match message.app_name() {
                Some(app) if concerns_app(&err) => {
                    error!(
                        "Error handling {:?} for the app {:?}: {}",
                        message.action, app, err
                    );
                }
                _ => error!("Error handling {:?}: {}", message.action, err),
            }
        }
    }
}

/// 错误是否已定位到具体应用（决定日志里是否带应用名）
fn concerns_app(err: &HelmsmanError) -> bool {
    !matches!(
        err,
        HelmsmanError::InvalidAction
            | HelmsmanError::MissingArguments { .. }
            | HelmsmanError::AppNotFound { .. }
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use helmsman_core::{
        App, AppState, RecordingProvisioner, Unit, UnitState,
    };
    use helmsman_infrastructure::{InMemoryAppStore, InMemoryServiceInstanceStore};

    fn dispatcher_with(apps: Vec<App>) -> (Dispatcher, RecordingProvisioner) {
        let provisioner = RecordingProvisioner::new();
        let ctx = HandlerContext::new(
            Arc::new(InMemoryAppStore::with_apps(apps)),
            Arc::new(InMemoryServiceInstanceStore::new()),
            Arc::new(provisioner.clone()),
        );
        (Dispatcher::new(ctx), provisioner)
    }

    fn started_app(name: &str) -> App {
        let mut app = App::new(name, AppState::Started);
        app.units = vec![Unit::new(format!("{name}/0"), UnitState::Started, 19)];
        app
    }

    #[tokio::test]
    async fn test_execute_unknown_action() {
        let (dispatcher, provisioner) = dispatcher_with(vec![]);
        let message =
            ActionMessage::with_raw_action("unknown-action", vec!["does not matter".to_string()]);
        let err = dispatcher.execute(&message).await.unwrap_err();
        assert_eq!(err.to_string(), "invalid action");
        assert!(provisioner.commands().is_empty());
    }

    #[tokio::test]
    async fn test_execute_missing_arguments() {
        let (dispatcher, provisioner) = dispatcher_with(vec![]);
        let message = ActionMessage::with_raw_action("regenerate-apprc", vec![]);
        let err = dispatcher.execute(&message).await.unwrap_err();
        assert_eq!(err.to_string(), "this action requires at least 1 argument(s)");
        assert!(provisioner.commands().is_empty());
    }

    #[tokio::test]
    async fn test_bind_service_requires_two_arguments() {
        let (dispatcher, _) = dispatcher_with(vec![started_app("nemesis")]);
        let message =
            ActionMessage::with_raw_action("bind-service", vec!["nemesis".to_string()]);
        let err = dispatcher.execute(&message).await.unwrap_err();
        assert_eq!(err.to_string(), "this action requires at least 2 argument(s)");
    }

    #[tokio::test]
    async fn test_execute_app_not_found() {
        let (dispatcher, provisioner) = dispatcher_with(vec![]);
        let message = ActionMessage::with_raw_action(
            "regenerate-apprc",
            vec!["unknown-app".to_string()],
        );
        let err = dispatcher.execute(&message).await.unwrap_err();
        assert_eq!(err.to_string(), "app \"unknown-app\" does not exist");
        assert!(provisioner.commands().is_empty());
    }

    #[tokio::test]
    async fn test_execute_state_violations_touch_nothing() {
        let pending = App::new("nemesis", AppState::Pending);
        let mut mixed = App::new("totem", AppState::Started);
        mixed.units = vec![
            Unit::new("totem/0", UnitState::Pending, 1),
            Unit::new("totem/1", UnitState::Started, 2),
        ];
        let broken = App::new("marathon", AppState::Error);
        let down = App::new("territories", AppState::Down);
        let (dispatcher, provisioner) =
            dispatcher_with(vec![pending, mixed, broken, down]);

        let cases = [
            (
                vec!["nemesis".to_string()],
                "The status of the app and all units should be \"started\" (the app is \"pending\")",
            ),
            (
                vec![
                    "totem".to_string(),
                    "totem/0".to_string(),
                    "totem/1".to_string(),
                ],
                "The status of the app and all units should be \"started\" (the app is \"started\")",
            ),
            (vec!["marathon".to_string()], "the app is in \"error\" state"),
            (vec!["territories".to_string()], "the app is down"),
        ];
        for (args, expected) in cases {
            let message = ActionMessage::with_raw_action("regenerate-apprc", args);
            let err = dispatcher.execute(&message).await.unwrap_err();
            assert_eq!(err.to_string(), expected);
        }
        assert!(provisioner.commands().is_empty());
    }

    #[tokio::test]
    async fn test_dispatch_swallows_errors() {
        let (dispatcher, provisioner) = dispatcher_with(vec![]);
        let message = ActionMessage::with_raw_action("unknown-action", vec![]);
        // 不 panic、不返回错误
        dispatcher.dispatch(&message).await;
        assert!(provisioner.commands().is_empty());
    }

    #[tokio::test]
    async fn test_dispatch_runs_handler() {
        let (dispatcher, provisioner) = dispatcher_with(vec![started_app("nemesis")]);
        let message =
            ActionMessage::with_raw_action("start-app", vec!["nemesis".to_string()]);
        dispatcher.dispatch(&message).await;
        let commands = provisioner.commands();
        assert_eq!(commands.len(), 1);
        assert_eq!(commands[0].command, crate::handlers::RESTART_HOOK);
    }
}
