use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::HelmsmanError;

/// 动作枚举（封闭集合）
///
/// 每个动作对应一个线上标签；调度器用精确匹配查找处理器，
/// 未知标签按畸形消息处理。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    /// 重新生成环境脚本并在目标单元上执行
    RegenerateApprc,
    /// 在目标单元上运行重启钩子
    StartApp,
    /// 环境脚本、部署配置读取、重启钩子，严格按序三次远程操作
    RegenerateAndRestart,
    /// 调用服务端点并把返回的变量合并为私有环境变量
    BindService,
}

impl Action {
    pub const ALL: [Action; 4] = [
        Action::RegenerateApprc,
        Action::StartApp,
        Action::RegenerateAndRestart,
        Action::BindService,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Action::RegenerateApprc => "regenerate-apprc",
            Action::StartApp => "start-app",
            Action::RegenerateAndRestart => "regenerate-and-restart",
            Action::BindService => "bind-service",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Action {
    type Err = HelmsmanError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "regenerate-apprc" => Ok(Action::RegenerateApprc),
            "start-app" => Ok(Action::StartApp),
            "regenerate-and-restart" => Ok(Action::RegenerateAndRestart),
            "bind-service" => Ok(Action::BindService),
            _ => Err(HelmsmanError::InvalidAction),
        }
    }
}

/// 动作消息
///
/// args 的第一个元素（如存在）总是应用名，其余元素是可选的
/// 目标单元名子集。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ActionMessage {
    pub id: String,
    pub action: String,
    #[serde(default)]
    pub args: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl ActionMessage {
    pub fn new(action: Action, args: Vec<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            action: action.as_str().to_string(),
            args,
            created_at: Utc::now(),
        }
    }

    /// 用原始标签构造消息，标签不做校验（调度时才判定）
    pub fn with_raw_action(action: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            action: action.into(),
            args,
            created_at: Utc::now(),
        }
    }

    /// 应用名（args[0]），可能缺失
    pub fn app_name(&self) -> Option<&str> {
        self.args.first().map(|s| s.as_str())
    }

    pub fn serialize_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    pub fn deserialize_bytes(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }
}

/// 传输层删除消息所需的回执
///
/// tag 是 AMQP 的 delivery tag；内存队列恒为 0。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryReceipt {
    pub queue: String,
    pub message_id: String,
    pub tag: u64,
}

/// 一次出队结果：消息本体加上删除回执
#[derive(Debug, Clone)]
pub struct Delivery {
    pub message: ActionMessage,
    pub receipt: DeliveryReceipt,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_wire_tags() {
        assert_eq!(Action::RegenerateApprc.as_str(), "regenerate-apprc");
        assert_eq!(Action::StartApp.as_str(), "start-app");
        assert_eq!(Action::RegenerateAndRestart.as_str(), "regenerate-and-restart");
        assert_eq!(Action::BindService.as_str(), "bind-service");
    }

    #[test]
    fn test_action_round_trip() {
        for action in Action::ALL {
            let parsed: Action = action.as_str().parse().unwrap();
            assert_eq!(parsed, action);
        }
    }

    #[test]
    fn test_unknown_tag_is_invalid_action() {
        let err = "unknown-action".parse::<Action>().unwrap_err();
        assert_eq!(err.to_string(), "invalid action");
    }

    #[test]
    fn test_message_serialization_round_trip() {
        let message = ActionMessage::new(
            Action::RegenerateApprc,
            vec!["nemesis".to_string(), "nemesis/1".to_string()],
        );
        let bytes = message.serialize_bytes().unwrap();
        let decoded = ActionMessage::deserialize_bytes(&bytes).unwrap();
        assert_eq!(decoded, message);
    }

    #[test]
    fn test_app_name_is_first_arg() {
        let message = ActionMessage::new(Action::StartApp, vec!["totem".to_string()]);
        assert_eq!(message.app_name(), Some("totem"));
        let empty = ActionMessage::new(Action::StartApp, vec![]);
        assert_eq!(empty.app_name(), None);
    }

    #[test]
    fn test_messages_get_unique_ids() {
        let a = ActionMessage::new(Action::StartApp, vec![]);
        let b = ActionMessage::new(Action::StartApp, vec![]);
        assert_ne!(a.id, b.id);
    }
}
