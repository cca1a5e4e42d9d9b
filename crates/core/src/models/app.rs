use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// 应用生命周期状态
///
/// 只有 `Started` 状态的应用可以执行生命周期操作。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AppState {
    Pending,
    Started,
    Error,
    Down,
}

impl AppState {
    /// 是否处于可执行生命周期操作的就绪状态
    pub fn is_ready(&self) -> bool {
        matches!(self, AppState::Started)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AppState::Pending => "pending",
            AppState::Started => "started",
            AppState::Error => "error",
            AppState::Down => "down",
        }
    }
}

impl fmt::Display for AppState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 执行单元状态
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum UnitState {
    Pending,
    Started,
    Error,
}

impl UnitState {
    pub fn is_ready(&self) -> bool {
        matches!(self, UnitState::Started)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            UnitState::Pending => "pending",
            UnitState::Started => "started",
            UnitState::Error => "error",
        }
    }
}

impl fmt::Display for UnitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 应用的一个执行单元（虚拟机/容器实例）
///
/// 单元归属且仅归属一个应用，machine 标识远程执行后端的目标机器。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Unit {
    pub name: String,
    pub state: UnitState,
    pub machine: i64,
}

impl Unit {
    pub fn new(name: impl Into<String>, state: UnitState, machine: i64) -> Self {
        Self {
            name: name.into(),
            state,
            machine,
        }
    }
}

/// 环境变量三元组
///
/// 只有 public 变量会被导出到生成的脚本中；private 变量仅用于内部
/// 接线（例如服务绑定产生的凭据），绝不出现在生成结果里。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EnvVar {
    pub name: String,
    pub value: String,
    pub public: bool,
}

impl EnvVar {
    pub fn public(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            public: true,
        }
    }

    pub fn private(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            public: false,
        }
    }
}

/// 应用记录
///
/// 以名称唯一标识，持有其全部执行单元和环境变量集合。
/// env 使用 BTreeMap 保证导出脚本的确定性顺序。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct App {
    pub name: String,
    pub state: AppState,
    #[serde(default)]
    pub units: Vec<Unit>,
    #[serde(default)]
    pub env: BTreeMap<String, EnvVar>,
}

impl App {
    pub fn new(name: impl Into<String>, state: AppState) -> Self {
        Self {
            name: name.into(),
            state,
            units: Vec::new(),
            env: BTreeMap::new(),
        }
    }

    /// 按名称查找单元
    pub fn unit_by_name(&self, name: &str) -> Option<&Unit> {
        self.units.iter().find(|u| u.name == name)
    }

    /// 写入一个环境变量，同名覆盖
    pub fn set_env(&mut self, var: EnvVar) {
        self.env.insert(var.name.clone(), var);
    }

    /// 所有单元名称，按声明顺序
    pub fn unit_names(&self) -> Vec<String> {
        self.units.iter().map(|u| u.name.clone()).collect()
    }
}

/// 单元序列就绪判定
///
/// 空序列视为就绪；任何一个单元不是 `started` 即为未就绪。
/// 纯函数，每次调度重新求值，不做缓存。
pub fn units_started<'a, I>(units: I) -> bool
where
    I: IntoIterator<Item = &'a Unit>,
{
    units.into_iter().all(|u| u.state.is_ready())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit(state: UnitState) -> Unit {
        Unit::new("u", state, 0)
    }

    #[test]
    fn test_units_started_all_started() {
        let units = vec![
            unit(UnitState::Started),
            unit(UnitState::Started),
            unit(UnitState::Started),
        ];
        assert!(units_started(&units));
    }

    #[test]
    fn test_units_started_empty_is_ready() {
        let units: Vec<Unit> = Vec::new();
        assert!(units_started(&units));
    }

    #[test]
    fn test_units_started_single_offender_fails() {
        // 无论坏单元的位置在哪，判定都必须为 false
        for bad_at in 0..3 {
            let mut units = vec![
                unit(UnitState::Started),
                unit(UnitState::Started),
                unit(UnitState::Started),
            ];
            units[bad_at] = unit(UnitState::Pending);
            assert!(!units_started(&units), "offender at {bad_at}");
        }
    }

    #[test]
    fn test_units_started_error_state_fails() {
        let units = vec![unit(UnitState::Started), unit(UnitState::Error)];
        assert!(!units_started(&units));
    }

    #[test]
    fn test_app_state_ready_classification() {
        assert!(AppState::Started.is_ready());
        assert!(!AppState::Pending.is_ready());
        assert!(!AppState::Error.is_ready());
        assert!(!AppState::Down.is_ready());
    }

    #[test]
    fn test_app_state_serde_names() {
        assert_eq!(serde_json::to_string(&AppState::Pending).unwrap(), "\"pending\"");
        assert_eq!(serde_json::to_string(&AppState::Down).unwrap(), "\"down\"");
        let state: AppState = serde_json::from_str("\"started\"").unwrap();
        assert_eq!(state, AppState::Started);
    }

    #[test]
    fn test_unit_by_name() {
        let mut app = App::new("nemesis", AppState::Started);
        app.units = vec![
            Unit::new("nemesis/0", UnitState::Started, 19),
            Unit::new("nemesis/1", UnitState::Started, 20),
        ];
        assert_eq!(app.unit_by_name("nemesis/1").unwrap().machine, 20);
        assert!(app.unit_by_name("nemesis/9").is_none());
    }

    #[test]
    fn test_set_env_overwrites_same_name() {
        let mut app = App::new("nemesis", AppState::Started);
        app.set_env(EnvVar::public("PATH", "/bin"));
        app.set_env(EnvVar::private("PATH", "/usr/bin"));
        let var = app.env.get("PATH").unwrap();
        assert_eq!(var.value, "/usr/bin");
        assert!(!var.public);
    }
}
