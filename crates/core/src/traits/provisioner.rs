use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::models::App;
use crate::{HelmsmanError, Result};

/// 远程执行后端抽象接口
///
/// command 可以是一段完整脚本，也可以是一个钩子路径；units 为空时
/// 约定作用于应用的全部单元。
#[async_trait]
pub trait Provisioner: Send + Sync {
    /// 在目标单元上执行命令，返回合并后的输出
    async fn run(&self, command: &str, app: &App, units: &[String]) -> Result<String>;
}

/// 一次被记录的远程执行
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCommand {
    pub command: String,
    pub app: String,
    pub units: Vec<String>,
}

/// 记录型执行后端，测试用
///
/// 记录每次 run 的命令、应用与目标单元；输出按 FIFO 预置，
/// 预置耗尽后返回空串。
#[derive(Debug, Clone, Default)]
pub struct RecordingProvisioner {
    commands: Arc<Mutex<Vec<RecordedCommand>>>,
    outputs: Arc<Mutex<VecDeque<std::result::Result<String, String>>>>,
}

impl RecordingProvisioner {
    pub fn new() -> Self {
        Self::default()
    }

    /// 预置下一次 run 的输出
    pub fn prepare_output(&self, output: impl Into<String>) {
        self.outputs
            .lock()
            .unwrap()
            .push_back(Ok(output.into()));
    }

    /// 预置下一次 run 的失败
    pub fn prepare_failure(&self, message: impl Into<String>) {
        self.outputs
            .lock()
            .unwrap()
            .push_back(Err(message.into()));
    }

    /// 全部已记录的执行
    pub fn commands(&self) -> Vec<RecordedCommand> {
        self.commands.lock().unwrap().clone()
    }

    /// 针对某应用记录的执行
    pub fn commands_for_app(&self, app: &str) -> Vec<RecordedCommand> {
        self.commands
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.app == app)
            .cloned()
            .collect()
    }

    pub fn clear(&self) {
        self.commands.lock().unwrap().clear();
        self.outputs.lock().unwrap().clear();
    }
}

#[async_trait]
impl Provisioner for RecordingProvisioner {
    async fn run(&self, command: &str, app: &App, units: &[String]) -> Result<String> {
        self.commands.lock().unwrap().push(RecordedCommand {
            command: command.to_string(),
            app: app.name.clone(),
            units: units.to_vec(),
        });
        match self.outputs.lock().unwrap().pop_front() {
            Some(Ok(output)) => Ok(output),
            Some(Err(message)) => Err(HelmsmanError::Provisioner(message)),
            None => Ok(String::new()),
        }
    }
}
