use std::process::Stdio;

use async_trait::async_trait;
use helmsman_core::{App, HelmsmanError, Provisioner, ProvisionerConfig, Result};
use tokio::process::Command;
use tracing::{debug, info};

/// 本地shell执行后端
///
/// 单机/嵌入式部署用：对每个目标单元在本机执行一次命令，目标单元
/// 通过环境变量传给命令。units 为空时按约定作用于应用全部单元。
pub struct ShellProvisioner {
    shell: String,
}

impl ShellProvisioner {
    pub fn new(config: &ProvisionerConfig) -> Self {
        Self {
            shell: config.shell.clone(),
        }
    }

    pub fn with_shell(shell: impl Into<String>) -> Self {
        Self {
            shell: shell.into(),
        }
    }

    async fn run_for_unit(&self, command: &str, app: &App, unit: &str) -> Result<String> {
        debug!("执行命令: app={}, unit={}", app.name, unit);
        let output = Command::new(&self.shell)
            .arg("-c")
            .arg(command)
            .env("HELMSMAN_APP", &app.name)
            .env("HELMSMAN_UNIT", unit)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| HelmsmanError::Provisioner(format!("spawn {}: {e}", self.shell)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(HelmsmanError::Provisioner(format!(
                "unit {unit:?}: exit status {:?}: {}",
                output.status.code(),
                stderr.trim()
            )));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[async_trait]
impl Provisioner for ShellProvisioner {
    async fn run(&self, command: &str, app: &App, units: &[String]) -> Result<String> {
        let targets = if units.is_empty() {
            app.unit_names()
        } else {
            units.to_vec()
        };

        let mut combined = String::new();
        for unit in &targets {
            let output = self.run_for_unit(command, app, unit).await?;
            combined.push_str(&output);
        }
        info!(
            "命令执行完成: app={}, units={}",
            app.name,
            targets.len()
        );
        Ok(combined)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use helmsman_core::{AppState, Unit, UnitState};

    fn app_with_units(names: &[&str]) -> App {
        let mut app = App::new("nemesis", AppState::Started);
        app.units = names
            .iter()
            .enumerate()
            .map(|(i, n)| Unit::new(*n, UnitState::Started, i as i64))
            .collect();
        app
    }

    #[tokio::test]
    async fn test_runs_once_per_unit() {
        let provisioner = ShellProvisioner::with_shell("sh");
        let app = app_with_units(&["nemesis/0", "nemesis/1"]);
        let output = provisioner
            .run("printf 'u=%s;' \"$HELMSMAN_UNIT\"", &app, &[])
            .await
            .unwrap();
        assert_eq!(output, "u=nemesis/0;u=nemesis/1;");
    }

    #[tokio::test]
    async fn test_explicit_subset_limits_targets() {
        let provisioner = ShellProvisioner::with_shell("sh");
        let app = app_with_units(&["nemesis/0", "nemesis/1", "nemesis/2"]);
        let output = provisioner
            .run(
                "printf 'u=%s;' \"$HELMSMAN_UNIT\"",
                &app,
                &["nemesis/1".to_string()],
            )
            .await
            .unwrap();
        assert_eq!(output, "u=nemesis/1;");
    }

    #[tokio::test]
    async fn test_nonzero_exit_is_provisioner_error() {
        let provisioner = ShellProvisioner::with_shell("sh");
        let app = app_with_units(&["nemesis/0"]);
        let err = provisioner.run("exit 3", &app, &[]).await.unwrap_err();
        let message = err.to_string();
        assert!(message.starts_with("provisioner error"), "{message}");
        assert!(message.contains("nemesis/0"), "{message}");
    }
}
