use std::sync::Arc;

use async_trait::async_trait;
use helmsman_core::{
    units_started, Action, App, AppRepository, AppState, EnvVar, HelmsmanError, Provisioner,
    Result, ServiceInstanceRepository, Unit, DEFAULT_BIND_ENVIRONMENT,
};
use helmsman_infrastructure::ServiceEndpointClient;
use tracing::{debug, info};

use crate::apprc::apprc_script;

/// 重启钩子路径
pub const RESTART_HOOK: &str = "/var/lib/helmsman/hooks/restart";

/// 部署配置文件路径
pub const APP_CONF_PATH: &str = "/home/application/current/app.conf";

/// 动作处理器能力接口
///
/// 参数个数校验先于一切状态检查，由调度器按 min_args 执行；
/// handle 收到的 args[0] 保证存在且为应用名。
#[async_trait]
pub trait ActionHandler: Send + Sync {
    fn action(&self) -> Action;

    /// 最少参数个数，至少包含应用名
    fn min_args(&self) -> usize {
        1
    }

    async fn handle(&self, args: &[String]) -> Result<()>;
}

/// 处理器共享的协作者集合
#[derive(Clone)]
pub struct HandlerContext {
    pub apps: Arc<dyn AppRepository>,
    pub instances: Arc<dyn ServiceInstanceRepository>,
    pub provisioner: Arc<dyn Provisioner>,
    pub endpoint_client: ServiceEndpointClient,
}

impl HandlerContext {
    pub fn new(
        apps: Arc<dyn AppRepository>,
        instances: Arc<dyn ServiceInstanceRepository>,
        provisioner: Arc<dyn Provisioner>,
    ) -> Self {
        Self {
            apps,
            instances,
            provisioner,
            endpoint_client: ServiceEndpointClient::new(),
        }
    }

    /// 按名称解析应用，不存在即为终态错误
    async fn app(&self, name: &str) -> Result<App> {
        self.apps
            .get_by_name(name)
            .await?
            .ok_or_else(|| HelmsmanError::AppNotFound {
                name: name.to_string(),
            })
    }
}

/// 解析消息指定的目标单元；未指定时返回全部单元
fn target_units<'a>(app: &'a App, names: &[String]) -> Result<Vec<&'a Unit>> {
    if names.is_empty() {
        return Ok(app.units.iter().collect());
    }
    names
        .iter()
        .map(|name| {
            app.unit_by_name(name)
                .ok_or_else(|| HelmsmanError::UnitNotFound {
                    app: app.name.clone(),
                    unit: name.clone(),
                })
        })
        .collect()
}

/// 状态闸门：应用和给定单元都必须处于 started
///
/// 每次调度重新求值，不缓存单元状态。
fn ensure_ready(app: &App, targets: &[&Unit]) -> Result<()> {
    match app.state {
        AppState::Down => Err(HelmsmanError::AppDown),
        AppState::Error => Err(HelmsmanError::AppBroken),
        state if !state.is_ready() => Err(HelmsmanError::AppNotReady { state }),
        state => {
            if units_started(targets.iter().copied()) {
                Ok(())
            } else {
                Err(HelmsmanError::AppNotReady { state })
            }
        }
    }
}

/// regenerate-apprc：在目标单元上重写环境脚本
pub struct RegenerateApprcHandler {
    ctx: HandlerContext,
}

impl RegenerateApprcHandler {
    pub fn new(ctx: HandlerContext) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl ActionHandler for RegenerateApprcHandler {
    fn action(&self) -> Action {
        Action::RegenerateApprc
    }

    async fn handle(&self, args: &[String]) -> Result<()> {
        let app = self.ctx.app(&args[0]).await?;
        let unit_names = &args[1..];
        let targets = target_units(&app, unit_names)?;
        ensure_ready(&app, &targets)?;

        let script = apprc_script(&app);
        self.ctx.provisioner.run(&script, &app, unit_names).await?;
        info!(
            "已重新生成环境脚本: app={}, units={}",
            app.name,
            if unit_names.is_empty() {
                "all".to_string()
            } else {
                unit_names.join(",")
            }
        );
        Ok(())
    }
}

/// start-app：在目标单元上运行重启钩子
pub struct StartAppHandler {
    ctx: HandlerContext,
}

impl StartAppHandler {
    pub fn new(ctx: HandlerContext) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl ActionHandler for StartAppHandler {
    fn action(&self) -> Action {
        Action::StartApp
    }

    async fn handle(&self, args: &[String]) -> Result<()> {
        let app = self.ctx.app(&args[0]).await?;
        let unit_names = &args[1..];
        let targets = target_units(&app, unit_names)?;
        ensure_ready(&app, &targets)?;

        self.ctx
            .provisioner
            .run(RESTART_HOOK, &app, unit_names)
            .await?;
        info!("已运行重启钩子: app={}", app.name);
        Ok(())
    }
}

/// regenerate-and-restart：环境脚本、配置读取、重启钩子，严格按序
///
/// 三次远程操作没有回滚；中途失败留下的部分效果由日志暴露，
/// 交给外部编排补救。
pub struct RegenerateAndRestartHandler {
    ctx: HandlerContext,
}

impl RegenerateAndRestartHandler {
    pub fn new(ctx: HandlerContext) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl ActionHandler for RegenerateAndRestartHandler {
    fn action(&self) -> Action {
        Action::RegenerateAndRestart
    }

    async fn handle(&self, args: &[String]) -> Result<()> {
        let app = self.ctx.app(&args[0]).await?;
        let unit_names = &args[1..];
        // 执行目标可以是子集，但前置条件要求全部单元就绪
        target_units(&app, unit_names)?;
        let all_units: Vec<&Unit> = app.units.iter().collect();
        ensure_ready(&app, &all_units)?;

        let script = apprc_script(&app);
        self.ctx.provisioner.run(&script, &app, unit_names).await?;
        self.ctx
            .provisioner
            .run(&format!("cat {APP_CONF_PATH}"), &app, unit_names)
            .await?;
        self.ctx
            .provisioner
            .run(RESTART_HOOK, &app, unit_names)
            .await?;
        info!("已重新生成环境并重启: app={}", app.name);
        Ok(())
    }
}

/// bind-service：把已绑定服务实例的变量合并为私有环境变量
pub struct BindServiceHandler {
    ctx: HandlerContext,
}

impl BindServiceHandler {
    pub fn new(ctx: HandlerContext) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl ActionHandler for BindServiceHandler {
    fn action(&self) -> Action {
        Action::BindService
    }

    fn min_args(&self) -> usize {
        2
    }

    async fn handle(&self, args: &[String]) -> Result<()> {
        let app = self.ctx.app(&args[0]).await?;
        let unit_name = &args[1];
        let unit = app
            .unit_by_name(unit_name)
            .ok_or_else(|| HelmsmanError::UnitNotFound {
                app: app.name.clone(),
                unit: unit_name.clone(),
            })?;

        let instances = self.ctx.instances.find_bound_to_app(&app.name).await?;
        if instances.is_empty() {
            debug!("应用 {} 没有已绑定的服务实例", app.name);
            return Ok(());
        }

        // 读-改-写：基于刚读出的应用计算合并后的环境，再窄更新落盘
        let mut env = app.env.clone();
        for instance in &instances {
            let endpoint = instance.endpoint(DEFAULT_BIND_ENVIRONMENT).ok_or_else(|| {
                HelmsmanError::EndpointNotConfigured {
                    instance: instance.name.clone(),
                    environment: DEFAULT_BIND_ENVIRONMENT.to_string(),
                }
            })?;
            let vars = self.ctx.endpoint_client.fetch_env(endpoint).await?;
            for (name, value) in vars {
                env.insert(name.clone(), EnvVar::private(name, value));
            }
            info!(
                "服务实例 {} 已绑定: app={}, unit={}",
                instance.name, app.name, unit.name
            );
        }
        self.ctx.apps.update_env(&app.name, env).await?;
        Ok(())
    }
}
