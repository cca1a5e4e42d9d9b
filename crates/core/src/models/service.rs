use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// 服务绑定默认使用的端点环境
pub const DEFAULT_BIND_ENVIRONMENT: &str = "production";

/// 服务实例记录
///
/// 持有按环境区分的网络端点和团队归属；apps 列出已绑定的应用名。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceInstance {
    pub name: String,
    pub service_name: String,
    /// 环境名 -> 端点URL
    #[serde(default)]
    pub endpoints: BTreeMap<String, String>,
    #[serde(default)]
    pub apps: Vec<String>,
    #[serde(default)]
    pub teams: Vec<String>,
}

impl ServiceInstance {
    pub fn new(name: impl Into<String>, service_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            service_name: service_name.into(),
            endpoints: BTreeMap::new(),
            apps: Vec::new(),
            teams: Vec::new(),
        }
    }

    pub fn with_endpoint(
        mut self,
        environment: impl Into<String>,
        url: impl Into<String>,
    ) -> Self {
        self.endpoints.insert(environment.into(), url.into());
        self
    }

    /// 指定环境的端点URL
    pub fn endpoint(&self, environment: &str) -> Option<&str> {
        self.endpoints.get(environment).map(|s| s.as_str())
    }

    /// 实例是否把该应用列入已绑定集合
    pub fn is_bound_to(&self, app: &str) -> bool {
        self.apps.iter().any(|a| a == app)
    }

    /// 绑定一个应用，重复绑定是幂等的
    pub fn bind_app(&mut self, app: impl Into<String>) {
        let app = app.into();
        if !self.is_bound_to(&app) {
            self.apps.push(app);
        }
    }
}
