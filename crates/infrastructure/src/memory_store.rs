use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use helmsman_core::{
    App, AppRepository, EnvVar, HelmsmanError, Result, ServiceInstance,
    ServiceInstanceRepository,
};

/// 内存应用存储
///
/// 以应用名为键的文档表。save/update_env 在锁内完成，满足
/// 单文档原子读改写的假设。
#[derive(Debug, Clone, Default)]
pub struct InMemoryAppStore {
    apps: Arc<Mutex<HashMap<String, App>>>,
}

impl InMemoryAppStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_apps(apps: Vec<App>) -> Self {
        let map = apps.into_iter().map(|a| (a.name.clone(), a)).collect();
        Self {
            apps: Arc::new(Mutex::new(map)),
        }
    }

    pub fn count(&self) -> usize {
        self.apps.lock().unwrap().len()
    }

    pub fn clear(&self) {
        self.apps.lock().unwrap().clear();
    }
}

#[async_trait]
impl AppRepository for InMemoryAppStore {
    async fn get_by_name(&self, name: &str) -> Result<Option<App>> {
        let apps = self.apps.lock().unwrap();
        Ok(apps.get(name).cloned())
    }

    async fn save(&self, app: &App) -> Result<()> {
        let mut apps = self.apps.lock().unwrap();
        apps.insert(app.name.clone(), app.clone());
        Ok(())
    }

    async fn update_env(&self, name: &str, env: BTreeMap<String, EnvVar>) -> Result<()> {
        let mut apps = self.apps.lock().unwrap();
        let app = apps
            .get_mut(name)
            .ok_or_else(|| HelmsmanError::Store(format!("app {name:?} not found")))?;
        app.env = env;
        Ok(())
    }
}

/// 内存服务实例存储
#[derive(Debug, Clone, Default)]
pub struct InMemoryServiceInstanceStore {
    instances: Arc<Mutex<HashMap<String, ServiceInstance>>>,
}

impl InMemoryServiceInstanceStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_instances(instances: Vec<ServiceInstance>) -> Self {
        let map = instances
            .into_iter()
            .map(|i| (i.name.clone(), i))
            .collect();
        Self {
            instances: Arc::new(Mutex::new(map)),
        }
    }
}

#[async_trait]
impl ServiceInstanceRepository for InMemoryServiceInstanceStore {
    async fn get_by_name(&self, name: &str) -> Result<Option<ServiceInstance>> {
        let instances = self.instances.lock().unwrap();
        Ok(instances.get(name).cloned())
    }

    async fn find_bound_to_app(&self, app: &str) -> Result<Vec<ServiceInstance>> {
        let instances = self.instances.lock().unwrap();
        let mut bound: Vec<ServiceInstance> = instances
            .values()
            .filter(|i| i.is_bound_to(app))
            .cloned()
            .collect();
        bound.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(bound)
    }

    async fn save(&self, instance: &ServiceInstance) -> Result<()> {
        let mut instances = self.instances.lock().unwrap();
        instances.insert(instance.name.clone(), instance.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use helmsman_core::AppState;

    #[tokio::test]
    async fn test_app_store_round_trip() {
        let store = InMemoryAppStore::new();
        let app = App::new("nemesis", AppState::Started);
        store.save(&app).await.unwrap();
        let loaded = store.get_by_name("nemesis").await.unwrap().unwrap();
        assert_eq!(loaded.name, "nemesis");
        assert!(store.get_by_name("unknown").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update_env_only_touches_env() {
        let mut app = App::new("nemesis", AppState::Started);
        app.set_env(EnvVar::public("A", "1"));
        let store = InMemoryAppStore::with_apps(vec![app]);

        let mut env = BTreeMap::new();
        env.insert("B".to_string(), EnvVar::private("B", "2"));
        store.update_env("nemesis", env).await.unwrap();

        let loaded = store.get_by_name("nemesis").await.unwrap().unwrap();
        assert_eq!(loaded.state, AppState::Started);
        assert!(loaded.env.contains_key("B"));
        assert!(!loaded.env.contains_key("A"));
    }

    #[tokio::test]
    async fn test_update_env_missing_app_is_store_error() {
        let store = InMemoryAppStore::new();
        let err = store.update_env("ghost", BTreeMap::new()).await.unwrap_err();
        assert!(err.to_string().starts_with("store error"));
    }

    #[tokio::test]
    async fn test_find_bound_to_app() {
        let mut bound = ServiceInstance::new("my-mysql", "mysql");
        bound.bind_app("nemesis");
        let other = ServiceInstance::new("their-redis", "redis");
        let store = InMemoryServiceInstanceStore::with_instances(vec![bound, other]);

        let found = store.find_bound_to_app("nemesis").await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].name, "my-mysql");
        assert!(store.find_bound_to_app("totem").await.unwrap().is_empty());
    }
}
