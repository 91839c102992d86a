//! Static Module Loader - 메모리 내 컨테이너 테이블
//!
//! 네트워크 없이 플러그인 컨테이너를 제공한다. 호스트에 번들된 플러그인이나
//! 테스트에서 로드 횟수를 관찰할 때 사용한다.

use super::traits::{ModuleExports, ModuleLoader};
use crate::plugin::PluginManifest;
use async_trait::async_trait;
use extrt_foundation::{Error, Result, DEFAULT_SHARED_MODULES};
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use tracing::debug;

/// 플러그인 하나의 컨테이너 정의
#[derive(Debug, Clone, Default)]
pub struct StaticContainer {
    modules: HashMap<String, ModuleExports>,
    required_shared: Vec<String>,
}

impl StaticContainer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_module(mut self, module_id: impl Into<String>, exports: ModuleExports) -> Self {
        self.modules.insert(module_id.into(), exports);
        self
    }

    /// 컨테이너가 요구하는 shared 모듈
    pub fn requires_shared(mut self, name: impl Into<String>) -> Self {
        self.required_shared.push(name.into());
        self
    }
}

/// 정적 컨테이너 로더
pub struct StaticModuleLoader {
    containers: RwLock<HashMap<String, StaticContainer>>,
    shared_modules: HashSet<String>,
    latency: Option<Duration>,

    shared_scope_ready: AtomicBool,
    shared_scope_failure: RwLock<Option<String>>,
    entry_failures: RwLock<HashMap<String, String>>,
    loaded: RwLock<HashSet<String>>,

    shared_scope_inits: AtomicUsize,
    entry_loads: RwLock<HashMap<String, usize>>,
    module_loads: RwLock<HashMap<(String, String), usize>>,
}

impl StaticModuleLoader {
    pub fn new() -> Self {
        Self {
            containers: RwLock::new(HashMap::new()),
            shared_modules: DEFAULT_SHARED_MODULES.iter().map(|s| s.to_string()).collect(),
            latency: None,
            shared_scope_ready: AtomicBool::new(false),
            shared_scope_failure: RwLock::new(None),
            entry_failures: RwLock::new(HashMap::new()),
            loaded: RwLock::new(HashSet::new()),
            shared_scope_inits: AtomicUsize::new(0),
            entry_loads: RwLock::new(HashMap::new()),
            module_loads: RwLock::new(HashMap::new()),
        }
    }

    /// 빌더 패턴: 컨테이너 추가
    pub fn with_container(self, plugin_id: impl Into<String>, container: StaticContainer) -> Self {
        self.add_container(plugin_id, container);
        self
    }

    /// 빌더 패턴: 모든 로드에 지연 추가
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// 빌더 패턴: 제공할 shared 모듈 목록 교체
    pub fn with_shared_modules<I, S>(mut self, modules: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.shared_modules = modules.into_iter().map(Into::into).collect();
        self
    }

    pub fn add_container(&self, plugin_id: impl Into<String>, container: StaticContainer) {
        self.containers.write().insert(plugin_id.into(), container);
    }

    /// 다음 엔트리 로드를 실패시킴
    pub fn fail_entry(&self, plugin_id: impl Into<String>, message: impl Into<String>) {
        self.entry_failures
            .write()
            .insert(plugin_id.into(), message.into());
    }

    /// shared scope 초기화를 실패시킴
    pub fn fail_shared_scope(&self, message: impl Into<String>) {
        *self.shared_scope_failure.write() = Some(message.into());
    }

    pub fn shared_scope_init_count(&self) -> usize {
        self.shared_scope_inits.load(Ordering::SeqCst)
    }

    pub fn entry_load_count(&self, plugin_id: &str) -> usize {
        self.entry_loads.read().get(plugin_id).copied().unwrap_or(0)
    }

    pub fn module_load_count(&self, plugin_id: &str, module_id: &str) -> usize {
        self.module_loads
            .read()
            .get(&(plugin_id.to_string(), module_id.to_string()))
            .copied()
            .unwrap_or(0)
    }

    pub fn is_loaded(&self, plugin_id: &str) -> bool {
        self.loaded.read().contains(plugin_id)
    }

    async fn simulate_latency(&self) {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }
}

impl Default for StaticModuleLoader {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ModuleLoader for StaticModuleLoader {
    fn name(&self) -> &str {
        "static"
    }

    async fn init_shared_scope(&self) -> Result<()> {
        self.shared_scope_inits.fetch_add(1, Ordering::SeqCst);

        if let Some(message) = self.shared_scope_failure.read().clone() {
            return Err(Error::SharedScope(message));
        }

        self.shared_scope_ready.store(true, Ordering::SeqCst);
        debug!(modules = self.shared_modules.len(), "Static shared scope ready");
        Ok(())
    }

    async fn load_entry(&self, manifest: &PluginManifest) -> Result<()> {
        let plugin_id = manifest.id.as_str();
        *self
            .entry_loads
            .write()
            .entry(plugin_id.to_string())
            .or_insert(0) += 1;

        self.simulate_latency().await;

        if !self.shared_scope_ready.load(Ordering::SeqCst) {
            return Err(Error::SharedScope(
                "shared scope used before initialization".into(),
            ));
        }

        if let Some(message) = self.entry_failures.read().get(plugin_id).cloned() {
            return Err(Error::load_failure(plugin_id, message));
        }

        let required_shared = match self.containers.read().get(plugin_id) {
            Some(container) => container.required_shared.clone(),
            None => {
                return Err(Error::load_failure(
                    plugin_id,
                    format!("no container registered at {}", manifest.remote_entry_url),
                ))
            }
        };

        if let Some(missing) = required_shared
            .iter()
            .find(|name| !self.shared_modules.contains(*name))
        {
            return Err(Error::load_failure(
                plugin_id,
                format!("shared module '{}' is not provided", missing),
            ));
        }

        self.loaded.write().insert(plugin_id.to_string());
        Ok(())
    }

    async fn load_module(&self, plugin_id: &str, module_id: &str) -> Result<ModuleExports> {
        *self
            .module_loads
            .write()
            .entry((plugin_id.to_string(), module_id.to_string()))
            .or_insert(0) += 1;

        self.simulate_latency().await;

        if !self.is_loaded(plugin_id) {
            return Err(Error::NotFound(format!(
                "container for plugin '{}' is not loaded",
                plugin_id
            )));
        }

        self.containers
            .read()
            .get(plugin_id)
            .and_then(|c| c.modules.get(module_id).cloned())
            .ok_or_else(|| {
                Error::NotFound(format!("module '{}' in plugin '{}'", module_id, plugin_id))
            })
    }

    fn release(&self, plugin_id: &str) {
        self.loaded.write().remove(plugin_id);
    }
}
