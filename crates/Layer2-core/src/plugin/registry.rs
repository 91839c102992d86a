//! Plugin Registry - 플러그인 라이프사이클 관리
//!
//! 상태 전이: `pending → loading → {loaded | failed}`
//!
//! - 같은 id 의 동시 등록은 하나의 로드를 공유한다
//! - 의존성이 충족되지 않으면 로드를 시도하지 않고 `failed`
//! - 로드 중에 등록 해제되면 로드는 끝까지 진행되지만 결과는 버려지고 `unloaded`
//!
//! 잠금은 await 지점 바깥에서만 잡고, 리스너는 잠금을 놓은 뒤 호출한다.

use super::events::{RegistryEvent, RegistryListener};
use super::loader::RemotePluginLoader;
use super::manifest::PluginManifest;
use super::version::PluginVersion;
use crate::extension::Extension;
use extrt_foundation::event::plugin as diagnostics;
use extrt_foundation::{
    Diagnostic, DiagnosticBus, Error, ListenerId, Result, RuntimeConfig, PLUGIN_API_DEPENDENCY,
};
use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

type SharedLoad = Shared<BoxFuture<'static, PluginStatus>>;

// ============================================================================
// PluginStatus / PluginInfo
// ============================================================================

/// 플러그인 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PluginStatus {
    /// 등록됨, 의존성 확인 중
    Pending,
    /// 원격 엔트리 로드 중
    Loading,
    /// 로드 완료
    Loaded,
    /// 의존성 미충족 또는 로드 실패
    Failed,
    /// 로드 도중 등록 해제됨 (로드 결과에만 나타남)
    Unloaded,
}

impl PluginStatus {
    /// 종결 상태 여부
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending | Self::Loading)
    }
}

impl std::fmt::Display for PluginStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Loading => write!(f, "loading"),
            Self::Loaded => write!(f, "loaded"),
            Self::Failed => write!(f, "failed"),
            Self::Unloaded => write!(f, "unloaded"),
        }
    }
}

/// 소비자에게 노출되는 플러그인 정보
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginInfo {
    pub id: String,
    pub name: String,
    pub version: String,
    pub status: PluginStatus,
    pub enabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub extension_count: usize,
}

/// 레지스트리 요약
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RegistrySummary {
    pub total: usize,
    pub loaded: usize,
    pub failed: usize,
    /// pending + loading
    pub in_progress: usize,
    pub disabled: usize,
}

impl RegistrySummary {
    /// 모든 플러그인이 로드되었는지
    pub fn all_loaded(&self) -> bool {
        self.loaded == self.total
    }
}

// ============================================================================
// PluginRecord - 내부 레코드
// ============================================================================

struct PluginRecord {
    manifest: Arc<PluginManifest>,
    status: PluginStatus,
    enabled: bool,
    error: Option<String>,
    extensions: Vec<Arc<Extension>>,
    /// 등록마다 새로 발급. 오래된 로드가 결과를 기록하지 못하게 막는다
    generation: u64,
    load_order: u64,
    inflight: Option<SharedLoad>,
}

impl PluginRecord {
    fn info(&self) -> PluginInfo {
        PluginInfo {
            id: self.manifest.id.clone(),
            name: self.manifest.name.clone(),
            version: self.manifest.version.to_string(),
            status: self.status,
            enabled: self.enabled,
            error: self.error.clone(),
            extension_count: self.extensions.len(),
        }
    }
}

// ============================================================================
// PluginRegistry
// ============================================================================

pub struct PluginRegistry {
    plugins: RwLock<HashMap<String, PluginRecord>>,
    loader: Arc<RemotePluginLoader>,
    diagnostics: Arc<DiagnosticBus>,
    host_api_version: PluginVersion,
    load_timeout: Option<Duration>,

    listeners: RwLock<Vec<(ListenerId, RegistryListener)>>,
    next_generation: AtomicU64,
    next_order: AtomicU64,
    next_listener_id: AtomicU64,
}

impl PluginRegistry {
    pub fn new(
        loader: Arc<RemotePluginLoader>,
        diagnostics: Arc<DiagnosticBus>,
        config: &RuntimeConfig,
    ) -> Result<Self> {
        let host_api_version = PluginVersion::parse(&config.host_api_version).ok_or_else(|| {
            Error::Config(format!(
                "invalid host API version '{}'",
                config.host_api_version
            ))
        })?;

        Ok(Self {
            plugins: RwLock::new(HashMap::new()),
            loader,
            diagnostics,
            host_api_version,
            load_timeout: config.load_timeout(),
            listeners: RwLock::new(Vec::new()),
            next_generation: AtomicU64::new(1),
            next_order: AtomicU64::new(0),
            next_listener_id: AtomicU64::new(1),
        })
    }

    // ========================================================================
    // 등록 / 해제
    // ========================================================================

    /// 플러그인 등록 및 로드
    ///
    /// 종결 상태가 될 때까지 기다린 뒤 그 상태를 돌려준다. 이미 등록된 id 는
    /// 진행 중인 로드에 합류하거나 기존 종결 상태를 그대로 반환한다.
    /// 로드는 별도 task 에서 진행되므로 호출자가 취소되어도 멈추지 않는다.
    pub async fn register(self: &Arc<Self>, manifest: PluginManifest) -> PluginStatus {
        let existing = {
            let plugins = self.plugins.read();
            plugins
                .get(&manifest.id)
                .map(|r| (r.status, r.inflight.clone()))
        };
        if let Some((status, inflight)) = existing {
            debug!(plugin = %manifest.id, %status, "Plugin already registered");
            return Self::join(status, inflight).await;
        }

        if let Err(e) = manifest.validate() {
            warn!("Rejected plugin manifest '{}': {}", manifest.id, e);
            self.diagnostics
                .publish(diagnostics::invalid_manifest(&manifest.id, e.to_string()));
            if manifest.id.trim().is_empty() {
                return PluginStatus::Failed;
            }
            return self.insert_failed(manifest, e);
        }

        let manifest = Arc::new(manifest);
        let plugin_id = manifest.id.clone();
        let generation = self.next_generation.fetch_add(1, Ordering::SeqCst);

        let started = {
            let mut plugins = self.plugins.write();
            // 검증 중에 다른 호출자가 먼저 등록했을 수 있다
            if let Some(record) = plugins.get(&plugin_id) {
                Err((record.status, record.inflight.clone()))
            } else {
                let load = Self::run_load(self.clone(), manifest.clone(), generation)
                    .boxed()
                    .shared();
                plugins.insert(
                    plugin_id.clone(),
                    PluginRecord {
                        manifest,
                        status: PluginStatus::Pending,
                        enabled: true,
                        error: None,
                        extensions: Vec::new(),
                        generation,
                        load_order: self.next_order.fetch_add(1, Ordering::SeqCst),
                        inflight: Some(load.clone()),
                    },
                );
                Ok(load)
            }
        };

        let load = match started {
            Ok(load) => load,
            Err((status, inflight)) => return Self::join(status, inflight).await,
        };

        info!("Registered plugin: {}", plugin_id);
        tokio::spawn(load.clone());
        load.await
    }

    /// 기존 레코드에 합류 (진행 중이면 같은 로드를 기다림)
    async fn join(status: PluginStatus, inflight: Option<SharedLoad>) -> PluginStatus {
        match inflight {
            Some(load) if !status.is_terminal() => load.await,
            _ => status,
        }
    }

    /// 등록 해제
    ///
    /// 로드 중이었다면 로드는 계속되지만 그 결과는 기록되지 않는다.
    pub fn unregister(&self, plugin_id: &str) -> bool {
        let previous = {
            let mut plugins = self.plugins.write();
            let Some(record) = plugins.remove(plugin_id) else {
                return false;
            };
            if record.status.is_terminal() {
                self.loader.release(plugin_id);
            }
            record.status
        };

        info!(%previous, "Unregistered plugin: {}", plugin_id);
        self.notify(&RegistryEvent::Unregistered {
            plugin_id: plugin_id.to_string(),
            previous,
        });
        true
    }

    /// 로드된 플러그인의 익스텐션 사용 여부 변경
    pub fn set_enabled(&self, plugin_id: &str, enabled: bool) -> Result<bool> {
        let changed = {
            let mut plugins = self.plugins.write();
            let record = plugins
                .get_mut(plugin_id)
                .ok_or_else(|| Error::NotFound(format!("plugin '{}'", plugin_id)))?;
            let changed = record.enabled != enabled;
            record.enabled = enabled;
            changed
        };

        if changed {
            info!(enabled, "Plugin {} {}", plugin_id, if enabled { "enabled" } else { "disabled" });
            self.notify(&RegistryEvent::EnabledChanged {
                plugin_id: plugin_id.to_string(),
                enabled,
            });
        }
        Ok(changed)
    }

    // ========================================================================
    // 조회
    // ========================================================================

    /// 등록 순서대로 플러그인 정보
    pub fn get_plugin_info(&self) -> Vec<PluginInfo> {
        let plugins = self.plugins.read();
        let mut records: Vec<&PluginRecord> = plugins.values().collect();
        records.sort_by_key(|r| r.load_order);
        records.into_iter().map(PluginRecord::info).collect()
    }

    pub fn plugin_info(&self, plugin_id: &str) -> Option<PluginInfo> {
        self.plugins.read().get(plugin_id).map(PluginRecord::info)
    }

    pub fn status(&self, plugin_id: &str) -> Option<PluginStatus> {
        self.plugins.read().get(plugin_id).map(|r| r.status)
    }

    pub fn summary(&self) -> RegistrySummary {
        let plugins = self.plugins.read();
        let mut summary = RegistrySummary {
            total: plugins.len(),
            ..Default::default()
        };
        for record in plugins.values() {
            match record.status {
                PluginStatus::Loaded => summary.loaded += 1,
                PluginStatus::Failed | PluginStatus::Unloaded => summary.failed += 1,
                PluginStatus::Pending | PluginStatus::Loading => summary.in_progress += 1,
            }
            if !record.enabled {
                summary.disabled += 1;
            }
        }
        summary
    }

    /// 로드되고 활성화된 플러그인의 익스텐션 (등록 순서, 선언 순서)
    pub fn extensions(&self) -> Vec<Arc<Extension>> {
        let plugins = self.plugins.read();
        let mut records: Vec<&PluginRecord> = plugins
            .values()
            .filter(|r| r.status == PluginStatus::Loaded && r.enabled)
            .collect();
        records.sort_by_key(|r| r.load_order);
        records
            .into_iter()
            .flat_map(|r| r.extensions.iter().cloned())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.plugins.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.read().is_empty()
    }

    // ========================================================================
    // 리스너
    // ========================================================================

    pub fn subscribe(&self, listener: RegistryListener) -> ListenerId {
        let id = ListenerId::new(self.next_listener_id.fetch_add(1, Ordering::SeqCst));
        self.listeners.write().push((id, listener));
        id
    }

    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.write();
        let before = listeners.len();
        listeners.retain(|(lid, _)| *lid != id);
        listeners.len() != before
    }

    fn notify(&self, event: &RegistryEvent) {
        let listeners: Vec<RegistryListener> =
            self.listeners.read().iter().map(|(_, l)| l.clone()).collect();
        for listener in listeners {
            listener(event);
        }
    }

    // ========================================================================
    // 로드 파이프라인
    // ========================================================================

    async fn run_load(
        self: Arc<Self>,
        manifest: Arc<PluginManifest>,
        generation: u64,
    ) -> PluginStatus {
        let plugin_id = manifest.id.as_str();

        if let Err(e) = self.check_dependencies(&manifest).await {
            return self.finish(plugin_id, generation, Err(e));
        }

        if !self.transition(plugin_id, generation, PluginStatus::Loading) {
            return self.finish(plugin_id, generation, Ok(Vec::new()));
        }

        let load = self.loader.load(&manifest);
        let result = match self.load_timeout {
            Some(timeout) => match tokio::time::timeout(timeout, load).await {
                Ok(result) => result,
                Err(_) => Err(Error::Timeout(format!(
                    "{} did not load within {}ms",
                    plugin_id,
                    timeout.as_millis()
                ))),
            },
            None => load.await,
        };

        self.finish(plugin_id, generation, result)
    }

    /// 의존성 확인
    ///
    /// 아직 로드 중인 의존성은 그 결과를 기다린 뒤 판정한다.
    async fn check_dependencies(&self, manifest: &PluginManifest) -> Result<()> {
        for dep in &manifest.dependencies {
            if dep.id == PLUGIN_API_DEPENDENCY {
                if !dep.version_range.matches(&self.host_api_version) {
                    return Err(Error::dependency(
                        &manifest.id,
                        &dep.id,
                        format!(
                            "host API {} does not satisfy {}",
                            self.host_api_version, dep.version_range
                        ),
                    ));
                }
                continue;
            }

            let snapshot = {
                let plugins = self.plugins.read();
                plugins.get(&dep.id).map(|r| {
                    (r.status, r.manifest.version.clone(), r.inflight.clone())
                })
            };
            let Some((status, version, inflight)) = snapshot else {
                return Err(Error::dependency(&manifest.id, &dep.id, "not registered"));
            };

            let status = match (status.is_terminal(), inflight) {
                (false, Some(load)) => {
                    if self.depends_on(&dep.id, &manifest.id) {
                        return Err(Error::dependency(
                            &manifest.id,
                            &dep.id,
                            "circular dependency",
                        ));
                    }
                    debug!(plugin = %manifest.id, dependency = %dep.id, "Waiting for dependency");
                    load.await
                }
                _ => status,
            };

            if status != PluginStatus::Loaded {
                return Err(Error::dependency(
                    &manifest.id,
                    &dep.id,
                    format!("dependency is {}", status),
                ));
            }

            if !dep.version_range.matches(&version) {
                return Err(Error::dependency(
                    &manifest.id,
                    &dep.id,
                    format!("version {} does not satisfy {}", version, dep.version_range),
                ));
            }
        }

        Ok(())
    }

    /// from 이 (간접적으로라도) target 에 의존하는지
    fn depends_on(&self, from: &str, target: &str) -> bool {
        let plugins = self.plugins.read();
        let mut stack = vec![from.to_string()];
        let mut visited = HashSet::new();

        while let Some(id) = stack.pop() {
            if id == target {
                return true;
            }
            if !visited.insert(id.clone()) {
                continue;
            }
            if let Some(record) = plugins.get(&id) {
                stack.extend(record.manifest.dependencies.iter().map(|d| d.id.clone()));
            }
        }

        false
    }

    /// 진행 중 상태 전이. 등록이 해제/교체되었으면 false
    fn transition(&self, plugin_id: &str, generation: u64, status: PluginStatus) -> bool {
        let previous = {
            let mut plugins = self.plugins.write();
            match plugins.get_mut(plugin_id) {
                Some(record) if record.generation == generation => {
                    let previous = record.status;
                    record.status = status;
                    previous
                }
                _ => return false,
            }
        };

        debug!(plugin = plugin_id, %previous, %status, "Plugin status changed");
        self.notify(&RegistryEvent::StatusChanged {
            plugin_id: plugin_id.to_string(),
            previous,
            status,
        });
        true
    }

    /// 로드 결과 기록
    fn finish(
        &self,
        plugin_id: &str,
        generation: u64,
        result: Result<Vec<Extension>>,
    ) -> PluginStatus {
        let committed = {
            let mut plugins = self.plugins.write();
            match plugins.get_mut(plugin_id) {
                Some(record) if record.generation == generation => {
                    let previous = record.status;
                    record.inflight = None;
                    match &result {
                        Ok(extensions) => {
                            record.status = PluginStatus::Loaded;
                            record.error = None;
                            record.extensions =
                                extensions.iter().cloned().map(Arc::new).collect();
                        }
                        Err(e) => {
                            record.status = PluginStatus::Failed;
                            record.error = Some(e.to_string());
                            record.extensions.clear();
                        }
                    }
                    Some((previous, record.status))
                }
                Some(_) => None,
                None => {
                    // 잠금 안에서 해제해야 재등록된 컨테이너를 지우지 않는다
                    self.loader.release(plugin_id);
                    None
                }
            }
        };

        let Some((previous, status)) = committed else {
            info!("Discarded load result of unregistered plugin: {}", plugin_id);
            return PluginStatus::Unloaded;
        };

        match &result {
            Ok(extensions) => {
                info!(extensions = extensions.len(), "Plugin loaded: {}", plugin_id);
            }
            Err(e) => {
                warn!("Plugin {} failed: {}", plugin_id, e);
                self.diagnostics.publish(failure_diagnostic(plugin_id, e));
            }
        }

        self.notify(&RegistryEvent::StatusChanged {
            plugin_id: plugin_id.to_string(),
            previous,
            status,
        });
        status
    }

    /// 검증 실패한 매니페스트를 failed 로 기록
    fn insert_failed(&self, manifest: PluginManifest, error: Error) -> PluginStatus {
        let plugin_id = manifest.id.clone();
        let inserted = {
            let mut plugins = self.plugins.write();
            if plugins.contains_key(&plugin_id) {
                false
            } else {
                plugins.insert(
                    plugin_id.clone(),
                    PluginRecord {
                        manifest: Arc::new(manifest),
                        status: PluginStatus::Failed,
                        enabled: true,
                        error: Some(error.to_string()),
                        extensions: Vec::new(),
                        generation: self.next_generation.fetch_add(1, Ordering::SeqCst),
                        load_order: self.next_order.fetch_add(1, Ordering::SeqCst),
                        inflight: None,
                    },
                );
                true
            }
        };

        if inserted {
            self.notify(&RegistryEvent::StatusChanged {
                plugin_id,
                previous: PluginStatus::Pending,
                status: PluginStatus::Failed,
            });
            PluginStatus::Failed
        } else {
            self.status(&plugin_id).unwrap_or(PluginStatus::Failed)
        }
    }
}

fn failure_diagnostic(plugin_id: &str, error: &Error) -> Diagnostic {
    match error {
        Error::DependencyUnsatisfied { .. } => {
            diagnostics::dependency_unsatisfied(plugin_id, error.to_string())
        }
        _ => diagnostics::load_failed(plugin_id, error.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module::{ModuleExports, ModuleLoader, StaticContainer, StaticModuleLoader};
    use crate::plugin::{ExtensionDeclaration, PluginDependency};
    use async_trait::async_trait;
    use extrt_foundation::DiagnosticCode;
    use parking_lot::Mutex;
    use serde_json::json;
    use std::sync::{OnceLock, Weak};

    fn registry(modules: Arc<StaticModuleLoader>, config: RuntimeConfig) -> Arc<PluginRegistry> {
        let loader = Arc::new(RemotePluginLoader::new(modules));
        Arc::new(PluginRegistry::new(loader, Arc::new(DiagnosticBus::new()), &config).unwrap())
    }

    fn modules(ids: &[&str]) -> Arc<StaticModuleLoader> {
        let loader = StaticModuleLoader::new();
        for id in ids {
            loader.add_container(*id, StaticContainer::new());
        }
        Arc::new(loader)
    }

    fn manifest(id: &str) -> PluginManifest {
        PluginManifest::new(id, id)
            .with_extension(ExtensionDeclaration::new("console.page/route", json!({ "path": "/" })))
    }

    #[tokio::test]
    async fn test_register_loads_plugin() {
        let registry = registry(modules(&["a"]), RuntimeConfig::default());

        assert_eq!(registry.register(manifest("a")).await, PluginStatus::Loaded);
        assert_eq!(registry.extensions().len(), 1);

        let info = registry.get_plugin_info();
        assert_eq!(info[0].id, "a");
        assert_eq!(info[0].extension_count, 1);
        assert!(registry.summary().all_loaded());
    }

    #[tokio::test]
    async fn test_missing_container_fails() {
        let registry = registry(modules(&[]), RuntimeConfig::default());

        assert_eq!(registry.register(manifest("a")).await, PluginStatus::Failed);
        assert!(registry.extensions().is_empty());
        assert!(registry.plugin_info("a").unwrap().error.is_some());
        assert_eq!(
            registry.diagnostics.history_by_code(DiagnosticCode::LoadFailure).len(),
            1
        );
    }

    #[tokio::test]
    async fn test_dependency_version_checked() {
        let registry = registry(modules(&["base", "ext"]), RuntimeConfig::default());
        registry
            .register(manifest("base").with_version(PluginVersion::new(1, 4, 0)))
            .await;

        let too_new = manifest("ext").with_dependency(PluginDependency::parse("base", "^2.0.0").unwrap());
        assert_eq!(registry.register(too_new).await, PluginStatus::Failed);
        assert_eq!(
            registry
                .diagnostics
                .history_by_code(DiagnosticCode::DependencyUnsatisfied)
                .len(),
            1
        );
    }

    #[tokio::test]
    async fn test_plugin_api_dependency() {
        let config = RuntimeConfig::default().with_host_api_version("4.15.2");
        let registry = registry(modules(&["ok", "old"]), config);

        let ok = manifest("ok").with_dependency(PluginDependency::parse(PLUGIN_API_DEPENDENCY, "^4.14.0").unwrap());
        let old = manifest("old").with_dependency(PluginDependency::parse(PLUGIN_API_DEPENDENCY, "<4.0.0").unwrap());

        assert_eq!(registry.register(ok).await, PluginStatus::Loaded);
        assert_eq!(registry.register(old).await, PluginStatus::Failed);
    }

    #[tokio::test]
    async fn test_waits_for_loading_dependency() {
        let modules = Arc::new(
            StaticModuleLoader::new()
                .with_container("base", StaticContainer::new())
                .with_container("ext", StaticContainer::new())
                .with_latency(Duration::from_millis(20)),
        );
        let registry = registry(modules, RuntimeConfig::default());
        let ext = manifest("ext").with_dependency(PluginDependency::parse("base", "*").unwrap());

        let (base, ext) = tokio::join!(registry.register(manifest("base")), async {
            tokio::task::yield_now().await;
            registry.register(ext).await
        });

        assert_eq!(base, PluginStatus::Loaded);
        assert_eq!(ext, PluginStatus::Loaded);
    }

    #[tokio::test]
    async fn test_mutual_dependencies_never_load() {
        let modules = Arc::new(
            StaticModuleLoader::new()
                .with_container("a", StaticContainer::new())
                .with_container("b", StaticContainer::new())
                .with_latency(Duration::from_millis(10)),
        );
        let registry = registry(modules, RuntimeConfig::default());
        let a = manifest("a").with_dependency(PluginDependency::parse("b", "*").unwrap());
        let b = manifest("b").with_dependency(PluginDependency::parse("a", "*").unwrap());

        let (a, b) = tokio::join!(registry.register(a), registry.register(b));
        assert_eq!(a, PluginStatus::Failed);
        assert_eq!(b, PluginStatus::Failed);
    }

    #[tokio::test]
    async fn test_invalid_manifest_recorded_as_failed() {
        let registry = registry(modules(&["bad"]), RuntimeConfig::default());
        let bad = manifest("bad").with_remote_entry("::not a url::");

        assert_eq!(registry.register(bad).await, PluginStatus::Failed);
        assert_eq!(registry.status("bad"), Some(PluginStatus::Failed));
        assert_eq!(registry.register(PluginManifest::new("", "")).await, PluginStatus::Failed);
        assert_eq!(registry.len(), 1);
    }

    /// release 호출 시점에 레지스트리 잠금이 잡혀 있었는지 기록하는 로더
    struct ReleaseWatcher {
        inner: StaticModuleLoader,
        registry: OnceLock<Weak<PluginRegistry>>,
        released_under_lock: Mutex<Vec<bool>>,
    }

    #[async_trait]
    impl ModuleLoader for ReleaseWatcher {
        fn name(&self) -> &str {
            "release-watcher"
        }

        async fn init_shared_scope(&self) -> Result<()> {
            self.inner.init_shared_scope().await
        }

        async fn load_entry(&self, manifest: &PluginManifest) -> Result<()> {
            self.inner.load_entry(manifest).await
        }

        async fn load_module(&self, plugin_id: &str, module_id: &str) -> Result<ModuleExports> {
            self.inner.load_module(plugin_id, module_id).await
        }

        fn release(&self, plugin_id: &str) {
            let locked = self
                .registry
                .get()
                .and_then(Weak::upgrade)
                .map(|registry| registry.plugins.try_write().is_none())
                .unwrap_or(false);
            self.released_under_lock.lock().push(locked);
            self.inner.release(plugin_id);
        }
    }

    #[tokio::test]
    async fn test_release_happens_under_registry_lock() {
        let watcher = Arc::new(ReleaseWatcher {
            inner: StaticModuleLoader::new()
                .with_container("a", StaticContainer::new())
                .with_latency(Duration::from_millis(20)),
            registry: OnceLock::new(),
            released_under_lock: Mutex::new(Vec::new()),
        });
        let loader = Arc::new(RemotePluginLoader::new(watcher.clone()));
        let registry = Arc::new(
            PluginRegistry::new(loader, Arc::new(DiagnosticBus::new()), &RuntimeConfig::default())
                .unwrap(),
        );
        let _ = watcher.registry.set(Arc::downgrade(&registry));

        // 로드 중 unregister: 로드가 끝날 때 해제
        let pending = tokio::spawn({
            let registry = registry.clone();
            async move { registry.register(manifest("a")).await }
        });
        tokio::time::sleep(Duration::from_millis(5)).await;
        assert!(registry.unregister("a"));
        assert_eq!(pending.await.unwrap(), PluginStatus::Unloaded);
        assert!(!watcher.inner.is_loaded("a"));

        // 로드 완료 후 unregister: 즉시 해제
        assert_eq!(registry.register(manifest("a")).await, PluginStatus::Loaded);
        assert!(registry.unregister("a"));

        assert_eq!(*watcher.released_under_lock.lock(), vec![true, true]);
    }

    #[tokio::test]
    async fn test_load_timeout() {
        let modules = Arc::new(
            StaticModuleLoader::new()
                .with_container("slow", StaticContainer::new())
                .with_latency(Duration::from_millis(200)),
        );
        let config = RuntimeConfig::default().with_load_timeout(Duration::from_millis(10));
        let registry = registry(modules, config);

        assert_eq!(registry.register(manifest("slow")).await, PluginStatus::Failed);
        let error = registry.plugin_info("slow").unwrap().error.unwrap();
        assert!(error.contains("Timeout"));
    }

    #[tokio::test]
    async fn test_events_and_enabled() {
        let registry = registry(modules(&["a"]), RuntimeConfig::default());
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        registry.subscribe(Arc::new(move |e: &RegistryEvent| sink.lock().push(e.clone())));

        registry.register(manifest("a")).await;
        assert!(registry.set_enabled("a", false).unwrap());
        assert!(!registry.set_enabled("a", false).unwrap());
        assert!(registry.extensions().is_empty());
        assert!(registry.set_enabled("missing", true).is_err());
        assert!(registry.unregister("a"));
        assert!(!registry.unregister("a"));

        let events = events.lock();
        let statuses: Vec<PluginStatus> = events
            .iter()
            .filter_map(|e| match e {
                RegistryEvent::StatusChanged { status, .. } => Some(*status),
                _ => None,
            })
            .collect();
        assert_eq!(statuses, vec![PluginStatus::Loading, PluginStatus::Loaded]);
        assert!(matches!(events.last(), Some(RegistryEvent::Unregistered { .. })));
    }
}
