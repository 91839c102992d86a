//! Runtime - 확장 런타임 통합 인터페이스
//!
//! 레지스트리, 로더, resolver, flag 저장소, 익스텐션 저장소를 하나로 묶는다.
//! 전역 싱글톤이 없으므로 테스트마다 독립된 런타임을 만들 수 있다.
//!
//! ## 사용 예시
//! ```ignore
//! let config = ConfigLoader::new(&cwd).load()?;
//! let modules = Arc::new(HttpModuleLoader::new(&config)?);
//! let runtime = Runtime::new(config, modules)?;
//!
//! runtime.register_from_url("https://plugins.example.com/acme").await?;
//! runtime.set_flag("ACME_ENABLED", Some(true));
//!
//! let pages = runtime.get_resolved_extensions(predicates::is_page).await;
//! ```

use crate::extension::{
    ChangeListener, CodeRefResolver, CodeReference, Extension, ExtensionPredicate,
    ExtensionStore, FeatureFlags, FlagChange, ResolveResult, ResolvedChangeListener,
    ResolvedExtension,
};
use crate::module::ModuleLoader;
use crate::plugin::{
    PluginInfo, PluginManifest, PluginRegistry, PluginStatus, RegistryEvent, RegistrySummary,
    RemotePluginLoader,
};
use extrt_foundation::event::plugin as diagnostics;
use extrt_foundation::{
    DiagnosticBus, DiagnosticBusConfig, ListenerId, Result, RuntimeConfig,
};
use std::sync::Arc;
use tracing::{info, warn};

pub struct Runtime {
    config: RuntimeConfig,
    modules: Arc<dyn ModuleLoader>,
    diagnostics: Arc<DiagnosticBus>,
    flags: Arc<FeatureFlags>,
    resolver: Arc<CodeRefResolver>,
    registry: Arc<PluginRegistry>,
    store: Arc<ExtensionStore>,
}

impl Runtime {
    /// 설정과 모듈 로더로 런타임 구성
    pub fn new(config: RuntimeConfig, modules: Arc<dyn ModuleLoader>) -> Result<Self> {
        let diagnostics = Arc::new(DiagnosticBus::with_config(DiagnosticBusConfig {
            history_size: config.diagnostic_history,
            ..Default::default()
        }));
        let flags = Arc::new(FeatureFlags::with_initial(&config.initial_flags));
        let resolver = Arc::new(CodeRefResolver::new(modules.clone(), diagnostics.clone()));
        let loader = Arc::new(RemotePluginLoader::new(modules.clone()));
        let registry = Arc::new(PluginRegistry::new(loader, diagnostics.clone(), &config)?);
        let store = Arc::new(ExtensionStore::new(
            registry.clone(),
            flags.clone(),
            resolver.clone(),
            diagnostics.clone(),
        ));

        // 레지스트리 → resolver 무효화, store 재계산
        {
            let store = Arc::downgrade(&store);
            let resolver = Arc::downgrade(&resolver);
            registry.subscribe(Arc::new(move |event: &RegistryEvent| {
                if event.invalidates_resolutions() {
                    if let Some(resolver) = resolver.upgrade() {
                        resolver.invalidate_plugin(event.plugin_id());
                    }
                }
                if event.affects_extensions() {
                    if let Some(store) = store.upgrade() {
                        store.recompute();
                    }
                }
            }));
        }

        // flag → store 재계산
        {
            let store = Arc::downgrade(&store);
            flags.subscribe(Arc::new(move |_: &[FlagChange]| {
                if let Some(store) = store.upgrade() {
                    store.recompute();
                }
            }));
        }

        // 해석 완료 → store 재계산 (해석 구독자에게 전달)
        {
            let store = Arc::downgrade(&store);
            resolver.subscribe(Arc::new(move |_: &str| {
                if let Some(store) = store.upgrade() {
                    store.recompute();
                }
            }));
        }

        info!(
            loader = modules.name(),
            host_api = %config.host_api_version,
            "Extension runtime initialized"
        );

        Ok(Self {
            config,
            modules,
            diagnostics,
            flags,
            resolver,
            registry,
            store,
        })
    }

    // ========================================================================
    // 플러그인
    // ========================================================================

    /// 매니페스트 등록 (종결 상태까지 대기)
    pub async fn register(&self, manifest: PluginManifest) -> PluginStatus {
        self.registry.register(manifest).await
    }

    /// `{base_url}/plugin-manifest.json` 을 가져와 등록
    pub async fn register_from_url(&self, base_url: &str) -> Result<PluginStatus> {
        let manifest = match self.modules.fetch_manifest(base_url).await {
            Ok(manifest) => manifest,
            Err(e) => {
                warn!("Failed to fetch plugin manifest from {}: {}", base_url, e);
                self.diagnostics
                    .publish(diagnostics::load_failed(base_url, e.to_string()));
                return Err(e);
            }
        };
        Ok(self.register(manifest).await)
    }

    pub fn unregister(&self, plugin_id: &str) -> bool {
        self.registry.unregister(plugin_id)
    }

    pub fn set_plugin_enabled(&self, plugin_id: &str, enabled: bool) -> Result<bool> {
        self.registry.set_enabled(plugin_id, enabled)
    }

    /// 등록 순서대로 플러그인 정보
    pub fn plugin_info(&self) -> Vec<PluginInfo> {
        self.registry.get_plugin_info()
    }

    pub fn health(&self) -> RegistrySummary {
        self.registry.summary()
    }

    // ========================================================================
    // Feature Flag
    // ========================================================================

    pub fn set_flag(&self, name: impl Into<String>, value: Option<bool>) -> bool {
        self.flags.set_flag(name, value)
    }

    pub fn set_flags<I>(&self, updates: I) -> Vec<FlagChange>
    where
        I: IntoIterator<Item = (String, Option<bool>)>,
    {
        self.flags.set_flags(updates)
    }

    // ========================================================================
    // 익스텐션
    // ========================================================================

    pub fn get_extensions<P>(&self, predicate: P) -> Vec<Arc<Extension>>
    where
        P: Fn(&Extension) -> bool,
    {
        self.store.get_extensions(predicate)
    }

    pub async fn get_resolved_extensions<P>(&self, predicate: P) -> Vec<ResolvedExtension>
    where
        P: Fn(&Extension) -> bool,
    {
        self.store.get_resolved_extensions(predicate).await
    }

    pub fn subscribe(&self, predicate: ExtensionPredicate, listener: ChangeListener) -> ListenerId {
        self.store.subscribe(predicate, listener)
    }

    /// 해석이 끝난 익스텐션의 변경 구독
    pub fn subscribe_resolved(
        &self,
        predicate: ExtensionPredicate,
        listener: ResolvedChangeListener,
    ) -> ListenerId {
        self.store.subscribe_resolved(predicate, listener)
    }

    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        self.store.unsubscribe(id)
    }

    /// code reference 하나 직접 해석
    pub async fn resolve(&self, plugin_id: &str, code_ref: &CodeReference) -> ResolveResult {
        self.resolver.resolve(plugin_id, code_ref).await
    }

    // ========================================================================
    // 접근자
    // ========================================================================

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    pub fn diagnostics(&self) -> &Arc<DiagnosticBus> {
        &self.diagnostics
    }

    pub fn flags(&self) -> &Arc<FeatureFlags> {
        &self.flags
    }

    pub fn resolver(&self) -> &Arc<CodeRefResolver> {
        &self.resolver
    }

    pub fn registry(&self) -> &Arc<PluginRegistry> {
        &self.registry
    }

    pub fn store(&self) -> &Arc<ExtensionStore> {
        &self.store
    }

    pub fn module_loader(&self) -> &Arc<dyn ModuleLoader> {
        &self.modules
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extension::predicates;
    use crate::module::{ModuleExports, StaticContainer, StaticModuleLoader};
    use crate::plugin::ExtensionDeclaration;
    use extrt_foundation::DiagnosticCode;
    use serde_json::json;

    fn modules() -> Arc<StaticModuleLoader> {
        Arc::new(StaticModuleLoader::new().with_container(
            "acme",
            StaticContainer::new().with_module(
                "pages",
                ModuleExports::new().with_export("Main", json!("main-page")),
            ),
        ))
    }

    fn acme() -> PluginManifest {
        PluginManifest::new("acme", "Acme").with_extension(ExtensionDeclaration::new(
            "console.page/route",
            json!({ "path": "/acme", "component": { "$codeRef": "pages.Main" } }),
        ))
    }

    #[tokio::test]
    async fn test_register_and_resolve() {
        let runtime = Runtime::new(RuntimeConfig::default(), modules()).unwrap();

        assert_eq!(runtime.register(acme()).await, PluginStatus::Loaded);
        assert_eq!(runtime.get_extensions(predicates::is_page).len(), 1);

        let resolved = runtime.get_resolved_extensions(predicates::any).await;
        assert_eq!(resolved[0].properties["component"], json!("main-page"));
        assert!(runtime.health().all_loaded());
    }

    #[tokio::test]
    async fn test_initial_flags_from_config() {
        let config = RuntimeConfig::default().with_flag("ACME", false);
        let runtime = Runtime::new(config, modules()).unwrap();
        let manifest = PluginManifest::new("acme", "Acme").with_extension(
            ExtensionDeclaration::new("console.page/route", json!({})).requires_flag("ACME"),
        );

        runtime.register(manifest).await;
        assert!(runtime.get_extensions(predicates::any).is_empty());

        runtime.set_flag("ACME", Some(true));
        assert_eq!(runtime.get_extensions(predicates::any).len(), 1);
    }

    #[tokio::test]
    async fn test_register_from_url_without_http_support() {
        let runtime = Runtime::new(RuntimeConfig::default(), modules()).unwrap();

        assert!(runtime.register_from_url("https://example.com/acme").await.is_err());
        assert_eq!(
            runtime
                .diagnostics()
                .history_by_code(DiagnosticCode::LoadFailure)
                .len(),
            1
        );
    }

    #[test]
    fn test_invalid_host_version_rejected() {
        let config = RuntimeConfig::default().with_host_api_version("four");
        assert!(Runtime::new(config, modules()).is_err());
    }
}
