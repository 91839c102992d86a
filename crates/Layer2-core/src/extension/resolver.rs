//! Code Reference Resolver
//!
//! code reference 를 실제 export 값으로 해석하고 결과를 캐시한다.
//!
//! - 같은 (plugin, code reference) 에 대한 동시 요청은 하나의 로드를 공유
//! - 해석이 끝나면 모든 호출자가 동일한 `ExportValue` (Arc) 를 받음
//! - 실패는 플러그인이 무효화될 때까지 유지되고 진단은 한 번만 발행
//! - 결과가 캐시에 기록되면 구독자에게 플러그인 ID 를 알린다
//!
//! 캐시 잠금은 await 지점 바깥에서만 잡는다.

use super::code_ref::{replace_code_refs, CodeReference};
use super::types::{Extension, ResolvedExtension};
use crate::module::{ExportValue, ModuleExports, ModuleLoader};
use extrt_foundation::event::extension as diagnostics;
use extrt_foundation::{DiagnosticBus, Error, ListenerId};
use futures::future::{self, BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

/// 해석 결과 (에러는 여러 호출자가 공유)
pub type ResolveResult = std::result::Result<ExportValue, Arc<Error>>;

type SharedResolve = Shared<BoxFuture<'static, ResolveResult>>;
type SharedModule = Shared<BoxFuture<'static, std::result::Result<ModuleExports, Arc<Error>>>>;
type CacheKey = (String, CodeReference);

/// 해석 완료 리스너 (플러그인 ID)
pub type ResolutionListener = Arc<dyn Fn(&str) + Send + Sync>;

/// 해석 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionStatus {
    Unresolved,
    Resolving,
    Resolved,
    Failed,
}

/// 대기 없이 확인한 익스텐션 해석 상태
#[derive(Debug, Clone)]
pub enum ExtensionResolution {
    /// 모든 code reference 가 해석됨
    Ready(ResolvedExtension),
    /// 하나 이상이 실패함
    Failed,
    /// 아직 해석 중이거나 시작되지 않음
    Pending,
}

enum CacheEntry {
    Resolving(SharedResolve),
    Resolved(ExportValue),
    Failed(Arc<Error>),
}

// ============================================================================
// CodeRefResolver
// ============================================================================

pub struct CodeRefResolver {
    modules: Arc<dyn ModuleLoader>,
    diagnostics: Arc<DiagnosticBus>,
    cache: Mutex<HashMap<CacheKey, CacheEntry>>,
    module_cache: Mutex<HashMap<(String, String), SharedModule>>,
    listeners: Mutex<Vec<(ListenerId, ResolutionListener)>>,
    next_listener_id: AtomicU64,
}

impl CodeRefResolver {
    pub fn new(modules: Arc<dyn ModuleLoader>, diagnostics: Arc<DiagnosticBus>) -> Self {
        Self {
            modules,
            diagnostics,
            cache: Mutex::new(HashMap::new()),
            module_cache: Mutex::new(HashMap::new()),
            listeners: Mutex::new(Vec::new()),
            next_listener_id: AtomicU64::new(1),
        }
    }

    /// 해석 결과가 캐시에 기록될 때마다 호출
    pub fn subscribe(&self, listener: ResolutionListener) -> ListenerId {
        let id = ListenerId::new(self.next_listener_id.fetch_add(1, Ordering::SeqCst));
        self.listeners.lock().push((id, listener));
        id
    }

    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.lock();
        let before = listeners.len();
        listeners.retain(|(listener_id, _)| *listener_id != id);
        listeners.len() != before
    }

    /// code reference 하나 해석
    pub async fn resolve(&self, plugin_id: &str, code_ref: &CodeReference) -> ResolveResult {
        let key: CacheKey = (plugin_id.to_string(), code_ref.clone());

        let pending = {
            let mut cache = self.cache.lock();
            match cache.get(&key) {
                Some(CacheEntry::Resolved(value)) => return Ok(value.clone()),
                Some(CacheEntry::Failed(error)) => return Err(error.clone()),
                Some(CacheEntry::Resolving(pending)) => pending.clone(),
                None => {
                    debug!(plugin = plugin_id, code_ref = %code_ref, "Resolving code reference");
                    let pending = self.start(plugin_id, code_ref);
                    cache.insert(key.clone(), CacheEntry::Resolving(pending.clone()));
                    pending
                }
            }
        };

        // 캐시에 있는 것과 같은 future 인지 비교하려면 원본은 poll 하지 않아야 한다
        let result = pending.clone().await;
        self.commit(&key, &pending, &result);
        result
    }

    /// 여러 code reference 를 동시에 해석 (하나라도 실패하면 실패)
    pub async fn resolve_many(
        &self,
        plugin_id: &str,
        code_refs: &[CodeReference],
    ) -> std::result::Result<Vec<ExportValue>, Arc<Error>> {
        future::try_join_all(code_refs.iter().map(|r| self.resolve(plugin_id, r))).await
    }

    /// 익스텐션 속성의 모든 code reference 를 해석
    pub async fn resolve_extension(
        &self,
        extension: &Arc<Extension>,
    ) -> std::result::Result<ResolvedExtension, Arc<Error>> {
        let code_refs = extension.code_refs();
        let values = self.resolve_many(&extension.plugin_id, &code_refs).await?;

        let resolved: HashMap<&CodeReference, ExportValue> =
            code_refs.iter().zip(values).collect();
        let properties = replace_code_refs(&extension.properties, &mut |r| {
            resolved.get(r).map(|v| v.as_ref().clone())
        });

        Ok(ResolvedExtension {
            extension: extension.clone(),
            properties,
        })
    }

    /// 이미 해석된 값 조회 (로드를 시작하지 않음)
    pub fn peek(&self, plugin_id: &str, code_ref: &CodeReference) -> Option<ExportValue> {
        match self.cache.lock().get(&(plugin_id.to_string(), code_ref.clone())) {
            Some(CacheEntry::Resolved(value)) => Some(value.clone()),
            _ => None,
        }
    }

    /// 캐시만 보고 익스텐션 해석 상태 확인 (로드를 시작하지 않음)
    ///
    /// 실패가 하나라도 있으면 나머지가 해석 중이어도 `Failed`.
    pub fn try_resolve_extension(&self, extension: &Arc<Extension>) -> ExtensionResolution {
        let code_refs = extension.code_refs();
        let mut resolved: HashMap<&CodeReference, ExportValue> = HashMap::new();
        let mut pending = false;

        {
            let cache = self.cache.lock();
            for code_ref in &code_refs {
                match cache.get(&(extension.plugin_id.clone(), code_ref.clone())) {
                    Some(CacheEntry::Resolved(value)) => {
                        resolved.insert(code_ref, value.clone());
                    }
                    Some(CacheEntry::Failed(_)) => return ExtensionResolution::Failed,
                    Some(CacheEntry::Resolving(_)) | None => pending = true,
                }
            }
        }

        if pending {
            return ExtensionResolution::Pending;
        }

        let properties = replace_code_refs(&extension.properties, &mut |r| {
            resolved.get(r).map(|v| v.as_ref().clone())
        });
        ExtensionResolution::Ready(ResolvedExtension {
            extension: extension.clone(),
            properties,
        })
    }

    pub fn status(&self, plugin_id: &str, code_ref: &CodeReference) -> ResolutionStatus {
        match self.cache.lock().get(&(plugin_id.to_string(), code_ref.clone())) {
            None => ResolutionStatus::Unresolved,
            Some(CacheEntry::Resolving(_)) => ResolutionStatus::Resolving,
            Some(CacheEntry::Resolved(_)) => ResolutionStatus::Resolved,
            Some(CacheEntry::Failed(_)) => ResolutionStatus::Failed,
        }
    }

    /// 플러그인의 모든 캐시 항목 제거
    ///
    /// 진행 중인 해석은 호출자에게 결과를 돌려주지만 캐시에는 기록되지 않는다.
    pub fn invalidate_plugin(&self, plugin_id: &str) -> usize {
        let removed = {
            let mut cache = self.cache.lock();
            let before = cache.len();
            cache.retain(|(plugin, _), _| plugin != plugin_id);
            before - cache.len()
        };
        self.module_cache
            .lock()
            .retain(|(plugin, _), _| plugin != plugin_id);

        if removed > 0 {
            debug!(plugin = plugin_id, removed, "Invalidated resolved code references");
        }
        removed
    }

    pub fn cached_count(&self) -> usize {
        self.cache.lock().len()
    }

    // ========================================================================
    // 내부
    // ========================================================================

    fn start(&self, plugin_id: &str, code_ref: &CodeReference) -> SharedResolve {
        let module = self.module(plugin_id, &code_ref.module_id);
        let plugin_id = plugin_id.to_string();
        let code_ref = code_ref.clone();

        async move {
            let exports = module.await.map_err(|e| {
                Arc::new(Error::resolution(&plugin_id, code_ref.to_string(), e.to_string()))
            })?;

            exports.get(&code_ref.export_name).ok_or_else(|| {
                Arc::new(Error::resolution(
                    &plugin_id,
                    code_ref.to_string(),
                    format!(
                        "module '{}' has no export '{}'",
                        code_ref.module_id, code_ref.export_name
                    ),
                ))
            })
        }
        .boxed()
        .shared()
    }

    /// 모듈 로드 (같은 모듈의 여러 export 가 로드 하나를 공유)
    fn module(&self, plugin_id: &str, module_id: &str) -> SharedModule {
        let mut module_cache = self.module_cache.lock();
        module_cache
            .entry((plugin_id.to_string(), module_id.to_string()))
            .or_insert_with(|| {
                let modules = self.modules.clone();
                let plugin_id = plugin_id.to_string();
                let module_id = module_id.to_string();
                async move {
                    modules
                        .load_module(&plugin_id, &module_id)
                        .await
                        .map_err(Arc::new)
                }
                .boxed()
                .shared()
            })
            .clone()
    }

    /// 완료된 해석을 캐시에 기록
    ///
    /// 캐시가 여전히 같은 future 를 가리킬 때만 기록한다. 그 사이 무효화되었거나
    /// 다른 호출자가 먼저 기록했다면 아무것도 하지 않는다.
    fn commit(&self, key: &CacheKey, pending: &SharedResolve, result: &ResolveResult) {
        let committed = {
            let mut cache = self.cache.lock();
            let is_current = matches!(
                cache.get(key),
                Some(CacheEntry::Resolving(current)) if current.ptr_eq(pending)
            );
            if is_current {
                let entry = match result {
                    Ok(value) => CacheEntry::Resolved(value.clone()),
                    Err(error) => CacheEntry::Failed(error.clone()),
                };
                cache.insert(key.clone(), entry);
            }
            is_current
        };

        if !committed {
            return;
        }

        if let Err(error) = result {
            let (plugin_id, code_ref) = key;
            let message = match error.as_ref() {
                Error::ResolutionFailure { message, .. } => message.clone(),
                other => other.to_string(),
            };
            warn!(plugin = %plugin_id, code_ref = %code_ref, "Code reference resolution failed: {}", message);
            self.diagnostics.publish(diagnostics::resolution_failed(
                plugin_id,
                &code_ref.to_string(),
                &message,
            ));
        }

        let listeners: Vec<ResolutionListener> =
            self.listeners.lock().iter().map(|(_, l)| l.clone()).collect();
        for listener in listeners {
            listener(&key.0);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module::{StaticContainer, StaticModuleLoader};
    use crate::plugin::PluginManifest;
    use extrt_foundation::DiagnosticCode;
    use serde_json::json;
    use std::time::Duration;

    async fn setup(latency: Option<Duration>) -> (Arc<StaticModuleLoader>, CodeRefResolver, Arc<DiagnosticBus>) {
        let mut loader = StaticModuleLoader::new().with_container(
            "acme",
            StaticContainer::new().with_module(
                "pages",
                ModuleExports::new()
                    .with_export("Main", json!({ "title": "Main" }))
                    .with_export("Tab", json!("tab")),
            ),
        );
        if let Some(latency) = latency {
            loader = loader.with_latency(latency);
        }
        let loader = Arc::new(loader);
        loader.init_shared_scope().await.unwrap();
        loader
            .load_entry(&PluginManifest::new("acme", "Acme"))
            .await
            .unwrap();

        let bus = Arc::new(DiagnosticBus::new());
        let resolver = CodeRefResolver::new(loader.clone(), bus.clone());
        (loader, resolver, bus)
    }

    #[tokio::test]
    async fn test_concurrent_resolves_share_one_load() {
        let (loader, resolver, _) = setup(Some(Duration::from_millis(20))).await;
        let main = CodeReference::new("pages", "Main");

        let results = future::join_all((0..5).map(|_| resolver.resolve("acme", &main))).await;
        let values: Vec<ExportValue> = results.into_iter().map(|r| r.unwrap()).collect();

        assert_eq!(loader.module_load_count("acme", "pages"), 1);
        assert!(values.iter().all(|v| Arc::ptr_eq(v, &values[0])));
        assert_eq!(resolver.status("acme", &main), ResolutionStatus::Resolved);
        assert!(resolver.peek("acme", &main).is_some());
    }

    #[tokio::test]
    async fn test_exports_of_same_module_share_load() {
        let (loader, resolver, _) = setup(None).await;
        let refs = [CodeReference::new("pages", "Main"), CodeReference::new("pages", "Tab")];

        let values = resolver.resolve_many("acme", &refs).await.unwrap();
        assert_eq!(values.len(), 2);
        assert_eq!(*values[1], json!("tab"));
        assert_eq!(loader.module_load_count("acme", "pages"), 1);
    }

    #[tokio::test]
    async fn test_failure_is_sticky_and_reported_once() {
        let (loader, resolver, bus) = setup(None).await;
        let missing = CodeReference::new("pages", "Missing");

        assert!(resolver.resolve("acme", &missing).await.is_err());
        assert!(resolver.resolve("acme", &missing).await.is_err());

        assert_eq!(resolver.status("acme", &missing), ResolutionStatus::Failed);
        assert_eq!(bus.history_by_code(DiagnosticCode::ResolutionFailure).len(), 1);
        assert_eq!(loader.module_load_count("acme", "pages"), 1);
    }

    #[tokio::test]
    async fn test_invalidate_plugin() {
        let (loader, resolver, _) = setup(None).await;
        let main = CodeReference::new("pages", "Main");

        let first = resolver.resolve("acme", &main).await.unwrap();
        assert_eq!(resolver.invalidate_plugin("acme"), 1);
        assert_eq!(resolver.status("acme", &main), ResolutionStatus::Unresolved);

        let second = resolver.resolve("acme", &main).await.unwrap();
        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(loader.module_load_count("acme", "pages"), 2);
    }

    #[tokio::test]
    async fn test_invalidate_during_resolution_discards_result() {
        let (_, resolver, _) = setup(Some(Duration::from_millis(30))).await;
        let main = CodeReference::new("pages", "Main");

        let (result, _) = tokio::join!(resolver.resolve("acme", &main), async {
            tokio::time::sleep(Duration::from_millis(5)).await;
            resolver.invalidate_plugin("acme");
        });

        assert!(result.is_ok());
        assert_eq!(resolver.status("acme", &main), ResolutionStatus::Unresolved);
    }

    #[tokio::test]
    async fn test_resolve_extension_substitutes_values() {
        let (_, resolver, _) = setup(None).await;
        let decl = crate::plugin::ExtensionDeclaration::new(
            "console.page/route",
            json!({ "path": "/acme", "component": { "$codeRef": "pages.Main" } }),
        );
        let ext = Arc::new(Extension::from_declaration("acme", 0, &decl));

        let resolved = resolver.resolve_extension(&ext).await.unwrap();
        assert_eq!(resolved.uid(), "acme[0]");
        assert_eq!(
            resolved.properties,
            json!({ "path": "/acme", "component": { "title": "Main" } })
        );
    }

    #[tokio::test]
    async fn test_listeners_notified_on_commit() {
        let (_, resolver, _) = setup(Some(Duration::from_millis(10))).await;
        let notified = Arc::new(Mutex::new(Vec::new()));
        let sink = notified.clone();
        let id = resolver.subscribe(Arc::new(move |plugin_id: &str| {
            sink.lock().push(plugin_id.to_string())
        }));
        let main = CodeReference::new("pages", "Main");

        // 동시 호출이 여러 개여도 기록은 한 번
        future::join_all((0..3).map(|_| resolver.resolve("acme", &main))).await;
        resolver.resolve("acme", &main).await.unwrap();
        assert_eq!(*notified.lock(), vec!["acme".to_string()]);

        assert!(resolver.unsubscribe(id));
        resolver.resolve("acme", &CodeReference::new("pages", "Tab")).await.unwrap();
        assert_eq!(notified.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_try_resolve_extension_reads_cache_only() {
        let (loader, resolver, _) = setup(None).await;
        let decl = crate::plugin::ExtensionDeclaration::new(
            "console.page/route",
            json!({ "component": { "$codeRef": "pages.Main" } }),
        );
        let ext = Arc::new(Extension::from_declaration("acme", 0, &decl));

        assert!(matches!(resolver.try_resolve_extension(&ext), ExtensionResolution::Pending));
        assert_eq!(loader.module_load_count("acme", "pages"), 0);

        resolver.resolve_extension(&ext).await.unwrap();
        match resolver.try_resolve_extension(&ext) {
            ExtensionResolution::Ready(resolved) => {
                assert_eq!(resolved.properties, json!({ "component": { "title": "Main" } }));
            }
            other => panic!("expected ready, got {:?}", other),
        }

        let broken = crate::plugin::ExtensionDeclaration::new(
            "console.page/route",
            json!({ "component": { "$codeRef": "pages.Missing" } }),
        );
        let broken = Arc::new(Extension::from_declaration("acme", 1, &broken));
        assert!(resolver.resolve_extension(&broken).await.is_err());
        assert!(matches!(resolver.try_resolve_extension(&broken), ExtensionResolution::Failed));
    }
}
