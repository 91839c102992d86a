//! Remote Plugin Loader
//!
//! shared scope 를 한 번만 초기화하고, 매니페스트의 원격 엔트리를 로드해
//! 선언된 익스텐션을 uid 가 부여된 `Extension` 으로 만든다.

use super::manifest::PluginManifest;
use crate::extension::Extension;
use crate::module::ModuleLoader;
use extrt_foundation::{Error, Result};
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{debug, info};

pub struct RemotePluginLoader {
    modules: Arc<dyn ModuleLoader>,
    /// 초기화 결과 (실패도 캐시되어 이후 모든 로드가 같은 이유로 실패)
    shared_scope: OnceCell<std::result::Result<(), Arc<Error>>>,
}

impl RemotePluginLoader {
    pub fn new(modules: Arc<dyn ModuleLoader>) -> Self {
        Self {
            modules,
            shared_scope: OnceCell::new(),
        }
    }

    pub fn modules(&self) -> &Arc<dyn ModuleLoader> {
        &self.modules
    }

    /// shared scope 초기화 (동시 호출 시에도 한 번만 실행)
    pub async fn ensure_shared_scope(&self) -> Result<()> {
        let outcome = self
            .shared_scope
            .get_or_init(|| async {
                info!("Initializing shared scope via {} loader", self.modules.name());
                self.modules.init_shared_scope().await.map_err(Arc::new)
            })
            .await;

        outcome
            .clone()
            .map_err(|e| Error::SharedScope(e.to_string()))
    }

    pub fn is_shared_scope_ready(&self) -> bool {
        matches!(self.shared_scope.get(), Some(Ok(())))
    }

    /// 플러그인 로드
    ///
    /// 반환된 익스텐션은 매니페스트 선언 순서를 따른다.
    pub async fn load(&self, manifest: &PluginManifest) -> Result<Vec<Extension>> {
        self.ensure_shared_scope()
            .await
            .map_err(|e| Error::load_failure(&manifest.id, e.to_string()))?;

        self.modules.load_entry(manifest).await.map_err(|e| match e {
            e @ Error::LoadFailure { .. } => e,
            other => Error::load_failure(&manifest.id, other.to_string()),
        })?;

        let extensions: Vec<Extension> = manifest
            .extensions
            .iter()
            .enumerate()
            .map(|(index, decl)| Extension::from_declaration(&manifest.id, index, decl))
            .collect();

        debug!(
            plugin = %manifest.id,
            extensions = extensions.len(),
            "Plugin entry loaded"
        );
        Ok(extensions)
    }

    /// 플러그인 컨테이너 해제
    pub fn release(&self, plugin_id: &str) {
        self.modules.release(plugin_id);
    }
}
