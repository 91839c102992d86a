//! HTTP Module Loader - 네트워크로 원격 엔트리 로드
//!
//! 원격 엔트리는 컨테이너 전체를 JSON 문서 하나로 배포한다:
//!
//! ```json
//! {
//!   "pluginId": "acme-plugin",
//!   "requiredShared": ["react"],
//!   "modules": { "pages": { "AcmePage": { "title": "Acme" } } }
//! }
//! ```

use super::traits::{ModuleExports, ModuleLoader};
use crate::plugin::PluginManifest;
use async_trait::async_trait;
use extrt_foundation::{Error, Result, RuntimeConfig};
use parking_lot::RwLock;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

/// 매니페스트 파일 이름
pub const MANIFEST_FILE: &str = "plugin-manifest.json";

/// HTTP 요청 타임아웃 (초)
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// 원격 엔트리 문서
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RemoteEntry {
    plugin_id: String,
    #[serde(default)]
    required_shared: Vec<String>,
    #[serde(default)]
    modules: HashMap<String, Map<String, Value>>,
}

/// HTTP 기반 모듈 로더
pub struct HttpModuleLoader {
    client: Client,
    shared_modules: HashSet<String>,
    shared_scope_ready: AtomicBool,
    containers: RwLock<HashMap<String, RemoteEntry>>,
}

impl HttpModuleLoader {
    pub fn new(config: &RuntimeConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()
            .map_err(|e| Error::Http(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self::with_client(client, config))
    }

    /// 외부에서 만든 클라이언트 사용
    pub fn with_client(client: Client, config: &RuntimeConfig) -> Self {
        Self {
            client,
            shared_modules: config.shared_modules.iter().cloned().collect(),
            shared_scope_ready: AtomicBool::new(false),
            containers: RwLock::new(HashMap::new()),
        }
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> Result<T> {
        debug!("GET {}", url);
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| Error::Http(format!("{}: {}", url, e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Http(format!("{}: HTTP {}", url, status)));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| Error::Http(format!("{}: invalid body: {}", url, e)))
    }
}

#[async_trait]
impl ModuleLoader for HttpModuleLoader {
    fn name(&self) -> &str {
        "http"
    }

    async fn init_shared_scope(&self) -> Result<()> {
        self.shared_scope_ready.store(true, Ordering::SeqCst);
        info!(
            modules = self.shared_modules.len(),
            "Shared scope initialized"
        );
        Ok(())
    }

    async fn load_entry(&self, manifest: &PluginManifest) -> Result<()> {
        if !self.shared_scope_ready.load(Ordering::SeqCst) {
            return Err(Error::SharedScope(
                "shared scope used before initialization".into(),
            ));
        }

        let entry: RemoteEntry = self
            .get_json(&manifest.remote_entry_url)
            .await
            .map_err(|e| Error::load_failure(&manifest.id, e.to_string()))?;

        if entry.plugin_id != manifest.id {
            return Err(Error::load_failure(
                &manifest.id,
                format!(
                    "remote entry registered plugin '{}' instead",
                    entry.plugin_id
                ),
            ));
        }

        if let Some(missing) = entry
            .required_shared
            .iter()
            .find(|name| !self.shared_modules.contains(*name))
        {
            return Err(Error::load_failure(
                &manifest.id,
                format!("shared module '{}' is not provided", missing),
            ));
        }

        debug!(
            plugin = %manifest.id,
            modules = entry.modules.len(),
            "Remote entry loaded"
        );
        self.containers.write().insert(manifest.id.clone(), entry);
        Ok(())
    }

    async fn load_module(&self, plugin_id: &str, module_id: &str) -> Result<ModuleExports> {
        let containers = self.containers.read();
        let entry = containers.get(plugin_id).ok_or_else(|| {
            Error::NotFound(format!("container for plugin '{}' is not loaded", plugin_id))
        })?;

        entry
            .modules
            .get(module_id)
            .cloned()
            .map(ModuleExports::from_map)
            .ok_or_else(|| {
                Error::NotFound(format!("module '{}' in plugin '{}'", module_id, plugin_id))
            })
    }

    fn release(&self, plugin_id: &str) {
        self.containers.write().remove(plugin_id);
    }

    async fn fetch_manifest(&self, base_url: &str) -> Result<PluginManifest> {
        let mut base = Url::parse(base_url)
            .map_err(|e| Error::Http(format!("invalid base URL '{}': {}", base_url, e)))?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }

        let manifest_url = base
            .join(MANIFEST_FILE)
            .map_err(|e| Error::Http(e.to_string()))?;

        let raw: Value = self.get_json(manifest_url.as_str()).await?;
        let mut manifest = PluginManifest::from_json(&raw.to_string())?;

        // 상대 경로 엔트리는 base 기준으로 해석
        if Url::parse(&manifest.remote_entry_url).is_err() {
            let resolved = base.join(&manifest.remote_entry_url).map_err(|e| {
                Error::InvalidManifest(format!(
                    "{}: invalid remoteEntryURL '{}': {}",
                    manifest.id, manifest.remote_entry_url, e
                ))
            })?;
            manifest.remote_entry_url = resolved.to_string();
        }

        info!(plugin = %manifest.id, "Fetched manifest from {}", manifest_url);
        Ok(manifest)
    }
}
