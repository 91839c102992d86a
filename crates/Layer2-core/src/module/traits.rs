//! Module Loader traits - 원격 컨테이너 인터페이스

use crate::plugin::PluginManifest;
use async_trait::async_trait;
use extrt_foundation::{Error, Result};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// 해석된 export 값
///
/// 같은 code reference 를 해석한 모든 호출자는 동일한 Arc 를 공유한다.
pub type ExportValue = Arc<Value>;

// ============================================================================
// ModuleExports
// ============================================================================

/// 모듈 하나의 export 테이블
#[derive(Debug, Clone, Default)]
pub struct ModuleExports {
    exports: HashMap<String, ExportValue>,
}

impl ModuleExports {
    pub fn new() -> Self {
        Self::default()
    }

    /// 빌더 패턴: export 추가
    pub fn with_export(mut self, name: impl Into<String>, value: Value) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: Value) {
        self.exports.insert(name.into(), Arc::new(value));
    }

    pub fn get(&self, name: &str) -> Option<ExportValue> {
        self.exports.get(name).cloned()
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.exports.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.exports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.exports.is_empty()
    }

    /// JSON 객체 (`{export: value}`)에서 생성
    pub fn from_map(map: serde_json::Map<String, Value>) -> Self {
        Self {
            exports: map.into_iter().map(|(k, v)| (k, Arc::new(v))).collect(),
        }
    }
}

// ============================================================================
// ModuleLoader
// ============================================================================

/// 원격 플러그인 컨테이너를 다루는 로더
///
/// 네트워크, 정적 테이블 등 실제 전송 방식은 구현체가 결정한다.
#[async_trait]
pub trait ModuleLoader: Send + Sync {
    /// 로더 이름 (로그용)
    fn name(&self) -> &str;

    /// shared scope 초기화
    ///
    /// 런타임 생애 동안 최대 한 번 호출된다.
    async fn init_shared_scope(&self) -> Result<()>;

    /// 플러그인 엔트리 로드 및 컨테이너 초기화
    async fn load_entry(&self, manifest: &PluginManifest) -> Result<()>;

    /// 로드된 컨테이너에서 모듈 하나 가져오기
    async fn load_module(&self, plugin_id: &str, module_id: &str) -> Result<ModuleExports>;

    /// 플러그인 컨테이너 해제 (unregister 시)
    fn release(&self, _plugin_id: &str) {}

    /// `{base_url}/plugin-manifest.json` 가져오기
    async fn fetch_manifest(&self, base_url: &str) -> Result<PluginManifest> {
        Err(Error::NotFound(format!(
            "{} loader cannot fetch manifests ({})",
            self.name(),
            base_url
        )))
    }
}
