//! Runtime Config - 확장 런타임 설정
//!
//! Runtime 생성 시 주입되는 초기 상태와 정책 값들

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// 설정 파일명
pub const RUNTIME_CONFIG_FILE: &str = "runtime.json";

/// 호스트가 제공하는 플러그인 API 버전을 가리키는 예약 의존성 ID
pub const PLUGIN_API_DEPENDENCY: &str = "@console/pluginAPI";

/// 기본 shared scope 모듈 목록
pub const DEFAULT_SHARED_MODULES: &[&str] = &[
    "@console/dynamic-plugin-sdk",
    "@console/dynamic-plugin-sdk-internal",
    "react",
    "react-router-dom",
    "react-redux",
];

// ============================================================================
// RuntimeConfig
// ============================================================================

/// 확장 런타임 설정
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RuntimeConfig {
    /// 호스트 플러그인 API 버전 (`@console/pluginAPI` 의존성 검사에 사용)
    pub host_api_version: String,

    /// 플러그인 로드 타임아웃 (밀리초, None이면 무제한)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub load_timeout_ms: Option<u64>,

    /// 초기 feature flag 상태 (없는 flag는 미결정)
    pub initial_flags: BTreeMap<String, bool>,

    /// 진단 히스토리 보관 개수
    pub diagnostic_history: usize,

    /// shared scope 에 제공할 모듈 이름
    pub shared_modules: Vec<String>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            host_api_version: "4.15.0".to_string(),
            load_timeout_ms: None,
            initial_flags: BTreeMap::new(),
            diagnostic_history: 100,
            shared_modules: DEFAULT_SHARED_MODULES.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl RuntimeConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// 빌더 패턴: 호스트 API 버전
    pub fn with_host_api_version(mut self, version: impl Into<String>) -> Self {
        self.host_api_version = version.into();
        self
    }

    /// 빌더 패턴: 로드 타임아웃
    pub fn with_load_timeout(mut self, timeout: Duration) -> Self {
        self.load_timeout_ms = Some(timeout.as_millis() as u64);
        self
    }

    /// 빌더 패턴: 초기 flag
    pub fn with_flag(mut self, name: impl Into<String>, value: bool) -> Self {
        self.initial_flags.insert(name.into(), value);
        self
    }

    /// 빌더 패턴: shared 모듈 추가
    pub fn with_shared_module(mut self, name: impl Into<String>) -> Self {
        self.shared_modules.push(name.into());
        self
    }

    pub fn load_timeout(&self) -> Option<Duration> {
        self.load_timeout_ms.map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: RuntimeConfig =
            serde_json::from_str(r#"{ "loadTimeoutMs": 1500, "initialFlags": { "CAN_LIST_NS": true } }"#)
                .unwrap();

        assert_eq!(config.load_timeout(), Some(Duration::from_millis(1500)));
        assert_eq!(config.initial_flags.get("CAN_LIST_NS"), Some(&true));
        assert_eq!(config.host_api_version, "4.15.0");
        assert!(config.shared_modules.iter().any(|m| m == "react"));
    }

    #[test]
    fn test_builder() {
        let config = RuntimeConfig::new()
            .with_host_api_version("1.0.0")
            .with_flag("A", false)
            .with_load_timeout(Duration::from_secs(2));

        assert_eq!(config.host_api_version, "1.0.0");
        assert_eq!(config.load_timeout_ms, Some(2000));
        assert_eq!(config.initial_flags.get("A"), Some(&false));
    }
}
