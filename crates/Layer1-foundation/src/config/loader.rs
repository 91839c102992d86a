//! Configuration Loader
//!
//! ## 검색 우선순위
//!
//! 1. User-level: `~/.extrt/runtime.json`
//! 2. Project-level: `.extrt/runtime.json`
//! 3. 명시적으로 추가된 파일 (`.json` 또는 `.toml`)
//!
//! 각 레벨의 설정이 이전 레벨을 오버라이드합니다. 병합은 JSON 객체 단위로
//! 재귀적으로 수행되므로 부분 설정 파일도 허용됩니다.

use super::runtime::{RuntimeConfig, RUNTIME_CONFIG_FILE};
use crate::{Error, Result};
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// 설정 폴더 이름
pub const CONFIG_DIR_NAME: &str = ".extrt";

// ============================================================================
// ConfigLoader
// ============================================================================

/// 설정 파일 경로 정보
#[derive(Debug, Clone)]
struct ConfigPath {
    path: PathBuf,
    /// 우선순위 (높을수록 우선)
    priority: u8,
    description: &'static str,
    /// 명시적 경로는 없으면 에러
    required: bool,
}

/// 설정 로더
pub struct ConfigLoader {
    search_paths: Vec<ConfigPath>,
}

impl ConfigLoader {
    /// 기본 검색 경로로 생성
    pub fn new(working_dir: &Path) -> Self {
        let mut paths = Vec::new();

        if let Some(home) = dirs::home_dir() {
            paths.push(ConfigPath {
                path: home.join(CONFIG_DIR_NAME).join(RUNTIME_CONFIG_FILE),
                priority: 10,
                description: "User settings",
                required: false,
            });
        }

        paths.push(ConfigPath {
            path: working_dir.join(CONFIG_DIR_NAME).join(RUNTIME_CONFIG_FILE),
            priority: 20,
            description: "Project settings",
            required: false,
        });

        Self { search_paths: paths }
    }

    /// 검색 경로 없이 생성
    pub fn empty() -> Self {
        Self {
            search_paths: Vec::new(),
        }
    }

    /// 명시적 설정 파일 추가 (가장 높은 우선순위)
    pub fn with_file(mut self, path: impl Into<PathBuf>) -> Self {
        let priority = self
            .search_paths
            .iter()
            .map(|p| p.priority)
            .max()
            .unwrap_or(0)
            .saturating_add(10);

        self.search_paths.push(ConfigPath {
            path: path.into(),
            priority,
            description: "Explicit settings",
            required: true,
        });
        self.search_paths.sort_by_key(|p| p.priority);
        self
    }

    /// 모든 경로에서 로드하여 병합
    pub fn load(&self) -> Result<RuntimeConfig> {
        let mut merged = serde_json::to_value(RuntimeConfig::default())?;

        for config_path in &self.search_paths {
            if !config_path.path.exists() {
                if config_path.required {
                    return Err(Error::Config(format!(
                        "settings file not found: {}",
                        config_path.path.display()
                    )));
                }
                continue;
            }

            match read_layer(&config_path.path) {
                Ok(layer) => {
                    info!(
                        "Loaded {} from: {}",
                        config_path.description,
                        config_path.path.display()
                    );
                    merge_values(&mut merged, layer);
                }
                Err(e) if config_path.required => return Err(e),
                Err(e) => {
                    warn!(
                        "Failed to load settings from {}: {}",
                        config_path.path.display(),
                        e
                    );
                }
            }
        }

        let config: RuntimeConfig = serde_json::from_value(merged)
            .map_err(|e| Error::Config(format!("invalid runtime settings: {}", e)))?;

        debug!(
            host_api_version = %config.host_api_version,
            flags = config.initial_flags.len(),
            "Runtime config resolved"
        );

        Ok(config)
    }

    /// 존재하는 설정 파일 목록
    pub fn existing_files(&self) -> Vec<PathBuf> {
        self.search_paths
            .iter()
            .filter(|p| p.path.exists())
            .map(|p| p.path.clone())
            .collect()
    }
}

// ============================================================================
// 유틸리티 함수
// ============================================================================

/// 파일 하나를 JSON 값으로 읽기 (확장자로 형식 판별)
fn read_layer(path: &Path) -> Result<Value> {
    let content = std::fs::read_to_string(path)?;

    let is_toml = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("toml"))
        .unwrap_or(false);

    let value = if is_toml {
        let table: toml::Value = toml::from_str(&content)?;
        serde_json::to_value(table)?
    } else {
        serde_json::from_str(&content)?
    };

    if !value.is_object() {
        return Err(Error::Config(format!(
            "settings at {} must be an object",
            path.display()
        )));
    }

    Ok(value)
}

/// later 값을 base 에 재귀 병합 (later 우선)
fn merge_values(base: &mut Value, later: Value) {
    match (base, later) {
        (Value::Object(base_map), Value::Object(later_map)) => {
            for (key, value) in later_map {
                match base_map.get_mut(&key) {
                    Some(existing) if existing.is_object() && value.is_object() => {
                        merge_values(existing, value);
                    }
                    _ => {
                        base_map.insert(key, value);
                    }
                }
            }
        }
        (base, later) => *base = later,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_file(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(content.as_bytes()).unwrap();
        path
    }

    #[test]
    fn test_layers_override_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let project_dir = dir.path().join(CONFIG_DIR_NAME);
        std::fs::create_dir_all(&project_dir).unwrap();
        write_file(
            &project_dir,
            RUNTIME_CONFIG_FILE,
            r#"{ "hostApiVersion": "2.0.0", "initialFlags": { "A": true, "B": true } }"#,
        );
        let explicit = write_file(
            dir.path(),
            "override.toml",
            "loadTimeoutMs = 250\n[initialFlags]\nB = false\n",
        );

        let config = ConfigLoader::empty()
            .with_file(project_dir.join(RUNTIME_CONFIG_FILE))
            .with_file(explicit)
            .load()
            .unwrap();

        assert_eq!(config.host_api_version, "2.0.0");
        assert_eq!(config.load_timeout_ms, Some(250));
        assert_eq!(config.initial_flags.get("A"), Some(&true));
        assert_eq!(config.initial_flags.get("B"), Some(&false));
    }

    #[test]
    fn test_missing_explicit_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = ConfigLoader::empty()
            .with_file(dir.path().join("nope.json"))
            .load();

        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_missing_default_paths_fall_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = ConfigLoader::new(dir.path()).load().unwrap();
        assert_eq!(config.diagnostic_history, 100);
    }

    #[test]
    fn test_non_object_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(dir.path(), "bad.json", "[1, 2, 3]");
        let result = ConfigLoader::empty().with_file(path).load();
        assert!(result.is_err());
    }
}
