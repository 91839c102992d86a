//! Plugin Manifest - 플러그인 메타데이터 정의
//!
//! 원격 플러그인이 배포하는 `plugin-manifest.json` 의 형태:
//!
//! ```json
//! {
//!   "id": "acme-plugin",
//!   "name": "Acme",
//!   "version": "1.2.0",
//!   "dependencies": [{ "id": "@console/pluginAPI", "versionRange": "^4.14.0" }],
//!   "extensions": [
//!     { "type": "console.page/route", "properties": { "path": "/acme",
//!       "component": { "$codeRef": "pages.AcmePage" } } }
//!   ],
//!   "remoteEntryURL": "https://plugins.example.com/acme/plugin-entry.json"
//! }
//! ```

use super::version::{PluginVersion, VersionRange};
use crate::extension::{code_ref, ExtensionFlags, ExtensionKind};
use extrt_foundation::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{HashMap, HashSet};

/// 플러그인 의존성
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginDependency {
    /// 의존하는 플러그인 ID
    pub id: String,

    /// 허용 버전 범위
    #[serde(default = "VersionRange::any")]
    pub version_range: VersionRange,
}

impl PluginDependency {
    pub fn new(id: impl Into<String>, version_range: VersionRange) -> Self {
        Self {
            id: id.into(),
            version_range,
        }
    }

    /// 범위 문자열로 생성
    pub fn parse(id: impl Into<String>, range: &str) -> Result<Self> {
        Ok(Self::new(id, VersionRange::parse(range)?))
    }
}

/// 매니페스트에 선언된 익스텐션 (uid 부여 전)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtensionDeclaration {
    /// 익스텐션 타입
    #[serde(rename = "type")]
    pub kind: ExtensionKind,

    /// 타입별 속성 (code reference 포함 가능)
    #[serde(default = "empty_object")]
    pub properties: Value,

    /// feature flag 조건
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flags: Option<ExtensionFlags>,

    /// 이 익스텐션이 앞에 와야 하는 uid 목록
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub insert_before: Vec<String>,

    /// 이 익스텐션이 뒤에 와야 하는 uid 목록
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub insert_after: Vec<String>,
}

fn empty_object() -> Value {
    Value::Object(Default::default())
}

impl ExtensionDeclaration {
    pub fn new(kind: impl Into<ExtensionKind>, properties: Value) -> Self {
        Self {
            kind: kind.into(),
            properties,
            flags: None,
            insert_before: vec![],
            insert_after: vec![],
        }
    }

    /// 빌더 패턴: 필수 flag
    pub fn requires_flag(mut self, flag: impl Into<String>) -> Self {
        self.flags
            .get_or_insert_with(ExtensionFlags::default)
            .required
            .push(flag.into());
        self
    }

    /// 빌더 패턴: 금지 flag
    pub fn disallows_flag(mut self, flag: impl Into<String>) -> Self {
        self.flags
            .get_or_insert_with(ExtensionFlags::default)
            .disallowed
            .push(flag.into());
        self
    }

    pub fn insert_before(mut self, uid: impl Into<String>) -> Self {
        self.insert_before.push(uid.into());
        self
    }

    pub fn insert_after(mut self, uid: impl Into<String>) -> Self {
        self.insert_after.push(uid.into());
        self
    }
}

/// 플러그인 매니페스트
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginManifest {
    /// 고유 플러그인 ID (예: "acme-plugin")
    pub id: String,

    /// 표시 이름
    #[serde(default)]
    pub name: String,

    /// 버전
    pub version: PluginVersion,

    /// 설명
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// 의존성 목록
    #[serde(default)]
    pub dependencies: Vec<PluginDependency>,

    /// 선언된 익스텐션
    #[serde(default)]
    pub extensions: Vec<ExtensionDeclaration>,

    /// 원격 엔트리 URL
    #[serde(rename = "remoteEntryURL")]
    pub remote_entry_url: String,

    /// 추가 메타데이터
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, String>,
}

impl PluginManifest {
    /// 새 매니페스트 생성
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            remote_entry_url: format!("static://{}/plugin-entry.json", id),
            id,
            name: name.into(),
            version: PluginVersion::default(),
            description: None,
            dependencies: vec![],
            extensions: vec![],
            metadata: HashMap::new(),
        }
    }

    /// JSON 문자열에서 파싱
    pub fn from_json(json: &str) -> Result<Self> {
        let mut manifest: PluginManifest = serde_json::from_str(json)
            .map_err(|e| Error::InvalidManifest(e.to_string()))?;
        if manifest.name.is_empty() {
            manifest.name = manifest.id.clone();
        }
        Ok(manifest)
    }

    /// 빌더 패턴: 버전 설정
    pub fn with_version(mut self, version: PluginVersion) -> Self {
        self.version = version;
        self
    }

    /// 빌더 패턴: 설명 설정
    pub fn with_description(mut self, desc: impl Into<String>) -> Self {
        self.description = Some(desc.into());
        self
    }

    /// 빌더 패턴: 의존성 추가
    pub fn with_dependency(mut self, dep: PluginDependency) -> Self {
        self.dependencies.push(dep);
        self
    }

    /// 빌더 패턴: 익스텐션 추가
    pub fn with_extension(mut self, extension: ExtensionDeclaration) -> Self {
        self.extensions.push(extension);
        self
    }

    /// 빌더 패턴: 원격 엔트리 URL
    pub fn with_remote_entry(mut self, url: impl Into<String>) -> Self {
        self.remote_entry_url = url.into();
        self
    }

    /// 빌더 패턴: 메타데이터 추가
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// index 번째 익스텐션의 uid
    pub fn extension_uid(&self, index: usize) -> String {
        format!("{}[{}]", self.id, index)
    }

    /// 로드 전 구조 검증
    pub fn validate(&self) -> Result<()> {
        if self.id.trim().is_empty() {
            return Err(Error::InvalidManifest("plugin id is empty".into()));
        }
        if self.id.chars().any(|c| c.is_whitespace() || c == '[' || c == ']') {
            return Err(Error::InvalidManifest(format!(
                "plugin id '{}' contains reserved characters",
                self.id
            )));
        }

        url::Url::parse(&self.remote_entry_url).map_err(|e| {
            Error::InvalidManifest(format!(
                "{}: invalid remoteEntryURL '{}': {}",
                self.id, self.remote_entry_url, e
            ))
        })?;

        let mut seen = HashSet::new();
        for dep in &self.dependencies {
            if dep.id == self.id {
                return Err(Error::InvalidManifest(format!(
                    "{}: plugin cannot depend on itself",
                    self.id
                )));
            }
            if !seen.insert(dep.id.as_str()) {
                return Err(Error::InvalidManifest(format!(
                    "{}: duplicate dependency '{}'",
                    self.id, dep.id
                )));
            }
        }

        for (index, ext) in self.extensions.iter().enumerate() {
            code_ref::validate_code_refs(&ext.properties).map_err(|e| {
                Error::InvalidManifest(format!("{}: {}", self.extension_uid(index), e))
            })?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const MANIFEST: &str = r#"{
        "id": "acme-plugin",
        "version": "1.2.0",
        "dependencies": [{ "id": "@console/pluginAPI", "versionRange": "^4.14.0" }],
        "extensions": [
            {
                "type": "console.page/route",
                "properties": { "path": "/acme", "component": { "$codeRef": "pages.AcmePage" } },
                "flags": { "required": ["ACME_ENABLED"] }
            },
            { "type": "console.navigation/href", "properties": { "id": "acme" }, "insertAfter": ["core[2]"] }
        ],
        "remoteEntryURL": "https://plugins.example.com/acme/plugin-entry.json"
    }"#;

    #[test]
    fn test_parse_manifest() {
        let manifest = PluginManifest::from_json(MANIFEST).unwrap();

        assert_eq!(manifest.id, "acme-plugin");
        // 이름이 없으면 id 사용
        assert_eq!(manifest.name, "acme-plugin");
        assert_eq!(manifest.version, PluginVersion::new(1, 2, 0));
        assert_eq!(manifest.dependencies[0].version_range.as_str(), "^4.14.0");
        assert_eq!(manifest.extensions.len(), 2);
        assert_eq!(manifest.extensions[0].kind, ExtensionKind::Page);
        assert_eq!(
            manifest.extensions[0].flags.as_ref().unwrap().required,
            vec!["ACME_ENABLED".to_string()]
        );
        assert_eq!(manifest.extensions[1].insert_after, vec!["core[2]".to_string()]);
        manifest.validate().unwrap();
    }

    #[test]
    fn test_manifest_builder() {
        let manifest = PluginManifest::new("test-plugin", "Test Plugin")
            .with_version(PluginVersion::new(2, 0, 0))
            .with_description("A test plugin")
            .with_dependency(PluginDependency::parse("base", "^1.0.0").unwrap())
            .with_extension(
                ExtensionDeclaration::new("console.flag", json!({ "handler": { "$codeRef": "flags" } }))
                    .requires_flag("A")
                    .disallows_flag("B"),
            );

        assert_eq!(manifest.extension_uid(0), "test-plugin[0]");
        assert_eq!(manifest.extensions[0].kind, ExtensionKind::FlagDetector);
        manifest.validate().unwrap();
    }

    #[test]
    fn test_validate_rejects_bad_manifests() {
        let no_id = PluginManifest::new("", "Nameless");
        assert!(matches!(no_id.validate(), Err(Error::InvalidManifest(_))));

        let self_dep = PluginManifest::new("a", "A")
            .with_dependency(PluginDependency::new("a", VersionRange::any()));
        assert!(self_dep.validate().is_err());

        let bad_url = PluginManifest::new("a", "A").with_remote_entry("not a url");
        assert!(bad_url.validate().is_err());

        let bad_ref = PluginManifest::new("a", "A").with_extension(ExtensionDeclaration::new(
            "console.page/route",
            json!({ "component": { "$codeRef": "" } }),
        ));
        assert!(bad_ref.validate().is_err());
    }

    #[test]
    fn test_invalid_version_is_manifest_error() {
        let json = r#"{ "id": "a", "version": "one", "remoteEntryURL": "https://x/y" }"#;
        assert!(matches!(
            PluginManifest::from_json(json),
            Err(Error::InvalidManifest(_))
        ));
    }
}
