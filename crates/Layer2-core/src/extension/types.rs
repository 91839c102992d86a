//! Extension Types - 플러그인 기여 항목

use super::code_ref::{collect_code_refs, CodeReference};
use crate::plugin::ExtensionDeclaration;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

// ============================================================================
// ExtensionKind - 익스텐션 타입 (tagged union)
// ============================================================================

/// 익스텐션 타입
///
/// 콘솔이 알고 있는 타입은 variant 로, 나머지는 `Other` 로 보존된다.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ExtensionKind {
    /// `console.page/route`
    Page,
    /// `console.navigation/href`
    NavItem,
    /// `console.navigation/section`
    NavSection,
    /// `console.dashboards/card`
    DashboardCard,
    /// `console.dashboards/overview/health/resource`
    HealthResource,
    /// `console.flag`
    FlagDetector,
    /// `console.flag/model`
    FlagModel,
    Other(String),
}

impl ExtensionKind {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Page => "console.page/route",
            Self::NavItem => "console.navigation/href",
            Self::NavSection => "console.navigation/section",
            Self::DashboardCard => "console.dashboards/card",
            Self::HealthResource => "console.dashboards/overview/health/resource",
            Self::FlagDetector => "console.flag",
            Self::FlagModel => "console.flag/model",
            Self::Other(kind) => kind,
        }
    }
}

impl From<&str> for ExtensionKind {
    fn from(s: &str) -> Self {
        match s {
            "console.page/route" => Self::Page,
            "console.navigation/href" => Self::NavItem,
            "console.navigation/section" => Self::NavSection,
            "console.dashboards/card" => Self::DashboardCard,
            "console.dashboards/overview/health/resource" => Self::HealthResource,
            "console.flag" => Self::FlagDetector,
            "console.flag/model" => Self::FlagModel,
            other => Self::Other(other.to_string()),
        }
    }
}

impl From<String> for ExtensionKind {
    fn from(s: String) -> Self {
        Self::from(s.as_str())
    }
}

impl From<ExtensionKind> for String {
    fn from(kind: ExtensionKind) -> Self {
        kind.as_str().to_string()
    }
}

impl std::fmt::Display for ExtensionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// ExtensionFlags
// ============================================================================

/// feature flag 조건
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtensionFlags {
    /// 모두 true 여야 하는 flag
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub required: Vec<String>,

    /// 모두 false 여야 하는 flag
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub disallowed: Vec<String>,
}

impl ExtensionFlags {
    pub fn is_empty(&self) -> bool {
        self.required.is_empty() && self.disallowed.is_empty()
    }
}

// ============================================================================
// Extension
// ============================================================================

/// 플러그인이 기여한 익스텐션
///
/// 생성 후 불변. 가시성과 해석 상태는 Store 에서 파생된다.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Extension {
    /// 전역 고유 ID (`{pluginId}[{index}]`)
    pub uid: String,

    #[serde(rename = "type")]
    pub kind: ExtensionKind,

    pub plugin_id: String,

    pub properties: Value,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub flags: Option<ExtensionFlags>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub insert_before: Vec<String>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub insert_after: Vec<String>,
}

impl Extension {
    /// 매니페스트 선언에서 생성
    pub fn from_declaration(plugin_id: &str, index: usize, decl: &ExtensionDeclaration) -> Self {
        Self {
            uid: format!("{}[{}]", plugin_id, index),
            kind: decl.kind.clone(),
            plugin_id: plugin_id.to_string(),
            properties: decl.properties.clone(),
            flags: decl.flags.clone().filter(|f| !f.is_empty()),
            insert_before: decl.insert_before.clone(),
            insert_after: decl.insert_after.clone(),
        }
    }

    /// 속성에 포함된 code reference
    pub fn code_refs(&self) -> Vec<CodeReference> {
        collect_code_refs(&self.properties)
    }

    pub fn has_code_refs(&self) -> bool {
        !self.code_refs().is_empty()
    }

    pub fn is(&self, kind: &ExtensionKind) -> bool {
        &self.kind == kind
    }
}

/// code reference 가 모두 해석된 익스텐션
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedExtension {
    /// 원본 익스텐션
    pub extension: Arc<Extension>,

    /// code reference 가 해석된 값으로 치환된 속성
    pub properties: Value,
}

impl ResolvedExtension {
    pub fn uid(&self) -> &str {
        &self.extension.uid
    }
}

// ============================================================================
// Predicates - 타입 태그 비교
// ============================================================================

/// 익스텐션 선택 조건
pub mod predicates {
    use super::*;

    pub fn any(_: &Extension) -> bool {
        true
    }

    pub fn is_page(e: &Extension) -> bool {
        e.kind == ExtensionKind::Page
    }

    pub fn is_nav_item(e: &Extension) -> bool {
        matches!(e.kind, ExtensionKind::NavItem | ExtensionKind::NavSection)
    }

    pub fn is_dashboard_card(e: &Extension) -> bool {
        e.kind == ExtensionKind::DashboardCard
    }

    pub fn is_health_resource(e: &Extension) -> bool {
        e.kind == ExtensionKind::HealthResource
    }

    pub fn is_flag_provider(e: &Extension) -> bool {
        matches!(e.kind, ExtensionKind::FlagDetector | ExtensionKind::FlagModel)
    }

    /// 특정 타입
    pub fn of_kind(kind: impl Into<ExtensionKind>) -> impl Fn(&Extension) -> bool + Send + Sync + 'static {
        let kind = kind.into();
        move |e| e.kind == kind
    }

    /// 특정 플러그인이 기여한 것
    pub fn from_plugin(plugin_id: impl Into<String>) -> impl Fn(&Extension) -> bool + Send + Sync + 'static {
        let plugin_id = plugin_id.into();
        move |e| e.plugin_id == plugin_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_kind_roundtrip_unknown() {
        let kind: ExtensionKind = serde_json::from_value(json!("acme.widget/tile")).unwrap();
        assert_eq!(kind, ExtensionKind::Other("acme.widget/tile".into()));
        assert_eq!(serde_json::to_value(&kind).unwrap(), json!("acme.widget/tile"));
        assert_eq!(ExtensionKind::from("console.page/route"), ExtensionKind::Page);
    }

    #[test]
    fn test_from_declaration() {
        let decl = ExtensionDeclaration::new(
            "console.dashboards/card",
            json!({ "component": { "$codeRef": "cards.Usage" } }),
        )
        .insert_after("core[0]");

        let ext = Extension::from_declaration("acme", 3, &decl);
        assert_eq!(ext.uid, "acme[3]");
        assert_eq!(ext.plugin_id, "acme");
        assert!(predicates::is_dashboard_card(&ext));
        assert!(!predicates::is_page(&ext));
        assert_eq!(ext.code_refs(), vec![CodeReference::new("cards", "Usage")]);
        assert_eq!(ext.insert_after, vec!["core[0]".to_string()]);
        // 빈 flag 조건은 없음으로 정규화
        assert!(ext.flags.is_none());
    }

    #[test]
    fn test_predicates() {
        let decl = ExtensionDeclaration::new("console.navigation/section", json!({}));
        let ext = Extension::from_declaration("acme", 0, &decl);

        assert!(predicates::is_nav_item(&ext));
        assert!(predicates::of_kind("console.navigation/section")(&ext));
        assert!(predicates::from_plugin("acme")(&ext));
        assert!(!predicates::from_plugin("other")(&ext));
    }
}
