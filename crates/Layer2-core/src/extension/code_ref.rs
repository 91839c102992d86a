//! Code Reference - 지연 해석되는 export 포인터
//!
//! JSON 속성 안에서는 `{"$codeRef": "module.export"}` 로 인코딩된다.
//! 점이 없으면 `default` export 를 가리킨다.

use extrt_foundation::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashSet;

/// 인코딩 키
pub const CODE_REF_KEY: &str = "$codeRef";

/// export 이름이 생략된 경우
pub const DEFAULT_EXPORT: &str = "default";

/// 모듈 export 에 대한 직렬화 가능한 포인터
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeReference {
    pub module_id: String,
    pub export_name: String,
}

impl CodeReference {
    pub fn new(module_id: impl Into<String>, export_name: impl Into<String>) -> Self {
        Self {
            module_id: module_id.into(),
            export_name: export_name.into(),
        }
    }

    /// "module.export" 또는 "module" 파싱
    pub fn parse(encoded: &str) -> Result<Self> {
        let encoded = encoded.trim();
        let (module_id, export_name) = match encoded.split_once('.') {
            Some((module, export)) => (module, export),
            None => (encoded, DEFAULT_EXPORT),
        };

        if module_id.is_empty() || export_name.is_empty() || export_name.contains('.') {
            return Err(Error::InvalidManifest(format!(
                "malformed code reference '{}'",
                encoded
            )));
        }

        Ok(Self::new(module_id, export_name))
    }

    /// 인코딩 문자열 ("module.export")
    pub fn encode(&self) -> String {
        format!("{}.{}", self.module_id, self.export_name)
    }

    /// JSON 인코딩 (`{"$codeRef": ...}`)
    pub fn to_value(&self) -> Value {
        let mut map = Map::new();
        map.insert(CODE_REF_KEY.to_string(), Value::String(self.encode()));
        Value::Object(map)
    }

    /// JSON 값이 인코딩된 code reference 인지 판별
    ///
    /// 객체가 `$codeRef` 키 하나만 가질 때만 해당한다.
    pub fn decode(value: &Value) -> Option<Result<Self>> {
        let map = value.as_object()?;
        if map.len() != 1 {
            return None;
        }
        match map.get(CODE_REF_KEY)? {
            Value::String(encoded) => Some(Self::parse(encoded)),
            other => Some(Err(Error::InvalidManifest(format!(
                "code reference must be a string, got {}",
                other
            )))),
        }
    }
}

impl std::fmt::Display for CodeReference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.module_id, self.export_name)
    }
}

/// 속성 트리에서 모든 code reference 수집 (중복 제거, 선언 순서 유지)
///
/// 잘못된 인코딩은 건너뛴다. 매니페스트 검증 단계에서 이미 걸러진다.
pub fn collect_code_refs(value: &Value) -> Vec<CodeReference> {
    let mut refs = Vec::new();
    let mut seen = HashSet::new();
    visit(value, &mut |r| {
        if let Ok(r) = r {
            if seen.insert(r.clone()) {
                refs.push(r);
            }
        }
    });
    refs
}

/// 속성 트리의 모든 code reference 인코딩 검증
pub fn validate_code_refs(value: &Value) -> Result<()> {
    let mut first_error = None;
    visit(value, &mut |r| {
        if let Err(e) = r {
            first_error.get_or_insert(e);
        }
    });
    match first_error {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

/// code reference 를 치환한 사본 생성
///
/// `resolve` 가 None 을 돌려주면 원래 인코딩을 그대로 둔다.
pub fn replace_code_refs<F>(value: &Value, resolve: &mut F) -> Value
where
    F: FnMut(&CodeReference) -> Option<Value>,
{
    if let Some(Ok(code_ref)) = CodeReference::decode(value) {
        return resolve(&code_ref).unwrap_or_else(|| value.clone());
    }

    match value {
        Value::Array(items) => Value::Array(
            items
                .iter()
                .map(|item| replace_code_refs(item, resolve))
                .collect(),
        ),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), replace_code_refs(v, resolve)))
                .collect(),
        ),
        other => other.clone(),
    }
}

fn visit<F>(value: &Value, f: &mut F)
where
    F: FnMut(Result<CodeReference>),
{
    if let Some(decoded) = CodeReference::decode(value) {
        f(decoded);
        return;
    }

    match value {
        Value::Array(items) => items.iter().for_each(|item| visit(item, f)),
        Value::Object(map) => map.values().for_each(|v| visit(v, f)),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse() {
        let r = CodeReference::parse("pages.AcmePage").unwrap();
        assert_eq!(r.module_id, "pages");
        assert_eq!(r.export_name, "AcmePage");

        let r = CodeReference::parse("utils").unwrap();
        assert_eq!(r.export_name, DEFAULT_EXPORT);

        assert!(CodeReference::parse("").is_err());
        assert!(CodeReference::parse(".foo").is_err());
        assert!(CodeReference::parse("a.b.c").is_err());
    }

    #[test]
    fn test_decode_only_exact_objects() {
        assert!(CodeReference::decode(&json!({ "$codeRef": "a.b" })).is_some());
        // 다른 키가 섞이면 일반 객체
        assert!(CodeReference::decode(&json!({ "$codeRef": "a.b", "x": 1 })).is_none());
        assert!(matches!(
            CodeReference::decode(&json!({ "$codeRef": 5 })),
            Some(Err(_))
        ));
    }

    #[test]
    fn test_collect_nested_and_dedup() {
        let props = json!({
            "component": { "$codeRef": "pages.Main" },
            "tabs": [
                { "render": { "$codeRef": "pages.Tab" } },
                { "render": { "$codeRef": "pages.Main" } }
            ],
            "title": "Acme"
        });

        let refs = collect_code_refs(&props);
        assert_eq!(refs.len(), 2);
        assert!(refs.contains(&CodeReference::new("pages", "Main")));
        assert!(refs.contains(&CodeReference::new("pages", "Tab")));
    }

    #[test]
    fn test_replace() {
        let props = json!({
            "component": { "$codeRef": "pages.Main" },
            "nested": [{ "$codeRef": "pages.Missing" }]
        });

        let replaced = replace_code_refs(&props, &mut |r| {
            (r.export_name == "Main").then(|| json!("resolved-main"))
        });

        assert_eq!(replaced["component"], json!("resolved-main"));
        assert_eq!(replaced["nested"][0], json!({ "$codeRef": "pages.Missing" }));
    }

    #[test]
    fn test_validate_reports_malformed() {
        assert!(validate_code_refs(&json!({ "a": { "$codeRef": "ok.fine" } })).is_ok());
        assert!(validate_code_refs(&json!({ "a": [{ "$codeRef": "bad." }] })).is_err());
    }
}
