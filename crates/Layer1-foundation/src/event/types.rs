//! Diagnostic Types - 런타임 진단 이벤트 정의
//!
//! 플러그인 로드 실패, 정렬 사이클 등 소비자에게 throw 하지 않고
//! 보고만 하는 사건들의 공통 구조입니다.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// Diagnostic ID
// ============================================================================

/// 진단 이벤트 고유 ID
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DiagnosticId(pub String);

impl DiagnosticId {
    /// 새 ID 생성
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

impl Default for DiagnosticId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for DiagnosticId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Diagnostic Code
// ============================================================================

/// 진단 코드
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticCode {
    /// 의존성 미충족으로 로드 전에 거부됨
    DependencyUnsatisfied,
    /// 네트워크/인스턴스화 실패
    LoadFailure,
    /// 특정 code reference 해석 실패
    ResolutionFailure,
    /// 정렬 힌트 사이클 (자동 복구됨)
    OrderingCycle,
    /// 매니페스트 형식 오류
    InvalidManifest,
}

impl DiagnosticCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DependencyUnsatisfied => "dependency_unsatisfied",
            Self::LoadFailure => "load_failure",
            Self::ResolutionFailure => "resolution_failure",
            Self::OrderingCycle => "ordering_cycle",
            Self::InvalidManifest => "invalid_manifest",
        }
    }

    /// 자동 복구되는 (치명적이지 않은) 코드인지
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::OrderingCycle)
    }
}

impl std::fmt::Display for DiagnosticCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Diagnostic
// ============================================================================

/// 구조화된 진단 이벤트
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Diagnostic {
    /// 진단 ID
    pub id: DiagnosticId,

    /// 진단 코드
    pub code: DiagnosticCode,

    /// 관련 플러그인 (있는 경우)
    pub plugin_id: Option<String>,

    /// 사람이 읽을 수 있는 메시지
    pub message: String,

    /// 발생 시간
    pub timestamp: DateTime<Utc>,
}

impl Diagnostic {
    /// 새 진단 생성
    pub fn new(code: DiagnosticCode, message: impl Into<String>) -> Self {
        Self {
            id: DiagnosticId::new(),
            code,
            plugin_id: None,
            message: message.into(),
            timestamp: Utc::now(),
        }
    }

    /// 플러그인 ID 설정
    pub fn with_plugin(mut self, plugin_id: impl Into<String>) -> Self {
        self.plugin_id = Some(plugin_id.into());
        self
    }

    /// 특정 플러그인 관련인지 확인
    pub fn is_for(&self, plugin_id: &str) -> bool {
        self.plugin_id.as_deref() == Some(plugin_id)
    }
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.plugin_id {
            Some(plugin) => write!(f, "[{}] {}: {}", self.code, plugin, self.message),
            None => write!(f, "[{}] {}", self.code, self.message),
        }
    }
}

// ============================================================================
// 사전 정의된 진단 생성자
// ============================================================================

/// 플러그인 라이프사이클 진단
pub mod plugin {
    use super::*;

    pub fn dependency_unsatisfied(plugin_id: &str, message: impl Into<String>) -> Diagnostic {
        Diagnostic::new(DiagnosticCode::DependencyUnsatisfied, message).with_plugin(plugin_id)
    }

    pub fn load_failed(plugin_id: &str, message: impl Into<String>) -> Diagnostic {
        Diagnostic::new(DiagnosticCode::LoadFailure, message).with_plugin(plugin_id)
    }

    pub fn invalid_manifest(plugin_id: &str, message: impl Into<String>) -> Diagnostic {
        Diagnostic::new(DiagnosticCode::InvalidManifest, message).with_plugin(plugin_id)
    }
}

/// 익스텐션 진단
pub mod extension {
    use super::*;

    pub fn resolution_failed(plugin_id: &str, code_ref: &str, message: &str) -> Diagnostic {
        Diagnostic::new(
            DiagnosticCode::ResolutionFailure,
            format!("{}: {}", code_ref, message),
        )
        .with_plugin(plugin_id)
    }

    /// 사이클을 끊기 위해 제거된 정렬 힌트
    pub fn ordering_cycle(plugin_id: &str, from: &str, to: &str) -> Diagnostic {
        Diagnostic::new(
            DiagnosticCode::OrderingCycle,
            format!("dropped ordering hint {} -> {} to break a cycle", from, to),
        )
        .with_plugin(plugin_id)
    }
}
