//! Error types for extrt
//!
//! 런타임 전체의 에러를 중앙에서 관리

use crate::event::DiagnosticCode;
use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// extrt 에러 타입
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // 설정 관련
    // ========================================================================
    #[error("Configuration error: {0}")]
    Config(String),

    // ========================================================================
    // 플러그인 관련
    // ========================================================================
    #[error("Invalid manifest: {0}")]
    InvalidManifest(String),

    #[error("Dependency unsatisfied: {plugin} requires {dependency} ({reason})")]
    DependencyUnsatisfied {
        plugin: String,
        dependency: String,
        reason: String,
    },

    #[error("Load failure: {plugin} - {message}")]
    LoadFailure { plugin: String, message: String },

    #[error("Shared scope initialization failed: {0}")]
    SharedScope(String),

    // ========================================================================
    // 익스텐션 관련
    // ========================================================================
    #[error("Resolution failure: {plugin} {code_ref} - {message}")]
    ResolutionFailure {
        plugin: String,
        code_ref: String,
        message: String,
    },

    #[error("Ordering cycle: {0}")]
    OrderingCycle(String),

    // ========================================================================
    // 실행 관련
    // ========================================================================
    #[error("Timeout: {0}")]
    Timeout(String),

    // ========================================================================
    // 일반
    // ========================================================================
    #[error("Not found: {0}")]
    NotFound(String),

    // ========================================================================
    // 외부 에러 변환
    // ========================================================================
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("HTTP error: {0}")]
    Http(String),

    // ========================================================================
    // 기타
    // ========================================================================
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// 의존성 에러 생성 헬퍼
    pub fn dependency(
        plugin: impl Into<String>,
        dependency: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Error::DependencyUnsatisfied {
            plugin: plugin.into(),
            dependency: dependency.into(),
            reason: reason.into(),
        }
    }

    /// 로드 실패 에러 생성 헬퍼
    pub fn load_failure(plugin: impl Into<String>, message: impl Into<String>) -> Self {
        Error::LoadFailure {
            plugin: plugin.into(),
            message: message.into(),
        }
    }

    /// Code reference 해석 실패 에러 생성 헬퍼
    pub fn resolution(
        plugin: impl Into<String>,
        code_ref: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Error::ResolutionFailure {
            plugin: plugin.into(),
            code_ref: code_ref.into(),
            message: message.into(),
        }
    }

    /// 플러그인 단위로 종결되는 에러인지 확인
    ///
    /// 종결 에러는 재시도하지 않고 plugin status 로만 보고된다.
    pub fn is_terminal_for_plugin(&self) -> bool {
        matches!(
            self,
            Error::DependencyUnsatisfied { .. }
                | Error::LoadFailure { .. }
                | Error::SharedScope(_)
                | Error::InvalidManifest(_)
                | Error::Timeout(_)
        )
    }

    /// 진단 채널로 보고할 때 사용할 코드
    pub fn diagnostic_code(&self) -> DiagnosticCode {
        match self {
            Error::DependencyUnsatisfied { .. } => DiagnosticCode::DependencyUnsatisfied,
            Error::ResolutionFailure { .. } => DiagnosticCode::ResolutionFailure,
            Error::OrderingCycle(_) => DiagnosticCode::OrderingCycle,
            Error::InvalidManifest(_) => DiagnosticCode::InvalidManifest,
            _ => DiagnosticCode::LoadFailure,
        }
    }
}

// ============================================================================
// From 구현 (추가 변환)
// ============================================================================

impl From<String> for Error {
    fn from(s: String) -> Self {
        Error::Internal(s)
    }
}

impl From<&str> for Error {
    fn from(s: &str) -> Self {
        Error::Internal(s.to_string())
    }
}
