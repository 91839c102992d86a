//! # extrt-foundation
//!
//! Foundation layer for extrt:
//! - Error: 런타임 에러 분류 (DependencyUnsatisfied, LoadFailure, ...)
//! - Config: RuntimeConfig 및 계층형 설정 로더
//! - Event: 구조화된 진단 채널 (DiagnosticBus)
//!
//! ## 아키텍처
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │  extrt-core (Registry / Loader / Resolver / Store)       │
//! │                     │                                   │
//! │          ┌─────────┴─────────┐                         │
//! │          ▼                   ▼                         │
//! │   RuntimeConfig        DiagnosticBus                   │
//! │   (json / toml)        (broadcast + history)           │
//! └─────────────────────────────────────────────────────────┘
//! ```

pub mod config;
pub mod error;
pub mod event;

// ============================================================================
// Error
// ============================================================================
pub use error::{Error, Result};

// ============================================================================
// Config (설정)
// ============================================================================
pub use config::{
    ConfigLoader, RuntimeConfig, CONFIG_DIR_NAME, DEFAULT_SHARED_MODULES, PLUGIN_API_DEPENDENCY,
    RUNTIME_CONFIG_FILE,
};

// ============================================================================
// Event (진단 채널)
// ============================================================================
pub use event::{
    Diagnostic, DiagnosticBus, DiagnosticBusConfig, DiagnosticCode, DiagnosticId,
    DiagnosticListener, ListenerId,
};
