//! Diagnostics - 구조화된 진단 채널
//!
//! 플러그인 로드 실패나 정렬 사이클 복구는 예외로 던지지 않고
//! 이 채널로 보고됩니다. 호스트 UI는 이를 구독해 플러그인 상태를 표시합니다.
//!
//! ```text
//! PluginRegistry ──┐
//! CodeRefResolver ─┼──► DiagnosticBus ──► broadcast receivers
//! ExtensionStore ──┘          │
//!                             └─────────► DiagnosticListener (sync)
//! ```

pub mod bus;
pub mod types;

pub use bus::{DiagnosticBus, DiagnosticBusConfig, DiagnosticListener, ListenerId};
pub use types::{extension, plugin, Diagnostic, DiagnosticCode, DiagnosticId};
