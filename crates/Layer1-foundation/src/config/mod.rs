//! Config - 런타임 설정 관리
//!
//! - `runtime.rs` - RuntimeConfig (호스트 API 버전, 타임아웃, 초기 flag 등)
//! - `loader.rs` - 사용자/프로젝트/명시 파일 계층 병합 로더

mod loader;
mod runtime;

pub use loader::{ConfigLoader, CONFIG_DIR_NAME};
pub use runtime::{
    RuntimeConfig, DEFAULT_SHARED_MODULES, PLUGIN_API_DEPENDENCY, RUNTIME_CONFIG_FILE,
};
