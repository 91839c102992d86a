//! Module Loading - 원격 컨테이너 접근 계층
//!
//! - `ModuleLoader`: shared scope 초기화, 엔트리 로드, 모듈 조회
//! - `HttpModuleLoader`: 네트워크로 원격 엔트리 JSON 을 가져옴
//! - `StaticModuleLoader`: 메모리 내 컨테이너 (번들 플러그인, 테스트)

pub mod http;
pub mod local;
pub mod traits;

pub use http::{HttpModuleLoader, MANIFEST_FILE};
pub use local::{StaticContainer, StaticModuleLoader};
pub use traits::{ExportValue, ModuleExports, ModuleLoader};
