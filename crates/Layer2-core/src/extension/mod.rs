//! # Extension System
//!
//! 플러그인이 기여한 익스텐션을 소비자에게 노출하는 계층
//!
//! ## 구성
//!
//! - `code_ref`: `{"$codeRef": "module.export"}` 인코딩
//! - `types`: `Extension`, `ExtensionKind`, predicate
//! - `flags`: feature flag 저장소와 gate
//! - `order`: `insertBefore` / `insertAfter` 정렬
//! - `resolver`: code reference 해석 캐시
//! - `store`: 필터링, 정렬, 구독, diff

pub mod code_ref;
pub mod flags;
pub mod order;
pub mod resolver;
pub mod store;
pub mod types;

pub use code_ref::{CodeReference, CODE_REF_KEY, DEFAULT_EXPORT};
pub use flags::{FeatureFlags, FlagChange, FlagListener, FlagState, Visibility};
pub use order::{order_extensions, BrokenEdge, OrderOutcome};
pub use resolver::{
    CodeRefResolver, ExtensionResolution, ResolutionListener, ResolutionStatus, ResolveResult,
};
pub use store::{ChangeListener, ExtensionPredicate, ExtensionStore, ResolvedChangeListener};
pub use types::{predicates, Extension, ExtensionFlags, ExtensionKind, ResolvedExtension};
