//! extrt-core: Dynamic Extension Runtime
//!
//! Layer2 - 플러그인 로드와 익스텐션 노출 레이어
//!
//! # 주요 모듈
//!
//! - `plugin`: 매니페스트, 버전 범위, 레지스트리, 원격 로더
//! - `module`: `ModuleLoader` 추상화 (HTTP / 정적)
//! - `extension`: code reference, feature flag, 정렬, resolver, store
//! - `runtime`: 위 구성 요소를 묶은 `Runtime`
//!
//! # 사용 예시
//!
//! ```ignore
//! use extrt_core::{predicates, HttpModuleLoader, Runtime};
//!
//! let modules = Arc::new(HttpModuleLoader::new(&config)?);
//! let runtime = Runtime::new(config, modules)?;
//!
//! runtime.register_from_url("https://plugins.example.com/acme").await?;
//!
//! // 페이지 익스텐션 구독
//! runtime.subscribe(
//!     Arc::new(predicates::is_page),
//!     Arc::new(|added, removed| println!("+{} -{}", added.len(), removed.len())),
//! );
//! ```

pub mod extension;
pub mod module;
pub mod plugin;
pub mod runtime;

// Re-exports: Runtime
pub use runtime::Runtime;

// Re-exports: Plugin
pub use plugin::{
    ExtensionDeclaration, PluginDependency, PluginInfo, PluginManifest, PluginRegistry,
    PluginStatus, PluginVersion, RegistryEvent, RegistrySummary, RemotePluginLoader,
    VersionRange,
};

// Re-exports: Module
pub use module::{
    ExportValue, HttpModuleLoader, ModuleExports, ModuleLoader, StaticContainer,
    StaticModuleLoader,
};

// Re-exports: Extension
pub use extension::{
    order_extensions, predicates, BrokenEdge, ChangeListener, CodeRefResolver, CodeReference,
    Extension, ExtensionFlags, ExtensionKind, ExtensionPredicate, ExtensionResolution, ExtensionStore,
    FeatureFlags, FlagChange, FlagState, OrderOutcome, ResolutionStatus, ResolvedChangeListener,
    ResolvedExtension, Visibility,
};
