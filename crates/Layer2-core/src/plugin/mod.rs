//! # Plugin System
//!
//! 원격 플러그인의 등록, 의존성 확인, 로드
//!
//! ## 아키텍처
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                   PluginRegistry                    │
//! │   pending → loading → loaded / failed               │
//! │        │                                            │
//! │        ▼                                            │
//! │  ┌──────────────────────┐    ┌──────────────────┐   │
//! │  │  RemotePluginLoader  │───▶│   ModuleLoader   │   │
//! │  │  (shared scope once) │    │  (http / static) │   │
//! │  └──────────────────────┘    └──────────────────┘   │
//! └─────────────────────────────────────────────────────┘
//! ```

pub mod events;
pub mod loader;
pub mod manifest;
pub mod registry;
pub mod version;

pub use events::{RegistryEvent, RegistryListener};
pub use loader::RemotePluginLoader;
pub use manifest::{ExtensionDeclaration, PluginDependency, PluginManifest};
pub use registry::{PluginInfo, PluginRegistry, PluginStatus, RegistrySummary};
pub use version::{PluginVersion, VersionRange};
