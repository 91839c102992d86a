//! Registry Events - 플러그인 상태 변화 알림

use super::registry::PluginStatus;
use std::sync::Arc;

/// 레지스트리 이벤트
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryEvent {
    /// 상태 전이
    StatusChanged {
        plugin_id: String,
        previous: PluginStatus,
        status: PluginStatus,
    },

    /// 활성화 여부 변경
    EnabledChanged { plugin_id: String, enabled: bool },

    /// 등록 해제
    Unregistered {
        plugin_id: String,
        previous: PluginStatus,
    },
}

impl RegistryEvent {
    pub fn plugin_id(&self) -> &str {
        match self {
            Self::StatusChanged { plugin_id, .. }
            | Self::EnabledChanged { plugin_id, .. }
            | Self::Unregistered { plugin_id, .. } => plugin_id,
        }
    }

    /// 노출되는 익스텐션 집합이 바뀔 수 있는 이벤트인지
    pub fn affects_extensions(&self) -> bool {
        match self {
            Self::StatusChanged {
                previous, status, ..
            } => *previous == PluginStatus::Loaded || *status == PluginStatus::Loaded,
            Self::EnabledChanged { .. } => true,
            Self::Unregistered { previous, .. } => *previous == PluginStatus::Loaded,
        }
    }

    /// 이 플러그인의 해석 캐시를 버려야 하는지
    ///
    /// 새로 loaded 가 될 때도 버린다 (컨테이너가 없던 동안 기록된 실패 포함).
    pub fn invalidates_resolutions(&self) -> bool {
        match self {
            Self::StatusChanged {
                previous, status, ..
            } => *previous == PluginStatus::Loaded || *status == PluginStatus::Loaded,
            Self::Unregistered { .. } => true,
            Self::EnabledChanged { .. } => false,
        }
    }
}

/// 레지스트리 리스너
pub type RegistryListener = Arc<dyn Fn(&RegistryEvent) + Send + Sync>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_affects_extensions() {
        let loaded = RegistryEvent::StatusChanged {
            plugin_id: "a".into(),
            previous: PluginStatus::Loading,
            status: PluginStatus::Loaded,
        };
        assert!(loaded.affects_extensions());
        assert!(loaded.invalidates_resolutions());

        let loading = RegistryEvent::StatusChanged {
            plugin_id: "a".into(),
            previous: PluginStatus::Pending,
            status: PluginStatus::Loading,
        };
        assert!(!loading.affects_extensions());
        assert!(!loading.invalidates_resolutions());

        let removed = RegistryEvent::Unregistered {
            plugin_id: "a".into(),
            previous: PluginStatus::Failed,
        };
        assert!(!removed.affects_extensions());
        assert!(removed.invalidates_resolutions());
        assert_eq!(removed.plugin_id(), "a");
    }
}
