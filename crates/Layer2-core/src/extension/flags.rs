//! Feature Flag Gate
//!
//! flag 는 true / false / 미결정(absent) 세 상태를 가진다.
//! 미결정 flag 는 익스텐션을 숨기지도 보이지도 않고 보류(Pending)시킨다.

use super::types::ExtensionFlags;
use extrt_foundation::ListenerId;
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;

/// flag 이름 → 값 (없으면 미결정)
pub type FlagState = HashMap<String, bool>;

/// 익스텐션 가시성
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    Visible,
    Hidden,
    /// 참조한 flag 중 미결정이 있고 Hidden 으로 확정되지 않음
    Pending,
}

/// flag 조건 평가
///
/// 확정적으로 위반된 조건이 하나라도 있으면 Hidden,
/// 위반은 없지만 미결정 flag 가 있으면 Pending.
pub fn evaluate(flags: Option<&ExtensionFlags>, state: &FlagState) -> Visibility {
    let Some(flags) = flags else {
        return Visibility::Visible;
    };

    let mut pending = false;

    for name in &flags.required {
        match state.get(name) {
            Some(true) => {}
            Some(false) => return Visibility::Hidden,
            None => pending = true,
        }
    }

    for name in &flags.disallowed {
        match state.get(name) {
            Some(false) => {}
            Some(true) => return Visibility::Hidden,
            None => pending = true,
        }
    }

    if pending {
        Visibility::Pending
    } else {
        Visibility::Visible
    }
}

// ============================================================================
// FeatureFlags - flag 저장소
// ============================================================================

/// flag 변경 내용
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlagChange {
    pub name: String,
    pub previous: Option<bool>,
    pub current: Option<bool>,
}

/// flag 변경 리스너 (한 번의 set 호출에서 바뀐 flag 목록을 받음)
pub type FlagListener = Arc<dyn Fn(&[FlagChange]) + Send + Sync>;

/// 호스트가 결정하는 feature flag 저장소
pub struct FeatureFlags {
    state: RwLock<FlagState>,
    listeners: RwLock<Vec<(ListenerId, FlagListener)>>,
    next_listener_id: AtomicU64,
}

impl FeatureFlags {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(HashMap::new()),
            listeners: RwLock::new(Vec::new()),
            next_listener_id: AtomicU64::new(1),
        }
    }

    /// 초기값으로 생성
    pub fn with_initial(initial: &BTreeMap<String, bool>) -> Self {
        let flags = Self::new();
        flags
            .state
            .write()
            .extend(initial.iter().map(|(k, v)| (k.clone(), *v)));
        flags
    }

    /// flag 하나 설정 (None 이면 미결정으로 되돌림)
    ///
    /// 실제로 값이 바뀐 경우에만 리스너를 호출하고 true 를 반환한다.
    pub fn set_flag(&self, name: impl Into<String>, value: Option<bool>) -> bool {
        !self.set_flags([(name.into(), value)]).is_empty()
    }

    /// 여러 flag 를 한 번에 설정
    pub fn set_flags<I>(&self, updates: I) -> Vec<FlagChange>
    where
        I: IntoIterator<Item = (String, Option<bool>)>,
    {
        let changes: Vec<FlagChange> = {
            let mut state = self.state.write();
            updates
                .into_iter()
                .filter_map(|(name, value)| {
                    let previous = match value {
                        Some(v) => state.insert(name.clone(), v),
                        None => state.remove(&name),
                    };
                    (previous != value).then_some(FlagChange {
                        name,
                        previous,
                        current: value,
                    })
                })
                .collect()
        };

        if !changes.is_empty() {
            debug!(count = changes.len(), "Feature flags changed");
            let listeners: Vec<FlagListener> =
                self.listeners.read().iter().map(|(_, l)| l.clone()).collect();
            for listener in listeners {
                listener(&changes);
            }
        }

        changes
    }

    pub fn get(&self, name: &str) -> Option<bool> {
        self.state.read().get(name).copied()
    }

    /// 현재 상태 사본
    pub fn snapshot(&self) -> FlagState {
        self.state.read().clone()
    }

    /// 현재 상태로 조건 평가
    pub fn evaluate(&self, flags: Option<&ExtensionFlags>) -> Visibility {
        evaluate(flags, &self.state.read())
    }

    pub fn subscribe(&self, listener: FlagListener) -> ListenerId {
        let id = ListenerId::new(self.next_listener_id.fetch_add(1, Ordering::SeqCst));
        self.listeners.write().push((id, listener));
        id
    }

    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.write();
        let before = listeners.len();
        listeners.retain(|(lid, _)| *lid != id);
        listeners.len() != before
    }
}

impl Default for FeatureFlags {
    fn default() -> Self {
        Self::new()
    }
}
