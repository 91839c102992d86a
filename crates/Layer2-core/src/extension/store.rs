//! Extension Store - 소비자용 익스텐션 뷰
//!
//! 파이프라인:
//!
//! ```text
//! loaded + enabled 플러그인 → predicate → flag gate → orderer → (resolver)
//! ```
//!
//! 구독자마다 이전 스냅샷을 보관하고 uid 기준으로 diff 를 계산한다.
//! 변화가 없으면 리스너를 호출하지 않는다.
//!
//! 변경분은 스냅샷이 바뀐 순서대로 하나의 큐에 쌓이고, 한 번에 한 호출자만
//! 큐를 비운다. 리스너 안에서 다시 재계산이 일어나면 그 변경분은 현재 전달이
//! 끝난 뒤에 이어서 전달된다.

use super::flags::{FeatureFlags, Visibility};
use super::order::{order_extensions, BrokenEdge, OrderOutcome};
use super::resolver::{CodeRefResolver, ExtensionResolution};
use super::types::{Extension, ResolvedExtension};
use crate::plugin::PluginRegistry;
use extrt_foundation::event::extension as diagnostics;
use extrt_foundation::{DiagnosticBus, ListenerId};
use futures::future;
use parking_lot::Mutex;
use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

/// 익스텐션 선택 조건
pub type ExtensionPredicate = Arc<dyn Fn(&Extension) -> bool + Send + Sync>;

/// 변경 리스너 `(added, removed)`
pub type ChangeListener = Arc<dyn Fn(&[Arc<Extension>], &[Arc<Extension>]) + Send + Sync>;

/// 해석된 익스텐션 변경 리스너 `(added, removed)`
pub type ResolvedChangeListener =
    Arc<dyn Fn(&[ResolvedExtension], &[ResolvedExtension]) + Send + Sync>;

/// 구독 종류별 리스너와 마지막 스냅샷
enum View {
    Plain {
        listener: ChangeListener,
        snapshot: Vec<Arc<Extension>>,
    },
    Resolved {
        listener: ResolvedChangeListener,
        snapshot: Vec<ResolvedExtension>,
    },
}

struct Subscription {
    id: ListenerId,
    predicate: ExtensionPredicate,
    view: View,
}

/// 전달 대기 중인 변경
enum PendingChange {
    Plain {
        id: ListenerId,
        listener: ChangeListener,
        added: Vec<Arc<Extension>>,
        removed: Vec<Arc<Extension>>,
    },
    Resolved {
        id: ListenerId,
        listener: ResolvedChangeListener,
        added: Vec<ResolvedExtension>,
        removed: Vec<ResolvedExtension>,
    },
}

impl PendingChange {
    fn id(&self) -> ListenerId {
        match self {
            Self::Plain { id, .. } | Self::Resolved { id, .. } => *id,
        }
    }

    fn deliver(&self) {
        match self {
            Self::Plain {
                listener,
                added,
                removed,
                ..
            } => {
                debug!(added = added.len(), removed = removed.len(), "Extension set changed");
                listener(added.as_slice(), removed.as_slice());
            }
            Self::Resolved {
                listener,
                added,
                removed,
                ..
            } => {
                debug!(
                    added = added.len(),
                    removed = removed.len(),
                    "Resolved extension set changed"
                );
                listener(added.as_slice(), removed.as_slice());
            }
        }
    }
}

#[derive(Default)]
struct DeliveryQueue {
    pending: VecDeque<PendingChange>,
    delivering: bool,
}

pub struct ExtensionStore {
    registry: Arc<PluginRegistry>,
    flags: Arc<FeatureFlags>,
    resolver: Arc<CodeRefResolver>,
    diagnostics: Arc<DiagnosticBus>,

    subscriptions: Mutex<Vec<Subscription>>,
    /// 구독 잠금 안에서만 추가 (스냅샷 갱신 순서 = 전달 순서)
    delivery: Mutex<DeliveryQueue>,
    /// 이미 보고한 정렬 사이클 (같은 사이클을 반복 보고하지 않음)
    reported_cycles: Mutex<HashSet<BrokenEdge>>,
    next_listener_id: AtomicU64,
}

impl ExtensionStore {
    pub fn new(
        registry: Arc<PluginRegistry>,
        flags: Arc<FeatureFlags>,
        resolver: Arc<CodeRefResolver>,
        diagnostics: Arc<DiagnosticBus>,
    ) -> Self {
        Self {
            registry,
            flags,
            resolver,
            diagnostics,
            subscriptions: Mutex::new(Vec::new()),
            delivery: Mutex::new(DeliveryQueue::default()),
            reported_cycles: Mutex::new(HashSet::new()),
            next_listener_id: AtomicU64::new(1),
        }
    }

    // ========================================================================
    // 조회
    // ========================================================================

    /// 현재 보이는 익스텐션 (정렬됨)
    pub fn get_extensions<P>(&self, predicate: P) -> Vec<Arc<Extension>>
    where
        P: Fn(&Extension) -> bool,
    {
        let outcome = self.compute(&predicate);
        self.report_cycles(&outcome.broken_edges);
        outcome.extensions
    }

    /// code reference 가 모두 해석된 익스텐션
    ///
    /// 해석에 실패한 익스텐션만 빠지고 나머지는 순서대로 반환된다.
    pub async fn get_resolved_extensions<P>(&self, predicate: P) -> Vec<ResolvedExtension>
    where
        P: Fn(&Extension) -> bool,
    {
        let extensions = self.get_extensions(predicate);
        let results = future::join_all(
            extensions
                .iter()
                .map(|extension| self.resolver.resolve_extension(extension)),
        )
        .await;

        results
            .into_iter()
            .filter_map(|result| match result {
                Ok(resolved) => Some(resolved),
                Err(e) => {
                    debug!("Excluding unresolved extension: {}", e);
                    None
                }
            })
            .collect()
    }

    // ========================================================================
    // 구독
    // ========================================================================

    /// 변경 구독
    ///
    /// 현재 스냅샷이 비어 있지 않으면 `added` 로 한 번 전달된다.
    pub fn subscribe(&self, predicate: ExtensionPredicate, listener: ChangeListener) -> ListenerId {
        let id = self.next_id();

        let broken_edges = {
            let mut subscriptions = self.subscriptions.lock();
            let outcome = self.compute(predicate.as_ref());
            debug!(%id, extensions = outcome.extensions.len(), "Extension subscriber added");

            if !outcome.extensions.is_empty() {
                self.delivery.lock().pending.push_back(PendingChange::Plain {
                    id,
                    listener: listener.clone(),
                    added: outcome.extensions.clone(),
                    removed: Vec::new(),
                });
            }
            subscriptions.push(Subscription {
                id,
                predicate,
                view: View::Plain {
                    listener,
                    snapshot: outcome.extensions,
                },
            });
            outcome.broken_edges
        };

        self.report_cycles(&broken_edges);
        self.drain();
        id
    }

    /// code reference 가 모두 해석된 익스텐션의 변경 구독
    ///
    /// 아직 해석되지 않은 익스텐션은 해석을 시작하고, 해석이 끝나면 `added` 로
    /// 전달된다. 해석에 실패한 익스텐션은 전달되지 않는다.
    pub fn subscribe_resolved(
        &self,
        predicate: ExtensionPredicate,
        listener: ResolvedChangeListener,
    ) -> ListenerId {
        let id = self.next_id();

        let broken_edges = {
            let mut subscriptions = self.subscriptions.lock();
            let outcome = self.compute(predicate.as_ref());
            let resolved = self.resolve_ready(&outcome.extensions);
            debug!(%id, extensions = resolved.len(), "Resolved extension subscriber added");

            if !resolved.is_empty() {
                self.delivery.lock().pending.push_back(PendingChange::Resolved {
                    id,
                    listener: listener.clone(),
                    added: resolved.clone(),
                    removed: Vec::new(),
                });
            }
            subscriptions.push(Subscription {
                id,
                predicate,
                view: View::Resolved {
                    listener,
                    snapshot: resolved,
                },
            });
            outcome.broken_edges
        };

        self.report_cycles(&broken_edges);
        self.drain();
        id
    }

    /// 구독 해제 (대기 중인 변경도 전달되지 않음)
    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        let removed = {
            let mut subscriptions = self.subscriptions.lock();
            let before = subscriptions.len();
            subscriptions.retain(|s| s.id != id);
            subscriptions.len() != before
        };
        if removed {
            self.delivery.lock().pending.retain(|change| change.id() != id);
        }
        removed
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscriptions.lock().len()
    }

    /// 모든 구독자의 스냅샷을 다시 계산하고 변경분을 전달
    ///
    /// 레지스트리, flag, code reference 해석 결과가 바뀔 때 호출된다.
    pub fn recompute(&self) {
        let mut broken_edges = Vec::new();

        {
            let mut subscriptions = self.subscriptions.lock();
            let mut changes = Vec::new();
            for subscription in subscriptions.iter_mut() {
                let outcome = self.compute(subscription.predicate.as_ref());
                broken_edges.extend(outcome.broken_edges);

                match &mut subscription.view {
                    View::Plain { listener, snapshot } => {
                        let (added, removed) =
                            diff(snapshot.as_slice(), &outcome.extensions, |e| &e.uid);
                        *snapshot = outcome.extensions;
                        if !added.is_empty() || !removed.is_empty() {
                            changes.push(PendingChange::Plain {
                                id: subscription.id,
                                listener: listener.clone(),
                                added,
                                removed,
                            });
                        }
                    }
                    View::Resolved { listener, snapshot } => {
                        let resolved = self.resolve_ready(&outcome.extensions);
                        let (added, removed) =
                            diff(snapshot.as_slice(), &resolved, |r| &r.extension.uid);
                        *snapshot = resolved;
                        if !added.is_empty() || !removed.is_empty() {
                            changes.push(PendingChange::Resolved {
                                id: subscription.id,
                                listener: listener.clone(),
                                added,
                                removed,
                            });
                        }
                    }
                }
            }
            self.delivery.lock().pending.extend(changes);
        }

        self.report_cycles(&broken_edges);
        self.drain();
    }

    // ========================================================================
    // 내부
    // ========================================================================

    fn next_id(&self) -> ListenerId {
        ListenerId::new(self.next_listener_id.fetch_add(1, Ordering::SeqCst))
    }

    /// 대기 중인 변경을 순서대로 전달
    ///
    /// 이미 다른 호출이 전달 중이면 그쪽이 이어서 비우므로 바로 반환한다.
    fn drain(&self) {
        {
            let mut delivery = self.delivery.lock();
            if delivery.delivering {
                return;
            }
            delivery.delivering = true;
        }

        loop {
            let change = {
                let mut delivery = self.delivery.lock();
                match delivery.pending.pop_front() {
                    Some(change) => change,
                    None => {
                        delivery.delivering = false;
                        return;
                    }
                }
            };
            change.deliver();
        }
    }

    fn compute(&self, predicate: &dyn Fn(&Extension) -> bool) -> OrderOutcome {
        let flag_state = self.flags.snapshot();

        let candidates: Vec<Arc<Extension>> = self
            .registry
            .extensions()
            .into_iter()
            .filter(|extension| predicate(extension))
            .filter(|extension| {
                super::flags::evaluate(extension.flags.as_ref(), &flag_state)
                    == Visibility::Visible
            })
            .collect();

        order_extensions(candidates)
    }

    /// 이미 해석된 익스텐션만 골라낸다
    ///
    /// 해석 전인 익스텐션은 백그라운드에서 해석을 시작한다. 완료되면 resolver
    /// 리스너를 통해 다시 재계산된다.
    fn resolve_ready(&self, extensions: &[Arc<Extension>]) -> Vec<ResolvedExtension> {
        let mut ready = Vec::new();
        for extension in extensions {
            match self.resolver.try_resolve_extension(extension) {
                ExtensionResolution::Ready(resolved) => ready.push(resolved),
                ExtensionResolution::Failed => {}
                ExtensionResolution::Pending => self.spawn_resolution(extension),
            }
        }
        ready
    }

    fn spawn_resolution(&self, extension: &Arc<Extension>) {
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            debug!(uid = %extension.uid, "No async runtime; resolution deferred");
            return;
        };

        let resolver = self.resolver.clone();
        let extension = extension.clone();
        handle.spawn(async move {
            if let Err(e) = resolver.resolve_extension(&extension).await {
                debug!(uid = %extension.uid, "Background resolution failed: {}", e);
            }
        });
    }

    fn report_cycles(&self, broken_edges: &[BrokenEdge]) {
        if broken_edges.is_empty() {
            return;
        }

        let fresh: Vec<BrokenEdge> = {
            let mut reported = self.reported_cycles.lock();
            broken_edges
                .iter()
                .filter(|edge| reported.insert((*edge).clone()))
                .cloned()
                .collect()
        };

        for edge in fresh {
            warn!(
                plugin = %edge.plugin_id,
                "Ordering cycle: dropped {} -> {} declared by {}",
                edge.before, edge.after, edge.declared_by
            );
            self.diagnostics.publish(diagnostics::ordering_cycle(
                &edge.plugin_id,
                &edge.before,
                &edge.after,
            ));
        }
    }
}

/// uid 기준 diff `(added, removed)`
fn diff<T, F>(previous: &[T], current: &[T], uid: F) -> (Vec<T>, Vec<T>)
where
    T: Clone,
    F: Fn(&T) -> &String,
{
    let previous_uids: HashSet<&str> = previous.iter().map(|e| uid(e).as_str()).collect();
    let current_uids: HashSet<&str> = current.iter().map(|e| uid(e).as_str()).collect();

    let added = current
        .iter()
        .filter(|e| !previous_uids.contains(uid(e).as_str()))
        .cloned()
        .collect();
    let removed = previous
        .iter()
        .filter(|e| !current_uids.contains(uid(e).as_str()))
        .cloned()
        .collect();

    (added, removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ext(uid: &str) -> Arc<Extension> {
        Arc::new(Extension {
            uid: uid.to_string(),
            kind: "console.page/route".into(),
            plugin_id: "p".to_string(),
            properties: json!({}),
            flags: None,
            insert_before: vec![],
            insert_after: vec![],
        })
    }

    fn uids(extensions: &[Arc<Extension>]) -> Vec<&str> {
        extensions.iter().map(|e| e.uid.as_str()).collect()
    }

    #[test]
    fn test_diff_by_uid() {
        let previous = vec![ext("p[0]"), ext("p[1]")];
        let current = vec![ext("p[1]"), ext("p[2]")];

        let (added, removed) = diff(&previous, &current, |e| &e.uid);
        assert_eq!(uids(&added), vec!["p[2]"]);
        assert_eq!(uids(&removed), vec!["p[0]"]);
    }

    #[test]
    fn test_diff_ignores_reordering() {
        let previous = vec![ext("p[0]"), ext("p[1]")];
        let current = vec![ext("p[1]"), ext("p[0]")];

        let (added, removed) = diff(&previous, &current, |e| &e.uid);
        assert!(added.is_empty());
        assert!(removed.is_empty());
    }
}
