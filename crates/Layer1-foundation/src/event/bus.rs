//! Diagnostic Bus - 진단 이벤트 브로드캐스트
//!
//! 발행 경로가 동기 코드(정렬, 레지스트리 전이)에서도 호출되므로
//! 잠금은 `parking_lot` 을 사용하고 await 지점을 두지 않습니다.

use super::types::{Diagnostic, DiagnosticCode};
use parking_lot::{Mutex, RwLock};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, warn};

// ============================================================================
// Listener
// ============================================================================

/// 리스너 ID
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

impl ListenerId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn value(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for ListenerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "listener-{}", self.0)
    }
}

/// 진단 리스너 trait
pub trait DiagnosticListener: Send + Sync {
    /// 리스너 이름 (디버깅용)
    fn name(&self) -> &str;

    /// 관심 있는 코드 (None이면 전부)
    fn codes(&self) -> Option<Vec<DiagnosticCode>> {
        None
    }

    /// 진단 처리
    fn on_diagnostic(&self, diagnostic: &Diagnostic);
}

// ============================================================================
// DiagnosticBus
// ============================================================================

/// 진단 버스 설정
#[derive(Debug, Clone)]
pub struct DiagnosticBusConfig {
    /// 브로드캐스트 채널 용량
    pub channel_capacity: usize,

    /// 히스토리 보관 개수
    pub history_size: usize,
}

impl Default for DiagnosticBusConfig {
    fn default() -> Self {
        Self {
            channel_capacity: 256,
            history_size: 100,
        }
    }
}

/// 진단 버스
///
/// ```ignore
/// let bus = DiagnosticBus::new();
/// let mut rx = bus.receiver();
/// bus.publish(plugin::load_failed("acme", "404"));
/// let d = rx.recv().await?;
/// ```
pub struct DiagnosticBus {
    config: DiagnosticBusConfig,

    /// 브로드캐스트 송신자
    sender: broadcast::Sender<Diagnostic>,

    /// 등록된 리스너
    listeners: RwLock<HashMap<ListenerId, Arc<dyn DiagnosticListener>>>,

    listener_counter: AtomicU64,

    /// 최근 진단 (오래된 것부터)
    history: Mutex<VecDeque<Diagnostic>>,

    /// 발행된 진단 수
    published: AtomicU64,
}

impl DiagnosticBus {
    /// 기본 설정으로 생성
    pub fn new() -> Self {
        Self::with_config(DiagnosticBusConfig::default())
    }

    /// 커스텀 설정으로 생성
    pub fn with_config(config: DiagnosticBusConfig) -> Self {
        let (sender, _) = broadcast::channel(config.channel_capacity.max(1));
        let history = Mutex::new(VecDeque::with_capacity(config.history_size));

        Self {
            config,
            sender,
            listeners: RwLock::new(HashMap::new()),
            listener_counter: AtomicU64::new(0),
            history,
            published: AtomicU64::new(0),
        }
    }

    /// 리스너 등록
    pub fn subscribe(&self, listener: Arc<dyn DiagnosticListener>) -> ListenerId {
        let id = ListenerId::new(self.listener_counter.fetch_add(1, Ordering::SeqCst));
        debug!(listener_name = listener.name(), listener_id = %id, "Registering diagnostic listener");
        self.listeners.write().insert(id, listener);
        id
    }

    /// 리스너 해제
    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        self.listeners.write().remove(&id).is_some()
    }

    /// 진단 발행
    pub fn publish(&self, diagnostic: Diagnostic) {
        self.published.fetch_add(1, Ordering::SeqCst);

        if diagnostic.code.is_recoverable() {
            debug!(code = %diagnostic.code, plugin = ?diagnostic.plugin_id, "{}", diagnostic.message);
        } else {
            warn!(code = %diagnostic.code, plugin = ?diagnostic.plugin_id, "{}", diagnostic.message);
        }

        {
            let mut history = self.history.lock();
            if self.config.history_size > 0 {
                if history.len() >= self.config.history_size {
                    history.pop_front();
                }
                history.push_back(diagnostic.clone());
            }
        }

        // 구독자가 없어도 OK
        let _ = self.sender.send(diagnostic.clone());

        let listeners: Vec<_> = self.listeners.read().values().cloned().collect();
        for listener in listeners {
            let interested = match listener.codes() {
                Some(codes) => codes.contains(&diagnostic.code),
                None => true,
            };
            if interested {
                listener.on_diagnostic(&diagnostic);
            }
        }
    }

    /// 브로드캐스트 수신자 생성
    pub fn receiver(&self) -> broadcast::Receiver<Diagnostic> {
        self.sender.subscribe()
    }

    /// 최근 진단 (최신순)
    pub fn history(&self, limit: Option<usize>) -> Vec<Diagnostic> {
        let history = self.history.lock();
        let limit = limit.unwrap_or(history.len());
        history.iter().rev().take(limit).cloned().collect()
    }

    /// 특정 플러그인의 진단 (오래된 순)
    pub fn history_for(&self, plugin_id: &str) -> Vec<Diagnostic> {
        self.history
            .lock()
            .iter()
            .filter(|d| d.is_for(plugin_id))
            .cloned()
            .collect()
    }

    /// 특정 코드의 진단 (오래된 순)
    pub fn history_by_code(&self, code: DiagnosticCode) -> Vec<Diagnostic> {
        self.history
            .lock()
            .iter()
            .filter(|d| d.code == code)
            .cloned()
            .collect()
    }

    /// 총 발행 수
    pub fn published_count(&self) -> u64 {
        self.published.load(Ordering::SeqCst)
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.read().len()
    }

    pub fn clear_history(&self) {
        self.history.lock().clear();
    }
}

impl Default for DiagnosticBus {
    fn default() -> Self {
        Self::new()
    }
}
