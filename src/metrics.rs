//! Process-wide counters for RCON outcomes and session churn.
//! Logged at shutdown; cheap enough to bump from any task.
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, OnceLock};

static RCON_OK: AtomicU64 = AtomicU64::new(0);
static RCON_FAILED: AtomicU64 = AtomicU64::new(0);
static SESSIONS_STARTED: AtomicU64 = AtomicU64::new(0);
static SESSIONS_EXPIRED: AtomicU64 = AtomicU64::new(0);
static ACCESS_DENIED: AtomicU64 = AtomicU64::new(0);

static FAILURE_KINDS: OnceLock<Mutex<HashMap<&'static str, u64>>> = OnceLock::new();

fn failure_kinds_lock() -> &'static Mutex<HashMap<&'static str, u64>> {
    FAILURE_KINDS.get_or_init(|| Mutex::new(HashMap::new()))
}

/// Count one RCON call. `failure` is the error tag when the call failed.
pub fn record_rcon_outcome(failure: Option<&'static str>) {
    match failure {
        None => {
            RCON_OK.fetch_add(1, Ordering::Relaxed);
        }
        Some(kind) => {
            RCON_FAILED.fetch_add(1, Ordering::Relaxed);
            if let Ok(mut guard) = failure_kinds_lock().lock() {
                *guard.entry(kind).or_default() += 1;
            }
        }
    }
}

pub fn inc_sessions_started() {
    SESSIONS_STARTED.fetch_add(1, Ordering::Relaxed);
}

pub fn inc_sessions_expired() {
    SESSIONS_EXPIRED.fetch_add(1, Ordering::Relaxed);
}

pub fn inc_access_denied() {
    ACCESS_DENIED.fetch_add(1, Ordering::Relaxed);
}

#[derive(Debug, Default, Clone)]
pub struct Snapshot {
    pub rcon_ok: u64,
    pub rcon_failed: u64,
    pub rcon_failures_by_kind: HashMap<&'static str, u64>,
    pub sessions_started: u64,
    pub sessions_expired: u64,
    pub access_denied: u64,
}

impl Snapshot {
    /// Single log line, failure kinds sorted for stable output.
    pub fn summary_line(&self) -> String {
        let mut kinds: Vec<_> = self.rcon_failures_by_kind.iter().collect();
        kinds.sort();
        let kinds = kinds
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join(",");
        format!(
            "rcon_ok={} rcon_failed={} [{}] sessions_started={} sessions_expired={} access_denied={}",
            self.rcon_ok,
            self.rcon_failed,
            kinds,
            self.sessions_started,
            self.sessions_expired,
            self.access_denied
        )
    }
}

pub fn snapshot() -> Snapshot {
    Snapshot {
        rcon_ok: RCON_OK.load(Ordering::Relaxed),
        rcon_failed: RCON_FAILED.load(Ordering::Relaxed),
        rcon_failures_by_kind: failure_kinds_lock()
            .lock()
            .map(|g| g.clone())
            .unwrap_or_default(),
        sessions_started: SESSIONS_STARTED.load(Ordering::Relaxed),
        sessions_expired: SESSIONS_EXPIRED.load(Ordering::Relaxed),
        access_denied: ACCESS_DENIED.load(Ordering::Relaxed),
    }
}
