use log::info;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::{Duration, SystemTime};
use uuid::Uuid;

use crate::loader::{LoadReport, Loaded};
use crate::record::Dataset;

/// One browser session's upload.
///
/// The dataset is shared read-only; a new upload replaces the session
/// rather than mutating it.
#[derive(Clone, Debug)]
pub struct Session {
    pub dataset: Arc<Dataset>,
    pub file_name: String,
    pub report: LoadReport,
    /// Time when the session expires
    pub expires_at: SystemTime,
}

/// Sessions keyed by the id stored in the `session` cookie.
#[derive(Debug)]
pub struct SessionStore {
    sessions: RwLock<HashMap<String, Session>>,
    ttl: Duration,
}

impl SessionStore {
    pub fn new(ttl: Duration) -> Self {
        SessionStore {
            sessions: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    /// Store a freshly loaded dataset under a new session id.
    pub fn create(&self, file_name: &str, loaded: Loaded) -> String {
        let session_id = Uuid::new_v4().to_string();
        let now = SystemTime::now();
        let session = Session {
            dataset: Arc::new(loaded.dataset),
            file_name: file_name.to_string(),
            report: loaded.report,
            expires_at: expiry(now, self.ttl),
        };

        let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);
        sessions.retain(|_, s| s.expires_at > now);
        sessions.insert(session_id.clone(), session);
        info!("session {} created for {}", session_id, file_name);

        session_id
    }

    /// Look up a live session. Expired sessions are treated as absent.
    pub fn get(&self, session_id: &str) -> Option<Session> {
        let sessions = self.sessions.read().unwrap_or_else(PoisonError::into_inner);
        sessions
            .get(session_id)
            .filter(|s| s.expires_at > SystemTime::now())
            .cloned()
    }

    pub fn remove(&self, session_id: &str) -> bool {
        let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);
        sessions.remove(session_id).is_some()
    }

    pub fn len(&self) -> usize {
        self.sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// `now + ttl`, clamped to a far-future instant when the sum is not representable.
fn expiry(now: SystemTime, ttl: Duration) -> SystemTime {
    now.checked_add(ttl)
        .or_else(|| now.checked_add(FAR_FUTURE))
        .unwrap_or(now)
}

/// About a hundred years.
const FAR_FUTURE: Duration = Duration::from_secs(100 * 365 * 24 * 60 * 60);
