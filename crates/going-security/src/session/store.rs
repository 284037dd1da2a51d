//! The session store.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{DateTime, Duration, Utc};
use going_shared::config::{ReapMode, SessionSettings};
use parking_lot::{Mutex, RwLock};
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, warn};

use super::clock::{Clock, SystemClock};
use super::error::SessionError;
use super::reaper::ReapStrategy;
use super::values::{SessionKey, SessionValues};
use crate::entropy::{EntropySource, OsEntropy};

/// Random bytes behind every session id.
pub const SESSION_ID_BYTES: usize = 32;

/// Sequence for time-derived fallback ids, unique per process.
static FALLBACK_SEQ: AtomicU64 = AtomicU64::new(0);

/// Handle to a stored session.
///
/// `id`, the timestamps and `degraded_id` are a snapshot taken when the
/// store handed the session out. Values are shared with the stored record:
/// writes through any handle are visible to every later `get`.
#[derive(Debug, Clone)]
pub struct Session {
    id: String,
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    degraded_id: bool,
    values: Arc<Mutex<SessionValues>>,
}

impl Session {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    /// True when the id came from the time-derived fallback and is guessable.
    pub fn is_degraded_id(&self) -> bool {
        self.degraded_id
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    pub fn get<T: DeserializeOwned>(&self, key: &SessionKey<T>) -> Result<Option<T>, SessionError> {
        self.values.lock().get(key)
    }

    pub fn insert<T: Serialize>(&self, key: &SessionKey<T>, value: &T) -> Result<(), SessionError> {
        self.values.lock().insert(key, value)
    }

    pub fn remove<T>(&self, key: &SessionKey<T>) -> bool {
        self.values.lock().remove(key)
    }

    pub fn clear(&self) {
        self.values.lock().clear();
    }

    /// Copy of the current values.
    pub fn values(&self) -> SessionValues {
        self.values.lock().clone()
    }
}

#[derive(Debug, Clone)]
pub struct SessionStoreConfig {
    /// Added to `expires_at` on creation and on every successful `get`.
    pub lifetime: Duration,
    pub reap: ReapStrategy,
    /// Issue a time-derived id instead of failing when the OS random
    /// source is unavailable.
    pub allow_insecure_id_fallback: bool,
}

impl Default for SessionStoreConfig {
    fn default() -> Self {
        Self {
            lifetime: Duration::minutes(going_shared::constants::DEFAULT_SESSION_LIFETIME_MINUTES),
            reap: ReapStrategy::OnCreate,
            allow_insecure_id_fallback: true,
        }
    }
}

impl SessionStoreConfig {
    pub fn new(lifetime: Duration) -> Self {
        Self {
            lifetime,
            ..Self::default()
        }
    }

    pub fn with_reap(mut self, reap: ReapStrategy) -> Self {
        self.reap = reap;
        self
    }

    pub fn with_insecure_id_fallback(mut self, allowed: bool) -> Self {
        self.allow_insecure_id_fallback = allowed;
        self
    }
}

impl From<&SessionSettings> for SessionStoreConfig {
    fn from(settings: &SessionSettings) -> Self {
        let reap = match settings.reap_strategy {
            ReapMode::OnCreate => ReapStrategy::OnCreate,
            ReapMode::Periodic => ReapStrategy::Periodic(std::time::Duration::from_secs(
                settings.sweep_interval_secs.max(1),
            )),
            ReapMode::Manual => ReapStrategy::Manual,
        };
        Self {
            // Range is checked by `AppConfig::validate`; saturate instead of panicking.
            lifetime: Duration::try_minutes(settings.lifetime_minutes).unwrap_or(Duration::MAX),
            reap,
            allow_insecure_id_fallback: settings.allow_insecure_id_fallback,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreStats {
    pub active: usize,
    /// Ids issued from the time-derived fallback.
    pub degraded_ids: u64,
    /// Entries removed by sweeps and by lazy expiry in `get`.
    pub swept: u64,
}

/// Concurrent map of session id to session.
///
/// One `RwLock` guards the map. `create`, `delete`, `sweep` and `get` all
/// take it for writing; `get` refreshes the deadline so it is a write too.
pub struct SessionStore {
    sessions: RwLock<HashMap<String, Session>>,
    config: SessionStoreConfig,
    clock: Arc<dyn Clock>,
    entropy: Arc<dyn EntropySource>,
    degraded_ids: AtomicU64,
    swept: AtomicU64,
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStore")
            .field("config", &self.config)
            .field("active", &self.len())
            .finish_non_exhaustive()
    }
}

impl SessionStore {
    pub fn new(config: SessionStoreConfig) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            config,
            clock: Arc::new(SystemClock),
            entropy: Arc::new(OsEntropy),
            degraded_ids: AtomicU64::new(0),
            swept: AtomicU64::new(0),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_entropy(mut self, entropy: Arc<dyn EntropySource>) -> Self {
        self.entropy = entropy;
        self
    }

    pub fn lifetime(&self) -> Duration {
        self.config.lifetime
    }

    pub fn reap_strategy(&self) -> ReapStrategy {
        self.config.reap
    }

    pub fn create(&self) -> Result<Session, SessionError> {
        let now = self.clock.now();
        let expires_at = self.deadline_from(now)?;
        let (id, degraded_id) = self.generate_id()?;
        let session = Session {
            id: id.clone(),
            created_at: now,
            expires_at,
            degraded_id,
            values: Arc::new(Mutex::new(SessionValues::default())),
        };

        self.sessions.write().insert(id, session.clone());

        if self.config.reap == ReapStrategy::OnCreate {
            self.sweep();
        }

        Ok(session)
    }

    /// Looks up a live session and slides its deadline forward.
    pub fn get(&self, id: &str) -> Result<Session, SessionError> {
        let mut sessions = self.sessions.write();
        let now = self.clock.now();

        let expired = sessions
            .get(id)
            .map(|session| session.is_expired(now))
            .ok_or(SessionError::NotFound)?;
        if expired {
            sessions.remove(id);
            self.swept.fetch_add(1, Ordering::Relaxed);
            return Err(SessionError::NotFound);
        }

        let expires_at = self.deadline_from(now)?;
        let session = sessions.get_mut(id).ok_or(SessionError::NotFound)?;
        session.expires_at = expires_at;
        Ok(session.clone())
    }

    /// Removes the session if present. Returns whether it was.
    pub fn delete(&self, id: &str) -> bool {
        self.sessions.write().remove(id).is_some()
    }

    /// Removes every expired session and returns how many were removed.
    pub fn sweep(&self) -> usize {
        let mut sessions = self.sessions.write();
        let now = self.clock.now();

        let before = sessions.len();
        sessions.retain(|_, session| !session.is_expired(now));
        let removed = before - sessions.len();
        drop(sessions);

        if removed > 0 {
            self.swept.fetch_add(removed as u64, Ordering::Relaxed);
            debug!(removed, "swept expired sessions");
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.read().is_empty()
    }

    pub fn stats(&self) -> StoreStats {
        StoreStats {
            active: self.len(),
            degraded_ids: self.degraded_ids.load(Ordering::Relaxed),
            swept: self.swept.load(Ordering::Relaxed),
        }
    }

    fn deadline_from(&self, now: DateTime<Utc>) -> Result<DateTime<Utc>, SessionError> {
        now.checked_add_signed(self.config.lifetime)
            .ok_or(SessionError::LifetimeOverflow(self.config.lifetime))
    }

    fn generate_id(&self) -> Result<(String, bool), SessionError> {
        let mut bytes = [0u8; SESSION_ID_BYTES];
        match self.entropy.try_fill(&mut bytes) {
            Ok(()) => Ok((URL_SAFE_NO_PAD.encode(bytes), false)),
            Err(err) if self.config.allow_insecure_id_fallback => {
                self.degraded_ids.fetch_add(1, Ordering::Relaxed);
                warn!(error = %err, "secure random source unavailable, issuing time-derived session id");
                Ok((self.fallback_id(), true))
            }
            Err(err) => Err(SessionError::RandomSourceFailure(err.to_string())),
        }
    }

    fn fallback_id(&self) -> String {
        let now = self.clock.now();
        let seq = FALLBACK_SEQ.fetch_add(1, Ordering::Relaxed);
        let raw = format!(
            "{}-{}-{}",
            now.timestamp_nanos_opt().unwrap_or_else(|| now.timestamp_micros()),
            std::process::id(),
            seq
        );
        URL_SAFE_NO_PAD.encode(raw)
    }
}
