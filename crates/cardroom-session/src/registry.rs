//! The session registry: every live session, by id.
//!
//! This is the only structure shared by all inbound handlers and the
//! evictor, and the only place sessions are inserted or removed.
//!
//! ## Lifecycle
//!
//! ```text
//! create() ──→ [registered] ──→ remove()        (last participant left)
//!                   │     └────→ reap_stale()    (idle past threshold)
//!                   └──────────→ create() at capacity evicts oldest 10%
//! ```
//!
//! # Concurrency
//!
//! The id → handle map sits behind a `RwLock`; each session has its own
//! mutex inside its [`SessionHandle`]. The map lock is held only for map
//! reads and writes, never while waiting on a session lock, and ranking
//! sessions for eviction reads lock-free mirrors. Removal closes the
//! handle, and [`get`](SessionRegistry::get) never returns a closed handle.
//!
//! # Removal hook
//!
//! Every removal path (explicit [`remove`](SessionRegistry::remove), stale
//! reaping, capacity eviction) ends in the same place: the handle is
//! closed and, if one was installed with
//! [`on_removed`](SessionRegistry::on_removed), the hook is called with
//! the session's id. The hook runs after the map lock is released, so it
//! may call back into the registry.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use cardroom_protocol::SessionId;
use tokio::sync::RwLock;

use crate::{
    CapacityPolicy, Clock, IdGenerator, RegistryConfig, Session, SessionError,
    SessionHandle, SystemClock, Timestamp, UuidGenerator,
};

/// Called with the id of every session the registry drops.
pub type RemovalHook = Box<dyn Fn(&SessionId) + Send + Sync>;

/// After this many collisions the generator's output gets a suffix.
const MAX_PLAIN_ID_ATTEMPTS: usize = 8;

/// Owns every live session.
///
/// Construct once, wrap in `Arc`, and share with every handler and with
/// the evictor.
pub struct SessionRegistry {
    sessions: RwLock<HashMap<SessionId, SessionHandle>>,
    config: RegistryConfig,
    clock: Arc<dyn Clock>,
    ids: Arc<dyn IdGenerator>,
    on_removed: Option<RemovalHook>,
}

impl SessionRegistry {
    /// A registry using the system clock and random UUIDs.
    pub fn new(config: RegistryConfig) -> Self {
        Self::with_collaborators(config, Arc::new(SystemClock::new()), Arc::new(UuidGenerator))
    }

    /// A registry with explicit time and id sources.
    pub fn with_collaborators(
        config: RegistryConfig,
        clock: Arc<dyn Clock>,
        ids: Arc<dyn IdGenerator>,
    ) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            config: config.validated(),
            clock,
            ids,
            on_removed: None,
        }
    }

    /// Installs a hook run once for each removed session, whichever path
    /// removed it. Replaces any earlier hook.
    ///
    /// ```rust
    /// use std::sync::{Arc, Mutex};
    /// use cardroom_session::{RegistryConfig, SessionRegistry};
    ///
    /// let gone = Arc::new(Mutex::new(Vec::new()));
    /// let sink = Arc::clone(&gone);
    /// let registry = SessionRegistry::new(RegistryConfig::default())
    ///     .on_removed(move |id| sink.lock().unwrap().push(id.clone()));
    /// # let _ = registry;
    /// ```
    pub fn on_removed(mut self, hook: impl Fn(&SessionId) + Send + Sync + 'static) -> Self {
        self.on_removed = Some(Box::new(hook));
        self
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// The clock stamping activity on this registry's sessions.
    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// The generator used for session ids.
    pub fn ids(&self) -> &Arc<dyn IdGenerator> {
        &self.ids
    }

    /// Creates and registers a new, empty session.
    ///
    /// If the registry is at capacity, the configured fraction of sessions
    /// is evicted first. Creation itself never fails.
    pub async fn create(&self, name: impl Into<String>) -> SessionHandle {
        let name = name.into();
        let (handle, evicted) = {
            let mut sessions = self.sessions.write().await;

            let evicted = if sessions.len() >= self.config.max_sessions {
                self.evict_for_capacity(&mut sessions)
            } else {
                Vec::new()
            };

            let id = self.unused_id(&sessions);
            let session = Session::new(id.clone(), name, self.clock.now());
            let handle = SessionHandle::new(session, Arc::clone(&self.clock));
            sessions.insert(id, handle.clone());
            (handle, evicted)
        };

        for victim in &evicted {
            self.retire(victim);
        }

        tracing::info!(
            session_id = %handle.id(),
            name = handle.name(),
            evicted = evicted.len(),
            "session created"
        );
        handle
    }

    /// Looks up a live session. Unknown, malformed, and removed ids all
    /// yield `None`.
    pub async fn get(&self, id: &SessionId) -> Option<SessionHandle> {
        let sessions = self.sessions.read().await;
        sessions.get(id).filter(|h| !h.is_closed()).cloned()
    }

    /// Like [`get`](Self::get), but as a `Result`.
    pub async fn require(&self, id: &SessionId) -> Result<SessionHandle, SessionError> {
        self.get(id)
            .await
            .ok_or_else(|| SessionError::NotFound(id.clone()))
    }

    pub async fn contains(&self, id: &SessionId) -> bool {
        self.get(id).await.is_some()
    }

    /// Removes a session. Removing an absent id is a no-op.
    ///
    /// Returns `true` if a session was removed by this call.
    pub async fn remove(&self, id: &SessionId) -> bool {
        let removed = self.sessions.write().await.remove(id);
        match removed {
            Some(handle) => {
                self.retire(&handle);
                tracing::info!(session_id = %id, "session removed");
                true
            }
            None => false,
        }
    }

    /// Records activity on a session now. Unknown ids are ignored.
    pub async fn touch(&self, id: &SessionId) {
        if let Some(handle) = self.get(id).await {
            handle.touch().await;
        }
    }

    /// Removes every session idle for longer than `threshold` as of `now`.
    ///
    /// A session idle for exactly `threshold` stays. Returns how many were
    /// removed.
    pub async fn reap_stale(&self, now: Timestamp, threshold: Duration) -> usize {
        let reaped: Vec<SessionHandle> = {
            let mut sessions = self.sessions.write().await;
            let stale: Vec<SessionId> = sessions
                .values()
                .filter(|h| now.saturating_duration_since(h.last_activity()) > threshold)
                .map(|h| h.id().clone())
                .collect();
            stale.iter().filter_map(|id| sessions.remove(id)).collect()
        };

        for handle in &reaped {
            self.retire(handle);
            tracing::debug!(session_id = %handle.id(), "stale session reaped");
        }
        if !reaped.is_empty() {
            tracing::info!(
                count = reaped.len(),
                threshold_secs = threshold.as_secs(),
                "reaped stale sessions"
            );
        }
        reaped.len()
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }

    /// Ids of every registered session, in no particular order.
    pub async fn session_ids(&self) -> Vec<SessionId> {
        self.sessions.read().await.keys().cloned().collect()
    }

    /// Removes the configured fraction of sessions, chosen by the capacity
    /// policy. Caller holds the write lock.
    fn evict_for_capacity(
        &self,
        sessions: &mut HashMap<SessionId, SessionHandle>,
    ) -> Vec<SessionHandle> {
        let count = self.config.eviction_count(sessions.len());

        let mut ranked: Vec<(usize, Timestamp, SessionId)> = sessions
            .values()
            .map(|h| {
                let weight = match self.config.capacity_policy {
                    CapacityPolicy::LeastRecentlyActive => 0,
                    CapacityPolicy::FewestParticipants => h.participant_count(),
                };
                (weight, h.last_activity(), h.id().clone())
            })
            .collect();
        ranked.sort();

        let evicted: Vec<SessionHandle> = ranked
            .into_iter()
            .take(count)
            .filter_map(|(_, _, id)| sessions.remove(&id))
            .collect();

        tracing::info!(
            evicted = evicted.len(),
            capacity = self.config.max_sessions,
            policy = ?self.config.capacity_policy,
            "registry at capacity, evicted sessions"
        );
        evicted
    }

    /// Closes a handle that has left the map and runs the removal hook.
    /// Caller must not hold the map lock.
    fn retire(&self, handle: &SessionHandle) {
        handle.close();
        if let Some(hook) = &self.on_removed {
            hook(handle.id());
        }
    }

    /// An id not currently in `sessions`.
    fn unused_id(&self, sessions: &HashMap<SessionId, SessionHandle>) -> SessionId {
        let mut attempt = 0usize;
        loop {
            let raw = self.ids.new_id();
            let candidate = if attempt < MAX_PLAIN_ID_ATTEMPTS {
                SessionId::new(raw)
            } else {
                SessionId::new(format!("{raw}-{attempt}"))
            };
            if !candidate.as_str().trim().is_empty() && !sessions.contains_key(&candidate) {
                return candidate;
            }
            tracing::debug!(%candidate, attempt, "session id collision, retrying");
            attempt += 1;
        }
    }
}

impl std::fmt::Debug for SessionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionRegistry")
            .field("config", &self.config)
            .field("on_removed", &self.on_removed.is_some())
            .finish_non_exhaustive()
    }
}
