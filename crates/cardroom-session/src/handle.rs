//! Per-session exclusive access.
//!
//! Every registered session lives in its own cell behind its own mutex.
//! Two actions on the same session are serialized; actions on different
//! sessions never touch the same lock.
//!
//! The cell also mirrors two fields outside the mutex (`last_activity`,
//! `participant_count`) so the registry can rank sessions for eviction
//! without locking any of them. The mirrors are refreshed whenever a
//! [`SessionGuard`] is dropped.

use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use cardroom_protocol::{ParticipantId, ParticipantView, SessionId};
use tokio::sync::{Mutex, MutexGuard};

use crate::{Clock, Session, SessionError, SessionSnapshot, Timestamp};

struct SessionCell {
    id: SessionId,
    name: String,
    state: Mutex<Session>,
    last_activity: AtomicU64,
    participant_count: AtomicUsize,
    closed: AtomicBool,
    clock: Arc<dyn Clock>,
}

/// Result of [`SessionHandle::remove_participant`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Departure {
    /// Whether the participant was present.
    pub removed: bool,
    /// Whether the session has nobody left and should be deleted.
    pub now_empty: bool,
    /// Who remains, in join order.
    pub participants: Vec<ParticipantView>,
}

/// Shared, reference-counted access to one registered session.
///
/// Cheap to clone. A handle stays readable after the session is removed
/// from the registry, but it reports [`is_closed`](Self::is_closed) and
/// its mutation methods return [`SessionError::Closed`].
#[derive(Clone)]
pub struct SessionHandle {
    cell: Arc<SessionCell>,
}

impl std::fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionHandle")
            .field("id", &self.cell.id)
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl SessionHandle {
    pub(crate) fn new(session: Session, clock: Arc<dyn Clock>) -> Self {
        let cell = SessionCell {
            id: session.id().clone(),
            name: session.name().to_string(),
            last_activity: AtomicU64::new(session.last_activity_at().as_millis()),
            participant_count: AtomicUsize::new(session.participant_count()),
            closed: AtomicBool::new(false),
            state: Mutex::new(session),
            clock,
        };
        Self {
            cell: Arc::new(cell),
        }
    }

    pub fn id(&self) -> &SessionId {
        &self.cell.id
    }

    pub fn name(&self) -> &str {
        &self.cell.name
    }

    /// Last recorded activity, without taking the session lock.
    pub fn last_activity(&self) -> Timestamp {
        Timestamp::from_millis(self.cell.last_activity.load(Ordering::Acquire))
    }

    /// Participant count as of the last released guard.
    pub fn participant_count(&self) -> usize {
        self.cell.participant_count.load(Ordering::Acquire)
    }

    /// `true` once the session has been removed from the registry.
    pub fn is_closed(&self) -> bool {
        self.cell.closed.load(Ordering::Acquire)
    }

    /// Marks the session removed. Returns `true` if this call closed it.
    pub(crate) fn close(&self) -> bool {
        !self.cell.closed.swap(true, Ordering::AcqRel)
    }

    /// Acquires exclusive access to the session.
    ///
    /// Hold the guard for one logical mutation only. Never request the
    /// registry's map lock while holding it.
    pub async fn lock(&self) -> SessionGuard<'_> {
        SessionGuard {
            cell: &self.cell,
            session: self.cell.state.lock().await,
        }
    }

    /// A detached copy of the current state.
    pub async fn snapshot(&self) -> SessionSnapshot {
        self.lock().await.snapshot()
    }

    /// Records activity now.
    pub async fn touch(&self) {
        self.lock().await.touch();
    }

    // -- Atomic mutations ---------------------------------------------------
    //
    // The API for code that edits a session directly instead of sending it
    // an `Action` through the router: an admin tool, a migration, a test.
    // Each call holds the lock for exactly one operation, touches the
    // session when the operation changed something, and returns the
    // participant view a caller needs to build its own broadcast.

    pub async fn add_participant(
        &self,
        id: ParticipantId,
        name: impl Into<String>,
    ) -> Result<Vec<ParticipantView>, SessionError> {
        let mut guard = self.open_guard().await?;
        guard.add_participant(id, name);
        guard.touch();
        Ok(guard.participants())
    }

    pub async fn set_selection(
        &self,
        id: &ParticipantId,
        value: impl Into<String>,
    ) -> Result<Vec<ParticipantView>, SessionError> {
        let mut guard = self.open_guard().await?;
        if guard.set_selection(id, value) {
            guard.touch();
        }
        Ok(guard.participants())
    }

    pub async fn reveal(&self) -> Result<Vec<ParticipantView>, SessionError> {
        let mut guard = self.open_guard().await?;
        guard.reveal();
        guard.touch();
        Ok(guard.participants())
    }

    pub async fn reset(&self) -> Result<Vec<ParticipantView>, SessionError> {
        let mut guard = self.open_guard().await?;
        guard.reset();
        guard.touch();
        Ok(guard.participants())
    }

    pub async fn start_round(&self) -> Result<Vec<ParticipantView>, SessionError> {
        let mut guard = self.open_guard().await?;
        guard.start_round();
        Ok(guard.participants())
    }

    /// Removes a participant. Does not remove the session from the
    /// registry when it empties; check [`Departure::now_empty`].
    pub async fn remove_participant(
        &self,
        id: &ParticipantId,
    ) -> Result<Departure, SessionError> {
        let mut guard = self.open_guard().await?;
        let removed = guard.remove_participant(id);
        if removed {
            guard.touch();
        }
        Ok(Departure {
            removed,
            now_empty: guard.is_empty(),
            participants: guard.participants(),
        })
    }

    async fn open_guard(&self) -> Result<SessionGuard<'_>, SessionError> {
        let guard = self.lock().await;
        if guard.is_closed() {
            return Err(SessionError::Closed(self.cell.id.clone()));
        }
        Ok(guard)
    }
}

/// Exclusive access to one session. Derefs to [`Session`].
///
/// Dropping the guard publishes `last_activity` and `participant_count`
/// to the lock-free mirrors the registry reads.
pub struct SessionGuard<'a> {
    cell: &'a SessionCell,
    session: MutexGuard<'a, Session>,
}

impl SessionGuard<'_> {
    /// Records activity at the cell's clock time.
    pub fn touch(&mut self) {
        let now = self.cell.clock.now();
        self.session.touch(now);
    }

    /// `true` once the session has been removed from the registry.
    pub fn is_closed(&self) -> bool {
        self.cell.closed.load(Ordering::Acquire)
    }

    /// Marks the session removed while still holding its lock, so no
    /// other action can slip in between this one and the registry removal.
    pub fn close(&mut self) {
        self.cell.closed.store(true, Ordering::Release);
    }
}

impl Deref for SessionGuard<'_> {
    type Target = Session;

    fn deref(&self) -> &Session {
        &self.session
    }
}

impl DerefMut for SessionGuard<'_> {
    fn deref_mut(&mut self) -> &mut Session {
        &mut self.session
    }
}

impl Drop for SessionGuard<'_> {
    fn drop(&mut self) {
        self.cell
            .last_activity
            .fetch_max(self.session.last_activity_at().as_millis(), Ordering::AcqRel);
        self.cell
            .participant_count
            .store(self.session.participant_count(), Ordering::Release);
    }
}
