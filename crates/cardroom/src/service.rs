//! `Cardroom` builder and facade.
//!
//! Ties the layers together: one registry, one router in front of it, and
//! one evictor loop reaping it in the background.
//!
//! ```text
//!  transport ──Action──→ Cardroom::dispatch ──→ SessionRouter ──→ SessionRegistry
//!                                                   │                   ↑
//!  subscribers ←──Update── Broadcaster ←────────────┘        Evictor ───┘
//! ```

use std::sync::Arc;

use cardroom_engine::{Broadcaster, ChannelBroadcaster, SessionRouter};
use cardroom_evictor::{Evictor, EvictorHandle, EvictorMetrics};
use cardroom_protocol::{channel_key, Action, SessionId, Update};
use cardroom_session::{
    Clock, IdGenerator, SessionRegistry, SessionSnapshot, SystemClock, UuidGenerator,
};
use tokio::sync::{broadcast, Mutex};

use crate::{CardroomConfig, CardroomError};

/// Builder for a [`Cardroom`].
///
/// # Example
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use cardroom::prelude::*;
///
/// # async fn run() {
/// let cardroom = Cardroom::builder()
///     .config(CardroomConfig::default())
///     .clock(Arc::new(ManualClock::new()))
///     .build();
/// # }
/// ```
pub struct CardroomBuilder {
    config: CardroomConfig,
    clock: Option<Arc<dyn Clock>>,
    ids: Option<Arc<dyn IdGenerator>>,
    spawn_evictor: bool,
}

impl CardroomBuilder {
    pub fn new() -> Self {
        Self {
            config: CardroomConfig::default(),
            clock: None,
            ids: None,
            spawn_evictor: true,
        }
    }

    pub fn config(mut self, config: CardroomConfig) -> Self {
        self.config = config;
        self
    }

    /// Time source for activity tracking. Default: [`SystemClock`].
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Source of session and participant ids. Default: random UUIDs.
    pub fn id_generator(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = Some(ids);
        self
    }

    /// Whether `build` starts the background evictor. Default: `true`.
    ///
    /// Without it, stale sessions are only reaped by
    /// [`Cardroom::reap_stale`].
    pub fn spawn_evictor(mut self, spawn: bool) -> Self {
        self.spawn_evictor = spawn;
        self
    }

    /// Builds a Cardroom that delivers updates through an in-process
    /// [`ChannelBroadcaster`].
    ///
    /// Must be called inside a Tokio runtime when the evictor is enabled.
    pub fn build(self) -> Cardroom<ChannelBroadcaster> {
        self.build_with(Arc::new(ChannelBroadcaster::new()))
    }

    /// Builds a Cardroom that hands updates to `broadcaster`.
    ///
    /// Must be called inside a Tokio runtime when the evictor is enabled.
    pub fn build_with<B: Broadcaster>(self, broadcaster: Arc<B>) -> Cardroom<B> {
        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock::new()));
        let ids = self.ids.unwrap_or_else(|| Arc::new(UuidGenerator));
        // Reaped and evicted sessions close their channels the same way a
        // last LEAVE does.
        let forget = Arc::clone(&broadcaster);
        let registry = Arc::new(
            SessionRegistry::with_collaborators(self.config.registry, clock, ids)
                .on_removed(move |id| forget.forget(&channel_key(id))),
        );

        let router = SessionRouter::new(Arc::clone(&registry), broadcaster);
        let evictor = Evictor::new(Arc::clone(&registry), self.config.evictor);
        let evictor_handle = self.spawn_evictor.then(|| evictor.spawn());

        tracing::info!(
            max_sessions = registry.config().max_sessions,
            evictor = evictor_handle.is_some(),
            "cardroom ready"
        );

        Cardroom {
            registry,
            router,
            evictor,
            evictor_handle: Mutex::new(evictor_handle),
        }
    }
}

impl Default for CardroomBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A running set of estimation sessions.
///
/// Share it between inbound handlers with an `Arc`. Call
/// [`shutdown`](Self::shutdown) to stop the evictor before dropping it.
pub struct Cardroom<B: Broadcaster> {
    registry: Arc<SessionRegistry>,
    router: SessionRouter<B>,
    evictor: Evictor,
    evictor_handle: Mutex<Option<EvictorHandle>>,
}

impl Cardroom<ChannelBroadcaster> {
    pub fn builder() -> CardroomBuilder {
        CardroomBuilder::new()
    }

    /// Subscribes to a session's updates.
    ///
    /// Works before the session exists; nothing arrives until it does.
    pub fn subscribe(&self, session_id: &SessionId) -> broadcast::Receiver<Update> {
        self.router.broadcaster().subscribe(&channel_key(session_id))
    }
}

impl<B: Broadcaster> Cardroom<B> {
    /// Creates an empty session and returns its initial state.
    pub async fn create_session(&self, name: impl Into<String>) -> SessionSnapshot {
        self.registry.create(name).await.snapshot().await
    }

    /// The session's display name, or `None` if it does not exist.
    pub async fn session_name(&self, session_id: &SessionId) -> Option<String> {
        let handle = self.registry.get(session_id).await?;
        Some(handle.name().to_string())
    }

    /// The session's current state.
    ///
    /// # Errors
    /// Returns [`CardroomError::Session`] if the session does not exist.
    pub async fn snapshot(&self, session_id: &SessionId) -> Result<SessionSnapshot, CardroomError> {
        let handle = self.registry.require(session_id).await?;
        Ok(handle.snapshot().await)
    }

    /// Applies an action and publishes the resulting update.
    ///
    /// Returns `None` if the session does not exist.
    pub async fn dispatch(&self, action: Action) -> Option<Update> {
        self.router.dispatch(action).await
    }

    /// Decodes a JSON frame, then behaves as [`dispatch`](Self::dispatch).
    ///
    /// # Errors
    /// Returns [`CardroomError::Engine`] if the frame is not a valid action.
    pub async fn dispatch_bytes(&self, frame: &[u8]) -> Result<Option<Update>, CardroomError> {
        Ok(self.router.dispatch_bytes(frame).await?)
    }

    /// Reaps stale sessions now instead of waiting for the next tick.
    pub async fn reap_stale(&self) -> usize {
        self.evictor.tick_once().await
    }

    pub fn evictor_metrics(&self) -> EvictorMetrics {
        self.evictor.metrics()
    }

    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    pub fn broadcaster(&self) -> &Arc<B> {
        self.router.broadcaster()
    }

    /// Stops the background evictor and waits for it. Idempotent.
    ///
    /// Sessions stay usable; they just are no longer reaped.
    pub async fn shutdown(&self) {
        if let Some(mut handle) = self.evictor_handle.lock().await.take() {
            handle.shutdown().await;
        }
    }
}
