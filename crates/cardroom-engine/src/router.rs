//! The session router: one inbound action in, at most one update out.
//!
//! ## Dispatch
//!
//! ```text
//! dispatch(action)
//!   ├─ registry.get(session_id) ── None ──→ drop, no broadcast
//!   ├─ lock session ── closed ──→ drop, no broadcast
//!   ├─ apply to a working copy (errors and panics keep the old state)
//!   ├─ update = to_update(); start_round()
//!   ├─ publish(room/<id>, update)
//!   └─ last participant left? unlock, then registry.remove(session_id)
//! ```
//!
//! Everything from the lock to the publish happens under the session's
//! own lock, so concurrent actions on one session are applied and
//! published one at a time, each update showing the state right after its
//! own action.
//!
//! ## Fault containment
//!
//! The state machine never mutates the stored session in place. The
//! router clones the session into a working copy and runs
//! [`StateMachine::apply`] on that copy inside
//! [`std::panic::catch_unwind`]:
//!
//! - `Ok(Ok(transition))`: the copy replaces the stored session.
//! - `Ok(Err(err))`: the copy is discarded and the error logged at `warn`.
//! - `Err(panic)`: the copy is discarded and the panic logged at `error`.
//!
//! In all three cases an update is built from whatever is now stored and
//! published, so subscribers always see a consistent state. The closure is
//! wrapped in `AssertUnwindSafe` because it borrows the router and the
//! action. Neither is left half-updated by a panic: the only thing the
//! closure mutates is the working copy, and that is thrown away.
//!
//! ## Removal
//!
//! When the last participant leaves, the session is closed while its lock
//! is still held. A concurrent action waiting on the same lock then sees
//! the closed flag and is dropped. The registry removal and
//! [`Broadcaster::forget`] happen after the lock is released, because the
//! map lock is never requested while a session lock is held.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use cardroom_protocol::{channel_key, Action, Codec, JsonCodec, Update};
use cardroom_session::{Session, SessionRegistry};

use crate::{Broadcaster, EngineError, StateMachine, Transition};

/// Routes actions to sessions and publishes the results.
///
/// Cheap to share: wrap it in an `Arc` and hand it to every inbound
/// handler.
pub struct SessionRouter<B: Broadcaster, C: Codec = JsonCodec> {
    registry: Arc<SessionRegistry>,
    machine: StateMachine,
    broadcaster: Arc<B>,
    codec: C,
}

impl<B: Broadcaster> SessionRouter<B, JsonCodec> {
    /// A router speaking JSON. Participant ids come from the registry's
    /// id generator.
    pub fn new(registry: Arc<SessionRegistry>, broadcaster: Arc<B>) -> Self {
        Self::with_codec(registry, broadcaster, JsonCodec)
    }
}

impl<B: Broadcaster, C: Codec> SessionRouter<B, C> {
    pub fn with_codec(registry: Arc<SessionRegistry>, broadcaster: Arc<B>, codec: C) -> Self {
        let machine = StateMachine::new(Arc::clone(registry.ids()));
        Self {
            registry,
            machine,
            broadcaster,
            codec,
        }
    }

    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    pub fn broadcaster(&self) -> &Arc<B> {
        &self.broadcaster
    }

    /// Applies one action and publishes the resulting update.
    ///
    /// Returns the published update, or `None` if the session does not
    /// exist (nothing is published then). Faults while applying the action
    /// never escape: the session keeps its last good state and that state
    /// is published instead.
    pub async fn dispatch(&self, action: Action) -> Option<Update> {
        let session_id = action.session_id.clone();
        let Some(handle) = self.registry.get(&session_id).await else {
            tracing::debug!(%session_id, kind = %action.kind, "action for unknown session dropped");
            return None;
        };

        let channel = channel_key(&session_id);
        let (update, now_empty) = {
            let mut guard = handle.lock().await;
            if guard.is_closed() {
                tracing::debug!(%session_id, kind = %action.kind, "action for closed session dropped");
                return None;
            }

            let mut working = Session::clone(&guard);
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
                self.machine.apply(&mut working, &action)
            }));

            let transition = match outcome {
                Ok(Ok(transition)) => {
                    log_transition(&guard, &action, &transition);
                    *guard = working;
                    if transition.applied {
                        guard.touch();
                    }
                    transition
                }
                Ok(Err(err)) => {
                    tracing::warn!(%session_id, kind = %action.kind, error = %err, "action failed, publishing last good state");
                    Transition::default()
                }
                Err(_) => {
                    tracing::error!(%session_id, kind = %action.kind, "action panicked, publishing last good state");
                    Transition::default()
                }
            };

            let update = guard.to_update();
            guard.start_round();
            if transition.now_empty {
                guard.close();
            }
            self.broadcaster.publish(&channel, &update);
            (update, transition.now_empty)
        };

        if now_empty {
            self.registry.remove(&session_id).await;
            self.broadcaster.forget(&channel);
        }
        Some(update)
    }

    /// Decodes an inbound frame with the router's codec, then dispatches it.
    ///
    /// # Errors
    /// Returns [`EngineError::Protocol`] if the frame is not a valid action.
    /// Everything after decoding behaves as [`dispatch`](Self::dispatch).
    pub async fn dispatch_bytes(&self, frame: &[u8]) -> Result<Option<Update>, EngineError> {
        let action: Action = self.codec.decode(frame)?;
        Ok(self.dispatch(action).await)
    }
}

/// Logs an applied action. `before` is the session as it was before the
/// action, so a leaving participant's name is still there.
fn log_transition(before: &Session, action: &Action, transition: &Transition) {
    let session_id = &action.session_id;
    if let Some(participant_id) = &transition.joined {
        let name = action.participant_name.as_deref().unwrap_or_default();
        tracing::debug!(%session_id, %participant_id, name, "participant joined");
    } else if let Some(participant_id) = &transition.left {
        let name = before
            .participant(participant_id)
            .map(|p| p.name.as_str())
            .unwrap_or_default();
        tracing::debug!(
            %session_id,
            %participant_id,
            name,
            now_empty = transition.now_empty,
            "participant left"
        );
    } else {
        tracing::debug!(%session_id, kind = %action.kind, applied = transition.applied, "action applied");
    }
}
