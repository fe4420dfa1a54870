//! Error types for the session layer.

use cardroom_protocol::SessionId;

/// Errors that can occur when addressing a specific session.
///
/// The engine never surfaces these to participants: an action against a
/// missing or closed session is dropped. They exist for direct callers of
/// the registry and of [`SessionHandle`](crate::SessionHandle).
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// No session with this id is registered.
    #[error("session {0} not found")]
    NotFound(SessionId),

    /// The session was removed from the registry (emptied, reaped, or
    /// evicted) while the caller still held its handle.
    #[error("session {0} is closed")]
    Closed(SessionId),
}
