//! Error types for the engine layer.

use cardroom_protocol::{ProtocolError, SessionId};

/// Errors raised while routing or applying an action.
///
/// None of these reach the transport for a known session: the router logs
/// them and still publishes the last good state.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// No unused participant id could be generated for a join.
    #[error("could not generate an unused participant id in session {0}")]
    IdSpaceExhausted(SessionId),

    /// An inbound frame could not be decoded.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}
