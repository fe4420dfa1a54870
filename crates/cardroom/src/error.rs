//! Unified error type for Cardroom.

use cardroom_engine::EngineError;
use cardroom_protocol::ProtocolError;
use cardroom_session::SessionError;

/// Top-level error wrapping every crate-specific error.
///
/// `#[from]` on each variant lets `?` convert sub-crate errors.
#[derive(Debug, thiserror::Error)]
pub enum CardroomError {
    /// Encoding or decoding a frame failed.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A session lookup failed.
    #[error(transparent)]
    Session(#[from] SessionError),

    /// Routing an action failed before it reached a session.
    #[error(transparent)]
    Engine(#[from] EngineError),

    /// The configuration document could not be parsed.
    #[error("invalid configuration: {0}")]
    Config(#[source] serde_json::Error),

    /// The log filter directive could not be parsed.
    #[error("invalid log directive: {0}")]
    Logging(#[from] tracing_subscriber::filter::ParseError),
}
