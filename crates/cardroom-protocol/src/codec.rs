//! Codec trait and implementations for serializing/deserializing messages.
//!
//! The engine does not care how frames are serialized, only that
//! something implements [`Codec`]. [`JsonCodec`] is what browser clients
//! speak.

use serde::{de::DeserializeOwned, Serialize};

use crate::ProtocolError;

/// Encodes Rust values to bytes and decodes bytes back.
///
/// ## Trait bounds explained
///
/// - `Send + Sync`: the codec can be shared between threads. The router
///   holds one and every inbound handler task calls into it, and Tokio
///   may run those tasks on any worker thread.
/// - `'static`: the codec borrows nothing temporary. It owns whatever it
///   needs, so it can be stored inside a long-lived router.
///
/// ## Generic methods
///
/// `encode` and `decode` work for any `T` with the matching serde trait:
/// - `encode<T: Serialize>`: `T` can be turned into bytes.
/// - `decode<T: DeserializeOwned>`: `T` can be built from bytes.
///
/// `DeserializeOwned` (rather than plain `Deserialize<'de>`) means the
/// decoded value owns all of its data and does not borrow from the input
/// buffer. A handler can drop the frame as soon as it has an [`Action`].
///
/// Because the methods are generic, `Codec` is not object safe. The
/// router takes its codec as a type parameter instead of a `dyn Codec`.
///
/// [`Action`]: crate::Action
pub trait Codec: Send + Sync + 'static {
    /// Serializes a value into bytes.
    ///
    /// # Errors
    /// Returns `ProtocolError::Encode` if serialization fails.
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError>;

    /// Deserializes bytes back into a value.
    ///
    /// # Errors
    /// Returns `ProtocolError::Decode` if the bytes are malformed or do
    /// not match the expected type.
    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError>;
}

// ---------------------------------------------------------------------------
// JsonCodec
// ---------------------------------------------------------------------------

/// A [`Codec`] backed by `serde_json`.
///
/// ```rust
/// use cardroom_protocol::{Action, Codec, JsonCodec, SessionId};
///
/// let codec = JsonCodec;
/// let action = Action::reveal(SessionId::from("s-1"));
///
/// let bytes = codec.encode(&action).unwrap();
/// let decoded: Action = codec.decode(&bytes).unwrap();
/// assert_eq!(action, decoded);
/// ```
#[cfg(feature = "json")]
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

#[cfg(feature = "json")]
impl Codec for JsonCodec {
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError> {
        serde_json::to_vec(value).map_err(ProtocolError::Encode)
    }

    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError> {
        serde_json::from_slice(data).map_err(ProtocolError::Decode)
    }
}

#[cfg(all(test, feature = "json"))]
mod tests {
    use super::*;
    use crate::{Action, ActionKind, Update};

    #[test]
    fn test_decode_browser_vote_frame() {
        let frame = br#"{"type":"VOTE","sessionId":"abc","participantId":"p1","selection":"8"}"#;
        let action: Action = JsonCodec.decode(frame).unwrap();

        assert_eq!(action.kind, ActionKind::Vote);
        assert_eq!(action.session_id.as_str(), "abc");
        assert_eq!(action.selection.as_deref(), Some("8"));
    }

    #[test]
    fn test_decode_rejects_update_as_inbound() {
        let frame = br#"{"type":"UPDATE","sessionId":"abc"}"#;
        let result: Result<Action, _> = JsonCodec.decode(frame);
        assert!(matches!(result, Err(ProtocolError::Decode(_))));
    }

    #[test]
    fn test_decode_garbage_is_decode_error() {
        let result: Result<Action, _> = JsonCodec.decode(b"not json");
        assert!(matches!(result, Err(ProtocolError::Decode(_))));
    }

    #[test]
    fn test_encode_update_is_tagged() {
        let update = Update {
            session_id: "abc".into(),
            participants: vec![],
            revealed: false,
            resetting: true,
        };
        let bytes = JsonCodec.encode(&update).unwrap();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(json["type"], "UPDATE");
        assert_eq!(json["resetting"], true);
    }
}
