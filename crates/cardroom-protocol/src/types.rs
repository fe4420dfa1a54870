//! Core protocol types for Cardroom's wire format.
//!
//! Inbound traffic is a stream of [`Action`]s, each naming the session it
//! targets. Outbound traffic is a stream of [`Update`]s, each a complete
//! snapshot of one session, delivered on that session's channel.

use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// A unique identifier for a session (one estimation room).
///
/// Newtype over `String` so a `SessionId` can never be passed where a
/// `ParticipantId` is expected. `#[serde(transparent)]` keeps the JSON
/// form a plain string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// Wraps a raw identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrows the raw identifier.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SessionId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for SessionId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// A participant's identity within one session.
///
/// An empty `ParticipantId` is how a client asks the server to assign one.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParticipantId(String);

impl ParticipantId {
    /// Wraps a raw identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrows the raw identifier.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// `true` when no identity was supplied.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ParticipantId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for ParticipantId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

// ---------------------------------------------------------------------------
// Channels
// ---------------------------------------------------------------------------

/// Prefix of every per-session broadcast channel.
pub const CHANNEL_PREFIX: &str = "room/";

/// The broadcast channel a session's updates are published on.
///
/// ```rust
/// use cardroom_protocol::{channel_key, SessionId};
/// assert_eq!(channel_key(&SessionId::from("abc")), "room/abc");
/// ```
pub fn channel_key(session_id: &SessionId) -> String {
    format!("{CHANNEL_PREFIX}{session_id}")
}

// ---------------------------------------------------------------------------
// Inbound
// ---------------------------------------------------------------------------

/// What a participant is asking the session to do.
///
/// There is deliberately no `Update` variant: updates only ever flow
/// outbound, so an inbound frame tagged `UPDATE` fails to decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionKind {
    /// Enter the session (or re-enter under the same id).
    Join,
    /// Play a card. Older clients send `CARD_PLAYED`.
    #[serde(alias = "CARD_PLAYED")]
    Vote,
    /// Show every selection to the group.
    Reveal,
    /// Clear every selection and hide them again.
    Reset,
    /// Leave the session.
    Leave,
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Join => "JOIN",
            Self::Vote => "VOTE",
            Self::Reveal => "REVEAL",
            Self::Reset => "RESET",
            Self::Leave => "LEAVE",
        };
        f.write_str(name)
    }
}

/// An inbound action, as delivered by the transport.
///
/// Optional fields are only meaningful for some kinds: `participant_name`
/// for `JOIN`, `selection` for `VOTE`, `participant_id` for everything
/// that acts on behalf of one participant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Action {
    #[serde(rename = "type")]
    pub kind: ActionKind,

    pub session_id: SessionId,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub participant_id: Option<ParticipantId>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub participant_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selection: Option<String>,
}

impl Action {
    fn bare(kind: ActionKind, session_id: SessionId) -> Self {
        Self {
            kind,
            session_id,
            participant_id: None,
            participant_name: None,
            selection: None,
        }
    }

    /// A `JOIN`. Pass `None` (or an empty id) to have the server assign one.
    pub fn join(
        session_id: SessionId,
        participant_id: Option<ParticipantId>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            participant_id,
            participant_name: Some(name.into()),
            ..Self::bare(ActionKind::Join, session_id)
        }
    }

    /// A `VOTE` for `participant_id`.
    pub fn vote(
        session_id: SessionId,
        participant_id: ParticipantId,
        selection: impl Into<String>,
    ) -> Self {
        Self {
            participant_id: Some(participant_id),
            selection: Some(selection.into()),
            ..Self::bare(ActionKind::Vote, session_id)
        }
    }

    /// A `REVEAL`.
    pub fn reveal(session_id: SessionId) -> Self {
        Self::bare(ActionKind::Reveal, session_id)
    }

    /// A `RESET`.
    pub fn reset(session_id: SessionId) -> Self {
        Self::bare(ActionKind::Reset, session_id)
    }

    /// A `LEAVE` for `participant_id`.
    pub fn leave(session_id: SessionId, participant_id: ParticipantId) -> Self {
        Self {
            participant_id: Some(participant_id),
            ..Self::bare(ActionKind::Leave, session_id)
        }
    }
}

// ---------------------------------------------------------------------------
// Outbound
// ---------------------------------------------------------------------------

/// One participant as shown to the group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParticipantView {
    pub id: ParticipantId,
    pub name: String,
    /// `""` until the participant plays a card.
    pub selection: String,
}

impl ParticipantView {
    /// `true` once a card has been played this round.
    pub fn has_selected(&self) -> bool {
        !self.selection.is_empty()
    }
}

/// The authoritative state of one session, broadcast after every action.
///
/// Serialized with `"type": "UPDATE"` so clients can tell it apart from
/// their own outbound frames on a shared socket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename = "UPDATE", rename_all = "camelCase")]
pub struct Update {
    pub session_id: SessionId,
    /// Participants in join order.
    pub participants: Vec<ParticipantView>,
    pub revealed: bool,
    /// `true` on exactly the one update that follows a reset.
    pub resetting: bool,
}

// =========================================================================
// Tests
// =========================================================================
