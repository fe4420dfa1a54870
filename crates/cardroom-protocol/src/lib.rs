//! Wire protocol for Cardroom.
//!
//! This crate defines what travels between participants and the server:
//!
//! - **Types** ([`Action`], [`Update`], [`ParticipantView`], the id
//!   newtypes): the inbound actions and the outbound session snapshot.
//! - **Channels** ([`channel_key`]): the per-session broadcast channel
//!   naming convention.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]): how messages are
//!   converted to and from bytes.
//! - **Errors** ([`ProtocolError`]).
//!
//! The protocol layer knows nothing about sessions being stored or
//! mutated. It only describes the shapes.
//!
//! ```text
//! transport (bytes) → Protocol (Action / Update) → engine (state transitions)
//! ```

mod codec;
mod error;
mod types;

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use types::{
    channel_key, Action, ActionKind, ParticipantId, ParticipantView,
    SessionId, Update, CHANNEL_PREFIX,
};
