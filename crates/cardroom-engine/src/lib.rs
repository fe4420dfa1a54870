//! The engine: turns inbound actions into session mutations and
//! outbound updates.
//!
//! # Key types
//!
//! - [`StateMachine`] applies one [`Action`](cardroom_protocol::Action) to
//!   one [`Session`](cardroom_session::Session)
//! - [`SessionRouter`] looks the session up, applies the action under the
//!   session's lock, and publishes the resulting update
//! - [`Broadcaster`] is where updates go; [`ChannelBroadcaster`] is the
//!   in-process implementation
//!
//! ```text
//! Action ──→ SessionRouter ──→ SessionRegistry::get ──→ lock session
//!                                                        │
//!            Broadcaster::publish ←── Update ←── StateMachine::apply
//! ```

mod broadcast;
mod error;
mod machine;
mod router;

pub use broadcast::{Broadcaster, ChannelBroadcaster, DEFAULT_CHANNEL_CAPACITY};
pub use error::EngineError;
pub use machine::{StateMachine, Transition};
pub use router::SessionRouter;
