//! Session storage for Cardroom.
//!
//! This crate owns everything about a session's *lifetime*:
//!
//! 1. **The entity**: [`Session`] and its participants, with the atomic
//!    mutation operations (join, select, reveal, reset, leave).
//! 2. **Exclusive access**: [`SessionHandle`], one guard per session so
//!    unrelated sessions never contend.
//! 3. **The registry**: [`SessionRegistry`], the only place sessions are
//!    inserted or removed, with capacity eviction and stale reaping.
//!
//! # How it fits in the stack
//!
//! ```text
//! Engine Layer (above)   ← turns actions into mutations and broadcasts
//!     ↕
//! Session Layer (this crate)  ← stores sessions, serializes mutations
//!     ↕
//! Protocol Layer (below) ← provides SessionId, ParticipantId, Update
//! ```

mod clock;
mod config;
mod error;
mod handle;
mod ids;
mod registry;
mod session;

pub use clock::{Clock, ManualClock, SystemClock, Timestamp};
pub use config::{CapacityPolicy, RegistryConfig};
pub use error::SessionError;
pub use handle::{Departure, SessionGuard, SessionHandle};
pub use ids::{IdGenerator, SequentialIds, UuidGenerator};
pub use registry::{RemovalHook, SessionRegistry};
pub use session::{Participant, Session, SessionSnapshot};
