//! # Cardroom
//!
//! In-memory planning-poker sessions: participants join a session, play a
//! card each, reveal them together, and reset for the next round.
//!
//! Cardroom owns the sessions and their state transitions. Sockets,
//! pages, and authentication live outside; they feed in [`Action`]s and
//! receive [`Update`]s on the session's channel (`room/<sessionId>`).
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use cardroom::prelude::*;
//!
//! # async fn run() -> Result<(), CardroomError> {
//! let config = CardroomConfig::from_json_str(r#"{"evictor": {"interval_secs": 30}}"#)?;
//! cardroom::logging::init(&config.logging)?;
//!
//! let cardroom = Cardroom::builder().config(config).build();
//! let session = cardroom.create_session("Sprint 1").await;
//! let mut updates = cardroom.subscribe(&session.id);
//!
//! cardroom
//!     .dispatch(Action::join(session.id.clone(), None, "Alice"))
//!     .await;
//! let update = updates.recv().await.expect("update");
//! assert_eq!(update.participants.len(), 1);
//!
//! cardroom.shutdown().await;
//! # Ok(())
//! # }
//! ```

mod config;
mod error;
pub mod logging;
mod service;

pub use config::CardroomConfig;
pub use error::CardroomError;
pub use service::{Cardroom, CardroomBuilder};

pub use cardroom_engine::{Broadcaster, ChannelBroadcaster};
pub use cardroom_protocol::{Action, ActionKind, ParticipantId, ParticipantView, SessionId, Update};
pub use cardroom_session::SessionSnapshot;

/// Everything needed to embed Cardroom.
pub mod prelude {
    pub use crate::logging::LoggingConfig;
    pub use crate::{Cardroom, CardroomBuilder, CardroomConfig, CardroomError};
    pub use cardroom_engine::{Broadcaster, ChannelBroadcaster};
    pub use cardroom_evictor::{EvictorConfig, EvictorMetrics, MissedTickPolicy};
    pub use cardroom_protocol::{
        channel_key, Action, ActionKind, ParticipantId, ParticipantView, SessionId, Update,
    };
    pub use cardroom_session::{
        CapacityPolicy, Clock, IdGenerator, ManualClock, RegistryConfig, SessionSnapshot,
        SystemClock, Timestamp,
    };
}
