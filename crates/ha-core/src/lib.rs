//! Core types shared by the host and the Home Connect integration
//!
//! This crate provides the fundamental types the entity platform is built on:
//! EntityId, State, Event, Context and ServiceCall.

mod context;
mod entity_id;
mod event;
mod service_call;
mod state;

pub use context::Context;
pub use entity_id::{slugify, EntityId, EntityIdError};
pub use event::{Event, EventData, EventType};
pub use service_call::{ServiceCall, SupportsResponse};
pub use state::State;

/// State value used when an entity has no value to report
pub const STATE_UNKNOWN: &str = "unknown";

/// State value used when an entity reports itself unavailable
pub const STATE_UNAVAILABLE: &str = "unavailable";

/// State value of a switch that is on
pub const STATE_ON: &str = "on";

/// State value of a switch that is off
pub const STATE_OFF: &str = "off";

/// Event types fired by the host
pub mod events {
    use super::*;

    /// Event type for state changes
    pub const STATE_CHANGED: &str = "state_changed";

    /// Event type for Home Assistant start
    pub const HOMEASSISTANT_START: &str = "homeassistant_start";

    /// Event type for Home Assistant stop
    pub const HOMEASSISTANT_STOP: &str = "homeassistant_stop";

    /// Data for STATE_CHANGED events
    ///
    /// `new_state` is `None` when the entity was removed.
    #[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
    pub struct StateChangedData {
        pub entity_id: EntityId,
        pub old_state: Option<State>,
        pub new_state: Option<State>,
    }

    impl EventData for StateChangedData {
        fn event_type() -> &'static str {
            STATE_CHANGED
        }
    }
}
