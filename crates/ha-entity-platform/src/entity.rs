//! The entity contract shared by all domains

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use ha_core::EntityId;
use thiserror::Error;

/// Failure surfaced to the user by an entity action
#[derive(Debug, Error)]
pub enum HomeAssistantError {
    /// The integration translated the failure into a user-facing message
    #[error("{0}")]
    Failed(String),

    /// The integration let an upstream error through unmodified
    #[error(transparent)]
    Upstream(Box<dyn std::error::Error + Send + Sync + 'static>),
}

impl HomeAssistantError {
    /// Wrap an upstream error without translating it
    pub fn upstream(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Upstream(Box::new(err))
    }
}

/// Properties every entity exposes to the host
///
/// Domain traits ([`crate::NumberEntity`], [`crate::SwitchEntity`]) add the
/// state value and the write operations.
pub trait Entity: Send + Sync {
    /// Stable identifier, unique within the integration
    fn unique_id(&self) -> String;

    /// Display name
    fn name(&self) -> Option<String> {
        None
    }

    /// Icon (e.g., "mdi:tune")
    fn icon(&self) -> Option<String> {
        None
    }

    /// Device class tag
    fn device_class(&self) -> Option<String> {
        None
    }

    /// Whether the entity can currently be read and controlled
    fn available(&self) -> bool {
        true
    }

    /// Called once the entity has an id and its first state was written
    fn added_to_platform(&self, _writer: StateWriter) {}

    /// Called right before the entity is dropped from the platform
    fn will_remove_from_platform(&self) {}
}

/// How a domain renders its entities into host state
///
/// Implemented for the domain trait objects (`dyn NumberEntity`,
/// `dyn SwitchEntity`), never by integrations.
pub trait PlatformEntity: Entity {
    /// Entity domain (e.g., "number")
    const DOMAIN: &'static str;

    /// State value, or `None` when unknown
    fn state(&self) -> Option<String>;

    /// Domain attributes published next to the state
    fn state_attributes(&self) -> HashMap<String, serde_json::Value>;
}

/// Handle an entity uses to ask the host to re-read and publish its state
#[derive(Clone)]
pub struct StateWriter {
    entity_id: EntityId,
    write: Arc<dyn Fn() + Send + Sync>,
}

impl StateWriter {
    /// Wrap a write callback; platforms hand these out from `add_entities`
    pub fn new(entity_id: EntityId, write: Arc<dyn Fn() + Send + Sync>) -> Self {
        Self { entity_id, write }
    }

    /// The id the platform assigned to the entity
    pub fn entity_id(&self) -> &EntityId {
        &self.entity_id
    }

    /// Re-read the entity and publish its state
    pub fn write(&self) {
        (self.write)()
    }
}

impl fmt::Debug for StateWriter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateWriter")
            .field("entity_id", &self.entity_id)
            .finish()
    }
}
