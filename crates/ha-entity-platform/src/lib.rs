//! Entity platforms
//!
//! An entity platform is the host side of one entity domain for one
//! integration. Integrations hand their entities to the platform in batches;
//! the platform assigns entity ids, publishes state into the
//! [`ha_state_store::StateStore`] and routes service calls
//! (`number.set_value`, `switch.turn_on`, ...) back to the entities.
//!
//! Entity types are trait objects: an integration implements [`Entity`] plus
//! one domain trait ([`NumberEntity`] or [`SwitchEntity`]) and the platform
//! is `EntityPlatform<dyn NumberEntity>` / `EntityPlatform<dyn SwitchEntity>`.

mod entity;
mod hass;
pub mod number;
mod platform;
pub mod switch;

pub use entity::{Entity, HomeAssistantError, PlatformEntity, StateWriter};
pub use hass::HomeAssistant;
pub use number::NumberEntity;
pub use platform::{AddEntitiesCallback, EntityPlatform};
pub use switch::SwitchEntity;
