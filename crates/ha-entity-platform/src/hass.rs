//! The host instance integrations are set up against

use std::sync::Arc;

use ha_event_bus::EventBus;
use ha_service_registry::ServiceRegistry;
use ha_state_store::StateStore;

/// The central Home Assistant instance
pub struct HomeAssistant {
    /// Event bus for pub/sub communication
    pub bus: Arc<EventBus>,
    /// Published entity states
    pub states: Arc<StateStore>,
    /// Service registry for service calls
    pub services: Arc<ServiceRegistry>,
}

impl HomeAssistant {
    /// Create a new Home Assistant instance
    pub fn new() -> Self {
        let bus = Arc::new(EventBus::new());
        let states = Arc::new(StateStore::new(bus.clone()));
        let services = Arc::new(ServiceRegistry::new());

        Self {
            bus,
            states,
            services,
        }
    }
}

impl Default for HomeAssistant {
    fn default() -> Self {
        Self::new()
    }
}
