//! Switch domain

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use ha_core::{ServiceCall, SupportsResponse, STATE_OFF, STATE_ON};
use ha_service_registry::{ServiceDescription, ServiceError, ServiceRegistry};
use serde_json::Value;
use tracing::{debug, info};

use crate::entity::{Entity, HomeAssistantError, PlatformEntity};
use crate::platform::EntityPlatform;

pub const DOMAIN: &str = "switch";

/// An entity that can be turned on and off
#[async_trait]
pub trait SwitchEntity: Entity {
    /// Current value, `None` when unknown
    fn is_on(&self) -> Option<bool>;

    async fn turn_on(&self) -> Result<(), HomeAssistantError>;

    async fn turn_off(&self) -> Result<(), HomeAssistantError>;

    /// Turn off when on, on otherwise
    async fn toggle(&self) -> Result<(), HomeAssistantError> {
        if self.is_on() == Some(true) {
            self.turn_off().await
        } else {
            self.turn_on().await
        }
    }
}

impl PlatformEntity for dyn SwitchEntity {
    const DOMAIN: &'static str = DOMAIN;

    fn state(&self) -> Option<String> {
        self.is_on()
            .map(|on| if on { STATE_ON } else { STATE_OFF }.to_string())
    }

    fn state_attributes(&self) -> HashMap<String, Value> {
        HashMap::new()
    }
}

#[derive(Debug, Clone, Copy)]
enum SwitchAction {
    TurnOn,
    TurnOff,
    Toggle,
}

impl SwitchAction {
    fn service(self) -> &'static str {
        match self {
            SwitchAction::TurnOn => "turn_on",
            SwitchAction::TurnOff => "turn_off",
            SwitchAction::Toggle => "toggle",
        }
    }

    fn description(self) -> &'static str {
        match self {
            SwitchAction::TurnOn => "Turn a switch on",
            SwitchAction::TurnOff => "Turn a switch off",
            SwitchAction::Toggle => "Toggle a switch on/off",
        }
    }

    async fn run(self, entity: &dyn SwitchEntity) -> Result<(), HomeAssistantError> {
        match self {
            SwitchAction::TurnOn => entity.turn_on().await,
            SwitchAction::TurnOff => entity.turn_off().await,
            SwitchAction::Toggle => entity.toggle().await,
        }
    }
}

/// Register the switch services, dispatching to the entities of `platform`
pub fn register_switch_services(
    services: &ServiceRegistry,
    platform: Arc<EntityPlatform<dyn SwitchEntity>>,
) {
    for action in [SwitchAction::TurnOn, SwitchAction::TurnOff, SwitchAction::Toggle] {
        let platform = platform.clone();
        services.register_with_description(
            ServiceDescription {
                domain: DOMAIN.to_string(),
                service: action.service().to_string(),
                name: None,
                description: Some(action.description().to_string()),
                schema: None,
                supports_response: SupportsResponse::None,
            },
            move |call: ServiceCall| {
                let platform = platform.clone();
                async move {
                    for (entity_id, entity) in platform.service_targets(&call) {
                        debug!(entity_id = %entity_id, service = action.service(), "Switching");
                        action
                            .run(entity.as_ref())
                            .await
                            .map_err(|e| ServiceError::CallFailed(e.to_string()))?;
                    }
                    Ok(None)
                }
            },
        );
    }

    info!("Switch services registered");
}

#[cfg(test)]
mod tests {
    use super::*;
    use ha_core::Context;
    use ha_event_bus::EventBus;
    use ha_state_store::StateStore;
    use serde_json::json;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Relay {
        on: Mutex<Option<bool>>,
        calls: Mutex<Vec<&'static str>>,
    }

    impl Entity for Relay {
        fn unique_id(&self) -> String {
            "relay".to_string()
        }
    }

    #[async_trait]
    impl SwitchEntity for Relay {
        fn is_on(&self) -> Option<bool> {
            *self.on.lock().unwrap()
        }

        async fn turn_on(&self) -> Result<(), HomeAssistantError> {
            self.calls.lock().unwrap().push("on");
            *self.on.lock().unwrap() = Some(true);
            Ok(())
        }

        async fn turn_off(&self) -> Result<(), HomeAssistantError> {
            self.calls.lock().unwrap().push("off");
            Err(HomeAssistantError::Failed("relay stuck".to_string()))
        }
    }

    fn setup(relay: Arc<Relay>) -> (Arc<StateStore>, ServiceRegistry) {
        let states = Arc::new(StateStore::new(Arc::new(EventBus::new())));
        let platform = EntityPlatform::<dyn SwitchEntity>::new("test", states.clone());
        platform.add_entities(vec![relay as Arc<dyn SwitchEntity>]);
        let services = ServiceRegistry::new();
        register_switch_services(&services, platform);
        (states, services)
    }

    async fn call(services: &ServiceRegistry, service: &str) -> Result<(), ServiceError> {
        services
            .call(
                DOMAIN,
                service,
                json!({"entity_id": "switch.relay"}),
                Context::new(),
                false,
            )
            .await
            .map(|_| ())
    }

    #[test]
    fn test_unknown_state() {
        let (states, services) = setup(Arc::new(Relay::default()));
        assert_eq!(states.get_state("switch.relay").as_deref(), Some("unknown"));
        assert!(services.has_service(DOMAIN, "turn_on"));
        assert!(services.has_service(DOMAIN, "turn_off"));
        assert!(services.has_service(DOMAIN, "toggle"));
    }

    #[tokio::test]
    async fn test_turn_on_and_toggle() {
        let relay = Arc::new(Relay::default());
        let (_states, services) = setup(relay.clone());

        call(&services, "turn_on").await.unwrap();
        assert_eq!(relay.is_on(), Some(true));

        // Toggling an "on" switch turns it off, which fails here
        let err = call(&services, "toggle").await.unwrap_err();
        assert!(err.to_string().contains("relay stuck"));
        assert_eq!(*relay.calls.lock().unwrap(), vec!["on", "off"]);
    }

    #[tokio::test]
    async fn test_toggle_from_unknown_turns_on() {
        let relay = Arc::new(Relay::default());
        let (_states, services) = setup(relay.clone());

        call(&services, "toggle").await.unwrap();
        assert_eq!(*relay.calls.lock().unwrap(), vec!["on"]);
    }

    #[tokio::test]
    async fn test_unknown_entity_is_ignored() {
        let relay = Arc::new(Relay::default());
        let (_states, services) = setup(relay.clone());

        services
            .call(
                DOMAIN,
                "turn_on",
                json!({"entity_id": "switch.nope"}),
                Context::new(),
                false,
            )
            .await
            .unwrap();
        assert!(relay.calls.lock().unwrap().is_empty());
    }
}
