//! Home Connect Alt
//!
//! Exposes the options and settings of Home Connect appliances as `number`
//! and `switch` entities. Entities are created when appliances are paired or
//! a program is selected, removed when an appliance is depaired, and
//! re-published whenever the appliance reports an update for their key.
//! Writes go back through [`home_connect_api::Appliance::set_option`] and
//! [`home_connect_api::Appliance::apply_setting`].

pub mod classify;
pub mod config;
pub mod consts;
pub mod control;
pub mod discovery;
pub mod lifecycle;
pub mod manager;
pub mod number;
pub mod switch;

use std::sync::Arc;

use ha_entity_platform::number::register_number_services;
use ha_entity_platform::switch::register_switch_services;
use ha_entity_platform::{EntityPlatform, HomeAssistant, NumberEntity, SwitchEntity};
use home_connect_api::HomeConnect;
use tracing::info;

pub use classify::{classify, ControlKind};
pub use config::{
    load_config_file, load_config_str, ConfigError, IntegrationConfig, OptionEntityPolicy,
};
pub use consts::DOMAIN;
pub use control::{BoundControl, ControlConfig, ControlSource};
pub use discovery::{ControlDomain, Discovery};
pub use lifecycle::{ApplianceLifecycle, LifecycleState};
pub use manager::{EntityManager, RegisterSummary, ScanBatch};
pub use number::{NumberDomain, OptionNumber, SettingsNumber};
pub use switch::{OptionSwitch, SettingsSwitch, SwitchDomain};

/// The integration, set up on one host
pub struct HomeConnectAlt {
    pub numbers: Arc<EntityPlatform<dyn NumberEntity>>,
    pub switches: Arc<EntityPlatform<dyn SwitchEntity>>,
    number_discovery: Arc<Discovery<NumberDomain>>,
    switch_discovery: Arc<Discovery<SwitchDomain>>,
}

impl HomeConnectAlt {
    /// Create both platforms, register their services and start discovery
    pub fn setup(
        hass: &HomeAssistant,
        homeconnect: Arc<HomeConnect>,
        config: IntegrationConfig,
    ) -> Self {
        let config = Arc::new(config);

        let numbers = EntityPlatform::<dyn NumberEntity>::new(DOMAIN, hass.states.clone());
        register_number_services(&hass.services, numbers.clone());
        let number_discovery =
            number::async_setup_entry(homeconnect.clone(), config.clone(), numbers.clone());

        let switches = EntityPlatform::<dyn SwitchEntity>::new(DOMAIN, hass.states.clone());
        register_switch_services(&hass.services, switches.clone());
        let switch_discovery = switch::async_setup_entry(homeconnect, config, switches.clone());

        info!(
            numbers = numbers.len(),
            switches = switches.len(),
            "Home Connect Alt set up"
        );

        Self {
            numbers,
            switches,
            number_discovery,
            switch_discovery,
        }
    }

    pub fn number_discovery(&self) -> &Arc<Discovery<NumberDomain>> {
        &self.number_discovery
    }

    pub fn switch_discovery(&self) -> &Arc<Discovery<SwitchDomain>> {
        &self.switch_discovery
    }

    /// Stop listening to the client and remove every entity
    pub fn unload(&self, hass: &HomeAssistant) {
        self.number_discovery.unload();
        self.switch_discovery.unload();
        hass.services.unregister_domain(ha_entity_platform::number::DOMAIN);
        hass.services.unregister_domain(ha_entity_platform::switch::DOMAIN);
        info!("Home Connect Alt unloaded");
    }
}
