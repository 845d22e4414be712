//! Boolean options and settings as `switch` entities

use std::sync::Arc;

use async_trait::async_trait;
use ha_entity_platform::{Entity, EntityPlatform, HomeAssistantError, StateWriter, SwitchEntity};
use home_connect_api::{HomeConnect, REMOTE_CONTROL_ACTIVE, SELECTED_PROGRAM};
use serde_json::Value;

use crate::classify::ControlKind;
use crate::config::IntegrationConfig;
use crate::control::{failure_message, BoundControl, ControlSource};
use crate::discovery::{self, ControlDomain, Discovery};

/// The `switch` domain of this integration
pub struct SwitchDomain;

impl ControlDomain for SwitchDomain {
    type Entity = dyn SwitchEntity;

    const KIND: ControlKind = ControlKind::Boolean;

    fn build(control: BoundControl) -> Arc<dyn SwitchEntity> {
        match control.source() {
            ControlSource::Option => Arc::new(OptionSwitch { control }),
            ControlSource::Setting => Arc::new(SettingsSwitch { control }),
        }
    }
}

/// Set up the `switch` platform
pub fn async_setup_entry(
    homeconnect: Arc<HomeConnect>,
    config: Arc<IntegrationConfig>,
    platform: Arc<EntityPlatform<dyn SwitchEntity>>,
) -> Arc<Discovery<SwitchDomain>> {
    discovery::setup::<SwitchDomain>(homeconnect, config, platform)
}

/// A boolean option of the selected program
pub struct OptionSwitch {
    control: BoundControl,
}

impl OptionSwitch {
    async fn set(&self, on: bool) -> Result<(), HomeAssistantError> {
        let key = self.control.key();
        self.control
            .appliance()
            .set_option(key, Value::Bool(on))
            .await
            .map_err(|e| HomeAssistantError::Failed(failure_message("Failed to set the option", &e, key)))
    }
}

impl Entity for OptionSwitch {
    fn unique_id(&self) -> String {
        self.control.unique_id()
    }

    fn name(&self) -> Option<String> {
        Some(self.control.name())
    }

    fn icon(&self) -> Option<String> {
        Some(self.control.icon())
    }

    fn device_class(&self) -> Option<String> {
        Some(self.control.device_class())
    }

    fn available(&self) -> bool {
        self.control.program_option_available()
    }

    fn added_to_platform(&self, writer: StateWriter) {
        self.control.subscribe(writer, &[SELECTED_PROGRAM]);
    }

    fn will_remove_from_platform(&self) {
        self.control.unsubscribe();
    }
}

#[async_trait]
impl SwitchEntity for OptionSwitch {
    fn is_on(&self) -> Option<bool> {
        if !self.control.program_option_available() {
            return None;
        }
        self.control.value().as_ref().and_then(Value::as_bool)
    }

    async fn turn_on(&self) -> Result<(), HomeAssistantError> {
        self.set(true).await
    }

    async fn turn_off(&self) -> Result<(), HomeAssistantError> {
        self.set(false).await
    }
}

/// A boolean persistent setting
pub struct SettingsSwitch {
    control: BoundControl,
}

impl SettingsSwitch {
    /// An explicit `false` blocks remote writes; a missing flag does not
    fn remote_control_blocked(&self) -> bool {
        self.control
            .appliance()
            .status(REMOTE_CONTROL_ACTIVE)
            .and_then(|status| status.value)
            == Some(Value::Bool(false))
    }
}

impl Entity for SettingsSwitch {
    fn unique_id(&self) -> String {
        self.control.unique_id()
    }

    fn name(&self) -> Option<String> {
        Some(self.control.name())
    }

    fn icon(&self) -> Option<String> {
        Some(self.control.icon())
    }

    fn device_class(&self) -> Option<String> {
        Some(self.control.device_class())
    }

    fn available(&self) -> bool {
        self.control.appliance().has_setting(self.control.key())
            && self.control.base_available()
            && !self.remote_control_blocked()
    }

    fn added_to_platform(&self, writer: StateWriter) {
        self.control.subscribe(writer, &[REMOTE_CONTROL_ACTIVE]);
    }

    fn will_remove_from_platform(&self) {
        self.control.unsubscribe();
    }
}

#[async_trait]
impl SwitchEntity for SettingsSwitch {
    fn is_on(&self) -> Option<bool> {
        self.control.value().as_ref().and_then(Value::as_bool)
    }

    async fn turn_on(&self) -> Result<(), HomeAssistantError> {
        let key = self.control.key();
        self.control
            .appliance()
            .apply_setting(key, Value::Bool(true))
            .await
            .map_err(|e| {
                HomeAssistantError::Failed(failure_message("Failed to apply the setting", &e, key))
            })
    }

    async fn turn_off(&self) -> Result<(), HomeAssistantError> {
        // The client error reaches the user unchanged
        self.control
            .appliance()
            .apply_setting(self.control.key(), Value::Bool(false))
            .await
            .map_err(HomeAssistantError::upstream)
    }
}
