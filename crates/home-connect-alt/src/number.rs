//! Numeric options and settings as `number` entities

use std::sync::Arc;

use async_trait::async_trait;
use ha_entity_platform::{Entity, EntityPlatform, HomeAssistantError, NumberEntity, StateWriter};
use home_connect_api::{HomeConnect, SELECTED_PROGRAM};
use serde_json::{json, Value};

use crate::classify::ControlKind;
use crate::config::IntegrationConfig;
use crate::control::{failure_message, BoundControl, ControlSource};
use crate::discovery::{self, ControlDomain, Discovery};

/// The `number` domain of this integration
pub struct NumberDomain;

impl ControlDomain for NumberDomain {
    type Entity = dyn NumberEntity;

    const KIND: ControlKind = ControlKind::Numeric;

    fn build(control: BoundControl) -> Arc<dyn NumberEntity> {
        match control.source() {
            ControlSource::Option => Arc::new(OptionNumber { control }),
            ControlSource::Setting => Arc::new(SettingsNumber { control }),
        }
    }
}

/// Set up the `number` platform
pub fn async_setup_entry(
    homeconnect: Arc<HomeConnect>,
    config: Arc<IntegrationConfig>,
    platform: Arc<EntityPlatform<dyn NumberEntity>>,
) -> Arc<Discovery<NumberDomain>> {
    discovery::setup::<NumberDomain>(homeconnect, config, platform)
}

/// A numeric option of the selected program
pub struct OptionNumber {
    control: BoundControl,
}

impl Entity for OptionNumber {
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
impl NumberEntity for OptionNumber {
    fn native_value(&self) -> Option<f64> {
        if !self.control.program_option_available() {
            return None;
        }
        self.control.value().as_ref().and_then(Value::as_f64)
    }

    fn native_min_value(&self) -> Option<f64> {
        Some(self.control.min().unwrap_or(0.0))
    }

    fn native_max_value(&self) -> Option<f64> {
        self.control.max()
    }

    fn native_step(&self) -> Option<f64> {
        self.control.step()
    }

    fn native_unit_of_measurement(&self) -> Option<String> {
        self.control.unit()
    }

    async fn set_native_value(&self, value: f64) -> Result<(), HomeAssistantError> {
        let value = if self.control.is_int() {
            json!(value.trunc() as i64)
        } else {
            json!(value)
        };

        let key = self.control.key();
        self.control
            .appliance()
            .set_option(key, value.clone())
            .await
            .map_err(|e| {
                HomeAssistantError::Failed(failure_message(
                    "Failed to set the option value",
                    &e,
                    &format!("{}={}", key, value),
                ))
            })
    }
}

/// A numeric persistent setting
pub struct SettingsNumber {
    control: BoundControl,
}

impl Entity for SettingsNumber {
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
        self.control.base_available()
    }

    fn added_to_platform(&self, writer: StateWriter) {
        self.control.subscribe(writer, &[]);
    }

    fn will_remove_from_platform(&self) {
        self.control.unsubscribe();
    }
}

#[async_trait]
impl NumberEntity for SettingsNumber {
    fn native_value(&self) -> Option<f64> {
        self.control.value().as_ref().and_then(Value::as_f64)
    }

    fn native_min_value(&self) -> Option<f64> {
        self.control.min()
    }

    fn native_max_value(&self) -> Option<f64> {
        self.control.max()
    }

    fn native_step(&self) -> Option<f64> {
        self.control.step()
    }

    fn native_unit_of_measurement(&self) -> Option<String> {
        self.control.unit()
    }

    async fn set_native_value(&self, value: f64) -> Result<(), HomeAssistantError> {
        let key = self.control.key();
        self.control
            .appliance()
            .apply_setting(key, json!(value))
            .await
            .map_err(|e| {
                HomeAssistantError::Failed(failure_message(
                    "Failed to apply the setting value",
                    &e,
                    key,
                ))
            })
    }
}
