//! Transport that applies writes to the in-memory appliances
//!
//! Stands in for the Home Connect service: a write is accepted and echoed
//! back as the update event the service would send.

use std::sync::{Arc, Weak};

use async_trait::async_trait;
use home_connect_api::{Appliance, ApplianceApi, HomeConnect, HomeConnectError, HomeConnectResult};
use serde_json::Value;
use tracing::info;

pub struct LoopbackApi {
    homeconnect: Weak<HomeConnect>,
}

impl LoopbackApi {
    pub fn new(homeconnect: Weak<HomeConnect>) -> Self {
        Self { homeconnect }
    }

    fn appliance(&self, ha_id: &str) -> HomeConnectResult<Arc<Appliance>> {
        self.homeconnect
            .upgrade()
            .and_then(|hc| hc.appliance(ha_id))
            .ok_or_else(|| {
                HomeConnectError::with_description(
                    "SDK.Error.HomeAppliance.Connection.Initialization.Failed",
                    format!("Unknown appliance {}", ha_id),
                )
            })
    }
}

#[async_trait]
impl ApplianceApi for LoopbackApi {
    async fn set_option(&self, ha_id: &str, key: &str, value: Value) -> HomeConnectResult<()> {
        let appliance = self.appliance(ha_id)?;
        if !appliance.update_option(key, value.clone()) {
            return Err(HomeConnectError::with_description(
                "SDK.Error.UnsupportedOption",
                format!("{} is not an option of the selected program", key),
            ));
        }
        info!(ha_id = %ha_id, key = %key, value = %value, "Option set");
        Ok(())
    }

    async fn apply_setting(&self, ha_id: &str, key: &str, value: Value) -> HomeConnectResult<()> {
        let appliance = self.appliance(ha_id)?;
        if !appliance.has_setting(key) {
            return Err(HomeConnectError::new("SDK.Error.UnsupportedSetting"));
        }
        appliance.update_setting(key, value.clone());
        info!(ha_id = %ha_id, key = %key, value = %value, "Setting applied");
        Ok(())
    }
}
