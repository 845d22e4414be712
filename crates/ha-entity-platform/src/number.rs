//! Number domain
//!
//! A number entity exposes a numeric value with bounds and a step, and can
//! be written through the `number.set_value` service.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use ha_core::{ServiceCall, SupportsResponse};
use ha_service_registry::{ServiceDescription, ServiceError, ServiceRegistry};
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::entity::{Entity, HomeAssistantError, PlatformEntity};
use crate::platform::EntityPlatform;

pub const DOMAIN: &str = "number";

pub const DEFAULT_MIN_VALUE: f64 = 0.0;
pub const DEFAULT_MAX_VALUE: f64 = 100.0;
pub const DEFAULT_STEP: f64 = 1.0;

/// An entity holding a numeric value
#[async_trait]
pub trait NumberEntity: Entity {
    /// Current value, `None` when unknown
    fn native_value(&self) -> Option<f64>;

    fn native_min_value(&self) -> Option<f64> {
        None
    }

    fn native_max_value(&self) -> Option<f64> {
        None
    }

    fn native_step(&self) -> Option<f64> {
        None
    }

    fn native_unit_of_measurement(&self) -> Option<String> {
        None
    }

    /// Write a new value
    async fn set_native_value(&self, value: f64) -> Result<(), HomeAssistantError>;

    fn min_value(&self) -> f64 {
        self.native_min_value().unwrap_or(DEFAULT_MIN_VALUE)
    }

    fn max_value(&self) -> f64 {
        self.native_max_value().unwrap_or(DEFAULT_MAX_VALUE)
    }

    fn step(&self) -> f64 {
        self.native_step().unwrap_or(DEFAULT_STEP)
    }
}

impl PlatformEntity for dyn NumberEntity {
    const DOMAIN: &'static str = DOMAIN;

    fn state(&self) -> Option<String> {
        self.native_value().map(format_number)
    }

    fn state_attributes(&self) -> HashMap<String, Value> {
        let mut attrs = HashMap::new();
        attrs.insert("min".to_string(), json!(self.min_value()));
        attrs.insert("max".to_string(), json!(self.max_value()));
        attrs.insert("step".to_string(), json!(self.step()));
        attrs.insert("mode".to_string(), json!("auto"));
        if let Some(unit) = self.native_unit_of_measurement() {
            attrs.insert("unit_of_measurement".to_string(), json!(unit));
        }
        attrs
    }
}

/// Format a number for state display (remove trailing zeros)
pub fn format_number(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{:.0}", value)
    } else {
        format!("{}", value)
    }
}

/// Register the number services, dispatching to the entities of `platform`
pub fn register_number_services(
    services: &ServiceRegistry,
    platform: Arc<EntityPlatform<dyn NumberEntity>>,
) {
    services.register_with_description(
        ServiceDescription {
            domain: DOMAIN.to_string(),
            service: "set_value".to_string(),
            name: Some("Set value".to_string()),
            description: Some("Set the value of a number entity".to_string()),
            schema: Some(json!({
                "value": {"required": true, "selector": {"number": {}}}
            })),
            supports_response: SupportsResponse::None,
        },
        move |call: ServiceCall| {
            let platform = platform.clone();
            async move {
                let value = call
                    .service_data
                    .get("value")
                    .and_then(Value::as_f64)
                    .ok_or_else(|| ServiceError::InvalidData("value must be a number".to_string()))?;

                for (entity_id, entity) in platform.service_targets(&call) {
                    let (min, max) = (entity.min_value(), entity.max_value());
                    if value < min || value > max {
                        warn!(entity_id = %entity_id, value, min, max, "Value out of range");
                        return Err(ServiceError::InvalidData(format!(
                            "value {} for {} is outside valid range {} - {}",
                            format_number(value),
                            entity_id,
                            format_number(min),
                            format_number(max)
                        )));
                    }

                    debug!(entity_id = %entity_id, value, "Setting number value");
                    entity
                        .set_native_value(value)
                        .await
                        .map_err(|e| ServiceError::CallFailed(e.to_string()))?;
                }
                Ok(None)
            }
        },
    );

    info!("Number services registered");
}
