//! One appliance + key pair and everything the entities read from it

use std::sync::{Arc, Mutex, PoisonError};

use ha_entity_platform::StateWriter;
use home_connect_api::{Appliance, HomeConnectError, ListenerId, Parameter, ValueType};
use serde_json::Value;
use tracing::trace;

use crate::consts::{DOMAIN, OPTION_ICON, SETTING_ICON};

/// Where a control's value lives on the appliance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ControlSource {
    /// An option of the selected program
    Option,
    /// A persistent setting
    Setting,
}

impl ControlSource {
    /// Device class tag of entities bound to this source
    pub fn device_class(self) -> String {
        match self {
            ControlSource::Option => format!("{}__options", DOMAIN),
            ControlSource::Setting => format!("{}__settings", DOMAIN),
        }
    }

    fn default_icon(self) -> &'static str {
        match self {
            ControlSource::Option => OPTION_ICON,
            ControlSource::Setting => SETTING_ICON,
        }
    }
}

/// What discovery knew about the control when it created it
#[derive(Debug, Clone)]
pub struct ControlConfig {
    /// Snapshot of the option or setting at discovery time
    pub descriptor: Parameter,
    /// Icon override
    pub icon: Option<String>,
}

/// An appliance bound to one option or setting key
///
/// Values are never cached: every read goes to the live appliance, with
/// the discovery snapshot as fallback for bounds and unit.
pub struct BoundControl {
    appliance: Arc<Appliance>,
    key: String,
    source: ControlSource,
    config: ControlConfig,
    listeners: Mutex<Vec<ListenerId>>,
}

impl BoundControl {
    pub fn new(appliance: Arc<Appliance>, source: ControlSource, config: ControlConfig) -> Self {
        Self {
            key: config.descriptor.key.clone(),
            appliance,
            source,
            config,
            listeners: Mutex::new(Vec::new()),
        }
    }

    pub fn appliance(&self) -> &Arc<Appliance> {
        &self.appliance
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn source(&self) -> ControlSource {
        self.source
    }

    pub fn descriptor(&self) -> &Parameter {
        &self.config.descriptor
    }

    /// `{ha_id}_{key}`
    pub fn unique_id(&self) -> String {
        format!("{}_{}", self.appliance.ha_id(), self.key)
    }

    /// Display name reported by the service, if any
    pub fn name_ext(&self) -> Option<String> {
        self.appliance.with_data(|data| match self.source {
            ControlSource::Option => data
                .available_programs
                .iter()
                .flat_map(|programs| programs.values())
                .filter_map(|program| program.options.get(&self.key))
                .find_map(|option| option.name.clone()),
            ControlSource::Setting => data
                .settings
                .get(&self.key)
                .and_then(|setting| setting.name.clone()),
        })
    }

    /// `{appliance name} {name_ext or key}`
    pub fn name(&self) -> String {
        let suffix = self.name_ext().unwrap_or_else(|| self.key.clone());
        format!("{} {}", self.appliance.name(), suffix)
    }

    pub fn icon(&self) -> String {
        self.config
            .icon
            .clone()
            .unwrap_or_else(|| self.source.default_icon().to_string())
    }

    pub fn device_class(&self) -> String {
        self.source.device_class()
    }

    /// Whether the appliance is connected
    pub fn base_available(&self) -> bool {
        self.appliance.connected()
    }

    /// Whether the selected program carries this option
    pub fn program_option_available(&self) -> bool {
        self.appliance.selected_option(&self.key).is_some()
    }

    /// The live option or setting
    pub fn live(&self) -> Option<Parameter> {
        match self.source {
            ControlSource::Option => self.appliance.selected_option(&self.key),
            ControlSource::Setting => self.appliance.setting(&self.key),
        }
    }

    /// The live value
    pub fn value(&self) -> Option<Value> {
        self.live().and_then(|p| p.value)
    }

    pub fn min(&self) -> Option<f64> {
        self.bound(Parameter::min)
    }

    pub fn max(&self) -> Option<f64> {
        self.bound(Parameter::max)
    }

    pub fn step(&self) -> Option<f64> {
        self.bound(Parameter::stepsize)
    }

    pub fn unit(&self) -> Option<String> {
        self.live()
            .and_then(|p| p.unit)
            .or_else(|| self.config.descriptor.unit.clone())
    }

    /// Whether values must be sent as integers
    pub fn is_int(&self) -> bool {
        self.config.descriptor.value_type == Some(ValueType::Int)
    }

    fn bound(&self, read: fn(&Parameter) -> Option<f64>) -> Option<f64> {
        self.live()
            .as_ref()
            .and_then(read)
            .or_else(|| read(&self.config.descriptor))
    }

    /// Re-publish through `writer` whenever the key (or one of `extra_keys`)
    /// is updated on the appliance
    pub fn subscribe(&self, writer: StateWriter, extra_keys: &[&str]) {
        let mut listeners = self.listeners.lock().unwrap_or_else(PoisonError::into_inner);
        for key in std::iter::once(self.key.as_str()).chain(extra_keys.iter().copied()) {
            let writer = writer.clone();
            let id = self.appliance.register_update_listener(
                key,
                Arc::new(move |_: &Appliance, key: &str, _: &Value| {
                    trace!(entity_id = %writer.entity_id(), key = %key, "Update received");
                    writer.write();
                }),
            );
            listeners.push(id);
        }
    }

    /// Drop every update subscription
    pub fn unsubscribe(&self) {
        let mut listeners = self.listeners.lock().unwrap_or_else(PoisonError::into_inner);
        for id in listeners.drain(..) {
            self.appliance.remove_update_listener(id);
        }
    }
}

impl std::fmt::Debug for BoundControl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoundControl")
            .field("ha_id", &self.appliance.ha_id())
            .field("key", &self.key)
            .field("source", &self.source)
            .finish()
    }
}

/// `{prefix}: {description} ({code} - {subject})`, description omitted when absent
pub(crate) fn failure_message(prefix: &str, err: &HomeConnectError, subject: &str) -> String {
    match &err.description {
        Some(description) => format!("{}: {} ({} - {})", prefix, description, err.code, subject),
        None => format!("{}: ({} - {})", prefix, err.code, subject),
    }
}
