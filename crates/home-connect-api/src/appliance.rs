//! A single appliance and its update listeners

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;
use tracing::{debug, trace, warn};

use crate::error::HomeConnectResult;
use crate::model::{ApplianceData, Parameter, Program};
use crate::SELECTED_PROGRAM;

/// Transport behind the appliance's async mutators
///
/// The real client issues PUT requests against the Home Connect service;
/// tests use [`crate::mock::RecordingApi`].
#[async_trait]
pub trait ApplianceApi: Send + Sync {
    /// Set an option of the selected program
    async fn set_option(&self, ha_id: &str, key: &str, value: Value) -> HomeConnectResult<()>;

    /// Write a persistent setting
    async fn apply_setting(&self, ha_id: &str, key: &str, value: Value) -> HomeConnectResult<()>;
}

/// A unique identifier for an update listener
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// Callback invoked with `(appliance, key, value)` when a watched key changes
pub type UpdateHandler = Arc<dyn Fn(&Appliance, &str, &Value) + Send + Sync>;

struct UpdateListener {
    key: String,
    handler: UpdateHandler,
}

/// One appliance known to the client library
///
/// Data is only mutated by the client's own event handling (the `update_*`
/// methods); consumers read it through the accessors and write through
/// [`Appliance::set_option`] and [`Appliance::apply_setting`].
pub struct Appliance {
    ha_id: String,
    data: RwLock<ApplianceData>,
    api: Arc<dyn ApplianceApi>,
    listeners: DashMap<ListenerId, UpdateListener>,
    next_listener_id: AtomicU64,
}

impl Appliance {
    /// Create an appliance backed by the given transport
    pub fn new(data: ApplianceData, api: Arc<dyn ApplianceApi>) -> Self {
        Self {
            ha_id: data.ha_id.clone(),
            data: RwLock::new(data),
            api,
            listeners: DashMap::new(),
            next_listener_id: AtomicU64::new(1),
        }
    }

    /// The Home Connect appliance id
    pub fn ha_id(&self) -> &str {
        &self.ha_id
    }

    /// Run a closure against the current appliance data
    pub fn with_data<R>(&self, f: impl FnOnce(&ApplianceData) -> R) -> R {
        let data = self.data.read().unwrap_or_else(PoisonError::into_inner);
        f(&data)
    }

    fn mutate<R>(&self, f: impl FnOnce(&mut ApplianceData) -> R) -> R {
        let mut data = self.data.write().unwrap_or_else(PoisonError::into_inner);
        f(&mut data)
    }

    /// Display name of the appliance
    pub fn name(&self) -> String {
        self.with_data(|d| d.name.clone())
    }

    /// Whether the appliance is currently connected to the service
    pub fn connected(&self) -> bool {
        self.with_data(|d| d.connected)
    }

    /// Get a setting by key
    pub fn setting(&self, key: &str) -> Option<Parameter> {
        self.with_data(|d| d.settings.get(key).cloned())
    }

    /// Whether the appliance has a setting with this key
    pub fn has_setting(&self, key: &str) -> bool {
        self.with_data(|d| d.settings.contains_key(key))
    }

    /// Get a status entry by key
    pub fn status(&self, key: &str) -> Option<Parameter> {
        self.with_data(|d| d.status.get(key).cloned())
    }

    /// The currently selected program, if any
    pub fn selected_program(&self) -> Option<Program> {
        self.with_data(|d| d.selected_program.clone())
    }

    /// Get an option of the currently selected program
    pub fn selected_option(&self, key: &str) -> Option<Parameter> {
        self.with_data(|d| {
            d.selected_program
                .as_ref()
                .and_then(|p| p.options.get(key).cloned())
        })
    }

    /// Set an option of the selected program on the device
    pub async fn set_option(&self, key: &str, value: Value) -> HomeConnectResult<()> {
        debug!(ha_id = %self.ha_id, key = %key, value = %value, "Setting option");
        self.api.set_option(&self.ha_id, key, value).await.map_err(|e| {
            warn!(ha_id = %self.ha_id, key = %key, code = %e.code, "Set option failed");
            e
        })
    }

    /// Apply a setting on the device
    pub async fn apply_setting(&self, key: &str, value: Value) -> HomeConnectResult<()> {
        debug!(ha_id = %self.ha_id, key = %key, value = %value, "Applying setting");
        self.api.apply_setting(&self.ha_id, key, value).await.map_err(|e| {
            warn!(ha_id = %self.ha_id, key = %key, code = %e.code, "Apply setting failed");
            e
        })
    }

    // ---------------------------------------------------------------------
    // Update listeners
    // ---------------------------------------------------------------------

    /// Register a listener for updates of one key
    pub fn register_update_listener(
        &self,
        key: impl Into<String>,
        handler: UpdateHandler,
    ) -> ListenerId {
        let id = ListenerId(self.next_listener_id.fetch_add(1, Ordering::SeqCst));
        let key = key.into();
        trace!(ha_id = %self.ha_id, key = %key, "Registering update listener");
        self.listeners.insert(id, UpdateListener { key, handler });
        id
    }

    /// Remove a previously registered listener
    pub fn remove_update_listener(&self, id: ListenerId) -> bool {
        self.listeners.remove(&id).is_some()
    }

    /// Number of registered update listeners
    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    fn notify(&self, key: &str, value: &Value) {
        // Collect first so handlers may (un)register listeners without deadlocking
        let handlers: Vec<UpdateHandler> = self
            .listeners
            .iter()
            .filter(|l| l.key == key)
            .map(|l| l.handler.clone())
            .collect();

        trace!(ha_id = %self.ha_id, key = %key, listeners = handlers.len(), "Notifying update");
        for handler in handlers {
            handler(self, key, value);
        }
    }

    fn notify_all(&self, value: &Value) {
        let listeners: Vec<(String, UpdateHandler)> = self
            .listeners
            .iter()
            .map(|l| (l.key.clone(), l.handler.clone()))
            .collect();

        for (key, handler) in listeners {
            handler(self, &key, value);
        }
    }

    // ---------------------------------------------------------------------
    // Mutations driven by the client's event stream
    // ---------------------------------------------------------------------

    /// Record a new setting value
    ///
    /// Unknown keys are added as untyped settings.
    pub fn update_setting(&self, key: &str, value: Value) {
        self.mutate(|d| match d.settings.get_mut(key) {
            Some(setting) => setting.value = Some(value.clone()),
            None => {
                d.settings
                    .insert(key.to_string(), Parameter::new(key, value.clone()));
            }
        });
        self.notify(key, &value);
    }

    /// Record a new status value
    pub fn update_status(&self, key: &str, value: Value) {
        self.mutate(|d| match d.status.get_mut(key) {
            Some(status) => status.value = Some(value.clone()),
            None => {
                d.status
                    .insert(key.to_string(), Parameter::new(key, value.clone()));
            }
        });
        self.notify(key, &value);
    }

    /// Record a new value for an option of the selected program
    ///
    /// Returns false when no program is selected or it has no such option.
    pub fn update_option(&self, key: &str, value: Value) -> bool {
        let updated = self.mutate(|d| {
            match d
                .selected_program
                .as_mut()
                .and_then(|p| p.options.get_mut(key))
            {
                Some(option) => {
                    option.value = Some(value.clone());
                    true
                }
                None => false,
            }
        });
        if updated {
            self.notify(key, &value);
        }
        updated
    }

    /// Select one of the available programs
    ///
    /// Returns false when the program is not available on this appliance.
    pub fn select_program(&self, program_key: &str) -> bool {
        let selected = self.mutate(|d| {
            let program = d
                .available_programs
                .as_ref()
                .and_then(|programs| programs.get(program_key))
                .cloned();
            match program {
                Some(program) => {
                    d.selected_program = Some(program);
                    true
                }
                None => false,
            }
        });
        if selected {
            self.notify(SELECTED_PROGRAM, &Value::String(program_key.to_string()));
        }
        selected
    }

    /// Clear the selected program
    pub fn clear_selected_program(&self) {
        self.mutate(|d| d.selected_program = None);
        self.notify(SELECTED_PROGRAM, &Value::Null);
    }

    /// Record a connection change
    ///
    /// Connectivity affects every entity of the appliance, so all listeners
    /// are notified, each with its own key.
    pub fn set_connected(&self, connected: bool) {
        let changed = self.mutate(|d| std::mem::replace(&mut d.connected, connected) != connected);
        if changed {
            debug!(ha_id = %self.ha_id, connected, "Appliance connection changed");
            self.notify_all(&Value::Bool(connected));
        }
    }
}

impl std::fmt::Debug for Appliance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Appliance")
            .field("ha_id", &self.ha_id)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}
