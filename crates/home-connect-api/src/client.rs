//! The appliance collection and its lifecycle events

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use dashmap::DashMap;
use tracing::{debug, info, trace};

use crate::appliance::Appliance;

/// Lifecycle events emitted by [`HomeConnect`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Events {
    /// An appliance became known (or was re-paired)
    Paired,
    /// An appliance was removed from the account
    Depaired,
    /// An appliance's selected program changed
    ProgramSelected,
}

impl fmt::Display for Events {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self {
            Events::Paired => "PAIRED",
            Events::Depaired => "DEPAIRED",
            Events::ProgramSelected => "PROGRAM_SELECTED",
        };
        f.write_str(tag)
    }
}

/// A unique identifier for a lifecycle callback
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CallbackId(u64);

/// Lifecycle callback, invoked with the appliance the event is about
pub type EventHandler = Arc<dyn Fn(&Arc<Appliance>) + Send + Sync>;

struct RegisteredCallback {
    id: CallbackId,
    events: Vec<Events>,
    handler: EventHandler,
}

/// All appliances known to the client, plus lifecycle callbacks
pub struct HomeConnect {
    appliances: DashMap<String, Arc<Appliance>>,
    callbacks: RwLock<Vec<RegisteredCallback>>,
    next_callback_id: AtomicU64,
}

impl HomeConnect {
    /// Create an empty collection
    pub fn new() -> Self {
        Self {
            appliances: DashMap::new(),
            callbacks: RwLock::new(Vec::new()),
            next_callback_id: AtomicU64::new(1),
        }
    }

    /// Snapshot of all known appliances
    pub fn appliances(&self) -> Vec<Arc<Appliance>> {
        self.appliances.iter().map(|a| a.value().clone()).collect()
    }

    /// Get an appliance by its Home Connect id
    pub fn appliance(&self, ha_id: &str) -> Option<Arc<Appliance>> {
        self.appliances.get(ha_id).map(|a| a.value().clone())
    }

    /// Register a handler for one or more events
    pub fn register_callback(
        &self,
        events: impl IntoIterator<Item = Events>,
        handler: EventHandler,
    ) -> CallbackId {
        let id = CallbackId(self.next_callback_id.fetch_add(1, Ordering::SeqCst));
        let events: Vec<Events> = events.into_iter().collect();
        trace!(?events, "Registering lifecycle callback");

        self.callbacks
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(RegisteredCallback {
                id,
                events,
                handler,
            });
        id
    }

    /// Remove a lifecycle handler
    pub fn unregister_callback(&self, id: CallbackId) -> bool {
        let mut callbacks = self
            .callbacks
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let before = callbacks.len();
        callbacks.retain(|c| c.id != id);
        callbacks.len() != before
    }

    fn emit(&self, event: Events, appliance: &Arc<Appliance>) {
        // Handlers run without the callback lock held
        let handlers: Vec<EventHandler> = self
            .callbacks
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|c| c.events.contains(&event))
            .map(|c| c.handler.clone())
            .collect();

        debug!(%event, ha_id = %appliance.ha_id(), handlers = handlers.len(), "Emitting event");
        for handler in handlers {
            handler(appliance);
        }
    }

    /// Add (or replace) an appliance and emit [`Events::Paired`]
    pub fn pair(&self, appliance: Arc<Appliance>) {
        info!(ha_id = %appliance.ha_id(), name = %appliance.name(), "Appliance paired");
        self.appliances
            .insert(appliance.ha_id().to_string(), appliance.clone());
        self.emit(Events::Paired, &appliance);
    }

    /// Remove an appliance and emit [`Events::Depaired`]
    pub fn depair(&self, ha_id: &str) -> Option<Arc<Appliance>> {
        let (_, appliance) = self.appliances.remove(ha_id)?;
        info!(ha_id = %ha_id, "Appliance depaired");
        self.emit(Events::Depaired, &appliance);
        Some(appliance)
    }

    /// Select a program on an appliance and emit [`Events::ProgramSelected`]
    ///
    /// Returns false when the appliance or program is unknown.
    pub fn select_program(&self, ha_id: &str, program_key: &str) -> bool {
        let Some(appliance) = self.appliance(ha_id) else {
            return false;
        };
        if !appliance.select_program(program_key) {
            return false;
        }
        self.emit(Events::ProgramSelected, &appliance);
        true
    }
}

impl Default for HomeConnect {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::RecordingApi;
    use crate::model::{ApplianceData, Parameter, Program};
    use serde_json::json;
    use std::sync::Mutex;

    fn oven() -> Arc<Appliance> {
        let data = ApplianceData::new("BOSCH-HBG634BS1", "Oven").with_program(Program::new(
            "Cooking.Oven.Program.HeatingMode.HotAir",
            [Parameter::new("Cooking.Oven.Option.SetpointTemperature", json!(180))],
        ));
        Arc::new(Appliance::new(data, Arc::new(RecordingApi::new())))
    }

    fn recorder(hc: &HomeConnect, events: Vec<Events>) -> Arc<Mutex<Vec<String>>> {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        hc.register_callback(
            events,
            Arc::new(move |appliance: &Arc<Appliance>| {
                sink.lock().unwrap().push(appliance.ha_id().to_string())
            }),
        );
        seen
    }

    #[test]
    fn test_pair_emits_to_matching_callbacks() {
        let hc = HomeConnect::new();
        let paired = recorder(&hc, vec![Events::Paired, Events::ProgramSelected]);
        let depaired = recorder(&hc, vec![Events::Depaired]);

        hc.pair(oven());

        assert_eq!(*paired.lock().unwrap(), vec!["BOSCH-HBG634BS1"]);
        assert!(depaired.lock().unwrap().is_empty());
        assert_eq!(hc.appliances().len(), 1);
    }

    #[test]
    fn test_depair_removes_and_emits() {
        let hc = HomeConnect::new();
        let depaired = recorder(&hc, vec![Events::Depaired]);
        hc.pair(oven());

        assert!(hc.depair("BOSCH-HBG634BS1").is_some());
        assert!(hc.depair("BOSCH-HBG634BS1").is_none());
        assert_eq!(*depaired.lock().unwrap(), vec!["BOSCH-HBG634BS1"]);
        assert!(hc.appliance("BOSCH-HBG634BS1").is_none());
    }

    #[test]
    fn test_select_program_emits_only_on_success() {
        let hc = HomeConnect::new();
        let selected = recorder(&hc, vec![Events::ProgramSelected]);
        hc.pair(oven());

        assert!(!hc.select_program("BOSCH-HBG634BS1", "Cooking.Oven.Program.Unknown"));
        assert!(!hc.select_program("UNKNOWN", "Cooking.Oven.Program.HeatingMode.HotAir"));
        assert!(selected.lock().unwrap().is_empty());

        assert!(hc.select_program("BOSCH-HBG634BS1", "Cooking.Oven.Program.HeatingMode.HotAir"));
        assert_eq!(selected.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_unregister_callback() {
        let hc = HomeConnect::new();
        let seen = Arc::new(Mutex::new(0));
        let counter = seen.clone();
        let id = hc.register_callback(
            [Events::Paired],
            Arc::new(move |_: &Arc<Appliance>| *counter.lock().unwrap() += 1),
        );

        assert!(hc.unregister_callback(id));
        hc.pair(oven());
        assert_eq!(*seen.lock().unwrap(), 0);
    }

    #[test]
    fn test_event_display() {
        assert_eq!(Events::ProgramSelected.to_string(), "PROGRAM_SELECTED");
    }
}
