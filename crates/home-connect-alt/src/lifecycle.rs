//! Per-appliance lifecycle driven by the client's events

use dashmap::DashMap;
use home_connect_api::{Appliance, Events};
use tracing::debug;

/// Where an appliance is in its lifecycle
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum LifecycleState {
    #[default]
    Unpaired,
    PairedNoProgram,
    /// Paired with the given program selected
    ProgramSelected(String),
}

impl LifecycleState {
    pub fn is_paired(&self) -> bool {
        !matches!(self, LifecycleState::Unpaired)
    }
}

/// A state change caused by one event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub event: Events,
    pub from: LifecycleState,
    pub to: LifecycleState,
}

impl Transition {
    /// The entity set of the appliance must be recomputed
    ///
    /// Every `Paired` rescans, since the appliance object may have been
    /// replaced. Re-selecting the program that is already selected does not:
    /// the entity set only depends on the available programs, and the
    /// option entities re-publish through their selected-program listener.
    pub fn requires_rescan(&self) -> bool {
        match self.event {
            Events::Paired => self.to.is_paired(),
            _ => self.to.is_paired() && self.from != self.to,
        }
    }

    /// The appliance went away, so its entities must be removed
    pub fn requires_removal(&self) -> bool {
        !self.to.is_paired()
    }
}

/// Lifecycle state of every appliance one platform has seen
#[derive(Debug, Default)]
pub struct ApplianceLifecycle {
    states: DashMap<String, LifecycleState>,
}

impl ApplianceLifecycle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current state of an appliance
    pub fn state(&self, ha_id: &str) -> LifecycleState {
        self.states
            .get(ha_id)
            .map(|s| s.value().clone())
            .unwrap_or_default()
    }

    /// Apply an event
    ///
    /// `Paired` and `ProgramSelected` read the selected program from the
    /// appliance, so a program selected before pairing is picked up.
    pub fn on_event(&self, event: Events, appliance: &Appliance) -> Transition {
        let ha_id = appliance.ha_id();
        let to = match event {
            Events::Depaired => LifecycleState::Unpaired,
            Events::Paired | Events::ProgramSelected => match appliance.selected_program() {
                Some(program) => LifecycleState::ProgramSelected(program.key),
                None => LifecycleState::PairedNoProgram,
            },
        };

        let from = match &to {
            LifecycleState::Unpaired => self.states.remove(ha_id).map(|(_, s)| s),
            state => self.states.insert(ha_id.to_string(), state.clone()),
        }
        .unwrap_or_default();

        debug!(ha_id = %ha_id, %event, ?from, ?to, "Lifecycle transition");
        Transition { event, from, to }
    }
}
