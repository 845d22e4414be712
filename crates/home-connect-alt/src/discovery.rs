//! Turning appliances into entities, shared by the number and switch platforms

use std::marker::PhantomData;
use std::sync::{Arc, Mutex, PoisonError, Weak};

use ha_entity_platform::{EntityPlatform, PlatformEntity};
use home_connect_api::{Appliance, CallbackId, Events, HomeConnect, Parameter};
use tracing::{debug, info};

use crate::classify::{classify, ControlKind};
use crate::config::IntegrationConfig;
use crate::control::{BoundControl, ControlConfig, ControlSource};
use crate::lifecycle::{ApplianceLifecycle, LifecycleState};
use crate::manager::{EntityManager, ManagedEntity, RegisterSummary, ScanBatch};

/// An entity domain this integration populates
pub trait ControlDomain: Send + Sync + 'static {
    /// Host entity type (e.g., `dyn NumberEntity`)
    type Entity: ?Sized + PlatformEntity + 'static;

    /// Parameters of this kind end up in this domain
    const KIND: ControlKind;

    /// Wrap a bound control into an entity of this domain
    fn build(control: BoundControl) -> Arc<Self::Entity>;
}

/// Discovery state of one domain
///
/// Created by [`setup`]; dropping it does not unregister the client
/// callbacks, call [`Discovery::unload`] for that.
pub struct Discovery<D: ControlDomain> {
    homeconnect: Arc<HomeConnect>,
    config: Arc<IntegrationConfig>,
    manager: EntityManager<D::Entity>,
    lifecycle: ApplianceLifecycle,
    callbacks: Mutex<Vec<CallbackId>>,
    _domain: PhantomData<D>,
}

/// Start discovering entities of domain `D` onto `platform`
///
/// Registers lifecycle callbacks on the client and scans every appliance it
/// already knows.
pub fn setup<D: ControlDomain>(
    homeconnect: Arc<HomeConnect>,
    config: Arc<IntegrationConfig>,
    platform: Arc<EntityPlatform<D::Entity>>,
) -> Arc<Discovery<D>> {
    let discovery = Arc::new(Discovery::<D> {
        manager: EntityManager::new(
            platform.clone(),
            platform.add_entities_callback(),
            config.option_entity_policy,
        ),
        homeconnect: homeconnect.clone(),
        config,
        lifecycle: ApplianceLifecycle::new(),
        callbacks: Mutex::new(Vec::new()),
        _domain: PhantomData,
    });

    let callbacks: Vec<CallbackId> = [Events::Paired, Events::ProgramSelected, Events::Depaired]
        .into_iter()
        .map(|event| {
            let weak: Weak<Discovery<D>> = Arc::downgrade(&discovery);
            homeconnect.register_callback(
                [event],
                Arc::new(move |appliance: &Arc<Appliance>| {
                    if let Some(discovery) = weak.upgrade() {
                        discovery.handle_event(event, appliance);
                    }
                }),
            )
        })
        .collect();
    discovery
        .callbacks
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .extend(callbacks);

    let appliances = homeconnect.appliances();
    for appliance in &appliances {
        discovery.handle_event(Events::Paired, appliance);
    }
    info!(
        domain = <D::Entity as PlatformEntity>::DOMAIN,
        appliances = appliances.len(),
        entities = discovery.manager.platform().len(),
        "Platform set up"
    );

    discovery
}

impl<D: ControlDomain> Discovery<D> {
    pub fn manager(&self) -> &EntityManager<D::Entity> {
        &self.manager
    }

    /// Lifecycle state of an appliance as seen by this domain
    pub fn lifecycle_state(&self, ha_id: &str) -> LifecycleState {
        self.lifecycle.state(ha_id)
    }

    /// React to a client event
    pub fn handle_event(&self, event: Events, appliance: &Arc<Appliance>) {
        let transition = self.lifecycle.on_event(event, appliance);
        if transition.requires_removal() {
            self.manager.remove_appliance(appliance.ha_id());
        } else if transition.requires_rescan() {
            self.scan(appliance);
        }
    }

    /// Recompute the entities of one appliance and register the difference
    pub fn scan(&self, appliance: &Arc<Appliance>) -> RegisterSummary {
        let ha_id = appliance.ha_id();
        let mut batch = ScanBatch::new(appliance.clone());

        let (options, settings) = appliance.with_data(|data| {
            let options: Vec<Parameter> = data
                .available_programs
                .iter()
                .flat_map(|programs| programs.values())
                .flat_map(|program| program.options.values().cloned())
                .collect();
            let settings: Vec<Parameter> = data.settings.values().cloned().collect();
            (options, settings)
        });

        let candidates = options
            .into_iter()
            .map(|p| (p, ControlSource::Option))
            .chain(settings.into_iter().map(|p| (p, ControlSource::Setting)));
        for (parameter, source) in candidates {
            if self.config.is_ignored(&parameter.key) || classify(&parameter) != D::KIND {
                continue;
            }

            let icon = self.config.icon_for(&parameter.key);
            let control = BoundControl::new(
                appliance.clone(),
                source,
                ControlConfig {
                    descriptor: parameter,
                    icon,
                },
            );
            let unique_id = control.unique_id();
            // Options repeat across programs; only the first one is built
            if batch.contains(&unique_id) {
                continue;
            }
            batch.add(
                unique_id,
                ManagedEntity {
                    entity: D::build(control),
                    source,
                },
            );
        }

        let summary = self.manager.register(batch);
        debug!(
            domain = <D::Entity as PlatformEntity>::DOMAIN,
            ha_id = %ha_id,
            ?summary,
            "Scan finished"
        );
        summary
    }

    /// Unregister the client callbacks and remove every entity
    pub fn unload(&self) {
        let callbacks: Vec<CallbackId> = self
            .callbacks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain(..)
            .collect();
        for id in callbacks {
            self.homeconnect.unregister_callback(id);
        }
        for ha_id in self.manager.appliance_ids() {
            self.manager.remove_appliance(&ha_id);
        }
    }
}
