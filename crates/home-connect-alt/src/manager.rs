//! Per-domain registry of the entities created for each appliance

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use ha_entity_platform::{AddEntitiesCallback, EntityPlatform, PlatformEntity};
use home_connect_api::Appliance;
use indexmap::IndexMap;
use tracing::{debug, info};

use crate::config::OptionEntityPolicy;
use crate::control::ControlSource;

/// An entity tracked by the [`EntityManager`]
pub struct ManagedEntity<E: ?Sized> {
    pub entity: Arc<E>,
    pub source: ControlSource,
}

/// Outcome of one [`EntityManager::register`] flush
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RegisterSummary {
    pub added: usize,
    pub removed: usize,
    pub kept: usize,
}

type EntitySet<E> = IndexMap<String, ManagedEntity<E>>;

/// The entities one scan produced for one appliance object
///
/// Built by the scanning code on its own stack and handed to
/// [`EntityManager::register`] whole, so concurrent scans never see each
/// other's partial sets.
pub struct ScanBatch<E: ?Sized> {
    appliance: Arc<Appliance>,
    entities: EntitySet<E>,
}

impl<E: ?Sized> ScanBatch<E> {
    pub fn new(appliance: Arc<Appliance>) -> Self {
        Self {
            appliance,
            entities: IndexMap::new(),
        }
    }

    pub fn ha_id(&self) -> &str {
        self.appliance.ha_id()
    }

    /// Queue an entity; the first one queued for a unique id wins
    pub fn add(&mut self, unique_id: String, entity: ManagedEntity<E>) -> bool {
        if self.entities.contains_key(&unique_id) {
            return false;
        }
        self.entities.insert(unique_id, entity);
        true
    }

    pub fn contains(&self, unique_id: &str) -> bool {
        self.entities.contains_key(unique_id)
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

/// What is registered with the platform for one appliance id
struct Registered<E: ?Sized> {
    /// The appliance object the entities are bound to
    appliance: Arc<Appliance>,
    entities: EntitySet<E>,
}

/// Registers scan results with the platform, one batch per scan
///
/// Every batch is diffed against what is already registered for its
/// appliance: new unique ids are added, vanished ones removed, and existing
/// ones kept or replaced according to the [`OptionEntityPolicy`]. Setting
/// entities are kept unless the appliance object itself was replaced, in
/// which case every entity is rebuilt against the new object.
pub struct EntityManager<E: ?Sized> {
    platform: Arc<EntityPlatform<E>>,
    add_entities: AddEntitiesCallback<E>,
    policy: OptionEntityPolicy,
    registered: Mutex<HashMap<String, Registered<E>>>,
    /// Serializes flushes so platform calls of two batches never interleave
    flush: Mutex<()>,
}

impl<E> EntityManager<E>
where
    E: ?Sized + PlatformEntity + 'static,
{
    pub fn new(
        platform: Arc<EntityPlatform<E>>,
        add_entities: AddEntitiesCallback<E>,
        policy: OptionEntityPolicy,
    ) -> Self {
        Self {
            platform,
            add_entities,
            policy,
            registered: Mutex::new(HashMap::new()),
            flush: Mutex::new(()),
        }
    }

    pub fn platform(&self) -> &Arc<EntityPlatform<E>> {
        &self.platform
    }

    /// Register one scan result in a single platform batch
    ///
    /// An empty batch removes every entity of the appliance.
    pub fn register(&self, batch: ScanBatch<E>) -> RegisterSummary {
        let _flush = lock(&self.flush);
        let ScanBatch { appliance, entities } = batch;
        let ha_id = appliance.ha_id().to_string();

        let mut to_add: Vec<Arc<E>> = Vec::new();
        let mut to_remove: Vec<String> = Vec::new();
        let mut to_refresh: Vec<String> = Vec::new();

        {
            let mut registered = lock(&self.registered);
            let (mut previous, same_object) = match registered.remove(&ha_id) {
                Some(prev) => {
                    let same = Arc::ptr_eq(&prev.appliance, &appliance);
                    (prev.entities, same)
                }
                None => (EntitySet::<E>::new(), true),
            };
            if !same_object {
                debug!(ha_id = %ha_id, "Appliance object replaced, rebuilding its entities");
            }

            let mut next = EntitySet::<E>::new();
            for (unique_id, candidate) in entities {
                match previous.shift_remove(&unique_id) {
                    Some(existing)
                        if same_object
                            && (existing.source == ControlSource::Setting
                                || self.policy == OptionEntityPolicy::UpdateInPlace) =>
                    {
                        to_refresh.push(unique_id.clone());
                        next.insert(unique_id, existing);
                    }
                    Some(_) => {
                        to_remove.push(unique_id.clone());
                        to_add.push(candidate.entity.clone());
                        next.insert(unique_id, candidate);
                    }
                    None => {
                        to_add.push(candidate.entity.clone());
                        next.insert(unique_id, candidate);
                    }
                }
            }
            to_remove.extend(previous.into_keys());

            debug!(ha_id = %ha_id, entities = next.len(), "Appliance scanned");
            if !next.is_empty() {
                registered.insert(
                    ha_id.clone(),
                    Registered {
                        appliance,
                        entities: next,
                    },
                );
            }
        }

        // Platform calls run without the registry lock held
        for unique_id in &to_remove {
            self.platform.remove_entity(unique_id);
        }
        let added = if to_add.is_empty() {
            0
        } else {
            (self.add_entities)(to_add).len()
        };
        for unique_id in &to_refresh {
            self.platform.refresh(unique_id);
        }

        let summary = RegisterSummary {
            added,
            removed: to_remove.len(),
            kept: to_refresh.len(),
        };
        if summary.added > 0 || summary.removed > 0 {
            info!(
                domain = E::DOMAIN,
                ha_id = %ha_id,
                added = summary.added,
                removed = summary.removed,
                kept = summary.kept,
                "Entities registered"
            );
        }
        summary
    }

    /// Remove every entity registered for an appliance
    pub fn remove_appliance(&self, ha_id: &str) -> usize {
        let _flush = lock(&self.flush);
        let Some(registered) = lock(&self.registered).remove(ha_id) else {
            return 0;
        };

        let removed = registered
            .entities
            .keys()
            .filter(|unique_id| self.platform.remove_entity(unique_id))
            .count();
        info!(domain = E::DOMAIN, ha_id = %ha_id, removed, "Appliance entities removed");
        removed
    }

    /// Unique ids registered for an appliance, in scan order
    pub fn unique_ids(&self, ha_id: &str) -> Vec<String> {
        lock(&self.registered)
            .get(ha_id)
            .map(|r| r.entities.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// The registered entity for a unique id
    pub fn entity(&self, ha_id: &str, unique_id: &str) -> Option<Arc<E>> {
        lock(&self.registered)
            .get(ha_id)
            .and_then(|r| r.entities.get(unique_id))
            .map(|managed| managed.entity.clone())
    }

    /// Ids of all appliances with registered entities
    pub fn appliance_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = lock(&self.registered).keys().cloned().collect();
        ids.sort();
        ids
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
