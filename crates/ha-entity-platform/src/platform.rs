//! Per-domain container of entities

use std::sync::Arc;

use dashmap::DashMap;
use ha_core::{slugify, Context, EntityId, ServiceCall, STATE_UNAVAILABLE, STATE_UNKNOWN};
use ha_state_store::StateStore;
use serde_json::json;
use tracing::{debug, info, warn};

use crate::entity::{PlatformEntity, StateWriter};

/// Batch registration closure handed to platform setup
///
/// Returns the ids of the entities that were actually added.
pub type AddEntitiesCallback<E> = Arc<dyn Fn(Vec<Arc<E>>) -> Vec<EntityId> + Send + Sync>;

/// One domain (e.g., `number`) of one integration (e.g., `home_connect_alt`)
///
/// The platform is responsible for:
/// - Assigning entity ids from unique ids
/// - Rejecting duplicate unique ids
/// - Publishing entity state into the state store
/// - Looking entities up for service dispatch
pub struct EntityPlatform<E: ?Sized> {
    /// Integration that owns the entities
    platform_name: String,
    /// Where entity state is published
    states: Arc<StateStore>,
    /// Entities keyed by entity_id string
    entities: DashMap<String, Arc<E>>,
    /// Index: unique_id -> entity_id
    by_unique_id: DashMap<String, EntityId>,
}

impl<E> EntityPlatform<E>
where
    E: ?Sized + PlatformEntity + 'static,
{
    /// Create a platform publishing into the given state store
    pub fn new(platform_name: impl Into<String>, states: Arc<StateStore>) -> Arc<Self> {
        Arc::new(Self {
            platform_name: platform_name.into(),
            states,
            entities: DashMap::new(),
            by_unique_id: DashMap::new(),
        })
    }

    /// The integration this platform belongs to
    pub fn platform_name(&self) -> &str {
        &self.platform_name
    }

    /// The entity domain
    pub fn domain(&self) -> &'static str {
        E::DOMAIN
    }

    /// Add a batch of entities
    ///
    /// Each entity gets an entity id, its first state is written and it is
    /// handed a [`StateWriter`]. Entities whose unique id is already taken
    /// are skipped. Returns the ids of the entities that were added.
    pub fn add_entities(self: &Arc<Self>, entities: Vec<Arc<E>>) -> Vec<EntityId> {
        let mut added = Vec::with_capacity(entities.len());

        for entity in entities {
            let unique_id = entity.unique_id();
            if self.by_unique_id.contains_key(&unique_id) {
                warn!(
                    platform = %self.platform_name,
                    domain = E::DOMAIN,
                    unique_id = %unique_id,
                    "Unique id already exists, ignoring entity"
                );
                continue;
            }

            let entity_id = match self.generate_entity_id(&unique_id) {
                Ok(id) => id,
                Err(e) => {
                    warn!(unique_id = %unique_id, "Cannot derive entity id: {}", e);
                    continue;
                }
            };

            self.entities.insert(entity_id.to_string(), entity.clone());
            self.by_unique_id.insert(unique_id.clone(), entity_id.clone());

            entity.added_to_platform(self.state_writer(&entity_id, &entity));
            self.write_state(&entity_id, entity.as_ref());

            debug!(entity_id = %entity_id, unique_id = %unique_id, "Added entity");
            added.push(entity_id);
        }

        if !added.is_empty() {
            info!(
                platform = %self.platform_name,
                domain = E::DOMAIN,
                count = added.len(),
                "Added entities"
            );
        }
        added
    }

    /// A callback adding entities to this platform
    pub fn add_entities_callback(self: &Arc<Self>) -> AddEntitiesCallback<E> {
        let platform = self.clone();
        Arc::new(move |entities: Vec<Arc<E>>| platform.add_entities(entities))
    }

    /// Remove an entity by unique id
    ///
    /// The entity is told first, then its state is removed from the store.
    pub fn remove_entity(&self, unique_id: &str) -> bool {
        let Some((_, entity_id)) = self.by_unique_id.remove(unique_id) else {
            return false;
        };

        if let Some((_, entity)) = self.entities.remove(&entity_id.to_string()) {
            entity.will_remove_from_platform();
        }
        self.states.remove(&entity_id, Context::new());

        debug!(entity_id = %entity_id, unique_id = %unique_id, "Removed entity");
        true
    }

    /// Re-publish the state of an entity by unique id
    pub fn refresh(&self, unique_id: &str) -> bool {
        let Some(entity_id) = self.entity_id_for(unique_id) else {
            return false;
        };
        match self.get(&entity_id.to_string()) {
            Some(entity) => {
                self.write_state(&entity_id, entity.as_ref());
                true
            }
            None => false,
        }
    }

    /// Read an entity and publish its state
    pub fn write_state(&self, entity_id: &EntityId, entity: &E) {
        let mut attributes = entity.state_attributes();
        if let Some(name) = entity.name() {
            attributes.insert("friendly_name".to_string(), json!(name));
        }
        if let Some(icon) = entity.icon() {
            attributes.insert("icon".to_string(), json!(icon));
        }
        if let Some(device_class) = entity.device_class() {
            attributes.insert("device_class".to_string(), json!(device_class));
        }

        let state = if entity.available() {
            entity.state().unwrap_or_else(|| STATE_UNKNOWN.to_string())
        } else {
            STATE_UNAVAILABLE.to_string()
        };

        self.states
            .set(entity_id.clone(), state, attributes, Context::new());
    }

    /// Get an entity by entity id
    pub fn get(&self, entity_id: &str) -> Option<Arc<E>> {
        self.entities.get(entity_id).map(|e| e.value().clone())
    }

    /// Get the entity id assigned to a unique id
    pub fn entity_id_for(&self, unique_id: &str) -> Option<EntityId> {
        self.by_unique_id.get(unique_id).map(|id| id.value().clone())
    }

    /// All entity ids on this platform
    pub fn entity_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.entities.iter().map(|e| e.key().clone()).collect();
        ids.sort();
        ids
    }

    /// Resolve the entities a service call targets
    ///
    /// Unknown ids and ids of other domains are ignored. Unavailable
    /// entities are skipped with a warning.
    pub fn service_targets(&self, call: &ServiceCall) -> Vec<(String, Arc<E>)> {
        call.entity_ids()
            .into_iter()
            .filter_map(|entity_id| {
                let entity = self.get(&entity_id)?;
                if !entity.available() {
                    warn!(entity_id = %entity_id, service = %call.service_id(), "Entity is unavailable, skipping");
                    return None;
                }
                Some((entity_id, entity))
            })
            .collect()
    }

    /// Number of entities on this platform
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    fn generate_entity_id(&self, unique_id: &str) -> Result<EntityId, ha_core::EntityIdError> {
        let mut base = slugify(unique_id);
        if base.is_empty() {
            base = slugify(&self.platform_name);
        }

        let mut candidate = base.clone();
        let mut suffix = 2;
        while self
            .entities
            .contains_key(&format!("{}.{}", E::DOMAIN, candidate))
        {
            candidate = format!("{}_{}", base, suffix);
            suffix += 1;
        }
        EntityId::new(E::DOMAIN, candidate)
    }

    fn state_writer(self: &Arc<Self>, entity_id: &EntityId, entity: &Arc<E>) -> StateWriter {
        let platform = Arc::downgrade(self);
        let weak_entity = Arc::downgrade(entity);
        let id = entity_id.clone();

        StateWriter::new(
            entity_id.clone(),
            Arc::new(move || {
                let (Some(platform), Some(entity)) = (platform.upgrade(), weak_entity.upgrade())
                else {
                    return;
                };
                // Entities removed from the platform no longer publish
                if platform.entities.contains_key(&id.to_string()) {
                    platform.write_state(&id, entity.as_ref());
                }
            }),
        )
    }
}
