//! Broadcast event bus
//!
//! Carries host events such as `state_changed`. Entity platforms publish
//! through the state store; anything that follows entity state (the server's
//! log loop, tests) subscribes here.

use std::marker::PhantomData;

use dashmap::DashMap;
use ha_core::{Context, Event, EventData, EventType};
use tokio::sync::broadcast;
use tracing::{debug, trace, warn};

const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

type Sender = broadcast::Sender<Event<serde_json::Value>>;

/// One broadcast channel per event type, created on first subscription
pub struct EventBus {
    channels: DashMap<EventType, Sender>,
    capacity: usize,
}

impl EventBus {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    /// A bus whose channels buffer `capacity` events per slow receiver
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            channels: DashMap::new(),
            capacity,
        }
    }

    /// Receive every event of one type
    pub fn subscribe(
        &self,
        event_type: impl Into<EventType>,
    ) -> broadcast::Receiver<Event<serde_json::Value>> {
        let event_type = event_type.into();
        trace!(event_type = %event_type, "Subscribing");

        self.channels
            .entry(event_type)
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .subscribe()
    }

    /// Receive events of `T`'s type with their data decoded
    pub fn subscribe_typed<T: EventData + serde::de::DeserializeOwned>(
        &self,
    ) -> TypedEventReceiver<T> {
        TypedEventReceiver {
            rx: self.subscribe(T::event_type()),
            _data: PhantomData,
        }
    }

    /// Deliver an event to the current subscribers of its type
    pub fn fire(&self, event: Event<serde_json::Value>) {
        debug!(event_type = %event.event_type, "Firing event");

        if let Some(sender) = self.channels.get(&event.event_type) {
            // No receivers left is not an error
            let _ = sender.send(event);
        }
    }

    /// Encode `data` and fire it under its own event type
    pub fn fire_typed<T: EventData + serde::Serialize>(&self, data: T, context: Context) {
        match serde_json::to_value(&data) {
            Ok(json) => self.fire(Event::new(T::event_type(), json, context)),
            Err(err) => warn!(event_type = T::event_type(), error = %err, "Dropping event"),
        }
    }

    /// Number of event types with a channel
    pub fn listener_count(&self) -> usize {
        self.channels.len()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Receiver that decodes event data into `T`
pub struct TypedEventReceiver<T> {
    rx: broadcast::Receiver<Event<serde_json::Value>>,
    _data: PhantomData<T>,
}

impl<T: EventData + serde::de::DeserializeOwned> TypedEventReceiver<T> {
    /// Next event whose data decodes into `T`; others are skipped
    pub async fn recv(&mut self) -> Result<Event<T>, broadcast::error::RecvError> {
        loop {
            let event = self.rx.recv().await?;
            match serde_json::from_value::<T>(event.data.clone()) {
                Ok(data) => return Ok(event.map(data)),
                Err(err) => trace!(error = %err, "Skipping undecodable event"),
            }
        }
    }
}
