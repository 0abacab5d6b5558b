//! Event-name to callback multi-map used by the web backend.

use hopline_model::EventEnvelope;
use parking_lot::Mutex;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use tracing::{debug, warn};

/// What a subscriber receives for each delivered event.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub payload: Value,
}

pub type EventCallback = Arc<dyn Fn(&Event) + Send + Sync>;

/// Removes exactly one registration when [`Unlisten::unlisten`] is called.
///
/// Dropping the handle without calling it leaves the subscription in place.
pub struct Unlisten {
    remove: Option<Box<dyn FnOnce() + Send>>,
}

impl Unlisten {
    pub fn new(remove: impl FnOnce() + Send + 'static) -> Self {
        Self {
            remove: Some(Box::new(remove)),
        }
    }

    pub fn unlisten(mut self) {
        if let Some(remove) = self.remove.take() {
            remove();
        }
    }
}

impl fmt::Debug for Unlisten {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Unlisten")
            .field("pending", &self.remove.is_some())
            .finish()
    }
}

#[derive(Clone, Default)]
pub struct SubscriptionRegistry {
    inner: Arc<Mutex<Channels>>,
}

#[derive(Default)]
struct Channels {
    next_id: u64,
    by_event: HashMap<String, Vec<Registration>>,
}

struct Registration {
    id: u64,
    callback: EventCallback,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, event: &str, callback: EventCallback) -> Unlisten {
        let id = {
            let mut channels = self.inner.lock();
            channels.next_id += 1;
            let id = channels.next_id;
            channels
                .by_event
                .entry(event.to_string())
                .or_default()
                .push(Registration { id, callback });
            id
        };

        let inner = Arc::downgrade(&self.inner);
        let event = event.to_string();
        Unlisten::new(move || {
            if let Some(inner) = inner.upgrade() {
                remove_registration(&inner, &event, id);
            }
        })
    }

    /// Deliver `payload` to every callback registered for `event`, in
    /// registration order. Returns the number of callbacks invoked.
    pub fn dispatch(&self, event: &str, payload: Value) -> usize {
        let callbacks: Vec<EventCallback> = {
            let channels = self.inner.lock();
            match channels.by_event.get(event) {
                Some(registrations) => registrations
                    .iter()
                    .map(|registration| registration.callback.clone())
                    .collect(),
                None => return 0,
            }
        };

        let delivered = Event { payload };
        for callback in &callbacks {
            if catch_unwind(AssertUnwindSafe(|| callback(&delivered))).is_err() {
                warn!(event, "event callback panicked");
            }
        }
        callbacks.len()
    }

    /// Parse one socket message and route it. Malformed messages are logged
    /// and dropped.
    pub fn dispatch_text(&self, text: &str) -> usize {
        let message: Value = match serde_json::from_str(text) {
            Ok(message) => message,
            Err(err) => {
                warn!(%err, "dropping unparseable event message");
                return 0;
            }
        };
        let envelope = match EventEnvelope::deserialize(&message) {
            Ok(envelope) => envelope,
            Err(err) => {
                warn!(%err, "dropping event message without an event name");
                return 0;
            }
        };

        let delivered = self.dispatch(&envelope.event, envelope.payload);
        if delivered == 0 {
            debug!(event = %envelope.event, "no listeners for event");
        }
        delivered
    }

    pub fn listener_count(&self, event: &str) -> usize {
        self.inner
            .lock()
            .by_event
            .get(event)
            .map_or(0, |registrations| registrations.len())
    }

    pub fn channel_count(&self) -> usize {
        self.inner.lock().by_event.len()
    }
}

fn remove_registration(inner: &Mutex<Channels>, event: &str, id: u64) {
    let mut channels = inner.lock();
    if let Some(registrations) = channels.by_event.get_mut(event) {
        registrations.retain(|registration| registration.id != id);
        if registrations.is_empty() {
            channels.by_event.remove(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn recorder() -> (Arc<Mutex<Vec<Value>>>, EventCallback) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let callback: EventCallback = Arc::new(move |event: &Event| sink.lock().push(event.payload.clone()));
        (seen, callback)
    }

    #[test]
    fn unsubscribing_one_callback_keeps_the_other() {
        let registry = SubscriptionRegistry::new();
        let (first_seen, first) = recorder();
        let (second_seen, second) = recorder();

        let first_handle = registry.subscribe("new_ping_data", first);
        let _second_handle = registry.subscribe("new_ping_data", second);

        assert_eq!(registry.dispatch("new_ping_data", json!(1)), 2);
        first_handle.unlisten();
        assert_eq!(registry.dispatch("new_ping_data", json!(2)), 1);

        assert_eq!(*first_seen.lock(), vec![json!(1)]);
        assert_eq!(*second_seen.lock(), vec![json!(1), json!(2)]);
    }

    #[test]
    fn same_callback_under_two_events_is_removed_independently() {
        let registry = SubscriptionRegistry::new();
        let (seen, callback) = recorder();

        let hops = registry.subscribe("hop_list_updated", callback.clone());
        let _pings = registry.subscribe("new_ping_data", callback);
        hops.unlisten();

        assert_eq!(registry.dispatch("hop_list_updated", json!("a")), 0);
        assert_eq!(registry.dispatch("new_ping_data", json!("b")), 1);
        assert_eq!(*seen.lock(), vec![json!("b")]);
    }

    #[test]
    fn callbacks_fire_in_registration_order() {
        let registry = SubscriptionRegistry::new();
        let order = Arc::new(Mutex::new(Vec::new()));
        for label in ["first", "second", "third"] {
            let order = order.clone();
            let _ = registry.subscribe("evt", Arc::new(move |_: &Event| order.lock().push(label)));
        }

        registry.dispatch("evt", Value::Null);
        assert_eq!(*order.lock(), vec!["first", "second", "third"]);
    }

    #[test]
    fn empty_channels_are_pruned() {
        let registry = SubscriptionRegistry::new();
        let (_, callback) = recorder();
        let handle = registry.subscribe("evt", callback);
        assert_eq!(registry.channel_count(), 1);

        handle.unlisten();
        assert_eq!(registry.channel_count(), 0);
        assert_eq!(registry.listener_count("evt"), 0);
    }

    #[test]
    fn dropped_handle_keeps_subscription() {
        let registry = SubscriptionRegistry::new();
        let (_, callback) = recorder();
        drop(registry.subscribe("evt", callback));
        assert_eq!(registry.listener_count("evt"), 1);
    }

    #[test]
    fn text_messages_are_demultiplexed_by_event_name() {
        let registry = SubscriptionRegistry::new();
        let (seen, callback) = recorder();
        let _handle = registry.subscribe("new_ping_data", callback);

        let delivered = registry
            .dispatch_text(r#"{"event":"new_ping_data","payload":{"ip":"10.0.0.1","latency":4}}"#);
        assert_eq!(delivered, 1);
        assert_eq!(registry.dispatch_text(r#"{"event":"other","payload":1}"#), 0);
        assert_eq!(*seen.lock(), vec![json!({ "ip": "10.0.0.1", "latency": 4 })]);
    }

    #[test]
    fn malformed_messages_are_dropped() {
        let registry = SubscriptionRegistry::new();
        let (seen, callback) = recorder();
        let _handle = registry.subscribe("evt", callback);

        assert_eq!(registry.dispatch_text("{not json"), 0);
        assert_eq!(registry.dispatch_text(r#"{"payload":1}"#), 0);
        assert_eq!(registry.dispatch_text(r#"{"event":5,"payload":1}"#), 0);
        assert_eq!(registry.dispatch_text("[1,2]"), 0);
        assert!(seen.lock().is_empty());

        assert_eq!(registry.dispatch_text(r#"{"event":"evt"}"#), 1);
        assert_eq!(*seen.lock(), vec![Value::Null]);
    }

    #[test]
    fn callback_may_unsubscribe_itself_during_delivery() {
        let registry = SubscriptionRegistry::new();
        let slot: Arc<Mutex<Option<Unlisten>>> = Arc::new(Mutex::new(None));
        let hits = Arc::new(Mutex::new(0));

        let handle = {
            let slot = slot.clone();
            let hits = hits.clone();
            registry.subscribe(
                "evt",
                Arc::new(move |_: &Event| {
                    *hits.lock() += 1;
                    if let Some(handle) = slot.lock().take() {
                        handle.unlisten();
                    }
                }),
            )
        };
        *slot.lock() = Some(handle);

        registry.dispatch("evt", Value::Null);
        registry.dispatch("evt", Value::Null);
        assert_eq!(*hits.lock(), 1);
    }

    #[test]
    fn panicking_callback_does_not_stop_delivery() {
        let registry = SubscriptionRegistry::new();
        let (seen, callback) = recorder();
        let _bad = registry.subscribe("evt", Arc::new(|_: &Event| panic!("boom")));
        let _good = registry.subscribe("evt", callback);

        assert_eq!(registry.dispatch("evt", json!(7)), 2);
        assert_eq!(*seen.lock(), vec![json!(7)]);
    }
}
