//! Typed publish/subscribe hub with deduplication, ordered single-threaded
//! dispatch, and reset (§4.1).

use std::collections::{HashMap, HashSet};
use std::panic::{catch_unwind, AssertUnwindSafe};

use admf_types::event::{Event, EventType};
use admf_types::errors::GbResult;

/// A registered handler returns any new events it wants published as a
/// result of the one it just processed. The bus dispatches those
/// depth-first, before moving on to the next handler in the outer list —
/// this is how nested `publish` is realized without a handler needing a
/// back-reference to the bus itself (§4.1 "ordering guarantee").
pub type HandlerFn = Box<dyn FnMut(&mut Event) -> GbResult<Vec<Event>>>;

/// Opaque handle returned by `subscribe`, used to `unsubscribe` later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

struct Subscription {
    id: SubscriptionId,
    priority: i32,
    seq: u64,
    handler: HandlerFn,
}

/// Dispatch + dedup counters surfaced through `EventBus::stats` for the
/// Coordinator's run summary (§7).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BusStats {
    pub events_dispatched: u64,
    pub duplicates_dropped: u64,
    pub handler_errors: u64,
}

pub struct EventBus {
    subscribers: HashMap<EventType, Vec<Subscription>>,
    dedup_set: HashSet<String>,
    trace: Vec<uuid::Uuid>,
    next_id: u64,
    next_seq: u64,
    stats: BusStats,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            subscribers: HashMap::new(),
            dedup_set: HashSet::new(),
            trace: Vec::new(),
            next_id: 0,
            next_seq: 0,
            stats: BusStats::default(),
        }
    }

    /// Register a handler for `event_type`. Handlers for the same type are
    /// dispatched in ascending priority, then registration order.
    /// Subscribing during a dispatch takes effect starting with the next
    /// top-level `publish` call, since the handler list for a type is
    /// re-sorted only here, not mid-dispatch.
    pub fn subscribe(
        &mut self,
        event_type: EventType,
        priority: i32,
        handler: HandlerFn,
    ) -> SubscriptionId {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        let seq = self.next_seq;
        self.next_seq += 1;

        let subs = self.subscribers.entry(event_type).or_default();
        subs.push(Subscription {
            id,
            priority,
            seq,
            handler,
        });
        subs.sort_by_key(|s| (s.priority, s.seq));
        id
    }

    pub fn unsubscribe(&mut self, event_type: EventType, id: SubscriptionId) {
        if let Some(subs) = self.subscribers.get_mut(&event_type) {
            subs.retain(|s| s.id != id);
        }
    }

    /// Synchronously invoke every registered handler for `event`'s type, in
    /// order, applying the dedup barrier first. Returns the number of
    /// handlers actually invoked for this event (nested events dispatched
    /// as a result are not counted in the return value, but do count
    /// toward `stats`).
    pub fn publish(&mut self, mut event: Event) -> usize {
        self.dispatch(&mut event)
    }

    fn dispatch(&mut self, event: &mut Event) -> usize {
        if let Some(key) = event.dedup_key() {
            if !self.dedup_set.insert(key) {
                self.stats.duplicates_dropped += 1;
                return 0;
            }
        }

        let event_type = event.event_type();
        let handler_count = self.subscribers.get(&event_type).map_or(0, Vec::len);
        let mut invoked = 0usize;

        for idx in 0..handler_count {
            if event.consumed {
                break;
            }
            let Some(subs) = self.subscribers.get_mut(&event_type) else {
                break;
            };
            if idx >= subs.len() {
                // A handler unsubscribed a later one mid-dispatch; stop
                // rather than risk invoking a now-different handler at this
                // index.
                break;
            }
            let outcome = catch_unwind(AssertUnwindSafe(|| (subs[idx].handler)(event)));
            invoked += 1;
            self.stats.events_dispatched += 1;

            let nested = match outcome {
                Ok(Ok(nested)) => nested,
                Ok(Err(err)) => {
                    tracing::error!(event_id = %event.id, error = %err, "handler returned error");
                    self.stats.handler_errors += 1;
                    continue;
                }
                Err(_panic) => {
                    tracing::error!(event_id = %event.id, "handler panicked");
                    self.stats.handler_errors += 1;
                    continue;
                }
            };

            for mut nested_event in nested {
                self.dispatch(&mut nested_event);
            }
        }

        self.trace.push(event.id);
        invoked
    }

    /// Clears the dedup set and trace buffer. Subscriptions are **not**
    /// cleared — mandatory before every run (§4.7).
    pub fn reset(&mut self) {
        self.dedup_set.clear();
        self.trace.clear();
        self.stats = BusStats::default();
    }

    pub fn stats(&self) -> BusStats {
        self.stats
    }

    pub fn trace_len(&self) -> usize {
        self.trace.len()
    }
}
