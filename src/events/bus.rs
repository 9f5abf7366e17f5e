// ABOUTME: EventBus - fan-out of lifecycle events to bounded subscriber queues.
// ABOUTME: Publishing never blocks; a full queue drops its oldest event.

use std::collections::{HashMap, VecDeque};
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use futures::Stream;
use parking_lot::{Mutex, RwLock};
use tokio::sync::Notify;
use tracing::{trace, warn};

use super::LifecycleEvent;

/// Lineage chains longer than this are treated as unrelated.
pub(crate) const MAX_LINEAGE_DEPTH: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Scope {
    All,
    Session(String),
}

struct SubscriberQueue {
    scope: Scope,
    capacity: usize,
    events: Mutex<VecDeque<LifecycleEvent>>,
    dropped: AtomicU64,
    closed: AtomicBool,
    notify: Notify,
}

impl SubscriberQueue {
    fn push(&self, event: LifecycleEvent) {
        {
            let mut events = self.events.lock();
            if events.len() >= self.capacity {
                events.pop_front();
                if self.dropped.fetch_add(1, Ordering::Relaxed) == 0 {
                    warn!(scope = ?self.scope, capacity = self.capacity, "subscriber falling behind, dropping oldest events");
                } else {
                    trace!(scope = ?self.scope, "dropped oldest event");
                }
            }
            events.push_back(event);
        }
        self.notify.notify_one();
    }

    fn close(&self) {
        self.closed.store(true, Ordering::Release);
        self.notify.notify_one();
    }
}

struct BusInner {
    capacity: usize,
    subscribers: Mutex<Vec<Weak<SubscriberQueue>>>,
    /// run id -> parent session id
    lineage: RwLock<HashMap<String, String>>,
    closed: AtomicBool,
}

/// Distributes lifecycle events to subscribers.
///
/// Every subscriber owns a bounded queue of `capacity` events. When a queue
/// is full the oldest queued event is discarded and the subscriber's
/// [`Subscription::dropped`] count goes up; the publisher never waits.
/// Clones share the same subscribers.
#[derive(Clone)]
pub struct EventBus {
    inner: Arc<BusInner>,
}

impl EventBus {
    /// Create a bus whose subscriber queues hold `capacity` events each.
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Arc::new(BusInner {
                capacity: capacity.max(1),
                subscribers: Mutex::new(Vec::new()),
                lineage: RwLock::new(HashMap::new()),
                closed: AtomicBool::new(false),
            }),
        }
    }

    /// Events for runs spawned by `session_id` or by any of its descendant runs.
    pub fn subscribe(&self, session_id: impl Into<String>) -> Subscription {
        self.add(Scope::Session(session_id.into()))
    }

    /// Every event on the bus.
    pub fn subscribe_all(&self) -> Subscription {
        self.add(Scope::All)
    }

    fn add(&self, scope: Scope) -> Subscription {
        let queue = Arc::new(SubscriberQueue {
            scope,
            capacity: self.inner.capacity,
            events: Mutex::new(VecDeque::new()),
            dropped: AtomicU64::new(0),
            closed: AtomicBool::new(self.inner.closed.load(Ordering::Acquire)),
            notify: Notify::new(),
        });
        self.inner.subscribers.lock().push(Arc::downgrade(&queue));
        Subscription { queue }
    }

    /// Record that `run_id` was spawned by `parent_session_id`.
    pub fn record_lineage(&self, run_id: impl Into<String>, parent_session_id: impl Into<String>) {
        self.inner
            .lineage
            .write()
            .insert(run_id.into(), parent_session_id.into());
    }

    /// Drop a retired run from the lineage map.
    ///
    /// Runs it spawned are re-parented onto its own parent, so they stay in
    /// scope for every ancestor session.
    pub fn forget_lineage(&self, run_id: &str) {
        let mut lineage = self.inner.lineage.write();
        let Some(parent) = lineage.remove(run_id) else {
            return;
        };
        for ancestor in lineage.values_mut().filter(|p| p.as_str() == run_id) {
            *ancestor = parent.clone();
        }
    }

    /// Deliver `event` to every subscriber whose scope covers it.
    pub fn publish(&self, event: LifecycleEvent) {
        let mut subscribers = self.inner.subscribers.lock();
        subscribers.retain(|weak| weak.strong_count() > 0);

        let targets: Vec<Arc<SubscriberQueue>> = subscribers
            .iter()
            .filter_map(Weak::upgrade)
            .filter(|queue| self.covers(&queue.scope, &event))
            .collect();
        drop(subscribers);

        trace!(
            run_id = %event.run_id,
            kind = event.kind.name(),
            subscribers = targets.len(),
            "publishing lifecycle event"
        );

        let Some((last, rest)) = targets.split_last() else {
            return;
        };
        for queue in rest {
            queue.push(event.clone());
        }
        last.push(event);
    }

    /// Close every subscription; receivers drain what is queued and then end.
    pub fn close(&self) {
        self.inner.closed.store(true, Ordering::Release);
        for queue in self.inner.subscribers.lock().iter().filter_map(Weak::upgrade) {
            queue.close();
        }
    }

    /// Number of live subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.inner
            .subscribers
            .lock()
            .iter()
            .filter(|weak| weak.strong_count() > 0)
            .count()
    }

    fn covers(&self, scope: &Scope, event: &LifecycleEvent) -> bool {
        let session = match scope {
            Scope::All => return true,
            Scope::Session(session) => session,
        };

        // Start from the run's recorded parent: it is re-pointed when an
        // intermediate run retires, while the event's own field is not.
        let lineage = self.inner.lineage.read();
        let mut current = lineage
            .get(&event.run_id)
            .map(String::as_str)
            .unwrap_or(event.parent_session_id.as_str());
        for _ in 0..MAX_LINEAGE_DEPTH {
            if current == session {
                return true;
            }
            match lineage.get(current) {
                Some(parent) => current = parent,
                None => return false,
            }
        }
        warn!(
            run_id = %event.run_id,
            session = %session,
            max_depth = MAX_LINEAGE_DEPTH,
            "lineage deeper than the limit, treating run as out of scope"
        );
        false
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(crate::config::OrchestratorConfig::default().event_queue_capacity)
    }
}

/// A subscriber's view of the bus.
///
/// Dropping the subscription unregisters it.
pub struct Subscription {
    queue: Arc<SubscriberQueue>,
}

impl Subscription {
    /// Wait for the next event. Returns `None` once the bus is closed and
    /// the queue is drained.
    pub async fn recv(&mut self) -> Option<LifecycleEvent> {
        loop {
            if let Some(event) = self.try_recv() {
                return Some(event);
            }
            if self.queue.closed.load(Ordering::Acquire) {
                return None;
            }
            self.queue.notify.notified().await;
        }
    }

    /// Take the next queued event without waiting.
    pub fn try_recv(&mut self) -> Option<LifecycleEvent> {
        self.queue.events.lock().pop_front()
    }

    /// Events discarded because this queue was full.
    pub fn dropped(&self) -> u64 {
        self.queue.dropped.load(Ordering::Relaxed)
    }

    /// Number of events waiting in the queue.
    pub fn len(&self) -> usize {
        self.queue.events.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Convert into a stream of events.
    pub fn into_stream(mut self) -> Pin<Box<dyn Stream<Item = LifecycleEvent> + Send>> {
        Box::pin(async_stream::stream! {
            while let Some(event) = self.recv().await {
                yield event;
            }
        })
    }
}
