//! Event bus (C10): fans orchestrator lifecycle notifications out to
//! registered callbacks without blocking the caller on slow subscribers
//! (§5). Guarded by an `RwLock` so registration is rare relative to
//! dispatch.

use std::sync::{Arc, RwLock};

/// A lifecycle notification emitted by the coordinator as a session
/// progresses.
#[derive(Debug, Clone)]
pub enum Event {
    PhaseChanged { session_id: String, phase: String },
    Progress { session_id: String, message: String },
    Complete { session_id: String },
    Stuck { session_id: String, role: String },
    /// Adversarial: a round's review approved (post score-enforcement, §4.10).
    Approved { session_id: String, round: u32, summary: String },
    /// Adversarial: a round's review rejected, whether by the reviewer or
    /// by score enforcement flipping an `approved: true` to false.
    Rejected { session_id: String, round: u32, summary: String },
}

pub type Callback = Arc<dyn Fn(&Event) + Send + Sync>;

/// Registry of subscribers. Dispatch never blocks on a subscriber beyond
/// the cost of the callback itself running synchronously; callers that
/// need async work should hand off to a channel inside their callback
/// rather than await directly.
#[derive(Default)]
pub struct EventBus {
    callbacks: RwLock<Vec<Callback>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, callback: Callback) {
        self.callbacks
            .write()
            .expect("event bus write lock poisoned")
            .push(callback);
    }

    /// Dispatches to a snapshot of subscribers taken under a brief read
    /// lock, so a callback that subscribes again during dispatch cannot
    /// deadlock against this call.
    pub fn emit(&self, event: Event) {
        let callbacks: Vec<Callback> = self
            .callbacks
            .read()
            .expect("event bus read lock poisoned")
            .clone();
        for callback in callbacks {
            callback(&event);
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.callbacks.read().expect("event bus read lock poisoned").len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_emit_calls_all_subscribers() {
        let bus = EventBus::new();
        let count = Arc::new(AtomicUsize::new(0));
        let c1 = count.clone();
        bus.subscribe(Arc::new(move |_| {
            c1.fetch_add(1, Ordering::SeqCst);
        }));
        let c2 = count.clone();
        bus.subscribe(Arc::new(move |_| {
            c2.fetch_add(1, Ordering::SeqCst);
        }));

        bus.emit(Event::Complete { session_id: "s1".into() });
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_subscriber_count() {
        let bus = EventBus::new();
        assert_eq!(bus.subscriber_count(), 0);
        bus.subscribe(Arc::new(|_| {}));
        assert_eq!(bus.subscriber_count(), 1);
    }

    #[test]
    fn test_resubscribe_during_emit_does_not_deadlock() {
        let bus = EventBus::new();
        bus.subscribe(Arc::new(|_event| {}));
        bus.emit(Event::Progress {
            session_id: "s1".into(),
            message: "hello".into(),
        });
        bus.subscribe(Arc::new(|_event| {}));
        assert_eq!(bus.subscriber_count(), 2);
    }
}
