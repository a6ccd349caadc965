//! A synchronous, many-subscriber change-event channel with token-based
//! deregistration.
//!
//! Delivery happens inline on the designated scheduling context — there is
//! no queueing or hopping to another task, matching the "didChange fires
//! synchronously after each state assignment" ordering guarantee.

use std::sync::{Arc, Mutex};

type Listener = Box<dyn Fn() + Send + Sync>;

#[derive(Default)]
struct Inner {
    next_id: u64,
    listeners: Vec<(u64, Listener)>,
}

/// Owns the set of live subscribers for one [`Client`](crate::client::Client).
#[derive(Default)]
pub struct ChangeNotifier {
    inner: Mutex<Inner>,
}

impl ChangeNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `listener`, returning a handle that unsubscribes it on drop.
    pub fn subscribe(self: &Arc<Self>, listener: impl Fn() + Send + Sync + 'static) -> Subscription {
        let mut inner = self.inner.lock().expect("notifier mutex poisoned");
        let id = inner.next_id;
        inner.next_id += 1;
        inner.listeners.push((id, Box::new(listener)));
        Subscription {
            notifier: Arc::downgrade(self),
            id,
        }
    }

    /// Invokes every live listener, in subscription order.
    pub fn notify(&self) {
        let inner = self.inner.lock().expect("notifier mutex poisoned");
        for (_, listener) in &inner.listeners {
            listener();
        }
    }

    fn unsubscribe(&self, id: u64) {
        let mut inner = self.inner.lock().expect("notifier mutex poisoned");
        inner.listeners.retain(|(listener_id, _)| *listener_id != id);
    }
}

/// A handle returned by [`ChangeNotifier::subscribe`]. Dropping it
/// unsubscribes the associated listener; it never panics if the notifier
/// has already been torn down.
pub struct Subscription {
    notifier: std::sync::Weak<ChangeNotifier>,
    id: u64,
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(notifier) = self.notifier.upgrade() {
            notifier.unsubscribe(self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn notifies_every_live_subscriber() {
        let notifier = Arc::new(ChangeNotifier::new());
        let count = Arc::new(AtomicUsize::new(0));

        let c1 = count.clone();
        let _sub1 = notifier.subscribe(move || {
            c1.fetch_add(1, Ordering::SeqCst);
        });
        let c2 = count.clone();
        let _sub2 = notifier.subscribe(move || {
            c2.fetch_add(1, Ordering::SeqCst);
        });

        notifier.notify();
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn dropping_the_subscription_stops_delivery() {
        let notifier = Arc::new(ChangeNotifier::new());
        let count = Arc::new(AtomicUsize::new(0));

        let c = count.clone();
        let sub = notifier.subscribe(move || {
            c.fetch_add(1, Ordering::SeqCst);
        });
        drop(sub);

        notifier.notify();
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }
}
