//! Synchronous publish/subscribe primitive.
//!
//! Every stateful component owns one or more buses and broadcasts its change
//! events on them. The bus never owns its listeners: bindings are weak, so a
//! listener dropped by its owner silently stops receiving events.
//!
//! Delivery is synchronous and in subscription order. `publish` snapshots
//! the current bindings before iterating, so a listener may subscribe,
//! unsubscribe or publish again from inside a callback without affecting the
//! delivery already in progress.

use std::cell::{Cell, RefCell};
use std::fmt::Debug;
use std::rc::{Rc, Weak};

/// An event type that can be routed by kind.
pub trait Topic {
    type Kind: Copy + Eq + Debug;

    fn kind(&self) -> Self::Kind;
}

/// Receives events published on a bus.
pub trait Listener<E> {
    fn on_event(&self, event: &E);
}

impl<E, F> Listener<E> for F
where
    F: Fn(&E),
{
    fn on_event(&self, event: &E) {
        self(event)
    }
}

/// Handle returned by `subscribe`, used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

#[derive(Debug, Clone, Copy)]
enum Filter<K> {
    All,
    Only(K),
}

impl<K: Copy + Eq> Filter<K> {
    fn accepts(&self, kind: K) -> bool {
        match self {
            Filter::All => true,
            Filter::Only(k) => *k == kind,
        }
    }
}

struct Binding<E: Topic> {
    id: SubscriptionId,
    filter: Filter<E::Kind>,
    listener: Weak<dyn Listener<E>>,
}

pub struct NotificationBus<E: Topic> {
    bindings: RefCell<Vec<Binding<E>>>,
    next_id: Cell<u64>,
}

impl<E: Topic + 'static> NotificationBus<E> {
    pub fn new() -> Self {
        Self {
            bindings: RefCell::new(Vec::new()),
            next_id: Cell::new(1),
        }
    }

    /// Bind `listener` to every event of `kind`.
    pub fn subscribe<L>(&self, kind: E::Kind, listener: &Rc<L>) -> SubscriptionId
    where
        L: Listener<E> + 'static,
    {
        self.bind(Filter::Only(kind), listener)
    }

    /// Bind `listener` to every event regardless of kind.
    pub fn subscribe_all<L>(&self, listener: &Rc<L>) -> SubscriptionId
    where
        L: Listener<E> + 'static,
    {
        self.bind(Filter::All, listener)
    }

    /// Remove a binding. Returns false if it was already gone.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut bindings = self.bindings.borrow_mut();
        let before = bindings.len();
        bindings.retain(|b| b.id != id);
        bindings.len() != before
    }

    /// Deliver `event` to every live listener bound to its kind.
    ///
    /// Returns the number of listeners that received it.
    pub fn publish(&self, event: E) -> usize {
        let kind = event.kind();
        let targets: Vec<Weak<dyn Listener<E>>> = {
            let mut bindings = self.bindings.borrow_mut();
            bindings.retain(|b| b.listener.strong_count() > 0);
            bindings
                .iter()
                .filter(|b| b.filter.accepts(kind))
                .map(|b| b.listener.clone())
                .collect()
        };

        tracing::trace!(?kind, listeners = targets.len(), "publishing event");

        let mut delivered = 0;
        for weak in targets {
            if let Some(listener) = weak.upgrade() {
                listener.on_event(&event);
                delivered += 1;
            }
        }
        delivered
    }

    /// Number of bindings whose listener is still alive.
    pub fn listener_count(&self) -> usize {
        self.bindings
            .borrow()
            .iter()
            .filter(|b| b.listener.strong_count() > 0)
            .count()
    }

    fn bind<L>(&self, filter: Filter<E::Kind>, listener: &Rc<L>) -> SubscriptionId
    where
        L: Listener<E> + 'static,
    {
        let id = SubscriptionId(self.next_id.get());
        self.next_id.set(id.0 + 1);

        let strong: Rc<dyn Listener<E>> = listener.clone();
        let binding = Binding {
            id,
            filter,
            listener: Rc::downgrade(&strong),
        };
        self.bindings.borrow_mut().push(binding);
        id
    }
}

impl<E: Topic + 'static> Default for NotificationBus<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: Topic> Debug for NotificationBus<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationBus")
            .field("bindings", &self.bindings.borrow().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    enum Ping {
        A(u32),
        B,
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum PingKind {
        A,
        B,
    }

    impl Topic for Ping {
        type Kind = PingKind;

        fn kind(&self) -> PingKind {
            match self {
                Ping::A(_) => PingKind::A,
                Ping::B => PingKind::B,
            }
        }
    }

    fn recorder(log: &Rc<RefCell<Vec<String>>>, name: &'static str) -> Rc<impl Fn(&Ping)> {
        let log = Rc::clone(log);
        Rc::new(move |e: &Ping| log.borrow_mut().push(format!("{name}:{e:?}")))
    }

    #[test]
    fn delivers_in_subscription_order() {
        let bus: NotificationBus<Ping> = NotificationBus::new();
        let log = Rc::new(RefCell::new(Vec::new()));
        let first = recorder(&log, "first");
        let second = recorder(&log, "second");
        bus.subscribe(PingKind::A, &first);
        bus.subscribe(PingKind::A, &second);

        assert_eq!(bus.publish(Ping::A(7)), 2);
        assert_eq!(*log.borrow(), vec!["first:A(7)", "second:A(7)"]);
    }

    #[test]
    fn filters_by_kind() {
        let bus: NotificationBus<Ping> = NotificationBus::new();
        let log = Rc::new(RefCell::new(Vec::new()));
        let only_b = recorder(&log, "b");
        let all = recorder(&log, "all");
        bus.subscribe(PingKind::B, &only_b);
        bus.subscribe_all(&all);

        bus.publish(Ping::A(1));
        bus.publish(Ping::B);

        assert_eq!(*log.borrow(), vec!["all:A(1)", "b:B", "all:B"]);
    }

    #[test]
    fn dropped_listener_is_not_called() {
        let bus: NotificationBus<Ping> = NotificationBus::new();
        let log = Rc::new(RefCell::new(Vec::new()));
        let listener = recorder(&log, "gone");
        bus.subscribe_all(&listener);
        assert_eq!(bus.listener_count(), 1);

        drop(listener);
        assert_eq!(bus.publish(Ping::B), 0);
        assert!(log.borrow().is_empty());
        assert_eq!(bus.listener_count(), 0);
    }

    #[test]
    fn unsubscribe_stops_delivery() {
        let bus: NotificationBus<Ping> = NotificationBus::new();
        let log = Rc::new(RefCell::new(Vec::new()));
        let listener = recorder(&log, "x");
        let id = bus.subscribe_all(&listener);

        assert!(bus.unsubscribe(id));
        assert!(!bus.unsubscribe(id));
        bus.publish(Ping::B);
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn unsubscribe_during_delivery_uses_snapshot() {
        let bus: Rc<NotificationBus<Ping>> = Rc::new(NotificationBus::new());
        let log = Rc::new(RefCell::new(Vec::new()));
        let victim: Rc<Cell<Option<SubscriptionId>>> = Rc::new(Cell::new(None));

        let weak = Rc::downgrade(&bus);
        let target = Rc::clone(&victim);
        let log_ref = Rc::clone(&log);
        let remover = Rc::new(move |_: &Ping| {
            log_ref.borrow_mut().push("remover".to_string());
            if let (Some(bus), Some(id)) = (weak.upgrade(), target.get()) {
                bus.unsubscribe(id);
            }
        });
        let second = recorder(&log, "second");
        bus.subscribe_all(&remover);
        victim.set(Some(bus.subscribe_all(&second)));

        // `second` was in the snapshot, so it still sees this event.
        bus.publish(Ping::B);
        assert_eq!(*log.borrow(), vec!["remover", "second:B"]);

        log.borrow_mut().clear();
        bus.publish(Ping::B);
        assert_eq!(*log.borrow(), vec!["remover"]);
    }

    #[test]
    fn listener_may_publish_reentrantly() {
        let bus: Rc<NotificationBus<Ping>> = Rc::new(NotificationBus::new());
        let log = Rc::new(RefCell::new(Vec::new()));
        let weak = Rc::downgrade(&bus);
        let echo = Rc::new(move |e: &Ping| {
            if let (Ping::A(n), Some(bus)) = (e, weak.upgrade()) {
                if *n > 0 {
                    bus.publish(Ping::A(n - 1));
                }
            }
        });
        let sink = recorder(&log, "sink");
        bus.subscribe(PingKind::A, &echo);
        bus.subscribe(PingKind::A, &sink);

        bus.publish(Ping::A(2));
        assert_eq!(*log.borrow(), vec!["sink:A(0)", "sink:A(1)", "sink:A(2)"]);
    }
}
