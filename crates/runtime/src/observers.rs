use std::sync::Arc;

use bays::{BayCollection, BayRecord};
use foundation::math::GeoPoint;
use layers::RadarRing;

/// What the renderer needs after the visible set or the reference location
/// changed.
#[derive(Debug, Clone)]
pub struct ViewChange {
    /// Increases by one per notification.
    pub revision: u64,
    pub reference_location: GeoPoint,
    pub radar: &'static [RadarRing],
    bays: Arc<BayCollection>,
    visible: Arc<[usize]>,
}

impl ViewChange {
    pub(crate) fn new(
        revision: u64,
        reference_location: GeoPoint,
        radar: &'static [RadarRing],
        bays: Arc<BayCollection>,
        visible: Arc<[usize]>,
    ) -> Self {
        Self {
            revision,
            reference_location,
            radar,
            bays,
            visible,
        }
    }

    pub fn visible_count(&self) -> usize {
        self.visible.len()
    }

    pub fn visible_bays(&self) -> impl Iterator<Item = &BayRecord> + '_ {
        self.visible.iter().filter_map(|&i| self.bays.get_index(i))
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

type Listener = Box<dyn FnMut(&ViewChange) + Send>;

/// Change listeners, called in subscription order.
#[derive(Default)]
pub struct Observers {
    next_id: u64,
    listeners: Vec<(SubscriptionId, Listener)>,
}

impl Observers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(
        &mut self,
        listener: impl FnMut(&ViewChange) + Send + 'static,
    ) -> SubscriptionId {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.listeners.push((id, Box::new(listener)));
        id
    }

    /// Returns `false` if `id` was not subscribed.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(sid, _)| *sid != id);
        self.listeners.len() != before
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    pub fn notify(&mut self, change: &ViewChange) {
        for (_, listener) in &mut self.listeners {
            listener(change);
        }
    }
}

impl std::fmt::Debug for Observers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Observers")
            .field("next_id", &self.next_id)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::{Observers, ViewChange};
    use bays::{BayCollection, BayRecord};
    use foundation::math::GeoPoint;
    use std::sync::{Arc, Mutex};

    fn change(revision: u64) -> ViewChange {
        let bays = Arc::new(BayCollection::from_records(vec![
            BayRecord::new("a", GeoPoint::new(-37.81, 144.96)),
            BayRecord::new("b", GeoPoint::new(-37.82, 144.97)),
        ]));
        ViewChange::new(
            revision,
            GeoPoint::new(-37.81, 144.96),
            &[],
            bays,
            Arc::from(vec![1usize]),
        )
    }

    #[test]
    fn notifies_in_subscription_order() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut observers = Observers::new();
        for tag in ["first", "second"] {
            let seen = Arc::clone(&seen);
            observers.subscribe(move |c: &ViewChange| {
                seen.lock().expect("lock").push((tag, c.revision));
            });
        }
        observers.notify(&change(3));
        assert_eq!(
            *seen.lock().expect("lock"),
            vec![("first", 3), ("second", 3)]
        );
    }

    #[test]
    fn unsubscribe_stops_delivery() {
        let count = Arc::new(Mutex::new(0));
        let mut observers = Observers::new();
        let id = {
            let count = Arc::clone(&count);
            observers.subscribe(move |_: &ViewChange| *count.lock().expect("lock") += 1)
        };
        observers.notify(&change(1));
        assert!(observers.unsubscribe(id));
        assert!(!observers.unsubscribe(id));
        observers.notify(&change(2));
        assert_eq!(*count.lock().expect("lock"), 1);
        assert!(observers.is_empty());
    }

    #[test]
    fn change_resolves_visible_bays() {
        let c = change(1);
        let ids: Vec<&str> = c.visible_bays().map(|b| b.bay_id.as_str()).collect();
        assert_eq!(ids, vec!["b"]);
        assert_eq!(c.visible_count(), 1);
    }
}
