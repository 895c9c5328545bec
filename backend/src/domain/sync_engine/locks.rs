//! Keyed async mutex serialising syncs of one shipment.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, Weak};

use tokio::sync::OwnedMutexGuard;
use uuid::Uuid;

#[derive(Debug, Default)]
pub(super) struct ShipmentLocks {
    slots: Mutex<HashMap<Uuid, Weak<tokio::sync::Mutex<()>>>>,
}

impl ShipmentLocks {
    /// Wait for exclusive access to `shipment_id`.
    ///
    /// Slots are dropped once no guard or waiter holds them.
    pub(super) async fn lock(&self, shipment_id: Uuid) -> OwnedMutexGuard<()> {
        let slot = {
            let mut slots = self
                .slots
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            slots.retain(|_, slot| slot.strong_count() > 0);
            match slots.get(&shipment_id).and_then(Weak::upgrade) {
                Some(slot) => slot,
                None => {
                    let slot = Arc::new(tokio::sync::Mutex::new(()));
                    slots.insert(shipment_id, Arc::downgrade(&slot));
                    slot
                }
            }
        };
        slot.lock_owned().await
    }

    #[cfg(test)]
    fn tracked(&self) -> usize {
        self.slots
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .values()
            .filter(|slot| slot.strong_count() > 0)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn same_shipment_waits_for_the_holder() {
        let locks = ShipmentLocks::default();
        let id = Uuid::new_v4();
        let guard = locks.lock(id).await;

        let blocked = tokio::time::timeout(Duration::from_millis(50), locks.lock(id)).await;
        assert!(blocked.is_err(), "second lock should wait");

        drop(guard);
        let acquired = tokio::time::timeout(Duration::from_millis(50), locks.lock(id)).await;
        assert!(acquired.is_ok(), "lock should be free after release");
    }

    #[tokio::test]
    async fn different_shipments_do_not_contend() {
        let locks = ShipmentLocks::default();
        let _first = locks.lock(Uuid::new_v4()).await;
        let second = tokio::time::timeout(Duration::from_millis(50), locks.lock(Uuid::new_v4())).await;
        assert!(second.is_ok());
    }

    #[tokio::test]
    async fn released_slots_are_forgotten() {
        let locks = ShipmentLocks::default();
        drop(locks.lock(Uuid::new_v4()).await);
        drop(locks.lock(Uuid::new_v4()).await);
        assert_eq!(locks.tracked(), 0);
    }
}
