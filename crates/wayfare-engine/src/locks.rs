//! Per-person async locks serializing decision evaluation.

use std::{
  collections::HashMap,
  sync::{Arc, Mutex as StdMutex, PoisonError},
};

use tokio::sync::Mutex;
use uuid::Uuid;

/// Entries whose lock nobody holds get evicted once the map grows past
/// this; active locks (strong count > 1) always survive.
const EVICTION_THRESHOLD: usize = 1024;

/// Hands out one async mutex per person id. Holding it across a decision
/// makes evaluate-then-apply atomic within this process; the store's
/// stale-stage check covers everything this process can't see.
#[derive(Default)]
pub struct PersonLocks {
  inner: StdMutex<HashMap<Uuid, Arc<Mutex<()>>>>,
}

impl PersonLocks {
  pub fn new() -> Self { Self::default() }

  pub fn lock_for(&self, person_id: Uuid) -> Arc<Mutex<()>> {
    let mut map = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
    if map.len() > EVICTION_THRESHOLD {
      map.retain(|_, lock| Arc::strong_count(lock) > 1);
    }
    map.entry(person_id).or_default().clone()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn same_person_gets_the_same_lock() {
    let locks = PersonLocks::new();
    let person = Uuid::new_v4();
    let a = locks.lock_for(person);
    let b = locks.lock_for(person);
    assert!(Arc::ptr_eq(&a, &b));
  }

  #[test]
  fn idle_locks_are_evicted_held_locks_survive() {
    let locks = PersonLocks::new();
    let held_person = Uuid::new_v4();
    let held = locks.lock_for(held_person);

    for _ in 0..(EVICTION_THRESHOLD + 1) {
      drop(locks.lock_for(Uuid::new_v4()));
    }
    // Next acquisition triggers eviction of every idle entry.
    let after = locks.lock_for(held_person);
    assert!(Arc::ptr_eq(&held, &after));
    let map = locks.inner.lock().unwrap();
    assert!(map.len() < EVICTION_THRESHOLD);
  }
}
