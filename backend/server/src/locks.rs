//! # Per-Menu Locks
//!
//! One exclusive-access token per menu id, never one global lock.
//!
//! - Created lazily on first use, kept for the process lifetime
//! - `tokio::sync::Mutex` queues waiters FIFO, so every waiter eventually gets in
//! - The guard owns its `Arc`, dropping it on any exit path releases the lock, including errors,
//!   panics and task aborts
use std::{sync::Arc, time::Duration};

use dashmap::DashMap;
use tokio::{
    sync::{Mutex, OwnedMutexGuard},
    time::timeout,
};
use tracing::warn;

use crate::{database::MenuId, error::StockError};

pub struct LockRegistry {
    locks: DashMap<MenuId, Arc<Mutex<()>>>,
    wait: Option<Duration>,
}

/// Exclusive access to one menu's stock until dropped.
pub struct MenuLockGuard {
    menu_id: MenuId,
    _guard: OwnedMutexGuard<()>,
}

impl MenuLockGuard {
    pub fn menu_id(&self) -> MenuId {
        self.menu_id
    }
}

impl LockRegistry {
    /// `wait` bounds how long [`acquire`](Self::acquire) may block. `None` waits forever.
    pub fn new(wait: Option<Duration>) -> Self {
        Self {
            locks: DashMap::new(),
            wait,
        }
    }

    fn lock_for(&self, menu_id: MenuId) -> Arc<Mutex<()>> {
        // the map entry is released at the end of this statement, before anyone awaits
        self.locks.entry(menu_id).or_default().value().clone()
    }

    pub async fn acquire(&self, menu_id: MenuId) -> Result<MenuLockGuard, StockError> {
        let lock = self.lock_for(menu_id);

        let guard = match self.wait {
            None => lock.lock_owned().await,
            Some(wait) => timeout(wait, lock.lock_owned()).await.map_err(|_| {
                warn!("Lock wait for menu {menu_id} exceeded {wait:?}");

                StockError::LockTimeout {
                    menu_id,
                    waited: wait,
                }
            })?,
        };

        Ok(MenuLockGuard {
            menu_id,
            _guard: guard,
        })
    }

    pub fn is_held(&self, menu_id: MenuId) -> bool {
        self.locks
            .get(&menu_id)
            .is_some_and(|lock| lock.try_lock().is_err())
    }

    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_acquire_and_release() {
        let registry = LockRegistry::new(None);

        let guard = registry.acquire(1).await.unwrap();
        assert_eq!(guard.menu_id(), 1);
        assert!(registry.is_held(1));

        drop(guard);
        assert!(!registry.is_held(1));
    }

    #[tokio::test]
    async fn test_locks_are_per_menu() {
        let registry = LockRegistry::new(Some(Duration::from_millis(50)));

        let _held = registry.acquire(1).await.unwrap();
        let other = registry.acquire(2).await;

        assert!(other.is_ok());
        assert_eq!(registry.len(), 2);
    }

    #[tokio::test]
    async fn test_bounded_wait_times_out() {
        let registry = LockRegistry::new(Some(Duration::from_millis(20)));

        let _held = registry.acquire(3).await.unwrap();
        let result = registry.acquire(3).await;

        assert!(matches!(
            result,
            Err(StockError::LockTimeout { menu_id: 3, .. })
        ));
    }

    #[tokio::test]
    async fn test_waiter_gets_lock_after_release() {
        let registry = Arc::new(LockRegistry::new(None));
        let held = registry.acquire(4).await.unwrap();

        let waiter = {
            let registry = registry.clone();
            tokio::spawn(async move { registry.acquire(4).await.map(|guard| guard.menu_id()) })
        };

        tokio::task::yield_now().await;
        assert!(!waiter.is_finished());

        drop(held);
        assert_eq!(waiter.await.unwrap().unwrap(), 4);
    }
}
