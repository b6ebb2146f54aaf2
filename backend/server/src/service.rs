use std::{num::NonZeroU32, sync::Arc, time::Duration};

#[cfg(feature = "verbose")]
use tracing::info;

use crate::{
    database::{MenuId, Stock, StockStore},
    error::StockError,
    locks::LockRegistry,
    strategy::{Strategy, decrease_guarded, decrease_unsynchronized},
};

/// Stock right after this caller's write, as this caller saw it.
///
/// On the unsynchronized path this need not match the final stock.
pub type DecrementResult = Result<Stock, StockError>;

/// Routes each decrement to a strategy. Holds no lock of its own, so unsynchronized callers
/// overlap freely.
#[derive(Clone)]
pub struct DecrementService {
    store: Arc<dyn StockStore>,
    locks: Arc<LockRegistry>,
    race_window: Duration,
}

impl DecrementService {
    pub fn new(
        store: Arc<dyn StockStore>,
        lock_wait: Option<Duration>,
        race_window: Duration,
    ) -> Self {
        Self {
            store,
            locks: Arc::new(LockRegistry::new(lock_wait)),
            race_window,
        }
    }

    pub async fn decrement(&self, menu_id: MenuId, use_lock: bool) -> DecrementResult {
        self.decrease(menu_id, NonZeroU32::MIN, use_lock).await
    }

    pub async fn decrease(
        &self,
        menu_id: MenuId,
        quantity: NonZeroU32,
        use_lock: bool,
    ) -> DecrementResult {
        let strategy = Strategy::from_lock_flag(use_lock);

        let result = match strategy {
            Strategy::Unsynchronized => {
                decrease_unsynchronized(
                    self.store.as_ref(),
                    menu_id,
                    quantity,
                    self.race_window,
                )
                .await
            }
            Strategy::LockGuarded => {
                decrease_guarded(
                    self.store.as_ref(),
                    &self.locks,
                    menu_id,
                    quantity,
                    self.race_window,
                )
                .await
            }
        };

        #[cfg(feature = "verbose")]
        info!("Decrease menu {menu_id} by {quantity} ({strategy:?}): {result:?}");

        result
    }

    /// Plain read, no lock. Good enough for showing roughly what is left.
    pub async fn stock(&self, menu_id: MenuId) -> DecrementResult {
        self.store.get(menu_id).await
    }

    pub async fn reseed(&self, menu_id: MenuId, quantity: Stock) -> Result<(), StockError> {
        self.store.seed(menu_id, quantity).await
    }

    pub fn locks(&self) -> &LockRegistry {
        &self.locks
    }
}
