//! # Decrement Strategies
//!
//! Both strategies run the same read-modify-write:
//!
//! 1. read the current stock
//! 2. pass through the race window
//! 3. write `stock - quantity`
//!
//! The race window is a cooperative yield when zero, otherwise a sleep. It stands in for the
//! database round trip between the `SELECT` and the `UPDATE` and is what lets overlapping
//! callers read the same value.
//!
//! ## Unsynchronized
//! Nothing protects steps 1-3. Two callers reading the same value both write the same result
//! and one decrement is lost. No floor check, stock may go negative.
//!
//! ## Lock-guarded
//! Steps 1-3 run while holding the menu's lock from [`LockRegistry`]. Decrements on one menu
//! apply in some serial order, so `final == initial - successes` always holds.
use std::{num::NonZeroU32, time::Duration};

use serde::Serialize;
use tokio::{task::yield_now, time::sleep};

use crate::{
    database::{MenuId, Stock, StockStore},
    error::StockError,
    locks::LockRegistry,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Strategy {
    Unsynchronized,
    LockGuarded,
}

impl Strategy {
    pub fn from_lock_flag(use_lock: bool) -> Self {
        if use_lock {
            Strategy::LockGuarded
        } else {
            Strategy::Unsynchronized
        }
    }
}

async fn race_window(window: Duration) {
    if window.is_zero() {
        yield_now().await;
    } else {
        sleep(window).await;
    }
}

async fn read_modify_write(
    store: &dyn StockStore,
    menu_id: MenuId,
    quantity: NonZeroU32,
    window: Duration,
) -> Result<Stock, StockError> {
    let current = store.get(menu_id).await?;

    let next = current
        .checked_sub(Stock::from(quantity.get()))
        .ok_or_else(|| {
            StockError::UnexpectedFault(format!("stock of menu {menu_id} underflowed"))
        })?;

    race_window(window).await;

    store.set(menu_id, next).await?;

    Ok(next)
}

pub async fn decrease_unsynchronized(
    store: &dyn StockStore,
    menu_id: MenuId,
    quantity: NonZeroU32,
    window: Duration,
) -> Result<Stock, StockError> {
    read_modify_write(store, menu_id, quantity, window).await
}

pub async fn decrease_guarded(
    store: &dyn StockStore,
    locks: &LockRegistry,
    menu_id: MenuId,
    quantity: NonZeroU32,
    window: Duration,
) -> Result<Stock, StockError> {
    // records are never deleted, so an id that exists now still exists under the lock
    store.get(menu_id).await?;

    let _guard = locks.acquire(menu_id).await?;

    read_modify_write(store, menu_id, quantity, window).await
}
