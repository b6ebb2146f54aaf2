//! # Stock Store
//!
//! Authoritative per-item stock counts. Every decrement attempt reads and writes through here.
//!
//! ## Requirements
//!
//! - A single `get` or a single `set` is atomic
//! - The `get` then `set` sequence is **not** protected, that is the strategy layer's job
//! - Items are independent, no cross-item interaction
//! - Records are seeded at startup and never deleted
//!
//! ## Backends
//!
//! ### Memory
//! - `DashMap` of menu id to signed quantity
//! - Shard locks are held for one read or one write only, never across the pair
//!
//! ### Redis
//! - One string key per item: `stock:menu:{id}`
//! - `GET` for reads, `SET ... XX` for writes so an unknown item stays unknown
//! - Redis runs commands one at a time, which again only makes single commands atomic
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use redis::{
    AsyncCommands, Client,
    aio::{ConnectionManager, ConnectionManagerConfig},
};

use crate::error::StockError;

pub type MenuId = u64;

/// Signed so the unsynchronized path can visibly overshoot below zero.
pub type Stock = i64;

const REDIS_KEY_PREFIX: &str = "stock:menu:";

#[async_trait]
pub trait StockStore: Send + Sync {
    async fn get(&self, menu_id: MenuId) -> Result<Stock, StockError>;

    /// Overwrites an existing record. Unknown ids fail with [`StockError::NotFound`].
    async fn set(&self, menu_id: MenuId, quantity: Stock) -> Result<(), StockError>;

    /// Creates or overwrites a record.
    async fn seed(&self, menu_id: MenuId, quantity: Stock) -> Result<(), StockError>;
}

#[derive(Default)]
pub struct MemoryStore {
    stock: DashMap<MenuId, Stock>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StockStore for MemoryStore {
    async fn get(&self, menu_id: MenuId) -> Result<Stock, StockError> {
        self.stock
            .get(&menu_id)
            .map(|quantity| *quantity)
            .ok_or(StockError::NotFound(menu_id))
    }

    async fn set(&self, menu_id: MenuId, quantity: Stock) -> Result<(), StockError> {
        let mut record = self
            .stock
            .get_mut(&menu_id)
            .ok_or(StockError::NotFound(menu_id))?;

        *record = quantity;

        Ok(())
    }

    async fn seed(&self, menu_id: MenuId, quantity: Stock) -> Result<(), StockError> {
        self.stock.insert(menu_id, quantity);

        Ok(())
    }
}

pub struct RedisStore {
    connection: ConnectionManager,
}

impl RedisStore {
    pub fn new(connection: ConnectionManager) -> Self {
        Self { connection }
    }
}

fn redis_key(menu_id: MenuId) -> String {
    format!("{REDIS_KEY_PREFIX}{menu_id}")
}

#[async_trait]
impl StockStore for RedisStore {
    async fn get(&self, menu_id: MenuId) -> Result<Stock, StockError> {
        let mut connection = self.connection.clone();
        let quantity: Option<Stock> = connection.get(redis_key(menu_id)).await?;

        quantity.ok_or(StockError::NotFound(menu_id))
    }

    async fn set(&self, menu_id: MenuId, quantity: Stock) -> Result<(), StockError> {
        let mut connection = self.connection.clone();

        // nil reply means the key did not exist
        let reply: Option<String> = redis::cmd("SET")
            .arg(redis_key(menu_id))
            .arg(quantity)
            .arg("XX")
            .query_async(&mut connection)
            .await?;

        reply.map(|_| ()).ok_or(StockError::NotFound(menu_id))
    }

    async fn seed(&self, menu_id: MenuId, quantity: Stock) -> Result<(), StockError> {
        let mut connection = self.connection.clone();
        let _: () = connection.set(redis_key(menu_id), quantity).await?;

        Ok(())
    }
}

pub async fn init_redis(redis_url: &str) -> Result<ConnectionManager, StockError> {
    let config = ConnectionManagerConfig::new()
        .set_number_of_retries(1)
        .set_connection_timeout(Duration::from_millis(500));

    let client = Client::open(redis_url)?;
    let connection_manager = client.get_connection_manager_with_config(config).await?;

    Ok(connection_manager)
}
