use std::sync::Arc;

use tracing::info;

use super::{
    config::{Config, StoreBackend},
    database::{MemoryStore, RedisStore, StockStore, init_redis},
    error::StockError,
    service::DecrementService,
};

pub struct State {
    pub config: Config,
    pub service: DecrementService,
}

impl State {
    pub async fn new(config: Config) -> Result<Arc<Self>, StockError> {
        let store: Arc<dyn StockStore> = match config.backend {
            StoreBackend::Memory => Arc::new(MemoryStore::new()),
            StoreBackend::Redis => {
                info!("Connecting to Redis at {}", config.redis_url);
                Arc::new(RedisStore::new(init_redis(&config.redis_url).await?))
            }
        };

        for (&menu_id, &quantity) in &config.seed {
            store.seed(menu_id, quantity).await?;
            info!("Seeded menu {menu_id} with stock {quantity}");
        }

        let service = DecrementService::new(store, config.lock_wait, config.race_window);

        Ok(Arc::new(Self { config, service }))
    }
}
