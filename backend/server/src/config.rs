use std::{collections::BTreeMap, env, fmt::Display, str::FromStr, time::Duration};

use tracing::{info, warn};

use crate::{
    database::{MenuId, Stock},
    error::ConfigError,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Memory,
    Redis,
}

impl FromStr for StoreBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(StoreBackend::Memory),
            "redis" => Ok(StoreBackend::Redis),
            other => Err(format!("unknown backend '{other}', expected memory or redis")),
        }
    }
}

pub struct Config {
    pub port: u16,
    pub backend: StoreBackend,
    pub redis_url: String,
    pub seed: BTreeMap<MenuId, Stock>,
    /// `None` lets guarded callers wait for the lock forever.
    pub lock_wait: Option<Duration>,
    pub race_window: Duration,
    pub max_burst: usize,
}

impl Config {
    pub fn load() -> Result<Self, ConfigError> {
        let lock_wait_ms: u64 = try_load("LOCK_WAIT_MS", "0")?;
        let race_window_ms: u64 = try_load("RACE_WINDOW_MS", "0")?;
        let seed: String = try_load("STOCK_SEED", "1=10")?;

        Ok(Self {
            port: try_load("RUST_PORT", "1111")?,
            backend: try_load("STOCK_BACKEND", "memory")?,
            redis_url: try_load("REDIS_URL", "redis://127.0.0.1:6379")?,
            seed: parse_seed(&seed)?,
            lock_wait: (lock_wait_ms > 0).then(|| Duration::from_millis(lock_wait_ms)),
            race_window: Duration::from_millis(race_window_ms),
            max_burst: try_load("MAX_BURST", "1000")?,
        })
    }
}

fn var(key: &str) -> Option<String> {
    env::var(key).ok()
}

fn try_load<T: FromStr>(key: &'static str, default: &str) -> Result<T, ConfigError>
where
    T::Err: Display,
{
    var(key)
        .unwrap_or_else(|| {
            info!("{key} not set, using default: {default}");
            default.to_string()
        })
        .parse::<T>()
        .map_err(|e| {
            warn!("Invalid {key} value: {e}");

            ConfigError::Invalid {
                key,
                reason: e.to_string(),
            }
        })
}

/// Parses `id=quantity` pairs separated by commas, e.g. `1=10, 2=100`.
pub fn parse_seed(raw: &str) -> Result<BTreeMap<MenuId, Stock>, ConfigError> {
    let invalid = |reason: String| ConfigError::Invalid {
        key: "STOCK_SEED",
        reason,
    };

    let mut seed = BTreeMap::new();

    for pair in raw.split(',').map(str::trim).filter(|pair| !pair.is_empty()) {
        let (id, quantity) = pair
            .split_once('=')
            .ok_or_else(|| invalid(format!("'{pair}' is not id=quantity")))?;

        let id: MenuId = id
            .trim()
            .parse()
            .map_err(|e| invalid(format!("menu id in '{pair}': {e}")))?;

        if id == 0 {
            return Err(invalid("menu ids start at 1".to_string()));
        }

        let quantity: Stock = quantity
            .trim()
            .parse()
            .map_err(|e| invalid(format!("quantity in '{pair}': {e}")))?;

        seed.insert(id, quantity);
    }

    Ok(seed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_seed() {
        let seed = parse_seed("1=10, 2 = 100,").unwrap();

        assert_eq!(seed.len(), 2);
        assert_eq!(seed[&1], 10);
        assert_eq!(seed[&2], 100);
    }

    #[test]
    fn test_parse_seed_empty() {
        assert!(parse_seed("").unwrap().is_empty());
        assert!(parse_seed(" , ").unwrap().is_empty());
    }

    #[test]
    fn test_parse_seed_invalid() {
        assert!(parse_seed("1").is_err());
        assert!(parse_seed("a=10").is_err());
        assert!(parse_seed("1=ten").is_err());
        assert!(parse_seed("0=10").is_err());
    }

    #[test]
    fn test_try_load_falls_back_to_typed_default() {
        let port: u16 = try_load("STOCK_TEST_UNSET_PORT", "1111").unwrap();
        let wait: u64 = try_load("STOCK_TEST_UNSET_WAIT", "0").unwrap();

        assert_eq!(port, 1111);
        assert_eq!(wait, 0);
    }

    #[test]
    fn test_try_load_rejects_bad_default() {
        let result = try_load::<u16>("STOCK_TEST_UNSET_PORT", "70000");

        assert!(matches!(
            result,
            Err(ConfigError::Invalid {
                key: "STOCK_TEST_UNSET_PORT",
                ..
            })
        ));
    }

    #[test]
    fn test_store_backend() {
        assert_eq!("memory".parse::<StoreBackend>(), Ok(StoreBackend::Memory));
        assert_eq!(" Redis ".parse::<StoreBackend>(), Ok(StoreBackend::Redis));
        assert!("postgres".parse::<StoreBackend>().is_err());
    }
}
