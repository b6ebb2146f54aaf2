//! # Load Driver
//!
//! Fires a burst of concurrent decrements at one menu and collects every outcome.
//!
//! - Every call is spawned onto a `JoinSet` before any is awaited, maximising overlap
//! - Failures never short-circuit the burst, the caller always gets `concurrency` results
//! - A task that panics is reported as an unexpected fault in its own slot
use serde::Serialize;
use tokio::task::JoinSet;
use tracing::{error, info};

use crate::{
    database::{MenuId, Stock},
    error::StockError,
    service::{DecrementResult, DecrementService},
    strategy::Strategy,
};

pub async fn run_burst(
    service: &DecrementService,
    menu_id: MenuId,
    concurrency: usize,
    use_lock: bool,
) -> Vec<DecrementResult> {
    let mut join_set = JoinSet::new();

    for request_id in 0..concurrency {
        let service = service.clone();

        join_set.spawn(async move { (request_id, service.decrement(menu_id, use_lock).await) });
    }

    let mut results: Vec<Option<DecrementResult>> = (0..concurrency).map(|_| None).collect();

    while let Some(joined) = join_set.join_next().await {
        match joined {
            Ok((request_id, result)) => results[request_id] = Some(result),
            Err(err) => {
                // the slot stays empty and is filled below
                error!("Burst task on menu {menu_id} died: {err}");
            }
        }
    }

    results
        .into_iter()
        .map(|slot| {
            slot.unwrap_or_else(|| {
                Err(StockError::UnexpectedFault("burst task did not complete".into()))
            })
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BurstSummary {
    pub menu_id: MenuId,
    pub strategy: Strategy,
    pub requests: usize,
    pub successes: usize,
    pub failures: usize,
    pub min_stock: Option<Stock>,
    pub max_stock: Option<Stock>,
    pub final_stock: Option<Stock>,
}

impl BurstSummary {
    pub fn new(
        menu_id: MenuId,
        use_lock: bool,
        results: &[DecrementResult],
        final_stock: Option<Stock>,
    ) -> Self {
        let observed: Vec<Stock> = results
            .iter()
            .filter_map(|result| result.as_ref().ok().copied())
            .collect();

        Self {
            menu_id,
            strategy: Strategy::from_lock_flag(use_lock),
            requests: results.len(),
            successes: observed.len(),
            failures: results.len() - observed.len(),
            min_stock: observed.iter().min().copied(),
            max_stock: observed.iter().max().copied(),
            final_stock,
        }
    }

    /// Successful decrements that did not show up in the final stock.
    pub fn lost_updates(&self, initial_stock: Stock) -> Option<Stock> {
        self.final_stock
            .map(|final_stock| final_stock - (initial_stock - self.successes as Stock))
    }
}

/// Runs a burst and reads the stock afterwards.
pub async fn run_burst_summary(
    service: &DecrementService,
    menu_id: MenuId,
    concurrency: usize,
    use_lock: bool,
) -> BurstSummary {
    let results = run_burst(service, menu_id, concurrency, use_lock).await;
    let final_stock = service.stock(menu_id).await.ok();

    let summary = BurstSummary::new(menu_id, use_lock, &results, final_stock);

    info!(
        "Burst on menu {menu_id}: {} requests, {} ok, {} failed, final stock {:?}",
        summary.requests, summary.successes, summary.failures, summary.final_stock
    );

    summary
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::service::tests::memory_service;

    #[tokio::test]
    async fn test_guarded_burst_is_exact() {
        let service = memory_service(&[(1, 10)], None, Duration::ZERO).await;

        let results = run_burst(&service, 1, 10, true).await;

        assert_eq!(results.len(), 10);
        assert!(results.iter().all(Result::is_ok));
        assert_eq!(service.stock(1).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_unsynchronized_burst_loses_updates() {
        let service = memory_service(&[(1, 10)], None, Duration::ZERO).await;

        let results = run_burst(&service, 1, 10, false).await;

        assert_eq!(results.len(), 10);
        assert!(results.iter().all(Result::is_ok));
        assert!(service.stock(1).await.unwrap() > 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_guarded_burst_exact_every_trial() {
        let service = memory_service(&[], None, Duration::from_micros(200)).await;

        for _ in 0..20 {
            service.reseed(1, 20).await.unwrap();

            let results = run_burst(&service, 1, 20, true).await;

            assert_eq!(results.len(), 20);
            assert_eq!(service.stock(1).await.unwrap(), 0);
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_unsynchronized_burst_shows_anomaly_across_trials() {
        let service = memory_service(&[], None, Duration::from_millis(1)).await;
        let mut anomalies = 0;

        for _ in 0..20 {
            service.reseed(1, 20).await.unwrap();

            let results = run_burst(&service, 1, 20, false).await;
            assert_eq!(results.len(), 20);

            if service.stock(1).await.unwrap() != 0 {
                anomalies += 1;
            }
        }

        assert!(anomalies > 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_menus_do_not_interfere() {
        let window = Duration::from_micros(100);
        let service = memory_service(&[(1, 50), (2, 50)], None, window).await;

        let (first, second) = tokio::join!(
            run_burst(&service, 1, 50, true),
            run_burst(&service, 2, 50, true),
        );

        assert_eq!(first.len(), 50);
        assert_eq!(second.len(), 50);
        assert_eq!(service.stock(1).await.unwrap(), 0);
        assert_eq!(service.stock(2).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_held_lock_does_not_block_other_menu() {
        let service = memory_service(&[(1, 10), (2, 10)], None, Duration::ZERO).await;
        let _held = service.locks().acquire(1).await.unwrap();

        let burst = run_burst(&service, 2, 10, true);
        let results = tokio::time::timeout(Duration::from_secs(1), burst)
            .await
            .unwrap();

        assert!(results.iter().all(Result::is_ok));
        assert_eq!(service.stock(2).await.unwrap(), 0);
        assert_eq!(service.stock(1).await.unwrap(), 10);
    }

    #[tokio::test]
    async fn test_failures_are_collected() {
        let lock_wait = Some(Duration::from_millis(20));
        let service = memory_service(&[(1, 10)], lock_wait, Duration::ZERO).await;

        let unknown = run_burst(&service, 7, 5, true).await;
        assert_eq!(unknown.len(), 5);
        assert!(
            unknown
                .iter()
                .all(|result| matches!(result, Err(StockError::NotFound(7))))
        );

        let _held = service.locks().acquire(1).await.unwrap();
        let timed_out = run_burst(&service, 1, 5, true).await;
        assert_eq!(timed_out.len(), 5);
        assert!(
            timed_out
                .iter()
                .all(|result| matches!(result, Err(StockError::LockTimeout { .. })))
        );
    }

    #[tokio::test]
    async fn test_empty_burst() {
        let service = memory_service(&[(1, 10)], None, Duration::ZERO).await;

        assert!(run_burst(&service, 1, 0, true).await.is_empty());
    }

    #[test]
    fn test_summary() {
        let results = vec![Ok(9), Ok(9), Err(StockError::NotFound(1)), Ok(8)];

        let summary = BurstSummary::new(1, false, &results, Some(8));

        assert_eq!(summary.strategy, Strategy::Unsynchronized);
        assert_eq!(summary.requests, 4);
        assert_eq!(summary.successes, 3);
        assert_eq!(summary.failures, 1);
        assert_eq!(summary.min_stock, Some(8));
        assert_eq!(summary.max_stock, Some(9));
        assert_eq!(summary.lost_updates(10), Some(1));
    }

    #[tokio::test]
    async fn test_run_burst_summary_reads_final_stock() {
        let service = memory_service(&[(1, 10)], None, Duration::ZERO).await;

        let summary = run_burst_summary(&service, 1, 10, true).await;

        assert_eq!(summary.final_stock, Some(0));
        assert_eq!(summary.min_stock, Some(0));
        assert_eq!(summary.max_stock, Some(9));
        assert_eq!(summary.lost_updates(10), Some(0));
    }
}
