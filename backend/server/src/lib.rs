//! Documentation of the stock decrement concurrency demo.
//!
//! A client fires N simultaneous "decrease stock by 1" requests at one menu item. A flag picks
//! between an unsynchronized read-modify-write, which loses updates, and a lock-guarded one,
//! which does not.
//!
//!
//!
//! # Flow
//! - Load driver (`tester` binary, or the `/burst` route) fires N requests at once
//! - Router hands each one to [`service::DecrementService`]
//! - Service picks a strategy from the lock flag, nothing else
//! - Strategy reads then writes through a [`database::StockStore`]
//!
//!
//!
//! # What To Expect
//!
//! Seed menu 1 with 10, fire 10 unsynchronized requests:
//! ```text
//! T1: read(stock=10) -> write(9)
//! T2: read(stock=10) -> write(9)   <- lost update
//! ```
//! Final stock lands somewhere above 0.
//!
//! Reseed with 10, fire 10 guarded requests:
//! ```text
//! T1: lock -> read(10) -> write(9) -> unlock
//! T2: wait... -> lock -> read(9) -> write(8) -> unlock
//! ```
//! Final stock is exactly 0, every time.
//!
//!
//!
//! # Notes
//!
//! ## Locks
//! Locks are per menu id. A burst on one menu never waits on another. Mixing guarded and
//! unsynchronized calls on the same menu at the same time is not supported, the unsynchronized
//! path never looks at the lock.
//!
//! ## Redis
//! With `STOCK_BACKEND=redis` the counts live in Redis instead of process memory. The lock stays
//! in-process, so guarded decrements are only exact with a single server instance.
//!
//!
//!
//! # Endpoints
//!
//! ```sh
//! curl -X POST 'localhost:1111/api/menus/1/decrease-stock?lock=true'
//! curl -X POST 'localhost:1111/api/menus/1/decrease-stock-pessimistic?quantity=2'
//! curl localhost:1111/api/menus/1/stock
//! curl -X PUT localhost:1111/api/menus/1/stock \
//!     -H 'content-type: application/json' -d '{"stock":10}'
//! curl -X POST 'localhost:1111/api/menus/1/burst?concurrency=10&lock=false'
//! ```
//!
//!
//!
//! # Setup
//!
//! Run the server.
//! ```sh
//! RUST_LOG=info cargo run --bin stock
//! ```
//!
//! Fire a burst from outside.
//! ```sh
//! cargo run --bin tester -- 1 --concurrency 10 --reseed 10
//! cargo run --bin tester -- 1 --concurrency 10 --reseed 10 --lock
//! ```
use std::{sync::Arc, time::Duration};

use axum::{
    Router,
    http::{Method, header::CONTENT_TYPE},
    routing::{get, post},
};

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};
use tokio::{net::TcpListener, signal::ctrl_c};
use tower_http::cors::CorsLayer;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt};

pub mod burst;
pub mod config;
pub mod database;
pub mod error;
pub mod locks;
pub mod routes;
pub mod service;
pub mod state;
pub mod strategy;
pub mod utils;

use config::Config;
use routes::{
    burst_handler, decrease_stock_handler, decrease_stock_pessimistic_handler, reseed_handler,
    stock_handler,
};
use state::State;

pub fn app(state: Arc<State>) -> Router {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE])
        .max_age(Duration::from_secs(60 * 60));

    Router::new()
        .route("/api/menus/{menu_id}/decrease-stock", post(decrease_stock_handler))
        .route(
            "/api/menus/{menu_id}/decrease-stock-pessimistic",
            post(decrease_stock_pessimistic_handler),
        )
        .route("/api/menus/{menu_id}/stock", get(stock_handler).put(reseed_handler))
        .route("/api/menus/{menu_id}/burst", post(burst_handler))
        .layer(cors)
        .with_state(state)
}

pub async fn start_server() -> anyhow::Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    info!("Loading config...");
    let config = Config::load()?;

    info!("Initializing state...");
    let state = State::new(config).await?;

    info!("Starting server...");

    let address = format!("0.0.0.0:{}", state.config.port);
    info!("Binding to {address}");

    let listener = TcpListener::bind(&address).await?;
    info!("Server running on {address}");

    axum::serve(listener, app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shut down");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        ctrl_c().await.expect("Failed to install Ctrl+C handler");

        info!("Received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        signal(SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;

        info!("Received terminate signal, shutting down");
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
