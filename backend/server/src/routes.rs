use std::sync::Arc;

use axum::{
    Json,
    extract::{
        self, Path, Query,
        rejection::{JsonRejection, PathRejection, QueryRejection},
    },
};
use serde::Deserialize;

use crate::{
    burst::{BurstSummary, run_burst_summary},
    database::{MenuId, Stock},
    error::AppError,
    state::State,
    utils::{ApiResponse, StockView, check_concurrency, check_menu_id, check_quantity},
};

type Shared = extract::State<Arc<State>>;

// rejections are taken as values so they leave through `AppError` like every other failure
type MenuPath = Result<Path<MenuId>, PathRejection>;
type Params<T> = Result<Query<T>, QueryRejection>;

fn one() -> u32 {
    1
}

fn ten() -> usize {
    10
}

#[derive(Deserialize)]
pub struct DecreaseParams {
    #[serde(default)]
    lock: bool,
    #[serde(default = "one")]
    quantity: u32,
}

#[derive(Deserialize)]
pub struct QuantityParams {
    #[serde(default = "one")]
    quantity: u32,
}

#[derive(Deserialize)]
pub struct BurstParams {
    #[serde(default)]
    lock: bool,
    #[serde(default = "ten")]
    concurrency: usize,
}

#[derive(Deserialize)]
pub struct Reseed {
    stock: Stock,
}

async fn decrease(
    state: &State,
    menu_id: MenuId,
    quantity: u32,
    use_lock: bool,
) -> Result<Json<ApiResponse<StockView>>, AppError> {
    let menu_id = check_menu_id(menu_id)?;
    let quantity = check_quantity(quantity)?;

    let stock = state.service.decrease(menu_id, quantity, use_lock).await?;

    Ok(Json(ApiResponse::ok(StockView { menu_id, stock })))
}

pub async fn decrease_stock_handler(
    extract::State(state): Shared,
    menu_id: MenuPath,
    params: Params<DecreaseParams>,
) -> Result<Json<ApiResponse<StockView>>, AppError> {
    let Path(menu_id) = menu_id?;
    let Query(params) = params?;

    decrease(&state, menu_id, params.quantity, params.lock).await
}

pub async fn decrease_stock_pessimistic_handler(
    extract::State(state): Shared,
    menu_id: MenuPath,
    params: Params<QuantityParams>,
) -> Result<Json<ApiResponse<StockView>>, AppError> {
    let Path(menu_id) = menu_id?;
    let Query(params) = params?;

    decrease(&state, menu_id, params.quantity, true).await
}

pub async fn stock_handler(
    extract::State(state): Shared,
    menu_id: MenuPath,
) -> Result<Json<ApiResponse<StockView>>, AppError> {
    let Path(menu_id) = menu_id?;
    let menu_id = check_menu_id(menu_id)?;
    let stock = state.service.stock(menu_id).await?;

    Ok(Json(ApiResponse::ok(StockView { menu_id, stock })))
}

pub async fn reseed_handler(
    extract::State(state): Shared,
    menu_id: MenuPath,
    payload: Result<Json<Reseed>, JsonRejection>,
) -> Result<Json<ApiResponse<StockView>>, AppError> {
    let Path(menu_id) = menu_id?;
    let Json(payload) = payload?;

    let menu_id = check_menu_id(menu_id)?;
    state.service.reseed(menu_id, payload.stock).await?;

    Ok(Json(ApiResponse::ok_with_message(
        StockView {
            menu_id,
            stock: payload.stock,
        },
        "Stock reseeded",
    )))
}

pub async fn burst_handler(
    extract::State(state): Shared,
    menu_id: MenuPath,
    params: Params<BurstParams>,
) -> Result<Json<ApiResponse<BurstSummary>>, AppError> {
    let Path(menu_id) = menu_id?;
    let Query(params) = params?;

    let menu_id = check_menu_id(menu_id)?;
    let concurrency = check_concurrency(params.concurrency, state.config.max_burst)?;

    // an unknown menu answers 404 once instead of a summary of `concurrency` failures
    state.service.stock(menu_id).await?;

    let summary = run_burst_summary(&state.service, menu_id, concurrency, params.lock).await;

    Ok(Json(ApiResponse::ok(summary)))
}
