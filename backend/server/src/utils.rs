use std::num::NonZeroU32;

use serde::Serialize;

use crate::{
    database::{MenuId, Stock},
    error::AppError::{self, MalformedPayload},
};

/// Envelope for every successful response: `{"success": true, "data": ..., "message": ...}`.
#[derive(Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
        }
    }

    pub fn ok_with_message(data: T, message: impl Into<String>) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: Some(message.into()),
        }
    }
}

#[derive(Serialize, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct StockView {
    pub menu_id: MenuId,
    pub stock: Stock,
}

pub fn check_menu_id(menu_id: MenuId) -> Result<MenuId, AppError> {
    if menu_id == 0 {
        return Err(MalformedPayload("menu id must be positive".to_string()));
    }

    Ok(menu_id)
}

pub fn check_quantity(quantity: u32) -> Result<NonZeroU32, AppError> {
    NonZeroU32::new(quantity)
        .ok_or_else(|| MalformedPayload("quantity must be at least 1".to_string()))
}

pub fn check_concurrency(concurrency: usize, max_burst: usize) -> Result<usize, AppError> {
    if concurrency == 0 || concurrency > max_burst {
        return Err(MalformedPayload(format!(
            "concurrency must be between 1 and {max_burst}"
        )));
    }

    Ok(concurrency)
}
