//! HTTP handlers for the sale engine

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use shared::SaleDetail;
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::{ClientOrigin, CurrentUser};
use crate::services::sale::{CancelSaleInput, CreateSaleInput, SaleService};
use crate::AppState;

/// Register a sale
pub async fn create_sale(
    State(state): State<AppState>,
    current_user: CurrentUser,
    origin: ClientOrigin,
    Json(input): Json<CreateSaleInput>,
) -> AppResult<(StatusCode, Json<SaleDetail>)> {
    current_user.0.require("sales", "create")?;
    let service = SaleService::new(state.ledger.clone());
    let sale = service
        .create_sale(&current_user.0.context(origin), input)
        .await?;
    Ok((StatusCode::CREATED, Json(sale)))
}

/// Get a sale with items and payments
pub async fn get_sale(
    State(state): State<AppState>,
    current_user: CurrentUser,
    origin: ClientOrigin,
    Path(sale_id): Path<Uuid>,
) -> AppResult<Json<SaleDetail>> {
    current_user.0.require("sales", "read")?;
    let service = SaleService::new(state.ledger.clone());
    let sale = service
        .get_sale(&current_user.0.context(origin), sale_id)
        .await?;
    Ok(Json(sale))
}

/// Cancel a completed sale
pub async fn cancel_sale(
    State(state): State<AppState>,
    current_user: CurrentUser,
    origin: ClientOrigin,
    Path(sale_id): Path<Uuid>,
    Json(input): Json<CancelSaleInput>,
) -> AppResult<Json<SaleDetail>> {
    current_user.0.require("sales", "cancel")?;
    let service = SaleService::new(state.ledger.clone());
    let sale = service
        .cancel_sale(&current_user.0.context(origin), sale_id, input)
        .await?;
    Ok(Json(sale))
}
