//! HTTP handlers for supplier payables

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use shared::{Supplier, SupplierPayment, SupplierPurchase, SupplierPurchaseDetail};
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::{ClientOrigin, CurrentUser};
use crate::services::supplier::{CreatePurchaseInput, SupplierPaymentInput, SupplierService};
use crate::AppState;

pub async fn get_supplier(
    State(state): State<AppState>,
    current_user: CurrentUser,
    origin: ClientOrigin,
    Path(supplier_id): Path<Uuid>,
) -> AppResult<Json<Supplier>> {
    current_user.0.require("suppliers", "read")?;
    let service = SupplierService::new(state.ledger.clone());
    let supplier = service
        .get_supplier(&current_user.0.context(origin), supplier_id)
        .await?;
    Ok(Json(supplier))
}

/// Register a purchase from a supplier
pub async fn create_purchase(
    State(state): State<AppState>,
    current_user: CurrentUser,
    origin: ClientOrigin,
    Path(supplier_id): Path<Uuid>,
    Json(input): Json<CreatePurchaseInput>,
) -> AppResult<(StatusCode, Json<SupplierPurchaseDetail>)> {
    current_user.0.require("suppliers", "update")?;
    let service = SupplierService::new(state.ledger.clone());
    let purchase = service
        .create_purchase(&current_user.0.context(origin), supplier_id, input)
        .await?;
    Ok((StatusCode::CREATED, Json(purchase)))
}

pub async fn list_purchases(
    State(state): State<AppState>,
    current_user: CurrentUser,
    origin: ClientOrigin,
    Path(supplier_id): Path<Uuid>,
) -> AppResult<Json<Vec<SupplierPurchase>>> {
    current_user.0.require("suppliers", "read")?;
    let service = SupplierService::new(state.ledger.clone());
    let purchases = service
        .list_purchases(&current_user.0.context(origin), supplier_id)
        .await?;
    Ok(Json(purchases))
}

/// Pay a supplier
pub async fn add_payment(
    State(state): State<AppState>,
    current_user: CurrentUser,
    origin: ClientOrigin,
    Path(supplier_id): Path<Uuid>,
    Json(input): Json<SupplierPaymentInput>,
) -> AppResult<(StatusCode, Json<SupplierPayment>)> {
    current_user.0.require("suppliers", "update")?;
    let service = SupplierService::new(state.ledger.clone());
    let payment = service
        .add_payment(&current_user.0.context(origin), supplier_id, input)
        .await?;
    Ok((StatusCode::CREATED, Json(payment)))
}

pub async fn list_payments(
    State(state): State<AppState>,
    current_user: CurrentUser,
    origin: ClientOrigin,
    Path(supplier_id): Path<Uuid>,
) -> AppResult<Json<Vec<SupplierPayment>>> {
    current_user.0.require("suppliers", "read")?;
    let service = SupplierService::new(state.ledger.clone());
    let payments = service
        .list_payments(&current_user.0.context(origin), supplier_id)
        .await?;
    Ok(Json(payments))
}

pub async fn deactivate_supplier(
    State(state): State<AppState>,
    current_user: CurrentUser,
    origin: ClientOrigin,
    Path(supplier_id): Path<Uuid>,
) -> AppResult<Json<Supplier>> {
    current_user.0.require("suppliers", "delete")?;
    let service = SupplierService::new(state.ledger.clone());
    let supplier = service
        .deactivate_supplier(&current_user.0.context(origin), supplier_id)
        .await?;
    Ok(Json(supplier))
}
