//! HTTP handlers for payment methods

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use shared::PaymentMethod;
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::{ClientOrigin, CurrentUser};
use crate::services::payment_method::{CreatePaymentMethodInput, PaymentMethodService};
use crate::AppState;

/// List active payment methods
pub async fn list_payment_methods(
    State(state): State<AppState>,
    current_user: CurrentUser,
    origin: ClientOrigin,
) -> AppResult<Json<Vec<PaymentMethod>>> {
    let service = PaymentMethodService::new(state.ledger.clone());
    let methods = service
        .list_payment_methods(&current_user.0.context(origin))
        .await?;
    Ok(Json(methods))
}

/// Create a payment method
pub async fn create_payment_method(
    State(state): State<AppState>,
    current_user: CurrentUser,
    origin: ClientOrigin,
    Json(input): Json<CreatePaymentMethodInput>,
) -> AppResult<(StatusCode, Json<PaymentMethod>)> {
    current_user.0.require("settings", "update")?;
    let service = PaymentMethodService::new(state.ledger.clone());
    let method = service
        .create_payment_method(&current_user.0.context(origin), input)
        .await?;
    Ok((StatusCode::CREATED, Json(method)))
}

/// Deactivate a payment method
pub async fn deactivate_payment_method(
    State(state): State<AppState>,
    current_user: CurrentUser,
    origin: ClientOrigin,
    Path(method_id): Path<Uuid>,
) -> AppResult<Json<PaymentMethod>> {
    current_user.0.require("settings", "update")?;
    let service = PaymentMethodService::new(state.ledger.clone());
    let method = service
        .deactivate_payment_method(&current_user.0.context(origin), method_id)
        .await?;
    Ok(Json(method))
}
