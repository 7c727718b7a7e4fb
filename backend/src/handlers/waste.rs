//! HTTP handlers for waste

use axum::{extract::State, http::StatusCode, Json};
use shared::{ExpirySweep, WasteRecord};

use crate::error::AppResult;
use crate::middleware::{ClientOrigin, CurrentUser};
use crate::services::waste::{WasteInput, WasteService};
use crate::AppState;

/// Register a manual write-off
pub async fn register_waste(
    State(state): State<AppState>,
    current_user: CurrentUser,
    origin: ClientOrigin,
    Json(input): Json<WasteInput>,
) -> AppResult<(StatusCode, Json<WasteRecord>)> {
    current_user.0.require("waste", "create")?;
    let service = WasteService::new(state.ledger.clone());
    let record = service
        .register_waste(&current_user.0.context(origin), input)
        .await?;
    Ok((StatusCode::CREATED, Json(record)))
}

/// Write off every expired lot
pub async fn process_expired_lots(
    State(state): State<AppState>,
    current_user: CurrentUser,
    origin: ClientOrigin,
) -> AppResult<Json<ExpirySweep>> {
    current_user.0.require("waste", "create")?;
    let service = WasteService::new(state.ledger.clone());
    let sweep = service
        .process_expired_lots(&current_user.0.context(origin))
        .await?;
    Ok(Json(sweep))
}
