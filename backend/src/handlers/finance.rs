//! HTTP handlers for cash registers and sessions

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use shared::{CashMovement, CashRegister, CashSession, CashSessionClosure};
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::{ClientOrigin, CurrentUser};
use crate::services::cash::{
    CashMovementInput, CashSessionService, CloseSessionInput, CreateRegisterInput,
    OpenSessionInput,
};
use crate::AppState;

pub async fn create_register(
    State(state): State<AppState>,
    current_user: CurrentUser,
    origin: ClientOrigin,
    Json(input): Json<CreateRegisterInput>,
) -> AppResult<(StatusCode, Json<CashRegister>)> {
    current_user.0.require("finance", "create")?;
    let service = CashSessionService::new(state.ledger.clone());
    let register = service
        .create_register(&current_user.0.context(origin), input)
        .await?;
    Ok((StatusCode::CREATED, Json(register)))
}

pub async fn deactivate_register(
    State(state): State<AppState>,
    current_user: CurrentUser,
    origin: ClientOrigin,
    Path(register_id): Path<Uuid>,
) -> AppResult<Json<CashRegister>> {
    current_user.0.require("finance", "delete")?;
    let service = CashSessionService::new(state.ledger.clone());
    let register = service
        .deactivate_register(&current_user.0.context(origin), register_id)
        .await?;
    Ok(Json(register))
}

/// Open a session on a register
pub async fn open_session(
    State(state): State<AppState>,
    current_user: CurrentUser,
    origin: ClientOrigin,
    Path(register_id): Path<Uuid>,
    Json(input): Json<OpenSessionInput>,
) -> AppResult<(StatusCode, Json<CashSession>)> {
    current_user.0.require("finance", "open")?;
    let service = CashSessionService::new(state.ledger.clone());
    let session = service
        .open_session(&current_user.0.context(origin), register_id, input)
        .await?;
    Ok((StatusCode::CREATED, Json(session)))
}

pub async fn current_session(
    State(state): State<AppState>,
    current_user: CurrentUser,
    origin: ClientOrigin,
    Path(register_id): Path<Uuid>,
) -> AppResult<Json<CashSession>> {
    current_user.0.require("finance", "read")?;
    let service = CashSessionService::new(state.ledger.clone());
    let session = service
        .current_session(&current_user.0.context(origin), register_id)
        .await?;
    Ok(Json(session))
}

/// Record a manual income or expense
pub async fn add_movement(
    State(state): State<AppState>,
    current_user: CurrentUser,
    origin: ClientOrigin,
    Path(register_id): Path<Uuid>,
    Json(input): Json<CashMovementInput>,
) -> AppResult<(StatusCode, Json<CashMovement>)> {
    current_user.0.require("finance", "create")?;
    let service = CashSessionService::new(state.ledger.clone());
    let movement = service
        .add_movement(&current_user.0.context(origin), register_id, input)
        .await?;
    Ok((StatusCode::CREATED, Json(movement)))
}

/// Close the open session and reconcile the drawer
pub async fn close_session(
    State(state): State<AppState>,
    current_user: CurrentUser,
    origin: ClientOrigin,
    Path(register_id): Path<Uuid>,
    Json(input): Json<CloseSessionInput>,
) -> AppResult<Json<CashSessionClosure>> {
    current_user.0.require("finance", "close")?;
    let service = CashSessionService::new(state.ledger.clone());
    let closure = service
        .close_session(&current_user.0.context(origin), register_id, input)
        .await?;
    Ok(Json(closure))
}
