//! Client credit service: manual charges and payments, blocking, status refresh

use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::json;
use shared::{
    validate_amount, AuditAction, Client, CreditMovement, CreditMovementType, PartyStatus,
};
use uuid::Uuid;
use validator::Validate;

use super::credit::{self, CreditEntry};
use super::{LedgerEnv, RequestContext};
use crate::error::{AppError, AppResult};

/// Client credit service
#[derive(Clone)]
pub struct ClientService {
    env: LedgerEnv,
}

/// Input for a manual charge or payment
#[derive(Debug, Deserialize, Validate)]
pub struct CreditMovementInput {
    pub movement_type: CreditMovementType,
    pub amount: Decimal,
    #[validate(length(max = 255))]
    pub description: Option<String>,
}

/// Result of a status refresh over all active clients
#[derive(Debug, Clone, Serialize)]
pub struct StatusRefresh {
    pub updated: usize,
}

impl ClientService {
    pub fn new(env: LedgerEnv) -> Self {
        Self { env }
    }

    /// Get an active client
    pub async fn get_client(&self, ctx: &RequestContext, client_id: Uuid) -> AppResult<Client> {
        let mut tx = self.env.begin(ctx).await?;
        credit::lock_active_client(tx.as_mut(), client_id).await
    }

    /// Credit movements of a client, newest first
    pub async fn credit_history(
        &self,
        ctx: &RequestContext,
        client_id: Uuid,
    ) -> AppResult<Vec<CreditMovement>> {
        let mut tx = self.env.begin(ctx).await?;
        credit::lock_active_client(tx.as_mut(), client_id).await?;

        let mut movements = tx.list_credit_movements(client_id).await?;
        movements.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(movements)
    }

    /// Record a manual charge or payment against the client's balance
    pub async fn add_credit_movement(
        &self,
        ctx: &RequestContext,
        client_id: Uuid,
        input: CreditMovementInput,
    ) -> AppResult<CreditMovement> {
        input.validate()?;
        validate_amount(input.amount).map_err(|m| AppError::invalid("amount", m))?;

        let now = Utc::now();
        let mut tx = self.env.begin(ctx).await?;
        let mut client = credit::lock_active_client(tx.as_mut(), client_id).await?;

        let entry = CreditEntry {
            description: input.description,
            sale_id: None,
            actor_id: ctx.actor_id,
            at: now,
        };
        let movement = match input.movement_type {
            CreditMovementType::Charge => {
                credit::post_charge(tx.as_mut(), &mut client, input.amount, entry).await?
            }
            CreditMovementType::Payment => {
                credit::post_payment(tx.as_mut(), &mut client, input.amount, entry).await?
            }
        };
        credit::save_refreshed(
            tx.as_mut(),
            &mut client,
            now,
            self.env.settings.inactive_after_days,
        )
        .await?;
        tx.commit().await?;

        let action = match movement.movement_type {
            CreditMovementType::Charge => AuditAction::Charge,
            CreditMovementType::Payment => AuditAction::Payment,
        };
        self.env
            .audit
            .emit(ctx.audit_event(
                action,
                "CreditMovement",
                Some(movement.id),
                Some(json!({
                    "client_id": client_id,
                    "amount": movement.amount.to_string(),
                })),
            ))
            .await;

        Ok(movement)
    }

    /// Put a client in BLOCKED; only [`Self::unblock_client`] takes it out
    pub async fn block_client(&self, ctx: &RequestContext, client_id: Uuid) -> AppResult<Client> {
        let mut tx = self.env.begin(ctx).await?;
        let mut client = credit::lock_active_client(tx.as_mut(), client_id).await?;

        if client.status == PartyStatus::Blocked {
            return Err(AppError::invalid_state(
                "Client is already blocked",
                "El cliente ya está bloqueado",
            ));
        }

        client.status = PartyStatus::Blocked;
        tx.save_client(&client).await?;
        tx.commit().await?;

        tracing::info!("Client {} blocked", client.id);
        self.env
            .audit
            .emit(ctx.audit_event(AuditAction::Block, "Client", Some(client.id), None))
            .await;

        Ok(client)
    }

    /// Lift a block and recompute the status from balance and recency
    pub async fn unblock_client(
        &self,
        ctx: &RequestContext,
        client_id: Uuid,
    ) -> AppResult<Client> {
        let mut tx = self.env.begin(ctx).await?;
        let mut client = credit::lock_active_client(tx.as_mut(), client_id).await?;

        if client.status != PartyStatus::Blocked {
            return Err(AppError::invalid_state(
                "Client is not blocked",
                "El cliente no está bloqueado",
            ));
        }

        client.status = PartyStatus::Active;
        credit::save_refreshed(
            tx.as_mut(),
            &mut client,
            Utc::now(),
            self.env.settings.inactive_after_days,
        )
        .await?;
        tx.commit().await?;

        self.env
            .audit
            .emit(ctx.audit_event(AuditAction::Unblock, "Client", Some(client.id), None))
            .await;

        Ok(client)
    }

    /// Recompute the status of every active client of the business
    pub async fn refresh_statuses(&self, ctx: &RequestContext) -> AppResult<StatusRefresh> {
        let now = Utc::now();
        let mut tx = self.env.begin(ctx).await?;
        let clients = tx.lock_active_clients().await?;
        let updated = clients.len();

        for mut client in clients {
            credit::save_refreshed(
                tx.as_mut(),
                &mut client,
                now,
                self.env.settings.inactive_after_days,
            )
            .await?;
        }
        tx.commit().await?;

        tracing::info!("Refreshed status of {} clients", updated);
        Ok(StatusRefresh { updated })
    }

    /// Deactivate a client that owes nothing
    pub async fn deactivate_client(
        &self,
        ctx: &RequestContext,
        client_id: Uuid,
    ) -> AppResult<Client> {
        let mut tx = self.env.begin(ctx).await?;
        let mut client = credit::lock_active_client(tx.as_mut(), client_id).await?;

        if client.current_balance > Decimal::ZERO {
            return Err(AppError::invalid_state(
                format!(
                    "Client has an outstanding balance of {}. Settle it before deactivating.",
                    client.current_balance
                ),
                format!(
                    "El cliente tiene una deuda de {}. Salda la deuda antes de eliminar.",
                    client.current_balance
                ),
            ));
        }

        client.is_active = false;
        tx.save_client(&client).await?;
        tx.commit().await?;

        self.env
            .audit
            .emit(ctx.audit_event(AuditAction::Deactivate, "Client", Some(client.id), None))
            .await;

        Ok(client)
    }
}
