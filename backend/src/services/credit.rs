//! Client receivable ledger
//!
//! A balance change and its credit movement always go through the same
//! function, so the balance equals charges minus payments by construction.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use shared::{
    ledger::{ensure_payment_within_balance, ensure_within_credit_limit, recompute_status},
    Client, CreditMovement, CreditMovementType,
};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::store::LedgerTx;

/// Lock a client that has not been deactivated
pub async fn lock_active_client(tx: &mut dyn LedgerTx, client_id: Uuid) -> AppResult<Client> {
    tx.lock_client(client_id)
        .await?
        .filter(|c| c.is_active)
        .ok_or_else(|| AppError::NotFound("Client".to_string()))
}

/// Metadata carried by a credit movement
#[derive(Debug, Clone)]
pub struct CreditEntry {
    pub description: Option<String>,
    pub sale_id: Option<Uuid>,
    pub actor_id: Option<Uuid>,
    pub at: DateTime<Utc>,
}

/// Raise the client's balance; fails past a positive credit limit
pub async fn post_charge(
    tx: &mut dyn LedgerTx,
    client: &mut Client,
    amount: Decimal,
    entry: CreditEntry,
) -> AppResult<CreditMovement> {
    ensure_within_credit_limit(client.credit_limit, client.current_balance, amount)?;
    client.current_balance += amount;
    append(tx, client, CreditMovementType::Charge, amount, entry).await
}

/// Lower the client's balance; fails when paying more than is owed
pub async fn post_payment(
    tx: &mut dyn LedgerTx,
    client: &mut Client,
    amount: Decimal,
    entry: CreditEntry,
) -> AppResult<CreditMovement> {
    ensure_payment_within_balance(client.current_balance, amount)?;
    client.current_balance -= amount;
    append(tx, client, CreditMovementType::Payment, amount, entry).await
}

async fn append(
    tx: &mut dyn LedgerTx,
    client: &Client,
    movement_type: CreditMovementType,
    amount: Decimal,
    entry: CreditEntry,
) -> AppResult<CreditMovement> {
    let movement = CreditMovement {
        id: Uuid::new_v4(),
        client_id: client.id,
        movement_type,
        amount,
        description: entry.description,
        sale_id: entry.sale_id,
        created_by: entry.actor_id,
        created_at: entry.at,
    };
    tx.insert_credit_movement(&movement).await?;
    Ok(movement)
}

/// Recompute the derived status in place; BLOCKED is left untouched
pub fn refresh_status(client: &mut Client, now: DateTime<Utc>, inactive_after_days: i64) {
    client.status = recompute_status(
        client.status,
        client.current_balance,
        client.last_purchase_at,
        client.credit_days,
        now,
        inactive_after_days,
    );
}

/// Persist the client after its status has been refreshed
pub async fn save_refreshed(
    tx: &mut dyn LedgerTx,
    client: &mut Client,
    now: DateTime<Utc>,
    inactive_after_days: i64,
) -> AppResult<()> {
    refresh_status(client, now, inactive_after_days);
    tx.save_client(client).await
}
