//! Waste registration and the expired-lot sweep

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::json;
use shared::{
    ledger::{lot_remaining_after, waste_deduction, waste_total_cost},
    validate_quantity, AuditAction, ExpirySweep, Lot, MovementType, WasteCause, WasteRecord,
};
use uuid::Uuid;
use validator::Validate;

use super::inventory::active_warehouse;
use super::stock::{self, reference, NewMovement};
use super::{LedgerEnv, RequestContext};
use crate::error::{AppError, AppResult};
use crate::store::LedgerTx;

const AUTO_EXPIRY_NOTE: &str = "Merma automática por vencimiento de lote";

/// Waste service
#[derive(Clone)]
pub struct WasteService {
    env: LedgerEnv,
}

/// Input for a manual write-off
#[derive(Debug, Deserialize, Validate)]
pub struct WasteInput {
    pub presentation_id: Uuid,
    pub warehouse_id: Uuid,
    pub lot_id: Option<Uuid>,
    pub cause: WasteCause,
    pub quantity: Decimal,
    #[validate(length(max = 500))]
    pub notes: Option<String>,
}

impl WasteService {
    pub fn new(env: LedgerEnv) -> Self {
        Self { env }
    }

    /// Write off stock. A quantity above what is on hand is clamped; the
    /// record keeps the declared quantity and values it.
    pub async fn register_waste(
        &self,
        ctx: &RequestContext,
        input: WasteInput,
    ) -> AppResult<WasteRecord> {
        input.validate()?;
        validate_quantity(input.quantity).map_err(|m| AppError::invalid("quantity", m))?;

        let now = Utc::now();
        let mut tx = self.env.begin(ctx).await?;
        let presentation = stock::active_presentation(tx.as_mut(), input.presentation_id).await?;
        active_warehouse(tx.as_mut(), input.warehouse_id).await?;

        let lot = match input.lot_id {
            Some(lot_id) => Some(
                tx.lock_lot(lot_id)
                    .await?
                    .filter(|l| l.presentation_id == input.presentation_id)
                    .ok_or_else(|| AppError::NotFound("Lot".to_string()))?,
            ),
            None => None,
        };

        let current =
            stock::get_or_create(tx.as_mut(), input.presentation_id, input.warehouse_id).await?;
        if current.quantity <= Decimal::ZERO {
            return Err(AppError::InsufficientStock {
                item: presentation.label(),
                available: current.quantity,
                requested: input.quantity,
            });
        }

        // A named lot is the only cost source; the fallback is for unnamed lots
        let cost_per_unit = match lot.as_ref() {
            Some(lot) => lot.cost_per_unit,
            None => tx
                .latest_costed_lot(input.presentation_id, input.warehouse_id)
                .await?
                .and_then(|l| l.cost_per_unit),
        };

        let record = WasteRecord {
            id: Uuid::new_v4(),
            presentation_id: input.presentation_id,
            warehouse_id: input.warehouse_id,
            lot_id: input.lot_id,
            cause: input.cause,
            quantity: input.quantity,
            cost_per_unit,
            total_cost: waste_total_cost(input.quantity, cost_per_unit),
            notes: input.notes,
            is_auto: false,
            created_by: ctx.actor_id,
            created_at: now,
        };
        let deducted = write_off(tx.as_mut(), &record, current.quantity, lot.as_ref()).await?;
        tx.commit().await?;

        if deducted < record.quantity {
            tracing::warn!(
                "Waste {} declared {} of {} but only {} was on hand",
                record.id,
                record.quantity,
                presentation.label(),
                deducted
            );
        }
        self.env
            .audit
            .emit(ctx.audit_event(
                AuditAction::Waste,
                "WasteRecord",
                Some(record.id),
                Some(json!({
                    "cause": record.cause.as_str(),
                    "quantity": record.quantity.to_string(),
                    "deducted": deducted.to_string(),
                })),
            ))
            .await;

        Ok(record)
    }

    /// Write off every active lot whose expiry has passed
    pub async fn process_expired_lots(&self, ctx: &RequestContext) -> AppResult<ExpirySweep> {
        let now = Utc::now();
        let mut tx = self.env.begin(ctx).await?;

        let lots = tx
            .lock_expired_lots(now, self.env.settings.expiry_sweep_limit)
            .await?;
        if lots.is_empty() {
            return Ok(ExpirySweep {
                processed: 0,
                total_cost: Decimal::ZERO,
                records: Vec::new(),
            });
        }

        // Stock rows locked after the lots, in (presentation, warehouse) order
        let rows: BTreeSet<(Uuid, Uuid)> = lots
            .iter()
            .map(|l| (l.presentation_id, l.warehouse_id))
            .collect();
        for (presentation_id, warehouse_id) in &rows {
            stock::get_or_create(tx.as_mut(), *presentation_id, *warehouse_id).await?;
        }

        let mut records = Vec::with_capacity(lots.len());
        for lot in &lots {
            let record = expiry_record(lot, ctx.actor_id, now);
            let on_hand = tx
                .find_stock(lot.presentation_id, lot.warehouse_id)
                .await?
                .map(|s| s.quantity)
                .unwrap_or(Decimal::ZERO);
            write_off(tx.as_mut(), &record, on_hand, Some(lot)).await?;
            records.push(record);
        }
        tx.commit().await?;

        let total_cost: Decimal = records.iter().filter_map(|r| r.total_cost).sum();
        tracing::info!(
            "Expiry sweep wrote off {} lots, total cost {}",
            records.len(),
            total_cost
        );
        self.env
            .audit
            .emit(ctx.audit_event(
                AuditAction::AutoExpire,
                "WasteRecord",
                None,
                Some(json!({
                    "processed": records.len(),
                    "total_cost": total_cost.to_string(),
                })),
            ))
            .await;

        Ok(ExpirySweep {
            processed: records.len(),
            total_cost,
            records,
        })
    }
}

fn expiry_record(lot: &Lot, actor_id: Option<Uuid>, now: DateTime<Utc>) -> WasteRecord {
    WasteRecord {
        id: Uuid::new_v4(),
        presentation_id: lot.presentation_id,
        warehouse_id: lot.warehouse_id,
        lot_id: Some(lot.id),
        cause: WasteCause::Expired,
        quantity: lot.remaining,
        cost_per_unit: lot.cost_per_unit,
        total_cost: waste_total_cost(lot.remaining, lot.cost_per_unit),
        notes: Some(AUTO_EXPIRY_NOTE.to_string()),
        is_auto: true,
        created_by: actor_id,
        created_at: now,
    }
}

/// Deduct the record from stock and lot, then append the movement and the
/// record. Returns what actually left the shelf.
async fn write_off(
    tx: &mut dyn LedgerTx,
    record: &WasteRecord,
    on_hand: Decimal,
    lot: Option<&Lot>,
) -> AppResult<Decimal> {
    let deduction = waste_deduction(on_hand, record.quantity);
    tx.set_stock_quantity(
        record.presentation_id,
        record.warehouse_id,
        deduction.stock_after,
    )
    .await?;

    if let Some(lot) = lot {
        if record.is_auto {
            tx.update_lot(lot.id, Decimal::ZERO, false).await?;
        } else {
            tx.update_lot(
                lot.id,
                lot_remaining_after(lot.remaining, record.quantity),
                lot.is_active,
            )
            .await?;
        }
    }

    let mut reason = format!("Merma: {}", record.cause.as_str());
    if record.is_auto {
        reason.push_str(" (auto)");
    }
    NewMovement::new(
        record.presentation_id,
        record.warehouse_id,
        MovementType::Waste,
        -deduction.deducted,
    )
    .cost(record.cost_per_unit)
    .lot(record.lot_id)
    .reason(Some(reason))
    .reference(record.id, reference::WASTE)
    .record(tx, record.created_by)
    .await?;

    tx.insert_waste(record).await?;
    Ok(deduction.deducted)
}
