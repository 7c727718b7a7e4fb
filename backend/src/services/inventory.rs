//! Inventory service for entries, adjustments, transfers and warehouse lifecycle

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::json;
use shared::{
    validate_adjustment, validate_non_negative, validate_quantity, validate_required_text,
    AuditAction, InventoryMovement, Lot, MovementType, Warehouse,
};
use uuid::Uuid;
use validator::Validate;

use super::stock::{self, NewMovement};
use super::{LedgerEnv, RequestContext};
use crate::error::{AppError, AppResult};
use crate::store::LedgerTx;

/// Inventory service
#[derive(Clone)]
pub struct InventoryService {
    env: LedgerEnv,
}

/// Input for receiving stock outside a supplier purchase
#[derive(Debug, Deserialize, Validate)]
pub struct EntryInput {
    pub presentation_id: Uuid,
    pub warehouse_id: Uuid,
    pub quantity: Decimal,
    pub cost_per_unit: Option<Decimal>,
    #[validate(length(max = 100))]
    pub lot_number: Option<String>,
    pub arrival_date: Option<DateTime<Utc>>,
    pub expiry_date: Option<DateTime<Utc>>,
    #[validate(length(max = 255))]
    pub reason: Option<String>,
}

/// Input for a manual correction; `quantity` is signed
#[derive(Debug, Deserialize, Validate)]
pub struct AdjustmentInput {
    pub presentation_id: Uuid,
    pub warehouse_id: Uuid,
    pub quantity: Decimal,
    #[validate(length(min = 1, max = 255))]
    pub reason: String,
}

/// Input for moving stock between warehouses
#[derive(Debug, Deserialize, Validate)]
pub struct TransferInput {
    pub presentation_id: Uuid,
    pub from_warehouse_id: Uuid,
    pub to_warehouse_id: Uuid,
    pub quantity: Decimal,
    #[validate(length(max = 255))]
    pub reason: Option<String>,
}

/// A received batch and the movement documenting it
#[derive(Debug, Clone, Serialize)]
pub struct InventoryEntry {
    pub lot: Lot,
    pub movement: InventoryMovement,
    pub stock: Decimal,
}

/// Current stock of one presentation in one warehouse
#[derive(Debug, Clone, Serialize)]
pub struct StockLevel {
    pub presentation_id: Uuid,
    pub warehouse_id: Uuid,
    pub quantity: Decimal,
}

impl InventoryService {
    /// Create a new InventoryService instance
    pub fn new(env: LedgerEnv) -> Self {
        Self { env }
    }

    /// Receive stock: new lot, stock increment and ENTRY movement
    pub async fn register_entry(
        &self,
        ctx: &RequestContext,
        input: EntryInput,
    ) -> AppResult<InventoryEntry> {
        input.validate()?;
        validate_quantity(input.quantity).map_err(|m| AppError::invalid("quantity", m))?;
        if let Some(cost) = input.cost_per_unit {
            validate_non_negative(cost).map_err(|m| AppError::invalid("cost_per_unit", m))?;
        }

        let mut tx = self.env.begin(ctx).await?;
        stock::active_presentation(tx.as_mut(), input.presentation_id).await?;
        active_warehouse(tx.as_mut(), input.warehouse_id).await?;

        let lot = Lot {
            id: Uuid::new_v4(),
            presentation_id: input.presentation_id,
            warehouse_id: input.warehouse_id,
            lot_number: input.lot_number,
            quantity: input.quantity,
            remaining: input.quantity,
            cost_per_unit: input.cost_per_unit,
            arrival_date: input.arrival_date.unwrap_or_else(Utc::now),
            expiry_date: input.expiry_date,
            is_active: true,
            supplier_purchase_id: None,
        };
        tx.insert_lot(&lot).await?;

        let stock = stock::adjust(
            tx.as_mut(),
            input.presentation_id,
            input.warehouse_id,
            input.quantity,
        )
        .await?;
        let movement = NewMovement::new(
            input.presentation_id,
            input.warehouse_id,
            MovementType::Entry,
            input.quantity,
        )
        .cost(input.cost_per_unit)
        .lot(Some(lot.id))
        .reason(input.reason)
        .record(tx.as_mut(), ctx.actor_id)
        .await?;
        tx.commit().await?;

        self.env
            .audit
            .emit(ctx.audit_event(
                AuditAction::Entry,
                "Inventory",
                Some(movement.id),
                Some(json!({
                    "presentation_id": movement.presentation_id,
                    "quantity": movement.quantity.to_string(),
                })),
            ))
            .await;

        Ok(InventoryEntry {
            lot,
            movement,
            stock,
        })
    }

    /// Correct stock by a signed quantity; never below zero
    pub async fn register_adjustment(
        &self,
        ctx: &RequestContext,
        input: AdjustmentInput,
    ) -> AppResult<InventoryMovement> {
        input.validate()?;
        validate_adjustment(input.quantity).map_err(|m| AppError::invalid("quantity", m))?;
        validate_required_text(&input.reason).map_err(|m| AppError::invalid("reason", m))?;

        let mut tx = self.env.begin(ctx).await?;
        let presentation = stock::active_presentation(tx.as_mut(), input.presentation_id).await?;
        active_warehouse(tx.as_mut(), input.warehouse_id).await?;

        let current =
            stock::get_or_create(tx.as_mut(), input.presentation_id, input.warehouse_id).await?;
        if input.quantity < Decimal::ZERO {
            stock::ensure_available(&presentation, current.quantity, -input.quantity)?;
        }

        stock::adjust(
            tx.as_mut(),
            input.presentation_id,
            input.warehouse_id,
            input.quantity,
        )
        .await?;
        let movement = NewMovement::new(
            input.presentation_id,
            input.warehouse_id,
            MovementType::Adjustment,
            input.quantity,
        )
        .reason(Some(input.reason.trim().to_string()))
        .record(tx.as_mut(), ctx.actor_id)
        .await?;
        tx.commit().await?;

        self.env
            .audit
            .emit(ctx.audit_event(
                AuditAction::Adjustment,
                "Inventory",
                Some(movement.id),
                Some(json!({
                    "reason": movement.reason,
                    "quantity": movement.quantity.to_string(),
                })),
            ))
            .await;

        Ok(movement)
    }

    /// Move stock between two warehouses; all or nothing
    pub async fn register_transfer(
        &self,
        ctx: &RequestContext,
        input: TransferInput,
    ) -> AppResult<InventoryMovement> {
        input.validate()?;
        validate_quantity(input.quantity).map_err(|m| AppError::invalid("quantity", m))?;
        if input.from_warehouse_id == input.to_warehouse_id {
            return Err(AppError::Validation {
                field: "to_warehouse_id".to_string(),
                message: "Source and destination warehouses must be different".to_string(),
                message_es: "Las bodegas de origen y destino deben ser diferentes".to_string(),
            });
        }

        let mut tx = self.env.begin(ctx).await?;
        let presentation = stock::active_presentation(tx.as_mut(), input.presentation_id).await?;
        active_warehouse(tx.as_mut(), input.from_warehouse_id).await?;
        active_warehouse(tx.as_mut(), input.to_warehouse_id).await?;

        // Both rows locked in warehouse id order
        let ordered: BTreeSet<Uuid> = [input.from_warehouse_id, input.to_warehouse_id]
            .into_iter()
            .collect();
        for warehouse_id in &ordered {
            stock::get_or_create(tx.as_mut(), input.presentation_id, *warehouse_id).await?;
        }

        let source = tx
            .find_stock(input.presentation_id, input.from_warehouse_id)
            .await?
            .map(|s| s.quantity)
            .unwrap_or(Decimal::ZERO);
        stock::ensure_available(&presentation, source, input.quantity)?;

        stock::adjust(
            tx.as_mut(),
            input.presentation_id,
            input.from_warehouse_id,
            -input.quantity,
        )
        .await?;
        stock::adjust(
            tx.as_mut(),
            input.presentation_id,
            input.to_warehouse_id,
            input.quantity,
        )
        .await?;

        let movement = NewMovement::new(
            input.presentation_id,
            input.from_warehouse_id,
            MovementType::TransferOut,
            -input.quantity,
        )
        .destination(input.to_warehouse_id)
        .reason(input.reason)
        .record(tx.as_mut(), ctx.actor_id)
        .await?;
        tx.commit().await?;

        self.env
            .audit
            .emit(ctx.audit_event(
                AuditAction::Transfer,
                "Inventory",
                Some(movement.id),
                Some(json!({
                    "from": input.from_warehouse_id,
                    "to": input.to_warehouse_id,
                    "quantity": input.quantity.to_string(),
                })),
            ))
            .await;

        Ok(movement)
    }

    /// Stock on hand; zero when the row was never created
    pub async fn stock_level(
        &self,
        ctx: &RequestContext,
        presentation_id: Uuid,
        warehouse_id: Uuid,
    ) -> AppResult<StockLevel> {
        let mut tx = self.env.begin(ctx).await?;
        tx.find_presentation(presentation_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Presentation".to_string()))?;

        let quantity = tx
            .find_stock(presentation_id, warehouse_id)
            .await?
            .map(|s| s.quantity)
            .unwrap_or(Decimal::ZERO);

        Ok(StockLevel {
            presentation_id,
            warehouse_id,
            quantity,
        })
    }

    /// Movement history of one presentation in one warehouse, newest first
    pub async fn list_movements(
        &self,
        ctx: &RequestContext,
        presentation_id: Uuid,
        warehouse_id: Uuid,
    ) -> AppResult<Vec<InventoryMovement>> {
        let mut tx = self.env.begin(ctx).await?;
        let mut movements = tx.list_movements(presentation_id, warehouse_id).await?;
        movements.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(movements)
    }

    /// Deactivate an empty, non-default warehouse
    pub async fn deactivate_warehouse(
        &self,
        ctx: &RequestContext,
        warehouse_id: Uuid,
    ) -> AppResult<Warehouse> {
        let mut tx = self.env.begin(ctx).await?;
        let mut warehouse = active_warehouse(tx.as_mut(), warehouse_id).await?;

        if warehouse.is_default {
            return Err(AppError::invalid_state(
                "The default warehouse cannot be removed",
                "No puedes eliminar la bodega por defecto",
            ));
        }
        if tx.warehouse_holds_stock(warehouse_id).await? {
            return Err(AppError::invalid_state(
                "The warehouse has stock. Transfer it before removing.",
                "La bodega tiene stock. Transfiere el inventario antes de eliminar.",
            ));
        }

        tx.set_warehouse_active(warehouse_id, false).await?;
        tx.commit().await?;
        warehouse.is_active = false;

        self.env
            .audit
            .emit(ctx.audit_event(AuditAction::Deactivate, "Warehouse", Some(warehouse.id), None))
            .await;

        Ok(warehouse)
    }
}

/// Resolve a warehouse that must exist and be active
pub(crate) async fn active_warehouse(
    tx: &mut dyn LedgerTx,
    warehouse_id: Uuid,
) -> AppResult<Warehouse> {
    tx.find_warehouse(warehouse_id)
        .await?
        .filter(|w| w.is_active)
        .ok_or_else(|| AppError::NotFound("Warehouse".to_string()))
}
