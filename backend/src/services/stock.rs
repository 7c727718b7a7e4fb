//! Stock counters and the movement history behind them
//!
//! The counter per (presentation, warehouse) is the source of truth for what
//! is on the shelf. Movements document every change and are written in the
//! same unit of work as the counter update.

use chrono::Utc;
use rust_decimal::Decimal;
use shared::{InventoryMovement, MovementType, Presentation, PresentationStock};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::store::LedgerTx;

/// Values stored in `InventoryMovement::reference_type`
pub mod reference {
    pub const SALE: &str = "sale";
    pub const SALE_CANCEL: &str = "sale_cancel";
    pub const SUPPLIER_PURCHASE: &str = "supplier_purchase";
    pub const WASTE: &str = "waste";
}

/// Load the stock row, creating it at zero on first reference, and lock it
pub async fn get_or_create(
    tx: &mut dyn LedgerTx,
    presentation_id: Uuid,
    warehouse_id: Uuid,
) -> AppResult<PresentationStock> {
    tx.lock_stock(presentation_id, warehouse_id).await
}

/// Apply a signed delta and return the new quantity.
///
/// Does not reject negative results; callers check availability first.
pub async fn adjust(
    tx: &mut dyn LedgerTx,
    presentation_id: Uuid,
    warehouse_id: Uuid,
    delta: Decimal,
) -> AppResult<Decimal> {
    let stock = get_or_create(tx, presentation_id, warehouse_id).await?;
    let quantity = stock.quantity + delta;
    tx.set_stock_quantity(presentation_id, warehouse_id, quantity)
        .await?;
    Ok(quantity)
}

/// Fail with a quantified shortfall when `requested` exceeds `available`
pub fn ensure_available(
    presentation: &Presentation,
    available: Decimal,
    requested: Decimal,
) -> AppResult<()> {
    if requested > available {
        return Err(AppError::InsufficientStock {
            item: presentation.label(),
            available,
            requested,
        });
    }
    Ok(())
}

/// Resolve a presentation that must exist and be sellable
pub async fn active_presentation(
    tx: &mut dyn LedgerTx,
    presentation_id: Uuid,
) -> AppResult<Presentation> {
    tx.find_presentation(presentation_id)
        .await?
        .filter(|p| p.is_active)
        .ok_or_else(|| AppError::NotFound(format!("Presentation {}", presentation_id)))
}

/// A movement about to be appended
#[derive(Debug, Clone)]
pub struct NewMovement {
    presentation_id: Uuid,
    warehouse_id: Uuid,
    movement_type: MovementType,
    quantity: Decimal,
    cost_per_unit: Option<Decimal>,
    lot_id: Option<Uuid>,
    reason: Option<String>,
    destination_warehouse_id: Option<Uuid>,
    reference: Option<(Uuid, &'static str)>,
}

impl NewMovement {
    /// `quantity` is signed: negative for stock leaving the warehouse
    pub fn new(
        presentation_id: Uuid,
        warehouse_id: Uuid,
        movement_type: MovementType,
        quantity: Decimal,
    ) -> Self {
        Self {
            presentation_id,
            warehouse_id,
            movement_type,
            quantity,
            cost_per_unit: None,
            lot_id: None,
            reason: None,
            destination_warehouse_id: None,
            reference: None,
        }
    }

    pub fn cost(mut self, cost_per_unit: Option<Decimal>) -> Self {
        self.cost_per_unit = cost_per_unit;
        self
    }

    pub fn lot(mut self, lot_id: Option<Uuid>) -> Self {
        self.lot_id = lot_id;
        self
    }

    pub fn reason(mut self, reason: Option<String>) -> Self {
        self.reason = reason;
        self
    }

    pub fn destination(mut self, warehouse_id: Uuid) -> Self {
        self.destination_warehouse_id = Some(warehouse_id);
        self
    }

    pub fn reference(mut self, id: Uuid, kind: &'static str) -> Self {
        self.reference = Some((id, kind));
        self
    }

    /// Append the movement inside `tx`
    pub async fn record(
        self,
        tx: &mut dyn LedgerTx,
        actor_id: Option<Uuid>,
    ) -> AppResult<InventoryMovement> {
        let movement = InventoryMovement {
            id: Uuid::new_v4(),
            presentation_id: self.presentation_id,
            warehouse_id: self.warehouse_id,
            movement_type: self.movement_type,
            quantity: self.quantity,
            cost_per_unit: self.cost_per_unit,
            lot_id: self.lot_id,
            reason: self.reason,
            destination_warehouse_id: self.destination_warehouse_id,
            reference_id: self.reference.map(|(id, _)| id),
            reference_type: self.reference.map(|(_, kind)| kind.to_string()),
            created_by: actor_id,
            created_at: Utc::now(),
        };
        tx.insert_movement(&movement).await?;
        Ok(movement)
    }
}
