//! Inventory models: warehouses, presentations, stock counters, lots and movements

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A physical location holding stock
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "db", derive(sqlx::FromRow))]
pub struct Warehouse {
    pub id: Uuid,
    pub name: String,
    pub is_default: bool,
    pub is_active: bool,
}

/// A sellable packaging variant of a product (e.g. "500ml", "box of 12")
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "db", derive(sqlx::FromRow))]
pub struct Presentation {
    pub id: Uuid,
    pub product_name: String,
    pub name: String,
    pub is_active: bool,
}

impl Presentation {
    /// Human readable label used in error messages ("Rice - 1kg")
    pub fn label(&self) -> String {
        format!("{} - {}", self.product_name, self.name)
    }
}

/// Quantity on hand for one (presentation, warehouse) pair
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "db", derive(sqlx::FromRow))]
pub struct PresentationStock {
    pub presentation_id: Uuid,
    pub warehouse_id: Uuid,
    pub quantity: Decimal,
    pub updated_at: DateTime<Utc>,
}

/// A dated, costed batch of received stock
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "db", derive(sqlx::FromRow))]
pub struct Lot {
    pub id: Uuid,
    pub presentation_id: Uuid,
    pub warehouse_id: Uuid,
    pub lot_number: Option<String>,
    /// Quantity as received
    pub quantity: Decimal,
    /// Never above `quantity`, never below zero
    pub remaining: Decimal,
    pub cost_per_unit: Option<Decimal>,
    pub arrival_date: DateTime<Utc>,
    pub expiry_date: Option<DateTime<Utc>>,
    pub is_active: bool,
    pub supplier_purchase_id: Option<Uuid>,
}

impl Lot {
    /// Whether the expiry sweep should write this lot off at `now`
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.is_active
            && self.remaining > Decimal::ZERO
            && self.expiry_date.map(|expiry| expiry <= now).unwrap_or(false)
    }
}

/// Kind of inventory movement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "db", derive(sqlx::Type))]
#[cfg_attr(feature = "db", sqlx(type_name = "VARCHAR", rename_all = "SCREAMING_SNAKE_CASE"))]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MovementType {
    Entry,
    Sale,
    Adjustment,
    TransferIn,
    TransferOut,
    Waste,
}

impl MovementType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MovementType::Entry => "ENTRY",
            MovementType::Sale => "SALE",
            MovementType::Adjustment => "ADJUSTMENT",
            MovementType::TransferIn => "TRANSFER_IN",
            MovementType::TransferOut => "TRANSFER_OUT",
            MovementType::Waste => "WASTE",
        }
    }
}

/// Append-only history record backing a stock mutation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "db", derive(sqlx::FromRow))]
pub struct InventoryMovement {
    pub id: Uuid,
    pub presentation_id: Uuid,
    pub warehouse_id: Uuid,
    pub movement_type: MovementType,
    /// Signed: negative for outbound movements
    pub quantity: Decimal,
    pub cost_per_unit: Option<Decimal>,
    pub lot_id: Option<Uuid>,
    pub reason: Option<String>,
    pub destination_warehouse_id: Option<Uuid>,
    pub reference_id: Option<Uuid>,
    pub reference_type: Option<String>,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}
