//! Inventory write-offs

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "db", derive(sqlx::Type))]
#[cfg_attr(feature = "db", sqlx(type_name = "VARCHAR", rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum WasteCause {
    Damaged,
    Expired,
    Theft,
    InventoryError,
    Sample,
}

impl WasteCause {
    pub fn as_str(&self) -> &'static str {
        match self {
            WasteCause::Damaged => "damaged",
            WasteCause::Expired => "expired",
            WasteCause::Theft => "theft",
            WasteCause::InventoryError => "inventory_error",
            WasteCause::Sample => "sample",
        }
    }
}

/// Append-only record of a write-off, always paired with a WASTE movement
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "db", derive(sqlx::FromRow))]
pub struct WasteRecord {
    pub id: Uuid,
    pub presentation_id: Uuid,
    pub warehouse_id: Uuid,
    pub lot_id: Option<Uuid>,
    pub cause: WasteCause,
    /// Quantity as declared, which may exceed what was deducted
    pub quantity: Decimal,
    pub cost_per_unit: Option<Decimal>,
    pub total_cost: Option<Decimal>,
    pub notes: Option<String>,
    pub is_auto: bool,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

/// Outcome of one expired-lot sweep
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExpirySweep {
    pub processed: usize,
    pub total_cost: Decimal,
    pub records: Vec<WasteRecord>,
}
