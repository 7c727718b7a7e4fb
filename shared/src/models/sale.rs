//! Point-of-sale models

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle of a sale. `Partial` is reserved and never produced by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "db", derive(sqlx::Type))]
#[cfg_attr(feature = "db", sqlx(type_name = "VARCHAR", rename_all = "SCREAMING_SNAKE_CASE"))]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SaleStatus {
    Completed,
    Cancelled,
    Partial,
}

/// A way of settling a sale (cash, card, store credit...)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "db", derive(sqlx::FromRow))]
pub struct PaymentMethod {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    /// Credit methods defer payment into the client's balance
    pub is_credit: bool,
    /// Seeded per business; cannot be deactivated
    pub is_default: bool,
    pub is_active: bool,
}

impl PaymentMethod {
    /// The till's cash method: default and not credit
    pub fn is_default_cash(&self) -> bool {
        self.is_default && !self.is_credit
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "db", derive(sqlx::FromRow))]
pub struct Sale {
    pub id: Uuid,
    pub warehouse_id: Uuid,
    pub client_id: Option<Uuid>,
    pub subtotal: Decimal,
    pub discount: Decimal,
    pub total: Decimal,
    /// Portion settled with non-credit methods
    pub amount_paid: Decimal,
    /// Portion charged to the client's balance
    pub amount_credit: Decimal,
    pub status: SaleStatus,
    pub notes: Option<String>,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub cancelled_by: Option<Uuid>,
    pub cancel_reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "db", derive(sqlx::FromRow))]
pub struct SaleItem {
    pub id: Uuid,
    pub sale_id: Uuid,
    pub presentation_id: Uuid,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    pub discount: Decimal,
    pub subtotal: Decimal,
}

/// One row per payment method used on a sale.
///
/// `method_name` and `is_credit` are snapshots taken when the sale was
/// created; later edits to the payment method do not rewrite history.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "db", derive(sqlx::FromRow))]
pub struct SalePayment {
    pub id: Uuid,
    pub sale_id: Uuid,
    pub payment_method_id: Uuid,
    pub method_name: String,
    pub amount: Decimal,
    pub is_credit: bool,
}

/// Sale header with its lines and payments
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaleDetail {
    #[serde(flatten)]
    pub sale: Sale,
    pub items: Vec<SaleItem>,
    pub payments: Vec<SalePayment>,
}
