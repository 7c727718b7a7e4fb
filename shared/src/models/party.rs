//! Credit parties: clients (receivable) and suppliers (payable)

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Derived standing of a client or supplier.
///
/// Everything except `Blocked` is recomputed from balance and purchase
/// recency; `Blocked` is only entered and left by explicit action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "db", derive(sqlx::Type))]
#[cfg_attr(feature = "db", sqlx(type_name = "VARCHAR", rename_all = "SCREAMING_SNAKE_CASE"))]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PartyStatus {
    Active,
    Inactive,
    /// Debt overdue beyond the party's credit days
    Moroso,
    Blocked,
}

impl PartyStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PartyStatus::Active => "ACTIVE",
            PartyStatus::Inactive => "INACTIVE",
            PartyStatus::Moroso => "MOROSO",
            PartyStatus::Blocked => "BLOCKED",
        }
    }
}

impl std::fmt::Display for PartyStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "db", derive(sqlx::FromRow))]
pub struct Client {
    pub id: Uuid,
    pub name: String,
    /// Zero means unlimited
    pub credit_limit: Decimal,
    pub current_balance: Decimal,
    pub credit_days: i32,
    pub status: PartyStatus,
    pub is_active: bool,
    pub last_purchase_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "db", derive(sqlx::Type))]
#[cfg_attr(feature = "db", sqlx(type_name = "VARCHAR", rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum CreditMovementType {
    Charge,
    Payment,
}

impl CreditMovementType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CreditMovementType::Charge => "charge",
            CreditMovementType::Payment => "payment",
        }
    }

    /// Sign applied to the client balance
    pub fn signed(&self, amount: Decimal) -> Decimal {
        match self {
            CreditMovementType::Charge => amount,
            CreditMovementType::Payment => -amount,
        }
    }
}

/// Client ledger entry; balance changes only alongside one of these
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "db", derive(sqlx::FromRow))]
pub struct CreditMovement {
    pub id: Uuid,
    pub client_id: Uuid,
    pub movement_type: CreditMovementType,
    pub amount: Decimal,
    pub description: Option<String>,
    pub sale_id: Option<Uuid>,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

/// Purchase history row shown on the client profile
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "db", derive(sqlx::FromRow))]
pub struct ClientPurchase {
    pub id: Uuid,
    pub client_id: Uuid,
    pub sale_id: Uuid,
    pub total: Decimal,
    /// Payment method names joined by " + "
    pub payment_summary: String,
    pub is_credit: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "db", derive(sqlx::FromRow))]
pub struct Supplier {
    pub id: Uuid,
    pub name: String,
    pub credit_limit: Decimal,
    pub current_balance: Decimal,
    pub credit_days: i32,
    pub status: PartyStatus,
    pub is_active: bool,
    pub last_purchase_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "db", derive(sqlx::Type))]
#[cfg_attr(feature = "db", sqlx(type_name = "VARCHAR", rename_all = "SCREAMING_SNAKE_CASE"))]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PurchasePaymentStatus {
    Pending,
    Paid,
}

/// Goods received from a supplier, possibly on credit
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "db", derive(sqlx::FromRow))]
pub struct SupplierPurchase {
    pub id: Uuid,
    pub supplier_id: Uuid,
    pub warehouse_id: Uuid,
    pub subtotal: Decimal,
    pub discount: Decimal,
    pub total: Decimal,
    pub amount_paid: Decimal,
    /// Still owed to the supplier for this purchase
    pub amount_credit: Decimal,
    pub payment_status: PurchasePaymentStatus,
    pub notes: Option<String>,
    pub expected_payment_date: Option<NaiveDate>,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "db", derive(sqlx::FromRow))]
pub struct SupplierPurchaseItem {
    pub id: Uuid,
    pub purchase_id: Uuid,
    pub presentation_id: Uuid,
    pub quantity: Decimal,
    pub cost_per_unit: Decimal,
    pub subtotal: Decimal,
    pub lot_id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "db", derive(sqlx::FromRow))]
pub struct SupplierPayment {
    pub id: Uuid,
    pub supplier_id: Uuid,
    pub purchase_id: Option<Uuid>,
    pub amount: Decimal,
    pub description: Option<String>,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

/// Purchase header with its lines
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupplierPurchaseDetail {
    #[serde(flatten)]
    pub purchase: SupplierPurchase,
    pub items: Vec<SupplierPurchaseItem>,
}
