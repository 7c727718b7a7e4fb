//! Cash registers, sessions and their reconciliation records

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A named till bound to one warehouse
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "db", derive(sqlx::FromRow))]
pub struct CashRegister {
    pub id: Uuid,
    pub warehouse_id: Uuid,
    pub name: String,
    pub is_active: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "db", derive(sqlx::Type))]
#[cfg_attr(feature = "db", sqlx(type_name = "VARCHAR", rename_all = "SCREAMING_SNAKE_CASE"))]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionStatus {
    Open,
    Closed,
}

/// Operating window of a register between open and close.
///
/// The closing fields are all `None` while the session is open.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "db", derive(sqlx::FromRow))]
pub struct CashSession {
    pub id: Uuid,
    pub register_id: Uuid,
    pub status: SessionStatus,
    pub opened_by: Option<Uuid>,
    pub opened_at: DateTime<Utc>,
    pub opening_amount: Decimal,
    pub opening_notes: Option<String>,
    pub closed_by: Option<Uuid>,
    pub closed_at: Option<DateTime<Utc>>,
    /// Physical count entered by the operator
    pub closing_amount: Option<Decimal>,
    pub expected_amount: Option<Decimal>,
    /// closing - expected; positive is an overage
    pub difference: Option<Decimal>,
    pub total_sales: Option<Decimal>,
    pub total_credit: Option<Decimal>,
    pub total_income: Option<Decimal>,
    pub total_expense: Option<Decimal>,
    pub closing_notes: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "db", derive(sqlx::Type))]
#[cfg_attr(feature = "db", sqlx(type_name = "VARCHAR", rename_all = "SCREAMING_SNAKE_CASE"))]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CashMovementType {
    Income,
    Expense,
}

/// Manual cash in/out recorded during an open session
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "db", derive(sqlx::FromRow))]
pub struct CashMovement {
    pub id: Uuid,
    pub session_id: Uuid,
    pub movement_type: CashMovementType,
    pub amount: Decimal,
    pub description: String,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

/// Per payment method totals snapshotted at close time
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "db", derive(sqlx::FromRow))]
pub struct SessionPaymentBreakdown {
    pub id: Uuid,
    pub session_id: Uuid,
    pub payment_method_id: Uuid,
    pub method_name: String,
    pub is_credit: bool,
    pub total: Decimal,
}

/// Result of closing a session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CashSessionClosure {
    pub session: CashSession,
    pub breakdown: Vec<SessionPaymentBreakdown>,
    pub movements: Vec<CashMovement>,
    pub cash_from_sales: Decimal,
}
