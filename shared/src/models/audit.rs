//! Audit trail events emitted after committed mutations

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditAction {
    Create,
    Cancel,
    Open,
    Close,
    Charge,
    Payment,
    Purchase,
    Entry,
    Adjustment,
    Transfer,
    Waste,
    AutoExpire,
    Block,
    Unblock,
    Deactivate,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::Create => "CREATE",
            AuditAction::Cancel => "CANCEL",
            AuditAction::Open => "OPEN",
            AuditAction::Close => "CLOSE",
            AuditAction::Charge => "CHARGE",
            AuditAction::Payment => "PAYMENT",
            AuditAction::Purchase => "PURCHASE",
            AuditAction::Entry => "ENTRY",
            AuditAction::Adjustment => "ADJUSTMENT",
            AuditAction::Transfer => "TRANSFER",
            AuditAction::Waste => "WASTE",
            AuditAction::AutoExpire => "AUTO_EXPIRE",
            AuditAction::Block => "BLOCK",
            AuditAction::Unblock => "UNBLOCK",
            AuditAction::Deactivate => "DEACTIVATE",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    pub actor_id: Option<Uuid>,
    pub business_id: Option<Uuid>,
    pub action: AuditAction,
    /// e.g. "Sale", "CashSession"
    pub entity_type: String,
    pub entity_id: Option<Uuid>,
    pub details: Option<serde_json::Value>,
    /// Request origin address, when known
    pub origin: Option<String>,
    pub occurred_at: DateTime<Utc>,
}
