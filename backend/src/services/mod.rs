//! Ledger engines for the Tendero backend
//!
//! Every engine runs its protocol inside one [`LedgerTx`](crate::store::LedgerTx)
//! and emits its audit event only after the commit succeeded.

pub mod audit;
pub mod cash;
pub mod client;
pub mod credit;
pub mod inventory;
pub mod payment_method;
pub mod sale;
pub mod stock;
pub mod supplier;
pub mod waste;

use std::sync::Arc;

use chrono::Utc;
use shared::{AuditAction, AuditEvent};
use uuid::Uuid;

use crate::config::LedgerConfig;
use crate::error::AppResult;
use crate::store::{LedgerStore, LedgerTx, TenantScope};

pub use audit::{
    AuditRecorder, AuditTrail, MemoryAuditRecorder, PgAuditRecorder, TracingAuditRecorder,
};
pub use cash::CashSessionService;
pub use client::ClientService;
pub use inventory::InventoryService;
pub use payment_method::PaymentMethodService;
pub use sale::SaleService;
pub use supplier::SupplierService;
pub use waste::WasteService;

/// Who is acting, for which business, and from where
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub scope: TenantScope,
    pub actor_id: Option<Uuid>,
    pub origin: Option<String>,
}

impl RequestContext {
    pub fn new(scope: TenantScope, actor_id: Uuid) -> Self {
        Self {
            scope,
            actor_id: Some(actor_id),
            origin: None,
        }
    }

    pub fn with_origin(mut self, origin: Option<String>) -> Self {
        self.origin = origin;
        self
    }

    /// Audit event stamped with this context
    pub fn audit_event(
        &self,
        action: AuditAction,
        entity_type: &str,
        entity_id: Option<Uuid>,
        details: Option<serde_json::Value>,
    ) -> AuditEvent {
        AuditEvent {
            actor_id: self.actor_id,
            business_id: Some(self.scope.business_id()),
            action,
            entity_type: entity_type.to_string(),
            entity_id,
            details,
            origin: self.origin.clone(),
            occurred_at: Utc::now(),
        }
    }
}

/// Collaborators shared by every engine
#[derive(Clone)]
pub struct LedgerEnv {
    pub store: Arc<dyn LedgerStore>,
    pub audit: AuditTrail,
    pub settings: LedgerConfig,
}

impl LedgerEnv {
    pub fn new(store: Arc<dyn LedgerStore>, audit: AuditTrail, settings: LedgerConfig) -> Self {
        Self {
            store,
            audit,
            settings,
        }
    }

    /// Open a unit of work for the caller's business
    pub async fn begin(&self, ctx: &RequestContext) -> AppResult<Box<dyn LedgerTx>> {
        self.store.begin(ctx.scope).await
    }
}
