//! Shared fixtures for the ledger engine tests
//!
//! A `Shop` is one tenant seeded in a `MemoryLedgerStore` with two
//! warehouses, two presentations and the usual payment methods.

#![allow(dead_code)]

use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use shared::{
    AuditEvent, Client, Lot, PartyStatus, PaymentMethod, Presentation, PresentationStock,
    Supplier, Warehouse,
};
use tendero_backend::config::LedgerConfig;
use tendero_backend::error::{AppError, AppResult};
use tendero_backend::services::{
    AuditRecorder, AuditTrail, LedgerEnv, MemoryAuditRecorder, RequestContext,
};
use tendero_backend::store::{MemoryLedgerStore, TenantBook, TenantScope};
use uuid::Uuid;

// Helper to create Decimal from string
pub fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

/// Recorder that always fails, for best-effort audit checks
pub struct FailingAuditRecorder;

#[async_trait]
impl AuditRecorder for FailingAuditRecorder {
    async fn record(&self, _event: &AuditEvent) -> AppResult<()> {
        Err(AppError::Internal("audit sink unavailable".to_string()))
    }
}

pub struct Shop {
    pub store: MemoryLedgerStore,
    pub audit: MemoryAuditRecorder,
    pub env: LedgerEnv,
    pub scope: TenantScope,
    pub ctx: RequestContext,
    pub warehouse: Uuid,
    pub backroom: Uuid,
    pub rice: Uuid,
    pub oil: Uuid,
    pub cash: Uuid,
    pub card: Uuid,
    pub fiado: Uuid,
}

impl Shop {
    pub async fn new() -> Self {
        let audit = MemoryAuditRecorder::new();
        Self::with_recorder(Arc::new(audit.clone()), audit).await
    }

    /// Shop whose audit recorder always fails
    pub async fn with_failing_audit() -> Self {
        Self::with_recorder(Arc::new(FailingAuditRecorder), MemoryAuditRecorder::new()).await
    }

    async fn with_recorder(recorder: Arc<dyn AuditRecorder>, audit: MemoryAuditRecorder) -> Self {
        let store = MemoryLedgerStore::new();
        let scope = TenantScope::new(Uuid::new_v4());
        let env = LedgerEnv::new(
            Arc::new(store.clone()),
            AuditTrail::new(recorder),
            LedgerConfig::default(),
        );

        let shop = Self {
            ctx: RequestContext::new(scope, Uuid::new_v4()),
            store,
            audit,
            env,
            scope,
            warehouse: Uuid::new_v4(),
            backroom: Uuid::new_v4(),
            rice: Uuid::new_v4(),
            oil: Uuid::new_v4(),
            cash: Uuid::new_v4(),
            card: Uuid::new_v4(),
            fiado: Uuid::new_v4(),
        };

        let (warehouse, backroom) = (shop.warehouse, shop.backroom);
        let (rice, oil) = (shop.rice, shop.oil);
        let (cash, card, fiado) = (shop.cash, shop.card, shop.fiado);
        shop.store
            .seed(scope, move |book| {
                book.warehouses.insert(warehouse, warehouse_row(warehouse, "Tienda", true));
                book.warehouses.insert(backroom, warehouse_row(backroom, "Bodega", false));
                book.presentations.insert(rice, presentation_row(rice, "Arroz", "1kg"));
                book.presentations.insert(oil, presentation_row(oil, "Aceite", "1L"));
                book.payment_methods.insert(cash, method_row(cash, "Efectivo", false, true));
                book.payment_methods.insert(card, method_row(card, "Tarjeta", false, false));
                book.payment_methods.insert(fiado, method_row(fiado, "Fiado", true, true));
            })
            .await;

        shop
    }

    /// Context of another user in the same business
    pub fn other_user(&self) -> RequestContext {
        RequestContext::new(self.scope, Uuid::new_v4())
    }

    pub async fn book(&self) -> TenantBook {
        self.store.snapshot(self.scope).await
    }

    pub async fn stock(&self, presentation_id: Uuid, warehouse_id: Uuid) -> Decimal {
        self.book().await.stock_quantity(presentation_id, warehouse_id)
    }

    pub async fn events(&self) -> Vec<AuditEvent> {
        self.audit.events().await
    }

    pub async fn put_stock(&self, presentation_id: Uuid, warehouse_id: Uuid, quantity: Decimal) {
        self.store
            .seed(self.scope, move |book| {
                book.stock.insert(
                    (presentation_id, warehouse_id),
                    PresentationStock {
                        presentation_id,
                        warehouse_id,
                        quantity,
                        updated_at: Utc::now(),
                    },
                );
            })
            .await;
    }

    pub async fn put_lot(&self, lot: Lot) {
        self.store
            .seed(self.scope, move |book| {
                book.lots.insert(lot.id, lot);
            })
            .await;
    }

    pub async fn add_client(&self, credit_limit: Decimal, balance: Decimal) -> Uuid {
        let id = Uuid::new_v4();
        let client = Client {
            id,
            name: "Doña Rosa".to_string(),
            credit_limit,
            current_balance: balance,
            credit_days: 15,
            status: PartyStatus::Active,
            is_active: true,
            last_purchase_at: None,
        };
        self.store
            .seed(self.scope, move |book| {
                book.clients.insert(id, client);
            })
            .await;
        id
    }

    pub async fn update_client<F>(&self, id: Uuid, f: F)
    where
        F: FnOnce(&mut Client),
    {
        self.store
            .seed(self.scope, move |book| {
                if let Some(client) = book.clients.get_mut(&id) {
                    f(client);
                }
            })
            .await;
    }

    pub async fn client(&self, id: Uuid) -> Client {
        self.book().await.clients[&id].clone()
    }

    pub async fn add_supplier(&self, credit_limit: Decimal) -> Uuid {
        let id = Uuid::new_v4();
        let supplier = Supplier {
            id,
            name: "Distribuidora Central".to_string(),
            credit_limit,
            current_balance: Decimal::ZERO,
            credit_days: 30,
            status: PartyStatus::Active,
            is_active: true,
            last_purchase_at: None,
        };
        self.store
            .seed(self.scope, move |book| {
                book.suppliers.insert(id, supplier);
            })
            .await;
        id
    }

    pub async fn supplier(&self, id: Uuid) -> Supplier {
        self.book().await.suppliers[&id].clone()
    }
}

pub fn lot(
    presentation_id: Uuid,
    warehouse_id: Uuid,
    remaining: Decimal,
    cost_per_unit: Option<Decimal>,
    arrival_date: DateTime<Utc>,
    expiry_date: Option<DateTime<Utc>>,
) -> Lot {
    Lot {
        id: Uuid::new_v4(),
        presentation_id,
        warehouse_id,
        lot_number: None,
        quantity: remaining,
        remaining,
        cost_per_unit,
        arrival_date,
        expiry_date,
        is_active: true,
        supplier_purchase_id: None,
    }
}

fn warehouse_row(id: Uuid, name: &str, is_default: bool) -> Warehouse {
    Warehouse {
        id,
        name: name.to_string(),
        is_default,
        is_active: true,
    }
}

fn presentation_row(id: Uuid, product_name: &str, name: &str) -> Presentation {
    Presentation {
        id,
        product_name: product_name.to_string(),
        name: name.to_string(),
        is_active: true,
    }
}

fn method_row(id: Uuid, name: &str, is_credit: bool, is_default: bool) -> PaymentMethod {
    PaymentMethod {
        id,
        name: name.to_string(),
        description: None,
        is_credit,
        is_default,
        is_active: true,
    }
}
