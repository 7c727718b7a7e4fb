//! Tenant-scoped unit of work over the ledger tables
//!
//! Every mutating protocol runs inside one [`LedgerTx`]. A transaction is
//! bound to a [`TenantScope`] when it begins and none of its methods accept a
//! business id, so a caller cannot read or write another tenant's rows.
//!
//! `lock_*` methods take an exclusive per-row lock that is held until the
//! transaction commits or is dropped. Check-then-update sequences on stock,
//! balances and sessions must read through these methods.
//!
//! Implementations:
//! - [`PgLedgerStore`]: PostgreSQL, `SELECT ... FOR UPDATE`
//! - [`MemoryLedgerStore`]: in-process store for tests and local runs

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use shared::{
    CashMovement, CashRegister, CashSession, Client, ClientPurchase, CreditMovement,
    InventoryMovement, Lot, PaymentMethod, Presentation, PresentationStock, Sale, SaleItem,
    SalePayment, SessionPaymentBreakdown, Supplier, SupplierPayment, SupplierPurchase,
    SupplierPurchaseItem, TimeWindow, Warehouse, WasteRecord,
};
use uuid::Uuid;

use crate::error::AppResult;

pub mod memory;
pub mod postgres;

pub use memory::{MemoryLedgerStore, TenantBook};
pub use postgres::PgLedgerStore;

/// The business whose rows a unit of work may touch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TenantScope {
    business_id: Uuid,
}

impl TenantScope {
    pub fn new(business_id: Uuid) -> Self {
        Self { business_id }
    }

    pub fn business_id(&self) -> Uuid {
        self.business_id
    }
}

/// Opens tenant-scoped units of work
#[async_trait]
pub trait LedgerStore: Send + Sync {
    async fn begin(&self, scope: TenantScope) -> AppResult<Box<dyn LedgerTx>>;
}

/// One atomic unit of work. Dropping it without [`LedgerTx::commit`] rolls back.
#[async_trait]
pub trait LedgerTx: Send {
    fn scope(&self) -> TenantScope;

    async fn commit(&mut self) -> AppResult<()>;

    // Catalog
    async fn find_presentation(&mut self, id: Uuid) -> AppResult<Option<Presentation>>;
    async fn find_warehouse(&mut self, id: Uuid) -> AppResult<Option<Warehouse>>;
    async fn warehouse_holds_stock(&mut self, id: Uuid) -> AppResult<bool>;
    async fn set_warehouse_active(&mut self, id: Uuid, is_active: bool) -> AppResult<()>;

    // Stock counters and movement history

    /// Get-or-create the stock row (quantity 0 on first access) and lock it
    async fn lock_stock(
        &mut self,
        presentation_id: Uuid,
        warehouse_id: Uuid,
    ) -> AppResult<PresentationStock>;
    async fn find_stock(
        &mut self,
        presentation_id: Uuid,
        warehouse_id: Uuid,
    ) -> AppResult<Option<PresentationStock>>;
    async fn set_stock_quantity(
        &mut self,
        presentation_id: Uuid,
        warehouse_id: Uuid,
        quantity: Decimal,
    ) -> AppResult<()>;
    async fn insert_movement(&mut self, movement: &InventoryMovement) -> AppResult<()>;
    async fn list_movements(
        &mut self,
        presentation_id: Uuid,
        warehouse_id: Uuid,
    ) -> AppResult<Vec<InventoryMovement>>;

    // Lots
    async fn insert_lot(&mut self, lot: &Lot) -> AppResult<()>;
    async fn lock_lot(&mut self, id: Uuid) -> AppResult<Option<Lot>>;
    /// Most recently arrived lot with a known cost
    async fn latest_costed_lot(
        &mut self,
        presentation_id: Uuid,
        warehouse_id: Uuid,
    ) -> AppResult<Option<Lot>>;
    async fn update_lot(&mut self, id: Uuid, remaining: Decimal, is_active: bool) -> AppResult<()>;
    /// Active lots with stock left whose expiry is at or before `now`, oldest expiry first
    async fn lock_expired_lots(&mut self, now: DateTime<Utc>, limit: i64) -> AppResult<Vec<Lot>>;

    // Payment methods
    async fn list_payment_methods(&mut self) -> AppResult<Vec<PaymentMethod>>;
    async fn find_payment_method(&mut self, id: Uuid) -> AppResult<Option<PaymentMethod>>;
    async fn insert_payment_method(&mut self, method: &PaymentMethod) -> AppResult<()>;
    async fn set_payment_method_active(&mut self, id: Uuid, is_active: bool) -> AppResult<()>;

    // Client receivables
    async fn lock_client(&mut self, id: Uuid) -> AppResult<Option<Client>>;
    async fn lock_active_clients(&mut self) -> AppResult<Vec<Client>>;
    async fn save_client(&mut self, client: &Client) -> AppResult<()>;
    async fn insert_credit_movement(&mut self, movement: &CreditMovement) -> AppResult<()>;
    async fn list_credit_movements(&mut self, client_id: Uuid) -> AppResult<Vec<CreditMovement>>;
    async fn insert_client_purchase(&mut self, purchase: &ClientPurchase) -> AppResult<()>;

    // Supplier payables
    async fn lock_supplier(&mut self, id: Uuid) -> AppResult<Option<Supplier>>;
    async fn save_supplier(&mut self, supplier: &Supplier) -> AppResult<()>;
    async fn insert_purchase(&mut self, purchase: &SupplierPurchase) -> AppResult<()>;
    async fn insert_purchase_item(&mut self, item: &SupplierPurchaseItem) -> AppResult<()>;
    async fn lock_purchase(&mut self, id: Uuid) -> AppResult<Option<SupplierPurchase>>;
    async fn save_purchase_settlement(&mut self, purchase: &SupplierPurchase) -> AppResult<()>;
    async fn list_purchases(&mut self, supplier_id: Uuid) -> AppResult<Vec<SupplierPurchase>>;
    async fn insert_supplier_payment(&mut self, payment: &SupplierPayment) -> AppResult<()>;
    async fn list_supplier_payments(
        &mut self,
        supplier_id: Uuid,
    ) -> AppResult<Vec<SupplierPayment>>;

    // Sales
    async fn insert_sale(&mut self, sale: &Sale) -> AppResult<()>;
    async fn insert_sale_item(&mut self, item: &SaleItem) -> AppResult<()>;
    async fn insert_sale_payment(&mut self, payment: &SalePayment) -> AppResult<()>;
    async fn find_sale(&mut self, id: Uuid) -> AppResult<Option<Sale>>;
    async fn lock_sale(&mut self, id: Uuid) -> AppResult<Option<Sale>>;
    async fn sale_items(&mut self, sale_id: Uuid) -> AppResult<Vec<SaleItem>>;
    async fn sale_payments(&mut self, sale_id: Uuid) -> AppResult<Vec<SalePayment>>;
    async fn save_sale_cancellation(&mut self, sale: &Sale) -> AppResult<()>;
    async fn completed_sales(&mut self, window: TimeWindow) -> AppResult<Vec<Sale>>;
    /// Payment rows of the completed sales inside `window`
    async fn completed_sale_payments(&mut self, window: TimeWindow)
        -> AppResult<Vec<SalePayment>>;

    // Cash registers and sessions
    async fn insert_register(&mut self, register: &CashRegister) -> AppResult<()>;
    async fn lock_register(&mut self, id: Uuid) -> AppResult<Option<CashRegister>>;
    async fn set_register_active(&mut self, id: Uuid, is_active: bool) -> AppResult<()>;
    async fn find_open_session(&mut self, register_id: Uuid) -> AppResult<Option<CashSession>>;
    async fn lock_open_session(&mut self, register_id: Uuid) -> AppResult<Option<CashSession>>;
    async fn insert_session(&mut self, session: &CashSession) -> AppResult<()>;
    async fn save_session_close(&mut self, session: &CashSession) -> AppResult<()>;
    async fn insert_cash_movement(&mut self, movement: &CashMovement) -> AppResult<()>;
    async fn session_movements(&mut self, session_id: Uuid) -> AppResult<Vec<CashMovement>>;
    async fn insert_breakdown(&mut self, row: &SessionPaymentBreakdown) -> AppResult<()>;

    // Waste
    async fn insert_waste(&mut self, record: &WasteRecord) -> AppResult<()>;
}
