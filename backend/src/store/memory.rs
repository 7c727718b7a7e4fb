//! In-process ledger store
//!
//! All tenants live behind one async mutex. A transaction holds the mutex for
//! its whole lifetime and works on a copy of its tenant's book, which replaces
//! the shared book on commit. This gives the same isolation the PostgreSQL
//! store gets from row locks, at the cost of serializing every writer.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use shared::{
    CashMovement, CashRegister, CashSession, Client, ClientPurchase, CreditMovement,
    InventoryMovement, Lot, PaymentMethod, Presentation, PresentationStock, Sale, SaleItem,
    SalePayment, SaleStatus, SessionPaymentBreakdown, SessionStatus, Supplier, SupplierPayment,
    SupplierPurchase, SupplierPurchaseItem, TimeWindow, Warehouse, WasteRecord,
};
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use super::{LedgerStore, LedgerTx, TenantScope};
use crate::error::{AppError, AppResult};

/// Every table of one tenant
#[derive(Debug, Clone, Default)]
pub struct TenantBook {
    pub warehouses: HashMap<Uuid, Warehouse>,
    pub presentations: HashMap<Uuid, Presentation>,
    pub stock: HashMap<(Uuid, Uuid), PresentationStock>,
    pub lots: HashMap<Uuid, Lot>,
    pub movements: Vec<InventoryMovement>,
    pub payment_methods: HashMap<Uuid, PaymentMethod>,
    pub clients: HashMap<Uuid, Client>,
    pub credit_movements: Vec<CreditMovement>,
    pub client_purchases: Vec<ClientPurchase>,
    pub suppliers: HashMap<Uuid, Supplier>,
    pub purchases: HashMap<Uuid, SupplierPurchase>,
    pub purchase_items: Vec<SupplierPurchaseItem>,
    pub supplier_payments: Vec<SupplierPayment>,
    pub sales: HashMap<Uuid, Sale>,
    pub sale_items: Vec<SaleItem>,
    pub sale_payments: Vec<SalePayment>,
    pub registers: HashMap<Uuid, CashRegister>,
    pub sessions: HashMap<Uuid, CashSession>,
    pub cash_movements: Vec<CashMovement>,
    pub breakdowns: Vec<SessionPaymentBreakdown>,
    pub waste_records: Vec<WasteRecord>,
}

impl TenantBook {
    /// Quantity on hand, zero when the row was never created
    pub fn stock_quantity(&self, presentation_id: Uuid, warehouse_id: Uuid) -> Decimal {
        self.stock
            .get(&(presentation_id, warehouse_id))
            .map(|s| s.quantity)
            .unwrap_or(Decimal::ZERO)
    }

    fn completed_sale_ids(&self, window: TimeWindow) -> Vec<Uuid> {
        self.sales
            .values()
            .filter(|s| s.status == SaleStatus::Completed && window.contains(s.created_at))
            .map(|s| s.id)
            .collect()
    }
}

type Tenants = HashMap<Uuid, TenantBook>;

#[derive(Clone, Default)]
pub struct MemoryLedgerStore {
    tenants: Arc<Mutex<Tenants>>,
}

impl MemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Write catalog rows directly, bypassing the engines
    pub async fn seed<F>(&self, scope: TenantScope, f: F)
    where
        F: FnOnce(&mut TenantBook),
    {
        let mut tenants = self.tenants.lock().await;
        f(tenants.entry(scope.business_id()).or_default());
    }

    /// Copy of the committed state of one tenant
    pub async fn snapshot(&self, scope: TenantScope) -> TenantBook {
        let tenants = self.tenants.lock().await;
        tenants
            .get(&scope.business_id())
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait]
impl LedgerStore for MemoryLedgerStore {
    async fn begin(&self, scope: TenantScope) -> AppResult<Box<dyn LedgerTx>> {
        let guard = self.tenants.clone().lock_owned().await;
        let book = guard
            .get(&scope.business_id())
            .cloned()
            .unwrap_or_default();
        Ok(Box::new(MemoryLedgerTx { scope, guard, book }))
    }
}

struct MemoryLedgerTx {
    scope: TenantScope,
    guard: OwnedMutexGuard<Tenants>,
    book: TenantBook,
}

#[async_trait]
impl LedgerTx for MemoryLedgerTx {
    fn scope(&self) -> TenantScope {
        self.scope
    }

    async fn commit(&mut self) -> AppResult<()> {
        let book = std::mem::take(&mut self.book);
        self.guard.insert(self.scope.business_id(), book);
        Ok(())
    }

    async fn find_presentation(&mut self, id: Uuid) -> AppResult<Option<Presentation>> {
        Ok(self.book.presentations.get(&id).cloned())
    }

    async fn find_warehouse(&mut self, id: Uuid) -> AppResult<Option<Warehouse>> {
        Ok(self.book.warehouses.get(&id).cloned())
    }

    async fn warehouse_holds_stock(&mut self, id: Uuid) -> AppResult<bool> {
        Ok(self
            .book
            .stock
            .values()
            .any(|s| s.warehouse_id == id && s.quantity > Decimal::ZERO))
    }

    async fn set_warehouse_active(&mut self, id: Uuid, is_active: bool) -> AppResult<()> {
        let warehouse = self
            .book
            .warehouses
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound("Warehouse".to_string()))?;
        warehouse.is_active = is_active;
        Ok(())
    }

    async fn lock_stock(
        &mut self,
        presentation_id: Uuid,
        warehouse_id: Uuid,
    ) -> AppResult<PresentationStock> {
        let row = self
            .book
            .stock
            .entry((presentation_id, warehouse_id))
            .or_insert_with(|| PresentationStock {
                presentation_id,
                warehouse_id,
                quantity: Decimal::ZERO,
                updated_at: Utc::now(),
            });
        Ok(row.clone())
    }

    async fn find_stock(
        &mut self,
        presentation_id: Uuid,
        warehouse_id: Uuid,
    ) -> AppResult<Option<PresentationStock>> {
        Ok(self
            .book
            .stock
            .get(&(presentation_id, warehouse_id))
            .cloned())
    }

    async fn set_stock_quantity(
        &mut self,
        presentation_id: Uuid,
        warehouse_id: Uuid,
        quantity: Decimal,
    ) -> AppResult<()> {
        let row = self
            .book
            .stock
            .get_mut(&(presentation_id, warehouse_id))
            .ok_or_else(|| AppError::Internal("Stock row was not locked".to_string()))?;
        row.quantity = quantity;
        row.updated_at = Utc::now();
        Ok(())
    }

    async fn insert_movement(&mut self, movement: &InventoryMovement) -> AppResult<()> {
        self.book.movements.push(movement.clone());
        Ok(())
    }

    async fn list_movements(
        &mut self,
        presentation_id: Uuid,
        warehouse_id: Uuid,
    ) -> AppResult<Vec<InventoryMovement>> {
        Ok(self
            .book
            .movements
            .iter()
            .filter(|m| m.presentation_id == presentation_id && m.warehouse_id == warehouse_id)
            .cloned()
            .collect())
    }

    async fn insert_lot(&mut self, lot: &Lot) -> AppResult<()> {
        self.book.lots.insert(lot.id, lot.clone());
        Ok(())
    }

    async fn lock_lot(&mut self, id: Uuid) -> AppResult<Option<Lot>> {
        Ok(self.book.lots.get(&id).cloned())
    }

    async fn latest_costed_lot(
        &mut self,
        presentation_id: Uuid,
        warehouse_id: Uuid,
    ) -> AppResult<Option<Lot>> {
        Ok(self
            .book
            .lots
            .values()
            .filter(|l| {
                l.presentation_id == presentation_id
                    && l.warehouse_id == warehouse_id
                    && l.cost_per_unit.is_some()
            })
            .max_by_key(|l| l.arrival_date)
            .cloned())
    }

    async fn update_lot(&mut self, id: Uuid, remaining: Decimal, is_active: bool) -> AppResult<()> {
        let lot = self
            .book
            .lots
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound("Lot".to_string()))?;
        lot.remaining = remaining;
        lot.is_active = is_active;
        Ok(())
    }

    async fn lock_expired_lots(&mut self, now: DateTime<Utc>, limit: i64) -> AppResult<Vec<Lot>> {
        let mut lots: Vec<Lot> = self
            .book
            .lots
            .values()
            .filter(|l| l.is_expired_at(now))
            .cloned()
            .collect();
        lots.sort_by(|a, b| a.expiry_date.cmp(&b.expiry_date).then(a.id.cmp(&b.id)));
        lots.truncate(usize::try_from(limit).unwrap_or(0));
        Ok(lots)
    }

    async fn list_payment_methods(&mut self) -> AppResult<Vec<PaymentMethod>> {
        let mut methods: Vec<PaymentMethod> =
            self.book.payment_methods.values().cloned().collect();
        methods.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(methods)
    }

    async fn find_payment_method(&mut self, id: Uuid) -> AppResult<Option<PaymentMethod>> {
        Ok(self.book.payment_methods.get(&id).cloned())
    }

    async fn insert_payment_method(&mut self, method: &PaymentMethod) -> AppResult<()> {
        self.book.payment_methods.insert(method.id, method.clone());
        Ok(())
    }

    async fn set_payment_method_active(&mut self, id: Uuid, is_active: bool) -> AppResult<()> {
        let method = self
            .book
            .payment_methods
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound("Payment method".to_string()))?;
        method.is_active = is_active;
        Ok(())
    }

    async fn lock_client(&mut self, id: Uuid) -> AppResult<Option<Client>> {
        Ok(self.book.clients.get(&id).cloned())
    }

    async fn lock_active_clients(&mut self) -> AppResult<Vec<Client>> {
        let mut clients: Vec<Client> = self
            .book
            .clients
            .values()
            .filter(|c| c.is_active)
            .cloned()
            .collect();
        clients.sort_by_key(|c| c.id);
        Ok(clients)
    }

    async fn save_client(&mut self, client: &Client) -> AppResult<()> {
        self.book.clients.insert(client.id, client.clone());
        Ok(())
    }

    async fn insert_credit_movement(&mut self, movement: &CreditMovement) -> AppResult<()> {
        self.book.credit_movements.push(movement.clone());
        Ok(())
    }

    async fn list_credit_movements(&mut self, client_id: Uuid) -> AppResult<Vec<CreditMovement>> {
        Ok(self
            .book
            .credit_movements
            .iter()
            .filter(|m| m.client_id == client_id)
            .cloned()
            .collect())
    }

    async fn insert_client_purchase(&mut self, purchase: &ClientPurchase) -> AppResult<()> {
        self.book.client_purchases.push(purchase.clone());
        Ok(())
    }

    async fn lock_supplier(&mut self, id: Uuid) -> AppResult<Option<Supplier>> {
        Ok(self.book.suppliers.get(&id).cloned())
    }

    async fn save_supplier(&mut self, supplier: &Supplier) -> AppResult<()> {
        self.book.suppliers.insert(supplier.id, supplier.clone());
        Ok(())
    }

    async fn insert_purchase(&mut self, purchase: &SupplierPurchase) -> AppResult<()> {
        self.book.purchases.insert(purchase.id, purchase.clone());
        Ok(())
    }

    async fn insert_purchase_item(&mut self, item: &SupplierPurchaseItem) -> AppResult<()> {
        self.book.purchase_items.push(item.clone());
        Ok(())
    }

    async fn lock_purchase(&mut self, id: Uuid) -> AppResult<Option<SupplierPurchase>> {
        Ok(self.book.purchases.get(&id).cloned())
    }

    async fn save_purchase_settlement(&mut self, purchase: &SupplierPurchase) -> AppResult<()> {
        self.book.purchases.insert(purchase.id, purchase.clone());
        Ok(())
    }

    async fn list_purchases(&mut self, supplier_id: Uuid) -> AppResult<Vec<SupplierPurchase>> {
        let mut purchases: Vec<SupplierPurchase> = self
            .book
            .purchases
            .values()
            .filter(|p| p.supplier_id == supplier_id)
            .cloned()
            .collect();
        purchases.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(purchases)
    }

    async fn insert_supplier_payment(&mut self, payment: &SupplierPayment) -> AppResult<()> {
        self.book.supplier_payments.push(payment.clone());
        Ok(())
    }

    async fn list_supplier_payments(
        &mut self,
        supplier_id: Uuid,
    ) -> AppResult<Vec<SupplierPayment>> {
        Ok(self
            .book
            .supplier_payments
            .iter()
            .filter(|p| p.supplier_id == supplier_id)
            .cloned()
            .collect())
    }

    async fn insert_sale(&mut self, sale: &Sale) -> AppResult<()> {
        self.book.sales.insert(sale.id, sale.clone());
        Ok(())
    }

    async fn insert_sale_item(&mut self, item: &SaleItem) -> AppResult<()> {
        self.book.sale_items.push(item.clone());
        Ok(())
    }

    async fn insert_sale_payment(&mut self, payment: &SalePayment) -> AppResult<()> {
        self.book.sale_payments.push(payment.clone());
        Ok(())
    }

    async fn find_sale(&mut self, id: Uuid) -> AppResult<Option<Sale>> {
        Ok(self.book.sales.get(&id).cloned())
    }

    async fn lock_sale(&mut self, id: Uuid) -> AppResult<Option<Sale>> {
        Ok(self.book.sales.get(&id).cloned())
    }

    async fn sale_items(&mut self, sale_id: Uuid) -> AppResult<Vec<SaleItem>> {
        Ok(self
            .book
            .sale_items
            .iter()
            .filter(|i| i.sale_id == sale_id)
            .cloned()
            .collect())
    }

    async fn sale_payments(&mut self, sale_id: Uuid) -> AppResult<Vec<SalePayment>> {
        Ok(self
            .book
            .sale_payments
            .iter()
            .filter(|p| p.sale_id == sale_id)
            .cloned()
            .collect())
    }

    async fn save_sale_cancellation(&mut self, sale: &Sale) -> AppResult<()> {
        self.book.sales.insert(sale.id, sale.clone());
        Ok(())
    }

    async fn completed_sales(&mut self, window: TimeWindow) -> AppResult<Vec<Sale>> {
        let ids = self.book.completed_sale_ids(window);
        let mut sales: Vec<Sale> = ids
            .iter()
            .filter_map(|id| self.book.sales.get(id).cloned())
            .collect();
        sales.sort_by_key(|s| s.created_at);
        Ok(sales)
    }

    async fn completed_sale_payments(
        &mut self,
        window: TimeWindow,
    ) -> AppResult<Vec<SalePayment>> {
        let ids = self.book.completed_sale_ids(window);
        Ok(self
            .book
            .sale_payments
            .iter()
            .filter(|p| ids.contains(&p.sale_id))
            .cloned()
            .collect())
    }

    async fn insert_register(&mut self, register: &CashRegister) -> AppResult<()> {
        self.book.registers.insert(register.id, register.clone());
        Ok(())
    }

    async fn lock_register(&mut self, id: Uuid) -> AppResult<Option<CashRegister>> {
        Ok(self.book.registers.get(&id).cloned())
    }

    async fn set_register_active(&mut self, id: Uuid, is_active: bool) -> AppResult<()> {
        let register = self
            .book
            .registers
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound("Cash register".to_string()))?;
        register.is_active = is_active;
        Ok(())
    }

    async fn find_open_session(&mut self, register_id: Uuid) -> AppResult<Option<CashSession>> {
        Ok(self
            .book
            .sessions
            .values()
            .find(|s| s.register_id == register_id && s.status == SessionStatus::Open)
            .cloned())
    }

    async fn lock_open_session(&mut self, register_id: Uuid) -> AppResult<Option<CashSession>> {
        self.find_open_session(register_id).await
    }

    async fn insert_session(&mut self, session: &CashSession) -> AppResult<()> {
        if self.find_open_session(session.register_id).await?.is_some() {
            return Err(AppError::invalid_state(
                "This register already has an open session",
                "Esta caja ya tiene una sesión abierta",
            ));
        }
        self.book.sessions.insert(session.id, session.clone());
        Ok(())
    }

    async fn save_session_close(&mut self, session: &CashSession) -> AppResult<()> {
        self.book.sessions.insert(session.id, session.clone());
        Ok(())
    }

    async fn insert_cash_movement(&mut self, movement: &CashMovement) -> AppResult<()> {
        self.book.cash_movements.push(movement.clone());
        Ok(())
    }

    async fn session_movements(&mut self, session_id: Uuid) -> AppResult<Vec<CashMovement>> {
        Ok(self
            .book
            .cash_movements
            .iter()
            .filter(|m| m.session_id == session_id)
            .cloned()
            .collect())
    }

    async fn insert_breakdown(&mut self, row: &SessionPaymentBreakdown) -> AppResult<()> {
        self.book.breakdowns.push(row.clone());
        Ok(())
    }

    async fn insert_waste(&mut self, record: &WasteRecord) -> AppResult<()> {
        self.book.waste_records.push(record.clone());
        Ok(())
    }
}
