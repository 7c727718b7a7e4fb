//! PostgreSQL ledger store
//!
//! Each unit of work is one sqlx transaction. Rows read through `lock_*`
//! carry `FOR UPDATE`, and every statement binds the scope's business id.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use shared::{
    CashMovement, CashRegister, CashSession, Client, ClientPurchase, CreditMovement,
    InventoryMovement, Lot, PaymentMethod, Presentation, PresentationStock, Sale, SaleItem,
    SalePayment, SessionPaymentBreakdown, Supplier, SupplierPayment, SupplierPurchase,
    SupplierPurchaseItem, TimeWindow, Warehouse, WasteRecord,
};
use sqlx::{PgConnection, PgPool, Postgres, Transaction};
use uuid::Uuid;

use super::{LedgerStore, LedgerTx, TenantScope};
use crate::error::{AppError, AppResult};

const LOT_COLUMNS: &str = "id, presentation_id, warehouse_id, lot_number, quantity, remaining, \
     cost_per_unit, arrival_date, expiry_date, is_active, supplier_purchase_id";

const MOVEMENT_COLUMNS: &str = "id, presentation_id, warehouse_id, movement_type, quantity, \
     cost_per_unit, lot_id, reason, destination_warehouse_id, reference_id, reference_type, \
     created_by, created_at";

const PARTY_COLUMNS: &str =
    "id, name, credit_limit, current_balance, credit_days, status, is_active, last_purchase_at";

const PURCHASE_COLUMNS: &str = "id, supplier_id, warehouse_id, subtotal, discount, total, \
     amount_paid, amount_credit, payment_status, notes, expected_payment_date, created_by, \
     created_at";

const SALE_COLUMNS: &str = "id, warehouse_id, client_id, subtotal, discount, total, amount_paid, \
     amount_credit, status, notes, created_by, created_at, cancelled_at, cancelled_by, \
     cancel_reason";

const SESSION_COLUMNS: &str = "id, register_id, status, opened_by, opened_at, opening_amount, \
     opening_notes, closed_by, closed_at, closing_amount, expected_amount, difference, \
     total_sales, total_credit, total_income, total_expense, closing_notes";

/// Ledger store backed by a PostgreSQL pool
#[derive(Clone)]
pub struct PgLedgerStore {
    db: PgPool,
}

impl PgLedgerStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl LedgerStore for PgLedgerStore {
    async fn begin(&self, scope: TenantScope) -> AppResult<Box<dyn LedgerTx>> {
        let tx = self.db.begin().await?;
        Ok(Box::new(PgLedgerTx {
            scope,
            tx: Some(tx),
        }))
    }
}

struct PgLedgerTx {
    scope: TenantScope,
    tx: Option<Transaction<'static, Postgres>>,
}

impl PgLedgerTx {
    fn conn(&mut self) -> AppResult<&mut PgConnection> {
        self.tx
            .as_deref_mut()
            .ok_or_else(|| AppError::Internal("Transaction already committed".to_string()))
    }

    fn business_id(&self) -> Uuid {
        self.scope.business_id()
    }
}

fn ensure_affected(rows: u64, entity: &str) -> AppResult<()> {
    if rows == 0 {
        return Err(AppError::NotFound(entity.to_string()));
    }
    Ok(())
}

#[async_trait]
impl LedgerTx for PgLedgerTx {
    fn scope(&self) -> TenantScope {
        self.scope
    }

    async fn commit(&mut self) -> AppResult<()> {
        let tx = self
            .tx
            .take()
            .ok_or_else(|| AppError::Internal("Transaction already committed".to_string()))?;
        tx.commit().await?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Catalog
    // ------------------------------------------------------------------

    async fn find_presentation(&mut self, id: Uuid) -> AppResult<Option<Presentation>> {
        let business_id = self.business_id();
        let presentation = sqlx::query_as::<_, Presentation>(
            r#"
            SELECT pp.id, p.name AS product_name, pp.name,
                   (pp.is_active AND p.is_active) AS is_active
            FROM product_presentations pp
            JOIN products p ON p.id = pp.product_id
            WHERE pp.id = $1 AND pp.business_id = $2
            "#,
        )
        .bind(id)
        .bind(business_id)
        .fetch_optional(self.conn()?)
        .await?;

        Ok(presentation)
    }

    async fn find_warehouse(&mut self, id: Uuid) -> AppResult<Option<Warehouse>> {
        let business_id = self.business_id();
        let warehouse = sqlx::query_as::<_, Warehouse>(
            "SELECT id, name, is_default, is_active FROM warehouses WHERE id = $1 AND business_id = $2",
        )
        .bind(id)
        .bind(business_id)
        .fetch_optional(self.conn()?)
        .await?;

        Ok(warehouse)
    }

    async fn warehouse_holds_stock(&mut self, id: Uuid) -> AppResult<bool> {
        let business_id = self.business_id();
        let holds = sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM presentation_stock
                WHERE warehouse_id = $1 AND business_id = $2 AND quantity > 0
            )
            "#,
        )
        .bind(id)
        .bind(business_id)
        .fetch_one(self.conn()?)
        .await?;

        Ok(holds)
    }

    async fn set_warehouse_active(&mut self, id: Uuid, is_active: bool) -> AppResult<()> {
        let business_id = self.business_id();
        let result =
            sqlx::query("UPDATE warehouses SET is_active = $1 WHERE id = $2 AND business_id = $3")
                .bind(is_active)
                .bind(id)
                .bind(business_id)
                .execute(self.conn()?)
                .await?;

        ensure_affected(result.rows_affected(), "Warehouse")
    }

    // ------------------------------------------------------------------
    // Stock
    // ------------------------------------------------------------------

    async fn lock_stock(
        &mut self,
        presentation_id: Uuid,
        warehouse_id: Uuid,
    ) -> AppResult<PresentationStock> {
        let business_id = self.business_id();

        sqlx::query(
            r#"
            INSERT INTO presentation_stock (business_id, presentation_id, warehouse_id, quantity)
            VALUES ($1, $2, $3, 0)
            ON CONFLICT (business_id, presentation_id, warehouse_id) DO NOTHING
            "#,
        )
        .bind(business_id)
        .bind(presentation_id)
        .bind(warehouse_id)
        .execute(self.conn()?)
        .await?;

        let stock = sqlx::query_as::<_, PresentationStock>(
            r#"
            SELECT presentation_id, warehouse_id, quantity, updated_at
            FROM presentation_stock
            WHERE business_id = $1 AND presentation_id = $2 AND warehouse_id = $3
            FOR UPDATE
            "#,
        )
        .bind(business_id)
        .bind(presentation_id)
        .bind(warehouse_id)
        .fetch_one(self.conn()?)
        .await?;

        Ok(stock)
    }

    async fn find_stock(
        &mut self,
        presentation_id: Uuid,
        warehouse_id: Uuid,
    ) -> AppResult<Option<PresentationStock>> {
        let business_id = self.business_id();
        let stock = sqlx::query_as::<_, PresentationStock>(
            r#"
            SELECT presentation_id, warehouse_id, quantity, updated_at
            FROM presentation_stock
            WHERE business_id = $1 AND presentation_id = $2 AND warehouse_id = $3
            "#,
        )
        .bind(business_id)
        .bind(presentation_id)
        .bind(warehouse_id)
        .fetch_optional(self.conn()?)
        .await?;

        Ok(stock)
    }

    async fn set_stock_quantity(
        &mut self,
        presentation_id: Uuid,
        warehouse_id: Uuid,
        quantity: Decimal,
    ) -> AppResult<()> {
        let business_id = self.business_id();
        let result = sqlx::query(
            r#"
            UPDATE presentation_stock
            SET quantity = $1, updated_at = NOW()
            WHERE business_id = $2 AND presentation_id = $3 AND warehouse_id = $4
            "#,
        )
        .bind(quantity)
        .bind(business_id)
        .bind(presentation_id)
        .bind(warehouse_id)
        .execute(self.conn()?)
        .await?;

        ensure_affected(result.rows_affected(), "Stock")
    }

    async fn insert_movement(&mut self, m: &InventoryMovement) -> AppResult<()> {
        let business_id = self.business_id();
        sqlx::query(
            r#"
            INSERT INTO inventory_movements (
                id, business_id, presentation_id, warehouse_id, movement_type, quantity,
                cost_per_unit, lot_id, reason, destination_warehouse_id, reference_id,
                reference_type, created_by, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            "#,
        )
        .bind(m.id)
        .bind(business_id)
        .bind(m.presentation_id)
        .bind(m.warehouse_id)
        .bind(m.movement_type)
        .bind(m.quantity)
        .bind(m.cost_per_unit)
        .bind(m.lot_id)
        .bind(&m.reason)
        .bind(m.destination_warehouse_id)
        .bind(m.reference_id)
        .bind(&m.reference_type)
        .bind(m.created_by)
        .bind(m.created_at)
        .execute(self.conn()?)
        .await?;

        Ok(())
    }

    async fn list_movements(
        &mut self,
        presentation_id: Uuid,
        warehouse_id: Uuid,
    ) -> AppResult<Vec<InventoryMovement>> {
        let business_id = self.business_id();
        let sql = format!(
            "SELECT {} FROM inventory_movements \
             WHERE business_id = $1 AND presentation_id = $2 AND warehouse_id = $3 \
             ORDER BY created_at",
            MOVEMENT_COLUMNS
        );
        let movements = sqlx::query_as::<_, InventoryMovement>(&sql)
            .bind(business_id)
            .bind(presentation_id)
            .bind(warehouse_id)
            .fetch_all(self.conn()?)
            .await?;

        Ok(movements)
    }

    // ------------------------------------------------------------------
    // Lots
    // ------------------------------------------------------------------

    async fn insert_lot(&mut self, lot: &Lot) -> AppResult<()> {
        let business_id = self.business_id();
        sqlx::query(
            r#"
            INSERT INTO product_lots (
                id, business_id, presentation_id, warehouse_id, lot_number, quantity, remaining,
                cost_per_unit, arrival_date, expiry_date, is_active, supplier_purchase_id
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(lot.id)
        .bind(business_id)
        .bind(lot.presentation_id)
        .bind(lot.warehouse_id)
        .bind(&lot.lot_number)
        .bind(lot.quantity)
        .bind(lot.remaining)
        .bind(lot.cost_per_unit)
        .bind(lot.arrival_date)
        .bind(lot.expiry_date)
        .bind(lot.is_active)
        .bind(lot.supplier_purchase_id)
        .execute(self.conn()?)
        .await?;

        Ok(())
    }

    async fn lock_lot(&mut self, id: Uuid) -> AppResult<Option<Lot>> {
        let business_id = self.business_id();
        let sql = format!(
            "SELECT {} FROM product_lots WHERE id = $1 AND business_id = $2 FOR UPDATE",
            LOT_COLUMNS
        );
        let lot = sqlx::query_as::<_, Lot>(&sql)
            .bind(id)
            .bind(business_id)
            .fetch_optional(self.conn()?)
            .await?;

        Ok(lot)
    }

    async fn latest_costed_lot(
        &mut self,
        presentation_id: Uuid,
        warehouse_id: Uuid,
    ) -> AppResult<Option<Lot>> {
        let business_id = self.business_id();
        let sql = format!(
            "SELECT {} FROM product_lots \
             WHERE business_id = $1 AND presentation_id = $2 AND warehouse_id = $3 \
               AND cost_per_unit IS NOT NULL \
             ORDER BY arrival_date DESC LIMIT 1",
            LOT_COLUMNS
        );
        let lot = sqlx::query_as::<_, Lot>(&sql)
            .bind(business_id)
            .bind(presentation_id)
            .bind(warehouse_id)
            .fetch_optional(self.conn()?)
            .await?;

        Ok(lot)
    }

    async fn update_lot(&mut self, id: Uuid, remaining: Decimal, is_active: bool) -> AppResult<()> {
        let business_id = self.business_id();
        let result = sqlx::query(
            "UPDATE product_lots SET remaining = $1, is_active = $2 WHERE id = $3 AND business_id = $4",
        )
        .bind(remaining)
        .bind(is_active)
        .bind(id)
        .bind(business_id)
        .execute(self.conn()?)
        .await?;

        ensure_affected(result.rows_affected(), "Lot")
    }

    async fn lock_expired_lots(&mut self, now: DateTime<Utc>, limit: i64) -> AppResult<Vec<Lot>> {
        let business_id = self.business_id();
        let sql = format!(
            "SELECT {} FROM product_lots \
             WHERE business_id = $1 AND is_active = TRUE AND remaining > 0 \
               AND expiry_date IS NOT NULL AND expiry_date <= $2 \
             ORDER BY expiry_date, id \
             LIMIT $3 \
             FOR UPDATE",
            LOT_COLUMNS
        );
        let lots = sqlx::query_as::<_, Lot>(&sql)
            .bind(business_id)
            .bind(now)
            .bind(limit)
            .fetch_all(self.conn()?)
            .await?;

        Ok(lots)
    }

    // ------------------------------------------------------------------
    // Payment methods
    // ------------------------------------------------------------------

    async fn list_payment_methods(&mut self) -> AppResult<Vec<PaymentMethod>> {
        let business_id = self.business_id();
        let methods = sqlx::query_as::<_, PaymentMethod>(
            r#"
            SELECT id, name, description, is_credit, is_default, is_active
            FROM payment_methods
            WHERE business_id = $1
            ORDER BY name
            "#,
        )
        .bind(business_id)
        .fetch_all(self.conn()?)
        .await?;

        Ok(methods)
    }

    async fn find_payment_method(&mut self, id: Uuid) -> AppResult<Option<PaymentMethod>> {
        let business_id = self.business_id();
        let method = sqlx::query_as::<_, PaymentMethod>(
            r#"
            SELECT id, name, description, is_credit, is_default, is_active
            FROM payment_methods
            WHERE id = $1 AND business_id = $2
            "#,
        )
        .bind(id)
        .bind(business_id)
        .fetch_optional(self.conn()?)
        .await?;

        Ok(method)
    }

    async fn insert_payment_method(&mut self, method: &PaymentMethod) -> AppResult<()> {
        let business_id = self.business_id();
        sqlx::query(
            r#"
            INSERT INTO payment_methods (id, business_id, name, description, is_credit, is_default, is_active)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(method.id)
        .bind(business_id)
        .bind(&method.name)
        .bind(&method.description)
        .bind(method.is_credit)
        .bind(method.is_default)
        .bind(method.is_active)
        .execute(self.conn()?)
        .await?;

        Ok(())
    }

    async fn set_payment_method_active(&mut self, id: Uuid, is_active: bool) -> AppResult<()> {
        let business_id = self.business_id();
        let result = sqlx::query(
            "UPDATE payment_methods SET is_active = $1 WHERE id = $2 AND business_id = $3",
        )
        .bind(is_active)
        .bind(id)
        .bind(business_id)
        .execute(self.conn()?)
        .await?;

        ensure_affected(result.rows_affected(), "Payment method")
    }

    // ------------------------------------------------------------------
    // Clients
    // ------------------------------------------------------------------

    async fn lock_client(&mut self, id: Uuid) -> AppResult<Option<Client>> {
        let business_id = self.business_id();
        let sql = format!(
            "SELECT {} FROM clients WHERE id = $1 AND business_id = $2 FOR UPDATE",
            PARTY_COLUMNS
        );
        let client = sqlx::query_as::<_, Client>(&sql)
            .bind(id)
            .bind(business_id)
            .fetch_optional(self.conn()?)
            .await?;

        Ok(client)
    }

    async fn lock_active_clients(&mut self) -> AppResult<Vec<Client>> {
        let business_id = self.business_id();
        let sql = format!(
            "SELECT {} FROM clients WHERE business_id = $1 AND is_active = TRUE ORDER BY id FOR UPDATE",
            PARTY_COLUMNS
        );
        let clients = sqlx::query_as::<_, Client>(&sql)
            .bind(business_id)
            .fetch_all(self.conn()?)
            .await?;

        Ok(clients)
    }

    async fn save_client(&mut self, client: &Client) -> AppResult<()> {
        let business_id = self.business_id();
        let result = sqlx::query(
            r#"
            UPDATE clients
            SET current_balance = $1, status = $2, is_active = $3, last_purchase_at = $4,
                updated_at = NOW()
            WHERE id = $5 AND business_id = $6
            "#,
        )
        .bind(client.current_balance)
        .bind(client.status)
        .bind(client.is_active)
        .bind(client.last_purchase_at)
        .bind(client.id)
        .bind(business_id)
        .execute(self.conn()?)
        .await?;

        ensure_affected(result.rows_affected(), "Client")
    }

    async fn insert_credit_movement(&mut self, m: &CreditMovement) -> AppResult<()> {
        let business_id = self.business_id();
        sqlx::query(
            r#"
            INSERT INTO credit_movements (
                id, business_id, client_id, movement_type, amount, description, sale_id,
                created_by, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(m.id)
        .bind(business_id)
        .bind(m.client_id)
        .bind(m.movement_type)
        .bind(m.amount)
        .bind(&m.description)
        .bind(m.sale_id)
        .bind(m.created_by)
        .bind(m.created_at)
        .execute(self.conn()?)
        .await?;

        Ok(())
    }

    async fn list_credit_movements(&mut self, client_id: Uuid) -> AppResult<Vec<CreditMovement>> {
        let business_id = self.business_id();
        let movements = sqlx::query_as::<_, CreditMovement>(
            r#"
            SELECT id, client_id, movement_type, amount, description, sale_id, created_by, created_at
            FROM credit_movements
            WHERE client_id = $1 AND business_id = $2
            ORDER BY created_at
            "#,
        )
        .bind(client_id)
        .bind(business_id)
        .fetch_all(self.conn()?)
        .await?;

        Ok(movements)
    }

    async fn insert_client_purchase(&mut self, p: &ClientPurchase) -> AppResult<()> {
        let business_id = self.business_id();
        sqlx::query(
            r#"
            INSERT INTO client_purchases (
                id, business_id, client_id, sale_id, total, payment_summary, is_credit, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(p.id)
        .bind(business_id)
        .bind(p.client_id)
        .bind(p.sale_id)
        .bind(p.total)
        .bind(&p.payment_summary)
        .bind(p.is_credit)
        .bind(p.created_at)
        .execute(self.conn()?)
        .await?;

        Ok(())
    }

    // ------------------------------------------------------------------
    // Suppliers
    // ------------------------------------------------------------------

    async fn lock_supplier(&mut self, id: Uuid) -> AppResult<Option<Supplier>> {
        let business_id = self.business_id();
        let sql = format!(
            "SELECT {} FROM suppliers WHERE id = $1 AND business_id = $2 FOR UPDATE",
            PARTY_COLUMNS
        );
        let supplier = sqlx::query_as::<_, Supplier>(&sql)
            .bind(id)
            .bind(business_id)
            .fetch_optional(self.conn()?)
            .await?;

        Ok(supplier)
    }

    async fn save_supplier(&mut self, supplier: &Supplier) -> AppResult<()> {
        let business_id = self.business_id();
        let result = sqlx::query(
            r#"
            UPDATE suppliers
            SET current_balance = $1, status = $2, is_active = $3, last_purchase_at = $4,
                updated_at = NOW()
            WHERE id = $5 AND business_id = $6
            "#,
        )
        .bind(supplier.current_balance)
        .bind(supplier.status)
        .bind(supplier.is_active)
        .bind(supplier.last_purchase_at)
        .bind(supplier.id)
        .bind(business_id)
        .execute(self.conn()?)
        .await?;

        ensure_affected(result.rows_affected(), "Supplier")
    }

    async fn insert_purchase(&mut self, p: &SupplierPurchase) -> AppResult<()> {
        let business_id = self.business_id();
        sqlx::query(
            r#"
            INSERT INTO supplier_purchases (
                id, business_id, supplier_id, warehouse_id, subtotal, discount, total,
                amount_paid, amount_credit, payment_status, notes, expected_payment_date,
                created_by, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            "#,
        )
        .bind(p.id)
        .bind(business_id)
        .bind(p.supplier_id)
        .bind(p.warehouse_id)
        .bind(p.subtotal)
        .bind(p.discount)
        .bind(p.total)
        .bind(p.amount_paid)
        .bind(p.amount_credit)
        .bind(p.payment_status)
        .bind(&p.notes)
        .bind(p.expected_payment_date)
        .bind(p.created_by)
        .bind(p.created_at)
        .execute(self.conn()?)
        .await?;

        Ok(())
    }

    async fn insert_purchase_item(&mut self, item: &SupplierPurchaseItem) -> AppResult<()> {
        let business_id = self.business_id();
        sqlx::query(
            r#"
            INSERT INTO supplier_purchase_items (
                id, business_id, purchase_id, presentation_id, quantity, cost_per_unit, subtotal, lot_id
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(item.id)
        .bind(business_id)
        .bind(item.purchase_id)
        .bind(item.presentation_id)
        .bind(item.quantity)
        .bind(item.cost_per_unit)
        .bind(item.subtotal)
        .bind(item.lot_id)
        .execute(self.conn()?)
        .await?;

        Ok(())
    }

    async fn lock_purchase(&mut self, id: Uuid) -> AppResult<Option<SupplierPurchase>> {
        let business_id = self.business_id();
        let sql = format!(
            "SELECT {} FROM supplier_purchases WHERE id = $1 AND business_id = $2 FOR UPDATE",
            PURCHASE_COLUMNS
        );
        let purchase = sqlx::query_as::<_, SupplierPurchase>(&sql)
            .bind(id)
            .bind(business_id)
            .fetch_optional(self.conn()?)
            .await?;

        Ok(purchase)
    }

    async fn save_purchase_settlement(&mut self, p: &SupplierPurchase) -> AppResult<()> {
        let business_id = self.business_id();
        let result = sqlx::query(
            r#"
            UPDATE supplier_purchases
            SET amount_paid = $1, amount_credit = $2, payment_status = $3
            WHERE id = $4 AND business_id = $5
            "#,
        )
        .bind(p.amount_paid)
        .bind(p.amount_credit)
        .bind(p.payment_status)
        .bind(p.id)
        .bind(business_id)
        .execute(self.conn()?)
        .await?;

        ensure_affected(result.rows_affected(), "Supplier purchase")
    }

    async fn list_purchases(&mut self, supplier_id: Uuid) -> AppResult<Vec<SupplierPurchase>> {
        let business_id = self.business_id();
        let sql = format!(
            "SELECT {} FROM supplier_purchases \
             WHERE supplier_id = $1 AND business_id = $2 ORDER BY created_at DESC",
            PURCHASE_COLUMNS
        );
        let purchases = sqlx::query_as::<_, SupplierPurchase>(&sql)
            .bind(supplier_id)
            .bind(business_id)
            .fetch_all(self.conn()?)
            .await?;

        Ok(purchases)
    }

    async fn insert_supplier_payment(&mut self, p: &SupplierPayment) -> AppResult<()> {
        let business_id = self.business_id();
        sqlx::query(
            r#"
            INSERT INTO supplier_payments (
                id, business_id, supplier_id, purchase_id, amount, description, created_by, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(p.id)
        .bind(business_id)
        .bind(p.supplier_id)
        .bind(p.purchase_id)
        .bind(p.amount)
        .bind(&p.description)
        .bind(p.created_by)
        .bind(p.created_at)
        .execute(self.conn()?)
        .await?;

        Ok(())
    }

    async fn list_supplier_payments(
        &mut self,
        supplier_id: Uuid,
    ) -> AppResult<Vec<SupplierPayment>> {
        let business_id = self.business_id();
        let payments = sqlx::query_as::<_, SupplierPayment>(
            r#"
            SELECT id, supplier_id, purchase_id, amount, description, created_by, created_at
            FROM supplier_payments
            WHERE supplier_id = $1 AND business_id = $2
            ORDER BY created_at
            "#,
        )
        .bind(supplier_id)
        .bind(business_id)
        .fetch_all(self.conn()?)
        .await?;

        Ok(payments)
    }

    // ------------------------------------------------------------------
    // Sales
    // ------------------------------------------------------------------

    async fn insert_sale(&mut self, s: &Sale) -> AppResult<()> {
        let business_id = self.business_id();
        sqlx::query(
            r#"
            INSERT INTO sales (
                id, business_id, warehouse_id, client_id, subtotal, discount, total,
                amount_paid, amount_credit, status, notes, created_by, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            "#,
        )
        .bind(s.id)
        .bind(business_id)
        .bind(s.warehouse_id)
        .bind(s.client_id)
        .bind(s.subtotal)
        .bind(s.discount)
        .bind(s.total)
        .bind(s.amount_paid)
        .bind(s.amount_credit)
        .bind(s.status)
        .bind(&s.notes)
        .bind(s.created_by)
        .bind(s.created_at)
        .execute(self.conn()?)
        .await?;

        Ok(())
    }

    async fn insert_sale_item(&mut self, item: &SaleItem) -> AppResult<()> {
        let business_id = self.business_id();
        sqlx::query(
            r#"
            INSERT INTO sale_items (
                id, business_id, sale_id, presentation_id, quantity, unit_price, discount, subtotal
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(item.id)
        .bind(business_id)
        .bind(item.sale_id)
        .bind(item.presentation_id)
        .bind(item.quantity)
        .bind(item.unit_price)
        .bind(item.discount)
        .bind(item.subtotal)
        .execute(self.conn()?)
        .await?;

        Ok(())
    }

    async fn insert_sale_payment(&mut self, p: &SalePayment) -> AppResult<()> {
        let business_id = self.business_id();
        sqlx::query(
            r#"
            INSERT INTO sale_payments (
                id, business_id, sale_id, payment_method_id, method_name, amount, is_credit
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(p.id)
        .bind(business_id)
        .bind(p.sale_id)
        .bind(p.payment_method_id)
        .bind(&p.method_name)
        .bind(p.amount)
        .bind(p.is_credit)
        .execute(self.conn()?)
        .await?;

        Ok(())
    }

    async fn find_sale(&mut self, id: Uuid) -> AppResult<Option<Sale>> {
        let business_id = self.business_id();
        let sql = format!(
            "SELECT {} FROM sales WHERE id = $1 AND business_id = $2",
            SALE_COLUMNS
        );
        let sale = sqlx::query_as::<_, Sale>(&sql)
            .bind(id)
            .bind(business_id)
            .fetch_optional(self.conn()?)
            .await?;

        Ok(sale)
    }

    async fn lock_sale(&mut self, id: Uuid) -> AppResult<Option<Sale>> {
        let business_id = self.business_id();
        let sql = format!(
            "SELECT {} FROM sales WHERE id = $1 AND business_id = $2 FOR UPDATE",
            SALE_COLUMNS
        );
        let sale = sqlx::query_as::<_, Sale>(&sql)
            .bind(id)
            .bind(business_id)
            .fetch_optional(self.conn()?)
            .await?;

        Ok(sale)
    }

    async fn sale_items(&mut self, sale_id: Uuid) -> AppResult<Vec<SaleItem>> {
        let business_id = self.business_id();
        let items = sqlx::query_as::<_, SaleItem>(
            r#"
            SELECT id, sale_id, presentation_id, quantity, unit_price, discount, subtotal
            FROM sale_items
            WHERE sale_id = $1 AND business_id = $2
            "#,
        )
        .bind(sale_id)
        .bind(business_id)
        .fetch_all(self.conn()?)
        .await?;

        Ok(items)
    }

    async fn sale_payments(&mut self, sale_id: Uuid) -> AppResult<Vec<SalePayment>> {
        let business_id = self.business_id();
        let payments = sqlx::query_as::<_, SalePayment>(
            r#"
            SELECT id, sale_id, payment_method_id, method_name, amount, is_credit
            FROM sale_payments
            WHERE sale_id = $1 AND business_id = $2
            "#,
        )
        .bind(sale_id)
        .bind(business_id)
        .fetch_all(self.conn()?)
        .await?;

        Ok(payments)
    }

    async fn save_sale_cancellation(&mut self, sale: &Sale) -> AppResult<()> {
        let business_id = self.business_id();
        let result = sqlx::query(
            r#"
            UPDATE sales
            SET status = $1, cancelled_at = $2, cancelled_by = $3, cancel_reason = $4
            WHERE id = $5 AND business_id = $6
            "#,
        )
        .bind(sale.status)
        .bind(sale.cancelled_at)
        .bind(sale.cancelled_by)
        .bind(&sale.cancel_reason)
        .bind(sale.id)
        .bind(business_id)
        .execute(self.conn()?)
        .await?;

        ensure_affected(result.rows_affected(), "Sale")
    }

    async fn completed_sales(&mut self, window: TimeWindow) -> AppResult<Vec<Sale>> {
        let business_id = self.business_id();
        let sql = format!(
            "SELECT {} FROM sales \
             WHERE business_id = $1 AND status = 'COMPLETED' \
               AND created_at >= $2 AND created_at <= $3 \
             ORDER BY created_at",
            SALE_COLUMNS
        );
        let sales = sqlx::query_as::<_, Sale>(&sql)
            .bind(business_id)
            .bind(window.start)
            .bind(window.end)
            .fetch_all(self.conn()?)
            .await?;

        Ok(sales)
    }

    async fn completed_sale_payments(
        &mut self,
        window: TimeWindow,
    ) -> AppResult<Vec<SalePayment>> {
        let business_id = self.business_id();
        let payments = sqlx::query_as::<_, SalePayment>(
            r#"
            SELECT sp.id, sp.sale_id, sp.payment_method_id, sp.method_name, sp.amount, sp.is_credit
            FROM sale_payments sp
            JOIN sales s ON s.id = sp.sale_id AND s.business_id = sp.business_id
            WHERE sp.business_id = $1 AND s.status = 'COMPLETED'
              AND s.created_at >= $2 AND s.created_at <= $3
            "#,
        )
        .bind(business_id)
        .bind(window.start)
        .bind(window.end)
        .fetch_all(self.conn()?)
        .await?;

        Ok(payments)
    }

    // ------------------------------------------------------------------
    // Cash registers and sessions
    // ------------------------------------------------------------------

    async fn insert_register(&mut self, r: &CashRegister) -> AppResult<()> {
        let business_id = self.business_id();
        sqlx::query(
            r#"
            INSERT INTO cash_registers (id, business_id, warehouse_id, name, is_active)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(r.id)
        .bind(business_id)
        .bind(r.warehouse_id)
        .bind(&r.name)
        .bind(r.is_active)
        .execute(self.conn()?)
        .await?;

        Ok(())
    }

    async fn lock_register(&mut self, id: Uuid) -> AppResult<Option<CashRegister>> {
        let business_id = self.business_id();
        let register = sqlx::query_as::<_, CashRegister>(
            r#"
            SELECT id, warehouse_id, name, is_active
            FROM cash_registers
            WHERE id = $1 AND business_id = $2
            FOR UPDATE
            "#,
        )
        .bind(id)
        .bind(business_id)
        .fetch_optional(self.conn()?)
        .await?;

        Ok(register)
    }

    async fn set_register_active(&mut self, id: Uuid, is_active: bool) -> AppResult<()> {
        let business_id = self.business_id();
        let result = sqlx::query(
            "UPDATE cash_registers SET is_active = $1 WHERE id = $2 AND business_id = $3",
        )
        .bind(is_active)
        .bind(id)
        .bind(business_id)
        .execute(self.conn()?)
        .await?;

        ensure_affected(result.rows_affected(), "Cash register")
    }

    async fn find_open_session(&mut self, register_id: Uuid) -> AppResult<Option<CashSession>> {
        let business_id = self.business_id();
        let sql = format!(
            "SELECT {} FROM cash_sessions \
             WHERE register_id = $1 AND business_id = $2 AND status = 'OPEN'",
            SESSION_COLUMNS
        );
        let session = sqlx::query_as::<_, CashSession>(&sql)
            .bind(register_id)
            .bind(business_id)
            .fetch_optional(self.conn()?)
            .await?;

        Ok(session)
    }

    async fn lock_open_session(&mut self, register_id: Uuid) -> AppResult<Option<CashSession>> {
        let business_id = self.business_id();
        let sql = format!(
            "SELECT {} FROM cash_sessions \
             WHERE register_id = $1 AND business_id = $2 AND status = 'OPEN' \
             FOR UPDATE",
            SESSION_COLUMNS
        );
        let session = sqlx::query_as::<_, CashSession>(&sql)
            .bind(register_id)
            .bind(business_id)
            .fetch_optional(self.conn()?)
            .await?;

        Ok(session)
    }

    async fn insert_session(&mut self, s: &CashSession) -> AppResult<()> {
        let business_id = self.business_id();
        sqlx::query(
            r#"
            INSERT INTO cash_sessions (
                id, business_id, register_id, status, opened_by, opened_at, opening_amount, opening_notes
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(s.id)
        .bind(business_id)
        .bind(s.register_id)
        .bind(s.status)
        .bind(s.opened_by)
        .bind(s.opened_at)
        .bind(s.opening_amount)
        .bind(&s.opening_notes)
        .execute(self.conn()?)
        .await?;

        Ok(())
    }

    async fn save_session_close(&mut self, s: &CashSession) -> AppResult<()> {
        let business_id = self.business_id();
        let result = sqlx::query(
            r#"
            UPDATE cash_sessions
            SET status = $1, closed_by = $2, closed_at = $3, closing_amount = $4,
                expected_amount = $5, difference = $6, total_sales = $7, total_credit = $8,
                total_income = $9, total_expense = $10, closing_notes = $11
            WHERE id = $12 AND business_id = $13
            "#,
        )
        .bind(s.status)
        .bind(s.closed_by)
        .bind(s.closed_at)
        .bind(s.closing_amount)
        .bind(s.expected_amount)
        .bind(s.difference)
        .bind(s.total_sales)
        .bind(s.total_credit)
        .bind(s.total_income)
        .bind(s.total_expense)
        .bind(&s.closing_notes)
        .bind(s.id)
        .bind(business_id)
        .execute(self.conn()?)
        .await?;

        ensure_affected(result.rows_affected(), "Cash session")
    }

    async fn insert_cash_movement(&mut self, m: &CashMovement) -> AppResult<()> {
        let business_id = self.business_id();
        sqlx::query(
            r#"
            INSERT INTO cash_movements (
                id, business_id, session_id, movement_type, amount, description, created_by, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(m.id)
        .bind(business_id)
        .bind(m.session_id)
        .bind(m.movement_type)
        .bind(m.amount)
        .bind(&m.description)
        .bind(m.created_by)
        .bind(m.created_at)
        .execute(self.conn()?)
        .await?;

        Ok(())
    }

    async fn session_movements(&mut self, session_id: Uuid) -> AppResult<Vec<CashMovement>> {
        let business_id = self.business_id();
        let movements = sqlx::query_as::<_, CashMovement>(
            r#"
            SELECT id, session_id, movement_type, amount, description, created_by, created_at
            FROM cash_movements
            WHERE session_id = $1 AND business_id = $2
            ORDER BY created_at
            "#,
        )
        .bind(session_id)
        .bind(business_id)
        .fetch_all(self.conn()?)
        .await?;

        Ok(movements)
    }

    async fn insert_breakdown(&mut self, row: &SessionPaymentBreakdown) -> AppResult<()> {
        let business_id = self.business_id();
        sqlx::query(
            r#"
            INSERT INTO cash_session_payment_breakdowns (
                id, business_id, session_id, payment_method_id, method_name, is_credit, total
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(row.id)
        .bind(business_id)
        .bind(row.session_id)
        .bind(row.payment_method_id)
        .bind(&row.method_name)
        .bind(row.is_credit)
        .bind(row.total)
        .execute(self.conn()?)
        .await?;

        Ok(())
    }

    // ------------------------------------------------------------------
    // Waste
    // ------------------------------------------------------------------

    async fn insert_waste(&mut self, w: &WasteRecord) -> AppResult<()> {
        let business_id = self.business_id();
        sqlx::query(
            r#"
            INSERT INTO waste_records (
                id, business_id, presentation_id, warehouse_id, lot_id, cause, quantity,
                cost_per_unit, total_cost, notes, is_auto, created_by, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            "#,
        )
        .bind(w.id)
        .bind(business_id)
        .bind(w.presentation_id)
        .bind(w.warehouse_id)
        .bind(w.lot_id)
        .bind(w.cause)
        .bind(w.quantity)
        .bind(w.cost_per_unit)
        .bind(w.total_cost)
        .bind(&w.notes)
        .bind(w.is_auto)
        .bind(w.created_by)
        .bind(w.created_at)
        .execute(self.conn()?)
        .await?;

        Ok(())
    }
}
