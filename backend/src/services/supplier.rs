//! Supplier payables: purchases that bring stock in and payments that settle them

use std::collections::BTreeSet;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::json;
use shared::{
    ledger::{
        ensure_payment_within_balance, ensure_within_credit_limit, purchase_settlement,
        recompute_status, settle_purchase,
    },
    validate_amount, validate_has_items, validate_non_negative, validate_quantity, AuditAction,
    Lot, MovementType, Supplier, SupplierPayment, SupplierPurchase, SupplierPurchaseDetail,
    SupplierPurchaseItem,
};
use uuid::Uuid;
use validator::Validate;

use super::inventory::active_warehouse;
use super::stock::{self, reference, NewMovement};
use super::{LedgerEnv, RequestContext};
use crate::error::{AppError, AppResult};
use crate::store::LedgerTx;

/// Supplier payables service
#[derive(Clone)]
pub struct SupplierService {
    env: LedgerEnv,
}

/// One line of a supplier purchase
#[derive(Debug, Clone, Deserialize)]
pub struct PurchaseItemInput {
    pub presentation_id: Uuid,
    pub quantity: Decimal,
    pub cost_per_unit: Decimal,
    pub lot_number: Option<String>,
    pub expiry_date: Option<DateTime<Utc>>,
}

/// Input for registering a purchase
#[derive(Debug, Deserialize, Validate)]
pub struct CreatePurchaseInput {
    pub warehouse_id: Uuid,
    pub items: Vec<PurchaseItemInput>,
    #[serde(default)]
    pub discount: Decimal,
    #[serde(default)]
    pub amount_paid: Decimal,
    #[validate(length(max = 500))]
    pub notes: Option<String>,
    pub expected_payment_date: Option<NaiveDate>,
}

/// Input for paying a supplier
#[derive(Debug, Deserialize, Validate)]
pub struct SupplierPaymentInput {
    pub amount: Decimal,
    pub purchase_id: Option<Uuid>,
    #[validate(length(max = 255))]
    pub description: Option<String>,
}

impl SupplierService {
    pub fn new(env: LedgerEnv) -> Self {
        Self { env }
    }

    /// Get an active supplier
    pub async fn get_supplier(
        &self,
        ctx: &RequestContext,
        supplier_id: Uuid,
    ) -> AppResult<Supplier> {
        let mut tx = self.env.begin(ctx).await?;
        lock_active_supplier(tx.as_mut(), supplier_id).await
    }

    /// Register a purchase: lots, stock entries and the amount left owing
    pub async fn create_purchase(
        &self,
        ctx: &RequestContext,
        supplier_id: Uuid,
        input: CreatePurchaseInput,
    ) -> AppResult<SupplierPurchaseDetail> {
        validate_purchase_input(&input)?;

        let now = Utc::now();
        let mut tx = self.env.begin(ctx).await?;
        let mut supplier = lock_active_supplier(tx.as_mut(), supplier_id).await?;
        active_warehouse(tx.as_mut(), input.warehouse_id).await?;

        let presentation_ids: BTreeSet<Uuid> =
            input.items.iter().map(|i| i.presentation_id).collect();
        for presentation_id in &presentation_ids {
            stock::active_presentation(tx.as_mut(), *presentation_id).await?;
            stock::get_or_create(tx.as_mut(), *presentation_id, input.warehouse_id).await?;
        }

        let settlement = purchase_settlement(
            input.items.iter().map(|i| i.quantity * i.cost_per_unit),
            input.discount,
            input.amount_paid,
        );
        if settlement.amount_credit > Decimal::ZERO {
            ensure_within_credit_limit(
                supplier.credit_limit,
                supplier.current_balance,
                settlement.amount_credit,
            )?;
        }

        let purchase = SupplierPurchase {
            id: Uuid::new_v4(),
            supplier_id,
            warehouse_id: input.warehouse_id,
            subtotal: settlement.subtotal,
            discount: input.discount,
            total: settlement.total,
            amount_paid: input.amount_paid,
            amount_credit: settlement.amount_credit,
            payment_status: settlement.payment_status,
            notes: input.notes.clone(),
            expected_payment_date: input.expected_payment_date,
            created_by: ctx.actor_id,
            created_at: now,
        };
        tx.insert_purchase(&purchase).await?;

        let mut items = Vec::with_capacity(input.items.len());
        for line in &input.items {
            let lot = Lot {
                id: Uuid::new_v4(),
                presentation_id: line.presentation_id,
                warehouse_id: input.warehouse_id,
                lot_number: line.lot_number.clone(),
                quantity: line.quantity,
                remaining: line.quantity,
                cost_per_unit: Some(line.cost_per_unit),
                arrival_date: now,
                expiry_date: line.expiry_date,
                is_active: true,
                supplier_purchase_id: Some(purchase.id),
            };
            tx.insert_lot(&lot).await?;

            let item = SupplierPurchaseItem {
                id: Uuid::new_v4(),
                purchase_id: purchase.id,
                presentation_id: line.presentation_id,
                quantity: line.quantity,
                cost_per_unit: line.cost_per_unit,
                subtotal: line.quantity * line.cost_per_unit,
                lot_id: lot.id,
            };
            tx.insert_purchase_item(&item).await?;

            stock::adjust(
                tx.as_mut(),
                line.presentation_id,
                input.warehouse_id,
                line.quantity,
            )
            .await?;
            NewMovement::new(
                line.presentation_id,
                input.warehouse_id,
                MovementType::Entry,
                line.quantity,
            )
            .cost(Some(line.cost_per_unit))
            .lot(Some(lot.id))
            .reference(purchase.id, reference::SUPPLIER_PURCHASE)
            .record(tx.as_mut(), ctx.actor_id)
            .await?;

            items.push(item);
        }

        supplier.current_balance += settlement.amount_credit;
        supplier.last_purchase_at = Some(now);
        self.save_refreshed(tx.as_mut(), &mut supplier, now).await?;
        tx.commit().await?;

        tracing::info!(
            "Supplier purchase {} registered: total {}, owed {}",
            purchase.id,
            purchase.total,
            purchase.amount_credit
        );
        self.env
            .audit
            .emit(ctx.audit_event(
                AuditAction::Purchase,
                "Supplier",
                Some(supplier_id),
                Some(json!({
                    "total": purchase.total.to_string(),
                    "purchase_id": purchase.id,
                })),
            ))
            .await;

        Ok(SupplierPurchaseDetail { purchase, items })
    }

    /// Pay down the supplier balance, optionally against one purchase
    pub async fn add_payment(
        &self,
        ctx: &RequestContext,
        supplier_id: Uuid,
        input: SupplierPaymentInput,
    ) -> AppResult<SupplierPayment> {
        input.validate()?;
        validate_amount(input.amount).map_err(|m| AppError::invalid("amount", m))?;

        let now = Utc::now();
        let mut tx = self.env.begin(ctx).await?;
        let mut supplier = lock_active_supplier(tx.as_mut(), supplier_id).await?;
        ensure_payment_within_balance(supplier.current_balance, input.amount)?;

        let purchase = match input.purchase_id {
            Some(purchase_id) => Some(
                tx.lock_purchase(purchase_id)
                    .await?
                    .filter(|p| p.supplier_id == supplier_id)
                    .ok_or_else(|| AppError::NotFound("Supplier purchase".to_string()))?,
            ),
            None => None,
        };

        supplier.current_balance -= input.amount;

        let payment = SupplierPayment {
            id: Uuid::new_v4(),
            supplier_id,
            purchase_id: input.purchase_id,
            amount: input.amount,
            description: input.description,
            created_by: ctx.actor_id,
            created_at: now,
        };
        tx.insert_supplier_payment(&payment).await?;

        if let Some(mut purchase) = purchase {
            if purchase.amount_credit > Decimal::ZERO {
                let (paid, owed, status) =
                    settle_purchase(purchase.amount_paid, purchase.amount_credit, input.amount);
                purchase.amount_paid = paid;
                purchase.amount_credit = owed;
                purchase.payment_status = status;
                tx.save_purchase_settlement(&purchase).await?;
            }
        }

        self.save_refreshed(tx.as_mut(), &mut supplier, now).await?;
        tx.commit().await?;

        self.env
            .audit
            .emit(ctx.audit_event(
                AuditAction::Payment,
                "Supplier",
                Some(supplier_id),
                Some(json!({ "amount": payment.amount.to_string() })),
            ))
            .await;

        Ok(payment)
    }

    /// Purchases from a supplier, newest first
    pub async fn list_purchases(
        &self,
        ctx: &RequestContext,
        supplier_id: Uuid,
    ) -> AppResult<Vec<SupplierPurchase>> {
        let mut tx = self.env.begin(ctx).await?;
        lock_active_supplier(tx.as_mut(), supplier_id).await?;

        let mut purchases = tx.list_purchases(supplier_id).await?;
        purchases.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(purchases)
    }

    /// Payments made to a supplier, newest first
    pub async fn list_payments(
        &self,
        ctx: &RequestContext,
        supplier_id: Uuid,
    ) -> AppResult<Vec<SupplierPayment>> {
        let mut tx = self.env.begin(ctx).await?;
        lock_active_supplier(tx.as_mut(), supplier_id).await?;

        let mut payments = tx.list_supplier_payments(supplier_id).await?;
        payments.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(payments)
    }

    /// Deactivate a supplier that is owed nothing
    pub async fn deactivate_supplier(
        &self,
        ctx: &RequestContext,
        supplier_id: Uuid,
    ) -> AppResult<Supplier> {
        let mut tx = self.env.begin(ctx).await?;
        let mut supplier = lock_active_supplier(tx.as_mut(), supplier_id).await?;

        if supplier.current_balance > Decimal::ZERO {
            return Err(AppError::invalid_state(
                format!(
                    "Supplier has a pending balance of {}. Settle it before deactivating.",
                    supplier.current_balance
                ),
                format!(
                    "El proveedor tiene una deuda pendiente de {}. Sáldala antes de eliminar.",
                    supplier.current_balance
                ),
            ));
        }

        supplier.is_active = false;
        tx.save_supplier(&supplier).await?;
        tx.commit().await?;

        self.env
            .audit
            .emit(ctx.audit_event(AuditAction::Deactivate, "Supplier", Some(supplier.id), None))
            .await;

        Ok(supplier)
    }

    async fn save_refreshed(
        &self,
        tx: &mut dyn LedgerTx,
        supplier: &mut Supplier,
        now: DateTime<Utc>,
    ) -> AppResult<()> {
        supplier.status = recompute_status(
            supplier.status,
            supplier.current_balance,
            supplier.last_purchase_at,
            supplier.credit_days,
            now,
            self.env.settings.inactive_after_days,
        );
        tx.save_supplier(supplier).await
    }
}

fn validate_purchase_input(input: &CreatePurchaseInput) -> AppResult<()> {
    input.validate()?;
    validate_has_items(&input.items).map_err(|m| AppError::invalid("items", m))?;

    for item in &input.items {
        validate_quantity(item.quantity).map_err(|m| AppError::invalid("quantity", m))?;
        validate_non_negative(item.cost_per_unit)
            .map_err(|m| AppError::invalid("cost_per_unit", m))?;
    }
    validate_non_negative(input.discount).map_err(|m| AppError::invalid("discount", m))?;
    validate_non_negative(input.amount_paid).map_err(|m| AppError::invalid("amount_paid", m))?;

    Ok(())
}

async fn lock_active_supplier(tx: &mut dyn LedgerTx, supplier_id: Uuid) -> AppResult<Supplier> {
    tx.lock_supplier(supplier_id)
        .await?
        .filter(|s| s.is_active)
        .ok_or_else(|| AppError::NotFound("Supplier".to_string()))
}
