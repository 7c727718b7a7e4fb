//! Sale transaction engine
//!
//! A sale is created complete in one unit of work: header, payments, items,
//! stock decrements, SALE movements and the client's credit charge either all
//! commit together or none do. Cancellation is the inverse and is terminal.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use chrono::Utc;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::json;
use shared::{
    ledger::{
        ensure_payments_match, ensure_within_credit_limit, line_subtotal, payment_summary,
        reverse_credit, sale_totals, split_payments,
    },
    validate_has_items, validate_non_negative, validate_payment_methods, validate_quantity,
    validate_required_text, AuditAction, ClientPurchase, MovementType, PartyStatus,
    PaymentMethod, Sale, SaleDetail, SaleItem, SalePayment, SaleStatus,
};
use uuid::Uuid;
use validator::Validate;

use super::credit::{self, CreditEntry};
use super::inventory::active_warehouse;
use super::stock::{self, reference, NewMovement};
use super::{LedgerEnv, RequestContext};
use crate::error::{AppError, AppResult};
use crate::store::LedgerTx;

/// Sale transaction service
#[derive(Clone)]
pub struct SaleService {
    env: LedgerEnv,
}

/// One line of a new sale
#[derive(Debug, Clone, Deserialize)]
pub struct SaleItemInput {
    pub presentation_id: Uuid,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    #[serde(default)]
    pub discount: Decimal,
}

/// One payment of a new sale
#[derive(Debug, Clone, Deserialize)]
pub struct SalePaymentInput {
    pub payment_method_id: Uuid,
    pub amount: Decimal,
}

/// Input for creating a sale
#[derive(Debug, Deserialize, Validate)]
pub struct CreateSaleInput {
    pub warehouse_id: Uuid,
    pub client_id: Option<Uuid>,
    pub items: Vec<SaleItemInput>,
    pub payments: Vec<SalePaymentInput>,
    #[serde(default)]
    pub discount: Decimal,
    #[validate(length(max = 500))]
    pub notes: Option<String>,
}

/// Input for cancelling a sale
#[derive(Debug, Deserialize, Validate)]
pub struct CancelSaleInput {
    #[validate(length(min = 1, max = 500))]
    pub reason: String,
}

impl SaleService {
    pub fn new(env: LedgerEnv) -> Self {
        Self { env }
    }

    /// Create a completed sale
    pub async fn create_sale(
        &self,
        ctx: &RequestContext,
        input: CreateSaleInput,
    ) -> AppResult<SaleDetail> {
        validate_sale_input(&input)?;

        let mut tx = self.env.begin(ctx).await?;

        // Stock rows are locked in presentation order, then the client row
        reserve_stock(tx.as_mut(), &input).await?;
        let methods = resolve_payment_methods(tx.as_mut(), &input.payments).await?;

        let lines: Vec<Decimal> = input
            .items
            .iter()
            .map(|i| line_subtotal(i.quantity, i.unit_price, i.discount))
            .collect();
        let totals = sale_totals(lines.iter().copied(), input.discount);

        let split = split_payments(
            input
                .payments
                .iter()
                .map(|p| (p.amount, methods[&p.payment_method_id].is_credit)),
        );
        ensure_payments_match(&split, totals.total)?;

        let mut client = match input.client_id {
            Some(client_id) => {
                let client = credit::lock_active_client(tx.as_mut(), client_id).await?;
                if client.status == PartyStatus::Blocked {
                    return Err(AppError::invalid_state(
                        "The client is blocked",
                        "El cliente está bloqueado",
                    ));
                }
                Some(client)
            }
            None => None,
        };
        // Stamped after every row lock is held
        let now = Utc::now();

        if split.has_credit() {
            let Some(client) = client.as_ref() else {
                return Err(AppError::Validation {
                    field: "client_id".to_string(),
                    message: "Credit sales require a registered client".to_string(),
                    message_es: "Las ventas con pago a crédito (fiado) requieren un cliente registrado"
                        .to_string(),
                });
            };
            ensure_within_credit_limit(client.credit_limit, client.current_balance, split.credit)?;
        }

        // All checks passed; writes start here
        let sale = Sale {
            id: Uuid::new_v4(),
            warehouse_id: input.warehouse_id,
            client_id: input.client_id,
            subtotal: totals.subtotal,
            discount: totals.discount,
            total: totals.total,
            amount_paid: split.paid,
            amount_credit: split.credit,
            status: SaleStatus::Completed,
            notes: input.notes.clone(),
            created_by: ctx.actor_id,
            created_at: now,
            cancelled_at: None,
            cancelled_by: None,
            cancel_reason: None,
        };
        tx.insert_sale(&sale).await?;

        let mut payments = Vec::with_capacity(input.payments.len());
        for p in &input.payments {
            let method = &methods[&p.payment_method_id];
            let payment = SalePayment {
                id: Uuid::new_v4(),
                sale_id: sale.id,
                payment_method_id: method.id,
                method_name: method.name.clone(),
                amount: p.amount,
                is_credit: method.is_credit,
            };
            tx.insert_sale_payment(&payment).await?;
            payments.push(payment);
        }

        let mut items = Vec::with_capacity(input.items.len());
        for (line, subtotal) in input.items.iter().zip(lines) {
            let item = SaleItem {
                id: Uuid::new_v4(),
                sale_id: sale.id,
                presentation_id: line.presentation_id,
                quantity: line.quantity,
                unit_price: line.unit_price,
                discount: line.discount,
                subtotal,
            };
            tx.insert_sale_item(&item).await?;

            stock::adjust(
                tx.as_mut(),
                line.presentation_id,
                sale.warehouse_id,
                -line.quantity,
            )
            .await?;
            NewMovement::new(
                line.presentation_id,
                sale.warehouse_id,
                MovementType::Sale,
                -line.quantity,
            )
            .reference(sale.id, reference::SALE)
            .record(tx.as_mut(), ctx.actor_id)
            .await?;

            items.push(item);
        }

        if let Some(client) = client.as_mut() {
            client.last_purchase_at = Some(now);

            let purchase = ClientPurchase {
                id: Uuid::new_v4(),
                client_id: client.id,
                sale_id: sale.id,
                total: sale.total,
                payment_summary: payment_summary(payments.iter().map(|p| p.method_name.as_str())),
                is_credit: split.has_credit(),
                created_at: now,
            };
            tx.insert_client_purchase(&purchase).await?;

            if split.has_credit() {
                credit::post_charge(
                    tx.as_mut(),
                    client,
                    split.credit,
                    CreditEntry {
                        description: Some(format!("Venta #{}", sale.id)),
                        sale_id: Some(sale.id),
                        actor_id: ctx.actor_id,
                        at: now,
                    },
                )
                .await?;
            }

            credit::save_refreshed(
                tx.as_mut(),
                client,
                now,
                self.env.settings.inactive_after_days,
            )
            .await?;
        }

        tx.commit().await?;

        tracing::info!(
            "Sale {} created: total {}, credit {}, {} items",
            sale.id,
            sale.total,
            sale.amount_credit,
            items.len()
        );
        self.env
            .audit
            .emit(ctx.audit_event(
                AuditAction::Create,
                "Sale",
                Some(sale.id),
                Some(json!({
                    "total": sale.total.to_string(),
                    "items": items.len(),
                    "payments": payments
                        .iter()
                        .map(|p| json!({
                            "method_id": p.payment_method_id,
                            "amount": p.amount.to_string(),
                        }))
                        .collect::<Vec<_>>(),
                })),
            ))
            .await;

        Ok(SaleDetail {
            sale,
            items,
            payments,
        })
    }

    /// Get a sale with its items and payments
    pub async fn get_sale(&self, ctx: &RequestContext, sale_id: Uuid) -> AppResult<SaleDetail> {
        let mut tx = self.env.begin(ctx).await?;
        let sale = tx
            .find_sale(sale_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Sale".to_string()))?;
        let items = tx.sale_items(sale_id).await?;
        let payments = tx.sale_payments(sale_id).await?;

        Ok(SaleDetail {
            sale,
            items,
            payments,
        })
    }

    /// Cancel a sale, returning its stock and reversing its credit charge
    pub async fn cancel_sale(
        &self,
        ctx: &RequestContext,
        sale_id: Uuid,
        input: CancelSaleInput,
    ) -> AppResult<SaleDetail> {
        input.validate()?;
        validate_required_text(&input.reason).map_err(|m| AppError::invalid("reason", m))?;

        let now = Utc::now();
        let mut tx = self.env.begin(ctx).await?;

        let mut sale = tx
            .lock_sale(sale_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Sale".to_string()))?;

        if sale.status == SaleStatus::Cancelled {
            return Err(AppError::invalid_state(
                "The sale is already cancelled",
                "La venta ya está cancelada",
            ));
        }

        let items = tx.sale_items(sale.id).await?;
        let payments = tx.sale_payments(sale.id).await?;
        let reason = format!("Cancelación venta #{}", sale.id);

        let locked: BTreeSet<Uuid> = items.iter().map(|i| i.presentation_id).collect();
        for presentation_id in &locked {
            stock::get_or_create(tx.as_mut(), *presentation_id, sale.warehouse_id).await?;
        }

        for item in &items {
            stock::adjust(
                tx.as_mut(),
                item.presentation_id,
                sale.warehouse_id,
                item.quantity,
            )
            .await?;
            NewMovement::new(
                item.presentation_id,
                sale.warehouse_id,
                MovementType::Adjustment,
                item.quantity,
            )
            .reason(Some(reason.clone()))
            .reference(sale.id, reference::SALE_CANCEL)
            .record(tx.as_mut(), ctx.actor_id)
            .await?;
        }

        if let (Some(client_id), true) = (sale.client_id, sale.amount_credit > Decimal::ZERO) {
            let mut client = tx
                .lock_client(client_id)
                .await?
                .ok_or_else(|| AppError::NotFound("Client".to_string()))?;

            // The reversal never takes the balance below zero
            let reduction =
                client.current_balance - reverse_credit(client.current_balance, sale.amount_credit);
            if reduction > Decimal::ZERO {
                credit::post_payment(
                    tx.as_mut(),
                    &mut client,
                    reduction,
                    CreditEntry {
                        description: Some(reason.clone()),
                        sale_id: Some(sale.id),
                        actor_id: ctx.actor_id,
                        at: now,
                    },
                )
                .await?;
            }
            credit::save_refreshed(
                tx.as_mut(),
                &mut client,
                now,
                self.env.settings.inactive_after_days,
            )
            .await?;
        }

        sale.status = SaleStatus::Cancelled;
        sale.cancelled_at = Some(now);
        sale.cancelled_by = ctx.actor_id;
        sale.cancel_reason = Some(input.reason.trim().to_string());
        tx.save_sale_cancellation(&sale).await?;
        tx.commit().await?;

        tracing::info!("Sale {} cancelled", sale.id);
        self.env
            .audit
            .emit(ctx.audit_event(
                AuditAction::Cancel,
                "Sale",
                Some(sale.id),
                Some(json!({ "reason": sale.cancel_reason })),
            ))
            .await;

        Ok(SaleDetail {
            sale,
            items,
            payments,
        })
    }
}

fn validate_sale_input(input: &CreateSaleInput) -> AppResult<()> {
    input.validate()?;
    validate_has_items(&input.items).map_err(|m| AppError::invalid("items", m))?;

    for item in &input.items {
        validate_quantity(item.quantity).map_err(|m| AppError::invalid("quantity", m))?;
        validate_non_negative(item.unit_price).map_err(|m| AppError::invalid("unit_price", m))?;
        validate_non_negative(item.discount).map_err(|m| AppError::invalid("discount", m))?;
    }
    validate_non_negative(input.discount).map_err(|m| AppError::invalid("discount", m))?;

    let method_ids: Vec<Uuid> = input.payments.iter().map(|p| p.payment_method_id).collect();
    validate_payment_methods(&method_ids).map_err(|m| AppError::invalid("payments", m))?;
    for payment in &input.payments {
        validate_non_negative(payment.amount).map_err(|m| AppError::invalid("amount", m))?;
    }

    Ok(())
}

/// Lock every stock row the sale touches and check the aggregate demand
async fn reserve_stock(tx: &mut dyn LedgerTx, input: &CreateSaleInput) -> AppResult<()> {
    active_warehouse(tx, input.warehouse_id).await?;

    let mut requested: BTreeMap<Uuid, Decimal> = BTreeMap::new();
    for item in &input.items {
        *requested.entry(item.presentation_id).or_default() += item.quantity;
    }

    for (presentation_id, quantity) in requested {
        let presentation = stock::active_presentation(tx, presentation_id).await?;
        let row = stock::get_or_create(tx, presentation_id, input.warehouse_id).await?;
        stock::ensure_available(&presentation, row.quantity, quantity)?;
    }

    Ok(())
}

async fn resolve_payment_methods(
    tx: &mut dyn LedgerTx,
    payments: &[SalePaymentInput],
) -> AppResult<HashMap<Uuid, PaymentMethod>> {
    let mut methods = HashMap::new();
    for payment in payments {
        let method = tx
            .find_payment_method(payment.payment_method_id)
            .await?
            .filter(|m| m.is_active)
            .ok_or_else(|| {
                AppError::NotFound(format!("Payment method {}", payment.payment_method_id))
            })?;
        methods.insert(method.id, method);
    }
    Ok(methods)
}
