//! Arithmetic rules of the stock and credit ledgers
//!
//! Everything here is pure decimal arithmetic over already-loaded values.
//! The backend engines call these inside a unit of work, after taking the
//! row locks, so the same rules hold regardless of the store behind them.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{
    CashMovement, CashMovementType, PartyStatus, PurchasePaymentStatus, SalePayment,
};

/// Days without purchases after which a party is considered inactive
pub const DEFAULT_INACTIVE_AFTER_DAYS: i64 = 30;

/// Separator used when summarising the payment methods of a sale
pub const PAYMENT_SUMMARY_SEPARATOR: &str = " + ";

/// Business rule violations detected before any write
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuleViolation {
    #[error("Credit limit exceeded. Available: {available}")]
    CreditLimitExceeded { available: Decimal },

    #[error("Payments total {payments} does not match sale total {total}")]
    PaymentMismatch { payments: Decimal, total: Decimal },

    #[error("Payment of {requested} exceeds outstanding balance {balance}")]
    PaymentExceedsBalance { balance: Decimal, requested: Decimal },
}

// ============================================================================
// Sale totals and payments
// ============================================================================

/// `quantity * unit_price - discount` for one sale line
pub fn line_subtotal(quantity: Decimal, unit_price: Decimal, discount: Decimal) -> Decimal {
    quantity * unit_price - discount
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SaleTotals {
    pub subtotal: Decimal,
    pub discount: Decimal,
    pub total: Decimal,
}

/// Sum line subtotals and apply the sale-level discount
pub fn sale_totals<I>(line_subtotals: I, sale_discount: Decimal) -> SaleTotals
where
    I: IntoIterator<Item = Decimal>,
{
    let subtotal: Decimal = line_subtotals.into_iter().sum();
    SaleTotals {
        subtotal,
        discount: sale_discount,
        total: subtotal - sale_discount,
    }
}

/// Payments partitioned by the credit flag of their method
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PaymentSplit {
    pub paid: Decimal,
    pub credit: Decimal,
}

impl PaymentSplit {
    pub fn total(&self) -> Decimal {
        self.paid + self.credit
    }

    pub fn has_credit(&self) -> bool {
        self.credit > Decimal::ZERO
    }
}

/// Partition `(amount, is_credit)` pairs into paid and credit sums
pub fn split_payments<I>(payments: I) -> PaymentSplit
where
    I: IntoIterator<Item = (Decimal, bool)>,
{
    payments
        .into_iter()
        .fold(PaymentSplit::default(), |mut split, (amount, is_credit)| {
            if is_credit {
                split.credit += amount;
            } else {
                split.paid += amount;
            }
            split
        })
}

/// Exact decimal equality between declared payments and the sale total
pub fn ensure_payments_match(split: &PaymentSplit, total: Decimal) -> Result<(), RuleViolation> {
    let payments = split.total();
    if payments != total {
        return Err(RuleViolation::PaymentMismatch { payments, total });
    }
    Ok(())
}

/// Payment method names joined for the client purchase history
pub fn payment_summary<'a, I>(names: I) -> String
where
    I: IntoIterator<Item = &'a str>,
{
    names
        .into_iter()
        .collect::<Vec<_>>()
        .join(PAYMENT_SUMMARY_SEPARATOR)
}

// ============================================================================
// Credit ledger
// ============================================================================

/// Reject a charge that would push the balance over a positive limit.
///
/// A limit of zero means the party has no limit.
pub fn ensure_within_credit_limit(
    credit_limit: Decimal,
    current_balance: Decimal,
    amount: Decimal,
) -> Result<(), RuleViolation> {
    if credit_limit > Decimal::ZERO && current_balance + amount > credit_limit {
        return Err(RuleViolation::CreditLimitExceeded {
            available: (credit_limit - current_balance).max(Decimal::ZERO),
        });
    }
    Ok(())
}

/// Reject a payment larger than what is owed
pub fn ensure_payment_within_balance(
    current_balance: Decimal,
    amount: Decimal,
) -> Result<(), RuleViolation> {
    if amount > current_balance {
        return Err(RuleViolation::PaymentExceedsBalance {
            balance: current_balance,
            requested: amount,
        });
    }
    Ok(())
}

/// Balance after reversing a credit sale, floored at zero
pub fn reverse_credit(current_balance: Decimal, credit_amount: Decimal) -> Decimal {
    (current_balance - credit_amount).max(Decimal::ZERO)
}

/// Recompute a party's status from balance and purchase recency.
///
/// `Blocked` is returned unchanged.
pub fn recompute_status(
    current: PartyStatus,
    balance: Decimal,
    last_purchase_at: Option<DateTime<Utc>>,
    credit_days: i32,
    now: DateTime<Utc>,
    inactive_after_days: i64,
) -> PartyStatus {
    if current == PartyStatus::Blocked {
        return PartyStatus::Blocked;
    }

    let Some(last_purchase_at) = last_purchase_at else {
        return PartyStatus::Active;
    };

    let days = (now - last_purchase_at).num_days();
    if balance > Decimal::ZERO && days > i64::from(credit_days) {
        PartyStatus::Moroso
    } else if days > inactive_after_days {
        PartyStatus::Inactive
    } else {
        PartyStatus::Active
    }
}

// ============================================================================
// Supplier purchases
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PurchaseSettlement {
    pub subtotal: Decimal,
    pub total: Decimal,
    pub amount_credit: Decimal,
    pub payment_status: PurchasePaymentStatus,
}

/// Split a purchase into what was paid upfront and what is owed
pub fn purchase_settlement<I>(
    line_costs: I,
    discount: Decimal,
    amount_paid: Decimal,
) -> PurchaseSettlement
where
    I: IntoIterator<Item = Decimal>,
{
    let subtotal: Decimal = line_costs.into_iter().sum();
    let total = subtotal - discount;
    let amount_credit = (total - amount_paid).max(Decimal::ZERO);
    PurchaseSettlement {
        subtotal,
        total,
        amount_credit,
        payment_status: payment_status_for(amount_credit),
    }
}

/// Apply a supplier payment to one purchase; returns (amount_paid, amount_credit, status)
pub fn settle_purchase(
    amount_paid: Decimal,
    amount_credit: Decimal,
    payment: Decimal,
) -> (Decimal, Decimal, PurchasePaymentStatus) {
    let remaining = (amount_credit - payment).max(Decimal::ZERO);
    (amount_paid + payment, remaining, payment_status_for(remaining))
}

fn payment_status_for(amount_credit: Decimal) -> PurchasePaymentStatus {
    if amount_credit > Decimal::ZERO {
        PurchasePaymentStatus::Pending
    } else {
        PurchasePaymentStatus::Paid
    }
}

// ============================================================================
// Waste
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WasteDeduction {
    /// What actually leaves the shelf
    pub deducted: Decimal,
    pub stock_after: Decimal,
}

/// Clamp a declared loss to the stock on hand
pub fn waste_deduction(stock: Decimal, quantity: Decimal) -> WasteDeduction {
    let deducted = quantity.min(stock.max(Decimal::ZERO));
    WasteDeduction {
        deducted,
        stock_after: stock - deducted,
    }
}

/// Lot remaining after a write-off, never negative
pub fn lot_remaining_after(remaining: Decimal, quantity: Decimal) -> Decimal {
    (remaining - quantity).max(Decimal::ZERO)
}

/// Cost snapshot of a waste record; valued at the declared quantity
pub fn waste_total_cost(quantity: Decimal, cost_per_unit: Option<Decimal>) -> Option<Decimal> {
    cost_per_unit.map(|cost| quantity * cost)
}

// ============================================================================
// Cash session reconciliation
// ============================================================================

/// Summed sale payments for one method inside a session window
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodTotal {
    pub payment_method_id: Uuid,
    pub method_name: String,
    pub is_credit: bool,
    pub total: Decimal,
}

/// Group sale payments per method, ordered by method name then id
pub fn payment_breakdown<'a, I>(payments: I) -> Vec<MethodTotal>
where
    I: IntoIterator<Item = &'a SalePayment>,
{
    let mut totals: Vec<MethodTotal> = Vec::new();
    for payment in payments {
        match totals
            .iter_mut()
            .find(|t| t.payment_method_id == payment.payment_method_id)
        {
            Some(existing) => existing.total += payment.amount,
            None => totals.push(MethodTotal {
                payment_method_id: payment.payment_method_id,
                method_name: payment.method_name.clone(),
                is_credit: payment.is_credit,
                total: payment.amount,
            }),
        }
    }
    totals.sort_by(|a, b| {
        a.method_name
            .cmp(&b.method_name)
            .then(a.payment_method_id.cmp(&b.payment_method_id))
    });
    totals
}

/// Breakdown total of the default cash method, zero when none is configured
pub fn cash_from_sales(breakdown: &[MethodTotal], default_cash_method: Option<Uuid>) -> Decimal {
    default_cash_method
        .and_then(|id| breakdown.iter().find(|t| t.payment_method_id == id))
        .map(|t| t.total)
        .unwrap_or(Decimal::ZERO)
}

/// Sum manual cash movements; returns (income, expense)
pub fn cash_movement_totals(movements: &[CashMovement]) -> (Decimal, Decimal) {
    movements
        .iter()
        .fold((Decimal::ZERO, Decimal::ZERO), |(income, expense), m| {
            match m.movement_type {
                CashMovementType::Income => (income + m.amount, expense),
                CashMovementType::Expense => (income, expense + m.amount),
            }
        })
}

/// `opening + cash_from_sales + income - expense`
pub fn expected_cash(
    opening_amount: Decimal,
    cash_from_sales: Decimal,
    total_income: Decimal,
    total_expense: Decimal,
) -> Decimal {
    opening_amount + cash_from_sales + total_income - total_expense
}
