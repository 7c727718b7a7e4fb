//! Cash session engine
//!
//! A register holds at most one OPEN session. Closing reconciles the physical
//! count against what the session window says should be in the drawer:
//! opening amount, plus sales paid with the default cash method, plus manual
//! income, minus manual expenses.

use chrono::Utc;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::json;
use shared::{
    ledger::{cash_from_sales, cash_movement_totals, expected_cash, payment_breakdown},
    validate_amount, validate_non_negative, validate_required_text, AuditAction, CashMovement,
    CashMovementType, CashRegister, CashSession, CashSessionClosure, SessionPaymentBreakdown,
    SessionStatus, TimeWindow,
};
use uuid::Uuid;
use validator::Validate;

use super::inventory::active_warehouse;
use super::{LedgerEnv, RequestContext};
use crate::error::{AppError, AppResult};
use crate::store::LedgerTx;

/// Cash register and session service
#[derive(Clone)]
pub struct CashSessionService {
    env: LedgerEnv,
}

/// Input for creating a register
#[derive(Debug, Deserialize, Validate)]
pub struct CreateRegisterInput {
    pub warehouse_id: Uuid,
    #[validate(length(min = 1, max = 100))]
    pub name: String,
}

/// Input for opening a session
#[derive(Debug, Deserialize, Validate)]
pub struct OpenSessionInput {
    pub opening_amount: Decimal,
    #[validate(length(max = 500))]
    pub opening_notes: Option<String>,
}

/// Input for closing a session
#[derive(Debug, Deserialize, Validate)]
pub struct CloseSessionInput {
    /// Physical count of the drawer
    pub closing_amount: Decimal,
    #[validate(length(max = 500))]
    pub closing_notes: Option<String>,
}

/// Input for a manual income or expense
#[derive(Debug, Deserialize, Validate)]
pub struct CashMovementInput {
    pub movement_type: CashMovementType,
    pub amount: Decimal,
    #[validate(length(min = 1, max = 255))]
    pub description: String,
}

impl CashSessionService {
    pub fn new(env: LedgerEnv) -> Self {
        Self { env }
    }

    /// Create a register bound to a warehouse
    pub async fn create_register(
        &self,
        ctx: &RequestContext,
        input: CreateRegisterInput,
    ) -> AppResult<CashRegister> {
        input.validate()?;
        validate_required_text(&input.name).map_err(|m| AppError::invalid("name", m))?;

        let mut tx = self.env.begin(ctx).await?;
        active_warehouse(tx.as_mut(), input.warehouse_id).await?;

        let register = CashRegister {
            id: Uuid::new_v4(),
            warehouse_id: input.warehouse_id,
            name: input.name.trim().to_string(),
            is_active: true,
        };
        tx.insert_register(&register).await?;
        tx.commit().await?;

        self.env
            .audit
            .emit(ctx.audit_event(AuditAction::Create, "CashRegister", Some(register.id), None))
            .await;

        Ok(register)
    }

    /// Deactivate a register with no open session
    pub async fn deactivate_register(
        &self,
        ctx: &RequestContext,
        register_id: Uuid,
    ) -> AppResult<CashRegister> {
        let mut tx = self.env.begin(ctx).await?;
        let mut register = lock_active_register(tx.as_mut(), register_id).await?;

        if tx.find_open_session(register_id).await?.is_some() {
            return Err(AppError::invalid_state(
                "A register with an open session cannot be removed",
                "No puedes eliminar una caja con sesión abierta",
            ));
        }

        tx.set_register_active(register_id, false).await?;
        tx.commit().await?;
        register.is_active = false;

        self.env
            .audit
            .emit(ctx.audit_event(AuditAction::Deactivate, "CashRegister", Some(register.id), None))
            .await;

        Ok(register)
    }

    /// Open a session on a register that has none open
    pub async fn open_session(
        &self,
        ctx: &RequestContext,
        register_id: Uuid,
        input: OpenSessionInput,
    ) -> AppResult<CashSession> {
        input.validate()?;
        validate_non_negative(input.opening_amount)
            .map_err(|m| AppError::invalid("opening_amount", m))?;

        let mut tx = self.env.begin(ctx).await?;
        lock_active_register(tx.as_mut(), register_id).await?;

        if tx.find_open_session(register_id).await?.is_some() {
            return Err(AppError::invalid_state(
                "This register already has an open session",
                "Esta caja ya tiene una sesión abierta",
            ));
        }

        let session = CashSession {
            id: Uuid::new_v4(),
            register_id,
            status: SessionStatus::Open,
            opened_by: ctx.actor_id,
            opened_at: Utc::now(),
            opening_amount: input.opening_amount,
            opening_notes: input.opening_notes,
            closed_by: None,
            closed_at: None,
            closing_amount: None,
            expected_amount: None,
            difference: None,
            total_sales: None,
            total_credit: None,
            total_income: None,
            total_expense: None,
            closing_notes: None,
        };
        tx.insert_session(&session).await?;
        tx.commit().await?;

        tracing::info!(
            "Cash session {} opened on register {} with {}",
            session.id,
            register_id,
            session.opening_amount
        );
        self.env
            .audit
            .emit(ctx.audit_event(
                AuditAction::Open,
                "CashSession",
                Some(session.id),
                Some(json!({ "opening_amount": session.opening_amount.to_string() })),
            ))
            .await;

        Ok(session)
    }

    /// The register's open session
    pub async fn current_session(
        &self,
        ctx: &RequestContext,
        register_id: Uuid,
    ) -> AppResult<CashSession> {
        let mut tx = self.env.begin(ctx).await?;
        lock_active_register(tx.as_mut(), register_id).await?;

        tx.find_open_session(register_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Open cash session".to_string()))
    }

    /// Record a manual income or expense in the open session
    pub async fn add_movement(
        &self,
        ctx: &RequestContext,
        register_id: Uuid,
        input: CashMovementInput,
    ) -> AppResult<CashMovement> {
        input.validate()?;
        validate_amount(input.amount).map_err(|m| AppError::invalid("amount", m))?;
        validate_required_text(&input.description)
            .map_err(|m| AppError::invalid("description", m))?;

        let mut tx = self.env.begin(ctx).await?;
        lock_active_register(tx.as_mut(), register_id).await?;

        let session = tx.lock_open_session(register_id).await?.ok_or_else(|| {
            AppError::invalid_state(
                "This register has no open session. Open it first.",
                "No hay sesión abierta en esta caja. Abre la caja primero.",
            )
        })?;

        let movement = CashMovement {
            id: Uuid::new_v4(),
            session_id: session.id,
            movement_type: input.movement_type,
            amount: input.amount,
            description: input.description.trim().to_string(),
            created_by: ctx.actor_id,
            created_at: Utc::now(),
        };
        tx.insert_cash_movement(&movement).await?;
        tx.commit().await?;

        self.env
            .audit
            .emit(ctx.audit_event(
                AuditAction::Create,
                "CashMovement",
                Some(movement.id),
                Some(json!({
                    "session_id": session.id,
                    "amount": movement.amount.to_string(),
                })),
            ))
            .await;

        Ok(movement)
    }

    /// Close the open session and reconcile the drawer
    pub async fn close_session(
        &self,
        ctx: &RequestContext,
        register_id: Uuid,
        input: CloseSessionInput,
    ) -> AppResult<CashSessionClosure> {
        input.validate()?;
        validate_non_negative(input.closing_amount)
            .map_err(|m| AppError::invalid("closing_amount", m))?;

        let now = Utc::now();
        let mut tx = self.env.begin(ctx).await?;
        lock_active_register(tx.as_mut(), register_id).await?;

        let mut session = tx.lock_open_session(register_id).await?.ok_or_else(|| {
            AppError::invalid_state(
                "This register has no open session",
                "Esta caja no tiene una sesión abierta",
            )
        })?;

        let window = TimeWindow::new(session.opened_at, now);
        let sales = tx.completed_sales(window).await?;
        let total_sales: Decimal = sales.iter().map(|s| s.total).sum();
        let total_credit: Decimal = sales.iter().map(|s| s.amount_credit).sum();

        let sale_payments = tx.completed_sale_payments(window).await?;
        let totals = payment_breakdown(&sale_payments);

        let mut breakdown = Vec::with_capacity(totals.len());
        for t in &totals {
            let row = SessionPaymentBreakdown {
                id: Uuid::new_v4(),
                session_id: session.id,
                payment_method_id: t.payment_method_id,
                method_name: t.method_name.clone(),
                is_credit: t.is_credit,
                total: t.total,
            };
            tx.insert_breakdown(&row).await?;
            breakdown.push(row);
        }

        let movements = tx.session_movements(session.id).await?;
        let (total_income, total_expense) = cash_movement_totals(&movements);

        let default_cash = tx
            .list_payment_methods()
            .await?
            .into_iter()
            .find(|m| m.is_default_cash())
            .map(|m| m.id);
        let from_sales = cash_from_sales(&totals, default_cash);

        let expected = expected_cash(session.opening_amount, from_sales, total_income, total_expense);
        let difference = input.closing_amount - expected;

        session.status = SessionStatus::Closed;
        session.closed_by = ctx.actor_id;
        session.closed_at = Some(now);
        session.closing_amount = Some(input.closing_amount);
        session.expected_amount = Some(expected);
        session.difference = Some(difference);
        session.total_sales = Some(total_sales);
        session.total_credit = Some(total_credit);
        session.total_income = Some(total_income);
        session.total_expense = Some(total_expense);
        session.closing_notes = input.closing_notes;
        tx.save_session_close(&session).await?;
        tx.commit().await?;

        if difference != Decimal::ZERO {
            tracing::warn!(
                "Cash session {} closed with difference {} (expected {}, counted {})",
                session.id,
                difference,
                expected,
                input.closing_amount
            );
        } else {
            tracing::info!("Cash session {} closed, expected {}", session.id, expected);
        }
        self.env
            .audit
            .emit(ctx.audit_event(
                AuditAction::Close,
                "CashSession",
                Some(session.id),
                Some(json!({
                    "closing_amount": input.closing_amount.to_string(),
                    "expected_amount": expected.to_string(),
                    "difference": difference.to_string(),
                })),
            ))
            .await;

        Ok(CashSessionClosure {
            session,
            breakdown,
            movements,
            cash_from_sales: from_sales,
        })
    }
}

async fn lock_active_register(
    tx: &mut dyn LedgerTx,
    register_id: Uuid,
) -> AppResult<CashRegister> {
    tx.lock_register(register_id)
        .await?
        .filter(|r| r.is_active)
        .ok_or_else(|| AppError::NotFound("Cash register".to_string()))
}
