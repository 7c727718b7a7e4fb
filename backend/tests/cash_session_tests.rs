//! Cash session engine tests
//!
//! Tests for the register state machine and the close reconciliation:
//! - One OPEN session per register
//! - Expected cash from opening, cash sales and manual movements
//! - Per-method breakdown snapshot

mod common;

use common::{dec, Shop};
use rust_decimal::Decimal;
use shared::{AuditAction, CashMovementType, SessionStatus};
use tendero_backend::error::AppError;
use tendero_backend::services::cash::{
    CashMovementInput, CloseSessionInput, CreateRegisterInput, OpenSessionInput,
};
use tendero_backend::services::sale::{
    CancelSaleInput, CreateSaleInput, SaleItemInput, SalePaymentInput,
};
use tendero_backend::services::{CashSessionService, SaleService};
use uuid::Uuid;

async fn register(shop: &Shop, service: &CashSessionService) -> Uuid {
    service
        .create_register(
            &shop.ctx,
            CreateRegisterInput {
                warehouse_id: shop.warehouse,
                name: "Caja 1".to_string(),
            },
        )
        .await
        .unwrap()
        .id
}

fn open(amount: &str) -> OpenSessionInput {
    OpenSessionInput {
        opening_amount: dec(amount),
        opening_notes: None,
    }
}

fn close(amount: &str) -> CloseSessionInput {
    CloseSessionInput {
        closing_amount: dec(amount),
        closing_notes: None,
    }
}

fn movement(movement_type: CashMovementType, amount: &str) -> CashMovementInput {
    CashMovementInput {
        movement_type,
        amount: dec(amount),
        description: "Compra de bolsas".to_string(),
    }
}

async fn sell(shop: &Shop, payments: Vec<(Uuid, &str)>, client_id: Option<Uuid>) -> Uuid {
    let total: Decimal = payments.iter().map(|(_, a)| dec(a)).sum();
    SaleService::new(shop.env.clone())
        .create_sale(
            &shop.ctx,
            CreateSaleInput {
                warehouse_id: shop.warehouse,
                client_id,
                items: vec![SaleItemInput {
                    presentation_id: shop.rice,
                    quantity: dec("1"),
                    unit_price: total,
                    discount: Decimal::ZERO,
                }],
                payments: payments
                    .into_iter()
                    .map(|(payment_method_id, amount)| SalePaymentInput {
                        payment_method_id,
                        amount: dec(amount),
                    })
                    .collect(),
                discount: Decimal::ZERO,
                notes: None,
            },
        )
        .await
        .unwrap()
        .sale
        .id
}

// ============================================================================
// State machine
// ============================================================================

/// Test that a register holds one open session at a time
#[tokio::test]
async fn test_second_open_fails() {
    let shop = Shop::new().await;
    let service = CashSessionService::new(shop.env.clone());
    let register_id = register(&shop, &service).await;

    let session = service
        .open_session(&shop.ctx, register_id, open("50000"))
        .await
        .unwrap();
    assert_eq!(session.status, SessionStatus::Open);

    let err = service
        .open_session(&shop.ctx, register_id, open("10000"))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidStateTransition { .. }));

    let current = service.current_session(&shop.ctx, register_id).await.unwrap();
    assert_eq!(current.id, session.id);
}

/// Test closing a register with nothing open
#[tokio::test]
async fn test_close_without_open_session_fails() {
    let shop = Shop::new().await;
    let service = CashSessionService::new(shop.env.clone());
    let register_id = register(&shop, &service).await;

    let err = service
        .close_session(&shop.ctx, register_id, close("0"))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidStateTransition { .. }));

    let err = service
        .current_session(&shop.ctx, register_id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}

/// Test that a register can be reopened after closing
#[tokio::test]
async fn test_reopen_after_close() {
    let shop = Shop::new().await;
    let service = CashSessionService::new(shop.env.clone());
    let register_id = register(&shop, &service).await;

    service
        .open_session(&shop.ctx, register_id, open("100"))
        .await
        .unwrap();
    service
        .close_session(&shop.ctx, register_id, close("100"))
        .await
        .unwrap();
    let second = service
        .open_session(&shop.ctx, register_id, open("200"))
        .await
        .unwrap();

    assert_eq!(second.opening_amount, dec("200"));
    assert_eq!(shop.book().await.sessions.len(), 2);
}

/// Test that manual movements need an open session
#[tokio::test]
async fn test_movement_requires_open_session() {
    let shop = Shop::new().await;
    let service = CashSessionService::new(shop.env.clone());
    let register_id = register(&shop, &service).await;

    let err = service
        .add_movement(&shop.ctx, register_id, movement(CashMovementType::Income, "100"))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidStateTransition { .. }));
}

/// Test manual movement validation
#[tokio::test]
async fn test_movement_validation() {
    let shop = Shop::new().await;
    let service = CashSessionService::new(shop.env.clone());
    let register_id = register(&shop, &service).await;
    service
        .open_session(&shop.ctx, register_id, open("0"))
        .await
        .unwrap();

    let err = service
        .add_movement(&shop.ctx, register_id, movement(CashMovementType::Expense, "0"))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation { ref field, .. } if field == "amount"));

    let mut blank = movement(CashMovementType::Expense, "10");
    blank.description = "  ".to_string();
    let err = service
        .add_movement(&shop.ctx, register_id, blank)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation { ref field, .. } if field == "description"));
}

/// Test that a register with an open session cannot be deactivated
#[tokio::test]
async fn test_deactivate_register_with_open_session() {
    let shop = Shop::new().await;
    let service = CashSessionService::new(shop.env.clone());
    let register_id = register(&shop, &service).await;
    service
        .open_session(&shop.ctx, register_id, open("0"))
        .await
        .unwrap();

    let err = service
        .deactivate_register(&shop.ctx, register_id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidStateTransition { .. }));

    service
        .close_session(&shop.ctx, register_id, close("0"))
        .await
        .unwrap();
    let register = service
        .deactivate_register(&shop.ctx, register_id)
        .await
        .unwrap();
    assert!(!register.is_active);
}

// ============================================================================
// Reconciliation
// ============================================================================

/// Test the balanced close: opening 50000, cash sale 20000, expense 5000
#[tokio::test]
async fn test_close_with_zero_difference() {
    let shop = Shop::new().await;
    shop.put_stock(shop.rice, shop.warehouse, dec("10")).await;
    let service = CashSessionService::new(shop.env.clone());
    let register_id = register(&shop, &service).await;

    service
        .open_session(&shop.ctx, register_id, open("50000"))
        .await
        .unwrap();
    sell(&shop, vec![(shop.cash, "20000")], None).await;
    service
        .add_movement(&shop.ctx, register_id, movement(CashMovementType::Expense, "5000"))
        .await
        .unwrap();

    let closure = service
        .close_session(&shop.ctx, register_id, close("65000"))
        .await
        .unwrap();

    assert_eq!(closure.session.status, SessionStatus::Closed);
    assert_eq!(closure.session.expected_amount, Some(dec("65000")));
    assert_eq!(closure.session.difference, Some(Decimal::ZERO));
    assert_eq!(closure.session.total_sales, Some(dec("20000")));
    assert_eq!(closure.session.total_income, Some(Decimal::ZERO));
    assert_eq!(closure.session.total_expense, Some(dec("5000")));
    assert_eq!(closure.cash_from_sales, dec("20000"));
    assert_eq!(closure.movements.len(), 1);
}

/// Test that only the default cash method counts toward the drawer
#[tokio::test]
async fn test_card_and_credit_do_not_reach_drawer() {
    let shop = Shop::new().await;
    shop.put_stock(shop.rice, shop.warehouse, dec("10")).await;
    let client = shop.add_client(Decimal::ZERO, Decimal::ZERO).await;
    let service = CashSessionService::new(shop.env.clone());
    let register_id = register(&shop, &service).await;

    service
        .open_session(&shop.ctx, register_id, open("1000"))
        .await
        .unwrap();
    sell(&shop, vec![(shop.cash, "300"), (shop.card, "700")], None).await;
    sell(&shop, vec![(shop.fiado, "500")], Some(client)).await;
    service
        .add_movement(&shop.ctx, register_id, movement(CashMovementType::Income, "50"))
        .await
        .unwrap();

    let closure = service
        .close_session(&shop.ctx, register_id, close("1300"))
        .await
        .unwrap();

    // 1000 + 300 + 50 - 0
    assert_eq!(closure.session.expected_amount, Some(dec("1350")));
    assert_eq!(closure.session.difference, Some(dec("-50")));
    assert_eq!(closure.session.total_sales, Some(dec("1500")));
    assert_eq!(closure.session.total_credit, Some(dec("500")));

    let names: Vec<_> = closure
        .breakdown
        .iter()
        .map(|b| (b.method_name.as_str(), b.total, b.is_credit))
        .collect();
    assert_eq!(
        names,
        vec![
            ("Efectivo", dec("300"), false),
            ("Fiado", dec("500"), true),
            ("Tarjeta", dec("700"), false),
        ]
    );
    assert_eq!(shop.book().await.breakdowns.len(), 3);
}

/// Test that cancelled sales leave the reconciliation
#[tokio::test]
async fn test_cancelled_sales_are_excluded() {
    let shop = Shop::new().await;
    shop.put_stock(shop.rice, shop.warehouse, dec("10")).await;
    let service = CashSessionService::new(shop.env.clone());
    let register_id = register(&shop, &service).await;

    service
        .open_session(&shop.ctx, register_id, open("0"))
        .await
        .unwrap();
    let kept = sell(&shop, vec![(shop.cash, "400")], None).await;
    let voided = sell(&shop, vec![(shop.cash, "900")], None).await;
    SaleService::new(shop.env.clone())
        .cancel_sale(
            &shop.ctx,
            voided,
            CancelSaleInput {
                reason: "Cobro duplicado".to_string(),
            },
        )
        .await
        .unwrap();

    let closure = service
        .close_session(&shop.ctx, register_id, close("400"))
        .await
        .unwrap();

    assert_ne!(kept, voided);
    assert_eq!(closure.session.total_sales, Some(dec("400")));
    assert_eq!(closure.session.expected_amount, Some(dec("400")));
}

/// Test that sales before the session opened are not counted
#[tokio::test]
async fn test_sales_before_open_are_outside_window() {
    let shop = Shop::new().await;
    shop.put_stock(shop.rice, shop.warehouse, dec("10")).await;
    let service = CashSessionService::new(shop.env.clone());
    let register_id = register(&shop, &service).await;

    sell(&shop, vec![(shop.cash, "999")], None).await;
    tokio::time::sleep(std::time::Duration::from_millis(5)).await;

    service
        .open_session(&shop.ctx, register_id, open("100"))
        .await
        .unwrap();
    let closure = service
        .close_session(&shop.ctx, register_id, close("100"))
        .await
        .unwrap();

    assert_eq!(closure.session.total_sales, Some(Decimal::ZERO));
    assert!(closure.breakdown.is_empty());
    assert_eq!(closure.session.difference, Some(Decimal::ZERO));
}

/// Test that opening and closing are audited
#[tokio::test]
async fn test_session_audit_events() {
    let shop = Shop::new().await;
    let service = CashSessionService::new(shop.env.clone());
    let register_id = register(&shop, &service).await;

    service
        .open_session(&shop.ctx, register_id, open("10"))
        .await
        .unwrap();
    service
        .close_session(&shop.other_user(), register_id, close("8"))
        .await
        .unwrap();

    let actions: Vec<_> = shop.events().await.iter().map(|e| e.action).collect();
    assert_eq!(
        actions,
        vec![AuditAction::Create, AuditAction::Open, AuditAction::Close]
    );
}
