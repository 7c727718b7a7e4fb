//! Supplier payables tests
//!
//! Tests for purchases and payments:
//! - A purchase brings stock in through lots and ENTRY movements
//! - The unpaid part of a purchase lands on the supplier balance
//! - Payments settle the balance and, optionally, one purchase

mod common;

use common::{dec, Shop};
use rust_decimal::Decimal;
use shared::{AuditAction, MovementType, PurchasePaymentStatus};
use tendero_backend::error::AppError;
use tendero_backend::services::supplier::{
    CreatePurchaseInput, PurchaseItemInput, SupplierPaymentInput,
};
use tendero_backend::services::SupplierService;
use uuid::Uuid;

fn line(presentation_id: Uuid, quantity: &str, cost: &str) -> PurchaseItemInput {
    PurchaseItemInput {
        presentation_id,
        quantity: dec(quantity),
        cost_per_unit: dec(cost),
        lot_number: Some("L-001".to_string()),
        expiry_date: None,
    }
}

fn purchase(warehouse_id: Uuid, items: Vec<PurchaseItemInput>, paid: &str) -> CreatePurchaseInput {
    CreatePurchaseInput {
        warehouse_id,
        items,
        discount: Decimal::ZERO,
        amount_paid: dec(paid),
        notes: None,
        expected_payment_date: None,
    }
}

fn pay(amount: &str, purchase_id: Option<Uuid>) -> SupplierPaymentInput {
    SupplierPaymentInput {
        amount: dec(amount),
        purchase_id,
        description: None,
    }
}

// ============================================================================
// Purchases
// ============================================================================

/// Test that a purchase adds stock, lots and costed ENTRY movements
#[tokio::test]
async fn test_purchase_brings_stock_in() {
    let shop = Shop::new().await;
    shop.put_stock(shop.rice, shop.warehouse, dec("2")).await;
    let supplier_id = shop.add_supplier(Decimal::ZERO).await;
    let service = SupplierService::new(shop.env.clone());

    let detail = service
        .create_purchase(
            &shop.ctx,
            supplier_id,
            purchase(
                shop.warehouse,
                vec![line(shop.rice, "10", "2500"), line(shop.oil, "4", "6000")],
                "49000",
            ),
        )
        .await
        .unwrap();

    assert_eq!(detail.items.len(), 2);
    assert_eq!(detail.purchase.subtotal, dec("49000"));
    assert_eq!(detail.purchase.amount_credit, Decimal::ZERO);
    assert_eq!(detail.purchase.payment_status, PurchasePaymentStatus::Paid);

    assert_eq!(shop.stock(shop.rice, shop.warehouse).await, dec("12"));
    assert_eq!(shop.stock(shop.oil, shop.warehouse).await, dec("4"));

    let book = shop.book().await;
    assert_eq!(book.lots.len(), 2);
    for item in &detail.items {
        let lot = &book.lots[&item.lot_id];
        assert_eq!(lot.remaining, item.quantity);
        assert_eq!(lot.cost_per_unit, Some(item.cost_per_unit));
        assert_eq!(lot.supplier_purchase_id, Some(detail.purchase.id));
        assert_eq!(lot.lot_number.as_deref(), Some("L-001"));
    }

    let entries: Vec<_> = book
        .movements
        .iter()
        .filter(|m| m.movement_type == MovementType::Entry)
        .collect();
    assert_eq!(entries.len(), 2);
    assert!(entries
        .iter()
        .all(|m| m.reference_id == Some(detail.purchase.id)
            && m.reference_type.as_deref() == Some("supplier_purchase")
            && m.lot_id.is_some()
            && m.cost_per_unit.is_some()));

    // Paid in full, nothing owed
    let supplier = shop.supplier(supplier_id).await;
    assert_eq!(supplier.current_balance, Decimal::ZERO);
    assert!(supplier.last_purchase_at.is_some());
}

/// Test that the unpaid part of a purchase is owed to the supplier
#[tokio::test]
async fn test_credit_purchase_raises_balance() {
    let shop = Shop::new().await;
    let supplier_id = shop.add_supplier(Decimal::ZERO).await;
    let service = SupplierService::new(shop.env.clone());

    let mut input = purchase(shop.warehouse, vec![line(shop.rice, "10", "100")], "300");
    input.discount = dec("200");
    let detail = service
        .create_purchase(&shop.ctx, supplier_id, input)
        .await
        .unwrap();

    // 1000 - 200 discount - 300 paid
    assert_eq!(detail.purchase.total, dec("800"));
    assert_eq!(detail.purchase.amount_credit, dec("500"));
    assert_eq!(detail.purchase.payment_status, PurchasePaymentStatus::Pending);
    assert_eq!(shop.supplier(supplier_id).await.current_balance, dec("500"));

    let events = shop.events().await;
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].action, AuditAction::Purchase);
    assert_eq!(events[0].entity_id, Some(supplier_id));
}

/// Test that overpaying at purchase time owes nothing
#[tokio::test]
async fn test_overpaid_purchase_owes_nothing() {
    let shop = Shop::new().await;
    let supplier_id = shop.add_supplier(Decimal::ZERO).await;

    let detail = SupplierService::new(shop.env.clone())
        .create_purchase(
            &shop.ctx,
            supplier_id,
            purchase(shop.warehouse, vec![line(shop.rice, "1", "100")], "150"),
        )
        .await
        .unwrap();

    assert_eq!(detail.purchase.amount_credit, Decimal::ZERO);
    assert_eq!(shop.supplier(supplier_id).await.current_balance, Decimal::ZERO);
}

/// Test that credit past the supplier limit rejects the whole purchase
#[tokio::test]
async fn test_purchase_over_credit_limit() {
    let shop = Shop::new().await;
    let supplier_id = shop.add_supplier(dec("1000")).await;
    let service = SupplierService::new(shop.env.clone());

    let err = service
        .create_purchase(
            &shop.ctx,
            supplier_id,
            purchase(shop.warehouse, vec![line(shop.rice, "20", "100")], "500"),
        )
        .await
        .unwrap_err();
    match err {
        AppError::CreditLimitExceeded { available } => assert_eq!(available, dec("1000")),
        other => panic!("unexpected: {:?}", other),
    }

    let book = shop.book().await;
    assert!(book.lots.is_empty());
    assert!(book.movements.is_empty());
    assert!(book.purchases.is_empty());
    assert_eq!(shop.stock(shop.rice, shop.warehouse).await, Decimal::ZERO);

    // Paying enough upfront keeps it inside the limit
    service
        .create_purchase(
            &shop.ctx,
            supplier_id,
            purchase(shop.warehouse, vec![line(shop.rice, "20", "100")], "1000"),
        )
        .await
        .unwrap();
    assert_eq!(shop.supplier(supplier_id).await.current_balance, dec("1000"));
}

/// Test purchase input validation
#[tokio::test]
async fn test_purchase_validation() {
    let shop = Shop::new().await;
    let supplier_id = shop.add_supplier(Decimal::ZERO).await;
    let service = SupplierService::new(shop.env.clone());

    let err = service
        .create_purchase(&shop.ctx, supplier_id, purchase(shop.warehouse, vec![], "0"))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation { ref field, .. } if field == "items"));

    let err = service
        .create_purchase(
            &shop.ctx,
            supplier_id,
            purchase(shop.warehouse, vec![line(shop.rice, "0", "10")], "0"),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation { ref field, .. } if field == "quantity"));

    let err = service
        .create_purchase(
            &shop.ctx,
            supplier_id,
            purchase(shop.warehouse, vec![line(Uuid::new_v4(), "1", "10")], "0"),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}

// ============================================================================
// Payments
// ============================================================================

/// Test that a payment against a purchase settles it
#[tokio::test]
async fn test_payment_settles_purchase() {
    let shop = Shop::new().await;
    let supplier_id = shop.add_supplier(Decimal::ZERO).await;
    let service = SupplierService::new(shop.env.clone());

    let detail = service
        .create_purchase(
            &shop.ctx,
            supplier_id,
            purchase(shop.warehouse, vec![line(shop.rice, "10", "100")], "0"),
        )
        .await
        .unwrap();
    let purchase_id = detail.purchase.id;

    service
        .add_payment(&shop.ctx, supplier_id, pay("400", Some(purchase_id)))
        .await
        .unwrap();
    let partial = shop.book().await.purchases[&purchase_id].clone();
    assert_eq!(partial.amount_paid, dec("400"));
    assert_eq!(partial.amount_credit, dec("600"));
    assert_eq!(partial.payment_status, PurchasePaymentStatus::Pending);

    service
        .add_payment(&shop.ctx, supplier_id, pay("600", Some(purchase_id)))
        .await
        .unwrap();
    let settled = shop.book().await.purchases[&purchase_id].clone();
    assert_eq!(settled.amount_credit, Decimal::ZERO);
    assert_eq!(settled.payment_status, PurchasePaymentStatus::Paid);
    assert_eq!(shop.supplier(supplier_id).await.current_balance, Decimal::ZERO);

    let payments = service.list_payments(&shop.ctx, supplier_id).await.unwrap();
    assert_eq!(payments.len(), 2);
}

/// Test that a general payment lowers the balance but touches no purchase
#[tokio::test]
async fn test_general_payment() {
    let shop = Shop::new().await;
    let supplier_id = shop.add_supplier(Decimal::ZERO).await;
    let service = SupplierService::new(shop.env.clone());

    let detail = service
        .create_purchase(
            &shop.ctx,
            supplier_id,
            purchase(shop.warehouse, vec![line(shop.rice, "5", "100")], "0"),
        )
        .await
        .unwrap();

    service
        .add_payment(&shop.ctx, supplier_id, pay("200", None))
        .await
        .unwrap();

    assert_eq!(shop.supplier(supplier_id).await.current_balance, dec("300"));
    let untouched = shop.book().await.purchases[&detail.purchase.id].clone();
    assert_eq!(untouched.amount_credit, dec("500"));
}

/// Test that paying another supplier's purchase is not found
#[tokio::test]
async fn test_payment_against_foreign_purchase() {
    let shop = Shop::new().await;
    let first = shop.add_supplier(Decimal::ZERO).await;
    let second = shop.add_supplier(Decimal::ZERO).await;
    let service = SupplierService::new(shop.env.clone());

    let detail = service
        .create_purchase(
            &shop.ctx,
            first,
            purchase(shop.warehouse, vec![line(shop.rice, "5", "100")], "0"),
        )
        .await
        .unwrap();
    service
        .create_purchase(
            &shop.ctx,
            second,
            purchase(shop.warehouse, vec![line(shop.oil, "5", "100")], "0"),
        )
        .await
        .unwrap();

    let err = service
        .add_payment(&shop.ctx, second, pay("100", Some(detail.purchase.id)))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
    assert_eq!(shop.supplier(second).await.current_balance, dec("500"));
}

/// Test that paying more than is owed fails
#[tokio::test]
async fn test_supplier_payment_exceeding_balance() {
    let shop = Shop::new().await;
    let supplier_id = shop.add_supplier(Decimal::ZERO).await;

    let err = SupplierService::new(shop.env.clone())
        .add_payment(&shop.ctx, supplier_id, pay("1", None))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::PaymentExceedsBalance { .. }));
    assert!(shop.book().await.supplier_payments.is_empty());
}

// ============================================================================
// Lifecycle
// ============================================================================

/// Test that a supplier who is owed money cannot be deactivated
#[tokio::test]
async fn test_deactivate_supplier_with_balance() {
    let shop = Shop::new().await;
    let supplier_id = shop.add_supplier(Decimal::ZERO).await;
    let service = SupplierService::new(shop.env.clone());

    service
        .create_purchase(
            &shop.ctx,
            supplier_id,
            purchase(shop.warehouse, vec![line(shop.rice, "1", "100")], "0"),
        )
        .await
        .unwrap();

    let err = service
        .deactivate_supplier(&shop.ctx, supplier_id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidStateTransition { .. }));

    service
        .add_payment(&shop.ctx, supplier_id, pay("100", None))
        .await
        .unwrap();
    let supplier = service
        .deactivate_supplier(&shop.ctx, supplier_id)
        .await
        .unwrap();
    assert!(!supplier.is_active);

    let err = service
        .list_purchases(&shop.ctx, supplier_id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}
