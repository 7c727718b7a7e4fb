//! Waste tests
//!
//! Tests for write-offs:
//! - Declared quantity is clamped to stock on hand
//! - Cost snapshot from the lot or the latest costed lot
//! - Expired-lot sweep

mod common;

use chrono::{DateTime, Duration, Utc};
use common::{dec, lot, Shop};
use rust_decimal::Decimal;
use shared::{AuditAction, Lot, MovementType, WasteCause};
use tendero_backend::error::AppError;
use tendero_backend::services::waste::WasteInput;
use tendero_backend::services::WasteService;
use uuid::Uuid;

fn waste(shop: &Shop, quantity: &str, lot_id: Option<Uuid>) -> WasteInput {
    WasteInput {
        presentation_id: shop.rice,
        warehouse_id: shop.warehouse,
        lot_id,
        cause: WasteCause::Damaged,
        quantity: dec(quantity),
        notes: Some("Bolsas rotas".to_string()),
    }
}

/// Lot in the main warehouse that arrived a month ago
fn expiring(
    shop: &Shop,
    presentation_id: Uuid,
    remaining: &str,
    cost: Option<&str>,
    expiry: DateTime<Utc>,
) -> Lot {
    lot(
        presentation_id,
        shop.warehouse,
        dec(remaining),
        cost.map(dec),
        expiry - Duration::days(30),
        Some(expiry),
    )
}

// ============================================================================
// Manual write-offs
// ============================================================================

/// Test that a loss larger than the shelf is clamped but fully valued
#[tokio::test]
async fn test_waste_clamped_to_stock() {
    let shop = Shop::new().await;
    shop.put_stock(shop.rice, shop.warehouse, dec("3")).await;
    let batch = lot(
        shop.rice,
        shop.warehouse,
        dec("3"),
        Some(dec("2000")),
        Utc::now() - Duration::days(10),
        None,
    );
    let lot_id = batch.id;
    shop.put_lot(batch).await;

    let record = WasteService::new(shop.env.clone())
        .register_waste(&shop.ctx, waste(&shop, "5", Some(lot_id)))
        .await
        .unwrap();

    assert_eq!(record.quantity, dec("5"));
    assert_eq!(record.cost_per_unit, Some(dec("2000")));
    assert_eq!(record.total_cost, Some(dec("10000")));
    assert!(!record.is_auto);

    assert_eq!(shop.stock(shop.rice, shop.warehouse).await, Decimal::ZERO);
    let book = shop.book().await;
    assert_eq!(book.lots[&lot_id].remaining, Decimal::ZERO);
    // A manual write-off leaves the lot flag alone
    assert!(book.lots[&lot_id].is_active);

    assert_eq!(book.movements.len(), 1);
    let movement = &book.movements[0];
    assert_eq!(movement.movement_type, MovementType::Waste);
    assert_eq!(movement.quantity, dec("-3"));
    assert_eq!(movement.reason.as_deref(), Some("Merma: damaged"));
    assert_eq!(movement.reference_id, Some(record.id));
    assert_eq!(movement.lot_id, Some(lot_id));
    assert_eq!(book.waste_records.len(), 1);

    let events = shop.events().await;
    assert_eq!(events[0].action, AuditAction::Waste);
}

/// Test that without any costed lot the cost stays unknown
#[tokio::test]
async fn test_waste_without_cost() {
    let shop = Shop::new().await;
    shop.put_stock(shop.rice, shop.warehouse, dec("10")).await;

    let record = WasteService::new(shop.env.clone())
        .register_waste(&shop.ctx, waste(&shop, "2", None))
        .await
        .unwrap();

    assert_eq!(record.cost_per_unit, None);
    assert_eq!(record.total_cost, None);
    assert_eq!(shop.stock(shop.rice, shop.warehouse).await, dec("8"));
}

/// Test the fallback to the most recent costed lot
#[tokio::test]
async fn test_waste_cost_from_latest_lot() {
    let shop = Shop::new().await;
    shop.put_stock(shop.rice, shop.warehouse, dec("10")).await;
    let now = Utc::now();
    let (rice, warehouse) = (shop.rice, shop.warehouse);
    let old = lot(rice, warehouse, dec("5"), Some(dec("100")), now - Duration::days(20), None);
    let recent = lot(rice, warehouse, dec("5"), Some(dec("120")), now - Duration::days(2), None);
    let uncosted = lot(rice, warehouse, dec("5"), None, now - Duration::days(1), None);
    let elsewhere = lot(rice, shop.backroom, dec("5"), Some(dec("999")), now, None);
    for batch in [old, recent, uncosted, elsewhere] {
        shop.put_lot(batch).await;
    }

    let record = WasteService::new(shop.env.clone())
        .register_waste(&shop.ctx, waste(&shop, "2", None))
        .await
        .unwrap();

    assert_eq!(record.cost_per_unit, Some(dec("120")));
    assert_eq!(record.total_cost, Some(dec("240")));
}

/// Test that a named lot without cost is not valued from another lot
#[tokio::test]
async fn test_waste_named_uncosted_lot_has_no_cost() {
    let shop = Shop::new().await;
    shop.put_stock(shop.rice, shop.warehouse, dec("3")).await;
    let now = Utc::now();
    let costed = lot(shop.rice, shop.warehouse, dec("2"), Some(dec("120")), now, None);
    let uncosted = lot(
        shop.rice,
        shop.warehouse,
        dec("1"),
        None,
        now - Duration::days(3),
        None,
    );
    let lot_id = uncosted.id;
    shop.put_lot(costed).await;
    shop.put_lot(uncosted).await;

    let record = WasteService::new(shop.env.clone())
        .register_waste(&shop.ctx, waste(&shop, "5", Some(lot_id)))
        .await
        .unwrap();

    assert_eq!(record.lot_id, Some(lot_id));
    assert_eq!(record.cost_per_unit, None);
    assert_eq!(record.total_cost, None);
    assert_eq!(shop.stock(shop.rice, shop.warehouse).await, Decimal::ZERO);
}

/// Test that an empty shelf cannot be written off
#[tokio::test]
async fn test_waste_with_no_stock() {
    let shop = Shop::new().await;

    let err = WasteService::new(shop.env.clone())
        .register_waste(&shop.ctx, waste(&shop, "1", None))
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::InsufficientStock { .. }));
    assert!(shop.book().await.waste_records.is_empty());
}

/// Test that the lot must belong to the presentation
#[tokio::test]
async fn test_waste_with_foreign_lot() {
    let shop = Shop::new().await;
    shop.put_stock(shop.rice, shop.warehouse, dec("5")).await;
    let oil_lot = lot(shop.oil, shop.warehouse, dec("5"), None, Utc::now(), None);
    let lot_id = oil_lot.id;
    shop.put_lot(oil_lot).await;

    let err = WasteService::new(shop.env.clone())
        .register_waste(&shop.ctx, waste(&shop, "1", Some(lot_id)))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}

/// Test quantity validation
#[tokio::test]
async fn test_waste_quantity_must_be_positive() {
    let shop = Shop::new().await;
    shop.put_stock(shop.rice, shop.warehouse, dec("5")).await;

    let err = WasteService::new(shop.env.clone())
        .register_waste(&shop.ctx, waste(&shop, "0", None))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation { ref field, .. } if field == "quantity"));
}

// ============================================================================
// Expiry sweep
// ============================================================================

/// Test that the sweep writes off every expired lot
#[tokio::test]
async fn test_process_expired_lots() {
    let shop = Shop::new().await;
    let now = Utc::now();
    shop.put_stock(shop.rice, shop.warehouse, dec("10")).await;
    shop.put_stock(shop.oil, shop.warehouse, dec("4")).await;

    let expired_rice = expiring(&shop, shop.rice, "6", Some("50"), now - Duration::days(1));
    let expired_oil = expiring(&shop, shop.oil, "4", None, now - Duration::hours(1));
    let fresh = expiring(&shop, shop.rice, "4", Some("50"), now + Duration::days(30));
    let (rice_id, oil_id, fresh_id) = (expired_rice.id, expired_oil.id, fresh.id);
    shop.put_lot(expired_rice).await;
    shop.put_lot(expired_oil).await;
    shop.put_lot(fresh).await;

    let sweep = WasteService::new(shop.env.clone())
        .process_expired_lots(&shop.ctx)
        .await
        .unwrap();

    assert_eq!(sweep.processed, 2);
    // Only the costed lot contributes
    assert_eq!(sweep.total_cost, dec("300"));
    assert!(sweep.records.iter().all(|r| r.is_auto && r.cause == WasteCause::Expired));
    assert!(sweep
        .records
        .iter()
        .all(|r| r.notes.as_deref() == Some("Merma automática por vencimiento de lote")));

    let book = shop.book().await;
    assert_eq!(book.lots[&rice_id].remaining, Decimal::ZERO);
    assert!(!book.lots[&rice_id].is_active);
    assert!(!book.lots[&oil_id].is_active);
    assert!(book.lots[&fresh_id].is_active);
    assert_eq!(book.lots[&fresh_id].remaining, dec("4"));

    assert_eq!(book.stock_quantity(shop.rice, shop.warehouse), dec("4"));
    assert_eq!(book.stock_quantity(shop.oil, shop.warehouse), Decimal::ZERO);
    assert!(book
        .movements
        .iter()
        .all(|m| m.reason.as_deref() == Some("Merma: expired (auto)")));

    let events = shop.events().await;
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].action, AuditAction::AutoExpire);
    assert_eq!(events[0].entity_id, None);
}

/// Test that a second sweep finds nothing left
#[tokio::test]
async fn test_sweep_is_idempotent() {
    let shop = Shop::new().await;
    let now = Utc::now();
    shop.put_stock(shop.rice, shop.warehouse, dec("2")).await;
    shop.put_lot(expiring(&shop, shop.rice, "2", None, now - Duration::days(1)))
        .await;
    let service = WasteService::new(shop.env.clone());

    assert_eq!(service.process_expired_lots(&shop.ctx).await.unwrap().processed, 1);

    let again = service.process_expired_lots(&shop.ctx).await.unwrap();
    assert_eq!(again.processed, 0);
    assert_eq!(again.total_cost, Decimal::ZERO);
    assert!(again.records.is_empty());
    assert_eq!(shop.book().await.waste_records.len(), 1);
}

/// Test that the sweep clamps to stock when lots outnumber the shelf
#[tokio::test]
async fn test_sweep_never_goes_negative() {
    let shop = Shop::new().await;
    let now = Utc::now();
    shop.put_stock(shop.rice, shop.warehouse, dec("1")).await;
    shop.put_lot(expiring(&shop, shop.rice, "5", Some("10"), now - Duration::days(1)))
        .await;

    let sweep = WasteService::new(shop.env.clone())
        .process_expired_lots(&shop.ctx)
        .await
        .unwrap();

    assert_eq!(sweep.records[0].quantity, dec("5"));
    assert_eq!(sweep.total_cost, dec("50"));
    assert_eq!(shop.stock(shop.rice, shop.warehouse).await, Decimal::ZERO);
    assert_eq!(shop.book().await.movements[0].quantity, dec("-1"));
}
