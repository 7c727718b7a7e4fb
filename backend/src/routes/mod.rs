//! Route definitions for the Tendero API

use axum::{
    middleware,
    routing::{delete, get, post},
    Router,
};

use crate::{handlers, middleware::auth_middleware, AppState};

/// Create API routes
pub fn api_routes() -> Router<AppState> {
    Router::new()
        // Health check (public)
        .route("/health", get(handlers::health_check))
        // Protected routes
        .nest("/sales", sale_routes())
        .nest("/payment-methods", payment_method_routes())
        .nest("/inventory", inventory_routes())
        .nest("/clients", client_routes())
        .nest("/suppliers", supplier_routes())
        .nest("/finance", finance_routes())
        .nest("/waste", waste_routes())
}

/// Sale routes (protected)
fn sale_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(handlers::sales::create_sale))
        .route("/:sale_id", get(handlers::sales::get_sale))
        .route("/:sale_id/cancel", post(handlers::sales::cancel_sale))
        .route_layer(middleware::from_fn(auth_middleware))
}

/// Payment method routes (protected)
fn payment_method_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(handlers::payment_methods::list_payment_methods)
                .post(handlers::payment_methods::create_payment_method),
        )
        .route(
            "/:method_id",
            delete(handlers::payment_methods::deactivate_payment_method),
        )
        .route_layer(middleware::from_fn(auth_middleware))
}

/// Inventory routes (protected)
fn inventory_routes() -> Router<AppState> {
    Router::new()
        .route("/entries", post(handlers::inventory::register_entry))
        .route("/adjustments", post(handlers::inventory::register_adjustment))
        .route("/transfers", post(handlers::inventory::register_transfer))
        .route(
            "/stock/:presentation_id/:warehouse_id",
            get(handlers::inventory::get_stock_level),
        )
        .route(
            "/movements/:presentation_id/:warehouse_id",
            get(handlers::inventory::list_movements),
        )
        .route(
            "/warehouses/:warehouse_id",
            delete(handlers::inventory::deactivate_warehouse),
        )
        .route_layer(middleware::from_fn(auth_middleware))
}

/// Client receivable routes (protected)
fn client_routes() -> Router<AppState> {
    Router::new()
        .route("/refresh-status", post(handlers::clients::refresh_statuses))
        .route(
            "/:client_id",
            get(handlers::clients::get_client).delete(handlers::clients::deactivate_client),
        )
        .route(
            "/:client_id/credit",
            get(handlers::clients::credit_history).post(handlers::clients::add_credit_movement),
        )
        .route("/:client_id/block", post(handlers::clients::block_client))
        .route("/:client_id/unblock", post(handlers::clients::unblock_client))
        .route_layer(middleware::from_fn(auth_middleware))
}

/// Supplier payable routes (protected)
fn supplier_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/:supplier_id",
            get(handlers::suppliers::get_supplier).delete(handlers::suppliers::deactivate_supplier),
        )
        .route(
            "/:supplier_id/purchases",
            get(handlers::suppliers::list_purchases).post(handlers::suppliers::create_purchase),
        )
        .route(
            "/:supplier_id/payments",
            get(handlers::suppliers::list_payments).post(handlers::suppliers::add_payment),
        )
        .route_layer(middleware::from_fn(auth_middleware))
}

/// Cash register and session routes (protected)
fn finance_routes() -> Router<AppState> {
    Router::new()
        .route("/registers", post(handlers::finance::create_register))
        .route(
            "/registers/:register_id",
            delete(handlers::finance::deactivate_register),
        )
        .route(
            "/registers/:register_id/session",
            get(handlers::finance::current_session),
        )
        .route(
            "/registers/:register_id/open",
            post(handlers::finance::open_session),
        )
        .route(
            "/registers/:register_id/close",
            post(handlers::finance::close_session),
        )
        .route(
            "/registers/:register_id/movements",
            post(handlers::finance::add_movement),
        )
        .route_layer(middleware::from_fn(auth_middleware))
}

/// Waste routes (protected)
fn waste_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(handlers::waste::register_waste))
        .route("/auto-expired", post(handlers::waste::process_expired_lots))
        .route_layer(middleware::from_fn(auth_middleware))
}
