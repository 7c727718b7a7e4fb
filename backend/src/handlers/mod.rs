//! HTTP handlers

pub mod clients;
pub mod finance;
pub mod health;
pub mod inventory;
pub mod payment_methods;
pub mod sales;
pub mod suppliers;
pub mod waste;

pub use health::health_check;
