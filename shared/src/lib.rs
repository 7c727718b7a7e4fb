//! Shared types, models and ledger rules for the Tendero backend
//!
//! Pure domain code: no I/O, no async. The `db` feature adds sqlx derives
//! to the models so the backend can read them straight from PostgreSQL.

pub mod ledger;
pub mod models;
pub mod types;
pub mod validation;

pub use models::*;
pub use types::*;
pub use validation::*;
