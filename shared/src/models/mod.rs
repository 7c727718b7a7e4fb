//! Domain models for the Tendero business backend

mod audit;
mod finance;
mod inventory;
mod party;
mod sale;
mod waste;

pub use audit::*;
pub use finance::*;
pub use inventory::*;
pub use party::*;
pub use sale::*;
pub use waste::*;
