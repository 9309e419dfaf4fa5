//! Data layer module
//!
//! Handles user persistence:
//! - SQLite database operations
//! - The `UserStore` seam used by the sign-in flow

mod database;
mod models;
mod store;

pub use database::Database;
pub use models::*;
pub use store::{StoreError, UserStore};

#[cfg(test)]
pub use store::MockUserStore;
