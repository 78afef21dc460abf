//! Dataset persistence.

pub mod database;
pub mod schema;

pub use database::{DatasetStore, StoredProject};
