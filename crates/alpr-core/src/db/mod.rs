//! Database layer for the local outbox

mod connection;
mod migrations;
mod repository;

pub use connection::Database;
pub use repository::{OutboxRepository, SqliteOutboxRepository, StoreStats};
