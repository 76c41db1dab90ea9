//! Services shared across clients.

mod outbox;

pub use outbox::OutboxStore;
