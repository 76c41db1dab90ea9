pub mod common;
pub mod config;
pub mod daemon;
pub mod failed;
pub mod list;
pub mod purge;
pub mod record;
pub mod retry;
pub mod search;
pub mod show;
pub mod status;
pub mod sync;
