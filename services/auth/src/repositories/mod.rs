//! Persistence adapters for the authentication service

pub mod user;

pub use user::{PgUserStore, UserStore};
