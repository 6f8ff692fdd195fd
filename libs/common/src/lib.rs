//! Common library for the Bazaar storefront
//!
//! This crate provides shared infrastructure used across the storefront
//! services, currently PostgreSQL connectivity and the database error type.

pub mod database;
pub mod error;
