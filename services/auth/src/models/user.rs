//! User model and related functionality

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::models::Role;

/// User entity
///
/// The password hash is never serialized, so handlers can return the
/// entity directly without leaking credential material.
#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id: Uuid,
    /// Unique E.164-like phone number, the OTP login key
    pub phone: String,
    /// Unique when present; alternate identity key
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    /// Shipping address `{street, city, zipcode}` stored as JSONB
    pub address: Option<serde_json::Value>,
    #[serde(skip_serializing)]
    pub password_hash: Option<String>,
    pub role: Role,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// New user creation payload
#[derive(Debug, Clone)]
pub struct NewUser {
    pub phone: String,
    pub first_name: Option<String>,
    pub password_hash: Option<String>,
}

impl NewUser {
    /// A bare OTP-only account, created on first challenge for a phone
    pub fn from_phone(phone: &str) -> Self {
        Self {
            phone: phone.to_string(),
            first_name: None,
            password_hash: None,
        }
    }
}
