//! User store for database operations
//!
//! The `UserStore` trait is the seam between the credential verifier and
//! persistence; `PgUserStore` is the PostgreSQL implementation. Uniqueness
//! of phone and email is enforced by unique indexes, not application locks:
//! a concurrent duplicate insert surfaces as SQLSTATE 23505 and is
//! translated to `AuthError::Conflict` here.

use async_trait::async_trait;
use common::error::DatabaseError;
use sqlx::{PgPool, Row, postgres::PgRow};
use tracing::info;
use uuid::Uuid;

use crate::error::{AuthError, AuthResult};
use crate::models::{NewUser, User};

/// Storage seam for user records
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_phone(&self, phone: &str) -> AuthResult<Option<User>>;
    async fn find_by_email(&self, email: &str) -> AuthResult<Option<User>>;
    async fn find_by_id(&self, id: Uuid) -> AuthResult<Option<User>>;
    async fn create(&self, new_user: &NewUser) -> AuthResult<User>;
    async fn save(&self, user: &User) -> AuthResult<User>;
}

/// PostgreSQL-backed user store
#[derive(Clone)]
pub struct PgUserStore {
    pool: PgPool,
}

impl PgUserStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const USER_COLUMNS: &str =
    "id, phone, email, first_name, last_name, address, password_hash, role, created_at, updated_at";

fn map_row(row: &PgRow) -> AuthResult<User> {
    let role: String = row.get("role");
    let role = role
        .parse()
        .map_err(|e: String| AuthError::Internal(anyhow::anyhow!(e)))?;

    Ok(User {
        id: row.get("id"),
        phone: row.get("phone"),
        email: row.get("email"),
        first_name: row.get("first_name"),
        last_name: row.get("last_name"),
        address: row.get("address"),
        password_hash: row.get("password_hash"),
        role,
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

fn map_query_error(err: sqlx::Error) -> AuthError {
    let err = DatabaseError::from_query(err);
    if err.is_unique_violation() {
        AuthError::Conflict
    } else {
        AuthError::Database(err)
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn find_by_phone(&self, phone: &str) -> AuthResult<Option<User>> {
        let row = sqlx::query(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE phone = $1"
        ))
        .bind(phone)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_query_error)?;

        row.as_ref().map(map_row).transpose()
    }

    async fn find_by_email(&self, email: &str) -> AuthResult<Option<User>> {
        let row = sqlx::query(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_query_error)?;

        row.as_ref().map(map_row).transpose()
    }

    async fn find_by_id(&self, id: Uuid) -> AuthResult<Option<User>> {
        let row = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_query_error)?;

        row.as_ref().map(map_row).transpose()
    }

    async fn create(&self, new_user: &NewUser) -> AuthResult<User> {
        info!("Creating new user for phone: {}", new_user.phone);

        let row = sqlx::query(&format!(
            "INSERT INTO users (phone, first_name, password_hash)
             VALUES ($1, $2, $3)
             RETURNING {USER_COLUMNS}"
        ))
        .bind(&new_user.phone)
        .bind(&new_user.first_name)
        .bind(&new_user.password_hash)
        .fetch_one(&self.pool)
        .await
        .map_err(map_query_error)?;

        map_row(&row)
    }

    async fn save(&self, user: &User) -> AuthResult<User> {
        let row = sqlx::query(&format!(
            "UPDATE users
             SET phone = $2, email = $3, first_name = $4, last_name = $5,
                 address = $6, password_hash = $7, role = $8, updated_at = now()
             WHERE id = $1
             RETURNING {USER_COLUMNS}"
        ))
        .bind(user.id)
        .bind(&user.phone)
        .bind(&user.email)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(&user.address)
        .bind(&user.password_hash)
        .bind(user.role.to_string())
        .fetch_one(&self.pool)
        .await
        .map_err(map_query_error)?;

        map_row(&row)
    }
}
