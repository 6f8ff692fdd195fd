//! Session guard: token extraction, validation, and role gating
//!
//! The token is read from the `token` cookie first and the
//! `Authorization: Bearer` header second; the cookie wins when both are
//! present. Every rejection collapses to the same 401 for the caller but is
//! logged with its distinct reason.

use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::CookieJar;
use jsonwebtoken::errors::ErrorKind;
use serde::Serialize;
use tracing::warn;
use uuid::Uuid;

use crate::AppState;
use crate::error::{AuthError, AuthResult};
use crate::models::Role;

/// Identity projection attached to the request after session resolution.
/// This is the only shape downstream handlers see; it never carries the
/// password hash or any provider state.
#[derive(Debug, Clone, Serialize)]
pub struct CurrentUser {
    pub id: Uuid,
    pub phone: String,
    pub role: Role,
}

/// Pull the session token from the cookie or the Authorization header
fn extract_token(req: &Request<Body>) -> Option<String> {
    let jar = CookieJar::from_headers(req.headers());
    if let Some(cookie) = jar.get("token") {
        return Some(cookie.value().to_string());
    }

    req.headers()
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|header| header.to_str().ok())
        .and_then(|header| header.strip_prefix("Bearer "))
        .map(str::to_string)
}

/// Resolve the session token on protected routes and attach the resolved
/// identity to the request.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, AuthError> {
    let Some(token) = extract_token(&req) else {
        warn!("Session rejected: no token presented");
        return Err(AuthError::Unauthenticated);
    };

    let claims = state.token_service.validate(&token).map_err(|e| {
        match e.kind() {
            ErrorKind::ExpiredSignature => warn!("Session rejected: token expired"),
            _ => warn!("Session rejected: invalid token: {}", e),
        }
        AuthError::Unauthenticated
    })?;

    let user = state
        .store
        .find_by_id(claims.sub)
        .await?
        .ok_or_else(|| {
            warn!("Session rejected: subject {} no longer exists", claims.sub);
            AuthError::Unauthenticated
        })?;

    req.extensions_mut().insert(CurrentUser {
        id: user.id,
        phone: user.phone,
        role: user.role,
    });

    Ok(next.run(req).await)
}

/// Pure role check, composed after `auth_middleware` on admin routes
pub fn require_role(user: &CurrentUser, role: Role) -> AuthResult<()> {
    if user.role == role {
        Ok(())
    } else {
        Err(AuthError::Forbidden)
    }
}

/// Gate a route to administrators
pub async fn require_admin(req: Request<Body>, next: Next) -> Result<Response, AuthError> {
    let user = req
        .extensions()
        .get::<CurrentUser>()
        .ok_or(AuthError::Unauthenticated)?;

    require_role(user, Role::Admin)?;

    Ok(next.run(req).await)
}
