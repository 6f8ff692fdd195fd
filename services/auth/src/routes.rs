//! Authentication service routes

use axum::{
    Extension, Json, Router,
    extract::State,
    http::StatusCode,
    middleware,
    response::IntoResponse,
    routing::{get, post},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, warn};

use crate::AppState;
use crate::error::AuthError;
use crate::middleware::{CurrentUser, auth_middleware, require_admin};
use crate::models::User;
use crate::validation::{validate_email, validate_password};

/// Session cookie name; also accepted as a Bearer token for clients that
/// cannot rely on cookies.
pub const TOKEN_COOKIE: &str = "token";

/// Cookie attribute configuration
///
/// Same-site deployments use `SameSite=Lax` with `Secure` only in
/// production; cross-site deployments need `SameSite=None`, which browsers
/// silently drop unless `Secure` is also set.
#[derive(Debug, Clone)]
pub struct CookieConfig {
    pub cross_site: bool,
    pub secure: bool,
}

impl CookieConfig {
    /// Create a new CookieConfig from environment variables
    ///
    /// # Environment Variables
    /// - `ENVIRONMENT`: "production" enables Secure and cross-site cookies
    /// - `COOKIE_CROSS_SITE`: override for cross-site cookie attributes
    pub fn from_env() -> Self {
        let production = std::env::var("ENVIRONMENT")
            .map(|v| v == "production")
            .unwrap_or(false);

        let cross_site = std::env::var("COOKIE_CROSS_SITE")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(production);

        Self {
            cross_site,
            // SameSite=None without Secure is dropped by browsers
            secure: production || cross_site,
        }
    }

    fn same_site(&self) -> SameSite {
        if self.cross_site {
            SameSite::None
        } else {
            SameSite::Lax
        }
    }

    /// Build the session cookie with the configured attributes
    pub fn session_cookie(&self, token: String, ttl_secs: u64) -> Cookie<'static> {
        let mut cookie = Cookie::new(TOKEN_COOKIE, token);
        cookie.set_http_only(true);
        cookie.set_path("/");
        cookie.set_secure(self.secure);
        cookie.set_same_site(self.same_site());
        cookie.set_max_age(time::Duration::seconds(ttl_secs as i64));
        cookie
    }

    /// A cookie that clears the session; must carry the same attributes the
    /// session cookie was set with or browsers keep the original.
    pub fn removal_cookie(&self) -> Cookie<'static> {
        let mut cookie = Cookie::new(TOKEN_COOKIE, "");
        cookie.set_http_only(true);
        cookie.set_path("/");
        cookie.set_secure(self.secure);
        cookie.set_same_site(self.same_site());
        cookie.set_max_age(time::Duration::ZERO);
        cookie
    }
}

/// Request to start an OTP login
#[derive(Deserialize)]
pub struct SendOtpRequest {
    pub phone: String,
}

/// Request to complete an OTP login
#[derive(Deserialize)]
pub struct VerifyOtpRequest {
    pub phone: String,
    pub code: String,
}

/// Request for password registration
#[derive(Deserialize)]
pub struct RegisterRequest {
    pub name: Option<String>,
    pub phone: String,
    pub password: String,
}

/// Request for password login
#[derive(Deserialize)]
pub struct LoginRequest {
    pub phone: String,
    pub password: String,
}

/// Request for partial profile updates; absent fields are left untouched
#[derive(Deserialize, Default)]
pub struct UpdateProfileRequest {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub street: Option<String>,
    pub city: Option<String>,
    pub zipcode: Option<String>,
}

/// Response for a successful login
#[derive(Serialize)]
pub struct LoginResponse {
    pub message: String,
    pub user: CurrentUser,
    pub token: String,
}

/// Create the router for the authentication service
pub fn create_router(state: AppState) -> Router {
    let public = Router::new()
        .route("/health", get(health_check))
        .route("/auth/send-otp", post(send_otp))
        .route("/auth/verify-otp", post(verify_otp))
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/logout", post(logout));

    let protected = Router::new()
        .route("/auth/me", get(me))
        .route("/users/me", get(get_profile).put(update_profile))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    let admin = Router::new()
        .route("/admin/dashboard", get(admin_dashboard))
        .layer(middleware::from_fn(require_admin))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    public.merge(protected).merge(admin).with_state(state)
}

/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "service": "auth-service"
    }))
}

/// Start an OTP login: find-or-create the account and deliver a code
pub async fn send_otp(
    State(state): State<AppState>,
    Json(payload): Json<SendOtpRequest>,
) -> Result<impl IntoResponse, AuthError> {
    info!("OTP requested for phone: {}", payload.phone);

    state.verifier.begin_phone_challenge(&payload.phone).await?;

    Ok(Json(json!({ "message": "OTP sent successfully via SMS" })))
}

/// Complete an OTP login and issue a session
pub async fn verify_otp(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(payload): Json<VerifyOtpRequest>,
) -> Result<impl IntoResponse, AuthError> {
    let user = state
        .verifier
        .complete_phone_challenge(&payload.phone, &payload.code)
        .await
        .map_err(|e| match e {
            // An unknown phone must read the same as a wrong code, or the
            // endpoint leaks which phone numbers have accounts.
            AuthError::NotFound => {
                warn!("OTP verify for unknown phone: {}", payload.phone);
                AuthError::InvalidCredential
            }
            other => other,
        })?;

    issue_session(&state, jar, user, StatusCode::OK, "Logged in successfully")
}

/// Register a password account and issue a session
pub async fn register(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(payload): Json<RegisterRequest>,
) -> Result<impl IntoResponse, AuthError> {
    validate_password(&payload.password).map_err(AuthError::Validation)?;

    let user = state
        .verifier
        .register_with_password(payload.name.as_deref(), &payload.phone, &payload.password)
        .await?;

    issue_session(
        &state,
        jar,
        user,
        StatusCode::CREATED,
        "Registered successfully",
    )
}

/// Password login
pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(payload): Json<LoginRequest>,
) -> Result<impl IntoResponse, AuthError> {
    let user = state
        .verifier
        .verify_password(&payload.phone, &payload.password)
        .await?;

    issue_session(&state, jar, user, StatusCode::OK, "Logged in successfully")
}

/// Mint a token for a verified user and hand it back as both a cookie and a
/// body field for header-based clients.
fn issue_session(
    state: &AppState,
    jar: CookieJar,
    user: User,
    status: StatusCode,
    message: &str,
) -> Result<(StatusCode, CookieJar, Json<LoginResponse>), AuthError> {
    let token = state.token_service.issue(&user)?;
    let jar = jar.add(
        state
            .cookie_config
            .session_cookie(token.clone(), state.token_service.session_ttl()),
    );

    Ok((
        status,
        jar,
        Json(LoginResponse {
            message: message.to_string(),
            user: CurrentUser {
                id: user.id,
                phone: user.phone,
                role: user.role,
            },
            token,
        }),
    ))
}

/// Logout: clear the cookie. Sessions are stateless, so this is a
/// client-side discard with no server-side invalidation.
pub async fn logout(State(state): State<AppState>, jar: CookieJar) -> impl IntoResponse {
    let jar = jar.remove(state.cookie_config.removal_cookie());
    (jar, Json(json!({ "message": "Logged out successfully" })))
}

/// The resolved identity for the current session
pub async fn me(Extension(user): Extension<CurrentUser>) -> impl IntoResponse {
    Json(json!({ "success": true, "user": user }))
}

/// Full profile for the current user, minus credential material
pub async fn get_profile(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
) -> Result<impl IntoResponse, AuthError> {
    let user = state
        .store
        .find_by_id(current.id)
        .await?
        .ok_or(AuthError::NotFound)?;

    Ok(Json(user))
}

/// Partial profile update; only the provided fields change
pub async fn update_profile(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Json(payload): Json<UpdateProfileRequest>,
) -> Result<impl IntoResponse, AuthError> {
    let mut user = state
        .store
        .find_by_id(current.id)
        .await?
        .ok_or(AuthError::NotFound)?;

    if let Some(email) = payload.email {
        validate_email(&email).map_err(AuthError::Validation)?;
        // The unique index is the backstop; this just gives a clean 409
        if let Some(existing) = state.store.find_by_email(&email).await? {
            if existing.id != current.id {
                return Err(AuthError::Conflict);
            }
        }
        user.email = Some(email);
    }
    if let Some(first_name) = payload.first_name {
        user.first_name = Some(first_name);
    }
    if let Some(last_name) = payload.last_name {
        user.last_name = Some(last_name);
    }
    if let Some(phone) = payload.phone {
        crate::validation::validate_phone(&phone).map_err(AuthError::Validation)?;
        user.phone = phone;
    }

    if payload.street.is_some() || payload.city.is_some() || payload.zipcode.is_some() {
        let mut address = user
            .address
            .take()
            .and_then(|v| v.as_object().cloned())
            .unwrap_or_default();
        if let Some(street) = payload.street {
            address.insert("street".to_string(), json!(street));
        }
        if let Some(city) = payload.city {
            address.insert("city".to_string(), json!(city));
        }
        if let Some(zipcode) = payload.zipcode {
            address.insert("zipcode".to_string(), json!(zipcode));
        }
        user.address = Some(serde_json::Value::Object(address));
    }

    let user = state.store.save(&user).await?;
    Ok(Json(user))
}

/// Admin-gated smoke route
pub async fn admin_dashboard(Extension(user): Extension<CurrentUser>) -> impl IntoResponse {
    info!("Admin dashboard accessed by: {}", user.id);
    Json(json!({ "success": true, "message": "Welcome Admin!" }))
}
