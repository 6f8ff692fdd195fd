use anyhow::Result;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod error;
mod jwt;
mod middleware;
mod models;
mod otp;
mod repositories;
mod routes;
mod validation;
mod verifier;

use crate::jwt::TokenService;
use crate::otp::{OtpProvider, TwilioVerify};
use crate::repositories::{PgUserStore, UserStore};
use crate::routes::CookieConfig;
use crate::verifier::CredentialVerifier;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn UserStore>,
    pub verifier: CredentialVerifier,
    pub token_service: TokenService,
    pub cookie_config: CookieConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    info!("Starting authentication service");

    // Initialize database connection pool
    let db_config = common::database::DatabaseConfig::from_env()?;
    let pool = common::database::init_pool(&db_config).await?;

    if common::database::health_check(&pool).await? {
        info!("Database connection successful");
    } else {
        anyhow::bail!("Failed to connect to database");
    }

    // Initialize the token service
    let jwt_config = jwt::JwtConfig::from_env()?;
    let token_service = TokenService::new(jwt_config)?;

    // Initialize the OTP provider
    let twilio_config = otp::TwilioConfig::from_env()?;
    let otp_provider: Arc<dyn OtpProvider> = Arc::new(TwilioVerify::new(twilio_config)?);

    let store: Arc<dyn UserStore> = Arc::new(PgUserStore::new(pool));
    let verifier = CredentialVerifier::new(store.clone(), otp_provider);

    let app_state = AppState {
        store,
        verifier,
        token_service,
        cookie_config: CookieConfig::from_env(),
    };

    // Start the web server
    let app = routes::create_router(app_state);

    let bind_addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!("Authentication service listening on {}", bind_addr);

    axum::serve(listener, app).await?;

    Ok(())
}
