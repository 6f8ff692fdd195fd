//! Session token service
//!
//! Sessions are stateless HS256 bearer tokens over a single server secret.
//! There is no revocation list: expiry is the only way a token dies, and it
//! is discovered lazily at validation time. Logout is a client-side cookie
//! discard.

use anyhow::{Result, anyhow};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

use crate::error::{AuthError, AuthResult};
use crate::models::User;

/// Session token configuration
#[derive(Debug, Clone)]
pub struct JwtConfig {
    /// Shared secret for signing and verifying tokens
    pub secret: String,
    /// Session lifetime in seconds (default: 7 days)
    pub session_ttl: u64,
}

impl JwtConfig {
    /// Create a new JwtConfig from environment variables
    ///
    /// # Environment Variables
    /// - `JWT_SECRET`: Shared signing secret
    /// - `JWT_SESSION_TTL`: Session lifetime in seconds (default: 604800)
    pub fn from_env() -> Result<Self> {
        let secret = std::env::var("JWT_SECRET")
            .map_err(|_| anyhow!("JWT_SECRET environment variable not set"))?;

        let session_ttl = std::env::var("JWT_SESSION_TTL")
            .unwrap_or_else(|_| "604800".to_string()) // 7 days
            .parse()
            .unwrap_or(604800);

        Ok(JwtConfig {
            secret,
            session_ttl,
        })
    }
}

/// Session token claims
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// User ID
    pub sub: Uuid,
    /// Issued at time
    pub iat: u64,
    /// Expiration time
    pub exp: u64,
}

/// Session token service
#[derive(Clone)]
pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    session_ttl: u64,
}

impl TokenService {
    /// Initialize the token service; a misconfigured (empty) secret is
    /// rejected here rather than at first issuance.
    pub fn new(config: JwtConfig) -> Result<Self> {
        if config.secret.is_empty() {
            return Err(anyhow!("JWT secret must not be empty"));
        }

        let encoding_key = EncodingKey::from_secret(config.secret.as_bytes());
        let decoding_key = DecodingKey::from_secret(config.secret.as_bytes());
        let mut validation = Validation::new(jsonwebtoken::Algorithm::HS256);
        validation.validate_exp = true;

        Ok(TokenService {
            encoding_key,
            decoding_key,
            validation,
            session_ttl: config.session_ttl,
        })
    }

    /// Issue a session token for a resolved user
    pub fn issue(&self, user: &User) -> AuthResult<String> {
        let now = unix_now().map_err(AuthError::Internal)?;

        let claims = Claims {
            sub: user.id,
            iat: now,
            exp: now + self.session_ttl,
        };

        encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| AuthError::Internal(anyhow!(e)))
    }

    /// Verify signature and expiry, returning the claims.
    ///
    /// The raw jsonwebtoken error is surfaced so the guard can log the
    /// rejection reason (bad signature vs. expired) distinctly.
    pub fn validate(&self, token: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
        let token_data = decode::<Claims>(token, &self.decoding_key, &self.validation)?;
        Ok(token_data.claims)
    }

    /// Session lifetime in seconds, used for the cookie max-age
    pub fn session_ttl(&self) -> u64 {
        self.session_ttl
    }
}

fn unix_now() -> Result<u64> {
    Ok(SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| anyhow!("Failed to get current time: {}", e))?
        .as_secs())
}
