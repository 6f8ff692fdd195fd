//! One-time code delivery and verification
//!
//! The provider is the single source of truth for code generation, storage,
//! and expiry; this service only forwards phone numbers and codes and trusts
//! the provider's verdict. Requesting a new code supersedes the previous one
//! on the provider side, so no challenge state is tracked locally.

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::{info, warn};

use crate::error::{AuthError, AuthResult};

/// Seam for the external code delivery and verification provider
#[async_trait]
pub trait OtpProvider: Send + Sync {
    /// Generate and deliver a one-time code to `phone`
    async fn send_code(&self, phone: &str) -> AuthResult<()>;

    /// Ask whether `code` is currently valid for `phone`
    async fn check_code(&self, phone: &str, code: &str) -> AuthResult<bool>;
}

/// Twilio Verify configuration
#[derive(Debug, Clone)]
pub struct TwilioConfig {
    pub account_sid: String,
    pub auth_token: String,
    pub service_sid: String,
    /// Verify API base URL
    pub base_url: String,
    /// Outbound request timeout in seconds
    pub timeout_secs: u64,
}

impl TwilioConfig {
    /// Create a new TwilioConfig from environment variables
    ///
    /// # Environment Variables
    /// - `TWILIO_ACCOUNT_SID`: Twilio account SID
    /// - `TWILIO_AUTH_TOKEN`: Twilio auth token
    /// - `TWILIO_SERVICE_SID`: Verify service SID
    /// - `TWILIO_TIMEOUT_SECS`: Request timeout in seconds (default: 10)
    pub fn from_env() -> Result<Self> {
        let account_sid = std::env::var("TWILIO_ACCOUNT_SID")
            .map_err(|_| anyhow!("TWILIO_ACCOUNT_SID environment variable not set"))?;
        let auth_token = std::env::var("TWILIO_AUTH_TOKEN")
            .map_err(|_| anyhow!("TWILIO_AUTH_TOKEN environment variable not set"))?;
        let service_sid = std::env::var("TWILIO_SERVICE_SID")
            .map_err(|_| anyhow!("TWILIO_SERVICE_SID environment variable not set"))?;

        let timeout_secs = std::env::var("TWILIO_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(10);

        Ok(Self {
            account_sid,
            auth_token,
            service_sid,
            base_url: "https://verify.twilio.com/v2".to_string(),
            timeout_secs,
        })
    }
}

/// Twilio Verify client
#[derive(Clone)]
pub struct TwilioVerify {
    client: reqwest::Client,
    config: TwilioConfig,
}

#[derive(Deserialize)]
struct VerificationCheckResponse {
    valid: bool,
    status: String,
}

impl TwilioVerify {
    /// Build the client with a bounded request timeout so a stalled
    /// provider cannot hold a login request open indefinitely.
    pub fn new(config: TwilioConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("Failed to build Twilio HTTP client")?;

        Ok(Self { client, config })
    }

    fn verifications_url(&self) -> String {
        format!(
            "{}/Services/{}/Verifications",
            self.config.base_url, self.config.service_sid
        )
    }

    fn verification_check_url(&self) -> String {
        format!(
            "{}/Services/{}/VerificationCheck",
            self.config.base_url, self.config.service_sid
        )
    }
}

#[async_trait]
impl OtpProvider for TwilioVerify {
    async fn send_code(&self, phone: &str) -> AuthResult<()> {
        info!("Requesting verification code for phone: {}", phone);

        let response = self
            .client
            .post(self.verifications_url())
            .basic_auth(&self.config.account_sid, Some(&self.config.auth_token))
            .form(&[("To", phone), ("Channel", "sms")])
            .send()
            .await
            .map_err(|e| AuthError::Delivery(anyhow!(e)))?;

        if !response.status().is_success() {
            let status = response.status();
            warn!("Verification send rejected with status {}", status);
            return Err(AuthError::Delivery(anyhow!(
                "Provider returned status {status}"
            )));
        }

        Ok(())
    }

    async fn check_code(&self, phone: &str, code: &str) -> AuthResult<bool> {
        let response = self
            .client
            .post(self.verification_check_url())
            .basic_auth(&self.config.account_sid, Some(&self.config.auth_token))
            .form(&[("To", phone), ("Code", code)])
            .send()
            .await
            .map_err(|e| AuthError::Provider(anyhow!(e)))?;

        let status = response.status();

        // Verify answers 404 once a verification has expired or been
        // consumed; that is a verdict on the code, not a provider outage.
        if status == reqwest::StatusCode::NOT_FOUND {
            warn!("Verification check found no active challenge for phone");
            return Ok(false);
        }

        if !status.is_success() {
            warn!("Verification check rejected with status {}", status);
            return Err(AuthError::Provider(anyhow!(
                "Provider returned status {status}"
            )));
        }

        let check: VerificationCheckResponse = response
            .json()
            .await
            .map_err(|e| AuthError::Provider(anyhow!(e)))?;

        Ok(check.valid && check.status == "approved")
    }
}
