//! Credential verification
//!
//! Decides whether a presented credential (one-time code or password)
//! corresponds to a legitimate account and surfaces the resolved user.
//! OTP generation, delivery, and expiry live entirely in the external
//! provider; password hashes are Argon2 PHC strings checked locally.

use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier, password_hash::SaltString};
use std::sync::Arc;
use tracing::info;

use crate::error::{AuthError, AuthResult};
use crate::models::{NewUser, User};
use crate::otp::OtpProvider;
use crate::repositories::UserStore;
use crate::validation::validate_phone;

/// Credential verifier over the storage and OTP provider seams
#[derive(Clone)]
pub struct CredentialVerifier {
    store: Arc<dyn UserStore>,
    otp: Arc<dyn OtpProvider>,
}

impl CredentialVerifier {
    pub fn new(store: Arc<dyn UserStore>, otp: Arc<dyn OtpProvider>) -> Self {
        Self { store, otp }
    }

    /// Start an OTP login: find or create the account for `phone`, then ask
    /// the provider to deliver a code. The code is never returned to the
    /// caller. A new challenge supersedes any outstanding one for the same
    /// phone on the provider side.
    pub async fn begin_phone_challenge(&self, phone: &str) -> AuthResult<()> {
        validate_phone(phone).map_err(AuthError::Validation)?;

        let user = match self.store.find_by_phone(phone).await? {
            Some(user) => user,
            None => {
                info!("First challenge for unknown phone, creating account");
                self.store.create(&NewUser::from_phone(phone)).await?
            }
        };

        info!("Sending verification code to user: {}", user.id);
        self.otp.send_code(phone).await?;

        Ok(())
    }

    /// Complete an OTP login. The provider's verdict on the code is
    /// authoritative; no expiry window is re-checked here.
    pub async fn complete_phone_challenge(&self, phone: &str, code: &str) -> AuthResult<User> {
        if phone.is_empty() || code.is_empty() {
            return Err(AuthError::Validation("Phone and OTP required".to_string()));
        }

        let user = self
            .store
            .find_by_phone(phone)
            .await?
            .ok_or(AuthError::NotFound)?;

        if !self.otp.check_code(phone, code).await? {
            return Err(AuthError::InvalidCredential);
        }

        info!("OTP login succeeded for user: {}", user.id);
        Ok(user)
    }

    /// Password login. An account without a stored hash fails with
    /// `PasswordNotEnabled` so the client can steer the user to OTP login
    /// instead of treating it as a wrong password.
    pub async fn verify_password(&self, phone: &str, password: &str) -> AuthResult<User> {
        if phone.is_empty() || password.is_empty() {
            return Err(AuthError::Validation(
                "Phone and password required".to_string(),
            ));
        }

        let user = self
            .store
            .find_by_phone(phone)
            .await?
            .ok_or(AuthError::NotFound)?;

        let Some(stored_hash) = user.password_hash.as_deref() else {
            return Err(AuthError::PasswordNotEnabled);
        };

        let parsed_hash = PasswordHash::new(stored_hash)
            .map_err(|e| AuthError::Internal(anyhow::anyhow!("Invalid stored hash: {}", e)))?;

        Argon2::default()
            .verify_password(password.as_bytes(), &parsed_hash)
            .map_err(|_| AuthError::InvalidCredential)?;

        info!("Password login succeeded for user: {}", user.id);
        Ok(user)
    }

    /// Register a password account. The route layer enforces the real
    /// minimum length; an empty password is still rejected here as a
    /// defensive invariant. A concurrent duplicate registration resolves at
    /// the storage layer's unique index and also surfaces as `Conflict`.
    pub async fn register_with_password(
        &self,
        display_name: Option<&str>,
        phone: &str,
        password: &str,
    ) -> AuthResult<User> {
        validate_phone(phone).map_err(AuthError::Validation)?;
        if password.is_empty() {
            return Err(AuthError::Validation("Password is required".to_string()));
        }

        if self.store.find_by_phone(phone).await?.is_some() {
            return Err(AuthError::Conflict);
        }

        let password_hash = hash_password(password)?;
        let user = self
            .store
            .create(&NewUser {
                phone: phone.to_string(),
                first_name: display_name.map(str::to_string),
                password_hash: Some(password_hash),
            })
            .await?;

        info!("Registered password account for user: {}", user.id);
        Ok(user)
    }
}

/// Hash a password with a fresh random salt
pub fn hash_password(password: &str) -> AuthResult<String> {
    let salt = SaltString::generate(&mut rand::thread_rng());
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AuthError::Internal(anyhow::anyhow!("Failed to hash password: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Role;
    use async_trait::async_trait;
    use chrono::Utc;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use uuid::Uuid;

    /// In-memory user store with a simulated unique index on phone
    #[derive(Default)]
    struct MemoryStore {
        users: Mutex<Vec<User>>,
    }

    #[async_trait]
    impl UserStore for MemoryStore {
        async fn find_by_phone(&self, phone: &str) -> AuthResult<Option<User>> {
            let users = self.users.lock().unwrap();
            Ok(users.iter().find(|u| u.phone == phone).cloned())
        }

        async fn find_by_email(&self, email: &str) -> AuthResult<Option<User>> {
            let users = self.users.lock().unwrap();
            Ok(users
                .iter()
                .find(|u| u.email.as_deref() == Some(email))
                .cloned())
        }

        async fn find_by_id(&self, id: Uuid) -> AuthResult<Option<User>> {
            let users = self.users.lock().unwrap();
            Ok(users.iter().find(|u| u.id == id).cloned())
        }

        async fn create(&self, new_user: &NewUser) -> AuthResult<User> {
            let mut users = self.users.lock().unwrap();
            if users.iter().any(|u| u.phone == new_user.phone) {
                return Err(AuthError::Conflict);
            }
            let user = User {
                id: Uuid::new_v4(),
                phone: new_user.phone.clone(),
                email: None,
                first_name: new_user.first_name.clone(),
                last_name: None,
                address: None,
                password_hash: new_user.password_hash.clone(),
                role: Role::User,
                created_at: Utc::now(),
                updated_at: Utc::now(),
            };
            users.push(user.clone());
            Ok(user)
        }

        async fn save(&self, user: &User) -> AuthResult<User> {
            let mut users = self.users.lock().unwrap();
            let slot = users
                .iter_mut()
                .find(|u| u.id == user.id)
                .ok_or(AuthError::NotFound)?;
            *slot = user.clone();
            Ok(user.clone())
        }
    }

    impl MemoryStore {
        fn user_count(&self) -> usize {
            self.users.lock().unwrap().len()
        }
    }

    /// Scripted OTP provider: one code is valid, everything else is not
    struct FakeOtp {
        valid_code: String,
        send_calls: AtomicUsize,
    }

    impl FakeOtp {
        fn accepting(code: &str) -> Self {
            Self {
                valid_code: code.to_string(),
                send_calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl OtpProvider for FakeOtp {
        async fn send_code(&self, _phone: &str) -> AuthResult<()> {
            self.send_calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn check_code(&self, _phone: &str, code: &str) -> AuthResult<bool> {
            Ok(code == self.valid_code)
        }
    }

    fn verifier_with(
        store: Arc<MemoryStore>,
        otp: Arc<FakeOtp>,
    ) -> CredentialVerifier {
        CredentialVerifier::new(store, otp)
    }

    const PHONE: &str = "+919876543210";

    #[tokio::test]
    async fn test_begin_challenge_creates_user_when_absent() {
        let store = Arc::new(MemoryStore::default());
        let otp = Arc::new(FakeOtp::accepting("123456"));
        let verifier = verifier_with(store.clone(), otp.clone());

        verifier.begin_phone_challenge(PHONE).await.unwrap();

        assert_eq!(store.user_count(), 1);
        assert_eq!(otp.send_calls.load(Ordering::SeqCst), 1);
        let user = store.find_by_phone(PHONE).await.unwrap().unwrap();
        assert_eq!(user.role, Role::User);
    }

    #[tokio::test]
    async fn test_begin_challenge_leaves_existing_user_untouched() {
        let store = Arc::new(MemoryStore::default());
        let otp = Arc::new(FakeOtp::accepting("123456"));
        let verifier = verifier_with(store.clone(), otp.clone());

        verifier.begin_phone_challenge(PHONE).await.unwrap();
        let first = store.find_by_phone(PHONE).await.unwrap().unwrap();

        verifier.begin_phone_challenge(PHONE).await.unwrap();

        assert_eq!(store.user_count(), 1);
        let second = store.find_by_phone(PHONE).await.unwrap().unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(otp.send_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_begin_challenge_rejects_bad_phone_without_side_effects() {
        let store = Arc::new(MemoryStore::default());
        let otp = Arc::new(FakeOtp::accepting("123456"));
        let verifier = verifier_with(store.clone(), otp.clone());

        for bad in ["", "abc", "+0123456789", "1234567"] {
            let err = verifier.begin_phone_challenge(bad).await.unwrap_err();
            assert!(matches!(err, AuthError::Validation(_)), "{bad}");
        }

        assert_eq!(store.user_count(), 0);
        assert_eq!(otp.send_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_begin_challenge_surfaces_delivery_failure() {
        struct BrokenOtp;

        #[async_trait]
        impl OtpProvider for BrokenOtp {
            async fn send_code(&self, _phone: &str) -> AuthResult<()> {
                Err(AuthError::Delivery(anyhow::anyhow!("provider down")))
            }

            async fn check_code(&self, _phone: &str, _code: &str) -> AuthResult<bool> {
                Ok(false)
            }
        }

        let store = Arc::new(MemoryStore::default());
        let verifier = CredentialVerifier::new(store.clone(), Arc::new(BrokenOtp));

        let err = verifier.begin_phone_challenge(PHONE).await.unwrap_err();
        assert!(matches!(err, AuthError::Delivery(_)));
        // The account is created before delivery is attempted
        assert_eq!(store.user_count(), 1);
    }

    #[tokio::test]
    async fn test_complete_challenge_with_valid_code_resolves_user() {
        let store = Arc::new(MemoryStore::default());
        let otp = Arc::new(FakeOtp::accepting("123456"));
        let verifier = verifier_with(store.clone(), otp.clone());

        verifier.begin_phone_challenge(PHONE).await.unwrap();
        let user = verifier
            .complete_phone_challenge(PHONE, "123456")
            .await
            .unwrap();

        assert_eq!(user.phone, PHONE);
        assert_eq!(user.role, Role::User);
    }

    #[tokio::test]
    async fn test_complete_challenge_with_wrong_code_fails() {
        let store = Arc::new(MemoryStore::default());
        let otp = Arc::new(FakeOtp::accepting("123456"));
        let verifier = verifier_with(store.clone(), otp.clone());

        verifier.begin_phone_challenge(PHONE).await.unwrap();
        let err = verifier
            .complete_phone_challenge(PHONE, "000000")
            .await
            .unwrap_err();

        assert!(matches!(err, AuthError::InvalidCredential));
    }

    #[tokio::test]
    async fn test_complete_challenge_for_unknown_phone_fails() {
        let store = Arc::new(MemoryStore::default());
        let otp = Arc::new(FakeOtp::accepting("123456"));
        let verifier = verifier_with(store, otp);

        let err = verifier
            .complete_phone_challenge(PHONE, "123456")
            .await
            .unwrap_err();

        assert!(matches!(err, AuthError::NotFound));
    }

    #[tokio::test]
    async fn test_complete_challenge_requires_both_fields() {
        let store = Arc::new(MemoryStore::default());
        let otp = Arc::new(FakeOtp::accepting("123456"));
        let verifier = verifier_with(store, otp);

        let err = verifier.complete_phone_challenge("", "123456").await.unwrap_err();
        assert!(matches!(err, AuthError::Validation(_)));

        let err = verifier.complete_phone_challenge(PHONE, "").await.unwrap_err();
        assert!(matches!(err, AuthError::Validation(_)));
    }

    #[tokio::test]
    async fn test_register_twice_conflicts() {
        let store = Arc::new(MemoryStore::default());
        let otp = Arc::new(FakeOtp::accepting("123456"));
        let verifier = verifier_with(store.clone(), otp);

        verifier
            .register_with_password(Some("Asha"), PHONE, "secret123")
            .await
            .unwrap();
        let err = verifier
            .register_with_password(Some("Asha"), PHONE, "secret123")
            .await
            .unwrap_err();

        assert!(matches!(err, AuthError::Conflict));
        assert_eq!(store.user_count(), 1);
    }

    #[tokio::test]
    async fn test_password_login_on_otp_only_account() {
        let store = Arc::new(MemoryStore::default());
        let otp = Arc::new(FakeOtp::accepting("123456"));
        let verifier = verifier_with(store, otp);

        // Account created via OTP flow, no password ever set
        verifier.begin_phone_challenge(PHONE).await.unwrap();

        let err = verifier.verify_password(PHONE, "whatever").await.unwrap_err();
        assert!(matches!(err, AuthError::PasswordNotEnabled));
    }

    #[tokio::test]
    async fn test_password_login_round_trip() {
        let store = Arc::new(MemoryStore::default());
        let otp = Arc::new(FakeOtp::accepting("123456"));
        let verifier = verifier_with(store, otp);

        let registered = verifier
            .register_with_password(None, PHONE, "secret123")
            .await
            .unwrap();

        let err = verifier.verify_password(PHONE, "wrong-pass").await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidCredential));

        let user = verifier.verify_password(PHONE, "secret123").await.unwrap();
        assert_eq!(user.id, registered.id);
        assert_eq!(user.role, registered.role);
    }

    #[tokio::test]
    async fn test_otp_login_session_resolves_to_same_user() {
        use crate::jwt::{JwtConfig, TokenService};

        let store = Arc::new(MemoryStore::default());
        let otp = Arc::new(FakeOtp::accepting("123456"));
        let verifier = verifier_with(store.clone(), otp);
        let tokens = TokenService::new(JwtConfig {
            secret: "test-secret".to_string(),
            session_ttl: 604800,
        })
        .unwrap();

        verifier.begin_phone_challenge(PHONE).await.unwrap();
        let user = verifier
            .complete_phone_challenge(PHONE, "123456")
            .await
            .unwrap();

        // The issued session resolves back to the same account
        let token = tokens.issue(&user).unwrap();
        let claims = tokens.validate(&token).unwrap();
        assert_eq!(claims.sub, user.id);
        assert_eq!(claims.exp - claims.iat, 604800);

        let resolved = store.find_by_id(claims.sub).await.unwrap().unwrap();
        assert_eq!(resolved.id, user.id);
        assert_eq!(resolved.role, Role::User);
    }

    #[tokio::test]
    async fn test_password_login_for_unknown_phone() {
        let store = Arc::new(MemoryStore::default());
        let otp = Arc::new(FakeOtp::accepting("123456"));
        let verifier = verifier_with(store, otp);

        let err = verifier.verify_password(PHONE, "secret123").await.unwrap_err();
        assert!(matches!(err, AuthError::NotFound));
    }
}
