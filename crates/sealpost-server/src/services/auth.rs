// ============================================
// File: crates/sealpost-server/src/services/auth.rs
// ============================================
//! # Authentication Service
//!
//! ## Creation Reason
//! Resolves the bearer credential presented in the `auth` frame to an
//! account before any relay operation is allowed.
//!
//! ## Main Functionality
//! - `Authenticator`: async capability trait
//! - `TokenAuthenticator`: HMAC-SHA256 signed bearer tokens
//! - `AuthenticatedUser`: identity bound to a connection
//!
//! ## Token Format
//! ```text
//! base64url(claims_json) "." base64url(hmac_sha256(secret, base64url(claims_json)))
//!
//! claims_json = {"sub": 1, "username": "alice", "admin": false, "exp": 1700000000}
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - Signature is verified before the claims are parsed
//! - The account is re-read on every authentication: disabled or deleted
//!   users are refused even with an unexpired token, and the admin flag
//!   comes from storage, not the token
//! - Every failure is `AuthenticationFailed`; the reason is for logs only
//!
//! ## Last Modified
//! v0.1.0 - HMAC bearer tokens

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD as BASE64URL, Engine};
use hmac::{Hmac, Mac};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use tracing::{debug, warn};
use zeroize::Zeroizing;

use sealpost_common::{IdentityId, Timestamp};

use crate::config::{AuthConfig, TOKEN_SECRET_ENV};
use crate::error::{Result, ServerError};
use crate::services::storage::{Storage, UserRecord};

type HmacSha256 = Hmac<Sha256>;

/// Default token lifetime (4 hours).
pub const DEFAULT_TOKEN_TTL: Duration = Duration::from_secs(4 * 60 * 60);

// ============================================
// Authenticator
// ============================================

/// Identity bound to a connection after a successful handshake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedUser {
    /// Account id
    pub id: IdentityId,
    /// Login name
    pub username: String,
    /// Admin role
    pub is_admin: bool,
}

/// Verifies bearer credentials.
#[async_trait]
pub trait Authenticator: Send + Sync {
    /// Resolves `token` to an account.
    ///
    /// # Errors
    /// `AuthenticationFailed` for any invalid, expired or unusable token.
    async fn authenticate(&self, token: &str) -> Result<AuthenticatedUser>;
}

// ============================================
// TokenAuthenticator
// ============================================

/// Signed token payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Account id
    pub sub: IdentityId,
    /// Login name at issue time
    pub username: String,
    /// Admin role at issue time
    pub admin: bool,
    /// Expiry, unix seconds
    pub exp: i64,
}

/// Issues and verifies HMAC-SHA256 bearer tokens.
pub struct TokenAuthenticator {
    secret: Zeroizing<Vec<u8>>,
    ttl: Duration,
    storage: Arc<dyn Storage>,
}

impl TokenAuthenticator {
    /// Creates an authenticator signing with `secret`.
    pub fn new(secret: impl Into<Vec<u8>>, ttl: Duration, storage: Arc<dyn Storage>) -> Self {
        Self {
            secret: Zeroizing::new(secret.into()),
            ttl,
            storage,
        }
    }

    /// Creates an authenticator with a fresh random secret.
    ///
    /// Tokens it issues do not survive a restart.
    pub fn ephemeral(ttl: Duration, storage: Arc<dyn Storage>) -> Self {
        let mut secret = vec![0u8; 32];
        rand::thread_rng().fill_bytes(&mut secret);
        Self::new(secret, ttl, storage)
    }

    /// Creates an authenticator from the `[auth]` section.
    ///
    /// Falls back to an ephemeral secret when none is configured.
    pub fn from_config(config: &AuthConfig, storage: Arc<dyn Storage>) -> Self {
        match &config.token_secret {
            Some(secret) => Self::new(secret.as_bytes(), config.token_ttl(), storage),
            None => {
                warn!(
                    "No auth.token_secret configured (set {}): using a per-process secret",
                    TOKEN_SECRET_ENV
                );
                Self::ephemeral(config.token_ttl(), storage)
            }
        }
    }

    /// Token lifetime.
    #[must_use]
    pub const fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Issues a token for `user`, valid from now.
    ///
    /// # Errors
    /// `Internal` if the claims cannot be encoded.
    pub fn issue(&self, user: &UserRecord) -> Result<String> {
        self.issue_at(user, Timestamp::now())
    }

    /// Issues a token for `user` as if the current time were `now`.
    ///
    /// # Errors
    /// `Internal` if the claims cannot be encoded.
    pub fn issue_at(&self, user: &UserRecord, now: Timestamp) -> Result<String> {
        let ttl = i64::try_from(self.ttl.as_secs()).unwrap_or(i64::MAX);
        let claims = TokenClaims {
            sub: user.id,
            username: user.username.clone(),
            admin: user.is_admin,
            exp: now.as_secs().saturating_add(ttl),
        };
        let json = serde_json::to_vec(&claims).map_err(|e| ServerError::internal(e.to_string()))?;
        let payload = BASE64URL.encode(json);
        let signature = BASE64URL.encode(self.sign(payload.as_bytes())?);
        Ok(format!("{payload}.{signature}"))
    }

    /// Checks signature and expiry, without consulting storage.
    ///
    /// # Errors
    /// `AuthenticationFailed` on any defect.
    pub fn verify(&self, token: &str) -> Result<TokenClaims> {
        self.verify_at(token, Timestamp::now())
    }

    /// Like [`verify`](Self::verify) at a given time.
    ///
    /// # Errors
    /// `AuthenticationFailed` on any defect.
    pub fn verify_at(&self, token: &str, now: Timestamp) -> Result<TokenClaims> {
        let (payload, signature) = token
            .split_once('.')
            .ok_or_else(|| ServerError::authentication_failed("token is not two segments"))?;

        let signature = BASE64URL
            .decode(signature)
            .map_err(|_| ServerError::authentication_failed("signature is not base64url"))?;

        let mut mac = self.mac()?;
        mac.update(payload.as_bytes());
        mac.verify_slice(&signature)
            .map_err(|_| ServerError::authentication_failed("signature mismatch"))?;

        let json = BASE64URL
            .decode(payload)
            .map_err(|_| ServerError::authentication_failed("claims are not base64url"))?;
        let claims: TokenClaims = serde_json::from_slice(&json)
            .map_err(|_| ServerError::authentication_failed("claims are not valid JSON"))?;

        if claims.exp <= now.as_secs() {
            return Err(ServerError::authentication_failed("token expired"));
        }

        Ok(claims)
    }

    fn mac(&self) -> Result<HmacSha256> {
        HmacSha256::new_from_slice(&self.secret)
            .map_err(|e| ServerError::internal(format!("hmac key: {e}")))
    }

    fn sign(&self, payload: &[u8]) -> Result<Vec<u8>> {
        let mut mac = self.mac()?;
        mac.update(payload);
        Ok(mac.finalize().into_bytes().to_vec())
    }
}

#[async_trait]
impl Authenticator for TokenAuthenticator {
    async fn authenticate(&self, token: &str) -> Result<AuthenticatedUser> {
        let claims = self.verify(token)?;

        let user = self
            .storage
            .get_user(claims.sub)
            .await?
            .ok_or_else(|| ServerError::authentication_failed(format!("unknown user {}", claims.sub)))?;

        if user.disabled {
            return Err(ServerError::authentication_failed(format!(
                "user {} is disabled",
                user.id
            )));
        }

        debug!(user_id = %user.id, "Token accepted");

        Ok(AuthenticatedUser {
            id: user.id,
            username: user.username,
            is_admin: user.is_admin,
        })
    }
}

impl std::fmt::Debug for TokenAuthenticator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenAuthenticator")
            .field("secret", &"[REDACTED]")
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::storage::{MemoryStorage, NewUser};
    use sealpost_core::crypto::IdentityKeyPair;

    const SECRET: &[u8] = b"0123456789abcdef0123456789abcdef";

    async fn setup() -> (Arc<MemoryStorage>, TokenAuthenticator, UserRecord) {
        let storage = Arc::new(MemoryStorage::new());
        let user = storage
            .create_user(NewUser {
                username: "alice".into(),
                public_key: IdentityKeyPair::generate().public_key(),
                is_admin: true,
            })
            .await
            .unwrap();
        let auth = TokenAuthenticator::new(SECRET, DEFAULT_TOKEN_TTL, storage.clone());
        (storage, auth, user)
    }

    #[tokio::test]
    async fn test_issue_and_authenticate() {
        let (_storage, auth, user) = setup().await;
        let token = auth.issue(&user).unwrap();

        let authed = auth.authenticate(&token).await.unwrap();
        assert_eq!(
            authed,
            AuthenticatedUser {
                id: user.id,
                username: "alice".into(),
                is_admin: true,
            }
        );
    }

    #[tokio::test]
    async fn test_expired_token_rejected() {
        let (_storage, auth, user) = setup().await;
        let issued = Timestamp::from_millis(1_000_000_000_000);
        let token = auth.issue_at(&user, issued).unwrap();

        let ttl_ms = i64::try_from(DEFAULT_TOKEN_TTL.as_millis()).unwrap();
        assert!(auth
            .verify_at(&token, Timestamp::from_millis(issued.as_millis() + ttl_ms - 1000))
            .is_ok());
        let err = auth
            .verify_at(&token, Timestamp::from_millis(issued.as_millis() + ttl_ms))
            .unwrap_err();
        assert!(matches!(err, ServerError::AuthenticationFailed { .. }));

        assert!(auth.authenticate(&token).await.is_err());
    }

    #[tokio::test]
    async fn test_tampered_token_rejected() {
        let (_storage, auth, user) = setup().await;
        let token = auth.issue(&user).unwrap();
        let (payload, signature) = token.split_once('.').unwrap();

        let forged_claims = TokenClaims {
            sub: IdentityId::new(2),
            username: "mallory".into(),
            admin: true,
            exp: i64::MAX,
        };
        let forged_payload = BASE64URL.encode(serde_json::to_vec(&forged_claims).unwrap());
        let forged = format!("{forged_payload}.{signature}");
        assert!(auth.authenticate(&forged).await.is_err());

        let mut bad_sig = BASE64URL.decode(signature).unwrap();
        bad_sig[0] ^= 1;
        let tampered = format!("{payload}.{}", BASE64URL.encode(bad_sig));
        assert!(auth.authenticate(&tampered).await.is_err());

        for garbage in ["", "no-dot", "a.b.c", "!!!.???"] {
            let err = auth.authenticate(garbage).await.unwrap_err();
            assert!(matches!(err, ServerError::AuthenticationFailed { .. }), "{garbage}");
        }
    }

    #[tokio::test]
    async fn test_from_config_uses_configured_secret() {
        let (storage, auth, user) = setup().await;
        let token = auth.issue(&user).unwrap();

        let config = AuthConfig {
            token_secret: Some(String::from_utf8(SECRET.to_vec()).unwrap()),
            ..AuthConfig::default()
        };
        let same = TokenAuthenticator::from_config(&config, storage.clone());
        assert!(same.authenticate(&token).await.is_ok());

        let ephemeral = TokenAuthenticator::from_config(&AuthConfig::default(), storage);
        assert!(ephemeral.authenticate(&token).await.is_err());
    }

    #[tokio::test]
    async fn test_other_secret_rejected() {
        let (storage, auth, user) = setup().await;
        let token = auth.issue(&user).unwrap();
        let other = TokenAuthenticator::ephemeral(DEFAULT_TOKEN_TTL, storage);
        assert!(other.authenticate(&token).await.is_err());
    }

    #[tokio::test]
    async fn test_disabled_and_unknown_users_rejected() {
        let (storage, auth, user) = setup().await;
        let token = auth.issue(&user).unwrap();

        storage.set_user_disabled(user.id, true).await.unwrap();
        let err = auth.authenticate(&token).await.unwrap_err();
        assert!(err.closes_connection());

        storage.set_user_disabled(user.id, false).await.unwrap();
        assert!(auth.authenticate(&token).await.is_ok());

        let ghost = UserRecord {
            id: IdentityId::new(77),
            ..user
        };
        let token = auth.issue(&ghost).unwrap();
        assert!(auth.authenticate(&token).await.is_err());
    }
}
