use crate::config;

use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use base64::{STANDARD, STANDARD_NO_PAD, URL_SAFE_NO_PAD, decode_config, encode_config};
use jwt_simple::JWTError;
use jwt_simple::algorithms::MACLike;
use jwt_simple::prelude::{
    Claims, Duration as JwtDuration, HS256Key, NoCustomClaims, VerificationOptions,
};
use rand::rngs::OsRng;
use rand::{CryptoRng, RngCore};
use uuid::Uuid;

use std::collections::HashSet;
use std::sync::LazyLock;

pub const TOKEN_ISSUER: &str = "herald";

#[derive(Debug, Clone)]
pub struct AuthState {
    key: HS256Key,
    issuer: String,
    token_ttl: time::Duration,
}

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("invalid auth key")]
    InvalidKey,
    #[error("invalid token")]
    InvalidToken,
    #[error("token expired")]
    ExpiredToken,
    #[error("token missing subject")]
    MissingSubject,
    #[error("failed to sign token")]
    Signing,
    #[error("password hashing failed: {0}")]
    PasswordHash(String),
}

impl AuthState {
    pub fn from_config(config: &config::AuthConfig) -> Result<Self, AuthError> {
        let key_bytes = decode_key(&config.key)?;
        Ok(Self {
            key: HS256Key::from_bytes(&key_bytes),
            issuer: TOKEN_ISSUER.to_string(),
            token_ttl: config.token_ttl,
        })
    }

    pub fn issue_token(&self, user_id: Uuid) -> Result<String, AuthError> {
        let ttl_seconds = self.token_ttl.whole_seconds();
        if ttl_seconds <= 0 {
            return Err(AuthError::Signing);
        }
        let claims = Claims::create(JwtDuration::from_secs(ttl_seconds as u64))
            .with_subject(user_id)
            .with_issuer(&self.issuer);
        self.key
            .authenticate(claims)
            .map_err(|_| AuthError::Signing)
    }

    pub fn verify_token(&self, token: &str) -> Result<Uuid, AuthError> {
        let mut options = VerificationOptions::default();
        let mut issuers = HashSet::new();
        issuers.insert(self.issuer.clone());
        options.allowed_issuers = Some(issuers);

        let claims = self
            .key
            .verify_token::<NoCustomClaims>(token, Some(options))
            .map_err(|err| match err.downcast_ref::<JWTError>() {
                Some(JWTError::TokenHasExpired) => AuthError::ExpiredToken,
                _ => AuthError::InvalidToken,
            })?;

        if claims.expires_at.is_none() {
            return Err(AuthError::InvalidToken);
        }

        let subject = claims.subject.ok_or(AuthError::MissingSubject)?;
        Uuid::parse_str(subject.trim()).map_err(|_| AuthError::MissingSubject)
    }
}

fn decode_key(raw: &str) -> Result<Vec<u8>, AuthError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(AuthError::InvalidKey);
    }

    let decoded = decode_config(trimmed, URL_SAFE_NO_PAD)
        .or_else(|_| decode_config(trimmed, STANDARD))
        .or_else(|_| decode_config(trimmed, STANDARD_NO_PAD))
        .map_err(|_| AuthError::InvalidKey)?;

    if decoded.is_empty() {
        return Err(AuthError::InvalidKey);
    }

    Ok(decoded)
}

pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|err| AuthError::PasswordHash(err.to_string()))
}

/// False for a wrong password and for an unreadable stored hash alike.
pub fn verify_password(password: &str, password_hash: &str) -> bool {
    let hash = match PasswordHash::new(password_hash) {
        Ok(hash) => hash,
        Err(_) => return false,
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &hash)
        .is_ok()
}

// Verified against when no account matches, so every failed login runs argon2 once.
static PLACEHOLDER_HASH: LazyLock<Option<String>> =
    LazyLock::new(|| hash_password("herald-placeholder-password").ok());

/// Spends the same work as `verify_password` for a login without a matching account.
/// Always false.
pub fn verify_without_account(password: &str) -> bool {
    if let Some(hash) = PLACEHOLDER_HASH.as_deref() {
        let _ = verify_password(password, hash);
    }
    false
}

pub fn generate_auth_key() -> Result<String, AuthError> {
    let mut rng = OsRng;
    generate_auth_key_with_rng(&mut rng)
}

pub(crate) fn generate_auth_key_with_rng<R: RngCore + CryptoRng>(
    rng: &mut R,
) -> Result<String, AuthError> {
    let mut bytes = [0u8; 32];
    rng.fill_bytes(&mut bytes);
    let encoded = encode_config(bytes, URL_SAFE_NO_PAD);
    if encoded.is_empty() {
        return Err(AuthError::InvalidKey);
    }
    Ok(encoded)
}
