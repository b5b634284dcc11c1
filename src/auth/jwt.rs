//! JWT Token Service
//! Mission: Mint and verify access/refresh token pairs with an injected secret

use crate::auth::models::{Claims, TokenKind, TokenPair, User};
use anyhow::{Context, Result};
use chrono::Utc;
use jsonwebtoken::{decode, encode, errors::ErrorKind, DecodingKey, EncodingKey, Header, Validation};
use tracing::debug;
use uuid::Uuid;

const DEFAULT_ACCESS_TTL_MINUTES: i64 = 30;
const DEFAULT_REFRESH_TTL_DAYS: i64 = 7;

/// Token verification failures, split so callers can report expiry distinctly
#[derive(Debug, PartialEq, Eq)]
pub enum TokenError {
    Expired,
    Invalid,
}

impl std::fmt::Display for TokenError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TokenError::Expired => write!(f, "Token expired"),
            TokenError::Invalid => write!(f, "Invalid token"),
        }
    }
}

impl std::error::Error for TokenError {}

/// Signs and verifies the two halves of a token pair.
///
/// Key material and lifetimes are injected at construction; nothing here reads
/// ambient global state.
pub struct TokenService {
    secret: String,
    access_ttl_minutes: i64,
    refresh_ttl_days: i64,
}

impl TokenService {
    /// Create a token service with default lifetimes (30m access, 7d refresh)
    pub fn new(secret: String) -> Self {
        Self {
            secret,
            access_ttl_minutes: DEFAULT_ACCESS_TTL_MINUTES,
            refresh_ttl_days: DEFAULT_REFRESH_TTL_DAYS,
        }
    }

    /// Override token lifetimes (negative values are useful in expiry tests)
    pub fn with_ttls(mut self, access_ttl_minutes: i64, refresh_ttl_days: i64) -> Self {
        self.access_ttl_minutes = access_ttl_minutes;
        self.refresh_ttl_days = refresh_ttl_days;
        self
    }

    pub fn refresh_ttl_days(&self) -> i64 {
        self.refresh_ttl_days
    }

    /// Mint a fresh access + refresh pair for a user
    pub fn issue_pair(&self, user: &User) -> Result<TokenPair> {
        let access = self.sign(
            user,
            TokenKind::Access,
            chrono::Duration::minutes(self.access_ttl_minutes),
        )?;
        let refresh = self.sign(
            user,
            TokenKind::Refresh,
            chrono::Duration::days(self.refresh_ttl_days),
        )?;

        debug!("Issued token pair for user {}", user.id);

        Ok(TokenPair { access, refresh })
    }

    fn sign(&self, user: &User, kind: TokenKind, ttl: chrono::Duration) -> Result<String> {
        let now = Utc::now();
        let expiration = now
            .checked_add_signed(ttl)
            .context("Invalid token expiry timestamp")?
            .timestamp() as usize;

        let claims = Claims {
            sub: user.id.to_string(),
            token_type: kind,
            exp: expiration,
            iat: now.timestamp() as usize,
            jti: Uuid::new_v4().simple().to_string(),
        };

        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )
        .with_context(|| format!("Failed to sign {} token", kind.as_str()))
    }

    /// Verify an access token: signature, expiry, and token_type
    pub fn decode_access(&self, token: &str) -> Result<Claims, TokenError> {
        self.decode_kind(token, TokenKind::Access)
    }

    /// Verify a refresh token: signature, expiry, and token_type
    pub fn decode_refresh(&self, token: &str) -> Result<Claims, TokenError> {
        self.decode_kind(token, TokenKind::Refresh)
    }

    fn decode_kind(&self, token: &str, expected: TokenKind) -> Result<Claims, TokenError> {
        let decoded = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &Validation::default(),
        )
        .map_err(|e| match e.kind() {
            ErrorKind::ExpiredSignature => TokenError::Expired,
            _ => TokenError::Invalid,
        })?;

        // An access token never stands in for a refresh token, or vice versa
        if decoded.claims.token_type != expected {
            return Err(TokenError::Invalid);
        }

        Ok(decoded.claims)
    }
}
