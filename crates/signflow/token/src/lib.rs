//! Capability token issuer for signing links.
//!
//! Tokens are self-contained HS256 JWTs carrying the document id, the
//! signer email and an absolute expiry. The issuer keeps no record of what
//! it minted: possession of a token that verifies IS the grant. There is
//! consequently no revocation list; replacing a document's signer batch
//! (which deletes the old signer rows) is the only revocation mechanism.
//!
//! Verification is pure. It never consults a store, so it stays correct
//! even after the originating signer row was deleted or replaced. Callers
//! performing state-changing actions must re-check that the claimed signer
//! row still exists.

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use signflow_types::{DocumentId, SigningError};

/// Purpose claim value for signing-link tokens. Tokens minted for any
/// other purpose never verify as signing links.
pub const SIGNING_LINK_PURPOSE: &str = "signing_link";

/// Default time-to-live for signing links, in hours.
pub const DEFAULT_TTL_HOURS: u64 = 72;

/// Claims carried by a signing-link token.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SigningClaims {
    pub document_id: DocumentId,
    pub signer_email: String,
    /// Absolute expiry (Unix timestamp, seconds).
    pub exp: i64,
    pub purpose: String,
}

/// Token issuer errors.
#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("issuer configuration: {0}")]
    Config(String),

    #[error("token is malformed or its signature does not verify")]
    Invalid,

    #[error("token is expired")]
    Expired,

    #[error("token is valid but minted for a different purpose")]
    WrongPurpose,
}

impl From<TokenError> for SigningError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Expired => SigningError::ExpiredToken,
            TokenError::WrongPurpose => SigningError::WrongTokenPurpose,
            TokenError::Invalid | TokenError::Config(_) => SigningError::InvalidToken,
        }
    }
}

/// Result type alias for token operations.
pub type TokenResult<T> = Result<T, TokenError>;

/// Mints and verifies signing-link tokens.
#[derive(Clone)]
pub struct TokenIssuer {
    secret: String,
    ttl: Duration,
}

impl TokenIssuer {
    /// Create an issuer.
    ///
    /// The secret must be at least 32 bytes; weak secrets are rejected at
    /// construction rather than at verification time.
    pub fn new(secret: impl Into<String>, ttl_hours: u64) -> TokenResult<Self> {
        let secret = secret.into();
        if secret.is_empty() {
            return Err(TokenError::Config("token secret is required".into()));
        }
        if secret.len() < 32 {
            return Err(TokenError::Config(
                "token secret must be at least 32 characters".into(),
            ));
        }
        Ok(Self {
            secret,
            ttl: Duration::hours(ttl_hours as i64),
        })
    }

    /// Mint an opaque signing-link token for one signer on one document.
    pub fn mint(&self, document_id: DocumentId, signer_email: &str) -> TokenResult<String> {
        let expires_at = Utc::now() + self.ttl;
        let claims = SigningClaims {
            document_id,
            signer_email: signer_email.to_string(),
            exp: expires_at.timestamp(),
            purpose: SIGNING_LINK_PURPOSE.to_string(),
        };

        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )
        .map_err(|_| TokenError::Invalid)
    }

    /// Decode and check a token: signature, expiry, then purpose.
    pub fn verify(&self, token: &str) -> TokenResult<SigningClaims> {
        let mut validation = Validation::default();
        validation.leeway = 0;

        let data = decode::<SigningClaims>(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &validation,
        )
        .map_err(|err| match err.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => TokenError::Expired,
            _ => TokenError::Invalid,
        })?;

        if data.claims.purpose != SIGNING_LINK_PURPOSE {
            return Err(TokenError::WrongPurpose);
        }

        Ok(data.claims)
    }

    /// The configured time-to-live.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }
}
