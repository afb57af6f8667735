use std::fmt;
use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};

use super::AuthError;

/// Session file name in cache directory
const SESSION_FILE: &str = "session.json";

/// Tokens issued by the user pool for one sign-in, as persisted locally.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionData {
    pub username: String,
    pub id_token: String,
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A session whose token expiries have been read from the JWT claims.
#[derive(Debug, Clone)]
pub struct Session {
    data: SessionData,
    id_expires_at: DateTime<Utc>,
    access_expires_at: DateTime<Utc>,
}

impl Session {
    pub fn from_data(data: SessionData) -> Result<Self, AuthError> {
        let id_expires_at = token_expiry(&data.id_token)?;
        let access_expires_at = token_expiry(&data.access_token)?;
        Ok(Self {
            data,
            id_expires_at,
            access_expires_at,
        })
    }

    /// Valid while both the id and access tokens are unexpired.
    pub fn is_valid(&self) -> bool {
        self.is_valid_at(Utc::now())
    }

    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        now < self.id_expires_at && now < self.access_expires_at
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.id_expires_at.min(self.access_expires_at)
    }

    pub fn time_until_expiry(&self) -> Duration {
        self.expires_at() - Utc::now()
    }

    /// Get minutes remaining until expiry (for display)
    pub fn minutes_until_expiry(&self) -> i64 {
        self.time_until_expiry().num_minutes().max(0)
    }

    pub fn username(&self) -> &str {
        &self.data.username
    }

    pub fn id_token(&self) -> &str {
        &self.data.id_token
    }

    pub fn access_token(&self) -> &str {
        &self.data.access_token
    }

    pub fn refresh_token(&self) -> Option<&str> {
        self.data.refresh_token.as_deref()
    }

    pub fn data(&self) -> &SessionData {
        &self.data
    }
}

/// Signed id token presented on every prediction request. Never empty.
#[derive(Clone, PartialEq, Eq)]
pub struct AuthToken(String);

impl AuthToken {
    pub fn new(token: impl Into<String>) -> Option<Self> {
        let token = token.into();
        if token.trim().is_empty() {
            None
        } else {
            Some(Self(token))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for AuthToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AuthToken(<redacted>)")
    }
}

#[derive(Debug, Deserialize)]
struct ExpiryClaims {
    exp: i64,
}

/// Read the `exp` claim of a JWT. The signature is not checked here; the
/// API verifies it.
pub fn token_expiry(jwt: &str) -> Result<DateTime<Utc>, AuthError> {
    let mut validation = Validation::new(Algorithm::RS256);
    validation.insecure_disable_signature_validation();
    validation.validate_exp = false;
    validation.validate_aud = false;

    let claims = decode::<ExpiryClaims>(jwt, &DecodingKey::from_secret(&[]), &validation)
        .map_err(|e| AuthError::MalformedToken(e.to_string()))?
        .claims;
    DateTime::from_timestamp(claims.exp, 0)
        .ok_or_else(|| AuthError::MalformedToken(format!("exp out of range: {}", claims.exp)))
}

/// Local session cache, the on-disk equivalent of the identity SDK's
/// browser storage. Holds at most one signed-in user.
#[derive(Debug, Clone)]
pub struct SessionCache {
    cache_dir: PathBuf,
}

impl SessionCache {
    pub fn new(cache_dir: PathBuf) -> Self {
        Self { cache_dir }
    }

    /// Load session from disk. Expired sessions are returned too, their
    /// refresh token may still be good.
    pub fn load(&self) -> Result<Option<SessionData>> {
        let path = self.session_path();
        if !path.exists() {
            return Ok(None);
        }
        let contents = std::fs::read_to_string(&path)
            .context("Failed to read session file")?;
        let data = serde_json::from_str(&contents)
            .context("Failed to parse session file")?;
        Ok(Some(data))
    }

    /// Save session to disk
    pub fn save(&self, data: &SessionData) -> Result<()> {
        let path = self.session_path();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(data)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Clear session data
    pub fn clear(&self) -> Result<()> {
        let path = self.session_path();
        if path.exists() {
            std::fs::remove_file(path)?;
        }
        Ok(())
    }

    fn session_path(&self) -> PathBuf {
        self.cache_dir.join(SESSION_FILE)
    }
}
