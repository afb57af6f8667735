//! Identity-pool scoped storage credentials.
//!
//! `StorageCredentials` says *who* may write (an identity pool plus the
//! user pool login that proves membership). `CognitoIdentityPool` turns it
//! into short-lived AWS keys right before the upload that needs them.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use reqwest::{header, Client};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::debug;

use crate::auth::AuthToken;

use super::StorageError;

const TARGET_PREFIX: &str = "AWSCognitoIdentityService";
const AMZ_JSON: &str = "application/x-amz-json-1.1";

/// Login provider name of a user pool inside an identity pool.
pub fn login_provider(region: &str, user_pool_id: &str) -> String {
    format!("cognito-idp.{}.amazonaws.com/{}", region, user_pool_id)
}

#[derive(Clone, PartialEq, Eq)]
pub struct StorageCredentials {
    pub region: String,
    pub identity_pool_id: String,
    /// Login provider → id token
    pub logins: BTreeMap<String, String>,
}

impl StorageCredentials {
    pub fn for_user_pool(
        region: &str,
        user_pool_id: &str,
        identity_pool_id: &str,
        token: &AuthToken,
    ) -> Self {
        let logins = BTreeMap::from([(login_provider(region, user_pool_id), token.as_str().to_string())]);
        Self {
            region: region.to_string(),
            identity_pool_id: identity_pool_id.to_string(),
            logins,
        }
    }
}

impl fmt::Debug for StorageCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StorageCredentials")
            .field("region", &self.region)
            .field("identity_pool_id", &self.identity_pool_id)
            .field("providers", &self.logins.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Temporary AWS keys issued for an identity.
#[derive(Clone)]
pub struct AwsCredentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: Option<String>,
    pub expiration: Option<DateTime<Utc>>,
}

impl fmt::Debug for AwsCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AwsCredentials")
            .field("access_key_id", &self.access_key_id)
            .field("expiration", &self.expiration)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct GetIdRequest<'a> {
    identity_pool_id: &'a str,
    logins: &'a BTreeMap<String, String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct GetIdResponse {
    identity_id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct GetCredentialsRequest<'a> {
    identity_id: &'a str,
    logins: &'a BTreeMap<String, String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct GetCredentialsResponse {
    credentials: IssuedCredentials,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct IssuedCredentials {
    access_key_id: String,
    secret_key: String,
    session_token: Option<String>,
    /// Epoch seconds
    expiration: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
struct IdentityErrorBody {
    #[serde(rename = "__type", default)]
    error_type: Option<String>,
    #[serde(alias = "Message", default)]
    message: Option<String>,
}

/// Client for the Cognito identity pool credential exchange.
#[derive(Clone)]
pub struct CognitoIdentityPool {
    client: Client,
    endpoint: Option<String>,
}

impl CognitoIdentityPool {
    pub fn new(client: Client, endpoint: Option<String>) -> Self {
        Self { client, endpoint }
    }

    fn endpoint_for(&self, region: &str) -> String {
        self.endpoint
            .clone()
            .unwrap_or_else(|| format!("https://cognito-identity.{}.amazonaws.com/", region))
    }

    async fn call<B, T>(&self, region: &str, operation: &str, body: &B) -> Result<T, StorageError>
    where
        B: Serialize,
        T: DeserializeOwned,
    {
        let payload = serde_json::to_vec(body)
            .map_err(|e| StorageError::InvalidResponse(e.to_string()))?;
        let response = self
            .client
            .post(self.endpoint_for(region))
            .header(header::CONTENT_TYPE, AMZ_JSON)
            .header("X-Amz-Target", format!("{}.{}", TARGET_PREFIX, operation))
            .body(payload)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        if status.is_success() {
            serde_json::from_str(&text).map_err(|e| StorageError::InvalidResponse(e.to_string()))
        } else {
            let body: IdentityErrorBody = serde_json::from_str(&text).unwrap_or_default();
            let code = body
                .error_type
                .map(|t| t.rsplit('#').next().unwrap_or_default().to_string())
                .unwrap_or_else(|| format!("HTTP {}", status.as_u16()));
            Err(StorageError::Identity {
                code,
                message: body.message.unwrap_or(text),
            })
        }
    }

    /// Exchange the user pool login for temporary AWS keys.
    pub async fn resolve(&self, credentials: &StorageCredentials) -> Result<AwsCredentials, StorageError> {
        let id: GetIdResponse = self
            .call(
                &credentials.region,
                "GetId",
                &GetIdRequest {
                    identity_pool_id: &credentials.identity_pool_id,
                    logins: &credentials.logins,
                },
            )
            .await?;
        debug!(identity_id = %id.identity_id, "Resolved identity");

        let issued: GetCredentialsResponse = self
            .call(
                &credentials.region,
                "GetCredentialsForIdentity",
                &GetCredentialsRequest {
                    identity_id: &id.identity_id,
                    logins: &credentials.logins,
                },
            )
            .await?;

        let issued = issued.credentials;
        Ok(AwsCredentials {
            access_key_id: issued.access_key_id,
            secret_access_key: issued.secret_key,
            session_token: issued.session_token,
            expiration: issued
                .expiration
                .and_then(|secs| DateTime::from_timestamp(secs as i64, 0)),
        })
    }
}
