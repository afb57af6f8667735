//! Cognito user pool client.
//!
//! Speaks the AWS JSON 1.1 protocol of the Cognito Identity Provider service
//! directly over reqwest. The app client must allow `USER_PASSWORD_AUTH`
//! and must not have a client secret.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::{header, Client};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::config::CognitoConfig;

use super::{
    AuthError, CodeDelivery, CredentialStore, CurrentUser, NewPasswordChallenge, Session,
    SessionCache, SessionData, SignInOutcome,
};

const TARGET_PREFIX: &str = "AWSCognitoIdentityProviderService";
const AMZ_JSON: &str = "application/x-amz-json-1.1";

const FLOW_USER_PASSWORD: &str = "USER_PASSWORD_AUTH";
const FLOW_REFRESH_TOKEN: &str = "REFRESH_TOKEN_AUTH";
const CHALLENGE_NEW_PASSWORD: &str = "NEW_PASSWORD_REQUIRED";

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct InitiateAuthRequest<'a> {
    auth_flow: &'a str,
    client_id: &'a str,
    auth_parameters: HashMap<&'a str, &'a str>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct RespondToAuthChallengeRequest<'a> {
    challenge_name: &'a str,
    client_id: &'a str,
    session: &'a str,
    challenge_responses: HashMap<&'a str, &'a str>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct ForgotPasswordRequest<'a> {
    client_id: &'a str,
    username: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct ConfirmForgotPasswordRequest<'a> {
    client_id: &'a str,
    username: &'a str,
    confirmation_code: &'a str,
    password: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct RevokeTokenRequest<'a> {
    token: &'a str,
    client_id: &'a str,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
struct AuthResponse {
    authentication_result: Option<AuthenticationResult>,
    challenge_name: Option<String>,
    session: Option<String>,
    challenge_parameters: HashMap<String, String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct AuthenticationResult {
    id_token: String,
    access_token: String,
    refresh_token: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
struct ForgotPasswordResponse {
    code_delivery_details: Option<CodeDeliveryDetails>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
struct CodeDeliveryDetails {
    destination: Option<String>,
    delivery_medium: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ProviderErrorBody {
    #[serde(rename = "__type", default)]
    error_type: Option<String>,
    #[serde(alias = "Message", default)]
    message: Option<String>,
}

pub struct CognitoUserPool {
    client: Client,
    endpoint: String,
    client_id: String,
    cache: SessionCache,
}

impl CognitoUserPool {
    pub fn new(client: Client, config: &CognitoConfig, cache: SessionCache) -> Self {
        let endpoint = config
            .endpoint
            .clone()
            .unwrap_or_else(|| format!("https://cognito-idp.{}.amazonaws.com/", config.region));
        Self {
            client,
            endpoint,
            client_id: config.user_pool_client_id.clone(),
            cache,
        }
    }

    async fn call<B, T>(&self, operation: &str, body: &B) -> Result<T, AuthError>
    where
        B: Serialize,
        T: DeserializeOwned,
    {
        let payload = serde_json::to_vec(body)
            .map_err(|e| AuthError::InvalidPayload(e.to_string()))?;

        debug!(operation = operation, "Calling user pool");
        let response = self
            .client
            .post(&self.endpoint)
            .header(header::CONTENT_TYPE, AMZ_JSON)
            .header("X-Amz-Target", format!("{}.{}", TARGET_PREFIX, operation))
            .body(payload)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;

        if status.is_success() {
            let text = if text.trim().is_empty() { "{}" } else { text.as_str() };
            serde_json::from_str(text).map_err(|e| AuthError::InvalidPayload(e.to_string()))
        } else {
            let body: ProviderErrorBody = serde_json::from_str(&text).unwrap_or_default();
            let error_type = body.error_type.unwrap_or_else(|| format!("HTTP {}", status.as_u16()));
            let message = body.message.unwrap_or(text);
            debug!(operation = operation, error_type = %error_type, "User pool call failed");
            Err(AuthError::from_provider(&error_type, message))
        }
    }

    /// Persist freshly issued tokens and wrap them as a session.
    fn store_session(
        &self,
        username: &str,
        result: AuthenticationResult,
        previous_refresh_token: Option<&str>,
    ) -> Result<Session, AuthError> {
        let data = SessionData {
            username: username.to_string(),
            id_token: result.id_token,
            access_token: result.access_token,
            // refresh responses do not repeat the refresh token
            refresh_token: result
                .refresh_token
                .or_else(|| previous_refresh_token.map(str::to_string)),
            created_at: Utc::now(),
        };
        let session = Session::from_data(data)?;
        self.cache
            .save(session.data())
            .map_err(|e| AuthError::Cache(format!("{:#}", e)))?;
        Ok(session)
    }

    async fn refresh(&self, data: &SessionData) -> Result<Session, AuthError> {
        let refresh_token = data
            .refresh_token
            .as_deref()
            .ok_or(AuthError::InvalidSession)?;

        let request = InitiateAuthRequest {
            auth_flow: FLOW_REFRESH_TOKEN,
            client_id: &self.client_id,
            auth_parameters: HashMap::from([("REFRESH_TOKEN", refresh_token)]),
        };
        let response: AuthResponse = self.call("InitiateAuth", &request).await?;
        let result = response
            .authentication_result
            .ok_or(AuthError::InvalidSession)?;

        debug!(username = %data.username, "Session refreshed");
        self.store_session(&data.username, result, Some(refresh_token))
    }
}

#[async_trait]
impl CredentialStore for CognitoUserPool {
    fn current_user(&self) -> Option<CurrentUser> {
        match self.cache.load() {
            Ok(data) => data.map(|d| CurrentUser::new(d.username)),
            Err(e) => {
                warn!(error = %e, "Failed to load session cache");
                None
            }
        }
    }

    async fn get_session(&self, user: &CurrentUser) -> Result<Session, AuthError> {
        let data = self
            .cache
            .load()
            .map_err(|e| AuthError::Cache(format!("{:#}", e)))?
            .ok_or(AuthError::NoCurrentUser)?;
        if data.username != user.username {
            return Err(AuthError::InvalidSession);
        }

        let session = Session::from_data(data)?;
        if session.is_valid() {
            return Ok(session);
        }

        let refreshed = self.refresh(session.data()).await?;
        if refreshed.is_valid() {
            Ok(refreshed)
        } else {
            Err(AuthError::InvalidSession)
        }
    }

    async fn sign_out(&self, user: &CurrentUser) -> Result<(), AuthError> {
        let cached = self.cache.load().ok().flatten();
        self.cache
            .clear()
            .map_err(|e| AuthError::Cache(format!("{:#}", e)))?;

        let refresh_token = cached
            .filter(|d| d.username == user.username)
            .and_then(|d| d.refresh_token);
        if let Some(token) = refresh_token {
            let request = RevokeTokenRequest {
                token: &token,
                client_id: &self.client_id,
            };
            if let Err(e) = self.call::<_, Value>("RevokeToken", &request).await {
                warn!(error = %e, "Failed to revoke refresh token");
            }
        }
        info!(username = %user.username, "Signed out");
        Ok(())
    }

    async fn authenticate(&self, username: &str, password: &str) -> Result<SignInOutcome, AuthError> {
        let request = InitiateAuthRequest {
            auth_flow: FLOW_USER_PASSWORD,
            client_id: &self.client_id,
            auth_parameters: HashMap::from([("USERNAME", username), ("PASSWORD", password)]),
        };
        let response: AuthResponse = self.call("InitiateAuth", &request).await?;

        if let Some(result) = response.authentication_result {
            return self.store_session(username, result, None).map(SignInOutcome::SignedIn);
        }

        match response.challenge_name.as_deref() {
            Some(CHALLENGE_NEW_PASSWORD) => {
                let session = response.session.ok_or_else(|| {
                    AuthError::InvalidPayload("challenge without session".to_string())
                })?;
                // answered under the name the user signed in with, so the
                // cached session and upload prefix stay keyed by it
                let challenge_user = username.to_string();
                let required_attributes = response
                    .challenge_parameters
                    .get("requiredAttributes")
                    .and_then(|raw| serde_json::from_str::<Vec<String>>(raw).ok())
                    .unwrap_or_default();
                Ok(SignInOutcome::NewPasswordRequired(NewPasswordChallenge {
                    username: challenge_user,
                    session,
                    required_attributes,
                }))
            }
            Some(other) => Err(AuthError::Provider {
                code: "UnsupportedChallenge".to_string(),
                message: other.to_string(),
            }),
            None => Err(AuthError::InvalidPayload(
                "neither tokens nor a challenge in response".to_string(),
            )),
        }
    }

    async fn complete_new_password(
        &self,
        challenge: &NewPasswordChallenge,
        new_password: &str,
    ) -> Result<Session, AuthError> {
        let request = RespondToAuthChallengeRequest {
            challenge_name: CHALLENGE_NEW_PASSWORD,
            client_id: &self.client_id,
            session: &challenge.session,
            challenge_responses: HashMap::from([
                ("USERNAME", challenge.username.as_str()),
                ("NEW_PASSWORD", new_password),
            ]),
        };
        let response: AuthResponse = self.call("RespondToAuthChallenge", &request).await?;
        let result = response.authentication_result.ok_or_else(|| {
            AuthError::InvalidPayload("challenge answered without tokens".to_string())
        })?;
        self.store_session(&challenge.username, result, None)
    }

    async fn forgot_password(&self, username: &str) -> Result<CodeDelivery, AuthError> {
        let request = ForgotPasswordRequest {
            client_id: &self.client_id,
            username,
        };
        let response: ForgotPasswordResponse = self.call("ForgotPassword", &request).await?;
        let details = response.code_delivery_details.unwrap_or_default();
        Ok(CodeDelivery {
            destination: details.destination,
            medium: details.delivery_medium,
        })
    }

    async fn confirm_password(
        &self,
        username: &str,
        code: &str,
        new_password: &str,
    ) -> Result<(), AuthError> {
        let request = ConfirmForgotPasswordRequest {
            client_id: &self.client_id,
            username,
            confirmation_code: code,
            password: new_password,
        };
        let _: Value = self.call("ConfirmForgotPassword", &request).await?;
        Ok(())
    }
}
