//! API client for the prediction REST endpoints.
//!
//! Every call is a single authenticated POST. There is no retry: a failed
//! request is reported to the caller once, with the response text intact.

use std::time::Duration;

use reqwest::{header, Client};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, error};

use crate::auth::AuthToken;
use crate::config::ApiConfig;
use crate::models::Features;

use super::ApiError;

#[derive(Debug, Serialize)]
struct BatchPredictionRequest<'a> {
    #[serde(rename = "fileKey")]
    file_key: &'a str,
}

/// HTTP client shared by every outbound call. A timeout is applied only
/// when configured.
pub fn build_http_client(config: &ApiConfig) -> Result<Client, ApiError> {
    let mut builder = Client::builder();
    if let Some(secs) = config.timeout_secs {
        builder = builder.timeout(Duration::from_secs(secs));
    }
    Ok(builder.build()?)
}

/// Client for the single and batch prediction endpoints.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct PredictionClient {
    client: Client,
    single_url: String,
    batch_url: String,
}

impl PredictionClient {
    /// Create a new client with its own connection pool.
    pub fn new(config: &ApiConfig) -> Result<Self, ApiError> {
        Ok(Self::with_client(build_http_client(config)?, config))
    }

    /// Create a client sharing an existing connection pool.
    pub fn with_client(client: Client, config: &ApiConfig) -> Self {
        Self {
            client,
            single_url: join_url(&config.invoke_url, &config.single_prediction_path),
            batch_url: join_url(&config.invoke_url, &config.batch_prediction_path),
        }
    }

    pub fn single_url(&self) -> &str {
        &self.single_url
    }

    pub fn batch_url(&self) -> &str {
        &self.batch_url
    }

    /// The token goes into `Authorization` as-is, without a `Bearer` prefix.
    fn auth_headers(token: &AuthToken) -> Result<header::HeaderMap, ApiError> {
        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            header::HeaderValue::from_str(token.as_str()).map_err(|_| ApiError::InvalidToken)?,
        );
        Ok(headers)
    }

    /// Check if response is successful, returning an error with body if not.
    async fn check_response(url: &str, response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            error!(
                url = url,
                status = %status,
                body = %ApiError::truncate_body(&body),
                "Prediction API returned an error"
            );
            Err(ApiError::from_status(status, &body))
        }
    }

    async fn post<B: Serialize>(&self, url: &str, token: &AuthToken, body: &B) -> Result<Value, ApiError> {
        debug!(url = url, "Sending prediction request");

        let response = self
            .client
            .post(url)
            .headers(Self::auth_headers(token)?)
            .json(body)
            .send()
            .await
            .map_err(|e| {
                error!(url = url, error = %e, "Prediction request failed");
                ApiError::from_transport(&e)
            })?;

        let response = Self::check_response(url, response).await?;
        let text = response
            .text()
            .await
            .map_err(|e| ApiError::from_transport(&e))?;

        serde_json::from_str(&text).map_err(|e| {
            ApiError::InvalidResponse(format!("{} in {}", e, ApiError::truncate_body(&text)))
        })
    }

    /// Run one record through the model. Returns the decoded response as-is.
    pub async fn predict_single(&self, token: &AuthToken, features: &Features) -> Result<Value, ApiError> {
        self.post(&self.single_url, token, features).await
    }

    /// Ask the model to score a previously uploaded file.
    pub async fn predict_batch(&self, token: &AuthToken, file_key: &str) -> Result<Value, ApiError> {
        let body = BatchPredictionRequest { file_key };
        self.post(&self.batch_url, token, &body).await
    }
}

/// Join the invoke URL and an endpoint path with exactly one slash between them.
fn join_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}
