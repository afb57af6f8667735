//! Sends the two kinds of prediction request and the batch upload that
//! precedes a batch prediction.
//!
//! Every method takes an `AuthToken`, so nothing here can be called without
//! one. Each request is attempted exactly once.

use std::sync::Arc;

use chrono::Utc;
use serde_json::Value;
use tracing::{debug, info};

use crate::api::{ApiError, PredictionClient};
use crate::auth::{AuthToken, SessionAccessor};
use crate::models::{BatchFile, Features};
use crate::storage::{ObjectStore, PutObject, StorageError};

/// Storage key of an uploaded batch file: `<username>/<epoch-millis>_<filename>`.
///
/// Two uploads of the same file name by the same user in the same
/// millisecond get the same key, and the second overwrites the first.
pub fn object_key(username: &str, epoch_millis: i64, filename: &str) -> String {
    format!("{}/{}_{}", username, epoch_millis, filename)
}

#[derive(Clone)]
pub struct RequestDispatcher {
    api: PredictionClient,
    accessor: SessionAccessor,
    store: Arc<dyn ObjectStore>,
}

impl RequestDispatcher {
    pub fn new(api: PredictionClient, accessor: SessionAccessor, store: Arc<dyn ObjectStore>) -> Self {
        Self { api, accessor, store }
    }

    pub async fn predict_single(&self, token: &AuthToken, features: &Features) -> Result<Value, ApiError> {
        debug!(?features, "Requesting single prediction");
        self.api.predict_single(token, features).await
    }

    /// Upload a batch file under the current user's prefix and return its key.
    pub async fn upload_batch_file(&self, token: &AuthToken, file: &BatchFile) -> Result<String, StorageError> {
        self.upload_batch_file_at(token, file, Utc::now().timestamp_millis())
            .await
    }

    pub async fn upload_batch_file_at(
        &self,
        token: &AuthToken,
        file: &BatchFile,
        epoch_millis: i64,
    ) -> Result<String, StorageError> {
        let key = object_key(&self.accessor.user_name(), epoch_millis, &file.name);
        let credentials = self.accessor.set_temporary_credentials(token);

        self.store
            .put_object(
                PutObject {
                    key: &key,
                    body: &file.bytes,
                    content_type: &file.content_type,
                },
                &credentials,
            )
            .await?;

        info!(key = %key, bytes = file.bytes.len(), "Batch file uploaded");
        Ok(key)
    }

    pub async fn predict_batch(&self, token: &AuthToken, file_key: &str) -> Result<Value, ApiError> {
        debug!(file_key = file_key, "Requesting batch prediction");
        self.api.predict_batch(token, file_key).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ApiConfig, CognitoConfig};
    use crate::mock::{MockCredentialStore, MockObjectStore};

    fn dispatcher(store: Arc<MockObjectStore>) -> RequestDispatcher {
        let cognito = CognitoConfig {
            user_pool_id: "us-east-1_pool".to_string(),
            region: "us-east-1".to_string(),
            identity_pool_id: "us-east-1:identity".to_string(),
            ..CognitoConfig::default()
        };
        let accessor = SessionAccessor::new(Arc::new(MockCredentialStore::signed_in("alice")), &cognito);
        let api = PredictionClient::with_client(
            reqwest::Client::new(),
            &ApiConfig {
                invoke_url: "http://127.0.0.1:9".to_string(),
                ..ApiConfig::default()
            },
        );
        RequestDispatcher::new(api, accessor, store)
    }

    #[test]
    fn test_object_key_format() {
        assert_eq!(
            object_key("alice@example.com", 1700000000000, "data.csv"),
            "alice@example.com/1700000000000_data.csv"
        );
    }

    #[test]
    fn test_object_key_collides_for_identical_inputs() {
        assert_eq!(object_key("alice", 42, "a.csv"), object_key("alice", 42, "a.csv"));
        assert_ne!(object_key("alice", 42, "a.csv"), object_key("alice", 43, "a.csv"));
    }

    #[tokio::test]
    async fn test_upload_uses_user_prefix_and_scoped_credentials() {
        let store = Arc::new(MockObjectStore::new());
        let dispatcher = dispatcher(store.clone());
        let token = AuthToken::new("id-token").unwrap();
        let file = BatchFile::new("data.csv", "text/csv", b"a,b\n1,2\n".to_vec());

        let key = dispatcher.upload_batch_file_at(&token, &file, 1700000000000).await.unwrap();
        assert_eq!(key, "alice/1700000000000_data.csv");

        let uploads = store.uploads();
        assert_eq!(uploads.len(), 1);
        assert_eq!(uploads[0].key, key);
        assert_eq!(uploads[0].content_type, "text/csv");
        assert_eq!(uploads[0].body, b"a,b\n1,2\n".to_vec());
        assert_eq!(
            uploads[0]
                .credentials
                .logins
                .get("cognito-idp.us-east-1.amazonaws.com/us-east-1_pool")
                .map(String::as_str),
            Some("id-token")
        );
    }

    #[tokio::test]
    async fn test_upload_failure_is_returned() {
        let dispatcher = dispatcher(Arc::new(MockObjectStore::failing("Access Denied")));
        let token = AuthToken::new("id-token").unwrap();
        let file = BatchFile::new("data.csv", "text/csv", Vec::new());

        let err = dispatcher.upload_batch_file(&token, &file).await.unwrap_err();
        assert!(err.to_string().contains("Access Denied"));
    }
}
