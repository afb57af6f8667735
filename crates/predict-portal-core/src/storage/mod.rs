//! Batch file storage.
//!
//! Uploads take their credentials as an argument. Nothing here keeps
//! process-wide credential state, so two uploads can not overwrite each
//! other's scope.

pub mod credentials;
pub mod s3;
pub mod sigv4;

use async_trait::async_trait;
use thiserror::Error;

pub use credentials::{login_provider, AwsCredentials, CognitoIdentityPool, StorageCredentials};
pub use s3::S3ObjectStore;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Identity pool error {code}: {message}")]
    Identity { code: String, message: String },

    #[error("Upload rejected with status {status}: {body}")]
    Upload { status: u16, body: String },

    #[error("Request signing failed: {0}")]
    Signing(String),

    #[error("Invalid storage response: {0}")]
    InvalidResponse(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
}

/// One object to write.
#[derive(Debug, Clone, Copy)]
pub struct PutObject<'a> {
    pub key: &'a str,
    pub body: &'a [u8],
    pub content_type: &'a str,
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Single upload attempt under the given credentials.
    async fn put_object(
        &self,
        object: PutObject<'_>,
        credentials: &StorageCredentials,
    ) -> Result<(), StorageError>;
}
