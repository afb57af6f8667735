use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use tracing::{debug, error};

use crate::config::{CognitoConfig, StorageConfig};

use super::sigv4::{self, SigningRequest};
use super::{CognitoIdentityPool, ObjectStore, PutObject, StorageCredentials, StorageError};

const SERVICE: &str = "s3";

/// Uploads straight to S3 with identity-pool credentials.
pub struct S3ObjectStore {
    client: Client,
    bucket: String,
    region: String,
    endpoint: Option<String>,
    identity: CognitoIdentityPool,
}

/// Where a PUT goes and the pieces the signature needs.
#[derive(Debug, PartialEq, Eq)]
struct ObjectLocation {
    url: String,
    host: String,
    path: String,
}

impl S3ObjectStore {
    pub fn new(client: Client, storage: &StorageConfig, cognito: &CognitoConfig) -> Self {
        let identity = CognitoIdentityPool::new(client.clone(), cognito.identity_endpoint.clone());
        Self {
            client,
            bucket: storage.bucket.clone(),
            region: cognito.region.clone(),
            endpoint: storage.endpoint.clone(),
            identity,
        }
    }

    /// Virtual-hosted style on AWS, path style on an override endpoint.
    fn locate(&self, key: &str) -> ObjectLocation {
        let encoded_key = sigv4::encode_key(key);
        match &self.endpoint {
            Some(endpoint) => {
                let base = endpoint.trim_end_matches('/');
                let host = base
                    .split_once("://")
                    .map(|(_, rest)| rest)
                    .unwrap_or(base)
                    .to_string();
                let path = format!("/{}/{}", self.bucket, encoded_key);
                ObjectLocation {
                    url: format!("{}{}", base, path),
                    host,
                    path,
                }
            }
            None => {
                let host = format!("{}.s3.{}.amazonaws.com", self.bucket, self.region);
                let path = format!("/{}", encoded_key);
                ObjectLocation {
                    url: format!("https://{}{}", host, path),
                    host,
                    path,
                }
            }
        }
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn put_object(
        &self,
        object: PutObject<'_>,
        credentials: &StorageCredentials,
    ) -> Result<(), StorageError> {
        let aws = self.identity.resolve(credentials).await?;
        let location = self.locate(object.key);
        let payload_hash = sigv4::sha256_hex(object.body);

        let mut headers = BTreeMap::from([
            ("content-type".to_string(), object.content_type.to_string()),
            ("x-amz-content-sha256".to_string(), payload_hash.clone()),
        ]);
        if let Some(token) = &aws.session_token {
            headers.insert("x-amz-security-token".to_string(), token.clone());
        }

        let signed = sigv4::sign(
            &SigningRequest {
                method: "PUT",
                host: &location.host,
                path: &location.path,
                query: "",
                headers: &headers,
                payload_hash: &payload_hash,
            },
            &self.region,
            SERVICE,
            &aws,
            Utc::now(),
        )?;

        debug!(bucket = %self.bucket, key = object.key, bytes = object.body.len(), "Uploading object");
        let mut request = self
            .client
            .put(&location.url)
            .header("authorization", signed.authorization)
            .header("x-amz-date", signed.amz_date)
            .body(object.body.to_vec());
        for (name, value) in &headers {
            request = request.header(name.as_str(), value.as_str());
        }

        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            let body = response.text().await.unwrap_or_default();
            error!(status = %status, key = object.key, "Upload rejected");
            Err(StorageError::Upload {
                status: status.as_u16(),
                body,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store(endpoint: Option<&str>) -> S3ObjectStore {
        let storage = StorageConfig {
            bucket: "uploads".to_string(),
            endpoint: endpoint.map(str::to_string),
        };
        let cognito = CognitoConfig {
            region: "us-east-1".to_string(),
            ..CognitoConfig::default()
        };
        S3ObjectStore::new(Client::new(), &storage, &cognito)
    }

    #[test]
    fn test_locate_virtual_hosted() {
        let location = store(None).locate("alice/1700000000000_data.csv");
        assert_eq!(
            location,
            ObjectLocation {
                url: "https://uploads.s3.us-east-1.amazonaws.com/alice/1700000000000_data.csv".to_string(),
                host: "uploads.s3.us-east-1.amazonaws.com".to_string(),
                path: "/alice/1700000000000_data.csv".to_string(),
            }
        );
    }

    #[test]
    fn test_locate_path_style_override() {
        let location = store(Some("http://127.0.0.1:9000/")).locate("a@b.com/1_x.csv");
        assert_eq!(location.host, "127.0.0.1:9000");
        assert_eq!(location.path, "/uploads/a%40b.com/1_x.csv");
        assert_eq!(location.url, "http://127.0.0.1:9000/uploads/a%40b.com/1_x.csv");
    }
}
