//! Upload of finished artifacts to S3-compatible object storage.

use std::{
    collections::HashMap,
    fmt,
    path::Path,
    sync::{Arc, Mutex},
};

use async_trait::async_trait;
use aws_config::{BehaviorVersion, retry::RetryConfig};
use aws_credential_types::{Credentials, provider::SharedCredentialsProvider};
use aws_sdk_s3::{Client, config::Region, error::DisplayErrorContext, primitives::ByteStream};
use bytes::Bytes;
use thiserror::Error;
use tracing::{error, info};

use crate::error::{EtlError, Result};

pub const CSV_CONTENT_TYPE: &str = "text/csv";

/// Bucket location and credentials for the destination store.
///
/// Credentials are resolved by the caller; nothing here reads the process
/// environment or the shared AWS config files.
#[derive(Clone)]
pub struct S3Settings {
    pub bucket: String,
    pub region: String,
    pub endpoint: Option<String>,
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: Option<String>,
    pub force_path_style: bool,
}

impl fmt::Debug for S3Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("S3Settings")
            .field("bucket", &self.bucket)
            .field("region", &self.region)
            .field("endpoint", &self.endpoint)
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .field("session_token", &self.session_token.as_ref().map(|_| "<redacted>"))
            .field("force_path_style", &self.force_path_style)
            .finish()
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("sdk error: {0}")]
    Sdk(String),
}

impl StoreError {
    /// Keep the whole source chain: the SDK's own `Display` stops at labels
    /// such as "dispatch failure" or "service error".
    fn from_sdk<E: std::error::Error>(err: E) -> Self {
        Self::Sdk(DisplayErrorContext(&err).to_string())
    }
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    fn bucket(&self) -> &str;

    async fn put_object(
        &self,
        key: &str,
        bytes: Bytes,
        content_type: &str,
    ) -> std::result::Result<(), StoreError>;
}

#[derive(Clone)]
pub struct S3ObjectStore {
    client: Client,
    bucket: String,
}

impl S3ObjectStore {
    pub async fn new(settings: &S3Settings) -> std::result::Result<Self, StoreError> {
        if settings.bucket.is_empty() {
            return Err(StoreError::Configuration(
                "bucket name cannot be empty".into(),
            ));
        }

        let credentials = Credentials::new(
            settings.access_key_id.clone(),
            settings.secret_access_key.clone(),
            settings.session_token.clone(),
            None,
            "weather-etl-config",
        );

        let shared_config = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(settings.region.clone()))
            .credentials_provider(SharedCredentialsProvider::new(credentials))
            .retry_config(RetryConfig::disabled())
            .load()
            .await;
        let mut builder = aws_sdk_s3::config::Builder::from(&shared_config);

        if let Some(endpoint) = &settings.endpoint {
            builder = builder.endpoint_url(endpoint);
        }

        if settings.force_path_style {
            builder = builder.force_path_style(true);
        }

        Ok(Self {
            client: Client::from_conf(builder.build()),
            bucket: settings.bucket.clone(),
        })
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    fn bucket(&self) -> &str {
        &self.bucket
    }

    async fn put_object(
        &self,
        key: &str,
        bytes: Bytes,
        content_type: &str,
    ) -> std::result::Result<(), StoreError> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(bytes.to_vec()))
            .content_type(content_type)
            .send()
            .await
            .map_err(StoreError::from_sdk)?;
        Ok(())
    }
}

/// Object store kept in process memory. Can be told to reject every upload.
#[derive(Debug, Clone, Default)]
pub struct MemoryObjectStore {
    bucket: String,
    objects: Arc<Mutex<HashMap<String, Bytes>>>,
    failure: Option<String>,
}

impl MemoryObjectStore {
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            ..Self::default()
        }
    }

    /// A store whose uploads all fail with `cause`.
    pub fn failing(bucket: impl Into<String>, cause: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            failure: Some(cause.into()),
            ..Self::default()
        }
    }

    pub fn get(&self, key: &str) -> Option<Bytes> {
        self.lock().get(key).cloned()
    }

    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.lock().keys().cloned().collect();
        keys.sort();
        keys
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Bytes>> {
        self.objects.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    fn bucket(&self) -> &str {
        &self.bucket
    }

    async fn put_object(
        &self,
        key: &str,
        bytes: Bytes,
        _content_type: &str,
    ) -> std::result::Result<(), StoreError> {
        if let Some(cause) = &self.failure {
            return Err(StoreError::Sdk(cause.clone()));
        }
        self.lock().insert(key.to_string(), bytes);
        Ok(())
    }
}

/// Where a published artifact ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteObjectRef {
    pub bucket: String,
    pub key: String,
}

impl fmt::Display for RemoteObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "s3://{}/{}", self.bucket, self.key)
    }
}

/// `{country}/{filename}`.
pub fn remote_key(country: &str, filename: &str) -> String {
    format!("{country}/{filename}")
}

pub struct RemotePublisher<S> {
    store: S,
}

impl<S: ObjectStore> RemotePublisher<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Upload `local_path` under `{country}/{filename}`.
    ///
    /// A failure is logged with its cause and returned as
    /// [`EtlError::Publish`]; nothing is retried.
    pub async fn publish(
        &self,
        local_path: &Path,
        country: &str,
        filename: &str,
    ) -> Result<RemoteObjectRef> {
        let target = RemoteObjectRef {
            bucket: self.store.bucket().to_string(),
            key: remote_key(country, filename),
        };

        match self.upload(local_path, &target.key).await {
            Ok(()) => {
                info!(location = %target, "file successfully uploaded to S3");
                Ok(target)
            }
            Err(cause) => {
                error!(location = %target, %cause, "error uploading file to S3");
                Err(EtlError::Publish {
                    location: target.to_string(),
                    cause,
                })
            }
        }
    }

    async fn upload(&self, local_path: &Path, key: &str) -> std::result::Result<(), String> {
        let contents = tokio::fs::read(local_path)
            .await
            .map_err(|e| format!("failed to read {}: {e}", local_path.display()))?;

        self.store
            .put_object(key, Bytes::from(contents), CSV_CONTENT_TYPE)
            .await
            .map_err(|e| e.to_string())
    }
}
