use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::StreamExt;
use s3::creds::Credentials;
use s3::error::S3Error;
use s3::{Bucket, Region};
use tokio_util::io::StreamReader;
use tracing::debug;

use super::error::StorageError;
use super::traits::{BoxReader, ObjectMetadata, ObjectStore, StoredObject, UploadReceipt};

/// Connection settings for an S3-compatible backend (AWS, R2, MinIO).
#[derive(Debug, Clone)]
pub struct S3Settings {
    pub bucket: String,
    pub region: String,
    /// Custom endpoint for non-AWS providers.
    pub endpoint: Option<String>,
    pub access_key: Option<String>,
    pub secret_key: Option<String>,
    /// Path-style addressing, required by MinIO.
    pub path_style: bool,
}

/// Object store backed by an S3-compatible bucket.
pub struct S3ObjectStore {
    bucket: Box<Bucket>,
}

impl S3ObjectStore {
    pub fn new(settings: &S3Settings) -> Result<Self, StorageError> {
        let region = match &settings.endpoint {
            Some(endpoint) => Region::Custom {
                region: settings.region.clone(),
                endpoint: endpoint.clone(),
            },
            None => settings
                .region
                .parse()
                .map_err(|e| StorageError::Backend(format!("invalid region: {e}")))?,
        };

        let credentials = match (&settings.access_key, &settings.secret_key) {
            (Some(access), Some(secret)) => {
                Credentials::new(Some(access), Some(secret), None, None, None)
            }
            // Fall through to the provider chain (env vars, profile, IAM).
            _ => Credentials::default(),
        }
        .map_err(|e| StorageError::Backend(format!("credentials: {e}")))?;

        let mut bucket = Bucket::new(&settings.bucket, region, credentials)
            .map_err(|e| StorageError::Backend(e.to_string()))?;
        if settings.path_style {
            bucket = bucket.with_path_style();
        }

        Ok(Self { bucket })
    }

    pub fn bucket_name(&self) -> String {
        self.bucket.name()
    }
}

fn map_s3_error(key: &str, err: S3Error) -> StorageError {
    match err {
        S3Error::HttpFailWithBody(404, _) => StorageError::NotFound(key.to_string()),
        other => StorageError::Backend(other.to_string()),
    }
}

fn ensure_success(key: &str, op: &str, code: u16) -> Result<(), StorageError> {
    if (200..300).contains(&code) {
        return Ok(());
    }
    if code == 404 {
        return Err(StorageError::NotFound(key.to_string()));
    }
    Err(StorageError::Backend(format!("{op} {key}: HTTP {code}")))
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn upload(
        &self,
        key: &str,
        data: &[u8],
        content_type: &str,
    ) -> Result<UploadReceipt, StorageError> {
        let response = self
            .bucket
            .put_object_with_content_type(key, data, content_type)
            .await
            .map_err(|e| map_s3_error(key, e))?;
        ensure_success(key, "put", response.status_code())?;

        Ok(UploadReceipt {
            key: key.to_string(),
            size: data.len() as u64,
            etag: response.headers().get("etag").cloned(),
        })
    }

    async fn get_bytes(&self, key: &str) -> Result<StoredObject, StorageError> {
        let response = self
            .bucket
            .get_object(key)
            .await
            .map_err(|e| map_s3_error(key, e))?;
        ensure_success(key, "get", response.status_code())?;

        let bytes = response.bytes().to_vec();
        let size = bytes.len() as u64;
        Ok(StoredObject {
            bytes,
            content_type: response.headers().get("content-type").cloned(),
            size,
        })
    }

    async fn get_stream(&self, key: &str) -> Result<BoxReader, StorageError> {
        let response = self
            .bucket
            .get_object_stream(key)
            .await
            .map_err(|e| map_s3_error(key, e))?;

        let stream = response
            .bytes
            .map(|chunk| chunk.map_err(|e| std::io::Error::other(e.to_string())));
        Ok(Box::new(StreamReader::new(stream)))
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        match self.bucket.delete_object(key).await {
            Ok(_) => Ok(()),
            // Already gone counts as deleted.
            Err(S3Error::HttpFailWithBody(404, _)) => {
                debug!(key = %key, "delete of missing object treated as success");
                Ok(())
            }
            Err(e) => Err(StorageError::Backend(e.to_string())),
        }
    }

    async fn exists(&self, key: &str) -> Result<bool, StorageError> {
        match self.bucket.head_object(key).await {
            Ok((_, code)) if (200..300).contains(&code) => Ok(true),
            Ok((_, 404)) => Ok(false),
            Ok((_, code)) => Err(StorageError::Backend(format!("head {key}: HTTP {code}"))),
            Err(S3Error::HttpFailWithBody(404, _)) => Ok(false),
            Err(e) => Err(StorageError::Backend(e.to_string())),
        }
    }

    async fn head(&self, key: &str) -> Result<ObjectMetadata, StorageError> {
        let (result, code) = self
            .bucket
            .head_object(key)
            .await
            .map_err(|e| map_s3_error(key, e))?;
        ensure_success(key, "head", code)?;

        let last_modified = result
            .last_modified
            .as_deref()
            .and_then(parse_http_date);

        Ok(ObjectMetadata {
            size: result.content_length.unwrap_or_default().max(0) as u64,
            etag: result.e_tag,
            last_modified,
        })
    }

    async fn presign_download(
        &self,
        key: &str,
        ttl_minutes: u32,
    ) -> Result<String, StorageError> {
        self.bucket
            .presign_get(key, ttl_minutes * 60, None)
            .await
            .map_err(|e| map_s3_error(key, e))
    }
}

fn parse_http_date(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc2822(value)
        .or_else(|_| DateTime::parse_from_rfc3339(value))
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}
