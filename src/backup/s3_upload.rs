// mysql-s3-backup/src/backup/s3_upload.rs
use std::path::Path;
use std::time::Duration;

use aws_sdk_s3 as s3;
use s3::config::Region;
use s3::primitives::ByteStream;
use s3::types::StorageClass;

use crate::config::StorageConfig;
use crate::errors::{BackupError, Result};

/// Fixed-delay retry policy for the upload stage. No exponential backoff: a
/// single cold-file transfer does not need one.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: usize,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            max_attempts: 3,
            delay: Duration::from_secs(5),
        }
    }
}

/// Destination seam for the archive. The production impl talks to S3; tests
/// substitute recording or failing stand-ins.
pub trait ArtifactStore {
    async fn put(&self, local_path: &Path, key: &str) -> Result<()>;
}

/// Uploads to an S3-compatible store (AWS or a custom endpoint such as
/// DigitalOcean Spaces). Every `put` builds a fresh client, so a stale
/// session on one attempt cannot poison the next.
pub struct S3ArtifactStore {
    storage: StorageConfig,
}

impl S3ArtifactStore {
    pub fn new(storage: StorageConfig) -> Self {
        S3ArtifactStore { storage }
    }

    async fn client(&self) -> s3::Client {
        let mut loader = aws_config::defaults(s3::config::BehaviorVersion::latest());
        if let Some(endpoint) = &self.storage.endpoint_url {
            loader = loader.endpoint_url(endpoint);
        }
        if let Some(region) = &self.storage.region {
            loader = loader.region(Region::new(region.clone()));
        }
        if let (Some(key_id), Some(secret)) = (
            &self.storage.access_key_id,
            &self.storage.secret_access_key,
        ) {
            loader = loader.credentials_provider(s3::config::Credentials::new(
                key_id, secret, None, // session_token
                None, // expiry
                "Static",
            ));
        }
        s3::Client::new(&loader.load().await)
    }
}

impl ArtifactStore for S3ArtifactStore {
    async fn put(&self, local_path: &Path, key: &str) -> Result<()> {
        let client = self.client().await;

        let body = ByteStream::from_path(local_path).await.map_err(|e| {
            BackupError::Upload(format!(
                "Failed to read artifact {}: {}",
                local_path.display(),
                e
            ))
        })?;

        // Backups are cold data, so hint the infrequent-access tier.
        client
            .put_object()
            .bucket(&self.storage.bucket_name)
            .key(key)
            .storage_class(StorageClass::StandardIa)
            .body(body)
            .send()
            .await
            .map_err(|e| {
                BackupError::Upload(format!(
                    "Failed to upload {} to bucket {} with key {}: {}",
                    local_path.display(),
                    self.storage.bucket_name,
                    key,
                    e
                ))
            })?;
        Ok(())
    }
}

/// Derives the remote object key: `<prefix>/<timestamp_id>.sql.gz` with the
/// prefix stripped of leading and trailing slashes.
pub fn object_key(prefix: Option<&str>, timestamp_id: &str) -> String {
    let file_name = format!("{}.sql.gz", timestamp_id);
    match prefix.map(|p| p.trim_matches('/')).filter(|p| !p.is_empty()) {
        Some(p) => format!("{}/{}", p, file_name),
        None => file_name,
    }
}

/// Runs `store.put` under the retry policy: a failed attempt is logged and
/// retried after a fixed delay; the first success returns immediately;
/// exhausting the budget is an UploadError carrying the last attempt's error.
pub async fn upload_with_retry<S: ArtifactStore>(
    store: &S,
    policy: RetryPolicy,
    local_path: &Path,
    key: &str,
) -> Result<()> {
    let mut last_error = String::new();

    for attempt in 1..=policy.max_attempts {
        println!(
            "☁️ Upload attempt {}/{} for key {}",
            attempt, policy.max_attempts, key
        );
        match store.put(local_path, key).await {
            Ok(()) => {
                println!("✅ Successfully uploaded {} as {}", local_path.display(), key);
                return Ok(());
            }
            Err(e) => {
                eprintln!("⚠️ Upload attempt {} failed: {}", attempt, e);
                last_error = e.to_string();
            }
        }
        if attempt < policy.max_attempts {
            tokio::time::sleep(policy.delay).await;
        }
    }

    Err(BackupError::Upload(format!(
        "Giving up after {} attempts. Last error: {}",
        policy.max_attempts, last_error
    )))
}
