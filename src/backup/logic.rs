// mysql-s3-backup/src/backup/logic.rs
use std::fs;
use std::path::{Path, PathBuf};

use chrono::Utc;

use crate::backup::db_dump::DumpPipeline;
use crate::backup::s3_upload::{self, ArtifactStore, RetryPolicy};
use crate::config::AppConfig;
use crate::errors::Result;

/// Names one run's artifact. The UTC second-precision timestamp id is shared
/// between the local file and the remote key, so concurrent runs cannot
/// collide and a remote object can always be traced back to its local file.
#[derive(Debug, Clone)]
pub struct ArtifactHandle {
    pub local_path: PathBuf,
    pub timestamp_id: String,
}

impl ArtifactHandle {
    pub fn new(tmp_root: &Path) -> Self {
        let timestamp_id = Utc::now().format("%Y-%m-%dT%H%M%SZ").to_string();
        let local_path = tmp_root.join(format!("{}.sql.gz", timestamp_id));
        ArtifactHandle {
            local_path,
            timestamp_id,
        }
    }
}

/// Sequences dump -> upload -> cleanup against an already-resolved
/// configuration. Any stage failure aborts the run and leaves the artifact on
/// disk: a partial dump for inspection, a complete one for out-of-band upload
/// without re-dumping. Only a confirmed upload triggers local removal.
pub async fn run_backup<S: ArtifactStore>(
    config: &AppConfig,
    store: &S,
    pipeline: DumpPipeline,
    retry: RetryPolicy,
) -> Result<()> {
    let artifact = ArtifactHandle::new(&config.tmp_root);
    println!(
        "📦 Dumping database {} to {}",
        config.connection.database,
        artifact.local_path.display()
    );

    let result = pipeline.run(&artifact.local_path)?;
    debug_assert!(result.filter_completed);
    println!(
        "✓ Dump producer exited cleanly (code {})",
        result.producer_exit_code
    );

    match fs::metadata(&artifact.local_path) {
        Ok(meta) => println!("✓ Dump complete ({} bytes compressed)", meta.len()),
        Err(e) => eprintln!("⚠️ Could not stat artifact after dump: {}", e),
    }

    let key = s3_upload::object_key(
        config.storage.key_prefix.as_deref(),
        &artifact.timestamp_id,
    );
    println!(
        "📤 Uploading to bucket {} with key {}",
        config.storage.bucket_name, key
    );
    s3_upload::upload_with_retry(store, retry, &artifact.local_path, &key).await?;

    // The backup is durable remotely; a failed local removal is only noise.
    match fs::remove_file(&artifact.local_path) {
        Ok(()) => println!("🧹 Removed local artifact {}", artifact.local_path.display()),
        Err(e) => eprintln!(
            "⚠️ Failed to remove local artifact {}: {}",
            artifact.local_path.display(),
            e
        ),
    }

    Ok(())
}
