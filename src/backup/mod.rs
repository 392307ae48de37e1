mod logic;
pub(crate) mod db_dump;
pub(crate) mod s3_upload;

use crate::backup::db_dump::DumpPipeline;
use crate::backup::s3_upload::{RetryPolicy, S3ArtifactStore};
use crate::config::AppConfig;
use crate::errors::Result;

/// Public entry point for the backup flow: wires the real mysqldump | gzip
/// pipeline and the real S3 store into the orchestration logic.
pub async fn run_backup_flow(config: &AppConfig) -> Result<()> {
    let pipeline = DumpPipeline::mysql(&config.connection)?;
    let store = S3ArtifactStore::new(config.storage.clone());
    logic::run_backup(config, &store, pipeline, RetryPolicy::default()).await
}
