// mysql-s3-backup/src/backup/db_dump.rs
use std::fs::File;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use which::which;

use crate::config::ConnectionSettings;
use crate::errors::{BackupError, Result};

/// Outcome of one pipeline run. Only produced when both children exited
/// cleanly; a nonzero exit on either side is reported as an error instead.
#[derive(Debug)]
pub struct PipelineResult {
    pub producer_exit_code: i32,
    pub filter_completed: bool,
}

/// A dump producer piped into a compression filter, writing to a local
/// artifact file. The bytes stream through an OS pipe; the parent never holds
/// the dump in memory, so database size is bounded only by local disk.
pub struct DumpPipeline {
    producer: Command,
    filter: Command,
    description: String,
}

fn find_executable(name: &str) -> Result<PathBuf> {
    which(name).map_err(|_| {
        BackupError::Dump(format!(
            "{} executable not found in PATH. Please ensure it is installed.",
            name
        ))
    })
}

impl DumpPipeline {
    /// Builds the real mysqldump | gzip pipeline for the given connection.
    pub fn mysql(settings: &ConnectionSettings) -> Result<Self> {
        let mysqldump_path = find_executable("mysqldump")?;
        let gzip_path = find_executable("gzip")?;

        let mut producer = Command::new(&mysqldump_path);
        producer.arg("-u").arg(&settings.user).arg("--no-tablespaces");

        let mut shown_args = vec![
            "-u".to_string(),
            settings.user.clone(),
            "--no-tablespaces".to_string(),
        ];

        if let Some(socket) = &settings.socket {
            println!("🔌 Using socket connection: {}", socket);
            producer.arg("--socket").arg(socket);
            shown_args.push("--socket".to_string());
            shown_args.push(socket.clone());
        } else {
            // Addressing mode was validated at config time, so host is present.
            let host = settings.host.as_deref().unwrap_or_default();
            println!("🔌 Using TCP connection: {}:{}", host, settings.port);
            producer.arg("-h").arg(host).arg("-P").arg(settings.port.to_string());
            shown_args.push("-h".to_string());
            shown_args.push(host.to_string());
            shown_args.push("-P".to_string());
            shown_args.push(settings.port.to_string());
        }

        if let Some(password) = &settings.password {
            // Plaintext argv handoff, matching the historical behavior. The
            // value is redacted from every log line.
            producer.arg(format!("--password={}", password));
            shown_args.push("--password=***".to_string());
        }

        producer.arg(&settings.database);
        shown_args.push(settings.database.clone());

        let mut filter = Command::new(&gzip_path);
        filter.arg("-c");

        Ok(DumpPipeline {
            producer,
            filter,
            description: format!("mysqldump {} | gzip -c", shown_args.join(" ")),
        })
    }

    /// Wires an arbitrary producer/filter pair. The orchestrator tests use
    /// this with synthetic shell commands in place of mysqldump and gzip.
    pub fn from_commands(producer: Command, filter: Command) -> Self {
        let description = format!(
            "{} | {}",
            producer.get_program().to_string_lossy(),
            filter.get_program().to_string_lossy()
        );
        DumpPipeline {
            producer,
            filter,
            description,
        }
    }

    /// Runs producer and filter concurrently, streaming the compressed output
    /// into `artifact_path` (truncating any stale file there). Blocks until
    /// both children have exited. On any failure the partial artifact is left
    /// on disk for inspection.
    pub fn run(mut self, artifact_path: &Path) -> Result<PipelineResult> {
        println!("🚀 Starting dump pipeline: {}", self.description);

        let mut producer_child = self
            .producer
            .stdout(Stdio::piped())
            .spawn()
            .map_err(|e| BackupError::Dump(format!("Failed to start dump producer: {}", e)))?;

        let producer_stdout = producer_child.stdout.take().ok_or_else(|| {
            BackupError::Dump("Dump producer has no captured stdout".to_string())
        })?;

        let artifact_file = File::create(artifact_path)?;

        // Spawning the filter consumes the parent's only handle to the
        // producer's stdout pipe. If the filter dies early (disk full, bad
        // filter), the producer gets a broken pipe on its next write instead
        // of blocking forever on a pipe nobody drains.
        let mut filter_child = self
            .filter
            .stdin(Stdio::from(producer_stdout))
            .stdout(Stdio::from(artifact_file))
            .spawn()
            .map_err(|e| BackupError::Dump(format!("Failed to start compression filter: {}", e)))?;

        let filter_status = filter_child.wait()?;
        let producer_status = producer_child.wait()?;

        if !producer_status.success() {
            return Err(BackupError::Dump(format!(
                "Dump producer exited with status: {}",
                producer_status
            )));
        }
        if !filter_status.success() {
            return Err(BackupError::Dump(format!(
                "Compression filter exited with status: {}",
                filter_status
            )));
        }

        println!("✓ Dump pipeline completed");
        Ok(PipelineResult {
            producer_exit_code: producer_status.code().unwrap_or(0),
            filter_completed: true,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::read::GzDecoder;
    use std::io::Read;

    fn sh(script: &str) -> Command {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg(script);
        cmd
    }

    #[test]
    fn test_successful_run_reports_clean_exit() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let artifact = dir.path().join("out.gz");

        let pipeline = DumpPipeline::from_commands(sh("printf hello"), sh("cat"));
        let result = pipeline.run(&artifact)?;

        assert_eq!(result.producer_exit_code, 0);
        assert!(result.filter_completed);
        assert_eq!(std::fs::read(&artifact)?, b"hello");
        Ok(())
    }

    #[test]
    fn test_failing_producer_is_dump_error_and_artifact_remains() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let artifact = dir.path().join("out.gz");

        let pipeline =
            DumpPipeline::from_commands(sh("printf partial; exit 3"), sh("cat"));
        let err = pipeline.run(&artifact).unwrap_err();

        assert!(matches!(err, BackupError::Dump(_)));
        // The partial artifact is deliberately not cleaned up here.
        assert_eq!(std::fs::read(&artifact)?, b"partial");
        Ok(())
    }

    #[test]
    fn test_failing_filter_is_dump_error() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let artifact = dir.path().join("out.gz");

        let pipeline = DumpPipeline::from_commands(sh("printf hello"), sh("exit 2"));
        let err = pipeline.run(&artifact).unwrap_err();

        assert!(matches!(err, BackupError::Dump(_)));
        Ok(())
    }

    #[test]
    fn test_stale_artifact_is_truncated() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let artifact = dir.path().join("out.gz");
        std::fs::write(&artifact, b"stale contents from a previous run")?;

        let pipeline = DumpPipeline::from_commands(sh("printf fresh"), sh("cat"));
        pipeline.run(&artifact)?;

        assert_eq!(std::fs::read(&artifact)?, b"fresh");
        Ok(())
    }

    #[test]
    fn test_gzip_round_trip_through_pipeline() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let artifact = dir.path().join("out.sql.gz");

        let pipeline = DumpPipeline::from_commands(
            sh("printf 'CREATE TABLE t (id INT);\nINSERT INTO t VALUES (1);\n'"),
            sh("gzip -c"),
        );
        pipeline.run(&artifact)?;

        let mut decoded = String::new();
        GzDecoder::new(File::open(&artifact)?).read_to_string(&mut decoded)?;
        assert_eq!(
            decoded,
            "CREATE TABLE t (id INT);\nINSERT INTO t VALUES (1);\n"
        );
        Ok(())
    }

    #[test]
    fn test_large_stream_passes_through_without_buffering() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let artifact = dir.path().join("big.gz");

        // 64 MiB producer, far larger than any pipe buffer. The run succeeds
        // only if bytes stream through while both children are alive.
        let pipeline = DumpPipeline::from_commands(
            sh("dd if=/dev/zero bs=1048576 count=64 2>/dev/null"),
            sh("gzip -c"),
        );
        pipeline.run(&artifact)?;

        let mut decoder = GzDecoder::new(File::open(&artifact)?);
        let mut total = 0usize;
        let mut buf = [0u8; 65536];
        loop {
            let n = decoder.read(&mut buf)?;
            if n == 0 {
                break;
            }
            total += n;
        }
        assert_eq!(total, 64 * 1024 * 1024);
        Ok(())
    }

    #[test]
    fn test_mysql_pipeline_redacts_password() -> anyhow::Result<()> {
        // Only runs where the real client tools are installed.
        if which("mysqldump").is_err() || which("gzip").is_err() {
            return Ok(());
        }
        let settings = ConnectionSettings {
            host: Some("localhost".to_string()),
            port: 3306,
            user: "u".to_string(),
            password: Some("hunter2".to_string()),
            database: "db".to_string(),
            socket: None,
        };
        let pipeline = DumpPipeline::mysql(&settings)?;
        assert!(!pipeline.description.contains("hunter2"));
        assert!(pipeline.description.contains("--password=***"));
        Ok(())
    }
}
