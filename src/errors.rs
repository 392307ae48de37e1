use thiserror::Error;

/// One terminal error kind per failed run. Config failures happen before any
/// I/O and must never be retried; dump failures leave a partial artifact on
/// disk; upload failures are only surfaced after the retry budget is spent.
#[derive(Error, Debug)]
pub enum BackupError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Database dump failed: {0}")]
    Dump(String),

    #[error("Upload failed: {0}")]
    Upload(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("URL parsing error: {0}")]
    UrlParse(#[from] url::ParseError),
}

pub type Result<T> = std::result::Result<T, BackupError>;
