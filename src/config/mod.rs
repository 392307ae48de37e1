// mysql-s3-backup/src/config/mod.rs
use std::env;
use std::path::PathBuf;
use url::Url;

use crate::errors::{BackupError, Result};

const DEFAULT_MYSQL_PORT: u16 = 3306;

/// Raw connection inputs as they arrive from the environment, before any
/// precedence or validation is applied.
#[derive(Debug, Clone, Default)]
pub struct ConnectionSources {
    pub database_url: Option<String>,
    pub host: Option<String>,
    pub port: Option<String>,
    pub user: Option<String>,
    pub password: Option<String>,
    pub database: Option<String>,
    pub socket: Option<String>,
}

/// Normalized, validated connection descriptor. Constructed once per run and
/// immutable afterwards; never persisted anywhere.
#[derive(Debug, Clone)]
pub struct ConnectionSettings {
    pub host: Option<String>,
    pub port: u16,
    pub user: String,
    pub password: Option<String>,
    pub database: String,
    pub socket: Option<String>,
}

impl ConnectionSettings {
    /// A socket path, when present, wins over host/port addressing.
    pub fn uses_socket(&self) -> bool {
        self.socket.is_some()
    }
}

/// Object store destination. Credentials and region are optional: when the
/// static pair is absent the SDK's default provider chain is used instead.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub bucket_name: String,
    pub key_prefix: Option<String>,
    pub region: Option<String>,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    pub endpoint_url: Option<String>,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub connection: ConnectionSettings,
    pub storage: StorageConfig,
    pub tmp_root: PathBuf,
}

fn env_opt(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.is_empty())
}

impl ConnectionSources {
    pub fn from_env() -> Self {
        ConnectionSources {
            database_url: env_opt("DATABASE_URL"),
            host: env_opt("MYSQL_HOST"),
            port: env_opt("MYSQL_PORT"),
            user: env_opt("MYSQL_USER"),
            password: env_opt("MYSQL_PASSWORD"),
            database: env_opt("MYSQL_DATABASE"),
            socket: env_opt("MYSQL_SOCKET"),
        }
    }

    /// Resolves the raw inputs into a validated descriptor. A DATABASE_URL
    /// overrides every discrete field when present.
    pub fn resolve(&self) -> Result<ConnectionSettings> {
        let settings = match &self.database_url {
            Some(url) => Self::from_url(url)?,
            None => self.from_discrete()?,
        };
        settings.validate()?;
        Ok(settings)
    }

    fn from_url(raw: &str) -> Result<ConnectionSettings> {
        let parsed = Url::parse(raw)?;
        if parsed.scheme() != "mysql" {
            return Err(BackupError::Config(
                "DATABASE_URL must use the mysql:// scheme".to_string(),
            ));
        }

        let socket = parsed
            .query_pairs()
            .find(|(k, _)| k == "unix_socket")
            .map(|(_, v)| v.into_owned());

        Ok(ConnectionSettings {
            host: parsed.host_str().map(|h| h.to_string()),
            port: parsed.port().unwrap_or(DEFAULT_MYSQL_PORT),
            user: parsed.username().to_string(),
            password: parsed.password().map(|p| p.to_string()),
            database: parsed.path().trim_start_matches('/').to_string(),
            socket,
        })
    }

    fn from_discrete(&self) -> Result<ConnectionSettings> {
        let port = match &self.port {
            Some(p) => p.parse::<u16>().map_err(|_| {
                BackupError::Config(format!("MYSQL_PORT is not a valid port number: {}", p))
            })?,
            None => DEFAULT_MYSQL_PORT,
        };

        Ok(ConnectionSettings {
            host: self.host.clone(),
            port,
            user: self.user.clone().unwrap_or_default(),
            password: self.password.clone(),
            database: self.database.clone().unwrap_or_default(),
            socket: self.socket.clone(),
        })
    }
}

impl ConnectionSettings {
    fn validate(&self) -> Result<()> {
        if self.database.is_empty() {
            return Err(BackupError::Config(
                "Missing required MYSQL_DATABASE (or database name in DATABASE_URL)".to_string(),
            ));
        }
        if self.user.is_empty() {
            return Err(BackupError::Config(
                "Missing required MYSQL_USER (or username in DATABASE_URL)".to_string(),
            ));
        }
        if self.host.is_none() && self.socket.is_none() {
            return Err(BackupError::Config(
                "Missing required MYSQL_HOST or MYSQL_SOCKET".to_string(),
            ));
        }
        Ok(())
    }
}

impl StorageConfig {
    pub fn from_env() -> Result<Self> {
        let bucket_name = env_opt("S3_BUCKET")
            .ok_or_else(|| BackupError::Config("Missing required S3_BUCKET".to_string()))?;

        let access_key_id = env_opt("AWS_ACCESS_KEY_ID");
        let secret_access_key = env_opt("AWS_SECRET_ACCESS_KEY");
        if access_key_id.is_some() != secret_access_key.is_some() {
            return Err(BackupError::Config(
                "AWS_ACCESS_KEY_ID and AWS_SECRET_ACCESS_KEY must be set together".to_string(),
            ));
        }

        Ok(StorageConfig {
            bucket_name,
            key_prefix: env_opt("S3_PREFIX"),
            region: env_opt("AWS_DEFAULT_REGION"),
            access_key_id,
            secret_access_key,
            endpoint_url: env_opt("AWS_ENDPOINT_URL"),
        })
    }
}

impl AppConfig {
    /// Reads the whole configuration from the environment exactly once.
    /// Everything downstream receives this struct by reference; nothing else
    /// touches the process environment.
    pub fn load_from_env() -> Result<Self> {
        let connection = ConnectionSources::from_env().resolve()?;
        let storage = StorageConfig::from_env()?;
        let tmp_root = env_opt("TEMP_DUMP_ROOT")
            .map(PathBuf::from)
            .unwrap_or_else(env::temp_dir);

        Ok(AppConfig {
            connection,
            storage,
            tmp_root,
        })
    }
}
