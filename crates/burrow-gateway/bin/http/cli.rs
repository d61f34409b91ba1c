use burrow_storage::{StorageConfig, SweeperSettings};
use clap::{Parser, ValueEnum};
use std::fmt::{Display, Formatter};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

pub const SERVER_ADDRESS_ENV: &str = "SERVER_ADDRESS";
pub const BASE_URL_ENV: &str = "BASE_URL";
pub const FILE_STORAGE_PATH_ENV: &str = "FILE_STORAGE_PATH";
pub const DATABASE_DSN_ENV: &str = "DATABASE_DSN";
pub const SECRET_KEY_ENV: &str = "SECRET_KEY";
pub const SWEEP_INTERVAL_ENV: &str = "SWEEP_INTERVAL_SECS";
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

pub const DEFAULT_SERVER_ADDRESS: &str = "127.0.0.1:8080";
pub const DEFAULT_BASE_URL: &str = "http://localhost:8080";
pub const DEFAULT_SECRET_KEY: &str = "burrow-dev-secret";
pub const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 24 * 60 * 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    #[value(name = "text")]
    Text,
    #[value(name = "json")]
    Json,
}

impl Display for LogFormat {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            LogFormat::Text => write!(f, "text"),
            LogFormat::Json => write!(f, "json"),
        }
    }
}

#[derive(Debug, Parser)]
#[command(name = "burrow", about = "URL shortener HTTP server")]
pub struct CLI {
    #[arg(short = 'a', long, env = SERVER_ADDRESS_ENV, default_value = DEFAULT_SERVER_ADDRESS)]
    pub listen_addr: SocketAddr,

    /// Prefix of every short URL handed out.
    #[arg(short = 'b', long, env = BASE_URL_ENV, default_value = DEFAULT_BASE_URL)]
    pub base_url: String,

    #[arg(short = 'f', long, env = FILE_STORAGE_PATH_ENV)]
    pub file_storage_path: Option<PathBuf>,

    /// MySQL DSN; takes precedence over the file path.
    #[arg(short = 'd', long, env = DATABASE_DSN_ENV)]
    pub database_dsn: Option<String>,

    #[arg(
        short = 'k',
        long,
        env = SECRET_KEY_ENV,
        default_value = DEFAULT_SECRET_KEY,
        hide_env_values = true
    )]
    pub secret_key: String,

    #[arg(long, env = SWEEP_INTERVAL_ENV, default_value_t = DEFAULT_SWEEP_INTERVAL_SECS)]
    pub sweep_interval_secs: u64,

    #[arg(long, env = LOG_FORMAT_ENV, value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,
}

impl CLI {
    pub fn storage_config(&self) -> StorageConfig {
        StorageConfig {
            database_dsn: self.database_dsn.clone(),
            file_storage_path: self.file_storage_path.clone(),
        }
    }

    pub fn sweeper_settings(&self) -> SweeperSettings {
        SweeperSettings::builder()
            .interval(Duration::from_secs(self.sweep_interval_secs.max(1)))
            .build()
    }
}
