use crate::{Result, TestInfraError};
use sqlx::mysql::MySqlPoolOptions;
use sqlx::MySqlPool;
use std::time::Duration;
use testcontainers::core::{IntoContainerPort, WaitFor};
use testcontainers::runners::AsyncRunner;
use testcontainers::ImageExt;
use testcontainers::{ContainerAsync, GenericImage};
use tracing::debug;
use typed_builder::TypedBuilder;

const MYSQL_PORT: u16 = 3306;
const CONNECT_ATTEMPTS: usize = 20;
const CONNECT_BACKOFF: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, TypedBuilder)]
pub struct MysqlConfig {
    #[builder(default = "8.4".to_string())]
    tag: String,
    #[builder(default = "burrow".to_string())]
    database: String,
    #[builder(default = "burrow".to_string())]
    username: String,
    #[builder(default = "burrow".to_string())]
    password: String,
}

impl Default for MysqlConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// A throwaway MySQL server. The container stops when this is dropped.
pub struct MySqlServer {
    container: ContainerAsync<GenericImage>,
    config: MysqlConfig,
}

impl MySqlServer {
    pub async fn start(config: MysqlConfig) -> Result<Self> {
        let container = GenericImage::new("mysql", config.tag.as_str())
            .with_exposed_port(MYSQL_PORT.tcp())
            .with_wait_for(WaitFor::message_on_stderr("ready for connections"))
            .with_env_var("MYSQL_DATABASE", config.database.as_str())
            .with_env_var("MYSQL_USER", config.username.as_str())
            .with_env_var("MYSQL_PASSWORD", config.password.as_str())
            .with_env_var("MYSQL_ROOT_PASSWORD", "root")
            .start()
            .await?;

        Ok(Self { container, config })
    }

    pub async fn database_url(&self) -> Result<String> {
        let host = self.container.get_host().await?;
        let port = self.container.get_host_port_ipv4(MYSQL_PORT).await?;
        Ok(format!(
            "mysql://{}:{}@{}:{}/{}",
            self.config.username, self.config.password, host, port, self.config.database
        ))
    }

    /// Opens a pool, retrying while the server finishes booting.
    ///
    /// MySQL logs "ready for connections" once for the init server and again
    /// for the real one, so the first attempts may be refused.
    pub async fn connect(&self) -> Result<MySqlPool> {
        let url = self.database_url().await?;
        let mut attempt = 0;

        loop {
            attempt += 1;
            match MySqlPoolOptions::new().max_connections(5).connect(&url).await {
                Ok(pool) => return Ok(pool),
                Err(source) if attempt >= CONNECT_ATTEMPTS => {
                    return Err(TestInfraError::Connect {
                        attempts: attempt,
                        source,
                    });
                }
                Err(err) => {
                    debug!(attempt, error = %err, "mysql not ready yet");
                    tokio::time::sleep(CONNECT_BACKOFF).await;
                }
            }
        }
    }
}
