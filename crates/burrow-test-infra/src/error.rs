use std::result::Result as StdResult;
use thiserror::Error;

/// Errors raised while provisioning test containers.
#[derive(Debug, Error)]
pub enum TestInfraError {
    #[error("container error: {0}")]
    Container(#[from] testcontainers::TestcontainersError),

    #[error("database did not accept connections after {attempts} attempts: {source}")]
    Connect {
        attempts: usize,
        #[source]
        source: sqlx::Error,
    },
}

pub type Result<T> = StdResult<T, TestInfraError>;
