use serde::{Deserialize, Serialize};
use std::fmt::Display;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Opaque identity of the principal that created a record.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OwnerId(String);

impl OwnerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Mints a fresh random identity.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for OwnerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Execution-scoped values threaded through every storage call.
///
/// Carries the resolved identity of the caller and a cancellation signal.
/// Backends check the token between units of work and abort with
/// [`StorageError::Cancelled`](crate::StorageError::Cancelled) once it fires.
#[derive(Clone, Debug)]
pub struct RequestContext {
    owner: OwnerId,
    cancel: CancellationToken,
}

impl RequestContext {
    pub fn new(owner: OwnerId) -> Self {
        Self {
            owner,
            cancel: CancellationToken::new(),
        }
    }

    /// Context for work not done on behalf of a caller (e.g. the sweeper).
    pub fn system() -> Self {
        Self::new(OwnerId::new("system"))
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn owner(&self) -> &OwnerId {
        &self.owner
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Returns `Err(Cancelled)` once the context has been cancelled.
    pub fn check(&self) -> crate::Result<()> {
        if self.is_cancelled() {
            return Err(crate::StorageError::Cancelled);
        }
        Ok(())
    }
}
