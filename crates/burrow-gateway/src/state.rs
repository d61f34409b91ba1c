use crate::auth::AuthKeys;
use burrow_storage::StorageEngine;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use typed_builder::TypedBuilder;

#[derive(Clone, TypedBuilder)]
pub struct AppState {
    storage: StorageEngine,
    #[builder(setter(into))]
    base_url: Arc<str>,
    auth: AuthKeys,
    /// Background work spawned by handlers stops when this fires.
    #[builder(default)]
    shutdown: CancellationToken,
}

impl AppState {
    pub fn storage(&self) -> &StorageEngine {
        &self.storage
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn auth(&self) -> &AuthKeys {
        &self.auth
    }

    pub fn shutdown(&self) -> &CancellationToken {
        &self.shutdown
    }
}
