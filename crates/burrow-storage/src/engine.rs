use crate::{FileRepository, InMemoryRepository, MySqlRepository};
use async_trait::async_trait;
use burrow_core::{BatchOutcome, Incoming, RequestContext, Result, ShortCode, Storage, UserUrls};
use std::path::PathBuf;
use tracing::info;
use typed_builder::TypedBuilder;

/// Backend selection for [`StorageEngine::open`].
///
/// A database DSN wins over a snapshot path; with neither, records live only
/// in memory.
#[derive(Debug, Clone, Default, TypedBuilder)]
pub struct StorageConfig {
    #[builder(default, setter(strip_option))]
    pub database_dsn: Option<String>,
    #[builder(default, setter(strip_option))]
    pub file_storage_path: Option<PathBuf>,
}

/// The storage facade the rest of the service talks to.
#[derive(Debug, Clone)]
pub enum StorageEngine {
    Memory(InMemoryRepository),
    File(FileRepository),
    MySql(MySqlRepository),
}

impl StorageEngine {
    /// Opens the backend selected by `config`.
    ///
    /// Failing to reach the database or read the snapshot is returned as an
    /// error; the engine is unusable without its backend.
    pub async fn open(config: &StorageConfig) -> Result<Self> {
        if let Some(dsn) = config.database_dsn.as_deref().filter(|dsn| !dsn.is_empty()) {
            info!(backend = "mysql", "opening storage");
            return MySqlRepository::connect(dsn).await.map(Self::MySql);
        }

        if let Some(path) = &config.file_storage_path {
            info!(backend = "file", path = %path.display(), "opening storage");
            return FileRepository::open(path).await.map(Self::File);
        }

        info!(backend = "memory", "opening storage");
        Ok(Self::Memory(InMemoryRepository::new()))
    }

    pub fn backend(&self) -> &'static str {
        match self {
            Self::Memory(_) => "memory",
            Self::File(_) => "file",
            Self::MySql(_) => "mysql",
        }
    }

    fn inner(&self) -> &dyn Storage {
        match self {
            Self::Memory(repo) => repo,
            Self::File(repo) => repo,
            Self::MySql(repo) => repo,
        }
    }
}

impl From<InMemoryRepository> for StorageEngine {
    fn from(repo: InMemoryRepository) -> Self {
        Self::Memory(repo)
    }
}

impl From<FileRepository> for StorageEngine {
    fn from(repo: FileRepository) -> Self {
        Self::File(repo)
    }
}

impl From<MySqlRepository> for StorageEngine {
    fn from(repo: MySqlRepository) -> Self {
        Self::MySql(repo)
    }
}

#[async_trait]
impl Storage for StorageEngine {
    async fn save_url(&self, ctx: &RequestContext, original_url: &str) -> Result<ShortCode> {
        self.inner().save_url(ctx, original_url).await
    }

    async fn get_by_id(&self, ctx: &RequestContext, code: &ShortCode) -> Result<String> {
        self.inner().get_by_id(ctx, code).await
    }

    async fn is_exists(&self, ctx: &RequestContext, code: &ShortCode) -> Result<bool> {
        self.inner().is_exists(ctx, code).await
    }

    async fn load_urls(
        &self,
        ctx: &RequestContext,
        incoming: Vec<Incoming>,
        base_url: &str,
    ) -> Result<BatchOutcome> {
        self.inner().load_urls(ctx, incoming, base_url).await
    }

    async fn get_user_urls(
        &self,
        ctx: &RequestContext,
        base_url: &str,
    ) -> Result<Option<Vec<UserUrls>>> {
        self.inner().get_user_urls(ctx, base_url).await
    }

    async fn delete_user_urls(&self, ctx: &RequestContext, codes: Vec<ShortCode>) -> Result<()> {
        self.inner().delete_user_urls(ctx, codes).await
    }

    async fn delete_hard(&self, ctx: &RequestContext) -> Result<u64> {
        self.inner().delete_hard(ctx).await
    }

    async fn ping(&self, ctx: &RequestContext) -> Result<()> {
        self.inner().ping(ctx).await
    }
}
