use crate::memory::{validate_url, InMemoryRepository, Insertion};
use async_trait::async_trait;
use burrow_core::{
    BatchOutcome, Incoming, RequestContext, Result, ShortCode, ShortLinkRecord, Storage,
    StorageError, UserUrls,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// [`Storage`] backed by a JSON snapshot file.
///
/// All reads are answered by an owned [`InMemoryRepository`]. Every mutation
/// rewrites the whole snapshot while holding a write lock, so the file always
/// reflects a state the memory store has been in.
///
/// Inserts are withdrawn when their snapshot fails. Deletes stay applied in
/// memory and the lock's flag records that the file is behind; any later
/// mutation, including an empty sweep, writes the snapshot again.
#[derive(Debug, Clone)]
pub struct FileRepository {
    memory: InMemoryRepository,
    path: Arc<PathBuf>,
    /// `true` while memory holds changes the file lacks.
    write_lock: Arc<Mutex<bool>>,
}

impl FileRepository {
    /// Opens the snapshot at `path`, creating it (and its parent directory)
    /// when missing.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with(path, InMemoryRepository::new()).await
    }

    /// Opens the snapshot into a caller-supplied, empty memory repository.
    pub async fn open_with(path: impl AsRef<Path>, memory: InMemoryRepository) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        if !tokio::fs::try_exists(&path).await? {
            info!(path = %path.display(), "creating empty snapshot file");
            tokio::fs::write(&path, b"[]").await?;
        }

        let bytes = tokio::fs::read(&path).await?;
        let records: Vec<ShortLinkRecord> = if bytes.iter().all(u8::is_ascii_whitespace) {
            Vec::new()
        } else {
            serde_json::from_slice(&bytes).map_err(|e| {
                StorageError::InvalidData(format!("corrupt snapshot {}: {e}", path.display()))
            })?
        };

        let count = records.len();
        memory.restore(records)?;
        info!(path = %path.display(), records = count, "loaded snapshot");

        Ok(Self {
            memory,
            path: Arc::new(path),
            write_lock: Arc::new(Mutex::new(false)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Writes the full record set next to the snapshot, then renames it over.
    ///
    /// `unsaved` is the guarded flag of `write_lock`; it is cleared on success.
    async fn persist(&self, unsaved: &mut bool) -> Result<()> {
        let records = self.memory.snapshot();
        let json = serde_json::to_vec_pretty(&records)
            .map_err(|e| StorageError::Serialization(e.to_string()))?;

        let tmp = self.path.with_extension("tmp");
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, self.path.as_ref()).await?;

        *unsaved = false;
        debug!(path = %self.path.display(), records = records.len(), "snapshot written");
        Ok(())
    }
}

#[async_trait]
impl Storage for FileRepository {
    async fn save_url(&self, ctx: &RequestContext, original_url: &str) -> Result<ShortCode> {
        ctx.check()?;
        validate_url(original_url)?;

        let mut unsaved = self.write_lock.lock().await;
        let code = match self.memory.insert_url(ctx.owner(), original_url)? {
            Insertion::Created(code) => code,
            Insertion::Existing(code) => return Err(StorageError::Conflict(code)),
        };

        if let Err(err) = self.persist(&mut unsaved).await {
            warn!(code = %code, error = %err, "snapshot failed, withdrawing new record");
            self.memory.withdraw(std::slice::from_ref(&code));
            return Err(err);
        }

        Ok(code)
    }

    async fn get_by_id(&self, ctx: &RequestContext, code: &ShortCode) -> Result<String> {
        self.memory.get_by_id(ctx, code).await
    }

    async fn is_exists(&self, ctx: &RequestContext, code: &ShortCode) -> Result<bool> {
        self.memory.is_exists(ctx, code).await
    }

    async fn load_urls(
        &self,
        ctx: &RequestContext,
        incoming: Vec<Incoming>,
        base_url: &str,
    ) -> Result<BatchOutcome> {
        ctx.check()?;

        let mut unsaved = self.write_lock.lock().await;
        let (outcome, created) = self.memory.insert_batch(ctx, incoming, base_url)?;
        if created.is_empty() && !*unsaved {
            return Ok(outcome);
        }

        if let Err(err) = self.persist(&mut unsaved).await {
            warn!(created = created.len(), error = %err, "snapshot failed, withdrawing batch");
            self.memory.withdraw(&created);
            return Err(err);
        }

        Ok(outcome)
    }

    async fn get_user_urls(
        &self,
        ctx: &RequestContext,
        base_url: &str,
    ) -> Result<Option<Vec<UserUrls>>> {
        self.memory.get_user_urls(ctx, base_url).await
    }

    async fn delete_user_urls(&self, ctx: &RequestContext, codes: Vec<ShortCode>) -> Result<()> {
        let mut unsaved = self.write_lock.lock().await;
        // A cancelled delete may still have flipped some flags.
        let flipped = self.memory.soft_delete(ctx, codes).await;
        if !matches!(flipped, Ok(0)) {
            *unsaved = true;
        }
        if *unsaved {
            if let Err(err) = self.persist(&mut unsaved).await {
                warn!(error = %err, "snapshot failed, soft-delete kept in memory only");
                return Err(err);
            }
        }
        flipped.map(|_| ())
    }

    async fn delete_hard(&self, ctx: &RequestContext) -> Result<u64> {
        ctx.check()?;

        let mut unsaved = self.write_lock.lock().await;
        let removed = self.memory.purge();
        if removed > 0 {
            *unsaved = true;
        }
        if *unsaved {
            if let Err(err) = self.persist(&mut unsaved).await {
                warn!(removed, error = %err, "snapshot failed, purge kept in memory only");
                return Err(err);
            }
        }
        debug!(removed, "purged soft-deleted records");
        Ok(removed)
    }

    async fn ping(&self, _ctx: &RequestContext) -> Result<()> {
        tokio::fs::metadata(self.path.as_ref())
            .await
            .map(|_| ())
            .map_err(|e| StorageError::Unavailable(format!("{}: {e}", self.path.display())))
    }
}
