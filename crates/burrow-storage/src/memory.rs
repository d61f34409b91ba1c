use async_trait::async_trait;
use burrow_core::{
    BatchOutcome, Incoming, OwnerId, RequestContext, Result, ShortCode, ShortLinkRecord, Storage,
    StorageError, UserUrls,
};
use burrow_generator::{allocate, Generator, RandomGenerator};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{debug, trace};

/// Upper bound on concurrent tasks spawned by one bulk soft-delete.
pub const DELETE_FANOUT: usize = 8;

/// Outcome of inserting one URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Insertion {
    Created(ShortCode),
    Existing(ShortCode),
}

/// In-memory implementation of [`Storage`] using DashMap.
///
/// Records are keyed by short code; a second map indexes codes by original
/// URL to keep URLs unique. DashMap's sharded locks let lookups and
/// soft-deletes on different codes proceed in parallel. Whenever both maps
/// are locked at once the URL index is locked first.
///
/// Clones share the same maps; separate calls to [`InMemoryRepository::new`]
/// never do.
#[derive(Clone)]
pub struct InMemoryRepository {
    records: Arc<DashMap<ShortCode, ShortLinkRecord>>,
    by_url: Arc<DashMap<String, ShortCode>>,
    sequence: Arc<AtomicU64>,
    generator: Arc<dyn Generator<Output = ShortCode>>,
}

impl InMemoryRepository {
    /// Creates an empty repository drawing 7-letter random codes.
    pub fn new() -> Self {
        Self::with_generator(RandomGenerator::new())
    }

    /// Creates an empty repository with a custom code generator.
    pub fn with_generator(generator: impl Generator<Output = ShortCode>) -> Self {
        Self {
            records: Arc::new(DashMap::new()),
            by_url: Arc::new(DashMap::new()),
            sequence: Arc::new(AtomicU64::new(0)),
            generator: Arc::new(generator),
        }
    }

    /// Number of stored records, soft-deleted ones included.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Returns a copy of every record ordered by insertion sequence.
    pub fn snapshot(&self) -> Vec<ShortLinkRecord> {
        let mut records: Vec<ShortLinkRecord> = self
            .records
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        records.sort_by_key(|record| record.sequence);
        records
    }

    /// Loads previously persisted records into an empty repository.
    ///
    /// Flags and sequence numbers are kept as stored; new records continue
    /// after the highest restored sequence.
    pub fn restore(&self, records: Vec<ShortLinkRecord>) -> Result<()> {
        for record in records {
            if self.records.contains_key(&record.short_code) {
                return Err(StorageError::InvalidData(format!(
                    "duplicate short code in snapshot: {}",
                    record.short_code
                )));
            }
            match self.by_url.entry(record.original_url.clone()) {
                Entry::Occupied(_) => {
                    return Err(StorageError::InvalidData(format!(
                        "duplicate original url in snapshot: {}",
                        record.original_url
                    )));
                }
                Entry::Vacant(slot) => {
                    slot.insert(record.short_code.clone());
                }
            }
            self.sequence.fetch_max(record.sequence, Ordering::SeqCst);
            self.records.insert(record.short_code.clone(), record);
        }
        Ok(())
    }

    /// Inserts `original_url` unless it is already stored.
    ///
    /// The URL slot stays locked while a code is claimed, so two writers of
    /// the same URL can never both create a record.
    pub(crate) fn insert_url(&self, owner: &OwnerId, original_url: &str) -> Result<Insertion> {
        validate_url(original_url)?;

        let slot = match self.by_url.entry(original_url.to_owned()) {
            Entry::Occupied(slot) if self.records.contains_key(slot.get()) => {
                return Ok(Insertion::Existing(slot.get().clone()));
            }
            // Left behind by a sweep that has not unindexed the URL yet.
            Entry::Occupied(mut slot) => {
                let code = self.claim_code(owner, original_url)?;
                slot.insert(code.clone());
                return Ok(Insertion::Created(code));
            }
            Entry::Vacant(slot) => slot,
        };

        let code = self.claim_code(owner, original_url)?;
        slot.insert(code.clone());
        Ok(Insertion::Created(code))
    }

    fn claim_code(&self, owner: &OwnerId, original_url: &str) -> Result<ShortCode> {
        allocate(self.generator.as_ref(), |candidate| {
            match self.records.entry(candidate.clone()) {
                Entry::Occupied(_) => false,
                Entry::Vacant(slot) => {
                    let sequence = self.sequence.fetch_add(1, Ordering::SeqCst) + 1;
                    slot.insert(ShortLinkRecord::new(
                        owner.clone(),
                        original_url,
                        candidate.clone(),
                        sequence,
                    ));
                    true
                }
            }
        })
    }

    /// Inserts a batch, undoing every record it created if any item fails.
    ///
    /// Every URL is validated before the first insert. Returns the outcome
    /// together with the codes that were newly created.
    pub(crate) fn insert_batch(
        &self,
        ctx: &RequestContext,
        incoming: Vec<Incoming>,
        base_url: &str,
    ) -> Result<(BatchOutcome, Vec<ShortCode>)> {
        for item in &incoming {
            validate_url(&item.original_url)?;
        }

        let mut outcome = BatchOutcome::with_capacity(incoming.len());
        let mut created = Vec::new();

        for item in incoming {
            let inserted = ctx
                .check()
                .and_then(|_| self.insert_url(ctx.owner(), &item.original_url));

            match inserted {
                Ok(Insertion::Created(code)) => {
                    outcome.push(item.correlation_id, code.to_url(base_url), false);
                    created.push(code);
                }
                Ok(Insertion::Existing(code)) => {
                    debug!(code = %code, correlation_id = %item.correlation_id, "batch item already stored");
                    outcome.push(item.correlation_id, code.to_url(base_url), true);
                }
                Err(err) => {
                    self.withdraw(&created);
                    return Err(err);
                }
            }
        }

        Ok((outcome, created))
    }

    /// Removes records created by an operation that could not complete.
    pub(crate) fn withdraw(&self, codes: &[ShortCode]) {
        for code in codes {
            if let Some((_, record)) = self.records.remove(code) {
                self.by_url
                    .remove_if(&record.original_url, |_, indexed| indexed == code);
            }
        }
    }

    /// Soft-deletes the caller's codes and returns how many flags were flipped.
    ///
    /// The list is split into at most [`DELETE_FANOUT`] chunks that run as
    /// separate tasks; the call returns once all of them have finished.
    pub(crate) async fn soft_delete(
        &self,
        ctx: &RequestContext,
        codes: Vec<ShortCode>,
    ) -> Result<usize> {
        ctx.check()?;
        if codes.is_empty() {
            return Ok(0);
        }

        let chunk_size = codes.len().div_ceil(DELETE_FANOUT);
        let mut tasks = JoinSet::new();

        for chunk in codes.chunks(chunk_size) {
            let chunk = chunk.to_vec();
            let records = Arc::clone(&self.records);
            let owner = ctx.owner().clone();
            let cancel = ctx.cancellation().clone();

            tasks.spawn(async move {
                let mut flipped: usize = 0;
                for code in chunk {
                    if cancel.is_cancelled() {
                        break;
                    }
                    let Some(mut record) = records.get_mut(&code) else {
                        trace!(code = %code, "soft-delete skipped unknown code");
                        continue;
                    };
                    if !record.is_owned_by(&owner) {
                        trace!(code = %code, "soft-delete skipped foreign code");
                        continue;
                    }
                    if !record.is_deleted {
                        record.is_deleted = true;
                        flipped += 1;
                    }
                }
                flipped
            });
        }

        let mut flipped = 0;
        while let Some(joined) = tasks.join_next().await {
            flipped += joined
                .map_err(|e| StorageError::Unavailable(format!("soft-delete task failed: {e}")))?;
        }

        debug!(owner = %ctx.owner(), requested = codes.len(), flipped, "soft-deleted short codes");
        ctx.check()?;
        Ok(flipped)
    }

    /// Drops every soft-deleted record and returns how many were removed.
    pub(crate) fn purge(&self) -> u64 {
        let mut removed = Vec::new();
        self.records.retain(|code, record| {
            if record.is_deleted {
                removed.push((record.original_url.clone(), code.clone()));
                false
            } else {
                true
            }
        });

        for (url, code) in &removed {
            self.by_url.remove_if(url, |_, indexed| indexed == code);
        }

        removed.len() as u64
    }
}

impl Default for InMemoryRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for InMemoryRepository {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InMemoryRepository")
            .field("records", &self.records.len())
            .field("sequence", &self.sequence.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}

pub(crate) fn validate_url(original_url: &str) -> Result<()> {
    if original_url.trim().is_empty() {
        return Err(StorageError::InvalidUrl("URL cannot be empty".to_string()));
    }
    Ok(())
}

#[async_trait]
impl Storage for InMemoryRepository {
    async fn save_url(&self, ctx: &RequestContext, original_url: &str) -> Result<ShortCode> {
        ctx.check()?;
        match self.insert_url(ctx.owner(), original_url)? {
            Insertion::Created(code) => {
                debug!(code = %code, owner = %ctx.owner(), "stored short link");
                Ok(code)
            }
            Insertion::Existing(code) => Err(StorageError::Conflict(code)),
        }
    }

    async fn get_by_id(&self, _ctx: &RequestContext, code: &ShortCode) -> Result<String> {
        trace!(code = %code, "resolving short code");

        let Some(record) = self.records.get(code) else {
            return Err(StorageError::NotFound(code.to_string()));
        };

        if record.is_deleted {
            return Err(StorageError::Gone(code.to_string()));
        }

        Ok(record.original_url.clone())
    }

    async fn is_exists(&self, _ctx: &RequestContext, code: &ShortCode) -> Result<bool> {
        Ok(self.records.contains_key(code))
    }

    async fn load_urls(
        &self,
        ctx: &RequestContext,
        incoming: Vec<Incoming>,
        base_url: &str,
    ) -> Result<BatchOutcome> {
        ctx.check()?;
        let (outcome, _) = self.insert_batch(ctx, incoming, base_url)?;
        Ok(outcome)
    }

    async fn get_user_urls(
        &self,
        ctx: &RequestContext,
        base_url: &str,
    ) -> Result<Option<Vec<UserUrls>>> {
        ctx.check()?;

        let mut owned: Vec<(u64, UserUrls)> = self
            .records
            .iter()
            .filter(|entry| entry.is_live() && entry.is_owned_by(ctx.owner()))
            .map(|entry| (entry.sequence, entry.to_user_urls(base_url)))
            .collect();

        if owned.is_empty() {
            return Ok(None);
        }

        owned.sort_by_key(|(sequence, _)| *sequence);
        Ok(Some(owned.into_iter().map(|(_, urls)| urls).collect()))
    }

    async fn delete_user_urls(&self, ctx: &RequestContext, codes: Vec<ShortCode>) -> Result<()> {
        self.soft_delete(ctx, codes).await.map(|_| ())
    }

    async fn delete_hard(&self, ctx: &RequestContext) -> Result<u64> {
        ctx.check()?;
        let removed = self.purge();
        debug!(removed, "purged soft-deleted records");
        Ok(removed)
    }

    async fn ping(&self, _ctx: &RequestContext) -> Result<()> {
        Ok(())
    }
}
