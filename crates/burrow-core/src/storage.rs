use crate::context::RequestContext;
use crate::error::Result;
use crate::record::{BatchOutcome, Incoming, UserUrls};
use crate::shortcode::ShortCode;
use async_trait::async_trait;

/// The short-link storage contract.
///
/// Every backend implements the same behaviour:
///
/// * a URL is stored at most once; re-submitting it yields
///   [`StorageError::Conflict`](crate::StorageError::Conflict) carrying the
///   existing code,
/// * records move `Active -> SoftDeleted -> removed` and never back,
/// * only the owner recorded at creation can soft-delete a record.
#[async_trait]
pub trait Storage: Send + Sync + 'static {
    /// Stores `original_url` under a freshly allocated code owned by the caller.
    async fn save_url(&self, ctx: &RequestContext, original_url: &str) -> Result<ShortCode>;

    /// Resolves a code to its original URL.
    ///
    /// Returns `Err(NotFound)` for unknown codes and `Err(Gone)` for codes whose
    /// record has been soft-deleted.
    async fn get_by_id(&self, ctx: &RequestContext, code: &ShortCode) -> Result<String>;

    /// Checks whether a code is taken, soft-deleted records included.
    async fn is_exists(&self, ctx: &RequestContext, code: &ShortCode) -> Result<bool>;

    /// Stores a batch of URLs.
    ///
    /// Every item yields one output. Items whose URL is already stored reuse the
    /// existing code and are reported in [`BatchOutcome::conflicts`]; any other
    /// failure aborts the batch without partial effects.
    async fn load_urls(
        &self,
        ctx: &RequestContext,
        incoming: Vec<Incoming>,
        base_url: &str,
    ) -> Result<BatchOutcome>;

    /// Lists the caller's live links, or `None` when there are none.
    async fn get_user_urls(
        &self,
        ctx: &RequestContext,
        base_url: &str,
    ) -> Result<Option<Vec<UserUrls>>>;

    /// Soft-deletes the listed codes that belong to the caller.
    ///
    /// Unknown codes and codes owned by someone else are skipped.
    async fn delete_user_urls(&self, ctx: &RequestContext, codes: Vec<ShortCode>) -> Result<()>;

    /// Permanently removes every soft-deleted record and returns how many were removed.
    async fn delete_hard(&self, ctx: &RequestContext) -> Result<u64>;

    /// Checks that the backend is reachable.
    async fn ping(&self, ctx: &RequestContext) -> Result<()>;
}
