pub mod error;
pub mod random;

pub use error::Error;
pub use random::{RandomGenerator, RandomGeneratorSettings};

use burrow_core::{RequestContext, ShortCode, Storage, StorageError};
use tracing::{debug, warn};

/// How many candidates are drawn before allocation gives up.
pub const MAX_ATTEMPTS: usize = 3;

/// Trait for generating short codes.
///
/// Implementations are pure generators that don't interact with storage.
/// Uniqueness is enforced by [`allocate`] / [`allocate_unique`], which
/// re-roll on collision.
pub trait Generator: Send + Sync + 'static {
    type Output: Into<ShortCode>;
    /// Draws one candidate code.
    fn generate(&self) -> Self::Output;
}

/// Draws candidates until `claim` accepts one.
///
/// `claim` returns `true` when the candidate was free and has been taken by
/// the caller. Backends that can check and insert in one step (e.g. under a
/// map entry lock) do both inside `claim`, which makes allocation atomic.
pub fn allocate<G, F>(generator: &G, mut claim: F) -> Result<ShortCode, StorageError>
where
    G: Generator + ?Sized,
    F: FnMut(&ShortCode) -> bool,
{
    for attempt in 1..=MAX_ATTEMPTS {
        let candidate: ShortCode = generator.generate().into();
        if claim(&candidate) {
            return Ok(candidate);
        }
        debug!(code = %candidate, attempt, "short code collision, re-rolling");
    }

    warn!(attempts = MAX_ATTEMPTS, "short code allocation exhausted");
    Err(StorageError::GenerationExhausted {
        attempts: MAX_ATTEMPTS,
    })
}

/// Draws candidates until one is not present in `store`.
///
/// The code is not reserved; the caller must insert it and handle the rare
/// case where a concurrent writer took it in between.
pub async fn allocate_unique<G, S>(
    generator: &G,
    store: &S,
    ctx: &RequestContext,
) -> Result<ShortCode, StorageError>
where
    G: Generator + ?Sized,
    S: Storage + ?Sized,
{
    for attempt in 1..=MAX_ATTEMPTS {
        ctx.check()?;
        let candidate: ShortCode = generator.generate().into();
        if !store.is_exists(ctx, &candidate).await? {
            return Ok(candidate);
        }
        debug!(code = %candidate, attempt, "short code collision, re-rolling");
    }

    warn!(attempts = MAX_ATTEMPTS, "short code allocation exhausted");
    Err(StorageError::GenerationExhausted {
        attempts: MAX_ATTEMPTS,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use burrow_core::{BatchOutcome, Incoming, OwnerId, Result, UserUrls};
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Replays a fixed list of codes.
    struct Scripted {
        codes: Vec<&'static str>,
        next: AtomicUsize,
    }

    impl Scripted {
        fn new(codes: Vec<&'static str>) -> Self {
            Self {
                codes,
                next: AtomicUsize::new(0),
            }
        }
    }

    impl Generator for Scripted {
        type Output = ShortCode;

        fn generate(&self) -> ShortCode {
            let i = self.next.fetch_add(1, Ordering::SeqCst);
            ShortCode::new_unchecked(self.codes[i % self.codes.len()])
        }
    }

    /// Only answers `is_exists`.
    struct TakenCodes(Mutex<HashSet<String>>);

    #[async_trait]
    impl Storage for TakenCodes {
        async fn save_url(&self, _: &RequestContext, _: &str) -> Result<ShortCode> {
            unimplemented!()
        }
        async fn get_by_id(&self, _: &RequestContext, _: &ShortCode) -> Result<String> {
            unimplemented!()
        }
        async fn is_exists(&self, _: &RequestContext, code: &ShortCode) -> Result<bool> {
            Ok(self.0.lock().unwrap().contains(code.as_str()))
        }
        async fn load_urls(
            &self,
            _: &RequestContext,
            _: Vec<Incoming>,
            _: &str,
        ) -> Result<BatchOutcome> {
            unimplemented!()
        }
        async fn get_user_urls(
            &self,
            _: &RequestContext,
            _: &str,
        ) -> Result<Option<Vec<UserUrls>>> {
            unimplemented!()
        }
        async fn delete_user_urls(&self, _: &RequestContext, _: Vec<ShortCode>) -> Result<()> {
            unimplemented!()
        }
        async fn delete_hard(&self, _: &RequestContext) -> Result<u64> {
            unimplemented!()
        }
        async fn ping(&self, _: &RequestContext) -> Result<()> {
            Ok(())
        }
    }

    fn taken(codes: &[&str]) -> TakenCodes {
        TakenCodes(Mutex::new(codes.iter().map(|c| c.to_string()).collect()))
    }

    #[test]
    fn allocate_returns_first_free_candidate() {
        let generator = Scripted::new(vec!["aaaaaaa", "bbbbbbb"]);
        let code = allocate(&generator, |c| c.as_str() != "aaaaaaa").unwrap();
        assert_eq!(code.as_str(), "bbbbbbb");
    }

    #[test]
    fn allocate_gives_up_after_max_attempts() {
        let generator = Scripted::new(vec!["aaaaaaa"]);
        let mut calls = 0;

        let err = allocate(&generator, |_| {
            calls += 1;
            false
        })
        .unwrap_err();

        assert!(matches!(
            err,
            StorageError::GenerationExhausted { attempts: MAX_ATTEMPTS }
        ));
        assert_eq!(calls, MAX_ATTEMPTS);
    }

    #[tokio::test]
    async fn allocate_unique_skips_existing_codes() {
        let generator = Scripted::new(vec!["aaaaaaa", "bbbbbbb", "ccccccc"]);
        let store = taken(&["aaaaaaa", "bbbbbbb"]);
        let ctx = RequestContext::new(OwnerId::new("alice"));

        let code = allocate_unique(&generator, &store, &ctx).await.unwrap();
        assert_eq!(code.as_str(), "ccccccc");
    }

    #[tokio::test]
    async fn allocate_unique_fails_when_every_draw_collides() {
        let generator = Scripted::new(vec!["aaaaaaa", "bbbbbbb", "ccccccc", "ddddddd"]);
        let store = taken(&["aaaaaaa", "bbbbbbb", "ccccccc"]);
        let ctx = RequestContext::new(OwnerId::new("alice"));

        let err = allocate_unique(&generator, &store, &ctx).await.unwrap_err();
        assert!(matches!(err, StorageError::GenerationExhausted { .. }));
    }

    #[tokio::test]
    async fn allocate_unique_honours_cancellation() {
        let generator = Scripted::new(vec!["aaaaaaa"]);
        let store = taken(&[]);
        let ctx = RequestContext::new(OwnerId::new("alice"));
        ctx.cancellation().cancel();

        let err = allocate_unique(&generator, &store, &ctx).await.unwrap_err();
        assert!(matches!(err, StorageError::Cancelled));
    }
}
