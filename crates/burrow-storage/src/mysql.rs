use crate::memory::validate_url;
use async_trait::async_trait;
use burrow_core::{
    BatchOutcome, Incoming, OwnerId, RequestContext, Result, ShortCode, Storage, StorageError,
    UserUrls,
};
use burrow_generator::{Generator, RandomGenerator, MAX_ATTEMPTS};
use sqlx::mysql::MySqlPoolOptions;
use sqlx::{MySql, MySqlConnection, MySqlPool, Row};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

const SCHEMA: &str = include_str!("../ddl/mysql/short_urls.sql");

/// MySQL implementation of the storage contract.
///
/// `short_code` and a hash of `original_url` carry unique keys; the database
/// is the arbiter when two writers race. Soft delete flips `is_deleted`, and
/// rows are only physically removed by [`Storage::delete_hard`].
#[derive(Clone)]
pub struct MySqlRepository {
    pool: MySqlPool,
    generator: Arc<dyn Generator<Output = ShortCode>>,
}

impl MySqlRepository {
    /// Creates a repository from an existing MySQL connection pool.
    pub fn new(pool: MySqlPool) -> Self {
        Self::with_generator(pool, RandomGenerator::new())
    }

    pub fn with_generator(pool: MySqlPool, generator: impl Generator<Output = ShortCode>) -> Self {
        Self {
            pool,
            generator: Arc::new(generator),
        }
    }

    /// Opens a connection pool and makes sure the schema exists.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = MySqlPoolOptions::new()
            .max_connections(10)
            .acquire_timeout(Duration::from_secs(5))
            .connect(database_url)
            .await
            .map_err(map_sqlx_error)?;

        let repo = Self::new(pool);
        repo.ensure_schema().await?;
        info!("connected to mysql");
        Ok(repo)
    }

    /// Creates the `short_urls` table when it does not exist yet.
    pub async fn ensure_schema(&self) -> Result<()> {
        sqlx::query(SCHEMA)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        Ok(())
    }

    /// Returns a reference to the underlying pool.
    pub fn pool(&self) -> &MySqlPool {
        &self.pool
    }

    /// Stores `original_url` under a fresh code, or resolves it to the code
    /// it already has. The flag is `true` in the latter case.
    ///
    /// Every statement runs on `conn`, so a caller inside a transaction never
    /// waits on the pool for a second connection.
    async fn insert_on(
        &self,
        conn: &mut MySqlConnection,
        ctx: &RequestContext,
        original_url: &str,
    ) -> Result<(ShortCode, bool)> {
        for attempt in 1..=MAX_ATTEMPTS {
            ctx.check()?;
            let code = self.generator.generate();
            if code_exists(&mut *conn, &code).await? {
                debug!(code = %code, attempt, "short code collision, re-rolling");
                continue;
            }

            match insert_row(&mut *conn, ctx.owner(), original_url, &code).await {
                Ok(()) => return Ok((code, false)),
                Err(err) if is_unique_violation(&err) => {
                    if let Some(existing) = find_code_by_url(&mut *conn, original_url).await? {
                        return Ok((existing, true));
                    }
                    debug!(code = %code, attempt, "short code taken by a concurrent writer");
                }
                Err(err) => return Err(map_sqlx_error(err)),
            }
        }

        warn!(attempts = MAX_ATTEMPTS, "short code allocation exhausted");
        Err(StorageError::GenerationExhausted {
            attempts: MAX_ATTEMPTS,
        })
    }
}

impl fmt::Debug for MySqlRepository {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MySqlRepository")
            .field("pool", &self.pool)
            .finish_non_exhaustive()
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .is_some_and(sqlx::error::DatabaseError::is_unique_violation)
}

fn map_sqlx_error(err: sqlx::Error) -> StorageError {
    let message = err.to_string();

    match err {
        sqlx::Error::PoolTimedOut => StorageError::Timeout(message),
        sqlx::Error::PoolClosed
        | sqlx::Error::WorkerCrashed
        | sqlx::Error::Io(_)
        | sqlx::Error::Tls(_) => StorageError::Unavailable(message),
        sqlx::Error::ColumnIndexOutOfBounds { .. }
        | sqlx::Error::ColumnNotFound(_)
        | sqlx::Error::ColumnDecode { .. }
        | sqlx::Error::TypeNotFound { .. }
        | sqlx::Error::Decode(_)
        | sqlx::Error::RowNotFound => StorageError::InvalidData(message),
        _ => StorageError::Query(message),
    }
}

async fn code_exists<'e, E>(executor: E, code: &ShortCode) -> Result<bool>
where
    E: sqlx::Executor<'e, Database = MySql>,
{
    let row = sqlx::query(
        r#"
        SELECT 1
        FROM short_urls
        WHERE short_code = ?
        LIMIT 1
        "#,
    )
    .bind(code.as_str())
    .fetch_optional(executor)
    .await
    .map_err(map_sqlx_error)?;

    Ok(row.is_some())
}

async fn insert_row<'e, E>(
    executor: E,
    owner: &OwnerId,
    original_url: &str,
    code: &ShortCode,
) -> std::result::Result<(), sqlx::Error>
where
    E: sqlx::Executor<'e, Database = MySql>,
{
    sqlx::query(
        r#"
        INSERT INTO short_urls (short_code, original_url, owner_id, is_deleted)
        VALUES (?, ?, ?, FALSE)
        "#,
    )
    .bind(code.as_str())
    .bind(original_url)
    .bind(owner.as_str())
    .execute(executor)
    .await
    .map(|_| ())
}

/// Locking read, so rows committed after a transaction's snapshot are seen.
async fn find_code_by_url<'e, E>(executor: E, original_url: &str) -> Result<Option<ShortCode>>
where
    E: sqlx::Executor<'e, Database = MySql>,
{
    let row = sqlx::query(
        r#"
        SELECT short_code
        FROM short_urls
        WHERE url_hash = UNHEX(SHA2(?, 256))
        LIMIT 1
        FOR SHARE
        "#,
    )
    .bind(original_url)
    .fetch_optional(executor)
    .await
    .map_err(map_sqlx_error)?;

    row.map(|row| {
        row.try_get::<String, _>("short_code")
            .map(ShortCode::new_unchecked)
            .map_err(map_sqlx_error)
    })
    .transpose()
}

#[async_trait]
impl Storage for MySqlRepository {
    async fn save_url(&self, ctx: &RequestContext, original_url: &str) -> Result<ShortCode> {
        validate_url(original_url)?;

        let mut conn = self.pool.acquire().await.map_err(map_sqlx_error)?;
        match self.insert_on(&mut conn, ctx, original_url).await? {
            (code, false) => {
                debug!(code = %code, owner = %ctx.owner(), "stored short link");
                Ok(code)
            }
            (existing, true) => Err(StorageError::Conflict(existing)),
        }
    }

    async fn get_by_id(&self, _ctx: &RequestContext, code: &ShortCode) -> Result<String> {
        let row = sqlx::query(
            r#"
            SELECT original_url, is_deleted
            FROM short_urls
            WHERE short_code = ?
            LIMIT 1
            "#,
        )
        .bind(code.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        let Some(row) = row else {
            return Err(StorageError::NotFound(code.to_string()));
        };

        let is_deleted: bool = row.try_get("is_deleted").map_err(map_sqlx_error)?;
        if is_deleted {
            return Err(StorageError::Gone(code.to_string()));
        }

        row.try_get("original_url").map_err(map_sqlx_error)
    }

    async fn is_exists(&self, _ctx: &RequestContext, code: &ShortCode) -> Result<bool> {
        code_exists(&self.pool, code).await
    }

    /// Inserts every item in one transaction.
    ///
    /// A duplicate-key error only aborts its own statement in InnoDB, so
    /// conflicting items are resolved to their existing code and the rest
    /// commit together. Any other failure rolls the whole batch back.
    async fn load_urls(
        &self,
        ctx: &RequestContext,
        incoming: Vec<Incoming>,
        base_url: &str,
    ) -> Result<BatchOutcome> {
        ctx.check()?;
        for item in &incoming {
            validate_url(&item.original_url)?;
        }

        let mut tx = self.pool.begin().await.map_err(map_sqlx_error)?;
        let mut outcome = BatchOutcome::with_capacity(incoming.len());

        for item in incoming {
            if let Err(err) = ctx.check() {
                tx.rollback().await.map_err(map_sqlx_error)?;
                return Err(err);
            }

            let (code, conflicted) = self.insert_on(&mut tx, ctx, &item.original_url).await?;
            if conflicted {
                debug!(code = %code, correlation_id = %item.correlation_id, "batch item already stored");
            }
            outcome.push(item.correlation_id, code.to_url(base_url), conflicted);
        }

        tx.commit().await.map_err(map_sqlx_error)?;
        Ok(outcome)
    }

    async fn get_user_urls(
        &self,
        ctx: &RequestContext,
        base_url: &str,
    ) -> Result<Option<Vec<UserUrls>>> {
        ctx.check()?;

        let rows = sqlx::query(
            r#"
            SELECT short_code, original_url
            FROM short_urls
            WHERE owner_id = ?
              AND is_deleted = FALSE
            ORDER BY seq
            "#,
        )
        .bind(ctx.owner().as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        if rows.is_empty() {
            return Ok(None);
        }

        rows.into_iter()
            .map(|row| -> Result<UserUrls> {
                let code: String = row.try_get("short_code").map_err(map_sqlx_error)?;
                Ok(UserUrls {
                    short_url: ShortCode::new_unchecked(code).to_url(base_url),
                    original_url: row.try_get("original_url").map_err(map_sqlx_error)?,
                })
            })
            .collect::<Result<Vec<_>>>()
            .map(Some)
    }

    async fn delete_user_urls(&self, ctx: &RequestContext, codes: Vec<ShortCode>) -> Result<()> {
        ctx.check()?;
        if codes.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await.map_err(map_sqlx_error)?;
        let mut flipped = 0;

        for code in &codes {
            if let Err(err) = ctx.check() {
                tx.rollback().await.map_err(map_sqlx_error)?;
                return Err(err);
            }

            let result = sqlx::query(
                r#"
                UPDATE short_urls
                SET is_deleted = TRUE
                WHERE short_code = ?
                  AND owner_id = ?
                  AND is_deleted = FALSE
                "#,
            )
            .bind(code.as_str())
            .bind(ctx.owner().as_str())
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;

            flipped += result.rows_affected();
        }

        tx.commit().await.map_err(map_sqlx_error)?;
        debug!(owner = %ctx.owner(), requested = codes.len(), flipped, "soft-deleted short codes");
        Ok(())
    }

    async fn delete_hard(&self, ctx: &RequestContext) -> Result<u64> {
        ctx.check()?;

        let result = sqlx::query(
            r#"
            DELETE FROM short_urls
            WHERE is_deleted = TRUE
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(result.rows_affected())
    }

    async fn ping(&self, _ctx: &RequestContext) -> Result<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        Ok(())
    }
}
