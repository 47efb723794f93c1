//! Relational storage for plugins.
//!
//! [`Database`] wraps an SQLite pool opened from the `[persistence]` section.
//! Plugins declare their tables through [`Plugin::schema`] and hand work to
//! [`Database::submit`]. Jobs run one at a time on a worker task in the order
//! they were submitted, each inside its own task so a failing or panicking job
//! only takes itself down. Table creation is queued the same way, so it always
//! lands before the jobs submitted after it.
//!
//! Persistence is off unless configured: callers check
//! [`PluginContext::database`] (or [`PluginInit::database`]) for `None`.
//!
//! [`Plugin::schema`]: crate::plugin::Plugin::schema
//! [`PluginContext::database`]: crate::plugin::PluginContext::database
//! [`PluginInit::database`]: crate::plugin::PluginInit::database

use crate::config::PersistenceConfig;
use crate::error::PersistenceError;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{ConnectOptions, SqlitePool};
use std::future::Future;
use std::path::Path;
use std::pin::Pin;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

static MEMDB_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Future returned by a database job.
pub type JobFuture = Pin<Box<dyn Future<Output = Result<(), sqlx::Error>> + Send>>;

type Job = Box<dyn FnOnce(SqlitePool) -> JobFuture + Send>;

struct Queued {
    owner: String,
    job: Job,
}

/// Shared handle to the plugin database. Clones submit to the same worker.
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
    jobs: mpsc::UnboundedSender<Queued>,
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("pool_size", &self.pool.size())
            .finish_non_exhaustive()
    }
}

impl Database {
    const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(5);
    const IDLE_TIMEOUT: Duration = Duration::from_secs(60);

    /// Open the configured database and start its worker.
    ///
    /// Must be called from inside a tokio runtime; the returned handle may be
    /// used from any thread while that runtime is alive.
    pub async fn connect(config: &PersistenceConfig) -> Result<Self, PersistenceError> {
        let url = config
            .connection
            .as_deref()
            .ok_or(PersistenceError::NotConfigured)?;

        let pool = if url == ":memory:" {
            // A uniquely named shared-cache database per call, so parallel
            // tests never see each other's tables.
            let id = MEMDB_COUNTER.fetch_add(1, Ordering::Relaxed);
            let options = SqliteConnectOptions::new()
                .filename(format!(
                    "file:slbot-memdb-{}-{}?mode=memory&cache=shared",
                    std::process::id(),
                    id
                ))
                .shared_cache(true)
                .create_if_missing(true);
            let options = statement_logging(options, config.log_statements);

            // The database lives as long as one connection stays open.
            SqlitePoolOptions::new()
                .min_connections(1)
                .max_connections(1)
                .acquire_timeout(Self::ACQUIRE_TIMEOUT)
                .idle_timeout(None)
                .max_lifetime(None)
                .connect_with(options)
                .await?
        } else {
            let options = SqliteConnectOptions::from_str(url)?
                .create_if_missing(true)
                .journal_mode(SqliteJournalMode::Wal);
            if let Some(parent) = Path::new(options.get_filename()).parent()
                && !parent.as_os_str().is_empty()
                && let Err(e) = std::fs::create_dir_all(parent)
            {
                warn!(path = %parent.display(), error = %e, "Failed to create database directory");
            }
            let options = statement_logging(options, config.log_statements);

            SqlitePoolOptions::new()
                .max_connections(5)
                .acquire_timeout(Self::ACQUIRE_TIMEOUT)
                .idle_timeout(Some(Self::IDLE_TIMEOUT))
                .connect_with(options)
                .await?
        };

        let (jobs, queue) = mpsc::unbounded_channel();
        tokio::spawn(run_jobs(pool.clone(), queue));
        info!(connection = %url, "Database connected");
        Ok(Self { pool, jobs })
    }

    /// Like [`Database::connect`], but logs and returns `None` when
    /// persistence is unconfigured or cannot be opened.
    pub async fn open(config: Option<&PersistenceConfig>) -> Option<Self> {
        let Some(config) = config else {
            warn!("Persistence not configured: plugins get no database");
            return None;
        };
        match Self::connect(config).await {
            Ok(db) => Some(db),
            Err(e) => {
                error!(error = %e, code = e.error_code(), "Could not configure persistence");
                None
            }
        }
    }

    /// The underlying pool, for plugins that drive their own async work.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Queue `job` behind everything submitted before it.
    ///
    /// ```ignore
    /// db.submit("notes", move |pool| async move {
    ///     let mut tx = pool.begin().await?;
    ///     sqlx::query("INSERT INTO notes_entry (text) VALUES (?)")
    ///         .bind(text)
    ///         .execute(&mut *tx)
    ///         .await?;
    ///     tx.commit().await
    /// })?;
    /// ```
    ///
    /// A transaction that is dropped without `commit` rolls back.
    pub fn submit<F, Fut>(&self, owner: &str, job: F) -> Result<(), PersistenceError>
    where
        F: FnOnce(SqlitePool) -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), sqlx::Error>> + Send + 'static,
    {
        let job: Job = Box::new(move |pool| -> JobFuture { Box::pin(job(pool)) });
        self.jobs
            .send(Queued {
                owner: owner.to_string(),
                job,
            })
            .map_err(|_| PersistenceError::WorkerStopped)
    }

    /// Queue `statements` (`CREATE TABLE IF NOT EXISTS ...`) as one transaction.
    pub fn create_tables(&self, owner: &str, statements: Vec<String>) -> Result<(), PersistenceError> {
        if statements.is_empty() {
            return Ok(());
        }
        debug!(plugin = %owner, tables = statements.len(), "Queueing plugin schema");
        self.submit(owner, move |pool| async move {
            let mut tx = pool.begin().await?;
            for statement in &statements {
                sqlx::query(statement).execute(&mut *tx).await?;
            }
            tx.commit().await
        })
    }
}

/// sqlx logs statements at debug level unless told not to.
fn statement_logging(options: SqliteConnectOptions, enabled: bool) -> SqliteConnectOptions {
    if enabled {
        options
    } else {
        options.disable_statement_logging()
    }
}

async fn run_jobs(pool: SqlitePool, mut queue: mpsc::UnboundedReceiver<Queued>) {
    while let Some(Queued { owner, job }) = queue.recv().await {
        match tokio::spawn(job(pool.clone())).await {
            Ok(Ok(())) => debug!(plugin = %owner, "Database job finished"),
            Ok(Err(e)) => error!(plugin = %owner, error = %e, "Database job failed"),
            Err(e) => error!(plugin = %owner, error = %e, "Database job panicked"),
        }
    }
    debug!("Database worker stopped");
}
