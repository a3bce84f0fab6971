//! Session store
//!
//! Persists per-sender session windows. Every operation borrows a pooled
//! connection for its own duration; nothing spans operations.

mod clock;
mod schema;

pub use clock::{Clock, ManualClock, SystemClock};
pub use schema::*;

use sqlx::any::AnyPoolOptions;
use sqlx::AnyPool;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Default session window
pub const SESSION_DURATION: Duration = Duration::from_secs(1800);

const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Database error: {0}")]
    Sqlx(#[from] sqlx::Error),
    #[error("Unsupported database URL: {0}")]
    UnsupportedBackend(String),
    #[error("Database did not report the inserted session id")]
    MissingInsertId,
}

pub type DbResult<T> = Result<T, DbError>;

/// Pooled handle to the `sessions` table
#[derive(Clone)]
pub struct SessionStore {
    pool: AnyPool,
    backend: Backend,
    clock: Arc<dyn Clock>,
    duration_secs: i64,
}

impl SessionStore {
    /// Open a pool against `url` (`mysql://…` or `sqlite://…`)
    pub async fn connect(url: &str, max_connections: u32) -> DbResult<Self> {
        let backend = Backend::from_url(url)
            .ok_or_else(|| DbError::UnsupportedBackend(redact_url(url)))?;
        sqlx::any::install_default_drivers();

        let pool = AnyPoolOptions::new()
            .max_connections(max_connections.max(1))
            .acquire_timeout(ACQUIRE_TIMEOUT)
            .connect(url)
            .await?;

        tracing::info!(backend = ?backend, max_connections, "Session store connected");

        Ok(Self {
            pool,
            backend,
            clock: Arc::new(SystemClock),
            duration_secs: duration_secs(SESSION_DURATION),
        })
    }

    /// Replace the time source
    #[must_use]
    #[allow(dead_code)] // Used in tests
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Replace the session window
    #[must_use]
    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration_secs = duration_secs(duration);
        self
    }

    /// Create the `sessions` table when it does not exist yet
    pub async fn ensure_schema(&self) -> DbResult<()> {
        for statement in self.backend.schema() {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }

    // ==================== Session Operations ====================

    /// Insert a new session expiring one window from now.
    /// Existing active rows are left alone.
    pub async fn start_session(&self, sender: &str) -> DbResult<Session> {
        let expired_at = self.clock.now() + self.duration_secs;

        // The insert id travels in the statement's own result, so it belongs
        // to this row whichever pooled connection ran it.
        let result = sqlx::query(INSERT_SESSION)
            .bind(sender)
            .bind(expired_at)
            .execute(&self.pool)
            .await?;
        let id = result.last_insert_id().ok_or(DbError::MissingInsertId)?;

        Ok(Session {
            id,
            sender: sender.to_string(),
            expired_at,
        })
    }

    /// Expire every still-active row for `sender`
    pub async fn end_session(&self, sender: &str) -> DbResult<()> {
        let now = self.clock.now();

        let result = sqlx::query(EXPIRE_ACTIVE_SESSIONS)
            .bind(now)
            .bind(sender)
            .bind(now)
            .execute(&self.pool)
            .await?;

        tracing::debug!(sender, rows = result.rows_affected(), "Expired sessions");
        Ok(())
    }

    /// The unexpired row with the latest expiry, if any
    pub async fn get_active_session(&self, sender: &str) -> DbResult<Option<Session>> {
        let row: Option<(i64, i64)> = sqlx::query_as(SELECT_ACTIVE_SESSION)
            .bind(sender)
            .bind(self.clock.now())
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|(id, expired_at)| Session {
            id,
            sender: sender.to_string(),
            expired_at,
        }))
    }

    /// Number of rows stored for `sender`, active or not
    #[allow(dead_code)] // Used in tests
    pub async fn count_sessions(&self, sender: &str) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sessions WHERE `from` = ?")
            .bind(sender)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    /// Wait for checked-out connections and close the pool
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

fn duration_secs(duration: Duration) -> i64 {
    i64::try_from(duration.as_secs()).unwrap_or(i64::MAX)
}

/// Strip credentials from a URL before it reaches logs or errors
fn redact_url(url: &str) -> String {
    match (url.find("://"), url.rfind('@')) {
        (Some(scheme_end), Some(at)) if at > scheme_end => {
            format!("{}://***{}", url.get(..scheme_end).unwrap_or(""), url.get(at..).unwrap_or(""))
        }
        _ => url.to_string(),
    }
}
