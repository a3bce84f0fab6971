//! Database schema and types

use chrono::{DateTime, TimeZone, Utc};
use serde::Serialize;

/// Bootstrap statements for SQLite (development and tests)
pub const SQLITE_SCHEMA: &[&str] = &[
    r"
CREATE TABLE IF NOT EXISTS sessions (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    `from` TEXT NOT NULL,
    expired_at INTEGER NOT NULL
)",
    "CREATE INDEX IF NOT EXISTS idx_sessions_from_expiry ON sessions(`from`, expired_at)",
];

/// Bootstrap statements for MySQL; existing deployments keep their own table
pub const MYSQL_SCHEMA: &[&str] = &[r"
CREATE TABLE IF NOT EXISTS sessions (
    id BIGINT NOT NULL AUTO_INCREMENT PRIMARY KEY,
    `from` VARCHAR(255) NOT NULL,
    expired_at BIGINT NOT NULL,
    INDEX idx_sessions_from_expiry (`from`, expired_at)
)"];

pub(super) const INSERT_SESSION: &str =
    "INSERT INTO sessions (`from`, expired_at) VALUES (?, ?)";

pub(super) const EXPIRE_ACTIVE_SESSIONS: &str =
    "UPDATE sessions SET expired_at = ? WHERE `from` = ? AND expired_at > ?";

pub(super) const SELECT_ACTIVE_SESSION: &str = "SELECT id, expired_at FROM sessions \
     WHERE `from` = ? AND expired_at > ? ORDER BY expired_at DESC LIMIT 1";

/// Backend behind a connection URL
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    MySql,
    Sqlite,
}

impl Backend {
    pub fn from_url(url: &str) -> Option<Self> {
        let scheme = url.split_once(':').map(|(scheme, _)| scheme)?;
        match scheme {
            "mysql" | "mariadb" => Some(Self::MySql),
            "sqlite" => Some(Self::Sqlite),
            _ => None,
        }
    }

    pub fn schema(self) -> &'static [&'static str] {
        match self {
            Self::MySql => MYSQL_SCHEMA,
            Self::Sqlite => SQLITE_SCHEMA,
        }
    }
}

/// Session record
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Session {
    pub id: i64,
    pub sender: String,
    /// Unix seconds
    pub expired_at: i64,
}

impl Session {
    pub fn expires_at(&self) -> DateTime<Utc> {
        Utc.timestamp_opt(self.expired_at, 0)
            .single()
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    /// Active means the expiry is strictly in the future
    #[allow(dead_code)] // Used in tests
    pub fn is_active_at(&self, now: i64) -> bool {
        self.expired_at > now
    }
}
