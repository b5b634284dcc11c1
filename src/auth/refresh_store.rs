//! Consumed Refresh Token Store
//! Mission: Enforce single-use refresh tokens with an atomic denylist

use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use std::time::Duration;
use tracing::debug;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Persisted record of every refresh token that has been exchanged.
///
/// A refresh token moves Issued -> Consumed exactly once; the INSERT OR IGNORE
/// on the jti primary key is the atomic check-and-mark, so concurrent reuse of
/// the same token yields at most one success.
pub struct RefreshTokenStore {
    db_path: String,
}

impl RefreshTokenStore {
    /// Create the store and initialize the denylist table
    pub fn new(db_path: &str) -> Result<Self> {
        let store = Self {
            db_path: db_path.to_string(),
        };
        store.init_db()?;
        Ok(store)
    }

    /// Open a connection that waits out concurrent writers instead of
    /// surfacing SQLITE_BUSY; consume races on the jti row are expected.
    fn open(&self) -> Result<Connection> {
        let conn = Connection::open(&self.db_path)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        Ok(conn)
    }

    fn init_db(&self) -> Result<()> {
        let conn = self.open()?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS consumed_refresh_tokens (
                jti TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                consumed_at TEXT NOT NULL
            )",
            [],
        )?;

        Ok(())
    }

    /// Mark a refresh token Consumed iff it is currently Issued.
    ///
    /// Returns true when this call performed the transition; false when the
    /// jti was already consumed.
    pub fn consume(&self, jti: &str, user_id: &str) -> Result<bool> {
        let conn = self.open()?;

        let inserted = conn.execute(
            "INSERT OR IGNORE INTO consumed_refresh_tokens (jti, user_id, consumed_at)
             VALUES (?1, ?2, ?3)",
            params![jti, user_id, Utc::now().to_rfc3339()],
        )?;

        if inserted == 0 {
            debug!("Refresh token reuse detected for jti {}", jti);
        }

        Ok(inserted == 1)
    }

    /// Drop records consumed before the cutoff.
    ///
    /// Housekeeping only: a record older than the refresh TTL belongs to a
    /// token that already fails expiry validation, so purging it can never
    /// resurrect the token.
    pub fn purge_consumed_before(&self, cutoff: DateTime<Utc>) -> Result<usize> {
        let conn = self.open()?;

        let removed = conn.execute(
            "DELETE FROM consumed_refresh_tokens WHERE consumed_at < ?1",
            params![cutoff.to_rfc3339()],
        )?;

        Ok(removed)
    }
}
