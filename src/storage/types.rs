use serde::Serialize;
use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

#[derive(Error, Debug)]
pub enum DatabaseError {
    /// Another process has the database locked
    #[error("The metagroove database is locked by another process. Close it and try again.")]
    InstanceLocked,

    #[error("Database migration failed: {0}")]
    Migration(String),

    #[error("Database error: {0}")]
    Other(#[from] sqlx::Error),
}

impl DatabaseError {
    pub(crate) fn from_sqlx(err: sqlx::Error) -> Self {
        let error_string = err.to_string().to_lowercase();

        // SQLITE_BUSY, SQLITE_LOCKED, SQLITE_CANTOPEN
        if error_string.contains("database is locked")
            || error_string.contains("database table is locked")
            || error_string.contains("sqlite_busy")
            || error_string.contains("sqlite_locked")
            || error_string.contains("unable to open database file")
        {
            return DatabaseError::InstanceLocked;
        }

        DatabaseError::Other(err)
    }
}

// ============================================================================
// Year Cache Types
// ============================================================================

/// A resolved year and when it was fetched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CacheEntry {
    pub year: i32,
    pub fetched_at_ms: i64,
}

/// Aggregate statistics for the year cache.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub count: i64,
    /// Size of the cache serialized as a JSON object keyed by item id.
    pub approx_size_bytes: i64,
    pub oldest_fetched_at_ms: Option<i64>,
    pub newest_fetched_at_ms: Option<i64>,
}
