use anyhow::Result;

use super::schema::Database;
use super::types::{CacheEntry, CacheStats};

impl Database {
    // ========================================================================
    // Year Cache Operations
    // ========================================================================

    /// Store a resolved year, replacing any previous entry for the item.
    pub async fn put_year(&self, item_id: &str, year: i32, fetched_at_ms: i64) -> Result<()> {
        sqlx::query(
            r#"
            INSERT OR REPLACE INTO year_cache (item_id, year, fetched_at_ms)
            VALUES (?, ?, ?)
        "#,
        )
        .bind(item_id)
        .bind(year)
        .bind(fetched_at_ms)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Retrieve a cached year unless it is older than `ttl_ms` at `now_ms`.
    ///
    /// Expired rows are left in place; they are overwritten by the next
    /// successful resolution or removed by [`Database::evict_expired_years`].
    pub async fn get_fresh_year(
        &self,
        item_id: &str,
        now_ms: i64,
        ttl_ms: i64,
    ) -> Result<Option<CacheEntry>> {
        let row: Option<(i32, i64)> = sqlx::query_as(
            r#"
            SELECT year, fetched_at_ms
            FROM year_cache
            WHERE item_id = ? AND fetched_at_ms > ?
        "#,
        )
        .bind(item_id)
        .bind(now_ms.saturating_sub(ttl_ms))
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|(year, fetched_at_ms)| CacheEntry {
            year,
            fetched_at_ms,
        }))
    }

    /// Delete every entry older than `ttl_ms` at `now_ms`.
    ///
    /// Returns the number of entries evicted.
    pub async fn evict_expired_years(&self, now_ms: i64, ttl_ms: i64) -> Result<u64> {
        let result = sqlx::query("DELETE FROM year_cache WHERE fetched_at_ms <= ?")
            .bind(now_ms.saturating_sub(ttl_ms))
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    /// Delete every entry. Returns the number removed.
    pub async fn clear_year_cache(&self) -> Result<u64> {
        let result = sqlx::query("DELETE FROM year_cache")
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    /// Count entries and estimate their size as a JSON object
    /// (`{"<id>":{"year":Y,"fetchedAt":MS},...}`).
    pub async fn year_cache_stats(&self) -> Result<CacheStats> {
        let row: (i64, Option<i64>, Option<i64>, Option<i64>) = sqlx::query_as(
            r#"
            SELECT
                COUNT(*),
                SUM(LENGTH(item_id) + LENGTH(CAST(year AS TEXT))
                    + LENGTH(CAST(fetched_at_ms AS TEXT)) + 26),
                MIN(fetched_at_ms),
                MAX(fetched_at_ms)
            FROM year_cache
        "#,
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(CacheStats {
            count: row.0,
            // Outer braces; the last entry has no trailing comma
            approx_size_bytes: row.1.map(|s| s + 1).unwrap_or(2),
            oldest_fetched_at_ms: row.2,
            newest_fetched_at_ms: row.3,
        })
    }
}
