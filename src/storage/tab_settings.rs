use anyhow::{Context, Result};

use super::schema::Database;
use crate::filter::{FilterConfig, PartialFilterConfig};

impl Database {
    // ========================================================================
    // Tab Settings Operations
    // ========================================================================

    /// Load the stored (unmerged) configuration for a context.
    ///
    /// Rows that no longer parse are logged and treated as absent so a
    /// corrupt snapshot falls back to defaults instead of failing reads.
    pub async fn get_tab_settings(&self, context_id: i64) -> Result<Option<PartialFilterConfig>> {
        let row: Option<(String,)> =
            sqlx::query_as("SELECT config FROM tab_settings WHERE context_id = ?")
                .bind(context_id)
                .fetch_optional(&self.pool)
                .await?;

        let Some((json,)) = row else {
            return Ok(None);
        };
        match serde_json::from_str(&json) {
            Ok(partial) => Ok(Some(partial)),
            Err(e) => {
                tracing::warn!(context_id, error = %e, "Ignoring unparseable stored settings");
                Ok(None)
            }
        }
    }

    /// Store a full configuration snapshot for a context (UPSERT).
    pub async fn set_tab_settings(&self, context_id: i64, config: &FilterConfig) -> Result<()> {
        let json = serde_json::to_string(&PartialFilterConfig::from(config))
            .context("serializing filter configuration")?;
        sqlx::query(
            r#"
            INSERT INTO tab_settings (context_id, config, updated_at)
            VALUES (?, ?, datetime('now'))
            ON CONFLICT(context_id) DO UPDATE SET config = excluded.config, updated_at = excluded.updated_at
        "#,
        )
        .bind(context_id)
        .bind(json)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Store a raw partial configuration, e.g. one written by an older version.
    pub async fn set_partial_tab_settings(
        &self,
        context_id: i64,
        partial: &PartialFilterConfig,
    ) -> Result<()> {
        let json = serde_json::to_string(partial).context("serializing partial configuration")?;
        sqlx::query(
            r#"
            INSERT INTO tab_settings (context_id, config, updated_at)
            VALUES (?, ?, datetime('now'))
            ON CONFLICT(context_id) DO UPDATE SET config = excluded.config, updated_at = excluded.updated_at
        "#,
        )
        .bind(context_id)
        .bind(json)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Remove a context's snapshot. Returns whether a row existed.
    pub async fn delete_tab_settings(&self, context_id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM tab_settings WHERE context_id = ?")
            .bind(context_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Context ids with a stored snapshot, ascending.
    pub async fn list_tab_contexts(&self) -> Result<Vec<i64>> {
        let rows: Vec<(i64,)> =
            sqlx::query_as("SELECT context_id FROM tab_settings ORDER BY context_id")
                .fetch_all(&self.pool)
                .await?;

        Ok(rows.into_iter().map(|(id,)| id).collect())
    }
}

#[cfg(test)]
mod tests {
    use crate::filter::{merge, FilterConfig, PartialFilterConfig};
    use crate::storage::Database;

    async fn test_db() -> Database {
        Database::open(":memory:").await.unwrap()
    }

    #[tokio::test]
    async fn test_missing_context() {
        let db = test_db().await;
        assert_eq!(db.get_tab_settings(7).await.unwrap(), None);
        assert!(!db.delete_tab_settings(7).await.unwrap());
    }

    #[tokio::test]
    async fn test_set_get_roundtrip() {
        let db = test_db().await;
        let mut config = FilterConfig::default();
        config.rules.blacklist.enabled = true;
        config.rules.blacklist.terms = vec!["remix".to_string()];
        db.set_tab_settings(3, &config).await.unwrap();

        let stored = db.get_tab_settings(3).await.unwrap().unwrap();
        assert_eq!(merge(&FilterConfig::default(), &stored), config);
        assert_eq!(db.list_tab_contexts().await.unwrap(), vec![3]);
    }

    #[tokio::test]
    async fn test_upsert_and_delete() {
        let db = test_db().await;
        let mut config = FilterConfig::default();
        db.set_tab_settings(1, &config).await.unwrap();
        config.enabled = false;
        db.set_tab_settings(1, &config).await.unwrap();

        let stored = db.get_tab_settings(1).await.unwrap().unwrap();
        assert_eq!(stored.enabled, Some(false));
        assert!(db.delete_tab_settings(1).await.unwrap());
        assert!(db.list_tab_contexts().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_corrupt_row_reads_as_absent() {
        let db = test_db().await;
        sqlx::query("INSERT INTO tab_settings (context_id, config) VALUES (9, 'not json')")
            .execute(&db.pool)
            .await
            .unwrap();
        assert_eq!(db.get_tab_settings(9).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_partial_snapshot_stored_verbatim() {
        let db = test_db().await;
        let partial: PartialFilterConfig =
            serde_json::from_str(r#"{"year":{"min":2000}}"#).unwrap();
        db.set_partial_tab_settings(5, &partial).await.unwrap();
        assert_eq!(db.get_tab_settings(5).await.unwrap(), Some(partial));
    }
}
