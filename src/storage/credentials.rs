use anyhow::Result;
use secrecy::{ExposeSecret, SecretString};

use super::schema::Database;

/// Name of the video data API key credential.
pub const DATA_API_KEY: &str = "data_api_key";

impl Database {
    // ========================================================================
    // Credential Operations
    // ========================================================================

    pub async fn get_credential(&self, name: &str) -> Result<Option<SecretString>> {
        let row: Option<(String,)> = sqlx::query_as("SELECT value FROM credentials WHERE name = ?")
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row
            .map(|(value,)| value)
            .filter(|v| !v.trim().is_empty())
            .map(SecretString::from))
    }

    /// Store a credential (UPSERT). An empty value removes it.
    pub async fn set_credential(&self, name: &str, value: &SecretString) -> Result<()> {
        let value = value.expose_secret().trim();
        if value.is_empty() {
            self.delete_credential(name).await?;
            return Ok(());
        }
        sqlx::query(
            r#"
            INSERT INTO credentials (name, value, updated_at)
            VALUES (?, ?, datetime('now'))
            ON CONFLICT(name) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
        "#,
        )
        .bind(name)
        .bind(value)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn delete_credential(&self, name: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM credentials WHERE name = ?")
            .bind(name)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
