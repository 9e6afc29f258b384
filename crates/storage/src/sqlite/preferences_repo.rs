use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::Row;

use super::{SqliteRepository, mapping::ser};
use crate::repository::{PreferencesRepository, StorageError};

#[async_trait]
impl PreferencesRepository for SqliteRepository {
    async fn load_all(&self) -> Result<HashMap<String, String>, StorageError> {
        let rows = sqlx::query("SELECT key, value FROM preferences")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        let mut out = HashMap::with_capacity(rows.len());
        for row in rows {
            let key: String = row.try_get("key").map_err(ser)?;
            let value: String = row.try_get("value").map_err(ser)?;
            out.insert(key, value);
        }
        Ok(out)
    }

    async fn save_all(&self, values: &HashMap<String, String>) -> Result<(), StorageError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        for (key, value) in values {
            sqlx::query(
                r"
                INSERT INTO preferences (key, value)
                VALUES (?1, ?2)
                ON CONFLICT(key) DO UPDATE SET value = excluded.value
                ",
            )
            .bind(key)
            .bind(value)
            .execute(&mut *tx)
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        }

        tx.commit()
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(())
    }
}
