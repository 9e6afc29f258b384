use async_trait::async_trait;

use story_core::model::TrainingRecord;

use super::{SqliteRepository, mapping};
use crate::repository::{HISTORY_LIMIT, StorageError, TrainingHistoryRepository};

#[async_trait]
impl TrainingHistoryRepository for SqliteRepository {
    async fn append_record(&self, record: &TrainingRecord) -> Result<i64, StorageError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        let result = sqlx::query(
            r"
            INSERT INTO training_records (
                timestamp, scenario_id, scenario_name, step_levels,
                overall_level, milestone, total_steps, completed_steps
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            ",
        )
        .bind(record.timestamp())
        .bind(record.scenario_id().as_str())
        .bind(record.scenario_name())
        .bind(mapping::encode_levels(record.step_levels()))
        .bind(record.overall_level().code().to_string())
        .bind(record.milestone().to_string())
        .bind(i64::from(record.total_steps()))
        .bind(i64::from(record.completed_steps()))
        .execute(&mut *tx)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        let id = result.last_insert_rowid();

        // cap the log, dropping whatever is chronologically oldest
        sqlx::query(
            r"
            DELETE FROM training_records
            WHERE id NOT IN (
                SELECT id FROM training_records
                ORDER BY timestamp DESC, id DESC
                LIMIT ?1
            )
            ",
        )
        .bind(HISTORY_LIMIT as i64)
        .execute(&mut *tx)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        tx.commit()
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(id)
    }

    async fn recent_records(&self, limit: u32) -> Result<Vec<TrainingRecord>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT
                timestamp, scenario_id, scenario_name, step_levels,
                overall_level, milestone, total_steps, completed_steps
            FROM training_records
            ORDER BY timestamp DESC, id DESC
            LIMIT ?1
            ",
        )
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        rows.iter().map(mapping::map_record_row).collect()
    }
}
