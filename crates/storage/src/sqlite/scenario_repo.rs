use async_trait::async_trait;
use sqlx::Row;

use story_core::model::{ImageRef, Scenario, ScenarioId, StepId, TrainingStep};

use super::{SqliteRepository, mapping};
use crate::repository::{ScenarioRecord, ScenarioRepository, StepRecord, StorageError};

async fn insert_steps(
    tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
    scenario_id: &ScenarioId,
    steps: &[TrainingStep],
) -> Result<(), sqlx::Error> {
    for step in steps {
        sqlx::query(
            r"
            INSERT INTO scenario_steps (
                scenario_id, id, order_index, instruction, image_prompt, image_url
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ",
        )
        .bind(scenario_id.as_str())
        .bind(i64::from(step.id().value()))
        .bind(i64::from(step.order_index()))
        .bind(step.instruction())
        .bind(step.image_prompt_suffix())
        .bind(step.image_ref().map(ImageRef::as_str))
        .execute(&mut **tx)
        .await?;
    }
    Ok(())
}

impl SqliteRepository {
    async fn load_steps(&self, scenario_id: &ScenarioId) -> Result<Vec<StepRecord>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT id, order_index, instruction, image_prompt, image_url
            FROM scenario_steps
            WHERE scenario_id = ?1
            ORDER BY order_index ASC
            ",
        )
        .bind(scenario_id.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        rows.iter().map(mapping::map_step_row).collect()
    }

    async fn scenario_exists(&self, scenario_id: &ScenarioId) -> Result<bool, StorageError> {
        let row = sqlx::query("SELECT 1 FROM scenarios WHERE id = ?1")
            .bind(scenario_id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(row.is_some())
    }
}

#[async_trait]
impl ScenarioRepository for SqliteRepository {
    async fn create_scenario(&self, scenario: &Scenario) -> Result<(), StorageError> {
        if self.scenario_exists(scenario.id()).await? {
            return Err(StorageError::Conflict);
        }

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        sqlx::query(
            r"
            INSERT INTO scenarios (id, name, icon, description, next_recommendation)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ",
        )
        .bind(scenario.id().as_str())
        .bind(scenario.name())
        .bind(scenario.icon())
        .bind(scenario.description())
        .bind(scenario.next_recommendation().as_str())
        .execute(&mut *tx)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        insert_steps(&mut tx, scenario.id(), scenario.steps())
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        tx.commit()
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(())
    }

    async fn get_scenario(&self, id: &ScenarioId) -> Result<Option<Scenario>, StorageError> {
        let row = sqlx::query(
            r"
            SELECT id, name, icon, description, next_recommendation
            FROM scenarios
            WHERE id = ?1
            ",
        )
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        let Some(row) = row else {
            return Ok(None);
        };

        let record = ScenarioRecord {
            id: ScenarioId::new(row.try_get::<String, _>("id").map_err(mapping::ser)?),
            name: row.try_get("name").map_err(mapping::ser)?,
            icon: row.try_get("icon").map_err(mapping::ser)?,
            description: row.try_get("description").map_err(mapping::ser)?,
            next_recommendation: ScenarioId::new(
                row.try_get::<String, _>("next_recommendation")
                    .map_err(mapping::ser)?,
            ),
            steps: self.load_steps(id).await?,
        };

        record.into_scenario().map(Some).map_err(mapping::ser)
    }

    async fn list_scenarios(&self, limit: u32) -> Result<Vec<Scenario>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT id
            FROM scenarios
            ORDER BY id ASC
            LIMIT ?1
            ",
        )
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        let mut scenarios = Vec::with_capacity(rows.len());
        for row in rows {
            let id = ScenarioId::new(row.try_get::<String, _>("id").map_err(mapping::ser)?);
            // a row that fails domain validation (e.g. steps discarded and
            // never replaced) is skipped so the catalog can still load
            match self.get_scenario(&id).await {
                Ok(Some(scenario)) => scenarios.push(scenario),
                Ok(None) | Err(StorageError::Serialization(_)) => {}
                Err(err) => return Err(err),
            }
        }
        Ok(scenarios)
    }

    async fn update_step_image(
        &self,
        scenario_id: &ScenarioId,
        step_id: StepId,
        image: &ImageRef,
    ) -> Result<(), StorageError> {
        let result = sqlx::query(
            r"
            UPDATE scenario_steps
            SET image_url = ?3
            WHERE scenario_id = ?1 AND id = ?2
            ",
        )
        .bind(scenario_id.as_str())
        .bind(i64::from(step_id.value()))
        .bind(image.as_str())
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(StorageError::NotFound);
        }
        Ok(())
    }

    async fn delete_steps(&self, scenario_id: &ScenarioId) -> Result<(), StorageError> {
        if !self.scenario_exists(scenario_id).await? {
            return Err(StorageError::NotFound);
        }

        sqlx::query("DELETE FROM scenario_steps WHERE scenario_id = ?1")
            .bind(scenario_id.as_str())
            .execute(&self.pool)
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(())
    }

    async fn replace_steps(
        &self,
        scenario_id: &ScenarioId,
        steps: &[TrainingStep],
    ) -> Result<(), StorageError> {
        if !self.scenario_exists(scenario_id).await? {
            return Err(StorageError::NotFound);
        }

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        sqlx::query("DELETE FROM scenario_steps WHERE scenario_id = ?1")
            .bind(scenario_id.as_str())
            .execute(&mut *tx)
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        insert_steps(&mut tx, scenario_id, steps)
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        tx.commit()
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(())
    }
}
