use std::sync::Arc;

use story_core::model::TrainingRecord;
use storage::repository::{HISTORY_LIMIT, StorageError, TrainingHistoryRepository};

/// Read access to the bounded training-history log.
pub struct TrainingHistoryService {
    repository: Arc<dyn TrainingHistoryRepository>,
}

impl TrainingHistoryService {
    #[must_use]
    pub fn new(repository: Arc<dyn TrainingHistoryRepository>) -> Self {
        Self { repository }
    }

    /// Every retained record, newest first.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on adapter failures.
    pub async fn recent(&self) -> Result<Vec<TrainingRecord>, StorageError> {
        self.repository
            .recent_records(u32::try_from(HISTORY_LIMIT).unwrap_or(u32::MAX))
            .await
    }

    /// The most recent record, if any session has finished yet.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on adapter failures.
    pub async fn latest(&self) -> Result<Option<TrainingRecord>, StorageError> {
        Ok(self.repository.recent_records(1).await?.into_iter().next())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use story_core::model::ScenarioId;
    use story_core::scoring::AssistanceLevel;
    use story_core::time::fixed_now;
    use storage::repository::InMemoryRepository;

    #[tokio::test]
    async fn latest_returns_the_newest_record() {
        let repo = Arc::new(InMemoryRepository::new());
        for (offset, name) in [(1, "first"), (2, "second")] {
            let record = TrainingRecord::from_step_levels(
                fixed_now() + chrono::Duration::seconds(offset),
                ScenarioId::new("supermarket_queue"),
                name,
                vec![AssistanceLevel::Independent],
                1,
            )
            .unwrap();
            repo.append_record(&record).await.unwrap();
        }

        let service = TrainingHistoryService::new(repo);
        let latest = service.latest().await.unwrap().unwrap();
        assert_eq!(latest.scenario_name(), "second");
        assert_eq!(service.recent().await.unwrap().len(), 2);
    }
}
