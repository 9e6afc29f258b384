use std::sync::Arc;

use story_core::catalog::builtin_scenarios;
use storage::repository::{ScenarioRepository, Storage, StorageError};

use crate::Clock;
use crate::ai::{AiApiClient, ImageGenerator, ScenarioPlanner, SpeechGenerator};
use crate::error::AppServicesError;
use crate::history_service::TrainingHistoryService;
use crate::narration::{AudioOutput, Narrator, SilentOutput};
use crate::preferences_service::PreferencesService;
use crate::session::SessionFlowService;

/// Assembles the app-facing services over one storage backend, seeding
/// the built-in scenario catalog on first run.
#[derive(Clone)]
pub struct AppServices {
    flow: Arc<SessionFlowService>,
    preferences: Arc<PreferencesService>,
    history: Arc<TrainingHistoryService>,
    scenarios: Arc<dyn ScenarioRepository>,
}

impl AppServices {
    /// Build services backed by `SQLite` storage, the REST AI backend,
    /// and a silent audio output.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if storage initialization or catalog
    /// seeding fails.
    pub async fn new_sqlite(db_url: &str, clock: Clock) -> Result<Self, AppServicesError> {
        let storage = Storage::sqlite(db_url).await?;
        let ai = Arc::new(AiApiClient::from_env());
        Self::with_components(
            storage,
            clock,
            Arc::clone(&ai) as Arc<dyn ScenarioPlanner>,
            Arc::clone(&ai) as Arc<dyn ImageGenerator>,
            ai as Arc<dyn SpeechGenerator>,
            Arc::new(SilentOutput),
        )
        .await
    }

    /// Build services over in-memory storage; useful for tests and trials
    /// without durability.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if catalog seeding fails.
    pub async fn new_in_memory(clock: Clock) -> Result<Self, AppServicesError> {
        let ai = Arc::new(AiApiClient::from_env());
        Self::with_components(
            Storage::in_memory(),
            clock,
            Arc::clone(&ai) as Arc<dyn ScenarioPlanner>,
            Arc::clone(&ai) as Arc<dyn ImageGenerator>,
            ai as Arc<dyn SpeechGenerator>,
            Arc::new(SilentOutput),
        )
        .await
    }

    /// Full wiring with injectable AI collaborators and audio output.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if catalog seeding fails.
    pub async fn with_components(
        storage: Storage,
        clock: Clock,
        planner: Arc<dyn ScenarioPlanner>,
        images: Arc<dyn ImageGenerator>,
        speech: Arc<dyn SpeechGenerator>,
        output: Arc<dyn AudioOutput>,
    ) -> Result<Self, AppServicesError> {
        seed_catalog(storage.scenarios.as_ref()).await?;

        let preferences = Arc::new(PreferencesService::new(Arc::clone(&storage.preferences)));
        let history = Arc::new(TrainingHistoryService::new(Arc::clone(&storage.history)));
        let narrator = Arc::new(Narrator::new(speech, output));
        let flow = Arc::new(SessionFlowService::new(
            clock,
            planner,
            images,
            narrator,
            Arc::clone(&storage.scenarios),
            Arc::clone(&storage.history),
            Arc::clone(&preferences),
        ));

        Ok(Self {
            flow,
            preferences,
            history,
            scenarios: storage.scenarios,
        })
    }

    #[must_use]
    pub fn flow(&self) -> Arc<SessionFlowService> {
        Arc::clone(&self.flow)
    }

    #[must_use]
    pub fn preferences(&self) -> Arc<PreferencesService> {
        Arc::clone(&self.preferences)
    }

    #[must_use]
    pub fn history(&self) -> Arc<TrainingHistoryService> {
        Arc::clone(&self.history)
    }

    #[must_use]
    pub fn scenarios(&self) -> Arc<dyn ScenarioRepository> {
        Arc::clone(&self.scenarios)
    }
}

/// First-run seeding of the fixed catalog. Concurrent seeding races are
/// harmless; conflicts mean another instance got there first.
async fn seed_catalog(scenarios: &dyn ScenarioRepository) -> Result<(), AppServicesError> {
    if !scenarios.list_scenarios(1).await?.is_empty() {
        return Ok(());
    }
    for scenario in builtin_scenarios() {
        match scenarios.create_scenario(&scenario).await {
            Ok(()) | Err(StorageError::Conflict) => {}
            Err(err) => return Err(err.into()),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use story_core::model::ScenarioId;

    #[tokio::test]
    async fn in_memory_bootstrap_seeds_the_catalog_once() {
        let services = AppServices::new_in_memory(Clock::default()).await.unwrap();
        let stored = services.scenarios().list_scenarios(16).await.unwrap();
        assert_eq!(stored.len(), 5);
        assert!(
            services
                .scenarios()
                .get_scenario(&ScenarioId::new("crossing_road"))
                .await
                .unwrap()
                .is_some()
        );

        // seeding again must not duplicate or conflict
        seed_catalog(services.scenarios().as_ref()).await.unwrap();
        assert_eq!(services.scenarios().list_scenarios(16).await.unwrap().len(), 5);
    }
}
