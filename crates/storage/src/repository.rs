use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;

use story_core::model::{
    ImageRef, Scenario, ScenarioError, ScenarioId, StepId, TrainingRecord, TrainingStep,
};

/// Most recent training records kept in the history log; appending beyond
/// this evicts the chronologically oldest entry.
pub const HISTORY_LIMIT: usize = 50;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("conflict")]
    Conflict,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

//
// ─── PERSISTED SHAPES ──────────────────────────────────────────────────────────
//

/// Persisted shape for one scenario step.
///
/// Completion state and assistance levels are session-local working state
/// and are never persisted with the scenario.
#[derive(Debug, Clone)]
pub struct StepRecord {
    pub id: StepId,
    pub order_index: u32,
    pub instruction: String,
    pub image_prompt: String,
    pub image_url: Option<String>,
}

impl StepRecord {
    #[must_use]
    pub fn from_step(step: &TrainingStep) -> Self {
        Self {
            id: step.id(),
            order_index: step.order_index(),
            instruction: step.instruction().to_owned(),
            image_prompt: step.image_prompt_suffix().to_owned(),
            image_url: step.image_ref().map(|r| r.as_str().to_owned()),
        }
    }

    /// Convert the record back into a fresh (uncompleted) domain step.
    ///
    /// # Errors
    ///
    /// Returns `ScenarioError` if the persisted instruction fails validation.
    pub fn into_step(self) -> Result<TrainingStep, ScenarioError> {
        Ok(TrainingStep::new(
            self.id,
            self.order_index,
            self.instruction,
            self.image_prompt,
            self.image_url.map(ImageRef::new),
        )?)
    }
}

/// Persisted shape for a scenario with its ordered steps.
#[derive(Debug, Clone)]
pub struct ScenarioRecord {
    pub id: ScenarioId,
    pub name: String,
    pub icon: String,
    pub description: String,
    pub next_recommendation: ScenarioId,
    pub steps: Vec<StepRecord>,
}

impl ScenarioRecord {
    #[must_use]
    pub fn from_scenario(scenario: &Scenario) -> Self {
        Self {
            id: scenario.id().clone(),
            name: scenario.name().to_owned(),
            icon: scenario.icon().to_owned(),
            description: scenario.description().to_owned(),
            next_recommendation: scenario.next_recommendation().clone(),
            steps: scenario.steps().iter().map(StepRecord::from_step).collect(),
        }
    }

    /// Convert the record back into a domain `Scenario`.
    ///
    /// # Errors
    ///
    /// Returns `ScenarioError` if the persisted data fails domain validation.
    pub fn into_scenario(mut self) -> Result<Scenario, ScenarioError> {
        self.steps.sort_by_key(|s| s.order_index);
        let steps = self
            .steps
            .into_iter()
            .map(StepRecord::into_step)
            .collect::<Result<Vec<_>, _>>()?;
        Scenario::new(
            self.id,
            self.name,
            self.icon,
            self.description,
            steps,
            self.next_recommendation,
        )
    }
}

//
// ─── REPOSITORY CONTRACTS ──────────────────────────────────────────────────────
//

/// Repository contract for scenarios and their steps.
#[async_trait]
pub trait ScenarioRepository: Send + Sync {
    /// Persist a new scenario with its steps.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Conflict` if the id already exists.
    async fn create_scenario(&self, scenario: &Scenario) -> Result<(), StorageError>;

    /// Fetch a scenario by id, `None` if missing.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on adapter failures.
    async fn get_scenario(&self, id: &ScenarioId) -> Result<Option<Scenario>, StorageError>;

    /// List stored scenarios, up to `limit`.
    ///
    /// Rows that no longer satisfy domain validation (for instance a
    /// scenario whose steps were discarded and never replaced) are
    /// skipped rather than failing the whole listing.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on adapter failures.
    async fn list_scenarios(&self, limit: u32) -> Result<Vec<Scenario>, StorageError>;

    /// Write through a freshly generated image reference for one step.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the scenario or step is missing.
    async fn update_step_image(
        &self,
        scenario_id: &ScenarioId,
        step_id: StepId,
        image: &ImageRef,
    ) -> Result<(), StorageError>;

    /// Discard all stored steps of a scenario (regeneration prelude).
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the scenario is missing.
    async fn delete_steps(&self, scenario_id: &ScenarioId) -> Result<(), StorageError>;

    /// Replace a scenario's stored steps with a freshly planned list.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the scenario is missing.
    async fn replace_steps(
        &self,
        scenario_id: &ScenarioId,
        steps: &[TrainingStep],
    ) -> Result<(), StorageError>;
}

/// Append-only, bounded training-history log, most-recent-first.
#[async_trait]
pub trait TrainingHistoryRepository: Send + Sync {
    /// Append a finalized record; evicts beyond [`HISTORY_LIMIT`], keeping
    /// the chronologically newest entries.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on adapter failures.
    async fn append_record(&self, record: &TrainingRecord) -> Result<i64, StorageError>;

    /// The most recent records, newest first, up to `limit`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on adapter failures.
    async fn recent_records(&self, limit: u32) -> Result<Vec<TrainingRecord>, StorageError>;
}

/// Flat key-value settings store.
#[async_trait]
pub trait PreferencesRepository: Send + Sync {
    /// Load every stored setting.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on adapter failures.
    async fn load_all(&self) -> Result<HashMap<String, String>, StorageError>;

    /// Upsert the given settings, leaving other keys untouched.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on adapter failures.
    async fn save_all(&self, values: &HashMap<String, String>) -> Result<(), StorageError>;
}

//
// ─── IN-MEMORY ADAPTER ─────────────────────────────────────────────────────────
//

/// In-memory implementation of every repository, for tests and headless
/// runs without durability.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    scenarios: Arc<Mutex<HashMap<ScenarioId, ScenarioRecord>>>,
    history: Arc<Mutex<HistoryLog>>,
    preferences: Arc<Mutex<HashMap<String, String>>>,
}

#[derive(Default)]
struct HistoryLog {
    next_id: i64,
    // kept sorted newest-first by (timestamp, id)
    entries: Vec<(i64, TrainingRecord)>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

fn lock_err<E: std::fmt::Display>(e: E) -> StorageError {
    StorageError::Connection(e.to_string())
}

#[async_trait]
impl ScenarioRepository for InMemoryRepository {
    async fn create_scenario(&self, scenario: &Scenario) -> Result<(), StorageError> {
        let mut guard = self.scenarios.lock().map_err(lock_err)?;
        if guard.contains_key(scenario.id()) {
            return Err(StorageError::Conflict);
        }
        guard.insert(scenario.id().clone(), ScenarioRecord::from_scenario(scenario));
        Ok(())
    }

    async fn get_scenario(&self, id: &ScenarioId) -> Result<Option<Scenario>, StorageError> {
        let guard = self.scenarios.lock().map_err(lock_err)?;
        guard
            .get(id)
            .cloned()
            .map(|record| {
                record
                    .into_scenario()
                    .map_err(|e| StorageError::Serialization(e.to_string()))
            })
            .transpose()
    }

    async fn list_scenarios(&self, limit: u32) -> Result<Vec<Scenario>, StorageError> {
        let guard = self.scenarios.lock().map_err(lock_err)?;
        let mut records: Vec<_> = guard.values().cloned().collect();
        records.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(records
            .into_iter()
            .filter_map(|record| record.into_scenario().ok())
            .take(limit as usize)
            .collect())
    }

    async fn update_step_image(
        &self,
        scenario_id: &ScenarioId,
        step_id: StepId,
        image: &ImageRef,
    ) -> Result<(), StorageError> {
        let mut guard = self.scenarios.lock().map_err(lock_err)?;
        let record = guard.get_mut(scenario_id).ok_or(StorageError::NotFound)?;
        let step = record
            .steps
            .iter_mut()
            .find(|s| s.id == step_id)
            .ok_or(StorageError::NotFound)?;
        step.image_url = Some(image.as_str().to_owned());
        Ok(())
    }

    async fn delete_steps(&self, scenario_id: &ScenarioId) -> Result<(), StorageError> {
        let mut guard = self.scenarios.lock().map_err(lock_err)?;
        let record = guard.get_mut(scenario_id).ok_or(StorageError::NotFound)?;
        record.steps.clear();
        Ok(())
    }

    async fn replace_steps(
        &self,
        scenario_id: &ScenarioId,
        steps: &[TrainingStep],
    ) -> Result<(), StorageError> {
        let mut guard = self.scenarios.lock().map_err(lock_err)?;
        let record = guard.get_mut(scenario_id).ok_or(StorageError::NotFound)?;
        record.steps = steps.iter().map(StepRecord::from_step).collect();
        Ok(())
    }
}

#[async_trait]
impl TrainingHistoryRepository for InMemoryRepository {
    async fn append_record(&self, record: &TrainingRecord) -> Result<i64, StorageError> {
        let mut guard = self.history.lock().map_err(lock_err)?;
        guard.next_id += 1;
        let id = guard.next_id;
        guard.entries.push((id, record.clone()));
        guard
            .entries
            .sort_by(|(ida, a), (idb, b)| (b.timestamp(), idb).cmp(&(a.timestamp(), ida)));
        guard.entries.truncate(HISTORY_LIMIT);
        Ok(id)
    }

    async fn recent_records(&self, limit: u32) -> Result<Vec<TrainingRecord>, StorageError> {
        let guard = self.history.lock().map_err(lock_err)?;
        Ok(guard
            .entries
            .iter()
            .take(limit as usize)
            .map(|(_, r)| r.clone())
            .collect())
    }
}

#[async_trait]
impl PreferencesRepository for InMemoryRepository {
    async fn load_all(&self) -> Result<HashMap<String, String>, StorageError> {
        let guard = self.preferences.lock().map_err(lock_err)?;
        Ok(guard.clone())
    }

    async fn save_all(&self, values: &HashMap<String, String>) -> Result<(), StorageError> {
        let mut guard = self.preferences.lock().map_err(lock_err)?;
        for (key, value) in values {
            guard.insert(key.clone(), value.clone());
        }
        Ok(())
    }
}

//
// ─── STORAGE AGGREGATE ─────────────────────────────────────────────────────────
//

/// Bundle of repository handles handed to the services layer.
#[derive(Clone)]
pub struct Storage {
    pub scenarios: Arc<dyn ScenarioRepository>,
    pub history: Arc<dyn TrainingHistoryRepository>,
    pub preferences: Arc<dyn PreferencesRepository>,
}

impl Storage {
    /// Build a `Storage` backed by a shared in-memory repository.
    #[must_use]
    pub fn in_memory() -> Self {
        let repo = InMemoryRepository::new();
        Self {
            scenarios: Arc::new(repo.clone()),
            history: Arc::new(repo.clone()),
            preferences: Arc::new(repo),
        }
    }
}
