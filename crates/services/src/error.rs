//! Shared error types for the services crate.

use thiserror::Error;

use story_core::audio::AudioError;
use story_core::model::{ScenarioError, StepError, TrainingRecordError};
use storage::repository::StorageError;
use storage::sqlite::SqliteInitError;

/// Errors emitted by AI collaborators (`ScenarioPlanner`, `ImageGenerator`,
/// `SpeechGenerator`).
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AiServiceError {
    #[error("AI backend request failed with status {0}")]
    HttpStatus(reqwest::StatusCode),
    #[error("AI backend reported failure: {0}")]
    Backend(String),
    #[error("AI backend returned an empty response")]
    EmptyResponse,
    #[error(transparent)]
    Audio(#[from] AudioError),
    #[error("invalid base64 audio payload")]
    Base64(#[from] base64::DecodeError),
    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

/// Errors emitted by audio outputs. Narration callers never see these;
/// the narrator logs and swallows them.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum NarrationError {
    #[error("audio output unavailable: {0}")]
    Output(String),
}

/// Errors emitted by the session flow.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SessionError {
    #[error("scenario planning failed")]
    Planning(#[source] AiServiceError),
    #[error(transparent)]
    Scenario(#[from] ScenarioError),
    #[error(transparent)]
    Step(#[from] StepError),
    #[error(transparent)]
    Record(#[from] TrainingRecordError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted while bootstrapping app services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AppServicesError {
    #[error(transparent)]
    Sqlite(#[from] SqliteInitError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Scenario(#[from] ScenarioError),
}
