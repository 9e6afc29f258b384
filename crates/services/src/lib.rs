#![forbid(unsafe_code)]

pub mod ai;
pub mod app_services;
pub mod error;
pub mod history_service;
pub mod narration;
pub mod preferences_service;
pub mod session;

pub use story_core::Clock;

pub use ai::{AiApiClient, ImageGenerator, PlannedStep, ScenarioPlan, ScenarioPlanner, SpeechGenerator};
pub use app_services::AppServices;
pub use error::{AiServiceError, AppServicesError, NarrationError, SessionError};
pub use history_service::TrainingHistoryService;
pub use narration::{AudioOutput, Narrator, PlaybackHandle, SilentOutput};
pub use preferences_service::PreferencesService;
pub use session::{
    AdvanceResult, FinishedSession, FlowEpochs, FlowGuard, PendingCacheChoice, SessionFlowService,
    SessionPhase, SessionRequest, SessionStart, TrainingSession,
};
