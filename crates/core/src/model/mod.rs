mod ids;
mod preferences;
mod record;
mod scenario;
mod step;

pub use ids::{ScenarioId, StepId};
pub use preferences::{
    DEFAULT_CHILD_NAME, DEFAULT_MUSIC, DEFAULT_VOICE, PreferencesDraft, UserPreferences,
};
pub use record::{TrainingRecord, TrainingRecordError};
pub use scenario::{Scenario, ScenarioError};
pub use step::{ImageRef, StepError, TrainingStep};
