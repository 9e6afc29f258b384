use thiserror::Error;

use crate::model::{ScenarioError, StepError, TrainingRecordError};

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Scenario(#[from] ScenarioError),
    #[error(transparent)]
    Step(#[from] StepError),
    #[error(transparent)]
    Record(#[from] TrainingRecordError),
}
