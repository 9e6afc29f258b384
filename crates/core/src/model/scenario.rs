use std::collections::HashSet;
use thiserror::Error;

use crate::model::ids::{ScenarioId, StepId};
use crate::model::step::{ImageRef, StepError, TrainingStep};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ScenarioError {
    #[error("scenario name is empty")]
    EmptyName,

    #[error("scenario has no steps")]
    NoSteps,

    #[error("duplicate step id {0} in scenario")]
    DuplicateStepId(StepId),

    #[error(transparent)]
    Step(#[from] StepError),
}

/// A named, ordered sequence of instructional steps with illustrative
/// imagery. Immutable once planned; identity is the id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scenario {
    id: ScenarioId,
    name: String,
    icon: String,
    description: String,
    steps: Vec<TrainingStep>,
    next_recommendation: ScenarioId,
}

impl Scenario {
    /// Builds a scenario from already-constructed steps.
    ///
    /// # Errors
    ///
    /// Returns `ScenarioError` on an empty name, an empty step list, or a
    /// duplicated step id.
    pub fn new(
        id: ScenarioId,
        name: impl Into<String>,
        icon: impl Into<String>,
        description: impl Into<String>,
        steps: Vec<TrainingStep>,
        next_recommendation: ScenarioId,
    ) -> Result<Self, ScenarioError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(ScenarioError::EmptyName);
        }
        if steps.is_empty() {
            return Err(ScenarioError::NoSteps);
        }
        let mut seen = HashSet::new();
        for step in &steps {
            if !seen.insert(step.id()) {
                return Err(ScenarioError::DuplicateStepId(step.id()));
            }
        }
        Ok(Self {
            id,
            name,
            icon: icon.into(),
            description: description.into(),
            steps,
            next_recommendation,
        })
    }

    /// Synthesizes a scenario from a planner result for a free-text topic.
    ///
    /// Steps are numbered 1..N in plan order. `images` pairs each planned
    /// step with its (possibly placeholder) illustration; `None` leaves the
    /// step without a cached image.
    ///
    /// # Errors
    ///
    /// Returns `ScenarioError` if the plan is empty or a step instruction
    /// fails validation.
    pub fn from_planned(
        id: ScenarioId,
        topic: impl Into<String>,
        icon: impl Into<String>,
        planned: Vec<(String, String, Option<ImageRef>)>,
        next_recommendation: ScenarioId,
    ) -> Result<Self, ScenarioError> {
        let mut steps = Vec::with_capacity(planned.len());
        for (idx, (instruction, prompt, image)) in planned.into_iter().enumerate() {
            let order = u32::try_from(idx).unwrap_or(u32::MAX);
            steps.push(TrainingStep::new(
                StepId::new(order + 1),
                order,
                instruction,
                prompt,
                image,
            )?);
        }
        let count = steps.len();
        Self::new(
            id,
            topic,
            icon,
            format!("An AI-built social story with {count} steps"),
            steps,
            next_recommendation,
        )
    }

    #[must_use]
    pub fn id(&self) -> &ScenarioId {
        &self.id
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn icon(&self) -> &str {
        &self.icon
    }

    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    #[must_use]
    pub fn steps(&self) -> &[TrainingStep] {
        &self.steps
    }

    #[must_use]
    pub fn next_recommendation(&self) -> &ScenarioId {
        &self.next_recommendation
    }

    /// Number of steps that still lack a cached image reference.
    #[must_use]
    pub fn missing_image_count(&self) -> usize {
        self.steps.iter().filter(|s| !s.has_image()).count()
    }

    /// Returns true if every step already carries a cached image.
    #[must_use]
    pub fn all_images_cached(&self) -> bool {
        self.steps.iter().all(TrainingStep::has_image)
    }

    /// Returns true if at least one step carries a cached image.
    #[must_use]
    pub fn any_image_cached(&self) -> bool {
        self.steps.iter().any(TrainingStep::has_image)
    }

    /// Consumes the scenario, yielding its steps as a session working copy.
    #[must_use]
    pub fn into_steps(self) -> Vec<TrainingStep> {
        self.steps
    }
}
