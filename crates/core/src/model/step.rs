use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::model::ids::StepId;
use crate::scoring::AssistanceLevel;

//
// ─── IMAGE REFERENCE ───────────────────────────────────────────────────────────
//

/// URI of an illustration backing a step, either generated or a labeled
/// placeholder substituted after a failed generation call.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ImageRef(String);

impl ImageRef {
    #[must_use]
    pub fn new(uri: impl Into<String>) -> Self {
        Self(uri.into())
    }

    /// Builds the fallback reference shown when image generation fails:
    /// a flat placeholder card carrying the prompt text as its label.
    #[must_use]
    pub fn placeholder(prompt: &str) -> Self {
        let label: String = url::form_urlencoded::byte_serialize(prompt.as_bytes()).collect();
        Self(format!(
            "https://placehold.co/600x600/ffffff/3b82f6?text={label}"
        ))
    }

    /// Returns true if this reference is a generation-failure placeholder.
    #[must_use]
    pub fn is_placeholder(&self) -> bool {
        self.0.starts_with("https://placehold.co/")
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ImageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ImageRef({})", self.0)
    }
}

impl fmt::Display for ImageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

//
// ─── TRAINING STEP ─────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum StepError {
    #[error("step is already completed")]
    AlreadyCompleted,

    #[error("step is not completed")]
    NotCompleted,

    #[error("step instruction is empty")]
    EmptyInstruction,
}

/// One instructional unit within a scenario.
///
/// Completion and assistance level are session-local working state; the
/// canonical scenario never persists them. Invariant: a step is completed
/// exactly when it carries an assistance level.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrainingStep {
    id: StepId,
    order_index: u32,
    instruction: String,
    image_prompt_suffix: String,
    image_ref: Option<ImageRef>,
    completed: bool,
    assistance_level: Option<AssistanceLevel>,
}

impl TrainingStep {
    /// Creates a fresh, uncompleted step.
    ///
    /// # Errors
    ///
    /// Returns `StepError::EmptyInstruction` if the instruction text is blank.
    pub fn new(
        id: StepId,
        order_index: u32,
        instruction: impl Into<String>,
        image_prompt_suffix: impl Into<String>,
        image_ref: Option<ImageRef>,
    ) -> Result<Self, StepError> {
        let instruction = instruction.into();
        if instruction.trim().is_empty() {
            return Err(StepError::EmptyInstruction);
        }
        Ok(Self {
            id,
            order_index,
            instruction,
            image_prompt_suffix: image_prompt_suffix.into(),
            image_ref,
            completed: false,
            assistance_level: None,
        })
    }

    #[must_use]
    pub fn id(&self) -> StepId {
        self.id
    }

    #[must_use]
    pub fn order_index(&self) -> u32 {
        self.order_index
    }

    #[must_use]
    pub fn instruction(&self) -> &str {
        &self.instruction
    }

    #[must_use]
    pub fn image_prompt_suffix(&self) -> &str {
        &self.image_prompt_suffix
    }

    #[must_use]
    pub fn image_ref(&self) -> Option<&ImageRef> {
        self.image_ref.as_ref()
    }

    /// Returns true if the step already carries a cached image reference.
    #[must_use]
    pub fn has_image(&self) -> bool {
        self.image_ref.is_some()
    }

    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.completed
    }

    #[must_use]
    pub fn assistance_level(&self) -> Option<AssistanceLevel> {
        self.assistance_level
    }

    /// Stores a generated (or regenerated) image reference.
    pub fn set_image(&mut self, image: ImageRef) {
        self.image_ref = Some(image);
    }

    /// Drops the cached image so the step counts as needing generation again.
    pub fn clear_image(&mut self) {
        self.image_ref = None;
    }

    /// Marks the step completed with the assistance level that was needed.
    ///
    /// # Errors
    ///
    /// Returns `StepError::AlreadyCompleted` if the step is already done;
    /// re-rating requires a `reopen` first.
    pub fn complete(&mut self, level: AssistanceLevel) -> Result<(), StepError> {
        if self.completed {
            return Err(StepError::AlreadyCompleted);
        }
        self.completed = true;
        self.assistance_level = Some(level);
        Ok(())
    }

    /// Toggles a completed step back open, clearing its assistance level.
    ///
    /// Re-completing afterwards requires selecting a level again; no level
    /// is remembered across a toggle-off.
    ///
    /// # Errors
    ///
    /// Returns `StepError::NotCompleted` if the step was not completed.
    pub fn reopen(&mut self) -> Result<(), StepError> {
        if !self.completed {
            return Err(StepError::NotCompleted);
        }
        self.completed = false;
        self.assistance_level = None;
        Ok(())
    }
}
