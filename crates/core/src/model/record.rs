use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::model::ids::ScenarioId;
use crate::scoring::{AssistanceLevel, Milestone, milestone_for, overall_level};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum TrainingRecordError {
    #[error("completed steps ({completed}) exceed total steps ({total})")]
    CountMismatch { completed: u32, total: u32 },

    #[error("too many step levels for a single session: {len}")]
    TooManyLevels { len: usize },

    #[error("persisted overall level does not match step levels")]
    OverallMismatch,

    #[error("persisted milestone does not match overall level")]
    MilestoneMismatch,
}

/// Finalized outcome of one training session.
///
/// Created only when a session finishes, appended to the bounded history
/// log, never mutated afterwards. `overall_level` is always the worst
/// level present in `step_levels`; `milestone` is derived from
/// `overall_level` alone — `from_persisted` re-checks both.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrainingRecord {
    timestamp: DateTime<Utc>,
    scenario_id: ScenarioId,
    scenario_name: String,
    step_levels: Vec<AssistanceLevel>,
    overall_level: AssistanceLevel,
    milestone: Milestone,
    total_steps: u32,
    completed_steps: u32,
}

impl TrainingRecord {
    /// Derives a record from a finished session's step-level vector.
    ///
    /// # Errors
    ///
    /// Returns `TrainingRecordError` if more levels were captured than the
    /// scenario has steps, or the count cannot be represented.
    pub fn from_step_levels(
        timestamp: DateTime<Utc>,
        scenario_id: ScenarioId,
        scenario_name: impl Into<String>,
        step_levels: Vec<AssistanceLevel>,
        total_steps: u32,
    ) -> Result<Self, TrainingRecordError> {
        let completed_steps = u32::try_from(step_levels.len())
            .map_err(|_| TrainingRecordError::TooManyLevels { len: step_levels.len() })?;
        if completed_steps > total_steps {
            return Err(TrainingRecordError::CountMismatch {
                completed: completed_steps,
                total: total_steps,
            });
        }
        let overall = overall_level(&step_levels);
        Ok(Self {
            timestamp,
            scenario_id,
            scenario_name: scenario_name.into(),
            step_levels,
            overall_level: overall,
            milestone: milestone_for(overall),
            total_steps,
            completed_steps,
        })
    }

    /// Rehydrates a record from storage, re-validating the derivation
    /// invariants.
    ///
    /// # Errors
    ///
    /// Returns `TrainingRecordError` if counts disagree or the persisted
    /// overall level / milestone do not match the step levels.
    #[allow(clippy::too_many_arguments)]
    pub fn from_persisted(
        timestamp: DateTime<Utc>,
        scenario_id: ScenarioId,
        scenario_name: String,
        step_levels: Vec<AssistanceLevel>,
        overall: AssistanceLevel,
        milestone: Milestone,
        total_steps: u32,
        completed_steps: u32,
    ) -> Result<Self, TrainingRecordError> {
        if completed_steps > total_steps || step_levels.len() != completed_steps as usize {
            return Err(TrainingRecordError::CountMismatch {
                completed: completed_steps,
                total: total_steps,
            });
        }
        if overall != overall_level(&step_levels) {
            return Err(TrainingRecordError::OverallMismatch);
        }
        if milestone != milestone_for(overall) {
            return Err(TrainingRecordError::MilestoneMismatch);
        }
        Ok(Self {
            timestamp,
            scenario_id,
            scenario_name,
            step_levels,
            overall_level: overall,
            milestone,
            total_steps,
            completed_steps,
        })
    }

    #[must_use]
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    #[must_use]
    pub fn scenario_id(&self) -> &ScenarioId {
        &self.scenario_id
    }

    #[must_use]
    pub fn scenario_name(&self) -> &str {
        &self.scenario_name
    }

    #[must_use]
    pub fn step_levels(&self) -> &[AssistanceLevel] {
        &self.step_levels
    }

    #[must_use]
    pub fn overall_level(&self) -> AssistanceLevel {
        self.overall_level
    }

    #[must_use]
    pub fn milestone(&self) -> Milestone {
        self.milestone
    }

    #[must_use]
    pub fn total_steps(&self) -> u32 {
        self.total_steps
    }

    #[must_use]
    pub fn completed_steps(&self) -> u32 {
        self.completed_steps
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::fixed_now;
    use AssistanceLevel::{Full, Independent, Partial};

    #[test]
    fn record_derives_overall_and_milestone() {
        let record = TrainingRecord::from_step_levels(
            fixed_now(),
            ScenarioId::new("crossing_road"),
            "Crossing the road",
            vec![Partial, Independent, Independent],
            3,
        )
        .unwrap();

        assert_eq!(record.overall_level(), Partial);
        assert_eq!(record.milestone(), Milestone::Level1);
        assert_eq!(record.completed_steps(), 3);
        assert_eq!(record.total_steps(), 3);
    }

    #[test]
    fn more_levels_than_steps_is_rejected() {
        let err = TrainingRecord::from_step_levels(
            fixed_now(),
            ScenarioId::new("s"),
            "S",
            vec![Full, Full],
            1,
        )
        .unwrap_err();
        assert!(matches!(err, TrainingRecordError::CountMismatch { .. }));
    }

    #[test]
    fn persisted_invariants_are_revalidated() {
        let err = TrainingRecord::from_persisted(
            fixed_now(),
            ScenarioId::new("s"),
            "S".into(),
            vec![Independent],
            Full,
            Milestone::Level1,
            1,
            1,
        )
        .unwrap_err();
        assert_eq!(err, TrainingRecordError::OverallMismatch);

        let err = TrainingRecord::from_persisted(
            fixed_now(),
            ScenarioId::new("s"),
            "S".into(),
            vec![Independent],
            Independent,
            Milestone::Level1,
            1,
            1,
        )
        .unwrap_err();
        assert_eq!(err, TrainingRecordError::MilestoneMismatch);
    }
}
