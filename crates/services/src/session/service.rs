use chrono::{DateTime, Utc};

use story_core::model::{Scenario, ScenarioId, StepError, TrainingStep};
use story_core::scoring::AssistanceLevel;

use super::guard::FlowGuard;

//
// ─── ADVANCEMENT DECISION ──────────────────────────────────────────────────────
//

/// Pure advancement decision for the current step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdvanceOutcome {
    /// The current step has no assistance level yet; the caller must ask
    /// for one before moving on.
    NeedsAssistanceLevel,
    /// Moved to the step at this index.
    Advanced(usize),
    /// The last step was completed; the session is over.
    Finished,
}

//
// ─── TRAINING SESSION ──────────────────────────────────────────────────────────
//

/// Working copy of one scenario run.
///
/// Steps are cloned out of the canonical scenario at start; completion
/// toggles and assistance levels live only here and die with the session.
#[derive(Debug)]
pub struct TrainingSession {
    scenario_id: ScenarioId,
    scenario_name: String,
    icon: String,
    next_recommendation: ScenarioId,
    voice: String,
    steps: Vec<TrainingStep>,
    current: usize,
    started_at: DateTime<Utc>,
    guard: FlowGuard,
}

impl TrainingSession {
    /// Builds the working copy. The scenario is consumed; `current` starts
    /// at the first step.
    pub(crate) fn new(
        scenario: Scenario,
        voice: String,
        started_at: DateTime<Utc>,
        guard: FlowGuard,
    ) -> Self {
        let scenario_id = scenario.id().clone();
        let scenario_name = scenario.name().to_owned();
        let icon = scenario.icon().to_owned();
        let next_recommendation = scenario.next_recommendation().clone();
        Self {
            scenario_id,
            scenario_name,
            icon,
            next_recommendation,
            voice,
            steps: scenario.into_steps(),
            current: 0,
            started_at,
            guard,
        }
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
    pub fn icon(&self) -> &str {
        &self.icon
    }

    #[must_use]
    pub fn next_recommendation(&self) -> &ScenarioId {
        &self.next_recommendation
    }

    #[must_use]
    pub fn voice(&self) -> &str {
        &self.voice
    }

    #[must_use]
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub(crate) fn guard(&self) -> &FlowGuard {
        &self.guard
    }

    #[must_use]
    pub fn steps(&self) -> &[TrainingStep] {
        &self.steps
    }

    #[must_use]
    pub fn current_index(&self) -> usize {
        self.current
    }

    /// The step the child is working on. The index never runs past the
    /// end; finishing is reported through [`Self::try_advance`] instead.
    #[must_use]
    pub fn current_step(&self) -> &TrainingStep {
        &self.steps[self.current]
    }

    #[must_use]
    pub fn is_last_step(&self) -> bool {
        self.current + 1 == self.steps.len()
    }

    /// `(completed, total)` step counts.
    #[must_use]
    pub fn progress(&self) -> (usize, usize) {
        let completed = self.steps.iter().filter(|s| s.is_completed()).count();
        (completed, self.steps.len())
    }

    /// Marks the current step done with the level of help it needed.
    ///
    /// # Errors
    ///
    /// Returns `StepError::AlreadyCompleted` if it is already done.
    pub fn complete_current(&mut self, level: AssistanceLevel) -> Result<(), StepError> {
        self.steps[self.current].complete(level)
    }

    /// Toggles the current step back open; its level is forgotten and the
    /// level prompt must appear again on re-completion.
    ///
    /// # Errors
    ///
    /// Returns `StepError::NotCompleted` if it was not completed.
    pub fn reopen_current(&mut self) -> Result<(), StepError> {
        self.steps[self.current].reopen()
    }

    /// Decides what advancing means right now. Does not finalize anything;
    /// the flow service turns `Finished` into a training record.
    pub fn try_advance(&mut self) -> AdvanceOutcome {
        if !self.steps[self.current].is_completed() {
            return AdvanceOutcome::NeedsAssistanceLevel;
        }
        if self.current + 1 < self.steps.len() {
            self.current += 1;
            return AdvanceOutcome::Advanced(self.current);
        }
        AdvanceOutcome::Finished
    }

    /// Assistance levels of completed steps, in step order.
    #[must_use]
    pub fn step_levels(&self) -> Vec<AssistanceLevel> {
        self.steps
            .iter()
            .filter_map(TrainingStep::assistance_level)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::FlowEpochs;
    use story_core::model::StepId;
    use story_core::time::fixed_now;

    fn session(step_count: u32) -> TrainingSession {
        let steps = (1..=step_count)
            .map(|i| {
                TrainingStep::new(StepId::new(i), i - 1, format!("step {i}"), "prompt", None)
                    .unwrap()
            })
            .collect();
        let scenario = Scenario::new(
            ScenarioId::new("supermarket_queue"),
            "Queueing",
            "X",
            "",
            steps,
            ScenarioId::new("crossing_road"),
        )
        .unwrap();
        TrainingSession::new(scenario, "Kore".into(), fixed_now(), FlowEpochs::new().begin())
    }

    #[test]
    fn advance_requires_a_level_for_the_current_step() {
        let mut s = session(2);
        assert_eq!(s.try_advance(), AdvanceOutcome::NeedsAssistanceLevel);

        s.complete_current(AssistanceLevel::Independent).unwrap();
        assert_eq!(s.try_advance(), AdvanceOutcome::Advanced(1));
        assert_eq!(s.current_index(), 1);
    }

    #[test]
    fn finishing_reports_after_the_last_completed_step() {
        let mut s = session(2);
        s.complete_current(AssistanceLevel::Partial).unwrap();
        assert_eq!(s.try_advance(), AdvanceOutcome::Advanced(1));
        s.complete_current(AssistanceLevel::Full).unwrap();
        assert!(s.is_last_step());
        assert_eq!(s.try_advance(), AdvanceOutcome::Finished);
        assert_eq!(
            s.step_levels(),
            vec![AssistanceLevel::Partial, AssistanceLevel::Full]
        );
    }

    #[test]
    fn session_state_is_debug_printable() {
        let s = session(2);
        let rendered = format!("{s:?}");
        assert!(rendered.contains("supermarket_queue"));
        assert!(rendered.contains("current: 0"));
    }

    #[test]
    fn reopen_forgets_the_level_and_blocks_advancement() {
        let mut s = session(1);
        s.complete_current(AssistanceLevel::Independent).unwrap();
        s.reopen_current().unwrap();
        assert_eq!(s.try_advance(), AdvanceOutcome::NeedsAssistanceLevel);
        assert!(s.step_levels().is_empty());
        assert_eq!(s.progress(), (0, 1));
    }
}
