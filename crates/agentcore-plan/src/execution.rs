//! Execution generator (§4.8, §9): modeled as an explicit state machine
//! rather than a language coroutine. `next_step` yields one step at a time,
//! the kernel drives it in a loop, and checkpoints/decision points/rollback
//! are all plain calls on [`PlanExecutor`] rather than hidden generator
//! state.

use chrono::Utc;
use serde_json::json;
use uuid::Uuid;

use agentcore_types::{InteractivePlan, InteractivePlanStatus, PlanCheckpoint, PlanStep, PlanStepStatus};

use crate::error::PlanError;

/// What the generator handed back for this call to `next_step`.
#[derive(Debug, Clone)]
pub enum StepOutcome {
    /// A step is ready to execute; the caller runs it and reports back via
    /// `complete_step`/`fail_step`.
    Yield(PlanStep),
    /// Execution is paused at a decision point awaiting `make_decision`.
    Paused { step_number: u32, reason: String, decision_options: Vec<String> },
    /// Every step is completed or skipped.
    Done,
    /// A step cannot run because a dependency did not complete or was not
    /// skipped. Not a coroutine panic — the caller decides what to do next
    /// (abort, skip, edit and retry).
    Failed(PlanError),
}

#[derive(Debug, Clone, Copy)]
pub struct ExecutionConfig {
    pub auto_checkpoint: bool,
    pub max_checkpoints: usize,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self { auto_checkpoint: true, max_checkpoints: 20 }
    }
}

/// Drives one [`InteractivePlan`] through its steps. Holds no state of its
/// own beyond config — everything durable lives on the plan, so a fresh
/// executor over the same plan picks up exactly where the last one left
/// off (e.g. after a process restart that reloaded the plan from storage).
pub struct PlanExecutor<'a> {
    plan: &'a mut InteractivePlan,
    config: ExecutionConfig,
}

impl<'a> PlanExecutor<'a> {
    pub fn new(plan: &'a mut InteractivePlan, config: ExecutionConfig) -> Self {
        Self { plan, config }
    }

    fn dependency_met(&self, dep: u32) -> bool {
        self.plan
            .steps
            .iter()
            .find(|s| s.number == dep)
            .map(|s| matches!(s.status, PlanStepStatus::Completed | PlanStepStatus::Skipped))
            .unwrap_or(false)
    }

    /// Advance to the next actionable step, or report why we can't.
    pub fn next_step(&mut self) -> StepOutcome {
        if self.plan.status == InteractivePlanStatus::Paused {
            if let Some(step) = self.plan.steps.get(self.plan.current_step_index) {
                return StepOutcome::Paused {
                    step_number: step.number,
                    reason: "awaiting decision".to_string(),
                    decision_options: step.decision_options.clone(),
                };
            }
        }

        loop {
            if self.plan.current_step_index >= self.plan.steps.len() {
                self.plan.status = InteractivePlanStatus::Completed;
                return StepOutcome::Done;
            }

            let idx = self.plan.current_step_index;
            let status = self.plan.steps[idx].status;
            if matches!(status, PlanStepStatus::Skipped | PlanStepStatus::Completed) {
                self.plan.current_step_index += 1;
                continue;
            }

            let deps: Vec<u32> = self.plan.steps[idx].dependencies.clone();
            if let Some(unmet) = deps.iter().find(|d| !self.dependency_met(**d)) {
                let _ = unmet;
                let number = self.plan.steps[idx].number;
                return StepOutcome::Failed(PlanError::DependenciesUnmet(number));
            }

            let is_decision = self.plan.steps[idx].is_decision_point;
            let has_choice = self.plan.steps[idx].decision_choice.is_some();
            if is_decision && !has_choice {
                self.plan.status = InteractivePlanStatus::Paused;
                let step = &self.plan.steps[idx];
                return StepOutcome::Paused {
                    step_number: step.number,
                    reason: format!("step {} is a decision point", step.number),
                    decision_options: step.decision_options.clone(),
                };
            }

            if self.config.auto_checkpoint {
                let before_step_id = self.plan.steps[idx].id.clone();
                self.checkpoint(before_step_id);
            }

            self.plan.status = InteractivePlanStatus::Executing;
            self.plan.steps[idx].status = PlanStepStatus::InProgress;
            return StepOutcome::Yield(self.plan.steps[idx].clone());
        }
    }

    /// Record the in-flight step (at `current_step_index`) as completed and
    /// advance the cursor.
    pub fn complete_step(&mut self, output: Option<String>) -> Result<(), PlanError> {
        let idx = self.plan.current_step_index;
        let step = self.plan.steps.get_mut(idx).ok_or(PlanError::NoSuchStep(0))?;
        step.status = PlanStepStatus::Completed;
        step.output = output;
        self.plan.current_step_index += 1;
        Ok(())
    }

    /// Record the in-flight step as failed. The plan itself transitions to
    /// `Failed` — callers needing partial-failure tolerance should use
    /// `skip step N` edits ahead of time instead of relying on recovery
    /// after the fact.
    pub fn fail_step(&mut self) -> Result<(), PlanError> {
        let idx = self.plan.current_step_index;
        let step = self.plan.steps.get_mut(idx).ok_or(PlanError::NoSuchStep(0))?;
        step.status = PlanStepStatus::Failed;
        self.plan.status = InteractivePlanStatus::Failed;
        Ok(())
    }

    /// Resolve the decision point blocking `current_step_index` and resume
    /// execution on the next `next_step` call.
    pub fn make_decision(&mut self, choice: impl Into<String>) -> Result<(), PlanError> {
        let idx = self.plan.current_step_index;
        let step = self.plan.steps.get_mut(idx).ok_or(PlanError::NoSuchStep(0))?;
        if !step.is_decision_point {
            return Err(PlanError::NoSuchStep(step.number));
        }
        step.decision_choice = Some(choice.into());
        self.plan.status = InteractivePlanStatus::Executing;
        Ok(())
    }

    fn checkpoint(&mut self, before_step_id: String) {
        let snapshot = json!({
            "steps": self.plan.steps,
            "status": self.plan.status,
            "current_step_index": self.plan.current_step_index,
        });
        self.plan.checkpoints.push(PlanCheckpoint {
            id: Uuid::new_v4().to_string(),
            plan_state_snapshot: snapshot,
            before_step_id,
            timestamp: Utc::now(),
        });
        if self.plan.checkpoints.len() > self.config.max_checkpoints {
            self.plan.checkpoints.remove(0);
        }
    }

    /// Restore the plan to exactly the state captured by `checkpoint_id`,
    /// discarding every checkpoint taken after it (§4.8: "discards later
    /// checkpoints").
    pub fn rollback(&mut self, checkpoint_id: &str) -> Result<(), PlanError> {
        let pos = self
            .plan
            .checkpoints
            .iter()
            .position(|c| c.id == checkpoint_id)
            .ok_or_else(|| PlanError::NoSuchCheckpoint(checkpoint_id.to_string()))?;

        let snapshot = self.plan.checkpoints[pos].plan_state_snapshot.clone();
        let steps: Vec<PlanStep> = serde_json::from_value(snapshot["steps"].clone()).map_err(|_| PlanError::NoSuchCheckpoint(checkpoint_id.to_string()))?;
        let status: InteractivePlanStatus =
            serde_json::from_value(snapshot["status"].clone()).map_err(|_| PlanError::NoSuchCheckpoint(checkpoint_id.to_string()))?;
        let current_step_index: usize =
            serde_json::from_value(snapshot["current_step_index"].clone()).map_err(|_| PlanError::NoSuchCheckpoint(checkpoint_id.to_string()))?;

        self.plan.steps = steps;
        self.plan.status = status;
        self.plan.current_step_index = current_step_index;
        self.plan.checkpoints.truncate(pos + 1);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agentcore_types::PlanStepStatus;

    fn step(number: u32, description: &str) -> PlanStep {
        PlanStep {
            id: format!("step-{number}"),
            number,
            description: description.to_string(),
            dependencies: Vec::new(),
            status: PlanStepStatus::Pending,
            is_decision_point: false,
            decision_options: Vec::new(),
            decision_choice: None,
            checkpoint_id: None,
            output: None,
        }
    }

    fn plan(steps: Vec<PlanStep>) -> InteractivePlan {
        let mut plan = InteractivePlan::new("p1", "goal");
        plan.steps = steps;
        plan.status = InteractivePlanStatus::Executing;
        plan
    }

    #[test]
    fn yields_steps_in_order_and_completes() {
        let mut p = plan(vec![step(1, "a"), step(2, "b")]);
        let mut exec = PlanExecutor::new(&mut p, ExecutionConfig::default());

        match exec.next_step() {
            StepOutcome::Yield(s) => assert_eq!(s.number, 1),
            other => panic!("expected yield, got {other:?}"),
        }
        exec.complete_step(Some("done a".to_string())).unwrap();

        match exec.next_step() {
            StepOutcome::Yield(s) => assert_eq!(s.number, 2),
            other => panic!("expected yield, got {other:?}"),
        }
        exec.complete_step(None).unwrap();

        assert!(matches!(exec.next_step(), StepOutcome::Done));
    }

    #[test]
    fn skips_are_never_yielded() {
        let mut steps = vec![step(1, "a"), step(2, "b")];
        steps[0].status = PlanStepStatus::Skipped;
        let mut p = plan(steps);
        let mut exec = PlanExecutor::new(&mut p, ExecutionConfig::default());

        match exec.next_step() {
            StepOutcome::Yield(s) => assert_eq!(s.number, 2),
            other => panic!("expected yield of step 2, got {other:?}"),
        }
    }

    #[test]
    fn unmet_dependency_fails_without_advancing() {
        let mut steps = vec![step(1, "a"), step(2, "b")];
        steps[1].dependencies = vec![1];
        let mut p = plan(steps);
        let mut exec = PlanExecutor::new(&mut p, ExecutionConfig::default());

        exec.next_step(); // yields step 1, leaves it in_progress without completing
        assert!(matches!(exec.next_step(), StepOutcome::Yield(_))); // still step 1, not advanced
    }

    #[test]
    fn decision_point_pauses_and_resumes() {
        let mut steps = vec![step(1, "pick a provider")];
        steps[0].is_decision_point = true;
        steps[0].decision_options = vec!["openai".to_string(), "anthropic".to_string()];
        let mut p = plan(steps);
        let mut exec = PlanExecutor::new(&mut p, ExecutionConfig::default());

        match exec.next_step() {
            StepOutcome::Paused { step_number, decision_options, .. } => {
                assert_eq!(step_number, 1);
                assert_eq!(decision_options.len(), 2);
            }
            other => panic!("expected pause, got {other:?}"),
        }
        assert_eq!(p.status, InteractivePlanStatus::Paused);

        let mut exec = PlanExecutor::new(&mut p, ExecutionConfig::default());
        exec.make_decision("anthropic").unwrap();
        match exec.next_step() {
            StepOutcome::Yield(s) => assert_eq!(s.decision_choice.as_deref(), Some("anthropic")),
            other => panic!("expected yield after decision, got {other:?}"),
        }
    }

    #[test]
    fn rollback_restores_state_and_discards_later_checkpoints() {
        // Checkpoints snapshot state *before* the step they're stamped with
        // runs, so rolling back to the checkpoint taken before step 2 undoes
        // step 2's completion while leaving step 1 untouched.
        let mut p = plan(vec![step(1, "a"), step(2, "b"), step(3, "c")]);
        let mut exec = PlanExecutor::new(&mut p, ExecutionConfig::default());

        exec.next_step();
        exec.complete_step(None).unwrap();

        let mut exec = PlanExecutor::new(&mut p, ExecutionConfig::default());
        exec.next_step();
        let checkpoint_before_second = p.checkpoints[1].id.clone();
        let mut exec = PlanExecutor::new(&mut p, ExecutionConfig::default());
        exec.complete_step(None).unwrap();
        assert_eq!(p.checkpoints.len(), 2);

        let mut exec = PlanExecutor::new(&mut p, ExecutionConfig::default());
        exec.rollback(&checkpoint_before_second).unwrap();

        assert_eq!(p.checkpoints.len(), 2);
        assert_eq!(p.current_step_index, 1);
        assert_eq!(p.steps[0].status, PlanStepStatus::Completed);
        assert_eq!(p.steps[1].status, PlanStepStatus::Pending);
    }

    #[test]
    fn checkpoints_are_capped_at_max_checkpoints() {
        let steps: Vec<PlanStep> = (1..=5).map(|n| step(n, "s")).collect();
        let mut p = plan(steps);
        let mut exec = PlanExecutor::new(&mut p, ExecutionConfig { auto_checkpoint: true, max_checkpoints: 2 });

        for _ in 0..5 {
            if let StepOutcome::Yield(_) = exec.next_step() {
                exec.complete_step(None).unwrap();
            }
        }
        assert!(p.checkpoints.len() <= 2);
    }
}
