//! Pending plan (§4.8): while in "plan mode", every candidate write is
//! intercepted and appended as a `ProposedChange` rather than executed.

use agentcore_types::{PendingPlan, PendingPlanStatus, ProposedChange};
use chrono::Utc;

use crate::error::PlanError;

/// Append one proposed change. No-op restriction beyond the status check:
/// the plan must still be `pending`.
pub fn propose_change(plan: &mut PendingPlan, change: ProposedChange) -> Result<(), PlanError> {
    if plan.is_terminal() {
        return Err(PlanError::AlreadyTerminal(plan.id.clone()));
    }
    plan.proposed_changes.push(change);
    plan.updated_at = Utc::now();
    Ok(())
}

/// Approve the first `count` changes (or all, if `count` is `None`),
/// transition status, and return the approved changes for external
/// execution. `count < total` yields `PartiallyApproved`.
pub fn approve(plan: &mut PendingPlan, count: Option<usize>) -> Result<Vec<ProposedChange>, PlanError> {
    if plan.is_terminal() {
        return Err(PlanError::AlreadyTerminal(plan.id.clone()));
    }
    let total = plan.proposed_changes.len();
    let take = count.unwrap_or(total).min(total);
    let approved: Vec<ProposedChange> = plan.proposed_changes.drain(..take).collect();

    plan.status = if take == total { PendingPlanStatus::Approved } else { PendingPlanStatus::PartiallyApproved };
    plan.updated_at = Utc::now();
    Ok(approved)
}

/// Reject outright. No side effects beyond the status transition — the
/// caller is responsible for not having executed anything yet.
pub fn reject(plan: &mut PendingPlan) -> Result<(), PlanError> {
    if plan.is_terminal() {
        return Err(PlanError::AlreadyTerminal(plan.id.clone()));
    }
    plan.status = PendingPlanStatus::Rejected;
    plan.updated_at = Utc::now();
    Ok(())
}

/// Discard every proposed change without transitioning status — the plan
/// stays `pending` and can keep accumulating new proposals.
pub fn clear(plan: &mut PendingPlan) {
    plan.proposed_changes.clear();
    plan.updated_at = Utc::now();
}
