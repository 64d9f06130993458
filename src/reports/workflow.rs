//! Report moderation workflow.
//!
//! ```text
//! submitted -> under_review -> verified -> resolved
//!                          \-> rejected
//! ```
//!
//! `rejected` and `resolved` are terminal. A transition is a single
//! compare-and-swap on `current_state`, so two concurrent requests that start
//! from the same state cannot both succeed.

use crate::error::AtlasError;
use crate::orm::reports::{self, ReportState};
use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter};
use uuid::Uuid;

/// States reachable in one step from `state`.
pub fn allowed_transitions(state: ReportState) -> &'static [ReportState] {
    match state {
        ReportState::Submitted => &[ReportState::UnderReview],
        ReportState::UnderReview => &[ReportState::Verified, ReportState::Rejected],
        ReportState::Verified => &[ReportState::Resolved],
        ReportState::Rejected | ReportState::Resolved => &[],
    }
}

pub fn can_transition_to(from: ReportState, to: ReportState) -> bool {
    allowed_transitions(from).contains(&to)
}

pub fn is_terminal(state: ReportState) -> bool {
    allowed_transitions(state).is_empty()
}

fn invalid_transition(current: ReportState, requested: ReportState) -> AtlasError {
    AtlasError::InvalidTransition {
        current,
        requested,
        allowed: allowed_transitions(current).to_vec(),
    }
}

/// Move a report to `target`.
///
/// Only `current_state` and `last_activity_at` change, plus the rejection
/// reason when rejecting with a non-blank `reason`. A refused transition
/// leaves the row untouched.
pub async fn request_transition<C: ConnectionTrait>(
    db: &C,
    report_id: Uuid,
    target: ReportState,
    reason: Option<&str>,
) -> Result<reports::Model, AtlasError> {
    let report = reports::Entity::find_by_id(report_id)
        .one(db)
        .await?
        .ok_or_else(|| AtlasError::not_found("report", report_id))?;

    let current = report.current_state;
    if !can_transition_to(current, target) {
        log::debug!(
            "Refused transition of report {} from {} to {}",
            report_id,
            current,
            target
        );
        return Err(invalid_transition(current, target));
    }

    let now = Utc::now().naive_utc();
    let mut update = reports::Entity::update_many()
        .col_expr(reports::Column::CurrentState, Expr::value(target))
        .col_expr(reports::Column::LastActivityAt, Expr::value(now));

    if target == ReportState::Rejected {
        if let Some(reason) = reason.map(str::trim).filter(|r| !r.is_empty()) {
            update = update.col_expr(reports::Column::RejectionReason, Expr::value(reason));
        }
    }

    // The state filter is the compare half of the swap.
    let result = update
        .filter(reports::Column::Id.eq(report_id))
        .filter(reports::Column::CurrentState.eq(current))
        .exec(db)
        .await?;

    let fresh = reports::Entity::find_by_id(report_id)
        .one(db)
        .await?
        .ok_or_else(|| AtlasError::not_found("report", report_id))?;

    if result.rows_affected == 0 {
        log::warn!(
            "Report {} moved from {} to {} before the transition to {} was applied",
            report_id,
            current,
            fresh.current_state,
            target
        );
        if can_transition_to(fresh.current_state, target) {
            return Err(AtlasError::Conflict(format!(
                "Report {} was modified concurrently; retry the transition.",
                report_id
            )));
        }
        return Err(invalid_transition(fresh.current_state, target));
    }

    log::info!("Report {} transitioned from {} to {}", report_id, current, target);
    Ok(fresh)
}
