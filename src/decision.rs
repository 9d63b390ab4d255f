//! Per-day choice between skipping, creating and updating an artifact.

use crate::day::DayBoundary;
use chrono::{DateTime, FixedOffset, NaiveDate};

/// Wall-clock instant with its UTC offset, as written into artifact metadata.
pub type Timestamp = DateTime<FixedOffset>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncAction {
    /// The artifact exists and the day can no longer change.
    SkipComplete,
    /// Nothing was recorded for the day.
    SkipEmpty,
    Create,
    Update,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    pub action: SyncAction,
    /// Creation timestamp to write, present for `Create` and `Update`.
    pub created_at: Option<Timestamp>,
}

#[derive(Debug, Clone, Copy)]
pub struct DecisionInput {
    pub day: NaiveDate,
    pub now: Timestamp,
    pub artifact_exists: bool,
    pub force: bool,
    pub has_any_data: bool,
    /// Creation timestamp read back from the existing artifact, if any.
    pub existing_created_at: Option<Timestamp>,
}

/// Whether an existing artifact can be left alone without looking at the data.
pub fn skips_complete(
    boundary: &DayBoundary,
    day: NaiveDate,
    now: Timestamp,
    artifact_exists: bool,
    force: bool,
) -> bool {
    !force && artifact_exists && boundary.is_complete(day, now.naive_local())
}

pub fn decide(input: &DecisionInput, boundary: &DayBoundary) -> Decision {
    if skips_complete(
        boundary,
        input.day,
        input.now,
        input.artifact_exists,
        input.force,
    ) {
        return Decision {
            action: SyncAction::SkipComplete,
            created_at: None,
        };
    }

    if !input.has_any_data {
        return Decision {
            action: SyncAction::SkipEmpty,
            created_at: None,
        };
    }

    if input.artifact_exists {
        let created_at = match (input.force, input.existing_created_at) {
            (false, Some(existing)) => existing,
            _ => input.now,
        };
        return Decision {
            action: SyncAction::Update,
            created_at: Some(created_at),
        };
    }

    Decision {
        action: SyncAction::Create,
        created_at: Some(input.now),
    }
}
