// src/working_model.rs

use chrono::NaiveDate;
use tracing::debug;

use crate::error::{TimesbookError, ValidationError};
use crate::models::{WorkingModel, MAX_TARGET_HOURS};

// --- Resolution ---

/// Returns the version active on `target`, given versions sorted ascending by `valid_from`.
///
/// Each version covers `[valid_from_i, valid_from_{i+1})`; the last one is open-ended.
/// A date exactly on a version's `valid_from` belongs to that (later) version.
pub fn resolve(sorted: &[WorkingModel], target: NaiveDate) -> Option<&WorkingModel> {
    let started = sorted.partition_point(|m| m.valid_from <= target);
    started.checked_sub(1).map(|idx| &sorted[idx])
}

/// Owns a sorted copy of a user's versions so callers never resolve against
/// insertion order.
#[derive(Debug, Clone, Default)]
pub struct WorkingModelResolver {
    versions: Vec<WorkingModel>,
}

impl WorkingModelResolver {
    pub fn new(models: &[WorkingModel]) -> Self {
        Self {
            versions: sorted_versions(models),
        }
    }

    pub fn resolve(&self, target: NaiveDate) -> Option<&WorkingModel> {
        resolve(&self.versions, target)
    }

    pub fn versions(&self) -> &[WorkingModel] {
        &self.versions
    }
}

// --- Version Management ---

pub fn sorted_versions(models: &[WorkingModel]) -> Vec<WorkingModel> {
    let mut versions = models.to_vec();
    versions.sort_by_key(|m| m.valid_from);
    versions
}

/// Checks the per-weekday bounds of a single version.
pub fn validate_model(model: &WorkingModel) -> Result<(), ValidationError> {
    for (weekday, hours) in model.weekly_hours() {
        if hours > MAX_TARGET_HOURS {
            return Err(ValidationError::HoursOutOfRange {
                weekday: weekday.to_string(),
                hours,
            });
        }
    }
    Ok(())
}

/// Appends a new version. It must start at least one day after the latest existing one.
pub fn append_version(
    models: &mut Vec<WorkingModel>,
    new_model: WorkingModel,
) -> Result<(), ValidationError> {
    validate_model(&new_model)?;
    models.sort_by_key(|m| m.valid_from);

    if let Some(last) = models.last() {
        if (new_model.valid_from - last.valid_from).num_days() < 1 {
            return Err(ValidationError::WorkingModelTooEarly {
                last_valid_from: last.valid_from,
            });
        }
    }

    debug!("Appending working model valid from {}", new_model.valid_from);
    models.push(new_model);
    Ok(())
}

/// Removes the version starting on `valid_from`; the remainder stays sorted.
pub fn remove_version(
    models: &mut Vec<WorkingModel>,
    valid_from: NaiveDate,
) -> Result<WorkingModel, TimesbookError> {
    let idx = models
        .iter()
        .position(|m| m.valid_from == valid_from)
        .ok_or_else(|| TimesbookError::not_found("WorkingModel", valid_from.to_string()))?;
    let removed = models.remove(idx);
    models.sort_by_key(|m| m.valid_from);
    debug!("Removed working model valid from {}", valid_from);
    Ok(removed)
}
