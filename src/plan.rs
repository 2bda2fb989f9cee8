//! Time-window planner
//!
//! Expands a run window into the ordered list of timesteps to export and
//! resolves, once and for all variables, which snapshot segment each
//! timestep is read from. In long climate runs the model restarts its snapshot
//! numbering at every first-of-month midnight, so that instant exists twice
//! on disk: as the last file of the old month and as file zero of the new
//! one. The [`DuplicatePolicy`] decides which copy wins.

use std::cmp::max;

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime};

use crate::errors::{Fa2CfError, Result};
use crate::run::RunDescriptor;

/// Which snapshot wins at a duplicated month-boundary midnight
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DuplicatePolicy {
    /// Use the last file of the previous month (historical `mode=0`)
    PreferPrevious,
    /// Use the first file of the new month (historical `mode=2`)
    PreferNext,
}

impl DuplicatePolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            DuplicatePolicy::PreferPrevious => "prefer-previous",
            DuplicatePolicy::PreferNext => "prefer-next",
        }
    }

    /// Map the historical numeric `mode` parameter (0 or 2)
    pub fn from_mode(mode: i64) -> Result<Self> {
        match mode {
            0 => Ok(DuplicatePolicy::PreferPrevious),
            2 => Ok(DuplicatePolicy::PreferNext),
            other => Err(Fa2CfError::Configuration(format!(
                "unknown duplicate-handling mode {} (expected 0 or 2)",
                other
            ))),
        }
    }
}

/// How snapshot numbering restarts over the course of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentFrequency {
    /// Numbering restarts at every first-of-month midnight
    Monthly,
    /// A single segment anchored at the run start
    None,
}

impl SegmentFrequency {
    pub fn as_str(&self) -> &'static str {
        match self {
            SegmentFrequency::Monthly => "monthly",
            SegmentFrequency::None => "none",
        }
    }
}

/// One exported timestep, bound to the snapshot segment that provides it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedStep {
    /// The model instant being exported
    pub valid_time: NaiveDateTime,
    /// Start of the snapshot segment the instant is read from
    pub segment_start: NaiveDateTime,
    /// Whole hours between segment start and valid time; this is the number
    /// in the snapshot file name
    pub offset_hours: i64,
}

/// Ordered list of timesteps to export
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportPlan {
    pub steps: Vec<PlannedStep>,
}

impl ExportPlan {
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, PlannedStep> {
        self.steps.iter()
    }

    /// The exported instants in plan order
    pub fn valid_times(&self) -> Vec<NaiveDateTime> {
        self.steps.iter().map(|s| s.valid_time).collect()
    }
}

/// Check the cadence preconditions shared by configuration validation and
/// plan construction. Snapshot file names encode whole forecast hours, so
/// both cadences must be positive multiples of 3600 seconds, and the output
/// cadence must be a multiple of the model cadence.
pub fn validate_cadences(model_seconds: i64, output_seconds: i64) -> Result<()> {
    if model_seconds <= 0 || output_seconds <= 0 {
        return Err(Fa2CfError::Configuration(format!(
            "cadences must be positive (model {} s, output {} s)",
            model_seconds, output_seconds
        )));
    }
    if model_seconds % 3600 != 0 || output_seconds % 3600 != 0 {
        return Err(Fa2CfError::Configuration(format!(
            "cadences must be whole hours (model {} s, output {} s)",
            model_seconds, output_seconds
        )));
    }
    if output_seconds % model_seconds != 0 {
        return Err(Fa2CfError::Configuration(format!(
            "output cadence {} s is not a multiple of the model cadence {} s",
            output_seconds, model_seconds
        )));
    }
    Ok(())
}

/// First midnight of the month `t` falls in
fn month_start(t: NaiveDateTime) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(t.year(), t.month(), 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .unwrap_or(t) // day 1 of a valid month always exists
}

fn is_month_boundary(t: NaiveDateTime) -> bool {
    t.day() == 1 && t.time() == NaiveTime::MIN
}

/// Resolve the segment a timestep is read from.
///
/// Interior instants belong to the month they fall in. A first-of-month
/// midnight strictly after the run start is the duplicated boundary instant:
/// under [`DuplicatePolicy::PreferPrevious`] it is owned by the month that
/// ends there, under [`DuplicatePolicy::PreferNext`] by the month that
/// starts there. The first segment is anchored at the run start itself, so
/// offsets in it are plain forecast hours.
pub fn segment_origin(
    valid_time: NaiveDateTime,
    run_start: NaiveDateTime,
    policy: DuplicatePolicy,
    frequency: SegmentFrequency,
) -> NaiveDateTime {
    match frequency {
        SegmentFrequency::None => run_start,
        SegmentFrequency::Monthly => {
            if is_month_boundary(valid_time) && valid_time > run_start {
                match policy {
                    DuplicatePolicy::PreferNext => valid_time,
                    DuplicatePolicy::PreferPrevious => {
                        max(run_start, month_start(valid_time - Duration::seconds(1)))
                    }
                }
            } else {
                max(run_start, month_start(valid_time))
            }
        }
    }
}

/// Expand the run window into an export plan.
///
/// Steps are `run_start + k * output_cadence` for `k = 1 ..= n`, with `n`
/// the number of whole output cadences in the run length. Validation of the
/// window and the cadences happens here, before any file is opened.
pub fn build_plan(
    run: &RunDescriptor,
    model_cadence_seconds: i64,
    output_cadence_seconds: i64,
    policy: DuplicatePolicy,
    frequency: SegmentFrequency,
) -> Result<ExportPlan> {
    validate_cadences(model_cadence_seconds, output_cadence_seconds)?;
    if run.run_length_hours <= 0 {
        return Err(Fa2CfError::Configuration(format!(
            "run length must be positive, got {} hours",
            run.run_length_hours
        )));
    }

    let n_steps = run.run_length_hours * 3600 / output_cadence_seconds;
    if n_steps == 0 {
        return Err(Fa2CfError::Configuration(format!(
            "run of {} hours is shorter than one output cadence ({} s)",
            run.run_length_hours, output_cadence_seconds
        )));
    }
    let mut steps = Vec::with_capacity(n_steps as usize);
    for k in 1..=n_steps {
        let valid_time = run.run_start + Duration::seconds(k * output_cadence_seconds);
        let segment_start = segment_origin(valid_time, run.run_start, policy, frequency);
        let offset_hours = (valid_time - segment_start).num_hours();
        steps.push(PlannedStep {
            valid_time,
            segment_start,
            offset_hours,
        });
    }
    Ok(ExportPlan { steps })
}
