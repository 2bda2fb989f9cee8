//! Snapshot and store-cache path resolution
//!
//! Snapshot files are named `<base><offset>` with the offset in whole hours
//! since the owning segment start, zero-padded to four digits. In tree
//! layout both snapshots and cache files live under `<YYYY>/<MM>`
//! subdirectories keyed by the segment start.

use std::path::{Path, PathBuf};

use chrono::{Datelike, NaiveDateTime};

use crate::errors::{Fa2CfError, Result};
use crate::plan::PlannedStep;
use crate::run::hour_stamp;

/// File name of a snapshot, e.g. `ICMSHABOF+0007`
pub fn snapshot_file_name(base: &str, offset_hours: i64) -> String {
    format!("{}{:04}", base, offset_hours)
}

fn tree_subdir(dir: &Path, segment_start: &NaiveDateTime) -> PathBuf {
    dir.join(format!("{:04}", segment_start.year()))
        .join(format!("{:02}", segment_start.month()))
}

/// Path of the snapshot providing one planned step
pub fn snapshot_path(dir: &Path, base: &str, step: &PlannedStep, tree: bool) -> PathBuf {
    let parent = if tree {
        tree_subdir(dir, &step.segment_start)
    } else {
        dir.to_path_buf()
    };
    parent.join(snapshot_file_name(base, step.offset_hours))
}

/// Like [`snapshot_path`], but checked for existence. A planned snapshot
/// that is missing from the run directory is fatal to the whole run.
pub fn locate_snapshot(dir: &Path, base: &str, step: &PlannedStep, tree: bool) -> Result<PathBuf> {
    let path = snapshot_path(dir, base, step, tree);
    if path.is_file() {
        Ok(path)
    } else {
        Err(Fa2CfError::SnapshotNotFound { path })
    }
}

/// Path of the per-timestep extraction cache file, e.g.
/// `store/2009/06/urban_2009053100_744_2009-06-15T12.nc`. The name is
/// keyed by run identity and valid time only; the requested variable set
/// does not enter it.
pub fn store_path(store_dir: &Path, store_base: &str, step: &PlannedStep, tree: bool) -> PathBuf {
    let parent = if tree {
        tree_subdir(store_dir, &step.segment_start)
    } else {
        store_dir.to_path_buf()
    };
    parent.join(format!("{}_{}.nc", store_base, hour_stamp(&step.valid_time)))
}
