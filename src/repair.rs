//! Time-bound repair for regridded exports
//!
//! Regridding drops the `time_bnds` variable because the interpolation tool
//! only carries variables on the spatial grid. This pass walks a tree of run
//! directories, pairs every `*_regridded.nc` export with the file it was
//! regridded from and copies the original cell bounds back in.

use std::path::{Path, PathBuf};

use glob::glob;
use tracing::{info, warn};

use crate::errors::{Fa2CfError, Result};
use crate::netcdf_io::{
    attach_variable, copy_all_except, detach_variable, rewrite_file, DetachedVariable,
    ensure_dimensions,
};
use crate::run::RunDescriptor;

/// Suffix that marks a regridded export
pub const REGRIDDED_SUFFIX: &str = "_regridded.nc";

/// Outcome of one repair walk
#[derive(Debug, Default, Clone)]
pub struct RepairSummary {
    pub scanned: usize,
    pub repaired: usize,
    pub skipped: usize,
}

/// Walk every export directory under `base_dir` and restore the time bounds
/// of each regridded file from its companion. Files whose companion is
/// missing or unusable are logged and skipped; the walk always finishes.
pub fn repair_time_bounds(base_dir: &Path) -> Result<RepairSummary> {
    let pattern = format!("{}/**/export/*/*{}", base_dir.display(), REGRIDDED_SUFFIX);
    let mut matches: Vec<PathBuf> = glob(&pattern)?.filter_map(|entry| entry.ok()).collect();
    matches.sort();

    let mut summary = RepairSummary::default();
    for path in matches {
        summary.scanned += 1;
        match run_identity(&path) {
            Some(run) => {
                info!(run = %run.dir_name(), path = %path.display(), "repairing time bounds")
            }
            None => info!(path = %path.display(), "repairing time bounds"),
        }
        match repair_one(&path) {
            Ok(()) => summary.repaired += 1,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "skipped");
                summary.skipped += 1;
            }
        }
    }
    Ok(summary)
}

/// Restore `time_bnds` in one regridded file from its companion
pub fn repair_one(regridded: &Path) -> Result<()> {
    let companion = companion_path(regridded).ok_or_else(|| {
        Fa2CfError::Generic(format!(
            "no companion name derivable from {}",
            regridded.display()
        ))
    })?;
    if !companion.is_file() {
        return Err(Fa2CfError::MissingCompanion {
            regridded: regridded.to_path_buf(),
            companion,
        });
    }
    let bounds = read_companion_bounds(regridded, &companion)?;
    rewrite_file(regridded, |src, dst| {
        copy_all_except(src, dst, &["time_bnds"])?;
        ensure_dimensions(dst, &bounds.dims, bounds.values.shape())?;
        attach_variable(dst, bounds)
    })
}

/// The un-regridded file a regridded export was produced from
pub fn companion_path(regridded: &Path) -> Option<PathBuf> {
    let name = regridded.file_name()?.to_str()?;
    let stem = name.strip_suffix(REGRIDDED_SUFFIX)?;
    Some(regridded.with_file_name(format!("{}.nc", stem)))
}

fn read_companion_bounds(regridded: &Path, companion: &Path) -> Result<DetachedVariable> {
    let file = netcdf::open(companion)?;
    let var = file
        .variable("time_bnds")
        .ok_or_else(|| Fa2CfError::MissingCompanion {
            regridded: regridded.to_path_buf(),
            companion: companion.to_path_buf(),
        })?;
    detach_variable(&var)
}

fn run_identity(path: &Path) -> Option<RunDescriptor> {
    path.ancestors()
        .filter_map(|dir| dir.file_name().and_then(|n| n.to_str()))
        .find_map(|name| RunDescriptor::parse_dir_name(name).ok())
}
