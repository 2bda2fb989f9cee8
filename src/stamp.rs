//! Run-identity stamping
//!
//! Rewrites an exported file so it carries two scalar string coordinates,
//! `rstart` and `run_name`, identifying the run it came from. Downstream
//! concatenation across runs relies on these once the file names are gone.

use std::path::Path;

use tracing::debug;

use crate::errors::Result;
use crate::netcdf_io::{add_scalar_string, copy_all_except, rewrite_file};
use crate::run::RunDescriptor;

/// Names of the scalar coordinates added by the stamping pass
pub const STAMP_VARIABLES: [&str; 2] = ["rstart", "run_name"];

/// Stamp `path` with the identity of `run`. Existing stamps are replaced,
/// so running the pass twice leaves the file unchanged.
pub fn stamp_run_coords(path: &Path, run: &RunDescriptor) -> Result<()> {
    debug!(path = %path.display(), "stamping run identity");
    rewrite_file(path, |src, dst| {
        copy_all_except(src, dst, &STAMP_VARIABLES)?;
        add_scalar_string(dst, "rstart", &run.rstart_string())?;
        add_scalar_string(dst, "run_name", &run.run_name)
    })
}
