//! Restore time bounds dropped by the regridding step.
//!
//! Walks every export directory under the compiled-in base, pairs each
//! `*_regridded.nc` file with its companion and copies the companion's
//! `time_bnds` back in. Individual failures are logged and skipped; the
//! walk itself always exits 0.

use std::io::stderr;
use std::path::Path;

use clap::Parser;
use tracing::warn;
use tracing_subscriber::EnvFilter;

use fa2cf::repair::repair_time_bounds;

/// Root under which the run directories live
const RUNS_ROOT: &str = "runs";

#[derive(Parser, Debug)]
#[command(
    name = "fix_time_bounds",
    version,
    about = "Restore time_bnds in regridded export files"
)]
struct Args {}

fn main() {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_writer(stderr)
        .with_ansi(false)
        .without_time()
        .with_env_filter(
            EnvFilter::try_from_env("FA2CF_LOG").unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let _ = Args::parse();

    match repair_time_bounds(Path::new(RUNS_ROOT)) {
        Ok(summary) => println!(
            "✅ Repaired {} of {} regridded files ({} skipped)",
            summary.repaired, summary.scanned, summary.skipped
        ),
        Err(e) => warn!(error = %e, "repair walk failed"),
    }
}
