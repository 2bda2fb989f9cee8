//! fa2cf: FA climate-model output to CF-compliant NetCDF
//!
//! A post-processing library for limited-area climate runs. fa2cf walks the
//! hourly snapshot files a model run leaves behind, extracts the requested
//! surface fields, merges them into one CF-compliant NetCDF file per
//! variable and keeps the results traceable back to the run that produced
//! them.
//!
//! ## Key Features
//!
//! - **Window planning**: expand a run window into per-hour timesteps, with
//!   deterministic handling of duplicated month-boundary snapshots
//! - **Cache-aware extraction**: per-timestep store files make reruns cheap
//! - **CF export**: per-variable series with time bounds, table-driven
//!   attributes and a global-attribute template
//! - **Run stamping**: scalar `rstart`/`run_name` coordinates on every export
//! - **Repair pass**: restore `time_bnds` lost to external regridding
//! - **Notebook stripping**: remove tagged cells from Jupyter notebooks
//!
//! ## Module Organization
//!
//! - [`run`]: run identity, name encodings and window arithmetic
//! - [`config`]: per-run directory layout and export settings
//! - [`plan`]: timestep expansion and snapshot-segment resolution
//! - [`locate`]: snapshot and store-file path construction
//! - [`table`]: variable table and global-attribute template (YAML)
//! - [`reader`]: snapshot decoding behind the [`reader::SnapshotReader`] trait
//! - [`extract`]: cache-aware per-timestep extraction
//! - [`merge`]: per-variable series merge and CF export
//! - [`stamp`]: run-identity stamping of exported files
//! - [`repair`]: time-bound restoration for regridded files
//! - [`netcdf_io`]: NetCDF copy and rewrite helpers
//! - [`notebook`]: Jupyter notebook cell stripping
//! - [`pipeline`]: end-to-end export orchestration
//! - [`errors`]: centralized error handling
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::path::Path;
//!
//! use fa2cf::prelude::*;
//!
//! // Describe the run and where its files live
//! let run = RunDescriptor::from_cli("urban", "2009053100", 744).unwrap();
//! let cfg = ExportConfig::for_run_dir(
//!     Path::new("/data/run_urban_2009053100_744"),
//!     "tables/variables.yml",
//! )
//! .with_variables(["tas", "pr"]);
//!
//! // Export every requested variable
//! let report = fa2cf::pipeline::export_run(&run, &cfg, &NetcdfSnapshotReader).unwrap();
//! println!("Exported {} files", report.export_files.len());
//! ```
//!
//! The library is built for unattended post-processing of month-scale runs
//! and reports every failure with enough context to find the file at fault.

// Core modules
pub mod config;
pub mod errors;
pub mod extract;
pub mod locate;
pub mod merge;
pub mod netcdf_io;
pub mod notebook;
pub mod pipeline;
pub mod plan;
pub mod reader;
pub mod repair;
pub mod run;
pub mod stamp;
pub mod table;

// Direct re-exports for the public API
pub use config::*;
pub use errors::*;
pub use extract::*;
pub use locate::*;
pub use merge::*;
pub use netcdf_io::*;
pub use notebook::*;
pub use pipeline::*;
pub use plan::*;
pub use reader::*;
pub use repair::*;
pub use run::*;
pub use stamp::*;
pub use table::*;

// High-level convenience API
pub mod prelude {
    //! Commonly used imports for convenience
    pub use crate::config::ExportConfig;
    pub use crate::errors::{Fa2CfError, Result};
    pub use crate::pipeline::{export_run, ExportReport};
    pub use crate::plan::{DuplicatePolicy, ExportPlan, SegmentFrequency};
    pub use crate::reader::{NetcdfSnapshotReader, SnapshotReader};
    pub use crate::run::RunDescriptor;
    pub use crate::table::{GlobalAttributes, VariableTable};
}
