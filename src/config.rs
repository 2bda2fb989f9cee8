//! Export pipeline configuration
//!
//! Every knob of one export lives in one explicit [`ExportConfig`] value:
//! directories, snapshot file bases, cadences, the duplicate policy and the
//! layout switch. The struct is validated before any file is touched.

use std::path::{Path, PathBuf};

use crate::errors::Result;
use crate::plan::{validate_cadences, DuplicatePolicy, SegmentFrequency};

/// Default base of model-native snapshot file names
pub const MODEL_FILE_BASE: &str = "ICMSHABOF+";
/// Default base of fullpos (post-processed pressure-level) snapshot file names
pub const FULLPOS_FILE_BASE: &str = "PFABOFABOF+";

/// Configuration of one export run
#[derive(Debug, Clone)]
pub struct ExportConfig {
    /// Directory holding the model-native snapshot files
    pub output_dir: PathBuf,
    /// File-name base of model-native snapshots, trailing separator included
    pub output_file_base: String,
    /// Directory holding the fullpos snapshot files
    pub fullpos_output_dir: PathBuf,
    /// File-name base of fullpos snapshots
    pub fullpos_file_base: String,
    /// Directory for per-timestep extraction cache files
    pub store_dir: PathBuf,
    /// Directory for merged raw (pre-CF) model output
    pub netcdf_dir: PathBuf,
    /// Directory for the final CF-compliant per-variable files
    pub export_dir: PathBuf,
    /// Variable-definition table (YAML)
    pub variable_table_path: PathBuf,
    /// Optional global-attribute template (YAML)
    pub global_attrs_path: Option<PathBuf>,
    /// Names of the variables to export, resolved against the table
    pub variables: Vec<String>,
    /// Seconds between subsequent model snapshot files
    pub model_cadence_seconds: i64,
    /// Seconds between exported timesteps
    pub output_cadence_seconds: i64,
    /// Which file wins at a month-boundary midnight
    pub duplicate_policy: DuplicatePolicy,
    /// How snapshot numbering restarts over the run
    pub segment_frequency: SegmentFrequency,
    /// Year/month subdirectories in snapshot and store directories
    pub tree_layout: bool,
}

impl ExportConfig {
    /// Standard per-run directory layout: `output/`, `fullpos/output/`,
    /// `store/`, `netcdf/` and `export/` under one run directory. Cadences
    /// default to hourly, the policy to [`DuplicatePolicy::PreferPrevious`]
    /// and snapshot numbering to monthly restarts.
    pub fn for_run_dir(run_dir: &Path, variable_table_path: impl Into<PathBuf>) -> Self {
        ExportConfig {
            output_dir: run_dir.join("output"),
            output_file_base: MODEL_FILE_BASE.to_string(),
            fullpos_output_dir: run_dir.join("fullpos").join("output"),
            fullpos_file_base: FULLPOS_FILE_BASE.to_string(),
            store_dir: run_dir.join("store"),
            netcdf_dir: run_dir.join("netcdf"),
            export_dir: run_dir.join("export"),
            variable_table_path: variable_table_path.into(),
            global_attrs_path: None,
            variables: Vec::new(),
            model_cadence_seconds: 3600,
            output_cadence_seconds: 3600,
            duplicate_policy: DuplicatePolicy::PreferPrevious,
            segment_frequency: SegmentFrequency::Monthly,
            tree_layout: true,
        }
    }

    pub fn with_variables<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.variables = names.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_global_attrs(mut self, path: impl Into<PathBuf>) -> Self {
        self.global_attrs_path = Some(path.into());
        self
    }

    pub fn with_cadences(mut self, model_seconds: i64, output_seconds: i64) -> Self {
        self.model_cadence_seconds = model_seconds;
        self.output_cadence_seconds = output_seconds;
        self
    }

    pub fn with_duplicate_policy(mut self, policy: DuplicatePolicy) -> Self {
        self.duplicate_policy = policy;
        self
    }

    pub fn with_segment_frequency(mut self, frequency: SegmentFrequency) -> Self {
        self.segment_frequency = frequency;
        self
    }

    pub fn with_tree_layout(mut self, tree: bool) -> Self {
        self.tree_layout = tree;
        self
    }

    pub fn with_file_bases(
        mut self,
        model_base: impl Into<String>,
        fullpos_base: impl Into<String>,
    ) -> Self {
        self.output_file_base = model_base.into();
        self.fullpos_file_base = fullpos_base.into();
        self
    }

    /// Check the cadence preconditions and the request list before any I/O
    pub fn validate(&self) -> Result<()> {
        validate_cadences(self.model_cadence_seconds, self.output_cadence_seconds)?;
        if self.variables.is_empty() {
            return Err(crate::errors::Fa2CfError::Configuration(
                "no variables requested".to_string(),
            ));
        }
        Ok(())
    }
}
