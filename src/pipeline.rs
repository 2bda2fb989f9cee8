//! Export pipeline orchestration
//!
//! Drives one run end to end: expand the window into a plan, extract every
//! planned timestep, merge each variable into its two output files and
//! stamp the exports with the run identity.

use std::path::PathBuf;

use tracing::info;

use crate::config::ExportConfig;
use crate::errors::Result;
use crate::extract::Extractor;
use crate::merge::{MergedOutput, SeriesWriter};
use crate::plan::build_plan;
use crate::reader::{SnapshotReader, SnapshotRecord};
use crate::run::RunDescriptor;
use crate::stamp::stamp_run_coords;
use crate::table::{GlobalAttributes, VariableTable};

/// What one run produced
#[derive(Debug, Default)]
pub struct ExportReport {
    pub variables: Vec<String>,
    pub steps: usize,
    pub cache_hits: usize,
    pub raw_files: Vec<PathBuf>,
    pub export_files: Vec<PathBuf>,
}

/// Export one run: plan, extract, merge, stamp.
///
/// The window and cadences are validated before the variable table or the
/// attribute template is read, so a bad request fails without touching
/// any file.
///
/// A missing snapshot aborts the whole run. The time axis of every exported
/// variable must be complete and regular, so there is nothing useful to
/// write once a single step cannot be read.
pub fn export_run(
    run: &RunDescriptor,
    cfg: &ExportConfig,
    reader: &dyn SnapshotReader,
) -> Result<ExportReport> {
    cfg.validate()?;
    let plan = build_plan(
        run,
        cfg.model_cadence_seconds,
        cfg.output_cadence_seconds,
        cfg.duplicate_policy,
        cfg.segment_frequency,
    )?;
    let table = VariableTable::from_yaml_file(&cfg.variable_table_path)?;
    let globals = match &cfg.global_attrs_path {
        Some(path) => GlobalAttributes::from_yaml_file(path)?,
        None => GlobalAttributes::default(),
    };
    info!(
        run = %run.dir_name(),
        steps = plan.len(),
        variables = cfg.variables.len(),
        "starting export"
    );

    let extractor = Extractor::new(run, cfg, &table, reader)?;
    let mut records: Vec<SnapshotRecord> = Vec::with_capacity(plan.len());
    let mut cache_hits = 0;
    for step in plan.iter() {
        let outcome = extractor.extract_step(step)?;
        if outcome.cache_hit {
            cache_hits += 1;
        }
        records.push(outcome.record);
    }

    let writer = SeriesWriter::new(run, cfg, &globals);
    let mut report = ExportReport {
        variables: cfg.variables.clone(),
        steps: plan.len(),
        cache_hits,
        ..Default::default()
    };
    for var_name in &cfg.variables {
        let def = table.resolve(var_name)?;
        let MergedOutput {
            raw_path,
            export_path,
        } = writer.write_variable(var_name, def, &records, &plan)?;
        stamp_run_coords(&export_path, run)?;
        report.raw_files.push(raw_path);
        report.export_files.push(export_path);
    }
    info!(
        run = %run.dir_name(),
        exports = report.export_files.len(),
        cache_hits = report.cache_hits,
        "export finished"
    );
    Ok(report)
}
