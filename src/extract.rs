//! Per-timestep extraction with store-cache reuse
//!
//! Each planned step is decoded from its model snapshot (and, when fullpos
//! variables are requested, from the matching fullpos snapshot) into one
//! combined record. In tree layout the combined record is persisted to the
//! store directory and reruns read it back instead of redecoding.

use tracing::debug;

use crate::config::ExportConfig;
use crate::errors::Result;
use crate::locate::{locate_snapshot, store_path};
use crate::plan::PlannedStep;
use crate::reader::{write_record, SnapshotReader, SnapshotRecord, WantedVariable};
use crate::run::RunDescriptor;
use crate::table::{VariableSource, VariableTable};

/// Result of extracting one planned step
#[derive(Debug)]
pub struct StepOutcome {
    pub record: SnapshotRecord,
    pub cache_hit: bool,
}

/// Extracts planned steps, splitting the request between the model-native
/// and fullpos snapshot streams
pub struct Extractor<'a> {
    run: &'a RunDescriptor,
    cfg: &'a ExportConfig,
    reader: &'a dyn SnapshotReader,
    model_wanted: Vec<WantedVariable>,
    fullpos_wanted: Vec<WantedVariable>,
    all_wanted: Vec<WantedVariable>,
}

impl<'a> Extractor<'a> {
    pub fn new(
        run: &'a RunDescriptor,
        cfg: &'a ExportConfig,
        table: &VariableTable,
        reader: &'a dyn SnapshotReader,
    ) -> Result<Self> {
        let mut model_wanted = Vec::new();
        let mut fullpos_wanted = Vec::new();
        for name in &cfg.variables {
            let def = table.resolve(name)?;
            let want = WantedVariable::new(name.clone(), def.fa_name.clone());
            match def.source {
                VariableSource::Model => model_wanted.push(want),
                VariableSource::Fullpos => fullpos_wanted.push(want),
            }
        }
        let all_wanted = model_wanted
            .iter()
            .chain(fullpos_wanted.iter())
            .cloned()
            .collect();
        Ok(Extractor {
            run,
            cfg,
            reader,
            model_wanted,
            fullpos_wanted,
            all_wanted,
        })
    }

    /// Extract one planned step, through the store cache when tree layout is
    /// on. Cache files are keyed by timestamp only; a hit skips the snapshot
    /// entirely. A rerun that requests more variables than a cached record
    /// holds therefore fails naming the cache file; deleting the store
    /// directory is always safe and forces a fresh extraction.
    pub fn extract_step(&self, step: &PlannedStep) -> Result<StepOutcome> {
        let store_base = self.run.store_base();
        let cache_path = store_path(
            &self.cfg.store_dir,
            &store_base,
            step,
            self.cfg.tree_layout,
        );

        if self.cfg.tree_layout && cache_path.is_file() {
            debug!(path = %cache_path.display(), "store cache hit");
            let record = self
                .reader
                .read_snapshot(&cache_path, &self.all_wanted, step.valid_time)?;
            return Ok(StepOutcome {
                record,
                cache_hit: true,
            });
        }

        let snapshot = locate_snapshot(
            &self.cfg.output_dir,
            &self.cfg.output_file_base,
            step,
            self.cfg.tree_layout,
        )?;
        debug!(path = %snapshot.display(), "decoding snapshot");
        let mut record = self
            .reader
            .read_snapshot(&snapshot, &self.model_wanted, step.valid_time)?;

        if !self.fullpos_wanted.is_empty() {
            let fullpos_snapshot = locate_snapshot(
                &self.cfg.fullpos_output_dir,
                &self.cfg.fullpos_file_base,
                step,
                self.cfg.tree_layout,
            )?;
            debug!(path = %fullpos_snapshot.display(), "decoding fullpos snapshot");
            let fullpos = self.reader.read_snapshot(
                &fullpos_snapshot,
                &self.fullpos_wanted,
                step.valid_time,
            )?;
            record.fields.extend(fullpos.fields);
            for coord in fullpos.coords {
                if record.coord(&coord.name).is_none() {
                    record.coords.push(coord);
                }
            }
        }

        if self.cfg.tree_layout {
            write_record(&cache_path, &record)?;
            debug!(path = %cache_path.display(), "store cache written");
        }

        Ok(StepOutcome {
            record,
            cache_hit: false,
        })
    }
}
