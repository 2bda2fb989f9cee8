//! Per-variable series merge and export
//!
//! Concatenates the per-timestep records of one variable along a new
//! leading time axis and writes two merged files: the raw model-named copy
//! under `netcdf_dir` and the CF-compliant export under `export_dir`, the
//! latter with the table attributes, the global-attribute template and an
//! encoded time axis with cell bounds.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::Utc;
use ndarray::{ArrayD, Axis};
use netcdf::FileMut;
use tracing::info;

use crate::config::ExportConfig;
use crate::errors::{Fa2CfError, Result};
use crate::plan::ExportPlan;
use crate::reader::{CoordRecord, SnapshotRecord};
use crate::run::RunDescriptor;
use crate::table::{GlobalAttributes, VariableDef};

/// Fill value of exported fields (the CORDEX missing value)
pub const FILL_VALUE: f32 = 1.0e20;

/// Paths of the two merged files written for one variable
#[derive(Debug, Clone)]
pub struct MergedOutput {
    pub raw_path: PathBuf,
    pub export_path: PathBuf,
}

/// Writes the merged per-variable files of one run
pub struct SeriesWriter<'a> {
    run: &'a RunDescriptor,
    cfg: &'a ExportConfig,
    globals: &'a GlobalAttributes,
}

impl<'a> SeriesWriter<'a> {
    pub fn new(run: &'a RunDescriptor, cfg: &'a ExportConfig, globals: &'a GlobalAttributes) -> Self {
        SeriesWriter { run, cfg, globals }
    }

    /// Merge one variable's records and write both output files. The series
    /// must cover every planned timestep; a short or misaligned series is
    /// rejected rather than silently accepted.
    pub fn write_variable(
        &self,
        var_name: &str,
        def: &VariableDef,
        records: &[SnapshotRecord],
        plan: &ExportPlan,
    ) -> Result<MergedOutput> {
        if records.len() != plan.len() {
            return Err(Fa2CfError::LengthMismatch {
                var: var_name.to_string(),
                expected: plan.len(),
                actual: records.len(),
            });
        }
        for (record, step) in records.iter().zip(plan.iter()) {
            if record.valid_time != step.valid_time {
                return Err(Fa2CfError::Generic(format!(
                    "record at {} does not match the planned step {}",
                    record.valid_time, step.valid_time
                )));
            }
        }

        let (spatial_dims, data) = stack_series(var_name, records)?;
        let coords = &records[0].coords;
        let hours = self.time_values(plan);

        let file_name = self
            .run
            .merged_file_name(var_name, self.cfg.output_cadence_seconds);
        let raw_path = self.cfg.netcdf_dir.join(var_name).join(&file_name);
        let export_path = self.cfg.export_dir.join(var_name).join(&file_name);

        self.write_raw(
            &raw_path,
            def.field_name(var_name),
            &spatial_dims,
            &data,
            coords,
            &hours,
        )?;
        self.write_cf(&export_path, var_name, def, &spatial_dims, &data, coords, &hours)?;
        info!(variable = var_name, steps = plan.len(), "merged series written");
        Ok(MergedOutput {
            raw_path,
            export_path,
        })
    }

    fn time_values(&self, plan: &ExportPlan) -> Vec<f64> {
        plan.iter()
            .map(|s| (s.valid_time - self.run.run_start).num_seconds() as f64 / 3600.0)
            .collect()
    }

    fn time_units(&self) -> String {
        format!(
            "hours since {}",
            self.run.run_start.format("%Y-%m-%d %H:%M:%S")
        )
    }

    /// Raw merged copy: model-native variable name, no CF decoration
    fn write_raw(
        &self,
        path: &Path,
        field_name: &str,
        spatial_dims: &[String],
        data: &ArrayD<f32>,
        coords: &[CoordRecord],
        hours: &[f64],
    ) -> Result<()> {
        let mut file = create_series_file(path)?;
        add_series_dims(&mut file, spatial_dims, &data.shape()[1..], coords, hours.len(), false)?;
        {
            let mut time_var = file.add_variable::<f64>("time", &["time"])?;
            time_var.put_attribute("units", self.time_units().as_str())?;
            time_var.put_attribute("calendar", "standard")?;
            time_var.put_values(hours, ..)?;
        }
        write_coords(&mut file, coords)?;
        {
            let dim_refs: Vec<&str> = std::iter::once("time")
                .chain(spatial_dims.iter().map(String::as_str))
                .collect();
            let mut var = file.add_variable::<f32>(field_name, &dim_refs)?;
            var.put_attribute("_FillValue", FILL_VALUE)?;
            var.put(data.view(), ..)?;
        }
        Ok(())
    }

    /// CF-compliant export: table attributes, bounds and the global template
    fn write_cf(
        &self,
        path: &Path,
        var_name: &str,
        def: &VariableDef,
        spatial_dims: &[String],
        data: &ArrayD<f32>,
        coords: &[CoordRecord],
        hours: &[f64],
    ) -> Result<()> {
        let mut file = create_series_file(path)?;
        add_series_dims(&mut file, spatial_dims, &data.shape()[1..], coords, hours.len(), true)?;
        {
            let mut time_var = file.add_variable::<f64>("time", &["time"])?;
            time_var.put_attribute("standard_name", "time")?;
            time_var.put_attribute("long_name", "time")?;
            time_var.put_attribute("units", self.time_units().as_str())?;
            time_var.put_attribute("calendar", "standard")?;
            time_var.put_attribute("bounds", "time_bnds")?;
            time_var.put_values(hours, ..)?;
        }
        {
            let cadence_hours = self.cfg.output_cadence_seconds as f64 / 3600.0;
            let mut bnds: Vec<f64> = Vec::with_capacity(hours.len() * 2);
            for &t in hours {
                bnds.push(t - cadence_hours);
                bnds.push(t);
            }
            let mut bnds_var = file.add_variable::<f64>("time_bnds", &["time", "bnds"])?;
            bnds_var.put_values(&bnds, ..)?;
        }
        write_coords(&mut file, coords)?;
        {
            let dim_refs: Vec<&str> = std::iter::once("time")
                .chain(spatial_dims.iter().map(String::as_str))
                .collect();
            let mut var = file.add_variable::<f32>(var_name, &dim_refs)?;
            var.put_attribute("_FillValue", FILL_VALUE)?;
            for (key, value) in &def.attributes {
                if key == "_FillValue" {
                    continue;
                }
                var.put_attribute(key, value.as_str())?;
            }
            let aux: Vec<&str> = coords
                .iter()
                .filter(|c| !(c.dims.len() == 1 && c.dims[0] == c.name))
                .map(|c| c.name.as_str())
                .collect();
            if !aux.is_empty() {
                var.put_attribute("coordinates", aux.join(" ").as_str())?;
            }
            var.put(data.view(), ..)?;
        }
        for (key, value) in self.globals.iter() {
            file.add_attribute(key, value)?;
        }
        if self.globals.get("Conventions").is_none() {
            file.add_attribute("Conventions", "CF-1.8")?;
        }
        file.add_attribute(
            "history",
            format!("Created by fa2cf on {}", Utc::now().to_rfc3339()),
        )?;
        Ok(())
    }
}

fn stack_series(var_name: &str, records: &[SnapshotRecord]) -> Result<(Vec<String>, ArrayD<f32>)> {
    if records.is_empty() {
        return Err(Fa2CfError::Generic(format!(
            "no records to merge for '{}'",
            var_name
        )));
    }
    let first = records[0]
        .field(var_name)
        .ok_or_else(|| Fa2CfError::VariableNotFound {
            var: var_name.to_string(),
            file: format!("record at {}", records[0].valid_time),
        })?;
    let spatial_dims = first.dims.clone();

    let mut views = Vec::with_capacity(records.len());
    for record in records {
        let field = record
            .field(var_name)
            .ok_or_else(|| Fa2CfError::VariableNotFound {
                var: var_name.to_string(),
                file: format!("record at {}", record.valid_time),
            })?;
        views.push(field.data.view());
    }
    let data = ndarray::stack(Axis(0), &views)?;
    Ok((spatial_dims, data))
}

fn create_series_file(path: &Path) -> Result<FileMut> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    if path.exists() {
        fs::remove_file(path)?;
    }
    Ok(netcdf::create(path)?)
}

fn add_series_dims(
    file: &mut FileMut,
    spatial_dims: &[String],
    spatial_shape: &[usize],
    coords: &[CoordRecord],
    n_time: usize,
    with_bnds: bool,
) -> Result<()> {
    file.add_dimension("time", n_time)?;
    let mut sizes: BTreeMap<String, usize> = BTreeMap::new();
    let entries = spatial_dims
        .iter()
        .zip(spatial_shape.iter())
        .chain(coords.iter().flat_map(|c| c.dims.iter().zip(c.data.shape())));
    for (dim, len) in entries {
        match sizes.get(dim) {
            Some(existing) if existing != len => {
                return Err(Fa2CfError::Generic(format!(
                    "dimension '{}' has conflicting lengths {} and {}",
                    dim, existing, len
                )));
            }
            Some(_) => {}
            None => {
                sizes.insert(dim.clone(), *len);
            }
        }
    }
    for (dim, len) in &sizes {
        file.add_dimension(dim, *len)?;
    }
    if with_bnds {
        file.add_dimension("bnds", 2)?;
    }
    Ok(())
}

fn write_coords(file: &mut FileMut, coords: &[CoordRecord]) -> Result<()> {
    for coord in coords {
        let dim_refs: Vec<&str> = coord.dims.iter().map(String::as_str).collect();
        let mut var = file.add_variable::<f64>(&coord.name, &dim_refs)?;
        for (key, value) in &coord.attributes {
            var.put_attribute(key, value.as_str())?;
        }
        var.put(coord.data.view(), ..)?;
    }
    Ok(())
}
