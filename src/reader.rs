//! Snapshot records and the decoder seam
//!
//! A snapshot record is the in-memory result of decoding one model snapshot
//! at one instant: the requested gridded fields plus the grid coordinate
//! variables. Decoding sits behind the [`SnapshotReader`] trait; the
//! implementation shipped here reads single-timestep NetCDF files, which is
//! also the on-disk format of the store cache, so cached extractions flow
//! back through the same code path.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use chrono::NaiveDateTime;
use ndarray::{ArrayD, Axis, IxDyn};

use crate::errors::{Fa2CfError, Result};
use crate::run::hour_stamp;

/// Coordinate names picked up even when they are not dimension coordinates
const AUX_COORD_NAMES: [&str; 4] = ["lat", "lon", "latitude", "longitude"];

/// One gridded field at a single instant
#[derive(Debug, Clone)]
pub struct FieldRecord {
    pub name: String,
    pub dims: Vec<String>,
    pub data: ArrayD<f32>,
}

/// One grid coordinate variable, carried through to merged output
#[derive(Debug, Clone)]
pub struct CoordRecord {
    pub name: String,
    pub dims: Vec<String>,
    pub data: ArrayD<f64>,
    /// String attributes of the coordinate (units, standard_name, ...)
    pub attributes: Vec<(String, String)>,
}

/// Decoded content of one snapshot at one instant
#[derive(Debug, Clone)]
pub struct SnapshotRecord {
    pub valid_time: NaiveDateTime,
    pub fields: Vec<FieldRecord>,
    pub coords: Vec<CoordRecord>,
}

impl SnapshotRecord {
    pub fn field(&self, name: &str) -> Option<&FieldRecord> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn coord(&self, name: &str) -> Option<&CoordRecord> {
        self.coords.iter().find(|c| c.name == name)
    }
}

/// One variable to pull out of a snapshot
#[derive(Debug, Clone)]
pub struct WantedVariable {
    /// Name the field carries in records and merged output
    pub name: String,
    /// Model-native name to fall back to inside the snapshot itself
    pub fa_name: Option<String>,
}

impl WantedVariable {
    pub fn new(name: impl Into<String>, fa_name: Option<String>) -> Self {
        WantedVariable {
            name: name.into(),
            fa_name,
        }
    }
}

/// Decodes one snapshot file into a record.
///
/// The crate ships [`NetcdfSnapshotReader`] for the NetCDF intermediate
/// format; the proprietary FA decoder plugs in through the same trait
/// without the pipeline noticing.
pub trait SnapshotReader {
    fn read_snapshot(
        &self,
        path: &Path,
        wanted: &[WantedVariable],
        valid_time: NaiveDateTime,
    ) -> Result<SnapshotRecord>;
}

/// Reader for single-timestep NetCDF snapshot and cache files
#[derive(Debug, Default)]
pub struct NetcdfSnapshotReader;

impl SnapshotReader for NetcdfSnapshotReader {
    fn read_snapshot(
        &self,
        path: &Path,
        wanted: &[WantedVariable],
        valid_time: NaiveDateTime,
    ) -> Result<SnapshotRecord> {
        let file = netcdf::open(path)?;
        let mut fields = Vec::with_capacity(wanted.len());
        for want in wanted {
            let var = file
                .variable(&want.name)
                .or_else(|| want.fa_name.as_deref().and_then(|n| file.variable(n)))
                .ok_or_else(|| Fa2CfError::VariableNotFound {
                    var: want.name.clone(),
                    file: path.display().to_string(),
                })?;
            let (dims, data) = read_field(&var)?;
            fields.push(FieldRecord {
                name: want.name.clone(),
                dims,
                data,
            });
        }
        let coords = read_coords(&file, wanted)?;
        Ok(SnapshotRecord {
            valid_time,
            fields,
            coords,
        })
    }
}

fn read_field(var: &netcdf::Variable) -> Result<(Vec<String>, ArrayD<f32>)> {
    let mut dims: Vec<String> = var.dimensions().iter().map(|d| d.name().to_string()).collect();
    let shape: Vec<usize> = var.dimensions().iter().map(|d| d.len()).collect();
    let values = var.get_values::<f32, _>(..)?;
    let mut data = ArrayD::from_shape_vec(IxDyn(&shape), values)?;
    // single-step files may carry a length-one time axis; squeeze it away
    if dims.first().map(String::as_str) == Some("time") && data.shape().first() == Some(&1) {
        data = data.index_axis_move(Axis(0), 0);
        dims.remove(0);
    }
    Ok((dims, data))
}

fn is_requested(name: &str, wanted: &[WantedVariable]) -> bool {
    wanted
        .iter()
        .any(|w| w.name == name || w.fa_name.as_deref() == Some(name))
}

fn string_attributes(var: &netcdf::Variable) -> Vec<(String, String)> {
    let mut attrs = Vec::new();
    for attr in var.attributes() {
        if let Ok(netcdf::AttributeValue::Str(value)) = attr.value() {
            attrs.push((attr.name().to_string(), value));
        }
    }
    attrs.sort();
    attrs
}

fn read_coords(file: &netcdf::File, wanted: &[WantedVariable]) -> Result<Vec<CoordRecord>> {
    let mut coords = Vec::new();
    for var in file.variables() {
        let name = var.name();
        if is_requested(&name, wanted) || name == "time" || name == "time_bnds" {
            continue;
        }
        let dims: Vec<String> = var.dimensions().iter().map(|d| d.name().to_string()).collect();
        let dimension_coord = dims.len() == 1 && dims[0] == name;
        let aux_coord = AUX_COORD_NAMES.contains(&name.as_str());
        if !dimension_coord && !aux_coord {
            continue;
        }
        let shape: Vec<usize> = var.dimensions().iter().map(|d| d.len()).collect();
        let values = var.get_values::<f64, _>(..)?;
        let data = ArrayD::from_shape_vec(IxDyn(&shape), values)?;
        let attributes = string_attributes(&var);
        coords.push(CoordRecord {
            name,
            dims,
            data,
            attributes,
        });
    }
    coords.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(coords)
}

/// Write a record as a single-timestep NetCDF file, creating parent
/// directories as needed. This is the store-cache format; a cache file is a
/// pure function of its snapshot, so deleting one only costs a re-read.
pub fn write_record(path: &Path, record: &SnapshotRecord) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let mut dim_sizes: BTreeMap<String, usize> = BTreeMap::new();
    let shapes = record
        .fields
        .iter()
        .map(|f| (&f.name, &f.dims, f.data.shape()))
        .chain(record.coords.iter().map(|c| (&c.name, &c.dims, c.data.shape())));
    for (name, dims, shape) in shapes {
        if dims.len() != shape.len() {
            return Err(Fa2CfError::Generic(format!(
                "record variable '{}' names {} dimensions for {} axes",
                name,
                dims.len(),
                shape.len()
            )));
        }
        for (dim, len) in dims.iter().zip(shape) {
            match dim_sizes.get(dim) {
                Some(existing) if existing != len => {
                    return Err(Fa2CfError::Generic(format!(
                        "dimension '{}' has conflicting lengths {} and {}",
                        dim, existing, len
                    )));
                }
                Some(_) => {}
                None => {
                    dim_sizes.insert(dim.clone(), *len);
                }
            }
        }
    }

    let mut file = netcdf::create(path)?;
    for (name, len) in &dim_sizes {
        file.add_dimension(name, *len)?;
    }

    for coord in &record.coords {
        let dim_refs: Vec<&str> = coord.dims.iter().map(String::as_str).collect();
        let mut var = file.add_variable::<f64>(&coord.name, &dim_refs)?;
        var.put(coord.data.view(), ..)?;
        for (key, value) in &coord.attributes {
            var.put_attribute(key, value.as_str())?;
        }
    }
    for field in &record.fields {
        let dim_refs: Vec<&str> = field.dims.iter().map(String::as_str).collect();
        let mut var = file.add_variable::<f32>(&field.name, &dim_refs)?;
        var.put(field.data.view(), ..)?;
    }
    file.add_attribute("valid_time", hour_stamp(&record.valid_time).as_str())?;
    Ok(())
}
