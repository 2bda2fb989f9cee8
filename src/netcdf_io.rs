//! Generic NetCDF copy and rewrite helpers
//!
//! Both in-place passes (run-coordinate stamping, time-bounds repair) work
//! the same way: materialise a full copy of the file with the edit applied,
//! close both handles, then rename the copy over the original. The helpers
//! here carry dimensions, variables and attributes across without
//! interpreting them, so a crash mid-rewrite leaves the original untouched.

use std::fs;
use std::path::{Path, PathBuf};

use ndarray::{ArrayD, IxDyn};
use netcdf::types::{FloatType, IntType, NcVariableType};
use netcdf::{AttributeValue, File, FileMut};

use crate::errors::{Fa2CfError, Result};

/// Values of one variable, loaded with their native type
#[derive(Debug)]
pub enum NcValues {
    Double(ArrayD<f64>),
    Float(ArrayD<f32>),
    Int64(ArrayD<i64>),
    Uint64(ArrayD<u64>),
    Int(ArrayD<i32>),
    Uint(ArrayD<u32>),
    Short(ArrayD<i16>),
    Ushort(ArrayD<u16>),
    Byte(ArrayD<i8>),
    Uchar(ArrayD<u8>),
    /// Scalar NC_STRING variable
    Str(String),
}

impl NcValues {
    pub fn shape(&self) -> &[usize] {
        match self {
            NcValues::Double(a) => a.shape(),
            NcValues::Float(a) => a.shape(),
            NcValues::Int64(a) => a.shape(),
            NcValues::Uint64(a) => a.shape(),
            NcValues::Int(a) => a.shape(),
            NcValues::Uint(a) => a.shape(),
            NcValues::Short(a) => a.shape(),
            NcValues::Ushort(a) => a.shape(),
            NcValues::Byte(a) => a.shape(),
            NcValues::Uchar(a) => a.shape(),
            NcValues::Str(_) => &[],
        }
    }
}

/// A variable detached from its file: dimensions, values and attributes
#[derive(Debug)]
pub struct DetachedVariable {
    pub name: String,
    pub dims: Vec<String>,
    pub values: NcValues,
    pub attributes: Vec<(String, AttributeValue)>,
}

fn shaped<T>(var: &netcdf::Variable, values: Vec<T>) -> Result<ArrayD<T>> {
    let shape: Vec<usize> = var.dimensions().iter().map(|d| d.len()).collect();
    Ok(ArrayD::from_shape_vec(IxDyn(&shape), values)?)
}

/// Read a variable's values with their on-disk type. The typed getters
/// convert freely between the numeric NetCDF types, so the exact
/// [`NcVariableType`] variant has to pick the matching Rust type or a
/// rewrite would re-encode the variable.
pub fn read_values(var: &netcdf::Variable) -> Result<NcValues> {
    let values = match var.vartype() {
        NcVariableType::Float(FloatType::F64) => {
            NcValues::Double(shaped(var, var.get_values::<f64, _>(..)?)?)
        }
        NcVariableType::Float(FloatType::F32) => {
            NcValues::Float(shaped(var, var.get_values::<f32, _>(..)?)?)
        }
        NcVariableType::Int(IntType::I64) => {
            NcValues::Int64(shaped(var, var.get_values::<i64, _>(..)?)?)
        }
        NcVariableType::Int(IntType::U64) => {
            NcValues::Uint64(shaped(var, var.get_values::<u64, _>(..)?)?)
        }
        NcVariableType::Int(IntType::I32) => {
            NcValues::Int(shaped(var, var.get_values::<i32, _>(..)?)?)
        }
        NcVariableType::Int(IntType::U32) => {
            NcValues::Uint(shaped(var, var.get_values::<u32, _>(..)?)?)
        }
        NcVariableType::Int(IntType::I16) => {
            NcValues::Short(shaped(var, var.get_values::<i16, _>(..)?)?)
        }
        NcVariableType::Int(IntType::U16) => {
            NcValues::Ushort(shaped(var, var.get_values::<u16, _>(..)?)?)
        }
        NcVariableType::Int(IntType::I8) => {
            NcValues::Byte(shaped(var, var.get_values::<i8, _>(..)?)?)
        }
        NcVariableType::Int(IntType::U8) => {
            NcValues::Uchar(shaped(var, var.get_values::<u8, _>(..)?)?)
        }
        NcVariableType::String => {
            if !var.dimensions().is_empty() {
                return Err(Fa2CfError::UnsupportedType {
                    var: var.name(),
                    vartype: "non-scalar String".to_string(),
                });
            }
            NcValues::Str(var.get_string(..)?)
        }
        other => {
            return Err(Fa2CfError::UnsupportedType {
                var: var.name(),
                vartype: format!("{:?}", other),
            });
        }
    };
    Ok(values)
}

/// Create a variable in `dst` and write `values` into it. The `_FillValue`
/// attribute has to exist before any data is written, so it is threaded
/// through here instead of the generic attribute loop.
pub fn create_variable(
    dst: &mut FileMut,
    name: &str,
    dims: &[&str],
    values: &NcValues,
    fill_value: Option<AttributeValue>,
) -> Result<()> {
    match values {
        NcValues::Double(a) => {
            let mut var = dst.add_variable::<f64>(name, dims)?;
            if let Some(fv) = fill_value {
                var.put_attribute("_FillValue", fv)?;
            }
            var.put(a.view(), ..)?;
        }
        NcValues::Float(a) => {
            let mut var = dst.add_variable::<f32>(name, dims)?;
            if let Some(fv) = fill_value {
                var.put_attribute("_FillValue", fv)?;
            }
            var.put(a.view(), ..)?;
        }
        NcValues::Int64(a) => {
            let mut var = dst.add_variable::<i64>(name, dims)?;
            if let Some(fv) = fill_value {
                var.put_attribute("_FillValue", fv)?;
            }
            var.put(a.view(), ..)?;
        }
        NcValues::Uint64(a) => {
            let mut var = dst.add_variable::<u64>(name, dims)?;
            if let Some(fv) = fill_value {
                var.put_attribute("_FillValue", fv)?;
            }
            var.put(a.view(), ..)?;
        }
        NcValues::Int(a) => {
            let mut var = dst.add_variable::<i32>(name, dims)?;
            if let Some(fv) = fill_value {
                var.put_attribute("_FillValue", fv)?;
            }
            var.put(a.view(), ..)?;
        }
        NcValues::Uint(a) => {
            let mut var = dst.add_variable::<u32>(name, dims)?;
            if let Some(fv) = fill_value {
                var.put_attribute("_FillValue", fv)?;
            }
            var.put(a.view(), ..)?;
        }
        NcValues::Short(a) => {
            let mut var = dst.add_variable::<i16>(name, dims)?;
            if let Some(fv) = fill_value {
                var.put_attribute("_FillValue", fv)?;
            }
            var.put(a.view(), ..)?;
        }
        NcValues::Ushort(a) => {
            let mut var = dst.add_variable::<u16>(name, dims)?;
            if let Some(fv) = fill_value {
                var.put_attribute("_FillValue", fv)?;
            }
            var.put(a.view(), ..)?;
        }
        NcValues::Byte(a) => {
            let mut var = dst.add_variable::<i8>(name, dims)?;
            if let Some(fv) = fill_value {
                var.put_attribute("_FillValue", fv)?;
            }
            var.put(a.view(), ..)?;
        }
        NcValues::Uchar(a) => {
            let mut var = dst.add_variable::<u8>(name, dims)?;
            if let Some(fv) = fill_value {
                var.put_attribute("_FillValue", fv)?;
            }
            var.put(a.view(), ..)?;
        }
        NcValues::Str(s) => {
            let mut var = dst.add_string_variable(name, dims)?;
            var.put_string(s, ..)?;
        }
    }
    Ok(())
}

/// Read everything that defines `var` out of its file
pub fn detach_variable(var: &netcdf::Variable) -> Result<DetachedVariable> {
    let name = var.name();
    let dims: Vec<String> = var.dimensions().iter().map(|d| d.name().to_string()).collect();
    let values = read_values(var)?;
    let mut attributes = Vec::new();
    for attr in var.attributes() {
        attributes.push((attr.name().to_string(), attr.value()?));
    }
    Ok(DetachedVariable {
        name,
        dims,
        values,
        attributes,
    })
}

/// Recreate a detached variable inside `dst`
pub fn attach_variable(dst: &mut FileMut, var: DetachedVariable) -> Result<()> {
    let DetachedVariable {
        name,
        dims,
        values,
        attributes,
    } = var;
    let dim_refs: Vec<&str> = dims.iter().map(String::as_str).collect();
    let (fill, rest): (Vec<_>, Vec<_>) =
        attributes.into_iter().partition(|(k, _)| k == "_FillValue");
    create_variable(
        dst,
        &name,
        &dim_refs,
        &values,
        fill.into_iter().next().map(|(_, v)| v),
    )?;
    let mut dst_var = dst
        .variable_mut(&name)
        .ok_or_else(|| Fa2CfError::VariableNotFound {
            var: name.clone(),
            file: "rewrite target".to_string(),
        })?;
    for (key, value) in rest {
        dst_var.put_attribute(&key, value)?;
    }
    Ok(())
}

/// Copy one variable, values and attributes included, into `dst`
pub fn copy_variable(src_var: &netcdf::Variable, dst: &mut FileMut) -> Result<()> {
    attach_variable(dst, detach_variable(src_var)?)
}

/// Copy every variable of `src` into `dst`, skipping the named ones
pub fn copy_all_except(src: &File, dst: &mut FileMut, skip: &[&str]) -> Result<()> {
    for var in src.variables() {
        if skip.contains(&var.name().as_str()) {
            continue;
        }
        copy_variable(&var, dst)?;
    }
    Ok(())
}

/// Copy every dimension. Record dimensions come back fixed at their
/// current length, the same way an xarray load/save round-trip
/// materialises them.
pub fn copy_dimensions(src: &File, dst: &mut FileMut) -> Result<()> {
    for dim in src.dimensions() {
        dst.add_dimension(&dim.name(), dim.len())?;
    }
    Ok(())
}

/// Copy the file-level attributes
pub fn copy_global_attributes(src: &File, dst: &mut FileMut) -> Result<()> {
    for attr in src.attributes() {
        dst.add_attribute(attr.name(), attr.value()?)?;
    }
    Ok(())
}

/// Add any of `dims` not yet present in `dst`, sized from `shape`
pub fn ensure_dimensions(dst: &mut FileMut, dims: &[String], shape: &[usize]) -> Result<()> {
    for (dim, len) in dims.iter().zip(shape) {
        if dst.dimension(dim).is_none() {
            dst.add_dimension(dim, *len)?;
        }
    }
    Ok(())
}

/// Scalar NC_STRING variable, used for the run-identity coordinates
pub fn add_scalar_string(dst: &mut FileMut, name: &str, value: &str) -> Result<()> {
    let mut var = dst.add_string_variable(name, &[])?;
    var.put_string(value, ..)?;
    Ok(())
}

fn temp_sibling(path: &Path) -> PathBuf {
    let mut os = path.as_os_str().to_os_string();
    os.push(".tmp");
    PathBuf::from(os)
}

/// Rewrite `path` through `edit`: dimensions and global attributes are
/// copied to a sibling temp file, the edit places the variables, both
/// handles are closed, and the temp file is renamed over the original.
pub fn rewrite_file<F>(path: &Path, edit: F) -> Result<()>
where
    F: FnOnce(&File, &mut FileMut) -> Result<()>,
{
    let tmp_path = temp_sibling(path);
    let result = (|| {
        let src = netcdf::open(path)?;
        let mut dst = netcdf::create(&tmp_path)?;
        copy_dimensions(&src, &mut dst)?;
        copy_global_attributes(&src, &mut dst)?;
        edit(&src, &mut dst)
    })();
    match result {
        Ok(()) => {
            fs::rename(&tmp_path, path)?;
            Ok(())
        }
        Err(e) => {
            let _ = fs::remove_file(&tmp_path);
            Err(e)
        }
    }
}
