//! Centralized error handling for fa2cf
//!
//! This module provides structured error types shared by the export pipeline,
//! the stamping/repair passes and the notebook tools, enabling better error
//! context and type safety than a generic `Box<dyn Error>`.

use std::fmt;
use std::path::PathBuf;

/// Main error type for fa2cf operations
#[derive(Debug)]
pub enum Fa2CfError {
    /// Invalid run window or cadence configuration, detected before any I/O
    Configuration(String),

    /// A planned model snapshot is absent from the run directory
    SnapshotNotFound { path: PathBuf },

    /// A regridded file has no unregridded companion next to it
    MissingCompanion { regridded: PathBuf, companion: PathBuf },

    /// Variable not found in a NetCDF file
    VariableNotFound { var: String, file: String },

    /// A merged series does not cover every planned timestep
    LengthMismatch { var: String, expected: usize, actual: usize },

    /// A directory name does not follow the `run_<name>_<rstart>_<nhours>` convention
    RunDirParse { dir: String },

    /// Variable type the rewrite machinery cannot carry over
    UnsupportedType { var: String, vartype: String },

    /// Notebook document is malformed or not nbformat 4
    Notebook(String),

    /// NetCDF file operation errors
    NetCDFError(netcdf::Error),

    /// I/O operation errors
    IoError(std::io::Error),

    /// Array shape or dimension error
    ArrayError(ndarray::ShapeError),

    /// Variable table / attribute template parse errors
    YamlError(serde_yaml::Error),

    /// Notebook JSON parse errors
    JsonError(serde_json::Error),

    /// Generic error for backward compatibility
    Generic(String),
}

impl fmt::Display for Fa2CfError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Fa2CfError::Configuration(msg) => write!(f, "Configuration error: {}", msg),
            Fa2CfError::SnapshotNotFound { path } => {
                write!(f, "Snapshot not found: {}", path.display())
            }
            Fa2CfError::MissingCompanion { regridded, companion } => write!(
                f,
                "No companion file {} for regridded file {}",
                companion.display(),
                regridded.display()
            ),
            Fa2CfError::VariableNotFound { var, file } => {
                write!(f, "Variable '{}' not found in {}", var, file)
            }
            Fa2CfError::LengthMismatch { var, expected, actual } => write!(
                f,
                "Merged series for '{}' has {} timesteps, expected {}",
                var, actual, expected
            ),
            Fa2CfError::RunDirParse { dir } => {
                write!(f, "Directory name '{}' is not a valid run directory", dir)
            }
            Fa2CfError::UnsupportedType { var, vartype } => {
                write!(f, "Variable '{}' has unsupported type {}", var, vartype)
            }
            Fa2CfError::Notebook(msg) => write!(f, "Notebook error: {}", msg),
            Fa2CfError::NetCDFError(e) => write!(f, "NetCDF error: {}", e),
            Fa2CfError::IoError(e) => write!(f, "I/O error: {}", e),
            Fa2CfError::ArrayError(e) => write!(f, "Array error: {}", e),
            Fa2CfError::YamlError(e) => write!(f, "YAML error: {}", e),
            Fa2CfError::JsonError(e) => write!(f, "JSON error: {}", e),
            Fa2CfError::Generic(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for Fa2CfError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Fa2CfError::NetCDFError(e) => Some(e),
            Fa2CfError::IoError(e) => Some(e),
            Fa2CfError::ArrayError(e) => Some(e),
            Fa2CfError::YamlError(e) => Some(e),
            Fa2CfError::JsonError(e) => Some(e),
            _ => None,
        }
    }
}

impl From<netcdf::Error> for Fa2CfError {
    fn from(error: netcdf::Error) -> Self {
        Fa2CfError::NetCDFError(error)
    }
}

impl From<std::io::Error> for Fa2CfError {
    fn from(error: std::io::Error) -> Self {
        Fa2CfError::IoError(error)
    }
}

impl From<ndarray::ShapeError> for Fa2CfError {
    fn from(error: ndarray::ShapeError) -> Self {
        Fa2CfError::ArrayError(error)
    }
}

impl From<serde_yaml::Error> for Fa2CfError {
    fn from(error: serde_yaml::Error) -> Self {
        Fa2CfError::YamlError(error)
    }
}

impl From<serde_json::Error> for Fa2CfError {
    fn from(error: serde_json::Error) -> Self {
        Fa2CfError::JsonError(error)
    }
}

impl From<glob::PatternError> for Fa2CfError {
    fn from(error: glob::PatternError) -> Self {
        Fa2CfError::Generic(format!("Invalid glob pattern: {}", error))
    }
}

impl From<String> for Fa2CfError {
    fn from(error: String) -> Self {
        Fa2CfError::Generic(error)
    }
}

impl From<&str> for Fa2CfError {
    fn from(error: &str) -> Self {
        Fa2CfError::Generic(error.to_string())
    }
}

/// Result type alias for fa2cf operations
pub type Result<T> = std::result::Result<T, Fa2CfError>;
