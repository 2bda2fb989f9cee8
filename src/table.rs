//! Variable-definition table and global-attribute template
//!
//! The table maps each exportable CF variable name to its model-native
//! field name, its snapshot source and the CF attributes to attach on
//! export. Both the table and the global-attribute template are plain YAML
//! files maintained next to the model configuration; the pipeline only ever
//! reads them.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::errors::{Fa2CfError, Result};

/// Which snapshot stream a variable is decoded from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VariableSource {
    /// Model-native history files
    Model,
    /// Fullpos post-processed files (pressure-level diagnostics)
    Fullpos,
}

impl Default for VariableSource {
    fn default() -> Self {
        VariableSource::Model
    }
}

/// Definition of one exportable variable
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VariableDef {
    /// Field name inside the model snapshot, when it differs from the CF name
    #[serde(default)]
    pub fa_name: Option<String>,
    #[serde(default)]
    pub source: VariableSource,
    /// CF attributes attached to the exported variable
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
}

impl VariableDef {
    /// Name under which the field is looked up in a snapshot
    pub fn field_name<'a>(&'a self, cf_name: &'a str) -> &'a str {
        self.fa_name.as_deref().unwrap_or(cf_name)
    }
}

/// The full variable table, keyed by CF variable name
#[derive(Debug, Clone, Default)]
pub struct VariableTable {
    defs: BTreeMap<String, VariableDef>,
    source: Option<String>,
}

impl VariableTable {
    pub fn from_yaml_str(text: &str) -> Result<Self> {
        let defs: BTreeMap<String, VariableDef> = serde_yaml::from_str(text)?;
        Ok(VariableTable { defs, source: None })
    }

    pub fn from_yaml_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        let mut table = Self::from_yaml_str(&text)?;
        table.source = Some(path.display().to_string());
        Ok(table)
    }

    pub fn get(&self, name: &str) -> Option<&VariableDef> {
        self.defs.get(name)
    }

    /// Look a requested variable up, failing with the table location when it
    /// is not defined there.
    pub fn resolve(&self, name: &str) -> Result<&VariableDef> {
        self.defs.get(name).ok_or_else(|| Fa2CfError::VariableNotFound {
            var: name.to_string(),
            file: self
                .source
                .clone()
                .unwrap_or_else(|| "variable table".to_string()),
        })
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.defs.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.defs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.defs.is_empty()
    }
}

/// Global attributes stamped on every exported file (e.g. the CORDEX set)
#[derive(Debug, Clone, Default)]
pub struct GlobalAttributes {
    attrs: BTreeMap<String, String>,
}

impl GlobalAttributes {
    /// Parse a flat YAML mapping. Scalar values of any YAML type are
    /// accepted and written as their string form, since attribute templates
    /// are maintained by hand and numbers are rarely quoted.
    pub fn from_yaml_str(text: &str) -> Result<Self> {
        let raw: BTreeMap<String, serde_yaml::Value> = serde_yaml::from_str(text)?;
        let mut attrs = BTreeMap::new();
        for (key, value) in raw {
            let rendered = match value {
                serde_yaml::Value::String(s) => s,
                serde_yaml::Value::Number(n) => n.to_string(),
                serde_yaml::Value::Bool(b) => b.to_string(),
                serde_yaml::Value::Null => String::new(),
                other => {
                    return Err(Fa2CfError::Configuration(format!(
                        "global attribute '{}' is not a scalar: {:?}",
                        key, other
                    )))
                }
            };
            attrs.insert(key, rendered);
        }
        Ok(GlobalAttributes { attrs })
    }

    pub fn from_yaml_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Self::from_yaml_str(&text)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.attrs.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.attrs.get(key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.attrs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attrs.is_empty()
    }
}
