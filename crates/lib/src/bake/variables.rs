//! Variable table assembly from variable files and `key=value` flags.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde_yaml::Value;
use thiserror::Error;
use tracing::debug;

use crate::fragments::kind_of;

#[derive(Debug, Error)]
pub enum VariablesError {
  #[error("failed reading variable file {}", path.display())]
  Read {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("failed reading variable file {}", path.display())]
  Parse {
    path: PathBuf,
    #[source]
    source: serde_yaml::Error,
  },

  #[error("variable file {} must be a mapping, found {found}", path.display())]
  NotMapping { path: PathBuf, found: &'static str },

  #[error("variable '{key}' in {} must be a scalar, found {found}", path.display())]
  NotScalar {
    path: PathBuf,
    key: String,
    found: &'static str,
  },

  #[error("variable needs a key value in the form of key=value, got '{0}'")]
  MissingEquals(String),
}

/// Build the variable table: files in order, then flags in order. Later values win.
pub fn collect(files: &[PathBuf], flags: &[String]) -> Result<BTreeMap<String, String>, VariablesError> {
  let mut variables = BTreeMap::new();

  for file in files {
    read_file(file, &mut variables)?;
  }

  for flag in flags {
    let (key, value) = parse_flag(flag)?;
    variables.insert(key.to_string(), value.to_string());
  }

  debug!(count = variables.len(), "collected variables");
  Ok(variables)
}

/// Split `key=value` at the first `=`.
pub fn parse_flag(flag: &str) -> Result<(&str, &str), VariablesError> {
  flag
    .split_once('=')
    .ok_or_else(|| VariablesError::MissingEquals(flag.to_string()))
}

fn read_file(path: &Path, variables: &mut BTreeMap<String, String>) -> Result<(), VariablesError> {
  let contents = fs::read(path).map_err(|source| VariablesError::Read {
    path: path.to_path_buf(),
    source,
  })?;
  let document: Value = serde_yaml::from_slice(&contents).map_err(|source| VariablesError::Parse {
    path: path.to_path_buf(),
    source,
  })?;

  let mapping = match document {
    Value::Mapping(mapping) => mapping,
    Value::Null => return Ok(()),
    other => {
      return Err(VariablesError::NotMapping {
        path: path.to_path_buf(),
        found: kind_of(&other),
      });
    }
  };

  for (key, value) in mapping {
    let key = scalar_text(&key).ok_or_else(|| VariablesError::NotScalar {
      path: path.to_path_buf(),
      key: format!("{key:?}"),
      found: kind_of(&key),
    })?;
    let text = scalar_text(&value).ok_or_else(|| VariablesError::NotScalar {
      path: path.to_path_buf(),
      key: key.clone(),
      found: kind_of(&value),
    })?;
    variables.insert(key, text);
  }

  Ok(())
}

fn scalar_text(value: &Value) -> Option<String> {
  match value {
    Value::String(s) => Some(s.clone()),
    Value::Number(n) => Some(n.to_string()),
    Value::Bool(b) => Some(b.to_string()),
    Value::Null => Some(String::new()),
    _ => None,
  }
}
