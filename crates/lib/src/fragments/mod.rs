//! Fragment directory reading.
//!
//! Tile authors split large metadata collections (forms, job types, property
//! blueprints, BOSH variables, runtime configs) into many small YAML files.
//! A [`DirectoryReader`] walks one such directory and concatenates the
//! collection stored under a single top-level key in every file:
//!
//! ```yaml
//! # forms/domains.yml
//! forms:
//! - name: domains
//!   label: Domains
//! ```
//!
//! Files are visited recursively in lexicographic path order. Only `.yml`
//! files are read; every one of them must carry the top-level key.

mod walk;

use std::fs;
use std::path::{Path, PathBuf};

use serde_yaml::Value;
use thiserror::Error;
use tracing::debug;

use crate::consts::{FRAGMENT_EXTENSION, ORDER_FILENAME};

pub use walk::{EntryKind, Walk};

/// Errors that can occur while reading a fragment directory.
#[derive(Debug, Error)]
pub enum FragmentError {
  #[error("failed to walk {}", root.display())]
  Walk {
    root: PathBuf,
    #[source]
    source: walkdir::Error,
  },

  #[error("failed to read {}", path.display())]
  Read {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("failed to parse {}", path.display())]
  Parse {
    path: PathBuf,
    #[source]
    source: serde_yaml::Error,
  },

  #[error("not a {key} file: {path:?}")]
  MissingKey { key: String, path: PathBuf },

  #[error("file {path:?} with top-level key '{key}' has an invalid format: {reason}")]
  InvalidFormat { path: PathBuf, key: String, reason: String },

  #[error("could not find top-level order key '{key}' in {path:?}")]
  MissingOrderKey { key: String, path: PathBuf },

  #[error("could not find metadata with `name` '{name}' listed in {path:?}")]
  UnknownOrderedName { name: String, path: PathBuf },
}

/// A named collection element together with the file it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct Part {
  pub file: PathBuf,
  pub name: String,
  pub metadata: Value,
}

/// Reads the collection stored under one top-level key across a directory.
#[derive(Debug, Clone)]
pub struct DirectoryReader {
  top_level_key: String,
  order_key: Option<String>,
}

impl DirectoryReader {
  pub fn new(top_level_key: impl Into<String>) -> Self {
    Self {
      top_level_key: top_level_key.into(),
      order_key: None,
    }
  }

  /// Order results by the name list stored under `order_key` in `_order.yml`.
  ///
  /// The order file itself is skipped during the walk. Parts whose names are
  /// not listed are left out.
  pub fn with_order(mut self, order_key: impl Into<String>) -> Self {
    self.order_key = Some(order_key.into());
    self
  }

  pub fn top_level_key(&self) -> &str {
    &self.top_level_key
  }

  /// Concatenate the collection from every fragment file under `dir`.
  ///
  /// Each file's value must be a sequence. Nothing is deduplicated or merged.
  pub fn read(&self, dir: &Path) -> Result<Vec<Value>, FragmentError> {
    if self.order_key.is_some() {
      return Ok(self.read_parts(dir)?.into_iter().map(|part| part.metadata).collect());
    }

    let mut values = Vec::new();
    for (path, collection) in self.collections(dir)? {
      match collection {
        Value::Sequence(items) => values.extend(items),
        other => return Err(self.invalid(&path, format!("expected a sequence, found {}", kind_of(&other)))),
      }
    }

    debug!(dir = %dir.display(), key = %self.top_level_key, count = values.len(), "read fragment directory");
    Ok(values)
  }

  /// Read every collection element as a [`Part`] keyed by its `name` field.
  ///
  /// A file's value may be a sequence of mappings or a single mapping.
  pub fn read_parts(&self, dir: &Path) -> Result<Vec<Part>, FragmentError> {
    let mut parts = Vec::new();

    for (path, collection) in self.collections(dir)? {
      let items = match collection {
        Value::Sequence(items) => items,
        mapping @ Value::Mapping(_) => vec![mapping],
        other => {
          return Err(self.invalid(
            &path,
            format!("expected either a sequence or a mapping, found {}", kind_of(&other)),
          ));
        }
      };

      for item in items {
        if !item.is_mapping() {
          return Err(self.invalid(&path, format!("metadata item must be a mapping, found {}", kind_of(&item))));
        }
        let name = match item.get("name") {
          Some(Value::String(name)) => name.clone(),
          Some(other) => {
            return Err(self.invalid(&path, format!("`name` must be a string, found {}", kind_of(other))));
          }
          None => return Err(self.invalid(&path, "metadata item does not have a `name` field".to_string())),
        };
        parts.push(Part {
          file: path.clone(),
          name,
          metadata: item,
        });
      }
    }

    if let Some(order_key) = &self.order_key {
      parts = order_parts(dir, order_key, parts)?;
    }

    debug!(dir = %dir.display(), key = %self.top_level_key, count = parts.len(), "read fragment parts");
    Ok(parts)
  }

  /// Walk `dir` and return the value under the top-level key of each fragment file.
  fn collections(&self, dir: &Path) -> Result<Vec<(PathBuf, Value)>, FragmentError> {
    let mut collections = Vec::new();

    for entry in Walk::new(dir) {
      let (path, kind) = entry.map_err(|source| FragmentError::Walk {
        root: dir.to_path_buf(),
        source,
      })?;

      if kind != EntryKind::File || path.extension().is_none_or(|ext| ext != FRAGMENT_EXTENSION) {
        continue;
      }
      if self.order_key.is_some() && path.file_name().is_some_and(|n| n == ORDER_FILENAME) {
        continue;
      }

      let document = read_yaml(&path)?;
      let collection = match document {
        Value::Mapping(mut mapping) => mapping.remove(self.top_level_key.as_str()),
        Value::Null => None,
        other => {
          return Err(self.invalid(&path, format!("expected a mapping document, found {}", kind_of(&other))));
        }
      };

      match collection {
        Some(collection) => {
          debug!(file = %path.display(), key = %self.top_level_key, "read fragment file");
          collections.push((path, collection));
        }
        None => {
          return Err(FragmentError::MissingKey {
            key: self.top_level_key.clone(),
            path,
          });
        }
      }
    }

    Ok(collections)
  }

  fn invalid(&self, path: &Path, reason: String) -> FragmentError {
    FragmentError::InvalidFormat {
      path: path.to_path_buf(),
      key: self.top_level_key.clone(),
      reason,
    }
  }
}

fn read_yaml(path: &Path) -> Result<Value, FragmentError> {
  let contents = fs::read(path).map_err(|source| FragmentError::Read {
    path: path.to_path_buf(),
    source,
  })?;
  serde_yaml::from_slice(&contents).map_err(|source| FragmentError::Parse {
    path: path.to_path_buf(),
    source,
  })
}

fn order_parts(dir: &Path, order_key: &str, mut parts: Vec<Part>) -> Result<Vec<Part>, FragmentError> {
  let order_path = dir.join(ORDER_FILENAME);
  let document = read_yaml(&order_path)?;

  let names = match document.get(order_key) {
    Some(Value::Sequence(names)) => names,
    Some(other) => {
      return Err(FragmentError::InvalidFormat {
        path: order_path,
        key: order_key.to_string(),
        reason: format!("expected a sequence of names, found {}", kind_of(other)),
      });
    }
    None => {
      return Err(FragmentError::MissingOrderKey {
        key: order_key.to_string(),
        path: order_path,
      });
    }
  };

  let mut ordered = Vec::with_capacity(names.len());
  for name in names {
    let Some(name) = name.as_str() else {
      return Err(FragmentError::InvalidFormat {
        path: order_path,
        key: order_key.to_string(),
        reason: format!("expected a string name, found {}", kind_of(name)),
      });
    };
    let Some(index) = parts.iter().position(|part| part.name == name) else {
      return Err(FragmentError::UnknownOrderedName {
        name: name.to_string(),
        path: order_path,
      });
    };
    ordered.push(parts.remove(index));
  }

  Ok(ordered)
}

/// Short human name of a YAML value's kind, for error messages.
pub(crate) fn kind_of(value: &Value) -> &'static str {
  match value {
    Value::Null => "null",
    Value::Bool(_) => "a boolean",
    Value::Number(_) => "a number",
    Value::String(_) => "a string",
    Value::Sequence(_) => "a sequence",
    Value::Mapping(_) => "a mapping",
    Value::Tagged(_) => "a tagged value",
  }
}
