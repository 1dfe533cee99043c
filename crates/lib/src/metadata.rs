//! Metadata template assembly.
//!
//! The base metadata file holds the product's top-level keys. Collections
//! that tile authors keep in fragment directories (BOSH variables, property
//! blueprints, runtime configs) are read and spliced into it, and the icon is
//! embedded as base64. The result is the template handed to the interpolator.

use std::fs;
use std::path::{Path, PathBuf};

use base64::prelude::*;
use serde_yaml::{Mapping, Value};
use thiserror::Error;
use tracing::{debug, info};

use crate::fragments::{DirectoryReader, FragmentError, kind_of};

#[derive(Debug, Error)]
pub enum MetadataError {
  #[error("failed to read {}", path.display())]
  Read {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("failed to parse metadata file {}", path.display())]
  Parse {
    path: PathBuf,
    #[source]
    source: serde_yaml::Error,
  },

  #[error("metadata file {} must be a mapping, found {found}", path.display())]
  NotMapping { path: PathBuf, found: &'static str },

  #[error("metadata file {} must have a string `name`", path.display())]
  MissingName { path: PathBuf },

  #[error("failed to read {key} from {}", dir.display())]
  Fragments {
    key: &'static str,
    dir: PathBuf,
    #[source]
    source: FragmentError,
  },

  #[error("failed to serialize metadata template")]
  Serialize(#[source] serde_yaml::Error),
}

/// Where the pieces of the metadata template come from.
#[derive(Debug, Clone, Default)]
pub struct MetadataSources {
  pub metadata: PathBuf,
  pub icon: Option<PathBuf>,
  pub bosh_variable_dirs: Vec<PathBuf>,
  pub property_dirs: Vec<PathBuf>,
  pub runtime_config_dirs: Vec<PathBuf>,
}

/// The assembled, not yet interpolated, metadata document.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedMetadata {
  /// Product name as written in the base metadata file.
  pub name: String,
  pub icon_image: Option<String>,
  pub document: Mapping,
}

impl GeneratedMetadata {
  /// Serialize the document as template text for the interpolator.
  pub fn to_template(&self) -> Result<String, MetadataError> {
    serde_yaml::to_string(&self.document).map_err(MetadataError::Serialize)
  }
}

/// Read the base metadata file and splice in the icon and fragment collections.
///
/// Each collection read from directories replaces the base document's value
/// under the same key; collections without directories keep the base value.
pub fn build(sources: &MetadataSources) -> Result<GeneratedMetadata, MetadataError> {
  info!(path = %sources.metadata.display(), "reading metadata file");
  let mut document = read_base(&sources.metadata)?;

  let name = match document.get("name") {
    Some(Value::String(name)) => name.clone(),
    _ => {
      return Err(MetadataError::MissingName {
        path: sources.metadata.clone(),
      });
    }
  };

  let icon_image = match &sources.icon {
    Some(icon) => {
      let bytes = fs::read(icon).map_err(|source| MetadataError::Read {
        path: icon.clone(),
        source,
      })?;
      debug!(path = %icon.display(), bytes = bytes.len(), "encoding icon");
      let encoded = BASE64_STANDARD.encode(bytes);
      document.insert(Value::from("icon_image"), Value::from(encoded.clone()));
      Some(encoded)
    }
    None => None,
  };

  let collections: [(&'static str, &[PathBuf]); 3] = [
    ("variables", &sources.bosh_variable_dirs),
    ("property_blueprints", &sources.property_dirs),
    ("runtime_configs", &sources.runtime_config_dirs),
  ];

  for (key, dirs) in collections {
    if dirs.is_empty() {
      continue;
    }

    let reader = DirectoryReader::new(key);
    let mut values = Vec::new();
    for dir in dirs {
      info!(key, dir = %dir.display(), "reading fragment directory");
      values.extend(reader.read(dir).map_err(|source| MetadataError::Fragments {
        key,
        dir: dir.clone(),
        source,
      })?);
    }
    document.insert(Value::from(key), Value::Sequence(values));
  }

  Ok(GeneratedMetadata {
    name,
    icon_image,
    document,
  })
}

fn read_base(path: &Path) -> Result<Mapping, MetadataError> {
  let contents = fs::read(path).map_err(|source| MetadataError::Read {
    path: path.to_path_buf(),
    source,
  })?;
  let document: Value = serde_yaml::from_slice(&contents).map_err(|source| MetadataError::Parse {
    path: path.to_path_buf(),
    source,
  })?;

  match document {
    Value::Mapping(mapping) => Ok(mapping),
    other => Err(MetadataError::NotMapping {
      path: path.to_path_buf(),
      found: kind_of(&other),
    }),
  }
}
