//! Content migration assembly.
//!
//! A tile ships one `content_migrations/migrations.yml` built from a base
//! document plus one fragment per upgrade path. The base carries the product
//! name, schema version and target version; fragments are appended to its
//! `migrations` list as-is. Versions inside the documents are written as a
//! placeholder (`1.0.0.0$PRERELEASE_VERSION$`) that is replaced with the real
//! tile version on the serialized output.

use std::fs;
use std::path::{Path, PathBuf};

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_yaml::Value;
use thiserror::Error;
use tracing::info;

use crate::util::yaml::scalar_string;

const VERSION_PLACEHOLDER: &str = r"[0-9]+\.[0-9]+\.[0-9]+\.[0-9]\$PRERELEASE_VERSION\$";

#[derive(Debug, Error)]
pub enum ContentMigrationError {
  #[error("invalid version placeholder pattern")]
  Pattern(#[from] regex::Error),

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

  #[error("failed to serialize content migrations")]
  Serialize(#[source] serde_yaml::Error),
}

/// The combined content migration document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContentMigrations {
  #[serde(deserialize_with = "scalar_string")]
  pub product: String,
  #[serde(deserialize_with = "scalar_string")]
  pub installation_schema_version: String,
  #[serde(deserialize_with = "scalar_string")]
  pub to_version: String,
  pub migrations: Vec<Value>,
}

pub struct ContentMigrationBuilder {
  version_pattern: Regex,
}

impl ContentMigrationBuilder {
  pub fn new() -> Result<Self, ContentMigrationError> {
    Ok(Self {
      version_pattern: Regex::new(VERSION_PLACEHOLDER)?,
    })
  }

  /// Merge `fragments` into the base document and inject `version`.
  ///
  /// Fragments are appended in the order given. Every version placeholder in
  /// the serialized result is replaced; text without one is left untouched.
  pub fn build(&self, base: &Path, version: &str, fragments: &[PathBuf]) -> Result<String, ContentMigrationError> {
    let mut document: ContentMigrations = parse_file(base)?;

    for fragment in fragments {
      info!(
        file = %fragment.file_name().unwrap_or_default().to_string_lossy(),
        "adding content migration"
      );
      let migration: Value = parse_file(fragment)?;
      document.migrations.push(migration);
    }

    let serialized = serde_yaml::to_string(&document).map_err(ContentMigrationError::Serialize)?;

    info!(%version, "injecting version into content migrations");
    Ok(self.inject_version(&serialized, version))
  }

  /// Replace every version placeholder in `text` with `version`.
  pub fn inject_version(&self, text: &str, version: &str) -> String {
    self
      .version_pattern
      .replace_all(text, regex::NoExpand(version))
      .into_owned()
  }
}

fn parse_file<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, ContentMigrationError> {
  let contents = fs::read(path).map_err(|source| ContentMigrationError::Read {
    path: path.to_path_buf(),
    source,
  })?;
  serde_yaml::from_slice(&contents).map_err(|source| ContentMigrationError::Parse {
    path: path.to_path_buf(),
    source,
  })
}
