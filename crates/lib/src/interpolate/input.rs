//! Lookup tables that template helpers resolve against.

use std::collections::BTreeMap;

use serde_yaml::Value;
use thiserror::Error;

use crate::manifest::{Release, Stemcell};

/// Errors returned by a [`Lookup`] when a helper cannot be resolved.
#[derive(Debug, Error)]
pub enum LookupError {
  #[error("could not find {helper} with {field} '{key}'")]
  NotFound {
    helper: &'static str,
    field: &'static str,
    key: String,
  },

  #[error("stemcell-tarball must be specified")]
  StemcellRequired,

  #[error("{count} stemcells were supplied, select one with $( stemcell \"os\" )")]
  AmbiguousStemcell { count: usize },

  #[error("icon must be specified to use $( icon )")]
  IconRequired,

  #[error("version must be specified to use $( version )")]
  VersionRequired,

  #[error("failed to convert {helper} '{key}' to YAML")]
  Marshal {
    helper: &'static str,
    key: String,
    #[source]
    source: serde_yaml::Error,
  },
}

/// Resolves template helpers to values.
///
/// `variable`, `icon` and `version` return text that is substituted as is.
/// The remaining helpers return structured values that the interpolator
/// marshals, interpolates again, and inlines as a single-line flow value.
pub trait Lookup {
  fn variable(&self, key: &str) -> Result<&str, LookupError>;

  fn release(&self, name: &str) -> Result<Value, LookupError>;

  /// The stemcell for `os`, or the only stemcell when `os` is `None`.
  fn stemcell(&self, os: Option<&str>) -> Result<Value, LookupError>;

  fn form(&self, key: &str) -> Result<Value, LookupError>;

  fn instance_group(&self, name: &str) -> Result<Value, LookupError>;

  fn job(&self, name: &str) -> Result<Value, LookupError>;

  fn icon(&self) -> Result<&str, LookupError>;

  fn version(&self) -> Result<&str, LookupError>;
}

/// Everything a bake makes available to templates.
#[derive(Debug, Clone, Default)]
pub struct InterpolateInput {
  pub variables: BTreeMap<String, String>,
  /// Keyed by release name.
  pub releases: BTreeMap<String, Release>,
  pub stemcells: Vec<Stemcell>,
  /// Form types keyed by `name`.
  pub forms: BTreeMap<String, Value>,
  /// Job types keyed by `name`.
  pub instance_groups: BTreeMap<String, Value>,
  /// Job templates keyed by `name`.
  pub jobs: BTreeMap<String, Value>,
  /// Base64-encoded icon image.
  pub icon_image: Option<String>,
  pub version: Option<String>,
}

fn not_found(helper: &'static str, field: &'static str, key: &str) -> LookupError {
  LookupError::NotFound {
    helper,
    field,
    key: key.to_string(),
  }
}

fn to_value<T: serde::Serialize>(helper: &'static str, key: &str, value: &T) -> Result<Value, LookupError> {
  serde_yaml::to_value(value).map_err(|source| LookupError::Marshal {
    helper,
    key: key.to_string(),
    source,
  })
}

impl Lookup for InterpolateInput {
  fn variable(&self, key: &str) -> Result<&str, LookupError> {
    self
      .variables
      .get(key)
      .map(String::as_str)
      .ok_or_else(|| not_found("variable", "key", key))
  }

  fn release(&self, name: &str) -> Result<Value, LookupError> {
    let release = self.releases.get(name).ok_or_else(|| not_found("release", "name", name))?;
    to_value("release", name, release)
  }

  fn stemcell(&self, os: Option<&str>) -> Result<Value, LookupError> {
    let stemcell = match (os, self.stemcells.as_slice()) {
      (Some(os), stemcells) => stemcells
        .iter()
        .find(|s| s.os == os)
        .ok_or_else(|| not_found("stemcell", "os", os))?,
      (None, []) => return Err(LookupError::StemcellRequired),
      (None, [only]) => only,
      (None, many) => return Err(LookupError::AmbiguousStemcell { count: many.len() }),
    };
    to_value("stemcell", &stemcell.os, stemcell)
  }

  fn form(&self, key: &str) -> Result<Value, LookupError> {
    self.forms.get(key).cloned().ok_or_else(|| not_found("form", "key", key))
  }

  fn instance_group(&self, name: &str) -> Result<Value, LookupError> {
    self
      .instance_groups
      .get(name)
      .cloned()
      .ok_or_else(|| not_found("instance_group", "name", name))
  }

  fn job(&self, name: &str) -> Result<Value, LookupError> {
    self.jobs.get(name).cloned().ok_or_else(|| not_found("job", "name", name))
  }

  fn icon(&self) -> Result<&str, LookupError> {
    self.icon_image.as_deref().ok_or(LookupError::IconRequired)
  }

  fn version(&self) -> Result<&str, LookupError> {
    self.version.as_deref().ok_or(LookupError::VersionRequired)
  }
}
