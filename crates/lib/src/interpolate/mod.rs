//! Template interpolation.
//!
//! The interpolator expands helper calls in a metadata template against a
//! [`Lookup`]. Plain helpers (`variable`, `icon`, `version`) substitute their
//! text directly. Structured helpers (`release`, `stemcell`, `form`,
//! `instance_group`, `job`) resolve to a YAML value which is:
//!
//! 1. marshaled back to YAML text,
//! 2. interpolated again (fragments may reference other helpers),
//! 3. re-encoded as single-line JSON, which is valid YAML flow syntax.
//!
//! The single-line form lets a value be dropped anywhere in the surrounding
//! document without disturbing its indentation:
//!
//! ```yaml
//! releases:
//! - $( release "cf" )
//! # becomes
//! releases:
//! - {"name":"cf","version":"235.0.0","file":"cf-235.0.0.tgz","sha256":"..."}
//! ```
//!
//! After expansion the whole document is parsed as a mapping and serialized
//! again, so the output is normalized YAML.

mod input;

use serde_yaml::Value;
use thiserror::Error;
use tracing::{debug, trace};

use crate::consts::MAX_INTERPOLATION_DEPTH;
use crate::fragments::kind_of;
use crate::template::{self, Helper, Segment, TemplateError};

pub use input::{InterpolateInput, Lookup, LookupError};

/// Errors that can occur during interpolation.
#[derive(Debug, Error)]
pub enum InterpolateError {
  #[error("template is not valid UTF-8")]
  Utf8(#[from] std::str::Utf8Error),

  #[error("template parsing failed")]
  Template(#[from] TemplateError),

  #[error(transparent)]
  Lookup(#[from] LookupError),

  #[error("unable to interpolate value of `{helper}`")]
  Nested {
    helper: Helper,
    #[source]
    source: Box<InterpolateError>,
  },

  #[error("helper values nested deeper than {max} levels (self-referencing fragment?)")]
  Recursion { max: usize },

  #[error("failed to marshal value of `{helper}` to YAML")]
  Marshal {
    helper: Helper,
    #[source]
    source: serde_yaml::Error,
  },

  #[error("interpolated value of `{helper}` is not valid YAML")]
  Reparse {
    helper: Helper,
    #[source]
    source: serde_yaml::Error,
  },

  #[error("failed to inline value of `{helper}`")]
  Inline {
    helper: Helper,
    #[source]
    source: serde_json::Error,
  },

  #[error("interpolated metadata is not valid YAML")]
  Output(#[source] serde_yaml::Error),

  #[error("interpolated metadata must be a mapping, found {found}")]
  NotMapping { found: &'static str },
}

/// Expands metadata templates against a [`Lookup`].
pub struct Interpolator<'a, L: Lookup + ?Sized> {
  lookup: &'a L,
}

impl<'a, L: Lookup + ?Sized> Interpolator<'a, L> {
  pub fn new(lookup: &'a L) -> Self {
    Self { lookup }
  }

  /// Expand `template` and return the pretty-printed metadata document.
  ///
  /// # Errors
  ///
  /// Fails on template syntax errors, lookup misses, values that cannot be
  /// re-encoded, or if the expanded document is not a YAML mapping.
  pub fn interpolate(&self, template: &[u8]) -> Result<String, InterpolateError> {
    let text = std::str::from_utf8(template)?;
    let expanded = self.expand(text, 0)?;
    pretty_print(&expanded)
  }

  /// Expand helper calls in `text` without normalizing the result.
  pub fn expand(&self, text: &str, depth: usize) -> Result<String, InterpolateError> {
    if depth > MAX_INTERPOLATION_DEPTH {
      return Err(InterpolateError::Recursion {
        max: MAX_INTERPOLATION_DEPTH,
      });
    }

    let segments = template::parse(text)?;
    let mut out = String::with_capacity(text.len());

    for segment in segments {
      match segment {
        Segment::Literal(literal) => out.push_str(&literal),
        Segment::Call(helper) => {
          trace!(%helper, depth, "evaluating helper");
          let replacement = self.evaluate(&helper, depth)?;
          out.push_str(&replacement);
        }
      }
    }

    Ok(out)
  }

  fn evaluate(&self, helper: &Helper, depth: usize) -> Result<String, InterpolateError> {
    let value = match helper {
      Helper::Variable(key) => return Ok(self.lookup.variable(key)?.to_string()),
      Helper::Icon => return Ok(self.lookup.icon()?.to_string()),
      Helper::Version => return Ok(self.lookup.version()?.to_string()),
      Helper::Release(name) => self.lookup.release(name)?,
      Helper::Stemcell(os) => self.lookup.stemcell(os.as_deref())?,
      Helper::Form(key) => self.lookup.form(key)?,
      Helper::InstanceGroup(name) => self.lookup.instance_group(name)?,
      Helper::Job(name) => self.lookup.job(name)?,
    };

    self.inline(helper, &value, depth)
  }

  /// Marshal a looked-up value, interpolate it, and collapse it onto one line.
  fn inline(&self, helper: &Helper, value: &Value, depth: usize) -> Result<String, InterpolateError> {
    let yaml = serde_yaml::to_string(value).map_err(|source| InterpolateError::Marshal {
      helper: helper.clone(),
      source,
    })?;

    let expanded = self.expand(&yaml, depth + 1).map_err(|source| match source {
      recursion @ InterpolateError::Recursion { .. } => recursion,
      other => InterpolateError::Nested {
        helper: helper.clone(),
        source: Box::new(other),
      },
    })?;

    let reparsed: Value = serde_yaml::from_str(&expanded).map_err(|source| InterpolateError::Reparse {
      helper: helper.clone(),
      source,
    })?;

    let inlined = serde_json::to_string(&reparsed).map_err(|source| InterpolateError::Inline {
      helper: helper.clone(),
      source,
    })?;

    debug!(%helper, bytes = inlined.len(), "inlined helper value");
    Ok(inlined)
  }
}

/// Parse expanded text as a mapping and serialize it again.
///
/// An empty document becomes the empty mapping.
pub fn pretty_print(expanded: &str) -> Result<String, InterpolateError> {
  let document: Value = serde_yaml::from_str(expanded).map_err(InterpolateError::Output)?;

  let mapping = match document {
    Value::Mapping(mapping) => mapping,
    Value::Null => serde_yaml::Mapping::new(),
    other => return Err(InterpolateError::NotMapping { found: kind_of(&other) }),
  };

  serde_yaml::to_string(&mapping).map_err(InterpolateError::Output)
}
