//! Serde helpers for hand-written YAML inputs.

use serde::{Deserialize, Deserializer};
use serde_yaml::Value;

/// Accept any YAML scalar as a string.
///
/// Unquoted versions such as `version: 1.2` decode as numbers.
pub fn scalar_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
  D: Deserializer<'de>,
{
  use serde::de::Error;

  match Value::deserialize(deserializer)? {
    Value::String(s) => Ok(s),
    Value::Number(n) => Ok(n.to_string()),
    Value::Bool(b) => Ok(b.to_string()),
    Value::Null => Ok(String::new()),
    other => Err(D::Error::custom(format!("expected a scalar, found {other:?}"))),
  }
}
