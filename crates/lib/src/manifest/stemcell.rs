use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{ManifestError, read_tarball_entry};
use crate::util::yaml::scalar_string;

const STEMCELL_MANIFEST: &str = "stemcell.MF";

/// Stemcell criteria record.
///
/// `stemcell.MF` names the field `operating_system`; the record emits it as `os`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stemcell {
  pub version: String,
  #[serde(alias = "operating_system")]
  pub os: String,
}

#[derive(Deserialize)]
struct StemcellManifest {
  #[serde(deserialize_with = "scalar_string")]
  version: String,
  operating_system: String,
}

/// Read the stemcell record from a stemcell tarball.
pub fn read_stemcell(tarball: &Path) -> Result<Stemcell, ManifestError> {
  let contents = read_tarball_entry(tarball, STEMCELL_MANIFEST)?;
  let manifest: StemcellManifest = serde_yaml::from_slice(&contents).map_err(|source| ManifestError::Parse {
    manifest: STEMCELL_MANIFEST,
    path: tarball.to_path_buf(),
    source,
  })?;

  debug!(os = %manifest.operating_system, version = %manifest.version, "read stemcell manifest");

  Ok(Stemcell {
    version: manifest.version,
    os: manifest.operating_system,
  })
}
