use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{ManifestError, file_name, read_tarball_entry};
use crate::util::hash::hash_file;
use crate::util::yaml::scalar_string;

const RELEASE_MANIFEST: &str = "release.MF";

/// A release artifact record.
///
/// Serializes to the mapping emitted by the `release` template helper.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Release {
  pub name: String,
  pub version: String,
  /// Tarball basename, as it appears under `releases/` in the tile.
  pub file: String,
  /// Hex SHA-256 of the whole tarball.
  pub sha256: String,
  /// Stemcell the release was compiled against, for compiled releases.
  #[serde(skip)]
  pub compiled_stemcell: Option<CompiledStemcell>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledStemcell {
  pub os: String,
  pub version: String,
}

#[derive(Deserialize)]
struct ReleaseManifest {
  #[serde(deserialize_with = "scalar_string")]
  name: String,
  #[serde(deserialize_with = "scalar_string")]
  version: String,
  #[serde(default)]
  compiled_packages: Vec<CompiledPackage>,
}

#[derive(Deserialize)]
struct CompiledPackage {
  stemcell: String,
}

/// Read the release record from a release tarball.
pub fn read_release(tarball: &Path) -> Result<Release, ManifestError> {
  let contents = read_tarball_entry(tarball, RELEASE_MANIFEST)?;
  let manifest: ReleaseManifest = serde_yaml::from_slice(&contents).map_err(|source| ManifestError::Parse {
    manifest: RELEASE_MANIFEST,
    path: tarball.to_path_buf(),
    source,
  })?;

  let compiled_stemcell = match manifest.compiled_packages.first() {
    Some(package) => match package.stemcell.split_once('/') {
      Some((os, version)) if !os.is_empty() && !version.is_empty() && !version.contains('/') => Some(CompiledStemcell {
        os: os.to_string(),
        version: version.to_string(),
      }),
      _ => {
        return Err(ManifestError::CompiledStemcell {
          path: tarball.to_path_buf(),
          value: package.stemcell.clone(),
        });
      }
    },
    None => None,
  };

  let sha256 = hash_file(tarball)?;
  debug!(release = %manifest.name, version = %manifest.version, %sha256, "read release manifest");

  Ok(Release {
    name: manifest.name,
    version: manifest.version,
    file: file_name(tarball),
    sha256: sha256.0,
    compiled_stemcell,
  })
}
