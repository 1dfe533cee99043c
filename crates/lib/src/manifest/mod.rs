//! Release and stemcell manifest readers.
//!
//! Both artifact kinds are gzip-compressed tarballs carrying a small YAML
//! manifest (`release.MF` or `stemcell.MF`) somewhere inside. The readers
//! locate that entry by file name, decode it, and return an immutable record
//! used by the interpolator and the tile writer.

mod release;
mod stemcell;

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;
use tar::Archive;
use thiserror::Error;

use crate::util::hash::HashError;

pub use release::{CompiledStemcell, Release, read_release};
pub use stemcell::{Stemcell, read_stemcell};

/// Errors that can occur while reading an artifact manifest.
#[derive(Debug, Error)]
pub enum ManifestError {
  #[error("error while reading {path:?}")]
  Io {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("could not find {manifest} in {path:?}")]
  NotFound { manifest: &'static str, path: PathBuf },

  #[error("invalid {manifest} in {path:?}")]
  Parse {
    manifest: &'static str,
    path: PathBuf,
    #[source]
    source: serde_yaml::Error,
  },

  #[error("invalid compiled package stemcell in {path:?} (expected 'os/version'): {value}")]
  CompiledStemcell { path: PathBuf, value: String },

  #[error(transparent)]
  Hash(#[from] HashError),
}

/// Read the contents of the first entry named `manifest` in a gzipped tarball.
fn read_tarball_entry(tarball: &Path, manifest: &'static str) -> Result<Vec<u8>, ManifestError> {
  let io_err = |source| ManifestError::Io {
    path: tarball.to_path_buf(),
    source,
  };

  let file = File::open(tarball).map_err(io_err)?;
  let decoder = GzDecoder::new(BufReader::new(file));
  let mut archive = Archive::new(decoder);

  for entry in archive.entries().map_err(io_err)? {
    let mut entry = entry.map_err(io_err)?;
    let matches = entry.path().map_err(io_err)?.file_name().is_some_and(|name| name == manifest);

    if matches {
      let mut contents = Vec::new();
      entry.read_to_end(&mut contents).map_err(io_err)?;
      return Ok(contents);
    }
  }

  Err(ManifestError::NotFound {
    manifest,
    path: tarball.to_path_buf(),
  })
}

/// Basename of a tarball path, used as the in-tile file name.
fn file_name(path: &Path) -> String {
  path
    .file_name()
    .map(|n| n.to_string_lossy().into_owned())
    .unwrap_or_default()
}
