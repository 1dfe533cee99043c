//! Shared helpers for building bake inputs on disk.

use std::fs::{self, File};
use std::io::Read;
use std::path::{Path, PathBuf};

use flate2::Compression;
use flate2::write::GzEncoder;
use tempfile::TempDir;
use zip::ZipArchive;

/// A temporary directory holding every input of one bake.
pub struct Workspace {
  pub temp: TempDir,
}

impl Workspace {
  pub fn new() -> Self {
    Self {
      temp: TempDir::new().unwrap(),
    }
  }

  pub fn path(&self, relative: &str) -> PathBuf {
    self.temp.path().join(relative)
  }

  /// Write a file relative to the workspace, creating parent directories.
  pub fn write(&self, relative: &str, contents: &str) -> PathBuf {
    let path = self.path(relative);
    if let Some(parent) = path.parent() {
      fs::create_dir_all(parent).unwrap();
    }
    fs::write(&path, contents).unwrap();
    path
  }

  /// Write a gzipped tarball with a single manifest entry.
  pub fn tarball(&self, relative: &str, manifest_name: &str, manifest: &str) -> PathBuf {
    let path = self.path(relative);
    if let Some(parent) = path.parent() {
      fs::create_dir_all(parent).unwrap();
    }

    let encoder = GzEncoder::new(File::create(&path).unwrap(), Compression::default());
    let mut builder = tar::Builder::new(encoder);
    let mut header = tar::Header::new_gnu();
    header.set_size(manifest.len() as u64);
    header.set_mode(0o644);
    header.set_cksum();
    builder
      .append_data(&mut header, format!("./{manifest_name}"), manifest.as_bytes())
      .unwrap();
    builder.into_inner().unwrap().finish().unwrap();
    path
  }

  pub fn release(&self, relative: &str, name: &str, version: &str) -> PathBuf {
    self.tarball(relative, "release.MF", &format!("name: {name}\nversion: \"{version}\"\n"))
  }

  pub fn stemcell(&self, relative: &str, os: &str, version: &str) -> PathBuf {
    self.tarball(
      relative,
      "stemcell.MF",
      &format!("operating_system: {os}\nversion: \"{version}\"\n"),
    )
  }
}

/// Entry names of a zip archive, in stored order.
pub fn entry_names(tile: &Path) -> Vec<String> {
  let mut zip = ZipArchive::new(File::open(tile).unwrap()).unwrap();
  (0..zip.len())
    .map(|i| zip.by_index(i).unwrap().name().to_string())
    .collect()
}

/// Contents of one entry, as text.
pub fn entry_text(tile: &Path, name: &str) -> String {
  let mut zip = ZipArchive::new(File::open(tile).unwrap()).unwrap();
  let mut contents = String::new();
  zip.by_name(name).unwrap().read_to_string(&mut contents).unwrap();
  contents
}
