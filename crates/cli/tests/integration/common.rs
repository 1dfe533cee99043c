//! Shared test helpers for CLI integration tests.

use std::fs::{self, File};
use std::io::Read;
use std::path::{Path, PathBuf};

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use flate2::Compression;
use flate2::write::GzEncoder;
use tempfile::TempDir;
use zip::ZipArchive;

/// Isolated test environment.
///
/// Each test gets its own temporary directory; commands run inside it so
/// flags can use relative paths.
pub struct TestEnv {
  pub temp: TempDir,
}

impl TestEnv {
  pub fn new() -> Self {
    Self {
      temp: TempDir::new().unwrap(),
    }
  }

  pub fn path(&self, relative: &str) -> PathBuf {
    self.temp.path().join(relative)
  }

  /// Write a file relative to the temp directory.
  pub fn write_file(&self, relative_path: &str, content: &str) {
    let path = self.path(relative_path);
    if let Some(parent) = path.parent() {
      fs::create_dir_all(parent).unwrap();
    }
    fs::write(&path, content).unwrap();
  }

  /// Write a release tarball carrying a `release.MF`.
  pub fn write_release(&self, relative_path: &str, name: &str, version: &str) {
    let path = self.path(relative_path);
    if let Some(parent) = path.parent() {
      fs::create_dir_all(parent).unwrap();
    }

    let manifest = format!("name: {name}\nversion: \"{version}\"\n");
    let encoder = GzEncoder::new(File::create(&path).unwrap(), Compression::default());
    let mut builder = tar::Builder::new(encoder);
    let mut header = tar::Header::new_gnu();
    header.set_size(manifest.len() as u64);
    header.set_mode(0o644);
    header.set_cksum();
    builder
      .append_data(&mut header, "./release.MF", manifest.as_bytes())
      .unwrap();
    builder.into_inner().unwrap().finish().unwrap();
  }

  /// A `tilebake` command running in the temp directory with a clean environment.
  pub fn tilebake_cmd(&self) -> Command {
    let mut cmd = cargo_bin_cmd!("tilebake");
    cmd
      .current_dir(self.temp.path())
      .env_remove("TILEBAKE_OUTPUT_FILE")
      .env_remove("TILEBAKE_VERSION")
      .env_remove("RUST_LOG");
    cmd
  }
}

/// Entry names of a zip archive, in stored order.
pub fn entry_names(tile: &Path) -> Vec<String> {
  let mut zip = ZipArchive::new(File::open(tile).unwrap()).unwrap();
  (0..zip.len())
    .map(|i| zip.by_index(i).unwrap().name().to_string())
    .collect()
}

pub fn entry_text(tile: &Path, name: &str) -> String {
  let mut zip = ZipArchive::new(File::open(tile).unwrap()).unwrap();
  let mut contents = String::new();
  zip.by_name(name).unwrap().read_to_string(&mut contents).unwrap();
  contents
}
