//! Archive writers.
//!
//! The tile writer decides what goes into a tile; an [`ArchiveWriter`] only
//! knows how to store entries. [`ZipArchiveWriter`] is the real container.

use std::fs::{self, File};
use std::io::{self, Read};
use std::path::Path;

use thiserror::Error;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, DateTime, ZipWriter};

#[derive(Debug, Error)]
pub enum ArchiveError {
  #[error("archive I/O failed")]
  Io(#[from] io::Error),

  #[error("zip error")]
  Zip(#[from] zip::result::ZipError),

  #[error("archive is already closed")]
  Closed,
}

/// Sink for archive entries, written in the order they are given.
pub trait ArchiveWriter {
  /// Add an empty directory entry.
  fn create_folder(&mut self, path: &str) -> Result<(), ArchiveError>;

  fn add(&mut self, path: &str, contents: &mut dyn Read) -> Result<(), ArchiveError>;

  /// Add a file entry carrying unix permission bits.
  fn add_with_mode(&mut self, path: &str, contents: &mut dyn Read, mode: u32) -> Result<(), ArchiveError>;

  /// Flush the central directory. No entries may be added afterwards.
  fn close(&mut self) -> Result<(), ArchiveError>;
}

/// Zip container with fixed timestamps, so identical input gives identical bytes.
pub struct ZipArchiveWriter {
  writer: Option<ZipWriter<File>>,
}

impl ZipArchiveWriter {
  /// Create (or truncate) the archive at `path`, creating parent directories.
  pub fn create(path: &Path) -> Result<Self, ArchiveError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
      fs::create_dir_all(parent)?;
    }
    let file = File::create(path)?;
    Ok(Self {
      writer: Some(ZipWriter::new(file)),
    })
  }

  fn writer(&mut self) -> Result<&mut ZipWriter<File>, ArchiveError> {
    self.writer.as_mut().ok_or(ArchiveError::Closed)
  }
}

fn file_options() -> SimpleFileOptions {
  SimpleFileOptions::default()
    .compression_method(CompressionMethod::Deflated)
    .last_modified_time(DateTime::default())
}

impl ArchiveWriter for ZipArchiveWriter {
  fn create_folder(&mut self, path: &str) -> Result<(), ArchiveError> {
    self.writer()?.add_directory(path, file_options())?;
    Ok(())
  }

  fn add(&mut self, path: &str, contents: &mut dyn Read) -> Result<(), ArchiveError> {
    let writer = self.writer()?;
    writer.start_file(path, file_options())?;
    io::copy(contents, writer)?;
    Ok(())
  }

  fn add_with_mode(&mut self, path: &str, contents: &mut dyn Read, mode: u32) -> Result<(), ArchiveError> {
    let writer = self.writer()?;
    writer.start_file(path, file_options().unix_permissions(mode & 0o7777))?;
    io::copy(contents, writer)?;
    Ok(())
  }

  fn close(&mut self) -> Result<(), ArchiveError> {
    match self.writer.take() {
      Some(writer) => {
        writer.finish()?;
        Ok(())
      }
      None => Err(ArchiveError::Closed),
    }
  }
}
