//! Tile assembly.
//!
//! A tile is a zip archive laid out as:
//!
//! ```text
//! content_migrations/migrations.yml   (optional)
//! embed/<embed dir name>/<relative path>
//! metadata/<product name>.yml
//! migrations/v1/<migration file>       (or an empty migrations/v1/ folder)
//! releases/<release tarball>
//! ```
//!
//! The [`TileWriter`] first plans every entry into an [`EntrySet`], which
//! rejects duplicate paths and orders entries by path, then streams them into
//! an [`ArchiveWriter`]. After the archive is closed its SHA-256 is computed
//! and optionally written next to it as `<tile>.sha256`.

mod archive;
mod entries;

use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::consts::{CHECKSUM_EXTENSION, CONTENT_MIGRATIONS_PATH, EMBED_DIR, METADATA_DIR, MIGRATIONS_DIR, RELEASES_DIR};
use crate::content_migration::{ContentMigrationBuilder, ContentMigrationError};
use crate::util::hash::{ContentHash, HashError, hash_file};

pub use archive::{ArchiveError, ArchiveWriter, ZipArchiveWriter};
pub use entries::{EntrySet, Source};

#[derive(Debug, Error)]
pub enum TileError {
  #[error("two sources map to the archive path '{path}'")]
  DuplicateEntry { path: String },

  #[error("content migrations require a base content migration")]
  MissingBaseContentMigration,

  #[error("a version is required to build content migrations")]
  MissingVersion,

  #[error("failed to walk {}", path.display())]
  Walk {
    path: PathBuf,
    #[source]
    source: walkdir::Error,
  },

  #[error("failed to read {}", path.display())]
  Read {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("failed to create {}", path.display())]
  Create {
    path: PathBuf,
    #[source]
    source: ArchiveError,
  },

  #[error("failed to add {entry} to the tile")]
  Add {
    entry: String,
    #[source]
    source: ArchiveError,
  },

  #[error("failed to close {}", path.display())]
  Close {
    path: PathBuf,
    #[source]
    source: ArchiveError,
  },

  #[error(transparent)]
  ContentMigration(#[from] ContentMigrationError),

  #[error("failed to checksum {}", path.display())]
  Checksum {
    path: PathBuf,
    #[source]
    source: HashError,
  },

  #[error("failed to write checksum file {}", path.display())]
  ChecksumFile {
    path: PathBuf,
    #[source]
    source: io::Error,
  },
}

/// Everything one tile write needs.
#[derive(Debug, Clone, Default)]
pub struct WriteConfig {
  pub output_file: PathBuf,
  pub product_name: String,
  pub version: Option<String>,
  pub release_files: Vec<PathBuf>,
  /// Migration files, or directories whose files are all migrations.
  pub migration_files: Vec<PathBuf>,
  pub content_migration_files: Vec<PathBuf>,
  pub base_content_migration: Option<PathBuf>,
  pub embed_paths: Vec<PathBuf>,
  /// Write releases as zero-length entries.
  pub stub_releases: bool,
  /// Write `<output_file>.sha256` next to the tile.
  pub checksum_file: bool,
}

/// Outcome of a tile write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteReport {
  pub output_file: PathBuf,
  pub entries: usize,
  pub bytes: u64,
  pub checksum: ContentHash,
  pub checksum_file: Option<PathBuf>,
}

pub struct TileWriter {
  content_migrations: ContentMigrationBuilder,
}

impl TileWriter {
  pub fn new() -> Result<Self, TileError> {
    Ok(Self {
      content_migrations: ContentMigrationBuilder::new()?,
    })
  }

  /// Decide every archive entry for `config`.
  pub fn plan(&self, metadata: &[u8], config: &WriteConfig) -> Result<EntrySet, TileError> {
    let mut entries = EntrySet::new();

    entries.insert(
      format!("{METADATA_DIR}/{}.yml", config.product_name),
      Source::Bytes(metadata.to_vec()),
    )?;

    let mut found_migration = false;
    for migrations in &config.migration_files {
      for (path, _) in walk_files(migrations)? {
        entries.insert(
          format!("{MIGRATIONS_DIR}/{}", base_name(&path)),
          Source::File(path),
        )?;
        found_migration = true;
      }
    }
    if !found_migration {
      entries.insert(MIGRATIONS_DIR.to_string(), Source::Folder)?;
    }

    for release in &config.release_files {
      let source = if config.stub_releases {
        Source::Empty
      } else {
        Source::File(release.clone())
      };
      entries.insert(format!("{RELEASES_DIR}/{}", base_name(release)), source)?;
    }

    if !config.content_migration_files.is_empty() {
      let base = config
        .base_content_migration
        .as_deref()
        .ok_or(TileError::MissingBaseContentMigration)?;
      let version = config.version.as_deref().ok_or(TileError::MissingVersion)?;
      let contents = self
        .content_migrations
        .build(base, version, &config.content_migration_files)?;
      entries.insert(CONTENT_MIGRATIONS_PATH.to_string(), Source::Bytes(contents.into_bytes()))?;
    }

    for embed in &config.embed_paths {
      let embed_name = base_name(embed);
      for (path, mode) in walk_files(embed)? {
        let relative = relative_archive_path(embed, &path);
        entries.insert(embed_entry(&embed_name, &relative), Source::FileWithMode { path, mode })?;
      }
    }

    Ok(entries)
  }

  /// Write the tile to `config.output_file` as a zip archive.
  ///
  /// On failure the partially written archive is left on disk.
  pub fn write(&self, metadata: &[u8], config: &WriteConfig) -> Result<WriteReport, TileError> {
    info!(output = %config.output_file.display(), "building tile");

    let entries = self.plan(metadata, config)?;
    let mut archive = ZipArchiveWriter::create(&config.output_file).map_err(|source| TileError::Create {
      path: config.output_file.clone(),
      source,
    })?;
    self.write_entries(&entries, &mut archive)?;
    archive.close().map_err(|source| TileError::Close {
      path: config.output_file.clone(),
      source,
    })?;

    info!(output = %config.output_file.display(), "calculating sha256 checksum");
    let checksum = hash_file(&config.output_file).map_err(|source| TileError::Checksum {
      path: config.output_file.clone(),
      source,
    })?;
    info!(%checksum, "calculated checksum");

    let bytes = fs::metadata(&config.output_file)
      .map(|m| m.len())
      .map_err(|source| TileError::Read {
        path: config.output_file.clone(),
        source,
      })?;

    let checksum_file = if config.checksum_file {
      let path = checksum_path(&config.output_file);
      fs::write(&path, checksum.0.as_bytes()).map_err(|source| TileError::ChecksumFile {
        path: path.clone(),
        source,
      })?;
      debug!(path = %path.display(), "wrote checksum file");
      Some(path)
    } else {
      None
    };

    Ok(WriteReport {
      output_file: config.output_file.clone(),
      entries: entries.len(),
      bytes,
      checksum,
      checksum_file,
    })
  }

  /// Stream planned entries into `archive` in path order. Does not close it.
  pub fn write_entries(&self, entries: &EntrySet, archive: &mut dyn ArchiveWriter) -> Result<(), TileError> {
    for (entry, source) in entries.iter() {
      info!(%entry, "adding to tile");
      let add_err = |source| TileError::Add {
        entry: entry.to_string(),
        source,
      };

      match source {
        Source::Folder => archive.create_folder(entry).map_err(add_err)?,
        Source::Empty => archive.add(entry, &mut io::empty()).map_err(add_err)?,
        Source::Bytes(bytes) => archive.add(entry, &mut bytes.as_slice()).map_err(add_err)?,
        Source::File(path) => {
          let mut file = open(path)?;
          archive.add(entry, &mut file).map_err(add_err)?;
        }
        Source::FileWithMode { path, mode } => {
          let mut file = open(path)?;
          archive.add_with_mode(entry, &mut file, *mode).map_err(add_err)?;
        }
      }
    }
    Ok(())
  }
}

/// `<tile>.sha256` next to the tile.
pub fn checksum_path(output_file: &Path) -> PathBuf {
  let mut path = OsString::from(output_file.as_os_str());
  path.push(".");
  path.push(CHECKSUM_EXTENSION);
  PathBuf::from(path)
}

fn open(path: &Path) -> Result<impl Read, TileError> {
  File::open(path).map_err(|source| TileError::Read {
    path: path.to_path_buf(),
    source,
  })
}

/// Every regular file under `root` (or `root` itself) with its permission bits.
fn walk_files(root: &Path) -> Result<Vec<(PathBuf, u32)>, TileError> {
  let mut files = Vec::new();

  for entry in WalkDir::new(root).follow_links(true).sort_by_file_name() {
    let entry = entry.map_err(|source| TileError::Walk {
      path: root.to_path_buf(),
      source,
    })?;
    if !entry.file_type().is_file() {
      continue;
    }

    let metadata = entry.metadata().map_err(|source| TileError::Walk {
      path: root.to_path_buf(),
      source,
    })?;
    files.push((entry.into_path(), file_mode(&metadata)));
  }

  Ok(files)
}

#[cfg(unix)]
fn file_mode(metadata: &fs::Metadata) -> u32 {
  use std::os::unix::fs::PermissionsExt;
  metadata.permissions().mode()
}

#[cfg(not(unix))]
fn file_mode(metadata: &fs::Metadata) -> u32 {
  if metadata.permissions().readonly() { 0o444 } else { 0o644 }
}

fn base_name(path: &Path) -> String {
  path
    .file_name()
    .map(|n| n.to_string_lossy().into_owned())
    .unwrap_or_default()
}

/// `path` relative to `root`, joined with forward slashes.
fn relative_archive_path(root: &Path, path: &Path) -> String {
  path
    .strip_prefix(root)
    .unwrap_or(path)
    .components()
    .map(|c| c.as_os_str().to_string_lossy())
    .collect::<Vec<_>>()
    .join("/")
}

/// `embed/<name>/<relative>`, skipping empty parts (`.` as an embed root has no name).
fn embed_entry(embed_name: &str, relative: &str) -> String {
  [EMBED_DIR, embed_name, relative]
    .into_iter()
    .filter(|part| !part.is_empty())
    .collect::<Vec<_>>()
    .join("/")
}
