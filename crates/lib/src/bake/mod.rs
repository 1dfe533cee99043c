//! The bake pipeline: inputs in, tile out.
//!
//! [`bake`] reads every input named by a [`BakeConfig`], builds and
//! interpolates the metadata template, and hands the result to the
//! [`TileWriter`]. In metadata-only mode it stops after interpolation.

pub mod variables;

use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

use serde_yaml::Value;
use thiserror::Error;
use tracing::{info, warn};

use crate::consts::TARBALL_SUFFIXES;
use crate::fragments::{DirectoryReader, FragmentError};
use crate::interpolate::{InterpolateError, InterpolateInput, Interpolator};
use crate::manifest::{ManifestError, Release, Stemcell, read_release, read_stemcell};
use crate::metadata::{self, MetadataError, MetadataSources};
use crate::tile::{TileError, TileWriter, WriteConfig, WriteReport};

pub use variables::VariablesError;

#[derive(Debug, Error)]
pub enum BakeError {
  #[error("--jobs-directory flag requires --instance-groups-directory to also be specified")]
  JobsWithoutInstanceGroups,

  #[error("cannot build a tile with content migrations and migrations")]
  MigrationsAndContentMigrations,

  #[error("base content migration is required when content migrations are provided")]
  ContentMigrationsWithoutBase,

  #[error("cannot build a tile with a base content migration and migrations")]
  BaseContentMigrationWithMigrations,

  #[error("--output-file is required unless only metadata is requested")]
  MissingOutputFile,

  #[error(transparent)]
  Variables(#[from] VariablesError),

  #[error("failed to list releases directory {}", path.display())]
  ReleasesDirectory {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error(transparent)]
  Manifest(#[from] ManifestError),

  #[error("failed to read {key} from {}", dir.display())]
  Fragments {
    key: &'static str,
    dir: PathBuf,
    #[source]
    source: FragmentError,
  },

  #[error(transparent)]
  Metadata(#[from] MetadataError),

  #[error(transparent)]
  Interpolate(#[from] InterpolateError),

  #[error(transparent)]
  Tile(#[from] TileError),
}

/// All inputs of one bake.
#[derive(Debug, Clone, Default)]
pub struct BakeConfig {
  pub metadata: PathBuf,
  pub output_file: Option<PathBuf>,
  pub version: Option<String>,
  pub icon: Option<PathBuf>,

  pub release_tarballs: Vec<PathBuf>,
  pub releases_directories: Vec<PathBuf>,
  pub stemcell_tarballs: Vec<PathBuf>,

  pub variables_files: Vec<PathBuf>,
  /// `key=value` pairs, applied after the variable files.
  pub variables: Vec<String>,

  pub bosh_variables_directories: Vec<PathBuf>,
  pub properties_directories: Vec<PathBuf>,
  pub runtime_configs_directories: Vec<PathBuf>,
  pub forms_directories: Vec<PathBuf>,
  pub instance_groups_directories: Vec<PathBuf>,
  pub jobs_directories: Vec<PathBuf>,

  pub migrations: Vec<PathBuf>,
  pub content_migrations: Vec<PathBuf>,
  pub base_content_migration: Option<PathBuf>,
  pub embed_paths: Vec<PathBuf>,

  pub stub_releases: bool,
  pub checksum_file: bool,
  pub metadata_only: bool,
}

impl BakeConfig {
  /// Reject flag combinations that cannot produce a tile.
  pub fn validate(&self) -> Result<(), BakeError> {
    if !self.jobs_directories.is_empty() && self.instance_groups_directories.is_empty() {
      return Err(BakeError::JobsWithoutInstanceGroups);
    }
    if !self.migrations.is_empty() && !self.content_migrations.is_empty() {
      return Err(BakeError::MigrationsAndContentMigrations);
    }
    if !self.content_migrations.is_empty() && self.base_content_migration.is_none() {
      return Err(BakeError::ContentMigrationsWithoutBase);
    }
    if self.base_content_migration.is_some() && !self.migrations.is_empty() {
      return Err(BakeError::BaseContentMigrationWithMigrations);
    }
    if !self.metadata_only && self.output_file.is_none() {
      return Err(BakeError::MissingOutputFile);
    }
    Ok(())
  }

  /// Explicit release tarballs followed by the tarballs found in each releases directory.
  pub fn release_files(&self) -> Result<Vec<PathBuf>, BakeError> {
    let mut files = self.release_tarballs.clone();

    for dir in &self.releases_directories {
      let listing = fs::read_dir(dir).map_err(|source| BakeError::ReleasesDirectory {
        path: dir.clone(),
        source,
      })?;

      let mut found = Vec::new();
      for entry in listing {
        let entry = entry.map_err(|source| BakeError::ReleasesDirectory {
          path: dir.clone(),
          source,
        })?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if TARBALL_SUFFIXES.iter().any(|suffix| name.ends_with(suffix)) && entry.path().is_file() {
          found.push(entry.path());
        }
      }
      found.sort();
      files.extend(found);
    }

    Ok(files)
  }
}

/// What a bake produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BakeOutcome {
  /// Metadata-only mode: the interpolated metadata document.
  Metadata(String),
  /// A tile was written.
  Tile { product_name: String, report: WriteReport },
}

/// Run the whole pipeline for one configuration.
pub fn bake(config: &BakeConfig) -> Result<BakeOutcome, BakeError> {
  config.validate()?;

  let variables = variables::collect(&config.variables_files, &config.variables)?;

  let release_files = config.release_files()?;
  info!(count = release_files.len(), "reading release manifests");
  let mut releases: BTreeMap<String, Release> = BTreeMap::new();
  for file in &release_files {
    let release = read_release(file)?;
    if let Some(previous) = releases.insert(release.name.clone(), release) {
      warn!(release = %previous.name, file = %previous.file, "release supplied more than once, keeping the later tarball");
    }
  }

  let mut stemcells = Vec::with_capacity(config.stemcell_tarballs.len());
  if !config.stemcell_tarballs.is_empty() {
    info!(count = config.stemcell_tarballs.len(), "reading stemcell manifests");
  }
  for tarball in &config.stemcell_tarballs {
    stemcells.push(read_stemcell(tarball)?);
  }
  warn_stemcell_mismatches(&releases, &stemcells);

  let forms = read_lookup("forms", &config.forms_directories)?;
  let instance_groups = read_lookup("job_types", &config.instance_groups_directories)?;
  let jobs = read_lookup("job_types", &config.jobs_directories)?;

  let generated = metadata::build(&MetadataSources {
    metadata: config.metadata.clone(),
    icon: config.icon.clone(),
    bosh_variable_dirs: config.bosh_variables_directories.clone(),
    property_dirs: config.properties_directories.clone(),
    runtime_config_dirs: config.runtime_configs_directories.clone(),
  })?;
  let template = generated.to_template()?;

  let input = InterpolateInput {
    variables,
    releases,
    stemcells,
    forms,
    instance_groups,
    jobs,
    icon_image: generated.icon_image.clone(),
    version: config.version.clone(),
  };

  info!("interpolating metadata");
  let interpolated = Interpolator::new(&input).interpolate(template.as_bytes())?;

  if config.metadata_only {
    return Ok(BakeOutcome::Metadata(interpolated));
  }

  let output_file = config.output_file.clone().ok_or(BakeError::MissingOutputFile)?;
  let product_name = interpolated_name(&interpolated).unwrap_or(generated.name);

  let write = WriteConfig {
    output_file,
    product_name: product_name.clone(),
    version: config.version.clone(),
    release_files,
    migration_files: config.migrations.clone(),
    content_migration_files: config.content_migrations.clone(),
    base_content_migration: config.base_content_migration.clone(),
    embed_paths: config.embed_paths.clone(),
    stub_releases: config.stub_releases,
    checksum_file: config.checksum_file,
  };

  let report = TileWriter::new()?.write(interpolated.as_bytes(), &write)?;
  Ok(BakeOutcome::Tile { product_name, report })
}

/// Read name-keyed parts from every directory. Later names replace earlier ones.
fn read_lookup(key: &'static str, dirs: &[PathBuf]) -> Result<BTreeMap<String, Value>, BakeError> {
  let reader = DirectoryReader::new(key);
  let mut table = BTreeMap::new();

  for dir in dirs {
    info!(key, dir = %dir.display(), "reading lookup directory");
    let parts = reader.read_parts(dir).map_err(|source| BakeError::Fragments {
      key,
      dir: dir.clone(),
      source,
    })?;
    for part in parts {
      table.insert(part.name, part.metadata);
    }
  }

  Ok(table)
}

/// Warn about compiled releases whose stemcell is not among the supplied ones.
///
/// Returns how many releases were flagged. Nothing is checked without stemcells.
fn warn_stemcell_mismatches(releases: &BTreeMap<String, Release>, stemcells: &[Stemcell]) -> usize {
  if stemcells.is_empty() {
    return 0;
  }

  let mut mismatches = 0;
  for release in releases.values() {
    let Some(compiled) = &release.compiled_stemcell else {
      continue;
    };
    if stemcells.iter().any(|s| s.os == compiled.os && s.version == compiled.version) {
      continue;
    }
    warn!(
      release = %release.name,
      os = %compiled.os,
      version = %compiled.version,
      "release was compiled against a stemcell that was not supplied"
    );
    mismatches += 1;
  }
  mismatches
}

/// The product name after interpolation, when it is a string.
fn interpolated_name(metadata: &str) -> Option<String> {
  let document: Value = serde_yaml::from_str(metadata).ok()?;
  document.get("name")?.as_str().map(str::to_string)
}
