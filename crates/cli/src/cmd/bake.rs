//! Implementation of the `tilebake bake` command.

use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;
use tracing::debug;

use tilebake_lib::bake::{BakeConfig, BakeOutcome, bake};

use crate::output::{OutputFormat, format_bytes, format_duration, print_json, print_stat, print_success};

#[derive(Debug, Args)]
pub struct BakeArgs {
  /// Base metadata template
  #[arg(long, value_name = "FILE")]
  metadata: PathBuf,

  /// Path of the tile to write (required unless --metadata-only)
  #[arg(long, value_name = "FILE", env = "TILEBAKE_OUTPUT_FILE")]
  output_file: Option<PathBuf>,

  /// Tile version, available to templates as `$( version )`
  #[arg(long, env = "TILEBAKE_VERSION")]
  version: Option<String>,

  /// Icon to embed in the metadata as base64
  #[arg(long, value_name = "FILE")]
  icon: Option<PathBuf>,

  /// Release tarball to include
  #[arg(long = "release-tarball", value_name = "FILE")]
  release_tarballs: Vec<PathBuf>,

  /// Directory whose top-level *.tgz and *.tar.gz files are releases
  #[arg(long = "releases-directory", value_name = "DIR")]
  releases_directories: Vec<PathBuf>,

  /// Stemcell tarball, available to templates as `$( stemcell )`
  #[arg(long = "stemcell-tarball", value_name = "FILE")]
  stemcell_tarballs: Vec<PathBuf>,

  /// YAML file of template variables
  #[arg(long = "variables-file", value_name = "FILE")]
  variables_files: Vec<PathBuf>,

  /// Template variable, applied after variable files
  #[arg(long = "variable", value_name = "KEY=VALUE")]
  variables: Vec<String>,

  #[arg(long = "bosh-variables-directory", value_name = "DIR")]
  bosh_variables_directories: Vec<PathBuf>,

  #[arg(long = "properties-directory", value_name = "DIR")]
  properties_directories: Vec<PathBuf>,

  #[arg(long = "runtime-configs-directory", value_name = "DIR")]
  runtime_configs_directories: Vec<PathBuf>,

  #[arg(long = "forms-directory", value_name = "DIR")]
  forms_directories: Vec<PathBuf>,

  #[arg(long = "instance-groups-directory", value_name = "DIR")]
  instance_groups_directories: Vec<PathBuf>,

  #[arg(long = "jobs-directory", value_name = "DIR")]
  jobs_directories: Vec<PathBuf>,

  /// Migration file, or a directory of migration files
  #[arg(long = "migration", value_name = "PATH")]
  migrations: Vec<PathBuf>,

  #[arg(long = "content-migration", value_name = "FILE")]
  content_migrations: Vec<PathBuf>,

  #[arg(long, value_name = "FILE")]
  base_content_migration: Option<PathBuf>,

  /// File or directory to embed under embed/
  #[arg(long = "embed", value_name = "PATH")]
  embed_paths: Vec<PathBuf>,

  /// Write releases as zero-length entries
  #[arg(long)]
  stub_releases: bool,

  /// Write <output-file>.sha256 next to the tile
  #[arg(long)]
  checksum_file: bool,

  /// Print the interpolated metadata instead of writing a tile
  #[arg(long)]
  metadata_only: bool,

  /// Summary format
  #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
  output: OutputFormat,
}

impl From<BakeArgs> for BakeConfig {
  fn from(args: BakeArgs) -> Self {
    BakeConfig {
      metadata: args.metadata,
      output_file: args.output_file,
      version: args.version,
      icon: args.icon,
      release_tarballs: args.release_tarballs,
      releases_directories: args.releases_directories,
      stemcell_tarballs: args.stemcell_tarballs,
      variables_files: args.variables_files,
      variables: args.variables,
      bosh_variables_directories: args.bosh_variables_directories,
      properties_directories: args.properties_directories,
      runtime_configs_directories: args.runtime_configs_directories,
      forms_directories: args.forms_directories,
      instance_groups_directories: args.instance_groups_directories,
      jobs_directories: args.jobs_directories,
      migrations: args.migrations,
      content_migrations: args.content_migrations,
      base_content_migration: args.base_content_migration,
      embed_paths: args.embed_paths,
      stub_releases: args.stub_releases,
      checksum_file: args.checksum_file,
      metadata_only: args.metadata_only,
    }
  }
}

#[derive(Serialize)]
struct BakeSummary {
  product: String,
  output_file: PathBuf,
  entries: usize,
  bytes: u64,
  sha256: String,
  checksum_file: Option<PathBuf>,
}

/// Execute the bake command.
///
/// With `--metadata-only` the interpolated metadata goes to stdout and nothing
/// is written. Otherwise prints a summary of the tile that was written.
pub fn cmd_bake(args: BakeArgs) -> Result<()> {
  let start = Instant::now();
  let output = args.output;

  let config = BakeConfig::from(args);
  debug!(
    metadata = %config.metadata.display(),
    output_file = ?config.output_file,
    release_tarballs = config.release_tarballs.len(),
    releases_directories = config.releases_directories.len(),
    stemcells = config.stemcell_tarballs.len(),
    metadata_only = config.metadata_only,
    "resolved bake configuration"
  );

  let outcome = bake(&config).context("Failed to bake tile")?;

  let (product, report) = match outcome {
    BakeOutcome::Metadata(metadata) => {
      print!("{metadata}");
      return Ok(());
    }
    BakeOutcome::Tile { product_name, report } => (product_name, report),
  };

  if output.is_json() {
    return print_json(&BakeSummary {
      product,
      output_file: report.output_file,
      entries: report.entries,
      bytes: report.bytes,
      sha256: report.checksum.0,
      checksum_file: report.checksum_file,
    });
  }

  println!();
  print_success("Tile baked!");
  print_stat("Product", &product);
  print_stat("Output", &report.output_file.display().to_string());
  print_stat("Entries", &report.entries.to_string());
  print_stat("Size", &format_bytes(report.bytes));
  print_stat("SHA-256", &report.checksum.to_string());
  if let Some(path) = &report.checksum_file {
    print_stat("Checksum file", &path.display().to_string());
  }
  print_stat("Duration", &format_duration(start.elapsed()));

  Ok(())
}
