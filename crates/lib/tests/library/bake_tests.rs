use serde_yaml::Value;
use tilebake_lib::bake::{BakeConfig, BakeError, BakeOutcome, bake};
use tilebake_lib::interpolate::InterpolateError;
use tilebake_lib::manifest::ManifestError;
use tilebake_lib::util::hash::hash_file;

use super::common::{Workspace, entry_names, entry_text};

const METADATA: &str = r#"---
name: $( variable "product-name" )
product_version: $( version )
stemcell_criteria: $( stemcell )
releases:
- $( release "diego" )
- $( release "routing" )
form_types:
- $( form "config" )
job_types:
- $( instance_group "router" )
"#;

fn standard_workspace() -> Workspace {
  let ws = Workspace::new();
  ws.write("metadata.yml", METADATA);
  ws.write("variables.yml", "product-name: from-file\n");
  ws.release("releases/diego-2.0.0.tgz", "diego", "2.0.0");
  ws.release("releases/routing-0.9.tar.gz", "routing", "0.9");
  ws.write("releases/README.md", "not a release");
  ws.stemcell("stemcell.tgz", "ubuntu-jammy", "1.90");
  ws.write("forms/config.yml", "forms:\n- name: config\n  label: Config\n");
  ws.write(
    "instance_groups/router.yml",
    "job_types:\n- name: router\n  label: Router\n  templates:\n  - $( job \"gorouter\" )\n",
  );
  ws.write("jobs/gorouter.yml", "job_types:\n- name: gorouter\n  release: routing\n");
  ws
}

fn standard_config(ws: &Workspace) -> BakeConfig {
  BakeConfig {
    metadata: ws.path("metadata.yml"),
    output_file: Some(ws.path("out/product.pivotal")),
    version: Some("1.2.3".to_string()),
    releases_directories: vec![ws.path("releases")],
    stemcell_tarballs: vec![ws.path("stemcell.tgz")],
    variables_files: vec![ws.path("variables.yml")],
    variables: vec!["product-name=my-product".to_string()],
    forms_directories: vec![ws.path("forms")],
    instance_groups_directories: vec![ws.path("instance_groups")],
    jobs_directories: vec![ws.path("jobs")],
    ..Default::default()
  }
}

// =============================================================================
// Full tiles
// =============================================================================

#[test]
fn bakes_tile_with_sorted_entries() {
  let ws = standard_workspace();
  let config = standard_config(&ws);

  let outcome = bake(&config).unwrap();
  let BakeOutcome::Tile { product_name, report } = outcome else {
    panic!("expected a tile");
  };

  let tile = ws.path("out/product.pivotal");
  assert_eq!(product_name, "my-product");
  assert_eq!(report.output_file, tile);
  assert_eq!(report.entries, 4);
  assert_eq!(report.checksum, hash_file(&tile).unwrap());
  assert_eq!(report.checksum_file, None);

  assert_eq!(
    entry_names(&tile),
    vec![
      "metadata/my-product.yml",
      "migrations/v1/",
      "releases/diego-2.0.0.tgz",
      "releases/routing-0.9.tar.gz",
    ]
  );
}

#[test]
fn metadata_is_fully_interpolated() {
  let ws = standard_workspace();
  let tile = ws.path("out/product.pivotal");
  bake(&standard_config(&ws)).unwrap();

  let metadata: Value = serde_yaml::from_str(&entry_text(&tile, "metadata/my-product.yml")).unwrap();

  assert_eq!(metadata["name"], Value::from("my-product"));
  assert_eq!(metadata["product_version"], Value::from("1.2.3"));
  assert_eq!(metadata["stemcell_criteria"]["os"], Value::from("ubuntu-jammy"));
  assert_eq!(metadata["stemcell_criteria"]["version"], Value::from("1.90"));

  assert_eq!(metadata["releases"][0]["name"], Value::from("diego"));
  assert_eq!(metadata["releases"][0]["file"], Value::from("diego-2.0.0.tgz"));
  assert_eq!(metadata["releases"][1]["version"], Value::from("0.9"));

  assert_eq!(metadata["form_types"][0]["label"], Value::from("Config"));

  let router = &metadata["job_types"][0];
  assert_eq!(router["label"], Value::from("Router"));
  assert_eq!(router["templates"][0]["release"], Value::from("routing"));
}

#[test]
fn identical_inputs_give_identical_tiles() {
  let ws = standard_workspace();
  let mut config = standard_config(&ws);

  config.output_file = Some(ws.path("one.pivotal"));
  let first = bake(&config).unwrap();
  config.output_file = Some(ws.path("two.pivotal"));
  let second = bake(&config).unwrap();

  let checksum = |outcome: BakeOutcome| match outcome {
    BakeOutcome::Tile { report, .. } => report.checksum,
    other => panic!("expected a tile, got {other:?}"),
  };
  assert_eq!(checksum(first), checksum(second));
}

#[test]
fn stubbed_releases_migrations_and_checksum_file() {
  let ws = standard_workspace();
  ws.write("migrations/201801010000_first.js", "exports.migrate = function(p) { return p; };\n");
  ws.write("migrations/201802020000_second.js", "exports.migrate = function(p) { return p; };\n");
  ws.write("embed/scripts/bin/run.sh", "#!/bin/sh\n");

  let mut config = standard_config(&ws);
  config.stub_releases = true;
  config.checksum_file = true;
  config.migrations = vec![ws.path("migrations")];
  config.embed_paths = vec![ws.path("embed/scripts")];

  let BakeOutcome::Tile { report, .. } = bake(&config).unwrap() else {
    panic!("expected a tile");
  };

  let tile = ws.path("out/product.pivotal");
  assert_eq!(
    entry_names(&tile),
    vec![
      "embed/scripts/bin/run.sh",
      "metadata/my-product.yml",
      "migrations/v1/201801010000_first.js",
      "migrations/v1/201802020000_second.js",
      "releases/diego-2.0.0.tgz",
      "releases/routing-0.9.tar.gz",
    ]
  );
  assert_eq!(entry_text(&tile, "releases/diego-2.0.0.tgz"), "");

  let sidecar = ws.path("out/product.pivotal.sha256");
  assert_eq!(report.checksum_file.as_deref(), Some(sidecar.as_path()));
  assert_eq!(std::fs::read_to_string(sidecar).unwrap(), report.checksum.0);
}

#[test]
fn content_migrations_are_merged_with_version() {
  let ws = standard_workspace();
  ws.write(
    "content_migrations/base.yml",
    "product: my-product\ninstallation_schema_version: \"1.6\"\nto_version: \"1.0.0.0$PRERELEASE_VERSION$\"\nmigrations: []\n",
  );
  ws.write(
    "content_migrations/from-1.yml",
    "from_version: 1.0.0\nrules:\n- type: update\n  selector: product_version\n  to: \"1.0.0.0$PRERELEASE_VERSION$\"\n",
  );

  let mut config = standard_config(&ws);
  config.base_content_migration = Some(ws.path("content_migrations/base.yml"));
  config.content_migrations = vec![ws.path("content_migrations/from-1.yml")];

  bake(&config).unwrap();

  let tile = ws.path("out/product.pivotal");
  assert_eq!(entry_names(&tile)[0], "content_migrations/migrations.yml");

  let text = entry_text(&tile, "content_migrations/migrations.yml");
  assert!(!text.contains("$PRERELEASE_VERSION$"));

  let migrations: Value = serde_yaml::from_str(&text).unwrap();
  assert_eq!(migrations["to_version"], Value::from("1.2.3"));
  assert_eq!(migrations["migrations"][0]["rules"][0]["to"], Value::from("1.2.3"));
}

// =============================================================================
// Metadata only
// =============================================================================

#[test]
fn metadata_only_writes_nothing() {
  let ws = standard_workspace();
  let mut config = standard_config(&ws);
  config.output_file = None;
  config.metadata_only = true;

  let BakeOutcome::Metadata(metadata) = bake(&config).unwrap() else {
    panic!("expected metadata");
  };

  assert!(metadata.starts_with("name: my-product\n"));
  assert!(!ws.path("out").exists());
}

// =============================================================================
// Failures
// =============================================================================

#[test]
fn missing_variable_is_reported() {
  let ws = standard_workspace();
  let mut config = standard_config(&ws);
  config.variables_files.clear();
  config.variables.clear();

  let err = bake(&config).unwrap_err();
  assert!(matches!(err, BakeError::Interpolate(InterpolateError::Lookup(_))));
  assert_eq!(err.to_string(), "could not find variable with key 'product-name'");
  assert!(!ws.path("out/product.pivotal").exists());
}

#[test]
fn stemcell_required_when_referenced() {
  let ws = standard_workspace();
  let mut config = standard_config(&ws);
  config.stemcell_tarballs.clear();

  let err = bake(&config).unwrap_err();
  assert_eq!(err.to_string(), "stemcell-tarball must be specified");
}

#[test]
fn release_without_manifest() {
  let ws = standard_workspace();
  ws.tarball("releases/broken.tgz", "README", "nothing to see");

  let err = bake(&standard_config(&ws)).unwrap_err();
  assert!(matches!(err, BakeError::Manifest(ManifestError::NotFound { manifest: "release.MF", .. })));
}

#[test]
fn invalid_combination_fails_before_reading_inputs() {
  let mut config = BakeConfig {
    metadata: "does-not-exist.yml".into(),
    output_file: Some("tile.pivotal".into()),
    ..Default::default()
  };
  config.jobs_directories = vec!["jobs".into()];

  let err = bake(&config).unwrap_err();
  assert_eq!(
    err.to_string(),
    "--jobs-directory flag requires --instance-groups-directory to also be specified"
  );
}
