use predicates::prelude::*;

use super::common::{TestEnv, entry_names, entry_text};

const METADATA: &str = r#"---
name: $( variable "product-name" )
product_version: $( version )
releases:
- $( release "diego" )
"#;

fn env_with_inputs() -> TestEnv {
  let env = TestEnv::new();
  env.write_file("metadata.yml", METADATA);
  env.write_release("releases/diego-2.0.0.tgz", "diego", "2.0.0");
  env
}

#[test]
fn bake_writes_tile_and_summary() {
  let env = env_with_inputs();

  env
    .tilebake_cmd()
    .args(["bake", "--metadata", "metadata.yml", "--output-file", "out/tile.pivotal"])
    .args(["--releases-directory", "releases", "--version", "1.2.3"])
    .args(["--variable", "product-name=my-product"])
    .assert()
    .success()
    .stdout(predicate::str::contains("Tile baked!"))
    .stdout(predicate::str::contains("my-product"))
    .stdout(predicate::str::contains("SHA-256"));

  let tile = env.path("out/tile.pivotal");
  assert_eq!(
    entry_names(&tile),
    vec!["metadata/my-product.yml", "migrations/v1/", "releases/diego-2.0.0.tgz"]
  );

  let metadata: serde_yaml::Value = serde_yaml::from_str(&entry_text(&tile, "metadata/my-product.yml")).unwrap();
  assert_eq!(metadata["product_version"], serde_yaml::Value::from("1.2.3"));
  assert_eq!(metadata["releases"][0]["name"], serde_yaml::Value::from("diego"));
}

#[test]
fn metadata_only_prints_to_stdout() {
  let env = env_with_inputs();

  env
    .tilebake_cmd()
    .args(["bake", "--metadata", "metadata.yml", "--metadata-only"])
    .args(["--release-tarball", "releases/diego-2.0.0.tgz", "--version", "1.2.3"])
    .args(["--variable", "product-name=my-product"])
    .assert()
    .success()
    .stdout(predicate::str::starts_with("name: my-product\n"))
    .stdout(predicate::str::contains("product_version: 1.2.3"))
    .stdout(predicate::str::contains("Tile baked!").not());

  assert!(!env.path("out").exists());
}

#[test]
fn output_file_and_version_from_environment() {
  let env = env_with_inputs();

  env
    .tilebake_cmd()
    .env("TILEBAKE_OUTPUT_FILE", "from-env.pivotal")
    .env("TILEBAKE_VERSION", "9.9.9")
    .args(["bake", "--metadata", "metadata.yml", "--checksum-file"])
    .args(["--releases-directory", "releases", "--variable", "product-name=p"])
    .assert()
    .success();

  let tile = env.path("from-env.pivotal");
  assert!(entry_text(&tile, "metadata/p.yml").contains("product_version: 9.9.9"));

  let checksum = std::fs::read_to_string(env.path("from-env.pivotal.sha256")).unwrap();
  assert_eq!(checksum.len(), 64);
}

#[test]
fn json_summary_is_valid() {
  let env = env_with_inputs();

  let assert = env
    .tilebake_cmd()
    .args(["bake", "--metadata", "metadata.yml", "--output-file", "tile.pivotal"])
    .args(["--releases-directory", "releases", "--version", "1.2.3"])
    .args(["--variable", "product-name=p", "--stub-releases", "-o", "json"])
    .assert()
    .success();

  let summary: serde_yaml::Value = serde_yaml::from_slice(&assert.get_output().stdout).unwrap();
  assert_eq!(summary["product"], serde_yaml::Value::from("p"));
  assert_eq!(summary["entries"], serde_yaml::Value::from(3));
  assert_eq!(summary["sha256"].as_str().map(str::len), Some(64));
  assert_eq!(entry_text(&env.path("tile.pivotal"), "releases/diego-2.0.0.tgz"), "");
}

#[test]
fn missing_variable_fails_with_lookup_error() {
  let env = env_with_inputs();

  env
    .tilebake_cmd()
    .args(["bake", "--metadata", "metadata.yml", "--output-file", "tile.pivotal"])
    .args(["--releases-directory", "releases", "--version", "1.2.3"])
    .assert()
    .failure()
    .stderr(predicate::str::contains("could not find variable with key 'product-name'"));

  assert!(!env.path("tile.pivotal").exists());
}

#[test]
fn missing_release_fails() {
  let env = TestEnv::new();
  env.write_file("metadata.yml", METADATA);

  env
    .tilebake_cmd()
    .args(["bake", "--metadata", "metadata.yml", "--metadata-only"])
    .args(["--version", "1.2.3", "--variable", "product-name=p"])
    .assert()
    .failure()
    .stderr(predicate::str::contains("could not find release with name 'diego'"));
}

#[test]
fn verbose_logs_to_stderr() {
  let env = env_with_inputs();

  env
    .tilebake_cmd()
    .args(["-v", "bake", "--metadata", "metadata.yml", "--metadata-only"])
    .args(["--releases-directory", "releases", "--version", "1.2.3"])
    .args(["--variable", "product-name=p"])
    .assert()
    .success()
    .stderr(predicate::str::contains("DEBUG"))
    .stdout(predicate::str::contains("DEBUG").not());
}

#[test]
fn resolved_configuration_is_logged_only_when_verbose() {
  let env = env_with_inputs();

  env
    .tilebake_cmd()
    .args(["-v", "bake", "--metadata", "metadata.yml", "--metadata-only"])
    .args(["--releases-directory", "releases", "--version", "1.2.3"])
    .args(["--variable", "product-name=p"])
    .assert()
    .success()
    .stderr(predicate::str::contains("resolved bake configuration"))
    .stderr(predicate::str::contains("metadata.yml"));

  env
    .tilebake_cmd()
    .args(["bake", "--metadata", "metadata.yml", "--metadata-only"])
    .args(["--releases-directory", "releases", "--version", "1.2.3"])
    .args(["--variable", "product-name=p"])
    .assert()
    .success()
    .stderr(predicate::str::contains("resolved bake configuration").not());
}
