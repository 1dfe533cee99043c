//! tilebake-lib: build product tiles from metadata, releases and fragments
//!
//! The pieces, in pipeline order:
//! - `fragments`: read directories of YAML fragments
//! - `manifest`: read release and stemcell manifests out of tarballs
//! - `metadata`: assemble the base metadata template
//! - `template` / `interpolate`: expand `$( helper ... )` calls
//! - `content_migration`: merge content migration fragments
//! - `tile`: write the zip archive
//! - `bake`: drive all of the above from one configuration

pub mod bake;
pub mod consts;
pub mod content_migration;
pub mod fragments;
pub mod interpolate;
pub mod manifest;
pub mod metadata;
pub mod template;
pub mod tile;
pub mod util;
