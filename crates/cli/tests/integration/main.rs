//! Integration tests that run `tilebake bake` against inputs on disk.

mod bake_tests;
mod common;
