//! End-to-end tests for the bake pipeline.

mod bake_tests;
mod common;
