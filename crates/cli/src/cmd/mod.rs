mod bake;

pub use bake::{BakeArgs, cmd_bake};
