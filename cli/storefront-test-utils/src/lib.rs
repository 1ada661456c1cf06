pub mod fixtures;
pub mod proptest;

use std::path::Path;

use tempfile::TempDir;

/// Create a temporary directory holding a `storefront.toml` with `contents`.
pub fn config_dir_with(contents: &str) -> TempDir {
    let dir = tempfile::tempdir().expect("should create temporary directory");
    write_config(dir.path(), contents);
    dir
}

pub fn write_config(dir: &Path, contents: &str) {
    std::fs::write(dir.join("storefront.toml"), contents).expect("should write config file");
}
