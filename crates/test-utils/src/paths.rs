//! Path utilities for locating scenario files and creating scratch output.

use std::path::PathBuf;

/// Returns the workspace root directory.
///
/// This is determined by walking up from the current crate's manifest directory
/// until we find the workspace Cargo.toml.
pub fn workspace_root() -> PathBuf {
    // Start from the test-utils crate manifest dir
    let manifest_dir = env!("CARGO_MANIFEST_DIR");
    PathBuf::from(manifest_dir)
        .parent() // crates/
        .and_then(|p| p.parent()) // workspace root
        .map(|p| p.to_path_buf())
        .unwrap_or_else(|| PathBuf::from(manifest_dir))
}

/// Returns the directory holding the bundled scenario YAML files.
pub fn scenarios_dir() -> PathBuf {
    workspace_root()
        .join("validation")
        .join("bbox-load")
        .join("scenarios")
}

/// Returns the path to a bundled scenario file, if it exists.
///
/// # Arguments
///
/// * `name` - The scenario filename (e.g., "featureserver.yaml")
pub fn find_scenario(name: &str) -> Option<PathBuf> {
    let path = scenarios_dir().join(name);
    if path.exists() {
        Some(path)
    } else {
        None
    }
}

/// Creates a temporary directory for test output.
///
/// The directory is automatically cleaned up when the returned `TempDir` is dropped.
pub fn temp_test_dir() -> tempfile::TempDir {
    tempfile::tempdir().expect("Failed to create temporary test directory")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_workspace_root_is_valid() {
        let root = workspace_root();
        // Should contain Cargo.toml at workspace level
        assert!(
            root.join("Cargo.toml").exists(),
            "Workspace root should contain Cargo.toml: {:?}",
            root
        );
    }

    #[test]
    fn test_scenarios_dir_layout() {
        let dir = scenarios_dir();
        assert!(dir.to_string_lossy().contains("bbox-load"));
        assert!(dir.ends_with("scenarios"));
    }

    #[test]
    fn test_find_missing_scenario() {
        assert!(find_scenario("does-not-exist.yaml").is_none());
    }

    #[test]
    fn test_temp_test_dir() {
        let dir = temp_test_dir();
        assert!(dir.path().exists());
    }
}
