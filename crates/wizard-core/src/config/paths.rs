//! Config path resolution helpers.

use std::path::{Path, PathBuf};

pub const CONFIG_FILE_NAME: &str = "wizard.toml";
pub const APP_DIR_NAME: &str = "premium-wizard";

/// First existing candidate wins: explicit path, project file, then the
/// user config dir. `None` means built-in defaults.
pub fn discover_config_path(
    explicit: Option<&Path>,
    project_root: &Path,
    global_dir: Option<&Path>,
) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }

    let project = project_root.join(CONFIG_FILE_NAME);
    if project.is_file() {
        return Some(project);
    }

    global_dir
        .map(|dir| dir.join(CONFIG_FILE_NAME))
        .filter(|path| path.is_file())
}

/// `<config_dir>/premium-wizard`
pub fn global_config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(APP_DIR_NAME))
}

/// `<data_dir>/premium-wizard`
pub fn default_state_dir() -> Option<PathBuf> {
    dirs::data_dir().map(|dir| dir.join(APP_DIR_NAME))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_explicit_path_wins() {
        let project = TempDir::new().unwrap();
        std::fs::write(project.path().join(CONFIG_FILE_NAME), "").unwrap();

        let explicit = Path::new("/somewhere/else.toml");
        let found = discover_config_path(Some(explicit), project.path(), None);
        assert_eq!(found, Some(explicit.to_path_buf()));
    }

    #[test]
    fn test_project_file_before_global() {
        let project = TempDir::new().unwrap();
        let global = TempDir::new().unwrap();
        std::fs::write(project.path().join(CONFIG_FILE_NAME), "").unwrap();
        std::fs::write(global.path().join(CONFIG_FILE_NAME), "").unwrap();

        let found = discover_config_path(None, project.path(), Some(global.path()));
        assert_eq!(found, Some(project.path().join(CONFIG_FILE_NAME)));
    }

    #[test]
    fn test_global_file_used_when_project_missing() {
        let project = TempDir::new().unwrap();
        let global = TempDir::new().unwrap();
        std::fs::write(global.path().join(CONFIG_FILE_NAME), "").unwrap();

        let found = discover_config_path(None, project.path(), Some(global.path()));
        assert_eq!(found, Some(global.path().join(CONFIG_FILE_NAME)));
    }

    #[test]
    fn test_nothing_found() {
        let project = TempDir::new().unwrap();
        let global = TempDir::new().unwrap();
        assert_eq!(
            discover_config_path(None, project.path(), Some(global.path())),
            None
        );
    }
}
