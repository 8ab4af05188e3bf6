use std::path::PathBuf;

use directories::ProjectDirs;

const QUALIFIER: &str = "nl";
const ORGANIZATION: &str = "energiewijzer";
const APPLICATION: &str = "energiewijzer";

/// Directory holding the database and other local state.
///
/// Debug builds keep everything under `dev_assets/` in the working directory so
/// a development run never touches the user's real data.
pub fn asset_dir() -> PathBuf {
    let path = if cfg!(debug_assertions) {
        PathBuf::from("dev_assets")
    } else {
        ProjectDirs::from(QUALIFIER, ORGANIZATION, APPLICATION)
            .map(|dirs| dirs.data_dir().to_path_buf())
            .unwrap_or_else(|| PathBuf::from(".energiewijzer"))
    };

    if !path.exists() {
        let _ = std::fs::create_dir_all(&path);
    }
    path
}

/// Directory for unsynced quiz state kept by clients.
pub fn fallback_dir() -> PathBuf {
    asset_dir().join("intake-fallback")
}
