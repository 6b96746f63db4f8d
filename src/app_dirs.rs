use directories::ProjectDirs;
use std::path::PathBuf;

/// Centralized application directory resolution
pub struct AppDirs;

impl AppDirs {
    fn state_dir() -> Option<PathBuf> {
        if let Ok(home) = std::env::var("HOME") {
            Some(PathBuf::from(home).join(".local").join("state").join("reflex"))
        } else {
            ProjectDirs::from("", "", "reflex").map(|pd| pd.data_local_dir().to_path_buf())
        }
    }

    pub fn db_path() -> Option<PathBuf> {
        Self::state_dir().map(|dir| dir.join("reflex.db"))
    }

    /// Log file lives next to the database so a custom `--db` keeps both together
    pub fn log_path_for(db_path: &std::path::Path) -> PathBuf {
        db_path
            .parent()
            .map(|dir| dir.join("reflex.log"))
            .unwrap_or_else(|| PathBuf::from("reflex.log"))
    }
}
