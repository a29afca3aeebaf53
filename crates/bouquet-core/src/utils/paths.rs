use std::path::PathBuf;

/// Standard directories for the bouquet bot.
///
/// - Project-level: ./.bouquet
/// - User-level config and data: OS-specific dirs
pub struct AppPaths;

impl AppPaths {
    pub fn project_dir() -> PathBuf {
        PathBuf::from(".bouquet")
    }

    /// ./.bouquet/config.toml
    pub fn project_config() -> PathBuf {
        Self::project_dir().join("config.toml")
    }

    pub fn user_config_dir() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "bouquet").map(|d| d.config_dir().to_path_buf())
    }

    pub fn user_data_dir() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "bouquet").map(|d| d.data_dir().to_path_buf())
    }

    pub fn user_config() -> Option<PathBuf> {
        Self::user_config_dir().map(|d| d.join("config.toml"))
    }

    /// Database used when nothing else is configured.
    pub fn default_database() -> PathBuf {
        Self::user_data_dir()
            .unwrap_or_else(Self::project_dir)
            .join("bouquets.db")
    }

    pub fn log_dir() -> Option<PathBuf> {
        Self::user_data_dir().map(|d| d.join("logs"))
    }

    /// Config files in discovery order: project first, then user.
    pub fn discover_configs() -> Vec<PathBuf> {
        let mut paths = vec![Self::project_config()];
        if let Some(user) = Self::user_config() {
            paths.push(user);
        }
        paths
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn project_paths_are_static() {
        assert_eq!(AppPaths::project_dir(), PathBuf::from(".bouquet"));
        assert_eq!(
            AppPaths::project_config(),
            PathBuf::from(".bouquet/config.toml")
        );
    }

    #[test]
    fn project_config_is_discovered_first() {
        let configs = AppPaths::discover_configs();
        assert_eq!(configs.first(), Some(&AppPaths::project_config()));
        assert!(AppPaths::default_database().ends_with("bouquets.db"));
    }
}
