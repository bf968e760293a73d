//! Well-known directory locations for the tool.

// Standard library imports
use std::path::{Path, PathBuf};

// External crate imports
use sha2::{Digest, Sha256};

// Internal imports
use crate::env_vars::EnvironmentVariables;
use wpenv_core::error::{Result, WpEnvError};

/// The root under which all per-project work directories live:
/// `$WP_ENV_HOME` when set, `~/.wp-env` otherwise.
pub fn get_home_directory(vars: &EnvironmentVariables) -> Result<PathBuf> {
    if let Some(home) = &vars.home {
        return Ok(PathBuf::from(home));
    }
    dirs::home_dir()
        .map(|home| home.join(".wp-env"))
        .ok_or_else(|| WpEnvError::Internal("Could not determine a home directory.".to_string()))
}

/// Per-project work directory, keyed on a digest of the configuration
/// directory so distinct projects never collide.
pub fn get_work_directory_path(
    config_directory_path: &Path,
    vars: &EnvironmentVariables,
) -> Result<PathBuf> {
    let digest = Sha256::digest(config_directory_path.to_string_lossy().as_bytes());
    Ok(get_home_directory(vars)?.join(format!("{:x}", digest)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wp_env_home_overrides_the_root() {
        let vars = EnvironmentVariables {
            home: Some("/custom/wp-env-home".to_string()),
            ..Default::default()
        };
        let work = get_work_directory_path(Path::new("/project"), &vars).unwrap();
        assert!(work.starts_with("/custom/wp-env-home"));
    }

    #[test]
    fn test_distinct_projects_get_distinct_work_directories() {
        let vars = EnvironmentVariables {
            home: Some("/home/x/.wp-env".to_string()),
            ..Default::default()
        };
        let a = get_work_directory_path(Path::new("/project-a"), &vars).unwrap();
        let b = get_work_directory_path(Path::new("/project-b"), &vars).unwrap();
        assert_ne!(a, b);
        // Stable across invocations.
        assert_eq!(
            a,
            get_work_directory_path(Path::new("/project-a"), &vars).unwrap()
        );
    }
}
