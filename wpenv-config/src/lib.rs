//! Configuration resolution for the wpenv tool.
//!
//! This library turns `.wp-env.json` / `.wp-env.override.json` files,
//! built-in defaults, and `WP_ENV_*` environment variables into one fully
//! resolved configuration per invocation, ready for the compose builder.
//!
//! ## Main Features
//! - Source-string parsing (local path, GitHub shorthand, zip URL, ssh git)
//! - Layered configuration merging with per-environment sections
//! - Environment-variable overrides and ordered post-processing
//! - The on-disk cache consulted by the start/clean commands

pub mod cache;
pub mod config;
pub mod detect;
pub mod env_vars;
pub mod loader;
pub mod merge;
pub mod paths;
pub mod postprocess;
pub mod sources;

pub use cache::{config_checksum, ConfigCache, CONFIG_CHECKSUM_KEY};
pub use config::{EnvironmentConfig, WpEnvConfig};
pub use env_vars::EnvironmentVariables;
pub use postprocess::CertificateProvisioner;
pub use sources::{SourceDescriptor, SourceKind};

use serde_json::{Map, Value};
use std::path::Path;
use wpenv_core::error::Result;

/// Resolve the complete configuration for one invocation.
///
/// This is the main entry point. It:
/// 1. Computes the work directory for the project
/// 2. Reads `.wp-env.json` and `.wp-env.override.json` (either may be
///    missing; a missing root config falls back to directory-type
///    detection)
/// 3. Merges defaults, the environment skeleton, and both files in
///    precedence order, then flattens per-environment sections
/// 4. Applies `WP_ENV_*` overrides
/// 5. Post-processes: HTTPS, root-option cascade, port rewriting, and
///    validation
pub fn load_config(
    config_directory_path: &Path,
    vars: &EnvironmentVariables,
    cert_provisioner: Option<&dyn CertificateProvisioner>,
) -> Result<WpEnvConfig> {
    let work_directory_path = paths::get_work_directory_path(config_directory_path, vars)?;

    let root = loader::read_raw_config(&config_directory_path.join(".wp-env.json"))?;
    let overrides = loader::read_raw_config(&config_directory_path.join(".wp-env.override.json"))?;

    let mut overlays: Vec<Map<String, Value>> = vec![config::environment_defaults()];
    match root {
        Some(map) => overlays.push(map),
        None => overlays.push(detect::detect_directory_defaults(config_directory_path)),
    }
    if let Some(map) = overrides {
        overlays.push(map);
    }
    let merged = merge::merge_all(&config::default_config(), overlays.iter());

    let mut config = config::build_config(config_directory_path, &work_directory_path, &merged)?;
    env_vars::apply_env_overrides(&mut config, vars)?;
    postprocess::post_process_config(&mut config, cert_provisioner)?;

    Ok(config)
}
