//! Highest-precedence overrides sourced from the process environment.
//!
//! The recognized variables are captured once into an explicit
//! [`EnvironmentVariables`] value at process start and passed into the
//! pipeline, keeping the merge and overlay steps free of ambient reads.

// External crate imports
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

// Internal imports
use crate::config::WpEnvConfig;
use crate::sources::{include_tests_path, parse_source_string};
use wpenv_core::error::{Result, WpEnvError};

static PHP_VERSION: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d+(\.\d+){0,2}$").unwrap());

/// Snapshot of the `WP_ENV_*` variables recognized by the pipeline.
#[derive(Debug, Clone, Default)]
pub struct EnvironmentVariables {
    /// `WP_ENV_HOME`: overrides the cache/work directory root.
    pub home: Option<String>,
    /// `WP_ENV_PORT`
    pub port: Option<String>,
    /// `WP_ENV_MYSQL_PORT`
    pub mysql_port: Option<String>,
    /// `WP_ENV_TESTS_PORT`
    pub tests_port: Option<String>,
    /// `WP_ENV_TESTS_MYSQL_PORT`
    pub tests_mysql_port: Option<String>,
    /// `WP_ENV_CORE`
    pub core: Option<String>,
    /// `WP_ENV_PHP_VERSION`
    pub php_version: Option<String>,
    /// `WP_ENV_LIFECYCLE_SCRIPT_AFTER_START`
    pub after_start: Option<String>,
    /// `WP_ENV_LIFECYCLE_SCRIPT_AFTER_CLEAN`
    pub after_clean: Option<String>,
    /// `WP_ENV_LIFECYCLE_SCRIPT_AFTER_DESTROY`
    pub after_destroy: Option<String>,
}

impl EnvironmentVariables {
    /// Capture the recognized variables from the process environment.
    pub fn from_process() -> Self {
        let var = |name: &str| std::env::var(name).ok();
        Self {
            home: var("WP_ENV_HOME"),
            port: var("WP_ENV_PORT"),
            mysql_port: var("WP_ENV_MYSQL_PORT"),
            tests_port: var("WP_ENV_TESTS_PORT"),
            tests_mysql_port: var("WP_ENV_TESTS_MYSQL_PORT"),
            core: var("WP_ENV_CORE"),
            php_version: var("WP_ENV_PHP_VERSION"),
            after_start: var("WP_ENV_LIFECYCLE_SCRIPT_AFTER_START"),
            after_clean: var("WP_ENV_LIFECYCLE_SCRIPT_AFTER_CLEAN"),
            after_destroy: var("WP_ENV_LIFECYCLE_SCRIPT_AFTER_DESTROY"),
        }
    }
}

/// Apply the overrides onto an already-merged configuration. Runs after
/// file-based merging and before post-processing, so environment variables
/// always win over config files.
pub fn apply_env_overrides(config: &mut WpEnvConfig, vars: &EnvironmentVariables) -> Result<()> {
    if let Some(raw) = &vars.port {
        let port = parse_port_var("WP_ENV_PORT", raw)?;
        set_env_field(config, "development", |env| env.port = Some(port));
    }
    if let Some(raw) = &vars.mysql_port {
        let port = parse_port_var("WP_ENV_MYSQL_PORT", raw)?;
        set_env_field(config, "development", |env| env.mysql_port = Some(port));
    }
    if let Some(raw) = &vars.tests_port {
        let port = parse_port_var("WP_ENV_TESTS_PORT", raw)?;
        set_env_field(config, "tests", |env| env.port = Some(port));
    }
    if let Some(raw) = &vars.tests_mysql_port {
        let port = parse_port_var("WP_ENV_TESTS_MYSQL_PORT", raw)?;
        set_env_field(config, "tests", |env| env.mysql_port = Some(port));
    }

    if let Some(raw) = &vars.core {
        debug!("Overriding core source from WP_ENV_CORE");
        let source = parse_source_string(raw, &config.work_directory_path).map_err(|error| {
            WpEnvError::Validation(format!("Invalid WP_ENV_CORE: {}", error))
        })?;
        let source = include_tests_path(&source, &config.work_directory_path);
        for env in config.env.values_mut() {
            env.core_source = Some(source.clone());
        }
    }

    if let Some(version) = &vars.php_version {
        if !PHP_VERSION.is_match(version) {
            return Err(WpEnvError::Validation(format!(
                "Invalid WP_ENV_PHP_VERSION: \"{}\" must be of the form X, X.X, or X.X.X.",
                version
            )));
        }
        for env in config.env.values_mut() {
            env.php_version = Some(version.clone());
        }
    }

    let lifecycle_overrides = [
        ("afterStart", &vars.after_start),
        ("afterClean", &vars.after_clean),
        ("afterDestroy", &vars.after_destroy),
    ];
    for (event, script) in lifecycle_overrides {
        if let Some(script) = script {
            config
                .lifecycle_scripts
                .insert(event.to_string(), Some(script.clone()));
        }
    }

    Ok(())
}

fn set_env_field<F>(config: &mut WpEnvConfig, name: &str, apply: F)
where
    F: FnOnce(&mut crate::config::EnvironmentConfig),
{
    if let Some(env) = config.env.get_mut(name) {
        apply(env);
    }
}

fn parse_port_var(name: &str, raw: &str) -> Result<u16> {
    raw.trim().parse::<u16>().map_err(|_| {
        WpEnvError::Validation(format!("Invalid {}: \"{}\" must be an integer.", name, raw))
    })
}
