//! Typed configuration model and the raw-to-typed conversion.
//!
//! Raw config files are merged as JSON objects (see `merge`), then
//! flattened into one [`EnvironmentConfig`] per named environment. Source
//! strings are parsed during this conversion, so a typed config always
//! carries resolved [`SourceDescriptor`]s rather than raw strings.

// Standard library imports
use std::path::{Path, PathBuf};

// External crate imports
use indexmap::IndexMap;
use serde::Serialize;
use serde_json::{json, Map, Value};

// Internal imports
use crate::merge::merge_config_maps;
use crate::sources::{include_tests_path, parse_source_string, SourceDescriptor};
use wpenv_core::error::{Result, WpEnvError};

/// Root-level keys that seed every environment before its own section is
/// applied. Ports, lifecycle scripts, and the https options are instead
/// distributed by the post-processing cascade.
const ENVIRONMENT_SEED_KEYS: &[&str] =
    &["core", "phpVersion", "plugins", "themes", "config", "mappings"];

/// The fully resolved root configuration for one invocation.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WpEnvConfig {
    pub config_directory_path: PathBuf,
    pub work_directory_path: PathBuf,
    pub docker_compose_config_path: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tests_port: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub https_port: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tests_https_port: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub https: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ssl_cert_path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ssl_key_path: Option<PathBuf>,
    pub lifecycle_scripts: IndexMap<String, Option<String>>,
    pub env: IndexMap<String, EnvironmentConfig>,
}

impl WpEnvConfig {
    pub fn development(&self) -> Option<&EnvironmentConfig> {
        self.env.get("development")
    }

    pub fn tests(&self) -> Option<&EnvironmentConfig> {
        self.env.get("tests")
    }
}

/// One named environment (canonically `development` and `tests`) after
/// flattening.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvironmentConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mysql_port: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub https_port: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub php_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub core_source: Option<SourceDescriptor>,
    pub plugin_sources: Vec<SourceDescriptor>,
    pub theme_sources: Vec<SourceDescriptor>,
    pub config: IndexMap<String, Value>,
    pub mappings: IndexMap<String, SourceDescriptor>,
    pub lifecycle_scripts: IndexMap<String, Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub https: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ssl_cert_path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ssl_key_path: Option<PathBuf>,
}

/// Built-in defaults, lowest precedence in the merge chain.
pub fn default_config() -> Map<String, Value> {
    json!({
        "core": null,
        "phpVersion": null,
        "plugins": [],
        "themes": [],
        "port": 8888,
        "testsPort": 8889,
        "mappings": {},
        "config": {
            "WP_DEBUG": true,
            "SCRIPT_DEBUG": true,
            "WP_ENVIRONMENT_TYPE": "local",
            "WP_PHP_BINARY": "php",
            "WP_TESTS_EMAIL": "admin@example.org",
            "WP_TESTS_TITLE": "Test Blog",
            "WP_TESTS_DOMAIN": "localhost",
            "WP_SITEURL": "http://localhost/",
            "WP_HOME": "http://localhost/",
        },
        "lifecycleScripts": {
            "afterStart": null,
            "afterClean": null,
            "afterDestroy": null,
        },
    })
    .as_object()
    .cloned()
    .unwrap_or_default()
}

/// Skeleton guaranteeing the two canonical environments exist, with the
/// tests-specific config flips.
pub fn environment_defaults() -> Map<String, Value> {
    json!({
        "env": {
            "development": {},
            "tests": {
                "config": {
                    "WP_DEBUG": false,
                    "SCRIPT_DEBUG": false,
                },
            },
        },
    })
    .as_object()
    .cloned()
    .unwrap_or_default()
}

/// Convert the merged raw object into the typed root configuration.
pub fn build_config(
    config_directory_path: &Path,
    work_directory_path: &Path,
    merged: &Map<String, Value>,
) -> Result<WpEnvConfig> {
    let env_sections = merged
        .get("env")
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default();

    // Root-level source/config options seed every environment; the
    // environment's own section overrides them with merge semantics.
    let mut seed = Map::new();
    for key in ENVIRONMENT_SEED_KEYS {
        if let Some(value) = merged.get(*key) {
            seed.insert((*key).to_string(), value.clone());
        }
    }

    let mut env = IndexMap::new();
    for (name, section) in &env_sections {
        let section = section.as_object().ok_or_else(|| {
            WpEnvError::Validation(format!("\"env.{}\" must be an object.", name))
        })?;
        let flattened = merge_config_maps(&seed, section);
        env.insert(
            name.clone(),
            parse_environment(name, &flattened, work_directory_path)?,
        );
    }

    Ok(WpEnvConfig {
        config_directory_path: config_directory_path.to_path_buf(),
        work_directory_path: work_directory_path.to_path_buf(),
        docker_compose_config_path: work_directory_path.join("docker-compose.yml"),
        port: optional_port(merged, "port", "port")?,
        tests_port: optional_port(merged, "testsPort", "testsPort")?,
        https_port: optional_port(merged, "httpsPort", "httpsPort")?,
        tests_https_port: optional_port(merged, "testsHttpsPort", "testsHttpsPort")?,
        https: optional_bool(merged, "https", "https")?,
        ssl_cert_path: optional_string(merged, "sslCertPath", "sslCertPath")?.map(PathBuf::from),
        ssl_key_path: optional_string(merged, "sslKeyPath", "sslKeyPath")?.map(PathBuf::from),
        lifecycle_scripts: parse_lifecycle_scripts(merged, "lifecycleScripts")?,
        env,
    })
}

fn parse_environment(
    name: &str,
    section: &Map<String, Value>,
    cache_dir: &Path,
) -> Result<EnvironmentConfig> {
    let label = |key: &str| format!("env.{}.{}", name, key);

    let core_source = match section.get("core") {
        None | Some(Value::Null) => None,
        Some(Value::String(raw)) => {
            let source = parse_source_string(raw, cache_dir)?;
            Some(include_tests_path(&source, cache_dir))
        }
        Some(_) => {
            return Err(WpEnvError::Validation(format!(
                "\"{}\" must be a string or null.",
                label("core")
            )))
        }
    };

    Ok(EnvironmentConfig {
        port: optional_port(section, "port", &label("port"))?,
        mysql_port: optional_port(section, "mysqlPort", &label("mysqlPort"))?,
        https_port: optional_port(section, "httpsPort", &label("httpsPort"))?,
        php_version: optional_string(section, "phpVersion", &label("phpVersion"))?,
        core_source,
        plugin_sources: parse_source_list(section, "plugins", &label("plugins"), cache_dir)?,
        theme_sources: parse_source_list(section, "themes", &label("themes"), cache_dir)?,
        config: parse_config_map(section, &label("config"))?,
        mappings: parse_mappings(section, &label("mappings"), cache_dir)?,
        lifecycle_scripts: parse_lifecycle_scripts(section, &label("lifecycleScripts"))?,
        https: optional_bool(section, "https", &label("https"))?,
        ssl_cert_path: optional_string(section, "sslCertPath", &label("sslCertPath"))?
            .map(PathBuf::from),
        ssl_key_path: optional_string(section, "sslKeyPath", &label("sslKeyPath"))?
            .map(PathBuf::from),
    })
}

fn parse_source_list(
    section: &Map<String, Value>,
    key: &str,
    label: &str,
    cache_dir: &Path,
) -> Result<Vec<SourceDescriptor>> {
    let Some(value) = section.get(key) else {
        return Ok(Vec::new());
    };
    let Some(items) = value.as_array() else {
        return Err(WpEnvError::Validation(format!(
            "\"{}\" must be an array of strings.",
            label
        )));
    };

    let mut sources = Vec::with_capacity(items.len());
    for item in items {
        let Some(raw) = item.as_str() else {
            return Err(WpEnvError::Validation(format!(
                "\"{}\" must be an array of strings.",
                label
            )));
        };
        sources.push(parse_source_string(raw, cache_dir)?);
    }
    Ok(sources)
}

fn parse_mappings(
    section: &Map<String, Value>,
    label: &str,
    cache_dir: &Path,
) -> Result<IndexMap<String, SourceDescriptor>> {
    let Some(value) = section.get("mappings") else {
        return Ok(IndexMap::new());
    };
    let Some(entries) = value.as_object() else {
        return Err(WpEnvError::Validation(format!(
            "\"{}\" must be an object.",
            label
        )));
    };

    let mut mappings = IndexMap::new();
    for (target, raw) in entries {
        let Some(raw) = raw.as_str() else {
            return Err(WpEnvError::Validation(format!(
                "\"{}.{}\" must be a string.",
                label, target
            )));
        };
        mappings.insert(target.clone(), parse_source_string(raw, cache_dir)?);
    }
    Ok(mappings)
}

fn parse_config_map(section: &Map<String, Value>, label: &str) -> Result<IndexMap<String, Value>> {
    let Some(value) = section.get("config") else {
        return Ok(IndexMap::new());
    };
    let Some(entries) = value.as_object() else {
        return Err(WpEnvError::Validation(format!(
            "\"{}\" must be an object.",
            label
        )));
    };
    Ok(entries
        .iter()
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect())
}

fn parse_lifecycle_scripts(
    section: &Map<String, Value>,
    label: &str,
) -> Result<IndexMap<String, Option<String>>> {
    let Some(value) = section.get("lifecycleScripts") else {
        return Ok(IndexMap::new());
    };
    let Some(entries) = value.as_object() else {
        return Err(WpEnvError::Validation(format!(
            "\"{}\" must be an object.",
            label
        )));
    };

    let mut scripts = IndexMap::new();
    for (event, script) in entries {
        let script = match script {
            Value::Null => None,
            Value::String(command) => Some(command.clone()),
            _ => {
                return Err(WpEnvError::Validation(format!(
                    "\"{}.{}\" must be a string or null.",
                    label, event
                )))
            }
        };
        scripts.insert(event.clone(), script);
    }
    Ok(scripts)
}

fn optional_port(map: &Map<String, Value>, key: &str, label: &str) -> Result<Option<u16>> {
    match map.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(number)) => number
            .as_u64()
            .filter(|value| *value <= u64::from(u16::MAX))
            .map(|value| Some(value as u16))
            .ok_or_else(|| {
                WpEnvError::Validation(format!("\"{}\" must be an integer.", label))
            }),
        Some(_) => Err(WpEnvError::Validation(format!(
            "\"{}\" must be an integer.",
            label
        ))),
    }
}

fn optional_bool(map: &Map<String, Value>, key: &str, label: &str) -> Result<Option<bool>> {
    match map.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Bool(value)) => Ok(Some(*value)),
        Some(_) => Err(WpEnvError::Validation(format!(
            "\"{}\" must be a boolean.",
            label
        ))),
    }
}

fn optional_string(map: &Map<String, Value>, key: &str, label: &str) -> Result<Option<String>> {
    match map.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(value)) => Ok(Some(value.clone())),
        Some(_) => Err(WpEnvError::Validation(format!(
            "\"{}\" must be a string.",
            label
        ))),
    }
}
