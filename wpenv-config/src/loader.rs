//! Reading and sanity-checking of raw `.wp-env.json` files.

// Standard library imports
use std::fs;
use std::io::ErrorKind;
use std::path::Path;

// External crate imports
use serde_json::{Map, Value};
use tracing::debug;

// Internal imports
use wpenv_core::error::{Result, WpEnvError};

/// Keys accepted at the top level of a config file.
const ROOT_CONFIG_KEYS: &[&str] = &[
    "core",
    "plugins",
    "themes",
    "port",
    "testsPort",
    "mappings",
    "config",
    "phpVersion",
    "lifecycleScripts",
    "https",
    "httpsPort",
    "testsHttpsPort",
    "sslCertPath",
    "sslKeyPath",
    "env",
];

/// Keys accepted inside an `env.<name>` section. `env` itself and the
/// tests-specific root shorthands are root-only.
const ENVIRONMENT_CONFIG_KEYS: &[&str] = &[
    "core",
    "plugins",
    "themes",
    "port",
    "mysqlPort",
    "httpsPort",
    "mappings",
    "config",
    "phpVersion",
    "lifecycleScripts",
    "https",
    "sslCertPath",
    "sslKeyPath",
];

/// Read and parse one raw config file.
///
/// A missing file is not an error and yields `None`; the caller falls back
/// to directory-type detection defaults. Malformed JSON and unreadable
/// files are user problems and surface as validation errors naming the
/// file.
pub fn read_raw_config(path: &Path) -> Result<Option<Map<String, Value>>> {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(error) if error.kind() == ErrorKind::NotFound => {
            debug!("No config file at: {}", path.display());
            return Ok(None);
        }
        Err(error) => {
            return Err(WpEnvError::Validation(format!(
                "Could not read \"{}\": {}.",
                path.display(),
                error
            )))
        }
    };

    let parsed: Value = serde_json::from_str(&contents).map_err(|error| {
        WpEnvError::Validation(format!(
            "Invalid JSON in \"{}\": {}.",
            file_name(path),
            error
        ))
    })?;
    let Value::Object(mut config) = parsed else {
        return Err(WpEnvError::Validation(format!(
            "Invalid \"{}\": configuration must be a JSON object.",
            file_name(path)
        )));
    };

    debug!("Loaded config from: {}", path.display());
    apply_tests_port_compat(&mut config);
    validate_raw_config(&config, path)?;

    Ok(Some(config))
}

/// Back-compat: a top-level `testsPort` moves into `env.tests.port`. An
/// explicit `env.tests.port` wins, and sibling `env.tests` keys survive.
fn apply_tests_port_compat(config: &mut Map<String, Value>) {
    let Some(tests_port) = config.remove("testsPort") else {
        return;
    };

    let env = config
        .entry("env".to_string())
        .or_insert_with(|| Value::Object(Map::new()));
    let Some(env) = env.as_object_mut() else {
        // A malformed `env` is reported by key validation.
        return;
    };
    let tests = env
        .entry("tests".to_string())
        .or_insert_with(|| Value::Object(Map::new()));
    let Some(tests) = tests.as_object_mut() else {
        return;
    };
    tests.entry("port".to_string()).or_insert(tests_port);
}

fn validate_raw_config(config: &Map<String, Value>, path: &Path) -> Result<()> {
    let file = file_name(path);

    for key in config.keys() {
        if !ROOT_CONFIG_KEYS.contains(&key.as_str()) {
            return Err(WpEnvError::Validation(format!(
                "Invalid \"{}\": \"{}\" is not a configuration option.",
                file, key
            )));
        }
    }

    if let Some(env) = config.get("env") {
        let Some(env) = env.as_object() else {
            return Err(WpEnvError::Validation(format!(
                "Invalid \"{}\": \"env\" must be an object.",
                file
            )));
        };
        for (name, section) in env {
            let Some(section) = section.as_object() else {
                return Err(WpEnvError::Validation(format!(
                    "Invalid \"{}\": \"env.{}\" must be an object.",
                    file, name
                )));
            };
            for key in section.keys() {
                if !ENVIRONMENT_CONFIG_KEYS.contains(&key.as_str()) {
                    return Err(WpEnvError::Validation(format!(
                        "Invalid \"{}\": \"env.{}.{}\" is not a configuration option.",
                        file, name, key
                    )));
                }
            }
        }
    }

    Ok(())
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_config(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_missing_file_is_not_an_error() {
        let result = read_raw_config(Path::new("/definitely/not/here/.wp-env.json")).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_malformed_json_names_the_file() {
        let file = write_config("{ not json");
        let err = read_raw_config(file.path()).unwrap_err();
        assert!(err.is_validation());
        assert!(err.to_string().contains("Invalid JSON in"));
    }

    #[test]
    fn test_non_object_root_is_rejected() {
        let file = write_config("[1, 2, 3]");
        let err = read_raw_config(file.path()).unwrap_err();
        assert!(err.to_string().contains("must be a JSON object"));
    }

    #[test]
    fn test_tests_port_moves_into_env() {
        let file = write_config(r#"{ "testsPort": 8890 }"#);
        let config = read_raw_config(file.path()).unwrap().unwrap();
        assert!(config.get("testsPort").is_none());
        assert_eq!(config["env"]["tests"]["port"], json!(8890));
    }

    #[test]
    fn test_tests_port_does_not_clobber_explicit_port() {
        let file = write_config(
            r#"{ "testsPort": 8890, "env": { "tests": { "port": 1234, "phpVersion": "8.0" } } }"#,
        );
        let config = read_raw_config(file.path()).unwrap().unwrap();
        assert_eq!(config["env"]["tests"]["port"], json!(1234));
        // Sibling keys survive the transform.
        assert_eq!(config["env"]["tests"]["phpVersion"], json!("8.0"));
    }

    #[test]
    fn test_unknown_key_is_rejected() {
        let file = write_config(r#"{ "portt": 8888 }"#);
        let err = read_raw_config(file.path()).unwrap_err();
        assert!(err.is_validation());
        assert!(err
            .to_string()
            .contains("\"portt\" is not a configuration option"));
    }

    #[test]
    fn test_env_is_root_only() {
        let file = write_config(r#"{ "env": { "development": { "env": {} } } }"#);
        let err = read_raw_config(file.path()).unwrap_err();
        assert!(err
            .to_string()
            .contains("\"env.development.env\" is not a configuration option"));
    }

    #[test]
    fn test_env_sections_must_be_objects() {
        let file = write_config(r#"{ "env": { "development": 42 } }"#);
        let err = read_raw_config(file.path()).unwrap_err();
        assert!(err.to_string().contains("\"env.development\" must be an object"));
    }
}
