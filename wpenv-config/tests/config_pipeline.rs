//! End-to-end tests for the configuration pipeline: files on disk in,
//! fully resolved configuration out.

use serde_json::json;
use std::fs;
use tempfile::TempDir;
use wpenv_config::{
    config_checksum, load_config, ConfigCache, EnvironmentVariables, SourceKind, WpEnvConfig,
    CONFIG_CHECKSUM_KEY,
};

struct Project {
    dir: TempDir,
    home: TempDir,
}

impl Project {
    fn new() -> Self {
        Self {
            dir: TempDir::new().unwrap(),
            home: TempDir::new().unwrap(),
        }
    }

    fn write_config(&self, config: &serde_json::Value) {
        fs::write(
            self.dir.path().join(".wp-env.json"),
            serde_json::to_string_pretty(config).unwrap(),
        )
        .unwrap();
    }

    fn write_override(&self, config: &serde_json::Value) {
        fs::write(
            self.dir.path().join(".wp-env.override.json"),
            serde_json::to_string_pretty(config).unwrap(),
        )
        .unwrap();
    }

    fn vars(&self) -> EnvironmentVariables {
        EnvironmentVariables {
            home: Some(self.home.path().display().to_string()),
            ..Default::default()
        }
    }

    fn load(&self) -> wpenv_core::error::Result<WpEnvConfig> {
        load_config(self.dir.path(), &self.vars(), None)
    }
}

#[test]
fn empty_config_resolves_to_defaults() {
    let project = Project::new();
    project.write_config(&json!({}));

    let config = project.load().unwrap();

    let development = config.development().unwrap();
    assert_eq!(development.port, Some(8888));
    assert_eq!(development.config["WP_DEBUG"], json!(true));

    let tests = config.tests().unwrap();
    assert_eq!(tests.port, Some(8889));
    assert_eq!(tests.config["WP_DEBUG"], json!(false));

    assert!(config
        .work_directory_path
        .starts_with(project.home.path()));
    assert_eq!(
        config.docker_compose_config_path,
        config.work_directory_path.join("docker-compose.yml")
    );
}

#[test]
fn gutenberg_shorthand_resolves_to_git_source() {
    let project = Project::new();
    project.write_config(&json!({ "plugins": ["WordPress/gutenberg#trunk"] }));

    let config = project.load().unwrap();
    let work = &config.work_directory_path;

    let source = &config.development().unwrap().plugin_sources[0];
    assert_eq!(source.basename, "gutenberg");
    assert_eq!(source.path, work.join("gutenberg"));
    match &source.kind {
        SourceKind::Git {
            url,
            git_ref,
            clone_path,
        } => {
            assert_eq!(url, "https://github.com/WordPress/gutenberg.git");
            assert_eq!(git_ref.as_deref(), Some("trunk"));
            assert_eq!(clone_path, &work.join("gutenberg"));
        }
        other => panic!("expected a git source, got {:?}", other),
    }
}

#[test]
fn invalid_mapping_source_fails_validation() {
    let project = Project::new();
    project.write_config(&json!({ "mappings": { "test": "false" } }));

    let err = project.load().unwrap_err();
    assert!(err.is_validation());
    assert!(err.to_string().contains("Invalid or unrecognized source"));
}

#[test]
fn matching_root_ports_fail_validation() {
    let project = Project::new();
    project.write_config(&json!({ "port": 8888, "testsPort": 8888 }));

    let err = project.load().unwrap_err();
    assert!(err.is_validation());
    assert!(err.to_string().contains("may not have the same port"));
}

#[test]
fn override_file_wins_over_root_config() {
    let project = Project::new();
    project.write_config(&json!({
        "port": 1000,
        "config": { "WP_DEBUG_LOG": true }
    }));
    project.write_override(&json!({ "port": 2000 }));

    let config = project.load().unwrap();
    let development = config.development().unwrap();
    assert_eq!(development.port, Some(2000));
    // Keys the override does not mention survive from the root config.
    assert_eq!(development.config["WP_DEBUG_LOG"], json!(true));
}

#[test]
fn tests_port_shorthand_applies_to_tests_environment() {
    let project = Project::new();
    project.write_config(&json!({ "testsPort": 1234 }));

    let config = project.load().unwrap();
    assert_eq!(config.tests().unwrap().port, Some(1234));
    assert_eq!(config.development().unwrap().port, Some(8888));
}

#[test]
fn environment_variables_have_highest_precedence() {
    let project = Project::new();
    project.write_config(&json!({ "port": 1000 }));

    let vars = EnvironmentVariables {
        port: Some("4000".to_string()),
        ..project.vars()
    };
    let config = load_config(project.dir.path(), &vars, None).unwrap();

    let development = config.development().unwrap();
    assert_eq!(development.port, Some(4000));
    assert_eq!(
        development.config["WP_SITEURL"],
        json!("http://localhost:4000/")
    );
}

#[test]
fn missing_config_detects_plugin_directory() {
    let project = Project::new();
    fs::write(
        project.dir.path().join("my-plugin.php"),
        "<?php\n/**\n * Plugin Name: My Plugin\n */\n",
    )
    .unwrap();

    let config = project.load().unwrap();
    let sources = &config.development().unwrap().plugin_sources;
    assert_eq!(sources.len(), 1);
    assert!(sources[0].is_local());
}

#[test]
fn missing_config_without_markers_uses_plain_defaults() {
    let project = Project::new();

    let config = project.load().unwrap();
    let development = config.development().unwrap();
    assert_eq!(development.port, Some(8888));
    assert!(development.core_source.is_none());
    assert!(development.plugin_sources.is_empty());
}

#[test]
fn checksum_tracks_configuration_changes_through_the_cache() {
    let project = Project::new();
    project.write_config(&json!({}));

    let config = project.load().unwrap();
    let checksum = config_checksum(&config).unwrap();
    let cache = ConfigCache::new(&config.work_directory_path);

    assert!(cache.did_change(CONFIG_CHECKSUM_KEY, &json!(checksum)));
    cache.set(CONFIG_CHECKSUM_KEY, json!(checksum.clone())).unwrap();
    assert!(!cache.did_change(CONFIG_CHECKSUM_KEY, &json!(checksum)));

    // A stable config keeps a stable checksum across loads.
    let reloaded = project.load().unwrap();
    assert_eq!(config_checksum(&reloaded).unwrap(), checksum);

    // Changing the config file changes the checksum.
    project.write_config(&json!({ "port": 1000 }));
    let changed = project.load().unwrap();
    let changed_checksum = config_checksum(&changed).unwrap();
    assert_ne!(changed_checksum, checksum);
    assert!(cache.did_change(CONFIG_CHECKSUM_KEY, &json!(changed_checksum)));
}

#[test]
fn root_declared_extra_environment_is_resolved_and_validated() {
    let project = Project::new();
    project.write_config(&json!({
        "env": { "performance": { "port": 8890 } }
    }));

    let config = project.load().unwrap();
    assert_eq!(config.env["performance"].port, Some(8890));

    // An extra environment falling back to the cascaded root port collides
    // with development.
    project.write_config(&json!({ "env": { "performance": {} } }));
    let err = project.load().unwrap_err();
    assert!(err.to_string().contains("may not have the same port"));
}

#[test]
fn local_core_source_gets_tests_path() {
    let project = Project::new();
    let core_dir = project.dir.path().join("wordpress-src");
    fs::create_dir_all(&core_dir).unwrap();
    project.write_config(&json!({ "core": core_dir.display().to_string() }));

    let config = project.load().unwrap();
    let core = config.tests().unwrap().core_source.as_ref().unwrap();
    assert!(core.is_local());
    assert_eq!(
        core.tests_path.as_deref(),
        Some(
            config
                .work_directory_path
                .join("tests-wordpress-src")
                .as_path()
        )
    );
}
