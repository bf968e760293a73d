//! Docker Compose topology for a resolved configuration.
//!
//! The builder is pure apart from one directory listing: when both
//! environments share a local core checkout, the tests service mounts each
//! sibling of the checkout individually so the two installs can manage
//! their own `wp-config.php` and `wp-content`.

// Standard library imports
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

// External crate imports
use indexmap::IndexMap;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

// Internal imports
use crate::host_user::HostUser;
use wpenv_config::{EnvironmentConfig, WpEnvConfig};
use wpenv_core::error::{Result, WpEnvError};

/// Entries of a shared local core checkout that each environment manages
/// for itself and must never share.
const UNSHARED_CORE_ENTRIES: &[&str] = &["wp-config.php", "wp-config-sample.php", "wp-content"];

#[derive(Debug, Clone, Serialize)]
pub struct ComposeConfig {
    pub version: String,
    pub services: IndexMap<String, ComposeService>,
    pub volumes: IndexMap<String, Value>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ComposeService {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub build: Option<ComposeBuild>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub ports: Vec<String>,
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub environment: IndexMap<String, String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub volumes: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ComposeBuild {
    pub context: String,
    pub dockerfile: String,
}

/// Build the compose document for a post-processed configuration.
pub fn build_compose_config(config: &WpEnvConfig) -> Result<ComposeConfig> {
    build_with_user(config, &HostUser::current())
}

fn build_with_user(config: &WpEnvConfig, host_user: &HostUser) -> Result<ComposeConfig> {
    let development = required_environment(config, "development")?;
    let tests = required_environment(config, "tests")?;

    let development_port = resolved_port(development, "development")?;
    let tests_port = resolved_port(tests, "tests")?;

    let development_mounts = get_mounts(
        &config.work_directory_path,
        development,
        host_user,
        development_core_mounts(development),
    );
    let tests_mounts = get_mounts(
        &config.work_directory_path,
        tests,
        host_user,
        tests_core_mounts(development, tests)?,
    );

    let mut services = IndexMap::new();
    services.insert(
        "mysql".to_string(),
        mysql_service("mysql", "wordpress", development.mysql_port),
    );
    services.insert(
        "tests-mysql".to_string(),
        mysql_service("tests-mysql", "tests-wordpress", tests.mysql_port),
    );
    services.insert(
        "wordpress".to_string(),
        wordpress_service(
            config,
            "mysql",
            "wordpress",
            development_port,
            development.https_port,
            development_mounts.clone(),
        ),
    );
    services.insert(
        "tests-wordpress".to_string(),
        wordpress_service(
            config,
            "tests-mysql",
            "tests-wordpress",
            tests_port,
            tests.https_port,
            tests_mounts.clone(),
        ),
    );
    services.insert(
        "cli".to_string(),
        cli_service(
            development,
            "mysql",
            "wordpress",
            development_mounts,
            host_user,
        ),
    );
    services.insert(
        "tests-cli".to_string(),
        cli_service(tests, "tests-mysql", "tests-wordpress", tests_mounts.clone(), host_user),
    );
    services.insert("phpunit".to_string(), phpunit_service(tests, tests_mounts));

    let mut volumes = IndexMap::new();
    volumes.insert("mysql".to_string(), Value::Null);
    volumes.insert("tests-mysql".to_string(), Value::Null);
    volumes.insert("phpunit-uploads".to_string(), Value::Null);
    volumes.insert("user-home".to_string(), Value::Null);
    // Core named volumes are only needed when no host copy is mounted and
    // Docker has to persist the in-container install.
    if development.core_source.is_none() {
        volumes.insert("wordpress".to_string(), Value::Null);
    }
    if tests.core_source.is_none() {
        volumes.insert("tests-wordpress".to_string(), Value::Null);
    }

    Ok(ComposeConfig {
        version: "3.7".to_string(),
        services,
        volumes,
    })
}

/// Serialize the compose document to `<work>/docker-compose.yml`.
pub fn write_docker_compose(config: &WpEnvConfig, compose: &ComposeConfig) -> Result<PathBuf> {
    fs::create_dir_all(&config.work_directory_path)?;
    let rendered = serde_yaml_ng::to_string(compose)?;
    fs::write(&config.docker_compose_config_path, rendered)?;
    debug!(
        "Wrote compose config to: {}",
        config.docker_compose_config_path.display()
    );
    Ok(config.docker_compose_config_path.clone())
}

/// Mount list for one environment's WordPress-facing services, in the
/// order the containers rely on: core, the PHPUnit test library, the user
/// home volume, directory mappings, plugins, themes. Duplicates collapse,
/// keeping the first occurrence.
fn get_mounts(
    work_dir: &Path,
    env: &EnvironmentConfig,
    host_user: &HostUser,
    core_mounts: Vec<String>,
) -> Vec<String> {
    let mut mounts = core_mounts;
    mounts.push(format!(
        "{}/WordPress-PHPUnit/tests/phpunit:/wordpress-phpunit",
        work_dir.display()
    ));
    mounts.push(host_user.home_mount());
    for (target, source) in &env.mappings {
        mounts.push(format!("{}:/var/www/html/{}", source.path.display(), target));
    }
    for source in &env.plugin_sources {
        mounts.push(format!(
            "{}:/var/www/html/wp-content/plugins/{}",
            source.path.display(),
            source.basename
        ));
    }
    for source in &env.theme_sources {
        mounts.push(format!(
            "{}:/var/www/html/wp-content/themes/{}",
            source.path.display(),
            source.basename
        ));
    }

    let mut seen = HashSet::new();
    mounts
        .into_iter()
        .filter(|mount| seen.insert(mount.clone()))
        .collect()
}

fn development_core_mounts(env: &EnvironmentConfig) -> Vec<String> {
    let root = env
        .core_source
        .as_ref()
        .map(|core| core.path.display().to_string())
        .unwrap_or_else(|| "wordpress".to_string());
    vec![format!("{}:/var/www/html", root)]
}

/// The tests environment runs against its own core copy. With no core
/// source a named volume backs it; with one, the `tests-` sibling install
/// is mounted, and when that install shadows the same local checkout the
/// development environment uses, every shareable top-level entry of the
/// checkout is mounted through individually.
fn tests_core_mounts(
    development: &EnvironmentConfig,
    tests: &EnvironmentConfig,
) -> Result<Vec<String>> {
    let Some(core) = &tests.core_source else {
        return Ok(vec!["tests-wordpress:/var/www/html".to_string()]);
    };

    let root = core.tests_path.as_deref().unwrap_or(&core.path);
    let mut mounts = vec![format!("{}:/var/www/html", root.display())];

    if shares_local_core(development, tests) {
        let mut entries = Vec::new();
        for entry in fs::read_dir(&core.path).map_err(|error| {
            WpEnvError::Validation(format!(
                "Could not read core source directory \"{}\": {}.",
                core.path.display(),
                error
            ))
        })? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if !UNSHARED_CORE_ENTRIES.contains(&name.as_str()) {
                entries.push(name);
            }
        }
        entries.sort();
        for name in entries {
            mounts.push(format!(
                "{}/{}:/var/www/html/{}",
                core.path.display(),
                name,
                name
            ));
        }
    }

    Ok(mounts)
}

fn shares_local_core(development: &EnvironmentConfig, tests: &EnvironmentConfig) -> bool {
    match (&development.core_source, &tests.core_source) {
        (Some(a), Some(b)) => a.is_local() && b.is_local() && a.path == b.path,
        _ => false,
    }
}

fn mysql_service(volume: &str, database: &str, host_port: Option<u16>) -> ComposeService {
    ComposeService {
        image: Some("mariadb:lts".to_string()),
        ports: host_port
            .map(|port| vec![format!("{}:3306", port)])
            .unwrap_or_default(),
        environment: IndexMap::from([
            ("MYSQL_ROOT_HOST".to_string(), "%".to_string()),
            ("MYSQL_ROOT_PASSWORD".to_string(), "password".to_string()),
            ("MYSQL_DATABASE".to_string(), database.to_string()),
        ]),
        volumes: vec![format!("{}:/var/lib/mysql", volume)],
        ..Default::default()
    }
}

fn wordpress_service(
    config: &WpEnvConfig,
    db_host: &str,
    db_name: &str,
    port: u16,
    https_port: Option<u16>,
    mounts: Vec<String>,
) -> ComposeService {
    let mut ports = vec![format!("{}:80", port)];
    if let Some(https_port) = https_port {
        ports.push(format!("{}:443", https_port));
    }

    ComposeService {
        build: Some(ComposeBuild {
            context: config.work_directory_path.display().to_string(),
            dockerfile: "Dockerfile".to_string(),
        }),
        depends_on: vec![db_host.to_string()],
        ports,
        environment: database_environment(db_host, db_name),
        volumes: mounts,
        ..Default::default()
    }
}

fn cli_service(
    env: &EnvironmentConfig,
    db_host: &str,
    db_name: &str,
    mounts: Vec<String>,
    host_user: &HostUser,
) -> ComposeService {
    ComposeService {
        image: Some(cli_image(env.php_version.as_deref())),
        environment: database_environment(db_host, db_name),
        volumes: mounts,
        user: Some(host_user.user_entry()),
        ..Default::default()
    }
}

fn phpunit_service(tests: &EnvironmentConfig, mut mounts: Vec<String>) -> ComposeService {
    mounts.push("phpunit-uploads:/wordpress/wp-content/uploads".to_string());
    ComposeService {
        image: Some(format!(
            "wordpressdevelop/phpunit:{}",
            phpunit_image_tag(tests.php_version.as_deref())
        )),
        environment: IndexMap::from([(
            "WP_TESTS_DIR".to_string(),
            "/wordpress-phpunit".to_string(),
        )]),
        volumes: mounts,
        ..Default::default()
    }
}

fn database_environment(db_host: &str, db_name: &str) -> IndexMap<String, String> {
    IndexMap::from([
        ("WORDPRESS_DB_HOST".to_string(), db_host.to_string()),
        ("WORDPRESS_DB_USER".to_string(), "root".to_string()),
        ("WORDPRESS_DB_PASSWORD".to_string(), "password".to_string()),
        ("WORDPRESS_DB_NAME".to_string(), db_name.to_string()),
    ])
}

/// The base image the generated Dockerfile builds from.
pub fn wordpress_image(php_version: Option<&str>) -> String {
    match php_version {
        Some(version) => format!("wordpress:php{}", version),
        None => "wordpress".to_string(),
    }
}

fn cli_image(php_version: Option<&str>) -> String {
    match php_version {
        Some(version) => format!("wordpress:cli-php{}", version),
        None => "wordpress:cli".to_string(),
    }
}

/// Image tag on `wordpressdevelop/phpunit`, keyed on the tests
/// environment's PHP version.
pub fn phpunit_image_tag(php_version: Option<&str>) -> String {
    let Some(version) = php_version else {
        return "latest".to_string();
    };
    let prefix = match version {
        "5.6" => "5",
        "7.0" => "6",
        "7.1" => "7",
        "7.2" => "8",
        "7.3" | "7.4" | "8.0" | "8.1" | "8.2" => "9",
        _ => return "latest".to_string(),
    };
    format!("{}-php-{}-fpm", prefix, version)
}

fn required_environment<'a>(
    config: &'a WpEnvConfig,
    name: &str,
) -> Result<&'a EnvironmentConfig> {
    config.env.get(name).ok_or_else(|| {
        WpEnvError::Internal(format!("resolved config has no \"{}\" environment", name))
    })
}

fn resolved_port(env: &EnvironmentConfig, name: &str) -> Result<u16> {
    env.port.ok_or_else(|| {
        WpEnvError::Internal(format!("\"{}\" environment has no resolved port", name))
    })
}
