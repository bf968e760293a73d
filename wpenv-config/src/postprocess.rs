//! Ordered post-processing of the merged configuration.
//!
//! Steps run in a fixed order: HTTPS provisioning, the root-to-environment
//! cascade, appending resolved ports to the URL-bearing WordPress config
//! keys, and port-uniqueness validation. Each step only fills or rewrites
//! values; earlier user choices are never overwritten.

// Standard library imports
use std::path::Path;

// External crate imports
use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use tracing::{debug, warn};
use url::Url;

// Internal imports
use crate::config::WpEnvConfig;
use wpenv_core::error::{Result, WpEnvError};

/// Optional leading scheme, a host, an optional port, and the remainder.
static HOST_AND_PORT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^((?:.+://)?[a-z0-9.-]+)(?::([0-9]+))?(.*)$").unwrap());

/// External collaborator that writes a locally-trusted development
/// certificate pair for a domain.
pub trait CertificateProvisioner {
    fn provision(&self, domain: &str, cert_path: &Path, key_path: &Path) -> Result<()>;
}

/// Run all post-processing steps over the merged configuration.
pub fn post_process_config(
    config: &mut WpEnvConfig,
    provisioner: Option<&dyn CertificateProvisioner>,
) -> Result<()> {
    provision_https(config, provisioner)?;
    cascade_root_options(config);
    append_ports_to_wp_configs(config);
    validate_port_uniqueness(config)?;
    Ok(())
}

/// Switch the site URLs to `https://` and make sure a certificate pair is
/// available, requesting one from the collaborator when none is configured.
fn provision_https(
    config: &mut WpEnvConfig,
    provisioner: Option<&dyn CertificateProvisioner>,
) -> Result<()> {
    if config.https != Some(true) {
        return Ok(());
    }
    if config.ssl_cert_path.is_some() != config.ssl_key_path.is_some() {
        return Err(WpEnvError::Validation(
            "\"sslCertPath\" and \"sslKeyPath\" must be configured together.".to_string(),
        ));
    }

    for env in config.env.values_mut() {
        for key in ["WP_SITEURL", "WP_HOME"] {
            if let Some(Value::String(value)) = env.config.get(key) {
                if let Some(rest) = value.strip_prefix("http://") {
                    let rewritten = format!("https://{}", rest);
                    env.config.insert(key.to_string(), Value::String(rewritten));
                }
            }
        }
    }

    if config.ssl_cert_path.is_some() {
        return Ok(());
    }

    let domain = config
        .development()
        .and_then(|env| env.config.get("WP_HOME"))
        .and_then(Value::as_str)
        .and_then(extract_host)
        .unwrap_or_else(|| "localhost".to_string());

    let certs_dir = config
        .development()
        .and_then(|env| env.core_source.as_ref())
        .map(|core| core.path.join("certs"))
        .unwrap_or_else(|| config.work_directory_path.join("certs"));
    let cert_path = certs_dir.join(format!("{}.crt", domain));
    let key_path = certs_dir.join(format!("{}.key", domain));

    if cert_path.exists() && key_path.exists() {
        debug!("Reusing existing certificate for: {}", domain);
    } else if let Some(provisioner) = provisioner {
        provisioner.provision(&domain, &cert_path, &key_path)?;
    } else {
        warn!(
            "HTTPS is enabled but no certificate provisioner is available; expecting \"{}\" and \"{}\" to exist before start",
            cert_path.display(),
            key_path.display()
        );
    }

    config.ssl_cert_path = Some(cert_path);
    config.ssl_key_path = Some(key_path);
    Ok(())
}

/// Distribute the root-level shorthands into every environment that does
/// not define the corresponding value itself. `tests` takes the
/// tests-specific port shorthands; every other environment takes the
/// general ones.
fn cascade_root_options(config: &mut WpEnvConfig) {
    let root_scripts = config.lifecycle_scripts.clone();
    let root_cert = config.ssl_cert_path.clone();
    let root_key = config.ssl_key_path.clone();

    for (name, env) in config.env.iter_mut() {
        let (port, https_port) = if name == "tests" {
            (config.tests_port, config.tests_https_port)
        } else {
            (config.port, config.https_port)
        };

        if env.port.is_none() {
            env.port = port;
        }
        if env.https_port.is_none() {
            env.https_port = https_port;
        }
        if env.https.is_none() {
            env.https = config.https;
        }
        if env.ssl_cert_path.is_none() {
            env.ssl_cert_path = root_cert.clone();
        }
        if env.ssl_key_path.is_none() {
            env.ssl_key_path = root_key.clone();
        }
        for (event, script) in &root_scripts {
            env.lifecycle_scripts
                .entry(event.clone())
                .or_insert_with(|| script.clone());
        }
    }
}

/// Append each environment's resolved port to the URL-bearing WordPress
/// config keys. `WP_TESTS_DOMAIN` and `WP_SITEURL` are always rewritten;
/// a `WP_HOME` that already carries an explicit port is left alone.
fn append_ports_to_wp_configs(config: &mut WpEnvConfig) {
    for env in config.env.values_mut() {
        let Some(port) = env.port else {
            continue;
        };
        let port = env.https_port.unwrap_or(port);

        for (key, replace) in [("WP_TESTS_DOMAIN", true), ("WP_SITEURL", true), ("WP_HOME", false)]
        {
            if let Some(Value::String(value)) = env.config.get(key) {
                let rewritten = add_or_replace_port(value, port, replace);
                env.config.insert(key.to_string(), Value::String(rewritten));
            }
        }
    }
}

/// Splice `:port` between the host and the remainder of `input`. Returns
/// the input unchanged when the target is a default port (80/443), when
/// the input carries a port and `replace` is false, or when no host can be
/// recognized.
pub fn add_or_replace_port(input: &str, port: u16, replace: bool) -> String {
    if port == 80 || port == 443 {
        return input.to_string();
    }
    let Some(fields) = HOST_AND_PORT.captures(input) else {
        return input.to_string();
    };
    if fields.get(2).is_some() && !replace {
        return input.to_string();
    }

    format!(
        "{}:{}{}",
        &fields[1],
        port,
        fields.get(3).map_or("", |m| m.as_str())
    )
}

fn validate_port_uniqueness(config: &WpEnvConfig) -> Result<()> {
    let mut seen: IndexMap<u16, &str> = IndexMap::new();
    for (name, env) in &config.env {
        let Some(port) = env.port else {
            return Err(WpEnvError::Validation(format!(
                "Environment \"{}\" must have a port.",
                name
            )));
        };
        if let Some(existing) = seen.get(&port) {
            return Err(WpEnvError::Validation(format!(
                "Environment \"{}\" and environment \"{}\" may not have the same port ({}).",
                existing, name, port
            )));
        }
        seen.insert(port, name.as_str());
    }
    Ok(())
}

fn extract_host(value: &str) -> Option<String> {
    Url::parse(value)
        .ok()
        .and_then(|url| url.host_str().map(ToString::to_string))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{build_config, default_config, environment_defaults};
    use crate::merge::merge_all;
    use serde_json::{json, Map};
    use std::cell::RefCell;
    use std::path::PathBuf;

    fn config_for(overlay: serde_json::Value, work_dir: &Path) -> WpEnvConfig {
        let overlay: Map<String, serde_json::Value> =
            overlay.as_object().cloned().unwrap_or_default();
        let merged = merge_all(&default_config(), [&environment_defaults(), &overlay]);
        build_config(Path::new("/project"), work_dir, &merged).unwrap()
    }

    #[test]
    fn test_add_or_replace_port_never_appends_default_ports() {
        for input in ["http://localhost/", "localhost", "http://localhost:2000/"] {
            assert_eq!(add_or_replace_port(input, 80, true), input);
            assert_eq!(add_or_replace_port(input, 443, true), input);
        }
    }

    #[test]
    fn test_add_or_replace_port_appends_and_replaces() {
        assert_eq!(
            add_or_replace_port("http://localhost/", 8888, true),
            "http://localhost:8888/"
        );
        assert_eq!(
            add_or_replace_port("http://localhost:7777/sub", 8888, true),
            "http://localhost:8888/sub"
        );
        assert_eq!(
            add_or_replace_port("http://localhost:7777/", 8888, false),
            "http://localhost:7777/"
        );
        assert_eq!(add_or_replace_port("localhost", 8889, true), "localhost:8889");
    }

    #[test]
    fn test_default_ports_cascade_and_append() {
        let mut config = config_for(json!({}), Path::new("/work"));
        post_process_config(&mut config, None).unwrap();

        let development = config.development().unwrap();
        assert_eq!(development.port, Some(8888));
        assert_eq!(
            development.config["WP_SITEURL"],
            json!("http://localhost:8888/")
        );
        assert_eq!(development.config["WP_DEBUG"], json!(true));

        let tests = config.tests().unwrap();
        assert_eq!(tests.port, Some(8889));
        assert_eq!(tests.config["WP_TESTS_DOMAIN"], json!("localhost:8889"));
        assert_eq!(tests.config["WP_DEBUG"], json!(false));
    }

    #[test]
    fn test_root_port_cascades_into_development() {
        let mut config = config_for(json!({ "port": 1000 }), Path::new("/work"));
        post_process_config(&mut config, None).unwrap();

        let development = config.development().unwrap();
        assert_eq!(development.port, Some(1000));
        let siteurl = development.config["WP_SITEURL"].as_str().unwrap();
        assert!(siteurl.ends_with(":1000/"), "got {}", siteurl);
    }

    #[test]
    fn test_environment_port_wins_over_cascade() {
        let mut config = config_for(
            json!({ "port": 1000, "env": { "development": { "port": 2000 } } }),
            Path::new("/work"),
        );
        post_process_config(&mut config, None).unwrap();
        assert_eq!(config.development().unwrap().port, Some(2000));
    }

    #[test]
    fn test_explicit_wp_home_port_is_preserved() {
        let mut config = config_for(
            json!({ "config": { "WP_HOME": "http://localhost:7777/" } }),
            Path::new("/work"),
        );
        post_process_config(&mut config, None).unwrap();

        let development = config.development().unwrap();
        assert_eq!(development.config["WP_HOME"], json!("http://localhost:7777/"));
        // WP_SITEURL has no such exemption.
        assert_eq!(
            development.config["WP_SITEURL"],
            json!("http://localhost:8888/")
        );
    }

    #[test]
    fn test_duplicate_ports_are_rejected() {
        let mut config = config_for(
            json!({ "port": 8888, "env": { "tests": { "port": 8888 } } }),
            Path::new("/work"),
        );
        let err = post_process_config(&mut config, None).unwrap_err();
        assert!(err.is_validation());
        let message = err.to_string();
        assert!(message.contains("may not have the same port"));
        assert!(message.contains("development"));
        assert!(message.contains("tests"));
    }

    #[test]
    fn test_lifecycle_scripts_cascade_without_clobbering() {
        let mut config = config_for(
            json!({
                "lifecycleScripts": { "afterStart": "echo root" },
                "env": { "tests": { "lifecycleScripts": { "afterStart": "echo tests" } } }
            }),
            Path::new("/work"),
        );
        post_process_config(&mut config, None).unwrap();

        assert_eq!(
            config.development().unwrap().lifecycle_scripts["afterStart"].as_deref(),
            Some("echo root")
        );
        assert_eq!(
            config.tests().unwrap().lifecycle_scripts["afterStart"].as_deref(),
            Some("echo tests")
        );
    }

    struct RecordingProvisioner {
        calls: RefCell<Vec<(String, PathBuf, PathBuf)>>,
    }

    impl RecordingProvisioner {
        fn new() -> Self {
            Self {
                calls: RefCell::new(Vec::new()),
            }
        }
    }

    impl CertificateProvisioner for RecordingProvisioner {
        fn provision(&self, domain: &str, cert_path: &Path, key_path: &Path) -> Result<()> {
            self.calls.borrow_mut().push((
                domain.to_string(),
                cert_path.to_path_buf(),
                key_path.to_path_buf(),
            ));
            Ok(())
        }
    }

    #[test]
    fn test_https_rewrites_urls_and_provisions_certificates() {
        let work = tempfile::tempdir().unwrap();
        let mut config = config_for(json!({ "https": true }), work.path());
        let provisioner = RecordingProvisioner::new();

        post_process_config(&mut config, Some(&provisioner)).unwrap();

        let development = config.development().unwrap();
        let home = development.config["WP_HOME"].as_str().unwrap();
        assert!(home.starts_with("https://"), "got {}", home);

        let calls = provisioner.calls.borrow();
        assert_eq!(calls.len(), 1);
        let (domain, cert_path, _) = &calls[0];
        assert_eq!(domain, "localhost");
        assert_eq!(
            cert_path,
            &work.path().join("certs").join("localhost.crt")
        );
        assert_eq!(config.ssl_cert_path.as_deref(), Some(cert_path.as_path()));
    }

    #[test]
    fn test_https_skips_provisioning_when_certificates_exist() {
        let work = tempfile::tempdir().unwrap();
        let certs = work.path().join("certs");
        std::fs::create_dir_all(&certs).unwrap();
        std::fs::write(certs.join("localhost.crt"), "cert").unwrap();
        std::fs::write(certs.join("localhost.key"), "key").unwrap();

        let mut config = config_for(json!({ "https": true }), work.path());
        let provisioner = RecordingProvisioner::new();
        post_process_config(&mut config, Some(&provisioner)).unwrap();

        assert!(provisioner.calls.borrow().is_empty());
        assert!(config.ssl_cert_path.is_some());
    }

    #[test]
    fn test_half_configured_ssl_pair_is_rejected() {
        let mut config = config_for(
            json!({ "https": true, "sslCertPath": "/certs/site.crt" }),
            Path::new("/work"),
        );
        let err = post_process_config(&mut config, None).unwrap_err();
        assert!(err.is_validation());
        assert!(err.to_string().contains("sslKeyPath"));
    }
}
