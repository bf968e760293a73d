//! Generation of the Dockerfile the WordPress services build from.

// Standard library imports
use std::fs;
use std::path::PathBuf;

// External crate imports
use once_cell::sync::Lazy;
use tera::{Context, Tera};

// Internal imports
use crate::compose::wordpress_image;
use wpenv_config::WpEnvConfig;
use wpenv_core::error::{Result, WpEnvError};

/// Modes accepted by Xdebug 3; a comma-separated combination is allowed.
const XDEBUG_MODES: &[&str] = &[
    "off", "develop", "coverage", "debug", "gcstats", "profile", "trace",
];

const DOCKERFILE_TEMPLATE: &str = r#"FROM {{ image }}

RUN apt-get -qy install git
{% if xdebug_mode != "off" %}
RUN if ! php -m | grep -qi xdebug; then pecl install xdebug && docker-php-ext-enable xdebug; fi
RUN echo 'xdebug.mode={{ xdebug_mode }}' >> /usr/local/etc/php/conf.d/docker-php-ext-xdebug.ini
RUN echo 'xdebug.client_host=host.docker.internal' >> /usr/local/etc/php/conf.d/docker-php-ext-xdebug.ini
{% endif %}
"#;

static TEMPLATES: Lazy<Tera> = Lazy::new(|| {
    let mut tera = Tera::default();
    tera.add_raw_template("Dockerfile", DOCKERFILE_TEMPLATE)
        .expect("embedded Dockerfile template is valid");
    tera
});

/// Render the Dockerfile for a WordPress image and Xdebug mode.
pub fn render_dockerfile(image: &str, xdebug_mode: &str) -> Result<String> {
    for mode in xdebug_mode.split(',') {
        if !XDEBUG_MODES.contains(&mode.trim()) {
            return Err(WpEnvError::Validation(format!(
                "\"{}\" is not a valid Xdebug mode.",
                mode.trim()
            )));
        }
    }

    let mut context = Context::new();
    context.insert("image", image);
    context.insert("xdebug_mode", xdebug_mode);
    TEMPLATES
        .render("Dockerfile", &context)
        .map_err(|error| WpEnvError::Template(error.to_string()))
}

/// Write `<work>/Dockerfile` for the resolved configuration.
pub fn write_dockerfile(config: &WpEnvConfig, xdebug_mode: &str) -> Result<PathBuf> {
    let image = wordpress_image(
        config
            .development()
            .and_then(|env| env.php_version.as_deref()),
    );
    let rendered = render_dockerfile(&image, xdebug_mode)?;

    fs::create_dir_all(&config.work_directory_path)?;
    let path = config.work_directory_path.join("Dockerfile");
    fs::write(&path, rendered)?;
    Ok(path)
}
