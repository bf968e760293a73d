//! Directory-type detection used when no `.wp-env.json` exists.

use serde_json::{json, Map, Value};
use std::path::Path;
use tracing::debug;
use wpenv_core::file_system;

/// Infer an implicit configuration from marker files in the configuration
/// directory: a WordPress core checkout, a plugin, or a theme. Returns an
/// empty overlay when nothing is recognized.
pub fn detect_directory_defaults(dir: &Path) -> Map<String, Value> {
    let overlay = if file_system::has_file(dir, "wp-includes/version.php") {
        debug!("Detected a WordPress core checkout at: {}", dir.display());
        json!({ "core": "." })
    } else if file_system::has_php_file_containing(dir, "Plugin Name:") {
        debug!("Detected a plugin directory at: {}", dir.display());
        json!({ "plugins": ["."] })
    } else if file_system::has_file_containing(dir, "style.css", "Theme Name:") {
        debug!("Detected a theme directory at: {}", dir.display());
        json!({ "themes": ["."] })
    } else {
        json!({})
    };

    overlay.as_object().cloned().unwrap_or_default()
}
