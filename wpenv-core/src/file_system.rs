//! File system probes used for directory-type detection.

use std::fs;
use std::path::Path;

/// Check if a file exists in a directory
pub fn has_file(dir: &Path, filename: &str) -> bool {
    dir.join(filename).is_file()
}

/// Check if a file exists and contains a specific string
pub fn has_file_containing(dir: &Path, filename: &str, content: &str) -> bool {
    let file_path = dir.join(filename);
    if !file_path.exists() {
        return false;
    }

    if let Ok(file_contents) = fs::read_to_string(file_path) {
        file_contents.contains(content)
    } else {
        false
    }
}

/// Check if any top-level `.php` file in a directory contains a specific
/// string. Used to recognize plugin directories by their file header.
pub fn has_php_file_containing(dir: &Path, content: &str) -> bool {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(_) => return false,
    };

    for entry in entries.flatten() {
        let path = entry.path();
        if path.extension().is_some_and(|ext| ext == "php") {
            if let Ok(file_contents) = fs::read_to_string(&path) {
                if file_contents.contains(content) {
                    return true;
                }
            }
        }
    }

    false
}
