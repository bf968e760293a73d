//! Parsing of user-supplied source strings.
//!
//! A source string names one pluggable piece of content: WordPress core, a
//! plugin, a theme, or a directory mapping. The accepted grammar is a local
//! path (`.`, `~/...`, or absolute), a zip URL, an ssh git URL, or GitHub
//! shorthand (`owner/repo[/subdir][#ref]`). Recognizers are tried in that
//! priority order by the single authoritative parser below.

// Standard library imports
use std::path::{Component, Path, PathBuf, MAIN_SEPARATOR};

// External crate imports
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use url::Url;

// Internal imports
use wpenv_core::error::{Result, WpEnvError};

/// GitHub shorthand: `owner/repo[/subdir...][#ref]`.
static GITHUB_SOURCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([\w-]+)/([\w.-]+)((?:/[\w.-]+)*)(?:#(.+))?$").unwrap());

/// Trailing dotted version on a WordPress.org zip filename, e.g.
/// `gutenberg.16.0` -> `gutenberg`.
static TRAILING_VERSION: Lazy<Regex> = Lazy::new(|| Regex::new(r"\.[0-9][0-9.]*$").unwrap());

/// The variant-specific half of a source descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase", rename_all_fields = "camelCase")]
pub enum SourceKind {
    Local,
    Git {
        url: String,
        #[serde(rename = "ref", skip_serializing_if = "Option::is_none")]
        git_ref: Option<String>,
        clone_path: PathBuf,
    },
    Zip {
        url: String,
    },
}

/// Structured representation of one pluggable content origin.
///
/// `path` is always absolute: computed against the cache directory for
/// git/zip sources and against the process working directory (or the user's
/// home) for local ones.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceDescriptor {
    #[serde(flatten)]
    pub kind: SourceKind,
    pub path: PathBuf,
    pub basename: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tests_path: Option<PathBuf>,
}

impl SourceDescriptor {
    pub fn is_local(&self) -> bool {
        matches!(self.kind, SourceKind::Local)
    }

    /// The directory a git repository is cloned into. For sources pointing
    /// at a monorepo subdirectory this differs from `path`.
    pub fn clone_path(&self) -> Option<&Path> {
        match &self.kind {
            SourceKind::Git { clone_path, .. } => Some(clone_path),
            _ => None,
        }
    }
}

/// Parse a single source string into a descriptor.
///
/// Pure with respect to the filesystem and network; only the process
/// working directory and home directory are consulted, for local paths.
pub fn parse_source_string(source: &str, cache_dir: &Path) -> Result<SourceDescriptor> {
    if let Some(descriptor) = try_local(source)? {
        return Ok(descriptor);
    }
    if let Some(descriptor) = try_zip(source, cache_dir) {
        return Ok(descriptor);
    }
    if let Some(descriptor) = try_git_ssh(source, cache_dir) {
        return Ok(descriptor);
    }
    if let Some(descriptor) = try_github(source, cache_dir) {
        return Ok(descriptor);
    }

    Err(WpEnvError::Validation(format!(
        "Invalid or unrecognized source: \"{}\".",
        source
    )))
}

/// Return a copy of `source` carrying the sibling path used for the
/// tests-dedicated WordPress install: `<cache_dir>/tests-<basename-of-path>`.
pub fn include_tests_path(source: &SourceDescriptor, cache_dir: &Path) -> SourceDescriptor {
    let name = source
        .path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| source.basename.clone());

    let mut out = source.clone();
    out.tests_path = Some(cache_dir.join(format!("tests-{}", name)));
    out
}

fn try_local(source: &str) -> Result<Option<SourceDescriptor>> {
    let tilde_prefix = format!("~{}", MAIN_SEPARATOR);
    let is_local = source.starts_with('.')
        || source.starts_with("~/")
        || source.starts_with(&tilde_prefix)
        || Path::new(source).is_absolute();
    if !is_local {
        return Ok(None);
    }

    let path = if let Some(rest) = source
        .strip_prefix("~/")
        .or_else(|| source.strip_prefix(tilde_prefix.as_str()))
    {
        let home = dirs::home_dir().ok_or_else(|| {
            WpEnvError::Internal("Could not determine a home directory.".to_string())
        })?;
        home.join(rest)
    } else if Path::new(source).is_absolute() {
        PathBuf::from(source)
    } else {
        std::env::current_dir()?.join(source)
    };
    let path = normalize_path(&path);

    let basename = Path::new(source)
        .file_name()
        .or_else(|| path.file_name())
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| ".".to_string());

    Ok(Some(SourceDescriptor {
        kind: SourceKind::Local,
        path,
        basename,
        tests_path: None,
    }))
}

fn try_zip(source: &str, cache_dir: &Path) -> Option<SourceDescriptor> {
    let parsed = Url::parse(source).ok()?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return None;
    }
    if !parsed.path().ends_with(".zip") {
        return None;
    }

    let filename = parsed.path_segments()?.next_back()?;
    let stem = filename.strip_suffix(".zip")?;

    // wordpress.org download URLs carry the plugin/theme slug, optionally
    // followed by a dotted version.
    let is_wp_org = parsed.host_str() == Some("downloads.wordpress.org")
        && (parsed.path().starts_with("/plugin/") || parsed.path().starts_with("/theme/"));
    let stem = if is_wp_org {
        TRAILING_VERSION.replace(stem, "").into_owned()
    } else {
        stem.to_string()
    };

    let basename = encode_basename(&stem);
    let path = cache_dir.join(&basename);

    Some(SourceDescriptor {
        kind: SourceKind::Zip {
            url: source.to_string(),
        },
        path,
        basename,
        tests_path: None,
    })
}

fn try_git_ssh(source: &str, cache_dir: &Path) -> Option<SourceDescriptor> {
    let parsed = Url::parse(source).ok()?;
    if !matches!(parsed.scheme(), "ssh" | "git+ssh") {
        return None;
    }

    let git_ref = parsed.fragment().map(ToString::to_string);
    let mut url = parsed.clone();
    url.set_fragment(None);

    let pathname = parsed.path().trim_start_matches('/');
    let pathname = pathname.strip_suffix(".git").unwrap_or(pathname);
    let basename = pathname.rsplit('/').next()?.to_string();
    if basename.is_empty() {
        return None;
    }
    let path = cache_dir.join(pathname);

    Some(SourceDescriptor {
        kind: SourceKind::Git {
            url: url.to_string(),
            git_ref,
            clone_path: path.clone(),
        },
        path,
        basename,
        tests_path: None,
    })
}

fn try_github(source: &str, cache_dir: &Path) -> Option<SourceDescriptor> {
    let fields = GITHUB_SOURCE.captures(source)?;
    let owner = &fields[1];
    let repo = &fields[2];
    let subdir = fields.get(3).map_or("", |m| m.as_str());
    // Sources with no explicit fragment track the default branch name the
    // original tool assumed.
    let git_ref = fields
        .get(4)
        .map_or_else(|| "master".to_string(), |m| m.as_str().to_string());

    let clone_path = cache_dir.join(repo);
    let path = if subdir.is_empty() {
        clone_path.clone()
    } else {
        clone_path.join(subdir.trim_start_matches('/'))
    };
    let basename = subdir
        .rsplit('/')
        .next()
        .filter(|segment| !segment.is_empty())
        .unwrap_or(repo)
        .to_string();

    Some(SourceDescriptor {
        kind: SourceKind::Git {
            url: format!("https://github.com/{}/{}.git", owner, repo),
            git_ref: Some(git_ref),
            clone_path,
        },
        path,
        basename,
        tests_path: None,
    })
}

/// Lexically resolve `.` and `..` components without touching the
/// filesystem.
fn normalize_path(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Percent-encode a basename into a filesystem-safe form, keeping the
/// characters `encodeURIComponent` leaves untouched.
fn encode_basename(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for byte in name.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' => out.push(byte as char),
            b'-' | b'_' | b'.' | b'!' | b'~' | b'*' | b'\'' | b'(' | b')' => {
                out.push(byte as char)
            }
            _ => out.push_str(&format!("%{:02X}", byte)),
        }
    }
    out
}
