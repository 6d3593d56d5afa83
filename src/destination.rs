//! Where a file download goes.

use std::fmt;
use std::path::{Component, MAIN_SEPARATOR, Path, PathBuf};

use tokio::io::AsyncWrite;
use tracing::debug;
use url::Url;

use crate::error::FetchError;

/// Output destination for [`Client::fetch_to_file`](crate::Client::fetch_to_file).
pub enum Destination<'w> {
    /// A file path. A path ending in a separator names a directory, and the
    /// file inside it is named after the URL.
    Path(PathBuf),
    /// Caller-supplied writer, shut down afterwards unless
    /// `dont_end_stream` is set.
    Sink(&'w mut (dyn AsyncWrite + Send + Unpin)),
    /// A file in the current directory named after the URL.
    UrlName,
}

impl fmt::Debug for Destination<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Path(path) => f.debug_tuple("Path").field(path).finish(),
            Self::Sink(_) => f.write_str("Sink(..)"),
            Self::UrlName => f.write_str("UrlName"),
        }
    }
}

impl From<PathBuf> for Destination<'_> {
    fn from(path: PathBuf) -> Self {
        Self::Path(path)
    }
}

impl From<&Path> for Destination<'_> {
    fn from(path: &Path) -> Self {
        Self::Path(path.to_path_buf())
    }
}

impl From<&str> for Destination<'_> {
    fn from(path: &str) -> Self {
        Self::Path(PathBuf::from(path))
    }
}

/// Works out the file path for a non-sink destination.
///
/// # Errors
///
/// Returns [`FetchError::InvalidDestination`] when a name is needed but the
/// URL has no usable last path segment.
pub fn resolve_file_path(path: Option<&Path>, url: &Url) -> Result<PathBuf, FetchError> {
    let resolved = match path {
        Some(path) if names_directory(path) => path.join(file_name_from_url(url)?),
        Some(path) => path.to_path_buf(),
        None => PathBuf::from(file_name_from_url(url)?),
    };
    debug!(path = %resolved.display(), "resolved output path");
    Ok(resolved)
}

fn names_directory(path: &Path) -> bool {
    let text = path.as_os_str().to_string_lossy();
    text.ends_with('/') || text.ends_with(MAIN_SEPARATOR)
}

/// File name taken from the URL's last non-empty path segment,
/// percent-decoded and made safe for the file system.
fn file_name_from_url(url: &Url) -> Result<String, FetchError> {
    url.path_segments()
        .and_then(|segments| segments.filter(|s| !s.is_empty()).next_back())
        .map(|last| {
            let decoded = urlencoding::decode(last).unwrap_or_else(|e| {
                debug!(segment = %last, error = %e, "URL decoding failed, using raw segment");
                last.into()
            });
            sanitize_filename(&decoded)
        })
        .ok_or_else(|| {
            FetchError::invalid_destination(
                "a writer, a file path, or a URL from which a file name can be extracted must be provided",
            )
        })
}

/// Replaces characters that are invalid on common file systems:
/// / \ : * ? " < > |
fn sanitize_filename(name: &str) -> String {
    let sanitized: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();

    if is_safe_filename_segment(&sanitized) {
        sanitized
    } else {
        sanitized.replace('.', "_")
    }
}

fn is_safe_filename_segment(name: &str) -> bool {
    !Path::new(name).components().any(|component| {
        matches!(
            component,
            Component::CurDir | Component::ParentDir | Component::RootDir | Component::Prefix(_)
        )
    })
}
