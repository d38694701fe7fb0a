//! Filesystem loading for static resource responses.
//!
//! The response constructors in [`crate::Response`] delegate here. Loading
//! is fully buffered: a resource is read to completion and handed back as
//! one [`Bytes`] together with its content type.

use std::path::Path;

use bytes::Bytes;
use thiserror::Error;
use tokio::fs;

/// A resource read from disk, ready to put on the wire.
#[derive(Debug)]
pub(crate) struct LoadedFile {
    pub(crate) bytes: Bytes,
    pub(crate) content_type: &'static str,
}

#[derive(Debug, Error)]
pub(crate) enum FileError {
    #[error("no such file: {path}")]
    NotFound { path: String },
    #[error("not a regular file: {path}")]
    NotAFile { path: String },
    #[error("could not read {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
}

impl FileError {
    /// True for the "resource does not exist" cases that the
    /// `or_not_found` combinator turns into a 404.
    pub(crate) fn is_not_found(&self) -> bool {
        matches!(self, FileError::NotFound { .. } | FileError::NotAFile { .. })
    }
}

fn io_error(path: &Path, source: std::io::Error) -> FileError {
    let path = path.display().to_string();
    if source.kind() == std::io::ErrorKind::NotFound {
        FileError::NotFound { path }
    } else {
        FileError::Io { path, source }
    }
}

/// Reads a file to completion.
pub(crate) async fn load_file(path: &Path) -> Result<LoadedFile, FileError> {
    let metadata = fs::metadata(path).await.map_err(|source| io_error(path, source))?;
    if !metadata.is_file() {
        return Err(FileError::NotAFile { path: path.display().to_string() });
    }
    let content = fs::read(path).await.map_err(|source| io_error(path, source))?;
    Ok(LoadedFile {
        content_type: mime_type_for(path),
        bytes: Bytes::from(content),
    })
}

/// Strips directory-traversal components from a resource name.
///
/// Empty components, `.`, `..`, and anything containing a backslash are
/// dropped; what survives is rejoined with `/` for use under a root
/// directory.
pub(crate) fn sanitize_name(name: &str) -> String {
    name.trim_start_matches('/')
        .split('/')
        .filter(|part| is_safe_component(part))
        .collect::<Vec<_>>()
        .join("/")
}

/// Like [`sanitize_name`], but for components that were already split by
/// path matching. A decoded component can still contain `/` (from `%2F`),
/// so separators inside a component are rejected too.
pub(crate) fn sanitize_segments(segments: &[String]) -> String {
    segments
        .iter()
        .map(String::as_str)
        .filter(|part| is_safe_component(part) && !part.contains('/'))
        .collect::<Vec<_>>()
        .join("/")
}

fn is_safe_component(part: &str) -> bool {
    !part.is_empty() && part != "." && part != ".." && !part.contains('\\')
}

pub(crate) fn mime_type_for(path: &Path) -> &'static str {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("");
    mime_type_for_extension(extension)
}

/// MIME type detection based on file extension.
fn mime_type_for_extension(extension: &str) -> &'static str {
    match extension.to_lowercase().as_str() {
        "html" | "htm" => "text/html; charset=utf-8",
        "css" => "text/css; charset=utf-8",
        "js" | "mjs" => "text/javascript; charset=utf-8",
        "json" => "application/json",
        "xml" => "application/xml",
        "txt" => "text/plain; charset=utf-8",
        "svg" => "image/svg+xml",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "ico" => "image/x-icon",
        "woff" => "font/woff",
        "woff2" => "font/woff2",
        "ttf" => "font/ttf",
        "otf" => "font/otf",
        "pdf" => "application/pdf",
        "wasm" => "application/wasm",
        _ => "application/octet-stream",
    }
}
