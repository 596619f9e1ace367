//! Path utilities for link files and their sidecars.
//!
//! A link file is identified purely by its extension. Its sidecar lives next
//! to it with a fixed suffix appended to the full file name, so the link
//! file's own extension is always preserved (`Show.strm` → `Show.strm.medinfo`).

use std::ffi::OsString;
use std::path::{Path, PathBuf};

/// Default link-file extension.
pub const DEFAULT_LINK_EXTENSION: &str = "strm";

/// Default sidecar suffix appended to the link-file name.
pub const DEFAULT_SIDECAR_SUFFIX: &str = "medinfo";

/// Check if a path carries the link-file extension (case-insensitive).
///
/// # Examples
///
/// ```
/// use std::path::Path;
/// use evermedia_common::paths::is_link_file;
///
/// assert!(is_link_file(Path::new("/media/Movie.strm"), "strm"));
/// assert!(is_link_file(Path::new("/media/Movie.STRM"), "strm"));
/// assert!(!is_link_file(Path::new("/media/Movie.mkv"), "strm"));
/// ```
pub fn is_link_file(path: &Path, extension: &str) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case(extension.trim_start_matches('.')))
        .unwrap_or(false)
}

/// Derive the sidecar path for a link file by appending `.{suffix}`.
pub fn sidecar_path(link_path: &Path, suffix: &str) -> PathBuf {
    let mut name: OsString = link_path.as_os_str().to_owned();
    name.push(".");
    name.push(suffix.trim_start_matches('.'));
    PathBuf::from(name)
}
