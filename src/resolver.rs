//! Link resolution: read a link file and classify the path it points to.
//!
//! Content is trimmed and otherwise taken verbatim. Relative paths are not
//! joined onto the link file's directory; if they do not exist as given they
//! resolve to [`TargetKind::Invalid`].

use evermedia_common::ResolutionError;
use std::path::{Path, PathBuf};

/// Classification of a link-file target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetKind {
    /// An existing local file that can be probed.
    Local,
    /// A network URL. Never probed, whether or not it is reachable.
    Remote,
    /// Nothing usable: unreadable link, empty content, or a missing local file.
    Invalid(ResolutionError),
}

/// The resolved destination of a link file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaTarget {
    /// Trimmed link content. Empty when the link file could not be read.
    pub path: String,
    pub kind: TargetKind,
}

impl MediaTarget {
    pub fn is_local(&self) -> bool {
        self.kind == TargetKind::Local
    }

    /// The target as a filesystem path, only for local targets.
    pub fn local_path(&self) -> Option<PathBuf> {
        self.is_local().then(|| PathBuf::from(&self.path))
    }
}

/// Resolve a link file to a [`MediaTarget`].
pub fn resolve(link_path: &Path) -> MediaTarget {
    let content = match std::fs::read_to_string(link_path) {
        Ok(content) => content,
        Err(e) => {
            return MediaTarget {
                path: String::new(),
                kind: TargetKind::Invalid(ResolutionError::Unreadable {
                    path: link_path.to_path_buf(),
                    message: e.to_string(),
                }),
            };
        }
    };

    classify(link_path, &content)
}

fn classify(link_path: &Path, content: &str) -> MediaTarget {
    let target = content.trim_start_matches('\u{feff}').trim();

    let kind = if target.is_empty() {
        TargetKind::Invalid(ResolutionError::Empty {
            path: link_path.to_path_buf(),
        })
    } else if is_remote(target) {
        TargetKind::Remote
    } else if Path::new(target).is_file() {
        TargetKind::Local
    } else {
        TargetKind::Invalid(ResolutionError::TargetMissing {
            target: target.to_string(),
        })
    };

    MediaTarget {
        path: target.to_string(),
        kind,
    }
}

/// Whether a link target uses a network scheme.
///
/// Anything starting with `http` counts, as does any `scheme://` prefix other
/// than `file://`.
pub fn is_remote(target: &str) -> bool {
    if target
        .get(..4)
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case("http"))
    {
        return true;
    }

    match target.split_once("://") {
        Some((scheme, _)) => {
            scheme.len() > 1
                && scheme.starts_with(|c: char| c.is_ascii_alphabetic())
                && scheme
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
                && !scheme.eq_ignore_ascii_case("file")
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn write_link(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_local_target_with_trailing_whitespace() {
        let dir = tempdir().unwrap();
        let media = dir.path().join("Show.mkv");
        fs::write(&media, b"x").unwrap();
        let link = write_link(dir.path(), "Show.strm", &format!("  {}\r\n\n", media.display()));

        let target = resolve(&link);
        assert_eq!(target.kind, TargetKind::Local);
        assert_eq!(target.path, media.to_string_lossy());
        assert_eq!(target.local_path(), Some(media));
    }

    #[test]
    fn test_remote_targets() {
        let dir = tempdir().unwrap();
        for url in [
            "http://example.com/video.mkv",
            "HTTPS://example.com/video.mkv",
            "rtsp://camera.local/stream",
            "httpish-but-not-a-url",
        ] {
            let link = write_link(dir.path(), "a.strm", url);
            let target = resolve(&link);
            assert_eq!(target.kind, TargetKind::Remote, "{url}");
            assert_eq!(target.local_path(), None);
        }
    }

    #[test]
    fn test_empty_link() {
        let dir = tempdir().unwrap();
        let link = write_link(dir.path(), "a.strm", " \n\t ");
        assert_eq!(
            resolve(&link).kind,
            TargetKind::Invalid(ResolutionError::Empty { path: link })
        );
    }

    #[test]
    fn test_missing_local_target() {
        let dir = tempdir().unwrap();
        let link = write_link(dir.path(), "a.strm", "/mnt/missing/video.mkv");
        let target = resolve(&link);
        assert_eq!(
            target.kind,
            TargetKind::Invalid(ResolutionError::TargetMissing {
                target: "/mnt/missing/video.mkv".into()
            })
        );
    }

    #[test]
    fn test_unreadable_link() {
        let dir = tempdir().unwrap();
        let target = resolve(&dir.path().join("absent.strm"));
        assert!(target.path.is_empty());
        assert!(matches!(
            target.kind,
            TargetKind::Invalid(ResolutionError::Unreadable { .. })
        ));
    }

    #[test]
    fn test_directory_target_is_invalid() {
        let dir = tempdir().unwrap();
        let link = write_link(dir.path(), "a.strm", &dir.path().display().to_string());
        assert!(matches!(
            resolve(&link).kind,
            TargetKind::Invalid(ResolutionError::TargetMissing { .. })
        ));
    }

    #[test]
    fn test_relative_path_not_joined_to_link_dir() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("sibling-only-evermedia.mkv"), b"x").unwrap();
        let link = write_link(dir.path(), "a.strm", "sibling-only-evermedia.mkv");
        assert!(matches!(resolve(&link).kind, TargetKind::Invalid(_)));
    }

    #[test]
    fn test_byte_order_mark_is_ignored() {
        let dir = tempdir().unwrap();
        let link = write_link(dir.path(), "a.strm", "\u{feff}http://example.com/a.mkv");
        assert_eq!(resolve(&link).kind, TargetKind::Remote);
    }

    #[test]
    fn test_is_remote() {
        assert!(is_remote("http://a"));
        assert!(is_remote("udp://239.0.0.1:1234"));
        assert!(!is_remote("/mnt/media/a.mkv"));
        assert!(!is_remote("C:\\media\\a.mkv"));
        assert!(!is_remote("file:///mnt/a.mkv"));
        assert!(!is_remote("/weird/path://x"));
    }
}
