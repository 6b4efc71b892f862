//! Strategies for attributing a file path to a user.

use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ScanError;

/// Derives the owning user of a file from its path.
pub trait UserResolver: Send + Sync {
    /// Resolve the user for `path`, failing rather than guessing.
    fn resolve(&self, path: &Path) -> Result<String, ScanError>;
}

/// Takes the user from a fixed position among the path's normal components.
///
/// With `/home/lab/Multicell/alice/run1/a.nd2`, index 3 yields `alice`.
/// Root and prefix components are not counted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentIndex(pub usize);

impl UserResolver for SegmentIndex {
    fn resolve(&self, path: &Path) -> Result<String, ScanError> {
        path.components()
            .filter_map(|c| match c {
                Component::Normal(name) => Some(name),
                _ => None,
            })
            .nth(self.0)
            .map(|name| name.to_string_lossy().into_owned())
            .ok_or_else(|| ScanError::UserUnresolved {
                path: path.to_path_buf(),
                reason: format!("path has no segment at index {}", self.0),
            })
    }
}

/// Takes the user from the first component below a root directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelativeToRoot {
    root: PathBuf,
}

impl RelativeToRoot {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl UserResolver for RelativeToRoot {
    fn resolve(&self, path: &Path) -> Result<String, ScanError> {
        let relative = path
            .strip_prefix(&self.root)
            .map_err(|_| ScanError::UserUnresolved {
                path: path.to_path_buf(),
                reason: format!("not under scan root {}", self.root.display()),
            })?;

        let mut components = relative.components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(user)), Some(_)) => Ok(user.to_string_lossy().into_owned()),
            _ => Err(ScanError::UserUnresolved {
                path: path.to_path_buf(),
                reason: "file does not live inside a user directory".to_string(),
            }),
        }
    }
}

/// Configured user extraction strategy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum UserSegment {
    /// First directory below the scan root.
    #[default]
    Relative,
    /// Fixed index among the path's normal components.
    Index(usize),
}

impl UserSegment {
    /// Build the resolver for a scan rooted at `root`.
    pub fn resolver(&self, root: &Path) -> Box<dyn UserResolver> {
        match self {
            Self::Relative => Box::new(RelativeToRoot::new(root)),
            Self::Index(n) => Box::new(SegmentIndex(*n)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_segment_index() {
        let resolver = SegmentIndex(3);
        let user = resolver
            .resolve(Path::new("/home/lab/Multicell/alice/run1/a.nd2"))
            .unwrap();
        assert_eq!(user, "alice");
    }

    #[test]
    fn test_segment_index_too_shallow() {
        let resolver = SegmentIndex(5);
        let err = resolver.resolve(Path::new("/data/a.nd2")).unwrap_err();
        assert!(matches!(err, ScanError::UserUnresolved { .. }));
    }

    #[test]
    fn test_relative_to_root() {
        let resolver = RelativeToRoot::new("/data/microscopy");
        let user = resolver
            .resolve(Path::new("/data/microscopy/bob/2024/x.nd2"))
            .unwrap();
        assert_eq!(user, "bob");
    }

    #[test]
    fn test_relative_rejects_files_outside_root() {
        let resolver = RelativeToRoot::new("/data/microscopy");
        assert!(resolver.resolve(Path::new("/elsewhere/bob/x.nd2")).is_err());
        // Directly in the root: no user directory.
        assert!(resolver.resolve(Path::new("/data/microscopy/x.nd2")).is_err());
    }

    #[test]
    fn test_user_segment_deserialize() {
        #[derive(Deserialize)]
        struct Wrapper {
            segment: UserSegment,
        }

        let w: Wrapper = toml::from_str("segment = \"relative\"").unwrap();
        assert_eq!(w.segment, UserSegment::Relative);

        let w: Wrapper = toml::from_str("segment = { index = 3 }").unwrap();
        assert_eq!(w.segment, UserSegment::Index(3));
    }
}
