//! Resource location resolution
//!
//! This module handles resolution of schema locations (file paths, URLs,
//! in-memory identifiers) and of relative references between them.

use crate::error::Result;
use std::fmt;
use std::path::{Component, Path, PathBuf};
use url::Url;

/// Resource location - can be a URL, file path, or string identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Location {
    /// File system path
    Path(PathBuf),
    /// URL (http, https, etc.)
    Url(Url),
    /// String identifier (for in-memory resources)
    String(String),
}

impl Location {
    /// Create a location from a string (auto-detect type)
    pub fn from_str(s: &str) -> Result<Self> {
        if let Ok(url) = Url::parse(s) {
            if url.scheme() != "file" {
                return Ok(Location::Url(url));
            }
            if let Ok(path) = url.to_file_path() {
                return Ok(Location::Path(path));
            }
        }

        let path = PathBuf::from(s);
        if path.exists() || s.starts_with('/') || s.starts_with('.') {
            return Ok(Location::Path(path));
        }

        Ok(Location::String(s.to_string()))
    }

    /// Resolve a reference (file part of a `$ref`) relative to this location
    pub fn join(&self, reference: &str) -> Result<Location> {
        if let Ok(url) = Url::parse(reference) {
            if url.scheme() != "file" {
                return Ok(Location::Url(url));
            }
        }

        match self {
            Location::Path(path) => {
                let candidate = Path::new(reference);
                if candidate.is_absolute() {
                    return Ok(Location::Path(candidate.to_path_buf()));
                }
                let base = path.parent().unwrap_or_else(|| Path::new(""));
                Ok(Location::Path(normalize_path(&base.join(candidate))))
            }
            Location::Url(url) => Ok(Location::Url(url.join(reference)?)),
            Location::String(_) => Ok(Location::String(reference.to_string())),
        }
    }

    /// Get the location as a string
    pub fn as_str(&self) -> String {
        match self {
            Location::Path(p) => p.to_string_lossy().to_string(),
            Location::Url(u) => u.to_string(),
            Location::String(s) => s.clone(),
        }
    }

    /// File name without extension, used as the default class name
    pub fn file_stem(&self) -> Option<String> {
        let name = match self {
            Location::Path(p) => p.file_stem()?.to_string_lossy().to_string(),
            Location::Url(u) => u.path_segments()?.last()?.to_string(),
            Location::String(s) => s.rsplit('/').next()?.to_string(),
        };
        let stem = name.split('.').next().unwrap_or_default().to_string();
        if stem.is_empty() {
            None
        } else {
            Some(stem)
        }
    }

    /// Check if this is a remote location (URL)
    pub fn is_remote(&self) -> bool {
        matches!(self, Location::Url(_))
    }

    /// Check if this is a local file
    pub fn is_file(&self) -> bool {
        matches!(self, Location::Path(_))
    }
}

/// Remove `.` and `..` components without touching the filesystem
fn normalize_path(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !normalized.pop() {
                    normalized.push("..");
                }
            }
            other => normalized.push(other.as_os_str()),
        }
    }
    normalized
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_location_from_url() {
        let loc = Location::from_str("http://example.com/person.json").unwrap();
        assert!(matches!(loc, Location::Url(_)));
        assert!(loc.is_remote());
    }

    #[test]
    fn test_location_from_path() {
        let loc = Location::from_str("/tmp/person.json").unwrap();
        assert!(matches!(loc, Location::Path(_)));
        assert!(loc.is_file());
    }

    #[test]
    fn test_location_as_str() {
        let loc = Location::String("test".to_string());
        assert_eq!(loc.as_str(), "test");
    }

    #[test]
    fn test_join_relative_path() {
        let loc = Location::Path(PathBuf::from("/schemas/api/person.json"));
        let joined = loc.join("address.json").unwrap();
        assert_eq!(joined, Location::Path(PathBuf::from("/schemas/api/address.json")));
    }

    #[test]
    fn test_join_parent_directory() {
        let loc = Location::Path(PathBuf::from("/schemas/api/person.json"));
        let joined = loc.join("../common/./id.json").unwrap();
        assert_eq!(joined, Location::Path(PathBuf::from("/schemas/common/id.json")));
    }

    #[test]
    fn test_join_url() {
        let loc = Location::from_str("https://example.com/schemas/person.json").unwrap();
        let joined = loc.join("common/address.json").unwrap();
        assert_eq!(joined.as_str(), "https://example.com/schemas/common/address.json");
    }

    #[test]
    fn test_file_stem() {
        let loc = Location::Path(PathBuf::from("/schemas/person.schema.json"));
        assert_eq!(loc.file_stem().as_deref(), Some("person"));
        assert_eq!(Location::String("inline".into()).file_stem().as_deref(), Some("inline"));
    }
}
