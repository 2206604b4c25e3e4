//! File system access used while loading a [`Program`](crate::Program).
//!
//! Loading, module resolution and `package.json` lookup all go through the
//! [`FileSystem`] trait so that a project can be transformed from disk
//! ([`OsFs`]) or entirely from memory ([`MemoryFs`]).

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use crate::marker;

/// Read-only view of the files a program is loaded from.
pub trait FileSystem {
    /// Read a whole file as UTF-8.
    fn read_to_string(&self, path: &Path) -> io::Result<String>;

    /// Whether `path` names an existing regular file.
    fn is_file(&self, path: &Path) -> bool;
}

/// The operating system's file system.
#[derive(Debug, Clone, Copy, Default)]
pub struct OsFs;

impl FileSystem for OsFs {
    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        fs::read_to_string(path)
    }

    fn is_file(&self, path: &Path) -> bool {
        path.is_file()
    }
}

/// An in-memory file system keyed by normalized absolute paths.
///
/// # Example
///
/// ```
/// use std::path::Path;
/// use ts_json_schema_transform::{FileSystem, MemoryFs};
///
/// let fs = MemoryFs::new().with_file("/src/index.ts", "export const a = 1;");
/// assert!(fs.is_file(Path::new("/src/./index.ts")));
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemoryFs {
    files: BTreeMap<PathBuf, String>,
}

impl MemoryFs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a file.
    pub fn insert(&mut self, path: impl AsRef<Path>, contents: impl Into<String>) -> &mut Self {
        self.files
            .insert(normalize_path(path.as_ref()), contents.into());
        self
    }

    /// Builder form of [`insert`](MemoryFs::insert).
    pub fn with_file(mut self, path: impl AsRef<Path>, contents: impl Into<String>) -> Self {
        self.insert(path, contents);
        self
    }

    /// Mount the marker package under `<root>/node_modules/ts-transform-json-schema`.
    pub fn with_marker_package(mut self, root: impl AsRef<Path>) -> Self {
        let dir = root
            .as_ref()
            .join("node_modules")
            .join(marker::DEFAULT_PACKAGE_NAME);
        self.insert(dir.join("package.json"), marker::PACKAGE_JSON);
        self.insert(dir.join("from-type.d.ts"), marker::DECLARATION_SOURCE);
        self.insert(dir.join("from-type.ts"), marker::IMPLEMENTATION_SOURCE);
        self
    }

    /// Iterate over all stored paths in sorted order.
    pub fn paths(&self) -> impl Iterator<Item = &Path> {
        self.files.keys().map(PathBuf::as_path)
    }
}

impl FileSystem for MemoryFs {
    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        self.files
            .get(&normalize_path(path))
            .cloned()
            .ok_or_else(|| {
                io::Error::new(
                    io::ErrorKind::NotFound,
                    format!("{} does not exist", path.display()),
                )
            })
    }

    fn is_file(&self, path: &Path) -> bool {
        self.files.contains_key(&normalize_path(path))
    }
}

impl<F: FileSystem + ?Sized> FileSystem for &F {
    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        (**self).read_to_string(path)
    }

    fn is_file(&self, path: &Path) -> bool {
        (**self).is_file(path)
    }
}

/// Lexically normalize a path, folding `.` and `..` components.
///
/// No file system access happens here, so symlinks are not followed. A `..`
/// that would climb above the root is dropped.
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                let ends_in_normal = matches!(out.components().next_back(), Some(Component::Normal(_)));
                if ends_in_normal {
                    out.pop();
                } else if !out.has_root() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_folds_dots() {
        assert_eq!(
            normalize_path(Path::new("/a/b/../c/./d.ts")),
            PathBuf::from("/a/c/d.ts")
        );
        assert_eq!(normalize_path(Path::new("/../a")), PathBuf::from("/a"));
        assert_eq!(normalize_path(Path::new("../a/./b")), PathBuf::from("../a/b"));
    }

    #[test]
    fn test_memory_fs_lookup_is_normalized() {
        let fs = MemoryFs::new().with_file("/src/lib/../index.ts", "x");
        assert!(fs.is_file(Path::new("/src/index.ts")));
        assert_eq!(fs.read_to_string(Path::new("/src/./index.ts")).unwrap(), "x");
        assert!(fs.read_to_string(Path::new("/missing.ts")).is_err());
    }

    #[test]
    fn test_marker_package_mount() {
        let fs = MemoryFs::new().with_marker_package("/");
        assert!(fs.is_file(Path::new(
            "/node_modules/ts-transform-json-schema/from-type.d.ts"
        )));
        assert!(fs.is_file(Path::new(
            "/node_modules/ts-transform-json-schema/package.json"
        )));
    }
}
