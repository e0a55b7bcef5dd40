use crate::store::{normalize_path, VirtualFileStore};
use std::collections::BTreeMap;

/// File lookup abstraction for module resolution and testing.
///
/// Paths are virtual forward-slash paths, never touching the host disk.
pub trait FileSystem {
    /// Check if a file exists
    fn exists(&self, path: &str) -> bool;

    /// Read a file's content
    fn read(&self, path: &str) -> Option<&str>;
}

impl FileSystem for VirtualFileStore {
    fn exists(&self, path: &str) -> bool {
        self.contains(path)
    }

    fn read(&self, path: &str) -> Option<&str> {
        self.get(path)
    }
}

/// Mock file system for testing
#[derive(Debug, Default)]
pub struct MockFileSystem {
    pub files: BTreeMap<String, String>,
}

impl MockFileSystem {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_file(&mut self, path: &str, content: &str) {
        self.files.insert(normalize_path(path), content.to_string());
    }

    pub fn with_file(mut self, path: &str, content: &str) -> Self {
        self.add_file(path, content);
        self
    }
}

impl FileSystem for MockFileSystem {
    fn exists(&self, path: &str) -> bool {
        self.files.contains_key(path)
    }

    fn read(&self, path: &str) -> Option<&str> {
        self.files.get(path).map(String::as_str)
    }
}
