//! Reading a project from disk into a [`VirtualFileStore`].

use anyhow::{anyhow, Context, Result};
use base64::Engine;
use glimpse_common::VirtualFileStore;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tracing::debug;
use walkdir::{DirEntry, WalkDir};

const SKIPPED_DIRS: &[&str] = &["node_modules", ".git", "dist", "build", "target"];

/// `{ "files": { path: content } }`, or the bare map
#[derive(Deserialize)]
#[serde(untagged)]
enum FilesDocument {
    Request { files: BTreeMap<String, String> },
    Map(BTreeMap<String, String>),
}

/// Load a project directory, or a `.json` file map
pub fn load(input: &Path) -> Result<VirtualFileStore> {
    if input.is_dir() {
        load_dir(input)
    } else if input.is_file() {
        load_json(input)
    } else {
        Err(anyhow!("Input path does not exist: {}", input.display()))
    }
}

pub fn load_json(path: &Path) -> Result<VirtualFileStore> {
    let content = fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let document: FilesDocument =
        serde_json::from_str(&content).with_context(|| format!("{} is not a file map", path.display()))?;
    let files = match document {
        FilesDocument::Request { files } | FilesDocument::Map(files) => files,
    };
    Ok(VirtualFileStore::new(files))
}

fn is_skipped(entry: &DirEntry) -> bool {
    entry.depth() > 0
        && entry.file_type().is_dir()
        && entry
            .file_name()
            .to_str()
            .map_or(false, |name| SKIPPED_DIRS.contains(&name))
}

/// Every file under `root`; binary files are stored base64 encoded
pub fn load_dir(root: &Path) -> Result<VirtualFileStore> {
    let mut files = Vec::new();

    for entry in WalkDir::new(root)
        .follow_links(true)
        .into_iter()
        .filter_entry(|e| !is_skipped(e))
        .filter_map(|e| e.ok())
    {
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        let relative = path.strip_prefix(root).unwrap_or(path);
        let key = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");

        let bytes = fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
        let content = match String::from_utf8(bytes) {
            Ok(text) => text,
            Err(err) => base64::engine::general_purpose::STANDARD.encode(err.into_bytes()),
        };
        files.push((key, content));
    }

    debug!(root = %root.display(), files = files.len(), "project loaded");
    Ok(VirtualFileStore::new(files))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_dir() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("src/components")).unwrap();
        fs::create_dir_all(root.join("node_modules/react")).unwrap();
        fs::create_dir_all(root.join("public")).unwrap();
        fs::write(root.join("src/App.tsx"), "export default () => null;").unwrap();
        fs::write(root.join("src/components/Card.tsx"), "export const Card = 1;").unwrap();
        fs::write(root.join("node_modules/react/index.js"), "module.exports = {};").unwrap();
        fs::write(root.join("public/pixel.png"), [0x89, 0x50, 0x4e, 0x47, 0xff, 0x00]).unwrap();

        let store = load(root).unwrap();
        let paths: Vec<&str> = store.paths().collect();
        assert_eq!(paths, vec!["public/pixel.png", "src/App.tsx", "src/components/Card.tsx"]);
        assert_eq!(store.get("public/pixel.png"), Some("iVBOR/8A"));
    }

    #[test]
    fn test_load_json_forms() {
        let dir = tempfile::tempdir().unwrap();
        let request = dir.path().join("request.json");
        fs::write(&request, r#"{ "files": { "/src/App.tsx": "export default 1;" } }"#).unwrap();
        let bare = dir.path().join("bare.json");
        fs::write(&bare, r#"{ "src/App.tsx": "export default 2;" }"#).unwrap();

        assert_eq!(load(&request).unwrap().get("src/App.tsx"), Some("export default 1;"));
        assert_eq!(load(&bare).unwrap().get("src/App.tsx"), Some("export default 2;"));
    }

    #[test]
    fn test_missing_input() {
        let dir = tempfile::tempdir().unwrap();
        let err = load(&dir.path().join("nope")).unwrap_err();
        assert!(err.to_string().contains("does not exist"));
    }
}
