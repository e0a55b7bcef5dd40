use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One submitted file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
    pub path: String,
    pub content: String,
}

/// Extensions the transformer compiles
pub const CODE_EXTENSIONS: &[&str] = &["tsx", "ts", "jsx", "js", "mjs", "cjs"];

/// Immutable `path -> content` snapshot for one preview session.
///
/// Paths are forward-slash and relative to the project root. Iteration is in
/// sorted path order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VirtualFileStore {
    files: BTreeMap<String, String>,
}

impl VirtualFileStore {
    pub fn new<I, P, C>(files: I) -> Self
    where
        I: IntoIterator<Item = (P, C)>,
        P: AsRef<str>,
        C: Into<String>,
    {
        let files = files
            .into_iter()
            .map(|(path, content)| (normalize_path(path.as_ref()), content.into()))
            .collect();
        Self { files }
    }

    pub fn from_entries(entries: Vec<FileEntry>) -> Self {
        Self::new(entries.into_iter().map(|e| (e.path, e.content)))
    }

    pub fn get(&self, path: &str) -> Option<&str> {
        self.files.get(path).map(String::as_str)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.files.contains_key(path)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.files.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.files.iter().map(|(p, c)| (p.as_str(), c.as_str()))
    }

    /// Files the transformer should compile, in sorted order
    pub fn code_files(&self) -> impl Iterator<Item = (&str, &str)> {
        self.iter().filter(|(path, _)| is_code_file(path))
    }

    /// Stylesheets in sorted order
    pub fn stylesheets(&self) -> impl Iterator<Item = (&str, &str)> {
        self.iter().filter(|(path, _)| extension(path) == Some("css"))
    }

    pub fn entries(&self) -> Vec<FileEntry> {
        self.iter()
            .map(|(path, content)| FileEntry {
                path: path.to_string(),
                content: content.to_string(),
            })
            .collect()
    }

    pub fn to_map(&self) -> BTreeMap<String, String> {
        self.files.clone()
    }
}

/// Forward slashes, no leading `./` or `/`
pub fn normalize_path(path: &str) -> String {
    let path = path.replace('\\', "/");
    let mut path = path.as_str();
    loop {
        if let Some(rest) = path.strip_prefix("./") {
            path = rest;
        } else if let Some(rest) = path.strip_prefix('/') {
            path = rest;
        } else {
            break;
        }
    }
    path.to_string()
}

/// Lower-cased extension without the dot
pub fn extension(path: &str) -> Option<&str> {
    let name = path.rsplit('/').next().unwrap_or(path);
    let dot = name.rfind('.')?;
    if dot == 0 {
        return None;
    }
    Some(&name[dot + 1..])
}

pub fn is_code_file(path: &str) -> bool {
    extension(path).map_or(false, |ext| {
        CODE_EXTENSIONS.iter().any(|code| code.eq_ignore_ascii_case(ext))
    })
}

/// File name without directory or extension: `src/pages/Home.tsx` -> `Home`
pub fn file_stem(path: &str) -> &str {
    let name = path.rsplit('/').next().unwrap_or(path);
    match name.rfind('.') {
        Some(dot) if dot > 0 => &name[..dot],
        _ => name,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths_are_normalized_and_sorted() {
        let store = VirtualFileStore::new(vec![
            ("./src/main.tsx", "main"),
            ("/index.html", "<html>"),
            ("src\\App.tsx", "app"),
        ]);

        let paths: Vec<_> = store.paths().collect();
        assert_eq!(paths, vec!["index.html", "src/App.tsx", "src/main.tsx"]);
        assert_eq!(store.get("src/App.tsx"), Some("app"));
    }

    #[test]
    fn test_code_files() {
        let store = VirtualFileStore::new(vec![
            ("src/App.tsx", ""),
            ("src/index.css", ""),
            ("public/logo.png", ""),
            ("src/lib/utils.ts", ""),
        ]);
        let code: Vec<_> = store.code_files().map(|(p, _)| p).collect();
        assert_eq!(code, vec!["src/App.tsx", "src/lib/utils.ts"]);
        assert_eq!(store.stylesheets().count(), 1);
    }

    #[test]
    fn test_file_stem() {
        assert_eq!(file_stem("src/pages/Home.tsx"), "Home");
        assert_eq!(file_stem("src/components/ui/button"), "button");
        assert_eq!(file_stem(".env"), ".env");
        assert_eq!(extension("src/.env"), None);
        assert_eq!(extension("a/b.test.tsx"), Some("tsx"));
    }
}
