/// Module path resolution
///
/// Maps an import specifier, as written in one virtual file, to the path of
/// another virtual file by alias expansion, relative joining and extension
/// probing. Deterministic and uncached.
use glimpse_common::{FileSystem, PreviewConfig};
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ResolverError {
    #[error("Import not found: {import_path} imported by {source_path}")]
    ImportNotFound {
        import_path: String,
        source_path: String,
    },
}

/// Resolves specifiers against a virtual file system
#[derive(Clone, Debug)]
pub struct Resolver {
    alias_prefix: String,
    source_root: String,
    extensions: Vec<String>,
}

impl Default for Resolver {
    fn default() -> Self {
        Self::from_config(&PreviewConfig::default())
    }
}

impl Resolver {
    pub fn new(alias_prefix: &str, source_root: &str, extensions: Vec<String>) -> Self {
        let mut source_root = source_root.trim_start_matches('/').to_string();
        if !source_root.is_empty() && !source_root.ends_with('/') {
            source_root.push('/');
        }
        Self {
            alias_prefix: alias_prefix.to_string(),
            source_root,
            extensions,
        }
    }

    pub fn from_config(config: &PreviewConfig) -> Self {
        Self::new(
            &config.alias_prefix,
            &config.source_root,
            config.source_extensions.clone(),
        )
    }

    pub fn source_root(&self) -> &str {
        &self.source_root
    }

    /// Resolve `specifier` imported by `requesting_file`; `None` means unknown module
    pub fn resolve(
        &self,
        specifier: &str,
        requesting_file: &str,
        fs: &dyn FileSystem,
    ) -> Option<String> {
        let joined = if let Some(rest) = specifier.strip_prefix(self.alias_prefix.as_str()) {
            format!("{}{}", self.source_root, rest)
        } else if is_relative(specifier) {
            let dir = match requesting_file.rfind('/') {
                Some(slash) => &requesting_file[..slash],
                None => "",
            };
            format!("{}/{}", dir, specifier)
        } else {
            specifier.to_string()
        };

        let base = normalize_segments(&joined);
        if let Some(found) = self.find_candidate(&base, fs) {
            debug!(specifier, from = requesting_file, resolved = %found, "resolved module");
            return Some(found);
        }

        if !self.source_root.is_empty() && !base.starts_with(self.source_root.as_str()) {
            let rooted = format!("{}{}", self.source_root, base);
            if let Some(found) = self.find_candidate(&rooted, fs) {
                debug!(specifier, from = requesting_file, resolved = %found, "resolved module under source root");
                return Some(found);
            }
        }

        None
    }

    /// Resolve import path relative to importing file, as an error when missing
    pub fn resolve_import_path(
        &self,
        import_path: &str,
        importing_file: &str,
        fs: &dyn FileSystem,
    ) -> Result<String, ResolverError> {
        self.resolve(import_path, importing_file, fs)
            .ok_or_else(|| ResolverError::ImportNotFound {
                import_path: import_path.to_string(),
                source_path: importing_file.to_string(),
            })
    }

    /// Verbatim, then each extension, then `/index` + each extension
    fn find_candidate(&self, base: &str, fs: &dyn FileSystem) -> Option<String> {
        if base.is_empty() {
            return None;
        }
        if fs.exists(base) {
            return Some(base.to_string());
        }
        for ext in &self.extensions {
            let candidate = format!("{}{}", base, ext);
            if fs.exists(&candidate) {
                return Some(candidate);
            }
        }
        for ext in &self.extensions {
            let candidate = format!("{}/index{}", base, ext);
            if fs.exists(&candidate) {
                return Some(candidate);
            }
        }
        None
    }

    /// Whether a specifier names a local file rather than a package
    pub fn is_local(&self, specifier: &str) -> bool {
        is_relative(specifier)
            || specifier.starts_with(self.alias_prefix.as_str())
            || specifier.starts_with('/')
            || specifier.starts_with(self.source_root.as_str())
    }
}

pub fn is_relative(specifier: &str) -> bool {
    specifier.starts_with("./")
        || specifier.starts_with("../")
        || specifier == "."
        || specifier == ".."
}

/// Collapse `.`, empty and `..` segments; `..` above the root is dropped
pub fn normalize_segments(path: &str) -> String {
    let mut stack: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                stack.pop();
            }
            other => stack.push(other),
        }
    }
    stack.join("/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use glimpse_common::MockFileSystem;

    fn fs() -> MockFileSystem {
        MockFileSystem::new()
            .with_file("src/App.tsx", "")
            .with_file("src/main.tsx", "")
            .with_file("src/components/Header.tsx", "")
            .with_file("src/components/ui/index.ts", "")
            .with_file("src/lib/utils.ts", "")
            .with_file("src/assets/logo.svg", "")
            .with_file("src/data.json", "")
    }

    #[test]
    fn test_relative_with_extension_probing() {
        let resolver = Resolver::default();
        assert_eq!(
            resolver.resolve("./App", "src/main.tsx", &fs()),
            Some("src/App.tsx".to_string())
        );
        assert_eq!(
            resolver.resolve("../App", "src/components/Header.tsx", &fs()),
            Some("src/App.tsx".to_string())
        );
    }

    #[test]
    fn test_alias_and_index() {
        let resolver = Resolver::default();
        let fs = fs();
        assert_eq!(
            resolver.resolve("@/lib/utils", "src/App.tsx", &fs),
            Some("src/lib/utils.ts".to_string())
        );
        assert_eq!(
            resolver.resolve("@/components/ui", "src/App.tsx", &fs),
            Some("src/components/ui/index.ts".to_string())
        );
    }

    #[test]
    fn test_verbatim_match_wins() {
        let resolver = Resolver::default();
        assert_eq!(
            resolver.resolve("./assets/logo.svg", "src/App.tsx", &fs()),
            Some("src/assets/logo.svg".to_string())
        );
        assert_eq!(
            resolver.resolve("./data.json", "src/App.tsx", &fs()),
            Some("src/data.json".to_string())
        );
    }

    #[test]
    fn test_source_root_retry() {
        let resolver = Resolver::default();
        assert_eq!(
            resolver.resolve("components/Header", "src/App.tsx", &fs()),
            Some("src/components/Header.tsx".to_string())
        );
        assert_eq!(
            resolver.resolve("/src/App", "src/main.tsx", &fs()),
            Some("src/App.tsx".to_string())
        );
    }

    #[test]
    fn test_unknown_is_none() {
        let resolver = Resolver::default();
        assert_eq!(resolver.resolve("react", "src/App.tsx", &fs()), None);
        assert_eq!(resolver.resolve("./Missing", "src/App.tsx", &fs()), None);
        assert!(matches!(
            resolver.resolve_import_path("./Missing", "src/App.tsx", &fs()),
            Err(ResolverError::ImportNotFound { .. })
        ));
    }

    #[test]
    fn test_custom_alias() {
        let resolver = Resolver::new("~/", "app", vec![".tsx".to_string()]);
        let fs = MockFileSystem::new().with_file("app/Home.tsx", "");
        assert_eq!(
            resolver.resolve("~/Home", "app/index.tsx", &fs),
            Some("app/Home.tsx".to_string())
        );
    }

    #[test]
    fn test_normalize_segments() {
        assert_eq!(normalize_segments("src/./a/../b//c.ts"), "src/b/c.ts");
        assert_eq!(normalize_segments("../../x"), "x");
    }
}
