//! Virtual assets
//!
//! Binary files arrive in the file map as data URIs or base64 text. They are
//! registered under their public path once per session, and the renderer
//! consults the registry through [`ResourceRewriteHook`] whenever it binds an
//! image source attribute or an inline style value.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use glimpse_common::{extension, VirtualFileStore};
use std::collections::BTreeMap;
use tracing::debug;

pub const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "svg", "webp", "ico", "bmp", "avif"];

/// Intercepts resource URLs while the renderer binds attributes
pub trait ResourceRewriteHook {
    /// Replacement for a source attribute of an image-like element
    fn rewrite_attribute(&self, tag: &str, attr: &str, value: &str) -> Option<String>;

    /// Replacement for a CSS property value referencing a registered path
    fn rewrite_style_value(&self, value: &str) -> Option<String>;
}

/// Hook that leaves every value untouched
pub struct NoRewrite;

impl ResourceRewriteHook for NoRewrite {
    fn rewrite_attribute(&self, _tag: &str, _attr: &str, _value: &str) -> Option<String> {
        None
    }

    fn rewrite_style_value(&self, _value: &str) -> Option<String> {
        None
    }
}

/// Normalised public path -> data URI
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VirtualAssetRegistry {
    entries: BTreeMap<String, String>,
}

impl VirtualAssetRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register every image-like entry of the store
    pub fn build(store: &VirtualFileStore, base64_threshold: usize) -> Self {
        let mut registry = Self::new();
        for (path, content) in store.iter() {
            if !is_image_like(path, content) {
                continue;
            }
            match to_data_uri(path, content, base64_threshold) {
                Some(uri) => registry.insert(path, uri),
                None => debug!(path, len = content.len(), "skipping asset too short to be base64"),
            }
        }
        registry
    }

    pub fn insert(&mut self, file_path: &str, data_uri: String) {
        self.entries.insert(public_path(file_path), data_uri);
    }

    /// Look up by registered public path
    pub fn get(&self, public_path: &str) -> Option<&str> {
        self.entries.get(public_path).map(String::as_str)
    }

    /// Look up an arbitrary URL as written in markup
    pub fn lookup(&self, target: &str) -> Option<&str> {
        self.get(&effective_path(target))
    }

    /// Data URI for a store path, if it was registered
    pub fn for_file(&self, file_path: &str) -> Option<&str> {
        self.get(&public_path(file_path))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Replace every registered public path occurring in `text`
    pub fn rewrite_text(&self, text: &str) -> Option<String> {
        // Longest paths first so `/a/logo.png` is not clobbered by `/logo.png`
        let mut paths: Vec<_> = self.entries.iter().collect();
        paths.sort_by(|a, b| b.0.len().cmp(&a.0.len()));

        let mut out: Option<String> = None;
        for (path, uri) in paths {
            let current = out.as_deref().unwrap_or(text);
            if current.contains(path.as_str()) {
                out = Some(current.replace(path.as_str(), uri));
            }
        }
        out
    }
}

impl ResourceRewriteHook for VirtualAssetRegistry {
    fn rewrite_attribute(&self, tag: &str, attr: &str, value: &str) -> Option<String> {
        if !is_source_attribute(tag, attr) || value.starts_with("data:") {
            return None;
        }
        self.lookup(value).map(str::to_string)
    }

    fn rewrite_style_value(&self, value: &str) -> Option<String> {
        if self.entries.is_empty() {
            return None;
        }
        self.rewrite_text(value)
    }
}

/// `src` on img/image/source/video, `href`/`xlink:href` on SVG `image`, `poster` on video
pub fn is_source_attribute(tag: &str, attr: &str) -> bool {
    match (tag, attr) {
        ("img" | "image" | "source" | "video", "src") => true,
        ("image", "href" | "xlink:href" | "xlinkHref") => true,
        ("video", "poster") => true,
        _ => false,
    }
}

pub fn is_image_like(path: &str, content: &str) -> bool {
    let by_extension = extension(path).map_or(false, |ext| {
        IMAGE_EXTENSIONS.iter().any(|image| image.eq_ignore_ascii_case(ext))
    });
    by_extension || content.trim_start().starts_with("data:")
}

/// Registry key for a store path: leading `/`, `public/` stripped
pub fn public_path(file_path: &str) -> String {
    let trimmed = file_path.trim_start_matches('/');
    let trimmed = trimmed.strip_prefix("public/").unwrap_or(trimmed);
    format!("/{}", trimmed)
}

/// Normalise a URL as written in markup to a registry key
pub fn effective_path(target: &str) -> String {
    let mut path = target.trim();
    for scheme in ["http://", "https://"] {
        if let Some(rest) = path.strip_prefix(scheme) {
            path = match rest.find('/') {
                Some(slash) => &rest[slash..],
                None => "/",
            };
        }
    }
    if let Some(cut) = path.find(|c| c == '?' || c == '#') {
        path = &path[..cut];
    }
    let path = path.trim_start_matches('.');
    let path = if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{}", path)
    };
    match path.strip_prefix("/public") {
        Some(rest) if rest.starts_with('/') => rest.to_string(),
        _ => path,
    }
}

pub fn mime_type(path: &str) -> String {
    let ext = extension(path).unwrap_or("png").to_ascii_lowercase();
    let subtype = match ext.as_str() {
        "jpg" => "jpeg",
        "svg" => "svg+xml",
        "ico" => "x-icon",
        other => other,
    };
    format!("image/{}", subtype)
}

/// Data URI for an asset entry; `None` for short blobs that are not markup
pub fn to_data_uri(path: &str, content: &str, base64_threshold: usize) -> Option<String> {
    let trimmed = content.trim();
    if trimmed.starts_with("data:") {
        return Some(trimmed.to_string());
    }

    let is_svg = extension(path).map_or(false, |ext| ext.eq_ignore_ascii_case("svg"));
    if is_svg && trimmed.starts_with('<') {
        return Some(format!(
            "data:image/svg+xml;base64,{}",
            STANDARD.encode(trimmed.as_bytes())
        ));
    }

    if trimmed.len() > base64_threshold {
        let blob: String = trimmed.chars().filter(|c| !c.is_whitespace()).collect();
        return Some(format!("data:{};base64,{}", mime_type(path), blob));
    }

    None
}

/// Concatenate every stylesheet in sorted order with asset paths rewritten
pub fn collect_stylesheet(store: &VirtualFileStore, registry: &VirtualAssetRegistry) -> String {
    let mut css = String::new();
    for (path, content) in store.stylesheets() {
        css.push_str(&format!("/* {} */\n", path));
        css.push_str(content);
        if !content.ends_with('\n') {
            css.push('\n');
        }
    }
    registry.rewrite_text(&css).unwrap_or(css)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG_BASE64: &str = "iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJAAAADUlEQVR42mNkYPhfDwAChwGA60e6kgAAAABJRU5ErkJggg==";

    fn store() -> VirtualFileStore {
        VirtualFileStore::new(vec![
            ("public/logo.png", PNG_BASE64),
            ("src/assets/icon.svg", "<svg xmlns=\"http://www.w3.org/2000/svg\"></svg>"),
            ("src/assets/photo.jpg", "data:image/jpeg;base64,AAAA"),
            ("src/assets/tiny.gif", "R0lG"),
            ("src/App.tsx", "export default () => null"),
        ])
    }

    #[test]
    fn test_build_registry() {
        let registry = VirtualAssetRegistry::build(&store(), 64);
        assert_eq!(registry.len(), 3);
        assert_eq!(
            registry.get("/logo.png"),
            Some(format!("data:image/png;base64,{}", PNG_BASE64).as_str())
        );
        assert!(registry
            .get("/src/assets/icon.svg")
            .unwrap()
            .starts_with("data:image/svg+xml;base64,"));
        assert_eq!(
            registry.get("/src/assets/photo.jpg"),
            Some("data:image/jpeg;base64,AAAA")
        );
        assert_eq!(registry.get("/src/assets/tiny.gif"), None);
    }

    #[test]
    fn test_effective_path() {
        assert_eq!(effective_path("/logo.png"), "/logo.png");
        assert_eq!(effective_path("logo.png"), "/logo.png");
        assert_eq!(effective_path("./logo.png?v=2"), "/logo.png");
        assert_eq!(effective_path("/public/logo.png"), "/logo.png");
        assert_eq!(effective_path("https://preview.local/logo.png#x"), "/logo.png");
        assert_eq!(effective_path("/publication.png"), "/publication.png");
    }

    #[test]
    fn test_rewrite_hook() {
        let registry = VirtualAssetRegistry::build(&store(), 64);
        let rewritten = registry.rewrite_attribute("img", "src", "/logo.png");
        assert!(rewritten.unwrap().starts_with("data:image/png"));
        assert_eq!(registry.rewrite_attribute("a", "href", "/logo.png"), None);
        assert_eq!(registry.rewrite_attribute("img", "src", "/missing.png"), None);

        let style = registry
            .rewrite_style_value("url(/logo.png) no-repeat")
            .unwrap();
        assert!(style.starts_with("url(data:image/png;base64,"));
        assert_eq!(registry.rewrite_style_value("red"), None);
    }

    #[test]
    fn test_mime_type() {
        assert_eq!(mime_type("a.jpg"), "image/jpeg");
        assert_eq!(mime_type("a.svg"), "image/svg+xml");
        assert_eq!(mime_type("favicon.ico"), "image/x-icon");
        assert_eq!(mime_type("a.webp"), "image/webp");
    }

    #[test]
    fn test_collect_stylesheet_rewrites_paths() {
        let store = VirtualFileStore::new(vec![
            ("public/logo.png", PNG_BASE64),
            ("src/index.css", ".hero { background: url('/logo.png'); }"),
        ]);
        let registry = VirtualAssetRegistry::build(&store, 64);
        let css = collect_stylesheet(&store, &registry);
        assert!(css.contains("/* src/index.css */"));
        assert!(css.contains("url('data:image/png;base64,"));
    }
}
