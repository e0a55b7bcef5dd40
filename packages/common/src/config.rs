use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_CONFIG_NAME: &str = "glimpse.config.json";

/// Preview engine configuration.
///
/// Every field has a default, so a partial (or empty) JSON object is valid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PreviewConfig {
    /// Import prefix mapped onto `source_root` (`@/components/x` -> `src/components/x`)
    pub alias_prefix: String,

    /// Directory holding application source, with trailing slash
    pub source_root: String,

    /// Extensions tried, in order, when a specifier has none
    pub source_extensions: Vec<String>,

    /// Conventional script entries, tried in order
    pub entry_candidates: Vec<String>,

    /// Root component file suffixes used when no script entry exists
    pub root_component_suffixes: Vec<String>,

    /// Path segment identifying the design-system component kit
    pub ui_kit_segment: String,

    /// Element id of the mount container
    pub mount_id: String,

    pub poll_policy: PollPolicy,

    /// Frames shown in the diagnostic overlay
    pub stack_trace_lines: usize,

    /// Characters of element text sent with inspect events
    pub text_snippet_len: usize,

    /// Asset contents at or below this many bytes are not treated as base64
    pub base64_threshold: usize,

    /// Re-render passes allowed before state churn is reported
    pub max_render_passes: usize,

    /// Nested call limit for previewed code
    pub max_call_depth: usize,
}

impl Default for PreviewConfig {
    fn default() -> Self {
        Self {
            alias_prefix: "@/".to_string(),
            source_root: "src/".to_string(),
            source_extensions: strings(&[".tsx", ".ts", ".jsx", ".js"]),
            entry_candidates: strings(&[
                "src/main.tsx",
                "src/main.jsx",
                "src/main.ts",
                "src/main.js",
                "src/index.tsx",
                "src/index.jsx",
                "src/index.js",
            ]),
            root_component_suffixes: strings(&["App.tsx", "App.jsx", "App.ts", "App.js"]),
            ui_kit_segment: "components/ui/".to_string(),
            mount_id: "root".to_string(),
            poll_policy: PollPolicy::default(),
            stack_trace_lines: 5,
            text_snippet_len: 50,
            base64_threshold: 64,
            max_render_passes: 10,
            max_call_depth: 200,
        }
    }
}

impl PreviewConfig {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

/// Interval/bound for awaiting runtime dependencies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PollPolicy {
    pub interval_ms: u64,
    pub max_attempts: u32,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval_ms: 100,
            max_attempts: 50,
        }
    }
}

impl PollPolicy {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}
