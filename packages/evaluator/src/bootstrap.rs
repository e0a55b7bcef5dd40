//! Bootstrapper: waits for the runtime, then locates the entry file.
//!
//! Mounting itself lives on [`crate::session::PreviewSession`]; this module
//! holds the parts that do not need a live evaluator.

use crate::evaluator::EvalError;
use crate::value::Value;
use glimpse_common::{PollPolicy, PreviewConfig, VirtualFileStore};
use std::collections::HashMap;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Error, Debug, Clone)]
pub enum BootError {
    #[error("Failed to load libraries: {missing} unavailable after {attempts} attempts")]
    DependencyTimeout { missing: String, attempts: u32 },

    #[error("No entry file found; tried {tried} and files ending in {suffixes}")]
    NoEntry { tried: String, suffixes: String },

    #[error("The default export of {path} is not a component (found {found})")]
    NotInvocable { path: String, found: String },

    #[error("{0}")]
    Render(EvalError),
}

impl From<EvalError> for BootError {
    fn from(err: EvalError) -> Self {
        BootError::Render(err)
    }
}

/// Libraries the preview needs before any compiled code runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RuntimeDependency {
    React,
    ReactDom,
    Transformer,
    Icons,
    Motion,
}

impl RuntimeDependency {
    pub const ALL: [RuntimeDependency; 5] = [
        RuntimeDependency::React,
        RuntimeDependency::ReactDom,
        RuntimeDependency::Transformer,
        RuntimeDependency::Icons,
        RuntimeDependency::Motion,
    ];

    /// Builtin module providing the dependency
    pub fn module(&self) -> Option<&'static str> {
        match self {
            RuntimeDependency::React => Some("react"),
            RuntimeDependency::ReactDom => Some("react-dom/client"),
            RuntimeDependency::Transformer => None,
            RuntimeDependency::Icons => Some("lucide-react"),
            RuntimeDependency::Motion => Some("framer-motion"),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            RuntimeDependency::React => "React",
            RuntimeDependency::ReactDom => "ReactDOM",
            RuntimeDependency::Transformer => "transformer",
            RuntimeDependency::Icons => "icons",
            RuntimeDependency::Motion => "motion",
        }
    }
}

/// Reports whether a runtime dependency is present
pub trait RuntimeCheck {
    fn is_ready(&self, dependency: RuntimeDependency) -> bool;
}

/// Readiness check over the session's builtin module table
pub struct BuiltinRuntime<'a> {
    modules: &'a HashMap<String, Value>,
}

impl<'a> BuiltinRuntime<'a> {
    pub fn new(modules: &'a HashMap<String, Value>) -> Self {
        Self { modules }
    }
}

impl RuntimeCheck for BuiltinRuntime<'_> {
    fn is_ready(&self, dependency: RuntimeDependency) -> bool {
        match dependency.module() {
            Some(module) => self.modules.contains_key(module),
            // the transformer is compiled in
            None => true,
        }
    }
}

fn missing(runtime: &dyn RuntimeCheck) -> Vec<RuntimeDependency> {
    RuntimeDependency::ALL
        .into_iter()
        .filter(|dependency| !runtime.is_ready(*dependency))
        .collect()
}

/// Poll `runtime` until every dependency is ready; returns the attempts used
pub async fn await_runtime(runtime: &dyn RuntimeCheck, policy: &PollPolicy) -> Result<u32, BootError> {
    let mut attempts = 0;
    loop {
        attempts += 1;
        let pending = missing(runtime);
        if pending.is_empty() {
            debug!(attempts, "runtime ready");
            return Ok(attempts);
        }
        if attempts >= policy.max_attempts {
            let missing = pending
                .iter()
                .map(RuntimeDependency::label)
                .collect::<Vec<_>>()
                .join(", ");
            warn!(%missing, attempts, "runtime dependencies timed out");
            return Err(BootError::DependencyTimeout { missing, attempts });
        }
        tokio::time::sleep(policy.interval()).await;
    }
}

/// First conventional entry, else the first root component file
pub fn locate_entry(store: &VirtualFileStore, config: &PreviewConfig) -> Result<String, BootError> {
    if let Some(entry) = config
        .entry_candidates
        .iter()
        .find(|candidate| store.contains(candidate))
    {
        return Ok(entry.clone());
    }
    store
        .paths()
        .find(|path| {
            config
                .root_component_suffixes
                .iter()
                .any(|suffix| path.ends_with(suffix.as_str()))
        })
        .map(str::to_string)
        .ok_or_else(|| BootError::NoEntry {
            tried: config.entry_candidates.join(", "),
            suffixes: config.root_component_suffixes.join(", "),
        })
}

/// Whether `path` was picked as a root component rather than a script entry
pub fn is_component_entry(path: &str, config: &PreviewConfig) -> bool {
    !config.entry_candidates.iter().any(|candidate| candidate == path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::time::Duration;

    /// Ready after a fixed number of polls
    struct SlowRuntime {
        polls: Cell<u32>,
        ready_after: u32,
    }

    impl RuntimeCheck for SlowRuntime {
        fn is_ready(&self, dependency: RuntimeDependency) -> bool {
            if dependency == RuntimeDependency::React {
                self.polls.set(self.polls.get() + 1);
            }
            self.polls.get() >= self.ready_after
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_polls_until_ready() {
        let runtime = SlowRuntime {
            polls: Cell::new(0),
            ready_after: 4,
        };
        let start = tokio::time::Instant::now();
        let attempts = await_runtime(&runtime, &PollPolicy::default()).await.unwrap();
        assert_eq!(attempts, 4);
        assert_eq!(start.elapsed(), Duration::from_millis(300));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_names_missing_dependencies() {
        struct NoMotion;
        impl RuntimeCheck for NoMotion {
            fn is_ready(&self, dependency: RuntimeDependency) -> bool {
                dependency != RuntimeDependency::Motion
            }
        }

        let policy = PollPolicy {
            interval_ms: 100,
            max_attempts: 5,
        };
        match await_runtime(&NoMotion, &policy).await {
            Err(BootError::DependencyTimeout { missing, attempts }) => {
                assert_eq!(missing, "motion");
                assert_eq!(attempts, 5);
            }
            other => panic!("expected timeout, got {:?}", other),
        }
    }

    #[test]
    fn test_builtin_runtime_check() {
        let mut modules = HashMap::new();
        modules.insert("react".to_string(), Value::Null);
        let runtime = BuiltinRuntime::new(&modules);
        assert!(runtime.is_ready(RuntimeDependency::React));
        assert!(runtime.is_ready(RuntimeDependency::Transformer));
        assert!(!runtime.is_ready(RuntimeDependency::Icons));
    }

    #[test]
    fn test_locate_entry() {
        let config = PreviewConfig::default();
        let store = VirtualFileStore::new(vec![
            ("src/index.tsx", ""),
            ("src/main.jsx", ""),
            ("src/App.tsx", ""),
        ]);
        assert_eq!(locate_entry(&store, &config).unwrap(), "src/main.jsx");

        let store = VirtualFileStore::new(vec![("src/pages/Home.tsx", ""), ("src/components/App.jsx", "")]);
        let entry = locate_entry(&store, &config).unwrap();
        assert_eq!(entry, "src/components/App.jsx");
        assert!(is_component_entry(&entry, &config));

        let store = VirtualFileStore::new(vec![("src/lib/util.ts", "")]);
        assert!(matches!(locate_entry(&store, &config), Err(BootError::NoEntry { .. })));
    }
}
