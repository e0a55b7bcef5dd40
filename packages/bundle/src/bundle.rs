//! # Bundle - compiled modules with a dependency graph
//!
//! One `Bundle` is built per preview session, before any module is required.
//! It owns every compiled program, the record of files that failed to compile,
//! the import graph between local files and the session's asset registry.
//!
//! Cycles in the import graph are expected (generated apps often import each
//! other's named exports) and are never an error here. Unresolvable imports are
//! recorded as diagnostics; the loader later turns them into stubs.
//!
//! ## Usage
//!
//! ```ignore
//! let mut bundle = Bundle::new(Resolver::default(), VirtualAssetRegistry::new());
//! bundle.add_module(CompiledModule::new("src/App.tsx", parse(source)?));
//! bundle.build_dependencies(&store, |spec| is_builtin(spec));
//! for problem in bundle.diagnostics() { /* ... */ }
//! ```

use crate::assets::VirtualAssetRegistry;
use crate::resolver::{Resolver, ResolverError};
use glimpse_common::FileSystem;
use glimpse_parser::ast::*;
use glimpse_parser::ParseError;
use std::collections::{BTreeMap, BTreeSet};
use std::rc::Rc;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum BundleError {
    #[error("Import not found: {import_path} imported by {source_path}")]
    ImportNotFound {
        import_path: String,
        source_path: String,
    },

    #[error("Failed to compile {path}: {error}")]
    CompileFailed { path: String, error: ParseError },
}

impl From<ResolverError> for BundleError {
    fn from(err: ResolverError) -> Self {
        match err {
            ResolverError::ImportNotFound {
                import_path,
                source_path,
            } => BundleError::ImportNotFound {
                import_path,
                source_path,
            },
        }
    }
}

/// One code file, compiled once per session
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledModule {
    pub path: String,
    pub program: Program,
    /// Named exports in source order, `default` excluded
    pub declared_exports: Vec<String>,
    /// Module specifiers of static imports and re-exports, in source order
    pub imports: Vec<String>,
}

impl CompiledModule {
    pub fn new(path: &str, program: Program) -> Self {
        let declared_exports = program.declared_exports();
        let imports = collect_imports(&program);
        Self {
            path: path.to_string(),
            program,
            declared_exports,
            imports,
        }
    }
}

/// A file excluded from the compiled set
#[derive(Debug, Clone, PartialEq)]
pub struct CompileFailure {
    pub path: String,
    pub source: String,
    pub error: ParseError,
}

impl CompileFailure {
    pub fn to_error(&self) -> BundleError {
        BundleError::CompileFailed {
            path: self.path.clone(),
            error: self.error.clone(),
        }
    }
}

/// Compiled modules, failures, import graph and assets of one session
#[derive(Debug, Clone, Default)]
pub struct Bundle {
    modules: BTreeMap<String, Rc<CompiledModule>>,
    failures: BTreeMap<String, CompileFailure>,

    /// file -> resolved local dependencies, in import order
    dependencies: BTreeMap<String, Vec<String>>,

    unresolved: Vec<BundleError>,
    resolver: Resolver,
    assets: VirtualAssetRegistry,
}

impl Bundle {
    pub fn new(resolver: Resolver, assets: VirtualAssetRegistry) -> Self {
        Self {
            resolver,
            assets,
            ..Default::default()
        }
    }

    pub fn add_module(&mut self, module: CompiledModule) {
        self.failures.remove(&module.path);
        self.modules.insert(module.path.clone(), Rc::new(module));
    }

    pub fn add_failure(&mut self, failure: CompileFailure) {
        warn!(path = %failure.path, error = %failure.error, "compile failure");
        self.modules.remove(&failure.path);
        self.failures.insert(failure.path.clone(), failure);
    }

    /// Rebuild the import graph from the compiled modules.
    ///
    /// `is_external` is consulted for specifiers the resolver cannot find;
    /// those it accepts (builtins, UI-kit placeholders) are not reported.
    pub fn build_dependencies(&mut self, fs: &dyn FileSystem, is_external: impl Fn(&str) -> bool) {
        self.dependencies.clear();
        self.unresolved.clear();

        for (path, module) in &self.modules {
            let mut deps = Vec::new();
            for specifier in &module.imports {
                match self.resolver.resolve_import_path(specifier, path, fs) {
                    Ok(resolved) => {
                        if !deps.contains(&resolved) {
                            deps.push(resolved);
                        }
                    }
                    Err(_) if is_external(specifier) => {}
                    Err(err) => {
                        debug!(specifier = %specifier, from = %path, "unresolved import");
                        self.unresolved.push(err.into());
                    }
                }
            }
            self.dependencies.insert(path.clone(), deps);
        }
    }

    pub fn get_module(&self, path: &str) -> Option<Rc<CompiledModule>> {
        self.modules.get(path).cloned()
    }

    pub fn get_failure(&self, path: &str) -> Option<&CompileFailure> {
        self.failures.get(path)
    }

    pub fn modules(&self) -> impl Iterator<Item = &CompiledModule> {
        self.modules.values().map(|module| module.as_ref())
    }

    pub fn failures(&self) -> impl Iterator<Item = &CompileFailure> {
        self.failures.values()
    }

    pub fn module_count(&self) -> usize {
        self.modules.len()
    }

    pub fn get_dependencies(&self, path: &str) -> Option<&[String]> {
        self.dependencies.get(path).map(Vec::as_slice)
    }

    /// Whether `path` takes part in an import cycle
    pub fn is_cyclic(&self, path: &str) -> bool {
        let mut stack: Vec<&str> = self
            .get_dependencies(path)
            .map(|deps| deps.iter().map(String::as_str).collect())
            .unwrap_or_default();
        let mut seen = BTreeSet::new();
        while let Some(next) = stack.pop() {
            if next == path {
                return true;
            }
            if !seen.insert(next) {
                continue;
            }
            if let Some(deps) = self.get_dependencies(next) {
                stack.extend(deps.iter().map(String::as_str));
            }
        }
        false
    }

    /// Unresolved imports and compile failures, for reporting
    pub fn diagnostics(&self) -> Vec<BundleError> {
        self.failures
            .values()
            .map(CompileFailure::to_error)
            .chain(self.unresolved.iter().cloned())
            .collect()
    }

    pub fn resolver(&self) -> &Resolver {
        &self.resolver
    }

    pub fn assets(&self) -> &VirtualAssetRegistry {
        &self.assets
    }
}

fn collect_imports(program: &Program) -> Vec<String> {
    let mut imports = Vec::new();
    for stmt in &program.body {
        let source = match stmt {
            Statement::Import(import) => Some(&import.source),
            Statement::ExportNamed {
                source: Some(source),
                ..
            } => Some(source),
            Statement::ExportAll { source, .. } => Some(source),
            _ => None,
        };
        if let Some(source) = source {
            if !imports.contains(source) {
                imports.push(source.clone());
            }
        }
    }
    imports
}

#[cfg(test)]
mod tests {
    use super::*;
    use glimpse_common::MockFileSystem;
    use glimpse_parser::parse;

    fn module(path: &str, source: &str) -> CompiledModule {
        CompiledModule::new(path, parse(source).unwrap())
    }

    #[test]
    fn test_compiled_module_metadata() {
        let compiled = module(
            "src/App.tsx",
            r#"
                import React from "react";
                import { Header } from "./components/Header";
                export { helper } from "./lib/helper";
                export const App = () => <Header />;
                export default App;
            "#,
        );
        assert_eq!(
            compiled.imports,
            vec!["react", "./components/Header", "./lib/helper"]
        );
        assert_eq!(compiled.declared_exports, vec!["helper", "App"]);
    }

    #[test]
    fn test_dependency_graph_allows_cycles() {
        let fs = MockFileSystem::new()
            .with_file("src/a.ts", "")
            .with_file("src/b.ts", "");
        let mut bundle = Bundle::default();
        bundle.add_module(module("src/a.ts", "import { b } from './b'; export const a = () => b;"));
        bundle.add_module(module("src/b.ts", "import { a } from './a'; export const b = () => a;"));
        bundle.build_dependencies(&fs, |_| false);

        assert_eq!(bundle.get_dependencies("src/a.ts"), Some(&["src/b.ts".to_string()][..]));
        assert!(bundle.is_cyclic("src/a.ts"));
        assert!(bundle.diagnostics().is_empty());
    }

    #[test]
    fn test_unresolved_imports_are_diagnostics() {
        let fs = MockFileSystem::new().with_file("src/App.tsx", "");
        let mut bundle = Bundle::default();
        bundle.add_module(module(
            "src/App.tsx",
            "import React from 'react'; import Missing from './Missing';",
        ));
        bundle.build_dependencies(&fs, |spec| spec == "react");

        assert_eq!(
            bundle.diagnostics(),
            vec![BundleError::ImportNotFound {
                import_path: "./Missing".to_string(),
                source_path: "src/App.tsx".to_string(),
            }]
        );
        assert!(!bundle.is_cyclic("src/App.tsx"));
    }

    #[test]
    fn test_failure_replaces_module() {
        let mut bundle = Bundle::default();
        bundle.add_module(module("src/App.tsx", "export default 1"));
        let error = parse("const = ;").unwrap_err();
        bundle.add_failure(CompileFailure {
            path: "src/App.tsx".to_string(),
            source: "const = ;".to_string(),
            error,
        });

        assert!(bundle.get_module("src/App.tsx").is_none());
        assert!(bundle.get_failure("src/App.tsx").is_some());
        assert!(matches!(
            bundle.diagnostics()[0],
            BundleError::CompileFailed { .. }
        ));
    }
}
