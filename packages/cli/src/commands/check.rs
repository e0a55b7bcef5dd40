use crate::{config, project};
use anyhow::{anyhow, Result};
use clap::Args;
use colored::Colorize;
use glimpse_bundle::{Bundle, BundleError, Resolver, VirtualAssetRegistry};
use glimpse_common::{PreviewConfig, VirtualFileStore};
use glimpse_evaluator::loader::has_fallback;
use glimpse_evaluator::transformer::compile_all;
use glimpse_parser::format_error;
use std::path::{Path, PathBuf};

#[derive(Debug, Args)]
pub struct CheckArgs {
    /// Project directory or `files.json` map
    #[arg(default_value = ".")]
    pub input: PathBuf,
}

/// A code file that failed to compile, with its rendered report
pub struct Failure {
    pub path: String,
    pub report: String,
}

/// What `check` found in one project
#[derive(Default)]
pub struct CheckReport {
    pub checked: usize,
    pub failures: Vec<Failure>,
    /// Local imports no file answers; these preview as placeholders
    pub unresolved: Vec<String>,
    /// Files that take part in an import cycle
    pub cyclic: Vec<String>,
}

/// Compile every code file in `store` and resolve the imports between them
pub fn check_store(store: &VirtualFileStore, config: &PreviewConfig) -> CheckReport {
    let resolver = Resolver::from_config(config);
    let mut bundle = Bundle::new(resolver.clone(), VirtualAssetRegistry::new());
    compile_all(store, &mut bundle);
    bundle.build_dependencies(store, |specifier| {
        !resolver.is_local(specifier) || has_fallback(specifier, config)
    });

    let mut report = CheckReport {
        checked: bundle.module_count() + bundle.failures().count(),
        ..CheckReport::default()
    };
    for problem in bundle.diagnostics() {
        match problem {
            BundleError::CompileFailed { path, error } => {
                let source = store.get(&path).unwrap_or_default();
                report.failures.push(Failure {
                    report: format_error(source, &path, &error),
                    path,
                });
            }
            unresolved @ BundleError::ImportNotFound { .. } => report.unresolved.push(unresolved.to_string()),
        }
    }
    report.cyclic = bundle
        .modules()
        .map(|module| module.path.as_str())
        .filter(|path| bundle.is_cyclic(path))
        .map(str::to_string)
        .collect();
    report
}

pub fn check(args: CheckArgs, cwd: &Path) -> Result<()> {
    let config = config::load(cwd)?;
    let store = project::load(&args.input)?;
    println!("{}", "🔍 Checking code files...".bright_blue().bold());

    let report = check_store(&store, &config);
    if report.checked == 0 {
        println!("{}", "⚠️  No code files found".yellow());
        return Ok(());
    }

    for failure in &report.failures {
        eprintln!("  {} {}", "✗".red(), failure.path);
        eprintln!("{}", failure.report);
    }
    for unresolved in &report.unresolved {
        eprintln!("  {} {}", "⚠".yellow(), unresolved);
    }
    if !report.cyclic.is_empty() {
        println!("  {} import cycle through {}", "↻".cyan(), report.cyclic.join(", "));
    }

    println!();
    if report.failures.is_empty() {
        println!("{} Checked {} files, no errors", "✅".green(), report.checked);
        Ok(())
    } else {
        Err(anyhow!(
            "{} of {} files failed to compile",
            report.failures.len(),
            report.checked
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_reports_failures() {
        let store = VirtualFileStore::new(vec![
            ("src/App.tsx", "export default function App() { return <div>; }"),
            ("src/ok.ts", "export const ok: number = 1;"),
            ("src/index.css", "body {"),
        ]);
        let report = check_store(&store, &PreviewConfig::default());
        assert_eq!(report.checked, 2);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].path, "src/App.tsx");
        assert!(report.failures[0].report.contains("src/App.tsx"));
        assert!(report.unresolved.is_empty());
    }

    #[test]
    fn test_check_reports_unresolved_imports_and_cycles() {
        let store = VirtualFileStore::new(vec![
            (
                "src/App.tsx",
                r#"
import { useState } from "react";
import { Button } from "@/components/ui/button";
import { cn } from "@/lib/utils";
import "./index.css";
import { Sidebar } from "./Sidebar";
import { Chart } from "./widgets/Chart";
export const title = "Dashboard";
export default function App() { return <Sidebar />; }
"#,
            ),
            (
                "src/Sidebar.tsx",
                "import { title } from './App';\nexport const Sidebar = () => <nav>{title}</nav>;",
            ),
            ("src/Footer.tsx", "export const Footer = () => <footer />;"),
        ]);
        let report = check_store(&store, &PreviewConfig::default());

        assert!(report.failures.is_empty());
        assert_eq!(
            report.unresolved,
            vec!["Import not found: ./widgets/Chart imported by src/App.tsx".to_string()]
        );
        assert_eq!(report.cyclic, vec!["src/App.tsx", "src/Sidebar.tsx"]);
    }

    #[test]
    fn test_check_command_fails_on_errors() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("src")).unwrap();
        std::fs::write(dir.path().join("src/broken.js"), "const = 1;").unwrap();
        let err = check(
            CheckArgs {
                input: dir.path().to_path_buf(),
            },
            dir.path(),
        )
        .unwrap_err();
        assert!(err.to_string().contains("1 of 1 files"));
    }
}
