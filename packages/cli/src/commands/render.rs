use crate::{config, project};
use anyhow::{anyhow, Result};
use clap::Args;
use colored::Colorize;
use glimpse_common::{PreviewConfig, VirtualFileStore};
use glimpse_compiler_html::{compile_document, DocumentOptions};
use glimpse_evaluator::{DiagnosticKind, PreviewSession};
use notify::{Config, RecommendedWatcher, RecursiveMode, Watcher};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

#[derive(Debug, Args)]
pub struct RenderArgs {
    /// Project directory or `files.json` map
    #[arg(default_value = ".")]
    pub input: PathBuf,

    /// Write the document here instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Document title
    #[arg(long, default_value = "Glimpse Preview")]
    pub title: String,

    /// Skip pretty printing
    #[arg(long)]
    pub compact: bool,

    /// Re-render whenever the input changes
    #[arg(short, long)]
    pub watch: bool,
}

impl RenderArgs {
    fn document_options(&self) -> DocumentOptions {
        DocumentOptions {
            title: self.title.clone(),
            pretty: !self.compact,
            ..DocumentOptions::default()
        }
    }
}

/// Outcome of one preview build
pub struct Rendered {
    pub html: String,
    pub mounted: bool,
    pub problems: Vec<String>,
}

fn finish(session: &PreviewSession, options: &DocumentOptions) -> Result<Rendered> {
    let html = compile_document(session, options)?;
    let problems = session
        .diagnostics()
        .iter()
        .map(|d| match (&d.kind, &d.path) {
            (DiagnosticKind::Bootstrap, _) | (_, None) => d.message.clone(),
            (_, Some(path)) => format!("{}: {}", path, d.message),
        })
        .collect();
    Ok(Rendered {
        html,
        mounted: session.is_mounted(),
        problems,
    })
}

/// Boot a fresh session over `store`, awaiting runtime dependencies
pub async fn render_store(store: VirtualFileStore, config: PreviewConfig, options: &DocumentOptions) -> Result<Rendered> {
    let mut session = PreviewSession::new(store, config);
    if let Err(err) = session.boot().await {
        debug!(error = %err, "boot failed; document carries the overlay");
    }
    finish(&session, options)
}

/// Synchronous variant for worker threads
pub fn render_store_blocking(store: VirtualFileStore, config: PreviewConfig, options: &DocumentOptions) -> Result<Rendered> {
    let mut session = PreviewSession::new(store, config);
    if let Err(err) = session.boot_now() {
        debug!(error = %err, "boot failed; document carries the overlay");
    }
    finish(&session, options)
}

async fn render_once(args: &RenderArgs, config: &PreviewConfig) -> Result<()> {
    let store = project::load(&args.input)?;
    let rendered = render_store(store, config.clone(), &args.document_options()).await?;

    for problem in &rendered.problems {
        eprintln!("  {} {}", "⚠".yellow(), problem);
    }

    match &args.output {
        Some(path) => {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(path, &rendered.html)?;
            let status = if rendered.mounted { "✓".green() } else { "✗".red() };
            eprintln!("{} {} → {}", status, args.input.display(), path.display());
        }
        None => println!("{}", rendered.html),
    }
    Ok(())
}

pub async fn render(args: RenderArgs, cwd: &Path) -> Result<()> {
    let config = config::load(cwd)?;
    render_once(&args, &config).await?;

    if args.watch {
        watch(&args, &config).await?;
    }
    Ok(())
}

/// Rebuild the whole preview on every change under the input
async fn watch(args: &RenderArgs, config: &PreviewConfig) -> Result<()> {
    let (tx, mut rx) = tokio::sync::mpsc::channel(100);

    let mut watcher = RecommendedWatcher::new(
        move |res: Result<notify::Event, notify::Error>| {
            if let Ok(event) = res {
                let _ = tx.blocking_send(event);
            }
        },
        Config::default(),
    )?;
    watcher.watch(&args.input, RecursiveMode::Recursive)?;

    eprintln!("{}", "👀 Watching for changes...".bright_blue());

    let output = args.output.as_ref().and_then(|path| fs::canonicalize(path).ok());
    while let Some(event) = rx.recv().await {
        if !matches!(
            event.kind,
            notify::EventKind::Modify(_) | notify::EventKind::Create(_) | notify::EventKind::Remove(_)
        ) {
            continue;
        }
        // our own write
        if output.is_some() && event.paths.iter().all(|p| fs::canonicalize(p).ok() == output) {
            continue;
        }
        while rx.try_recv().is_ok() {}

        info!(paths = ?event.paths, "change detected, re-rendering");
        if let Err(err) = render_once(args, config).await {
            warn!(error = %err, "re-render failed");
            eprintln!("{} {}", "✗".red(), err);
        }
    }

    Err(anyhow!("file watcher stopped"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_render_writes_document() {
        let dir = tempfile::tempdir().unwrap();
        let project = dir.path().join("project");
        fs::create_dir_all(project.join("src")).unwrap();
        fs::write(
            project.join("src/App.tsx"),
            "export default function App() { return <h1>Hello from disk</h1>; }",
        )
        .unwrap();

        let output = dir.path().join("out/preview.html");
        let args = RenderArgs {
            input: project,
            output: Some(output.clone()),
            title: "Disk".to_string(),
            compact: false,
            watch: false,
        };
        render(args, dir.path()).await.unwrap();

        let html = fs::read_to_string(output).unwrap();
        assert!(html.contains("<title>Disk</title>"));
        assert!(html.contains("Hello from disk"));
        assert!(html.contains("__glimpse_files__"));
    }

    #[test]
    fn test_blocking_render_reports_problems() {
        let store = VirtualFileStore::new(vec![(
            "src/App.tsx",
            "import Fancy from 'fancy-lib';\nexport default () => <Fancy />;",
        )]);
        let rendered = render_store_blocking(store, PreviewConfig::default(), &DocumentOptions::default()).unwrap();
        assert!(rendered.mounted);
        assert_eq!(rendered.problems.len(), 1);
        assert!(rendered.problems[0].starts_with("src/App.tsx: "));
        assert!(rendered.problems[0].contains("fancy-lib"));
    }
}
