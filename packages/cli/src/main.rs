mod commands;
mod config;
mod project;

use clap::{Parser, Subcommand};
use colored::Colorize;
use commands::{check, render, serve, CheckArgs, RenderArgs, ServeArgs};

/// Glimpse - live previews of generated React projects
#[derive(Parser, Debug)]
#[command(name = "glimpse")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Render a project to a self-contained HTML preview
    Render(RenderArgs),

    /// Compile every code file and report syntax errors
    Check(CheckArgs),

    /// Run the preview server
    Serve(ServeArgs),
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match std::env::current_dir() {
        Ok(cwd) => match cli.command {
            Command::Render(args) => render(args, &cwd).await,
            Command::Check(args) => check(args, &cwd),
            Command::Serve(args) => serve(args, &cwd).await,
        },
        Err(err) => Err(anyhow::anyhow!("Cannot get current directory: {}", err)),
    };

    if let Err(err) = result {
        eprintln!();
        eprintln!("{} {:#}", "Error:".red().bold(), err);
        eprintln!();
        std::process::exit(1);
    }
}
