//! Lumen CLI
//!
//! Tray helper that mirrors a portal screencast into an X11 window.
//!
//! # Usage
//!
//! ```bash
//! # Run the tray helper (same as `lumen run`)
//! lumen
//!
//! # Show portal, display and GStreamer diagnostics
//! lumen info
//! ```

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::Level;
use tracing_subscriber::EnvFilter;

/// Lumen - portal screencast mirrored into an X11 window
#[derive(Parser)]
#[command(name = "lumen")]
#[command(version)]
#[command(about = "Tray helper that mirrors a portal screencast into an X11 window", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Subcommand to run (defaults to `run`)
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the tray helper
    Run,

    /// Show screencast portal, X11 and GStreamer information
    Info,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive(format!("lumen={}", level).parse()?)
                .add_directive(format!("lumen_core={}", level).parse()?),
        )
        .with_target(false)
        .init();

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => commands::run()?,
        Commands::Info => {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()?;
            runtime.block_on(commands::info())?;
        }
    }

    Ok(())
}
