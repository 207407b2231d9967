//! meshpaint: command-line interface for painting 3MF models.
//!
//! Inspects the objects and colors of a 3MF package, reports face
//! adjacency, and applies paint plans (base colors, single faces and
//! flood-filled regions) to produce a recolored package. Suitable for
//! scripting; every command can emit JSON.
//!
//! # Logging
//!
//! Set the `RUST_LOG` environment variable to control log output:
//! - `RUST_LOG=mesh_paint=info` - Basic operation logging
//! - `RUST_LOG=mesh_paint=debug` - Per-object detail
//! - `RUST_LOG=mesh_paint::timing=debug` - Performance timing
//! - `RUST_LOG=debug` - All debug output
//!
//! # Example
//!
//! ```bash
//! # List objects and their current colors
//! meshpaint info part.3mf
//!
//! # Apply a paint plan with debug logging
//! RUST_LOG=mesh_paint=debug meshpaint paint part.3mf -o painted.3mf --plan plan.json
//! ```

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

mod commands;
mod output;

use commands::{adjacency, info, paint};

/// meshpaint - Paint faces of 3MF models from the command line.
#[derive(Parser)]
#[command(name = "meshpaint")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format for results
    #[arg(long, global = true, default_value = "text")]
    format: OutputFormat,

    /// Suppress all non-error output
    #[arg(long, short, global = true)]
    quiet: bool,

    /// Increase output verbosity (-v for info, -vv for debug, -vvv for trace)
    #[arg(long, short, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output
    Text,
    /// JSON output for scripting
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// List objects, face counts and current colors
    Info {
        /// Input 3MF file
        input: PathBuf,
    },

    /// Report face adjacency statistics
    Adjacency {
        /// Input 3MF file
        input: PathBuf,

        /// Only analyze the object with this name
        #[arg(long)]
        object: Option<String>,

        /// Compare every pair of faces instead of hashing edges
        #[arg(long)]
        brute_force: bool,

        /// Faces processed between progress reports
        #[arg(long, default_value = "1024")]
        batch_size: usize,
    },

    /// Apply a paint plan and write a recolored package
    Paint {
        /// Input 3MF file
        input: PathBuf,

        /// Output file path
        #[arg(short, long)]
        output: PathBuf,

        /// JSON paint plan
        #[arg(long)]
        plan: PathBuf,

        /// Start from blank assignments instead of the colors already in the file
        #[arg(long)]
        replace: bool,

        /// Per-axis normal tolerance for region fills
        #[arg(long, default_value_t = mesh_paint::NORMAL_TOLERANCE)]
        normal_tolerance: f64,
    },
}

/// Initialize the tracing subscriber based on verbosity level.
fn init_tracing(verbose: u8, quiet: bool) {
    if quiet {
        return;
    }

    // RUST_LOG wins over -v flags
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        let level = match verbose {
            0 => "warn",
            1 => "mesh_paint=info",
            2 => "mesh_paint=debug",
            _ => "trace",
        };
        EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .with(filter)
        .init();
}

fn main() -> Result<()> {
    #[cfg(debug_assertions)]
    miette::set_panic_hook();

    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    let result = match &cli.command {
        Commands::Info { input } => info::run(input, &cli),
        Commands::Adjacency {
            input,
            object,
            brute_force,
            batch_size,
        } => adjacency::run(input, object.as_deref(), *brute_force, *batch_size, &cli),
        Commands::Paint {
            input,
            output,
            plan,
            replace,
            normal_tolerance,
        } => paint::run(input, output, plan, *replace, *normal_tolerance, &cli),
    };

    if let Err(e) = &result {
        if !cli.quiet {
            if let Some(paint_err) = e.downcast_ref::<mesh_paint::PaintError>() {
                eprintln!("{}: {}", "Error".red().bold(), paint_err);
                eprintln!("  {}: {}", "Code".cyan(), paint_err.code());
                eprintln!(
                    "  {}: {}",
                    "Suggestion".green(),
                    paint_err.recovery_suggestion()
                );
                if let Some(location) = paint_err.location() {
                    eprintln!("  {}: {}", "Location".yellow(), location);
                }
            } else {
                eprintln!("{}: {}", "Error".red().bold(), e);
                for cause in e.chain().skip(1) {
                    eprintln!("  {}: {}", "Caused by".yellow(), cause);
                }
            }
        }
        std::process::exit(1);
    }

    Ok(())
}
