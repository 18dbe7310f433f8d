//! capigen CLI: translate a native C++ interface header into a C API and
//! the adapters crossing it in both directions.

mod commands;
mod config;

use std::path::PathBuf;
use std::process;

use clap::{ArgAction, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use commands::generate::GenerateArgs;

#[derive(Parser)]
#[command(name = "capigen", version, about = "C API and adapter generator")]
struct Cli {
    /// Only log warnings and errors
    #[arg(short, long, global = true)]
    quiet: bool,
    /// Log per-class detail (repeat for more)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate the C API header and adapter files
    Generate(GenerateArgs),
    /// Print the parsed model and the crossing of every value
    Inspect {
        /// Native header to read
        #[arg(long)]
        cpp_header: PathBuf,
        /// Output format (text, json)
        #[arg(long, default_value = "text")]
        format: String,
        /// Only show this class
        #[arg(long)]
        class: Option<String>,
    },
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.quiet, cli.verbose);

    let result = run(cli);
    if let Err(e) = result {
        eprintln!("error: {e:#}");
        process::exit(1);
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let cwd = std::env::current_dir()?;

    match cli.command {
        Commands::Generate(args) => commands::generate::run(&args, &cwd),
        Commands::Inspect {
            cpp_header,
            format,
            class,
        } => commands::inspect::run(&cpp_header, &format, class.as_deref(), &cwd),
    }
}

/// `RUST_LOG` wins; otherwise the level follows `-q` / `-v`.
fn init_logging(quiet: bool, verbose: u8) {
    let level = match (quiet, verbose) {
        (true, _) => "warn",
        (false, 0) => "info",
        (false, 1) => "debug",
        (false, _) => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .try_init()
        .ok();
}
