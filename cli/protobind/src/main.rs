//! protobind CLI: schema binding generation and native dependency feed.

mod commands;
mod manifest;

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use manifest::Project;

#[derive(Parser)]
#[command(
    name = "protobind",
    version,
    about = "Schema bindings and native dependencies for RPC plugins"
)]
struct Cli {
    /// Log at debug level (overrides RUST_LOG)
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate bindings and the descriptor set from schema files
    Generate {
        /// Target platform (e.g., win64, linux)
        #[arg(long)]
        target: Option<String>,
        /// Regenerate everything, ignoring the completion manifest
        #[arg(long)]
        force: bool,
        /// Per-invocation compiler timeout in seconds
        #[arg(long)]
        timeout_secs: Option<u64>,
    },
    /// Print include paths, libraries and definitions for the host build
    Deps {
        #[arg(long)]
        target: Option<String>,
        /// Output format: json, cargo, flags
        #[arg(long)]
        format: Option<String>,
    },
    /// Wrap generated sources in warning-suppression pragmas
    Wrap {
        /// Directory of generated sources
        dir: PathBuf,
        /// Pragma dialect: msvc, gnu, portable
        #[arg(long)]
        dialect: Option<String>,
        /// Platform whose default dialect to use
        #[arg(long)]
        target: Option<String>,
    },
    /// Check translation units for unrenamed third-party symbols
    Audit {
        /// Source files to check
        #[arg(required = true)]
        files: Vec<PathBuf>,
        #[arg(long)]
        target: Option<String>,
        /// Extra definition the units are compiled with (NAME or NAME=VALUE)
        #[arg(long = "define", short = 'D')]
        defines: Vec<String>,
        /// Include the host build definitions for the target
        #[arg(long)]
        host: bool,
    },
    /// Diagnose the plugin layout and toolchain
    Doctor {
        #[arg(long)]
        target: Option<String>,
    },
    /// Remove generated output
    Clean,
    /// Platform information
    Target {
        #[command(subcommand)]
        action: TargetAction,
    },
}

#[derive(Subcommand)]
enum TargetAction {
    /// List known platforms
    List,
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = run(cli);
    if let Err(e) = result {
        eprintln!("error: {e:#}");
        process::exit(1);
    }
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let cwd = std::env::current_dir()?;

    match cli.command {
        Commands::Generate {
            target,
            force,
            timeout_secs,
        } => {
            let project = Project::discover(&cwd)?;
            commands::generate::run(&project, target.as_deref(), force, timeout_secs).map(|_| ())
        }

        Commands::Deps { target, format } => {
            let project = Project::discover(&cwd)?;
            commands::deps::run(&project, target.as_deref(), format.as_deref())
        }

        Commands::Wrap {
            dir,
            dialect,
            target,
        } => {
            let project = Project::discover(&cwd)?;
            commands::wrap::run(&project, &dir, dialect.as_deref(), target.as_deref()).map(|_| ())
        }

        Commands::Audit {
            files,
            target,
            defines,
            host,
        } => {
            let project = Project::discover(&cwd)?;
            commands::audit::run(&project, &files, target.as_deref(), &defines, host).map(|_| ())
        }

        Commands::Doctor { target } => {
            let project = Project::discover(&cwd)?;
            commands::doctor::run(&project, target.as_deref())
        }

        Commands::Clean => {
            let project = Project::discover(&cwd)?;
            commands::clean::run(&project)
        }

        Commands::Target { action } => match action {
            TargetAction::List => commands::target::list(),
        },
    }
}
