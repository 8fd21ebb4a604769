mod cmd;
mod output;
mod settings;

use clap::{Parser, Subcommand};
use cmd::config::ConfigSubcommand;
use settings::Overrides;
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "packy",
    about = "Notify Artix maintainers when their packages are ready to move or update",
    version,
    propagate_version = true
)]
struct Cli {
    /// Config file (YAML or JSON)
    #[arg(
        long,
        short = 'c',
        global = true,
        env = "PACKY_CONFIG",
        default_value = packy_core::paths::DEFAULT_CONFIG_FILE
    )]
    config: PathBuf,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    #[command(flatten)]
    overrides: Overrides,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the daemon: cron-driven cycles plus the query server
    Serve,

    /// Run a single cycle now and exit
    Cycle {
        /// Reconcile ownership even if the last sync is recent
        #[arg(long)]
        force_sync: bool,

        /// Print notify sets instead of delivering them
        #[arg(long)]
        no_notify: bool,
    },

    /// Show a maintainer's flagged packages
    Maintainer {
        /// Maintainer name as used by the ownership tool
        name: String,
    },

    /// Inspect the configuration
    Config {
        #[command(subcommand)]
        subcommand: ConfigSubcommand,
    },
}

fn main() {
    let cli = Cli::parse();

    let default_level = match &cli.command {
        Commands::Serve | Commands::Cycle { .. } => tracing::Level::INFO,
        _ => tracing::Level::WARN,
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(default_level.into()),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config_path = cli.config.as_path();
    let overrides = cli.overrides;

    let result = match cli.command {
        Commands::Serve => cmd::serve::run(config_path, overrides),
        Commands::Cycle {
            force_sync,
            no_notify,
        } => cmd::cycle::run(config_path, overrides, force_sync, no_notify, cli.json),
        Commands::Maintainer { name } => {
            cmd::maintainer::run(config_path, overrides, &name, cli.json)
        }
        Commands::Config { subcommand } => {
            cmd::config::run(config_path, overrides, subcommand, cli.json)
        }
    };

    if let Err(e) = result {
        // Print the full error chain (anyhow's alternate Display)
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
