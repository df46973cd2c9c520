//! Configsum CLI - feature flag and config override rules.
//!
//! Commands:
//! - `configsum init` - Write an example fixture file
//! - `configsum validate` - Load and check a fixture file
//! - `configsum render` - Render the config of one user

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "configsum")]
#[command(about = "Feature flag and config override rules")]
#[command(version)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true, env = "CONFIGSUM_JSON_LOGS")]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write an example fixture file
    Init {
        /// Output path
        #[arg(default_value = "configsum.yaml")]
        path: String,
    },

    /// Load a fixture file and check every base config and rule
    Validate {
        /// Path to a JSON or YAML fixture file
        #[arg(short, long, default_value = "configsum.yaml", env = "CONFIGSUM_FIXTURES")]
        fixtures: String,
    },

    /// Render the config of one user and print it as JSON
    Render {
        /// Path to a JSON or YAML fixture file
        #[arg(short, long, default_value = "configsum.yaml", env = "CONFIGSUM_FIXTURES")]
        fixtures: String,

        /// Client owning the base config
        #[arg(long)]
        client: String,

        /// Base config name
        #[arg(long)]
        base: String,

        /// User id
        #[arg(long)]
        user: String,

        /// User age
        #[arg(long, default_value_t = 0)]
        age: u8,

        /// Subscription tier
        #[arg(long, default_value_t = 0)]
        subscription: i64,

        /// Locale tag, e.g. en-GB
        #[arg(long, default_value = "")]
        locale: String,

        /// Seed for reproducible rollout rolls
        #[arg(long)]
        seed: Option<u64>,

        /// Use this roll for every fresh rollout decision
        #[arg(long, value_parser = clap::value_parser!(u8).range(1..=100))]
        roll: Option<u8>,

        /// File holding previous renders; decisions are replayed from it and
        /// the new render is appended. Bare `--state` uses state.json
        #[arg(long, num_args = 0..=1, default_missing_value = "state.json")]
        state: Option<String>,

        /// Skip rules whose criteria do not fit the context instead of failing
        #[arg(long)]
        skip_malformed: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if cli.json_logs {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    match cli.command {
        Commands::Init { path } => commands::init::run(&path),
        Commands::Validate { fixtures } => commands::validate::run(&fixtures),
        Commands::Render {
            fixtures,
            client,
            base,
            user,
            age,
            subscription,
            locale,
            seed,
            roll,
            state,
            skip_malformed,
        } => commands::render::run(&commands::render::RenderArgs {
            fixtures: &fixtures,
            client: &client,
            base: &base,
            user: &user,
            age,
            subscription,
            locale: &locale,
            seed,
            roll,
            state: state.as_deref(),
            skip_malformed,
        }),
    }
}
