//! learnscreen CLI: the user-facing command-line interface.

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};

use learnscreen_core::model::Domain;

mod commands;

#[derive(Parser)]
#[command(
    name = "learnscreen",
    version,
    about = "Learning-difference screening games and risk profiles"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Play a game in the terminal
    Play {
        /// Child identifier
        #[arg(long)]
        user: String,

        /// Game to play: visual, handwriting, motor, numeric
        #[arg(long)]
        domain: Domain,

        /// Level to start at
        #[arg(long, default_value = "1")]
        level: u8,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Replay a scripted session and persist its levels
    Simulate {
        /// Path to a session script (.toml)
        #[arg(long)]
        script: PathBuf,

        /// Override the script's user id
        #[arg(long)]
        user: Option<String>,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Show a child's composite risk profile
    Profile {
        /// Child identifier
        #[arg(long)]
        user: String,

        /// Output format: table, json
        #[arg(long, default_value = "table")]
        format: String,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Save a child's screening report as JSON
    Report {
        /// Child identifier
        #[arg(long)]
        user: String,

        /// Output directory
        #[arg(long, default_value = "./learnscreen-reports")]
        output: PathBuf,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Compare two screening reports
    Compare {
        /// Baseline report JSON
        #[arg(long)]
        baseline: PathBuf,

        /// Current report JSON
        #[arg(long)]
        current: PathBuf,

        /// Accuracy change, in percentage points, that counts as a move
        #[arg(long, default_value = "5.0")]
        threshold: f64,

        /// Exit code 1 if any domain declined
        #[arg(long)]
        fail_on_decline: bool,

        /// Output format: text, json, markdown
        #[arg(long, default_value = "text")]
        format: String,
    },

    /// Validate question-set TOML files
    Validate {
        /// Path to question-set file or directory
        #[arg(long)]
        questions: PathBuf,
    },

    /// Create starter config and example question set
    Init,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("learnscreen=info".parse().unwrap()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Play {
            user,
            domain,
            level,
            config,
        } => commands::play::execute(user, domain, level, config).await,
        Commands::Simulate {
            script,
            user,
            config,
        } => commands::simulate::execute(script, user, config).await,
        Commands::Profile {
            user,
            format,
            config,
        } => commands::profile::execute(user, format, config).await,
        Commands::Report {
            user,
            output,
            config,
        } => commands::report::execute(user, output, config).await,
        Commands::Compare {
            baseline,
            current,
            threshold,
            fail_on_decline,
            format,
        } => commands::compare::execute(baseline, current, threshold, fail_on_decline, format),
        Commands::Validate { questions } => commands::validate::execute(questions),
        Commands::Init => commands::init::execute(),
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}
