//! CLI application for scanning business cards into Google Forms and webhooks.

mod commands;

use clap::{Parser, Subcommand};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use commands::{config, extract, payload, scan};

/// Business card scanner - Extract contact details and send them to a form or webhook
#[derive(Parser)]
#[command(name = "bizscan")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Path to config file
    #[arg(short, long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan a card, review the fields and submit them
    Scan(scan::ScanArgs),

    /// Extract fields from a card without submitting
    Extract(extract::ExtractArgs),

    /// Show the payload a record would be submitted as
    Payload(payload::PayloadArgs),

    /// Manage configuration
    Config(config::ConfigArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    let config_path = cli.config.as_deref();
    match cli.command {
        Commands::Scan(args) => scan::run(args, config_path).await,
        Commands::Extract(args) => extract::run(args, config_path).await,
        Commands::Payload(args) => payload::run(args, config_path),
        Commands::Config(args) => config::run(args, config_path),
    }
}
