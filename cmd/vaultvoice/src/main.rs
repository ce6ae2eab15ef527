//! vaultvoice CLI - voice-authenticated vault from the command line.

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;

use commands::{
    ConfigCommand, DeleteCommand, EnrollCommand, ListCommand, LoginCommand, RegisterCommand,
    ShellCommand, StatusCommand, VerifyCommand,
};

/// vaultvoice CLI - voice-authenticated vault.
///
/// Users register a password, enroll three voice recordings (WAV files
/// stand in for the microphone) and then log in with either. Three failed
/// attempts, voice and password combined, lock the user out for 30s,
/// then 60s, 300s and 600s on repeat offenses.
///
/// Lockout state lives in memory: use `shell` to keep it across attempts.
///
/// Configuration is stored in ~/.vaultvoice/config.yaml.
#[derive(Parser)]
#[command(name = "vaultvoice")]
#[command(about = "Voice-authenticated vault CLI tool")]
#[command(version)]
pub struct Cli {
    /// Config file (default is ~/.vaultvoice/config.yaml)
    #[arg(long, global = true)]
    pub config: Option<String>,

    /// Output file (default: stdout)
    #[arg(short = 'o', long, global = true)]
    pub output: Option<String>,

    /// Output as JSON (for piping)
    #[arg(long, global = true)]
    pub json: bool,

    /// Verbose output
    #[arg(short = 'v', long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Manage configuration
    Config(ConfigCommand),
    /// Register a user with a password
    Register(RegisterCommand),
    /// Enroll a voice profile from WAV recordings
    Enroll(EnrollCommand),
    /// Log in with a voice recording
    Verify(VerifyCommand),
    /// Log in with a password
    Login(LoginCommand),
    /// Delete a user's voice profile and password
    Delete(DeleteCommand),
    /// List users
    List(ListCommand),
    /// Show a user's enrollment and lockout state
    Status(StatusCommand),
    /// Interactive session that keeps lockout state between attempts
    Shell(ShellCommand),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging; RUST_LOG overrides the default level.
    let default_level = if cli.verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match &cli.command {
        Commands::Config(cmd) => cmd.run(&cli).await,
        Commands::Register(cmd) => cmd.run(&cli).await,
        Commands::Enroll(cmd) => cmd.run(&cli).await,
        Commands::Verify(cmd) => cmd.run(&cli).await,
        Commands::Login(cmd) => cmd.run(&cli).await,
        Commands::Delete(cmd) => cmd.run(&cli).await,
        Commands::List(cmd) => cmd.run(&cli).await,
        Commands::Status(cmd) => cmd.run(&cli).await,
        Commands::Shell(cmd) => cmd.run(&cli).await,
    }
}
