//! Configuration management commands.

use clap::{Args, Subcommand};

use vaultvoice::VaultConfig;

use super::{config_path, get_config, output_result, print_info, print_success};
use crate::Cli;

/// Manage configuration.
///
/// Configuration is stored in ~/.vaultvoice/config.yaml
#[derive(Args)]
pub struct ConfigCommand {
    #[command(subcommand)]
    command: ConfigSubcommand,
}

#[derive(Subcommand)]
enum ConfigSubcommand {
    /// Write the default configuration
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
    /// View the effective configuration
    Show,
    /// Print the config file path
    Path,
}

impl ConfigCommand {
    pub async fn run(&self, cli: &Cli) -> anyhow::Result<()> {
        match &self.command {
            ConfigSubcommand::Init { force } => {
                let path = config_path(cli)?;
                if path.exists() && !force {
                    anyhow::bail!(
                        "{} already exists, use --force to overwrite",
                        path.display()
                    );
                }
                VaultConfig::default().save(&path)?;
                print_success(&format!("wrote {}", path.display()));
                Ok(())
            }
            ConfigSubcommand::Show => {
                let cfg = get_config(cli)?;
                output_result(&cfg, cli.output.as_deref(), cli.json)
            }
            ConfigSubcommand::Path => {
                let path = config_path(cli)?;
                if !path.exists() {
                    print_info("file does not exist yet, defaults are in effect");
                }
                println!("{}", path.display());
                Ok(())
            }
        }
    }
}
