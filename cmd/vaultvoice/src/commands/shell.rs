//! Interactive shell.
//!
//! One [`Vault`] stays open for the whole session, so attempt counters and
//! lockout countdowns carry across commands the way they would behind a
//! login screen.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Args;
use tokio::io::{AsyncBufReadExt, BufReader};

use vaultvoice::{Vault, WavFileSource};

use super::{
    get_config, open_vault, output_result, print_error, print_info, print_success, report_attempt,
};
use crate::Cli;

const HELP: &str = "\
commands:
  register <user> <password>
  enroll <user> <wav>...
  verify <user> <wav>
  login <user> <password>
  delete <user>
  list
  status <user>
  help
  quit";

#[derive(Args)]
pub struct ShellCommand {
    /// Keep all state in memory instead of the configured store
    #[arg(long)]
    memory: bool,
}

impl ShellCommand {
    pub async fn run(&self, cli: &Cli) -> anyhow::Result<()> {
        let vault = if self.memory {
            Vault::in_memory(get_config(cli)?)?
        } else {
            open_vault(cli)?
        };
        print_info(&format!("passphrase: \"{}\"", vault.passphrase()));
        print_info("type 'help' for commands");

        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            eprint!("vaultvoice> ");
            let Some(line) = lines.next_line().await? else {
                break;
            };
            let args: Vec<&str> = line.split_whitespace().collect();
            match args.as_slice() {
                [] => continue,
                ["quit" | "exit"] => break,
                ["help"] => eprintln!("{HELP}"),
                _ => {
                    if let Err(e) = execute(&vault, cli, &args).await {
                        print_error(&format!("{e:#}"));
                    }
                }
            }
        }
        Ok(())
    }
}

async fn execute(vault: &Vault, cli: &Cli, args: &[&str]) -> anyhow::Result<()> {
    match args {
        ["register", user, password] => {
            vault.register(user, password).await?;
            print_success(&format!("registered {user}"));
        }
        ["enroll", user, wavs @ ..] if !wavs.is_empty() => {
            let files = wavs.iter().map(PathBuf::from).collect();
            let info = vault.enroll_from_files(user, files).await?;
            print_success(&format!("enrolled {user}"));
            output_result(&info, None, cli.json)?;
        }
        ["verify", user, wav] => {
            let source = Arc::new(WavFileSource::new([PathBuf::from(wav)]));
            let result = vault.login_voice_from_source(user, source).await?;
            report_attempt(&result);
            output_result(&result, None, cli.json)?;
        }
        ["login", user, password] => {
            let result = vault.login_password(user, password).await?;
            report_attempt(&result);
            output_result(&result, None, cli.json)?;
        }
        ["delete", user] => {
            vault.delete_user(user)?;
            print_success(&format!("deleted {user}"));
        }
        ["list"] => {
            for user in vault.list_users()? {
                println!("{user}");
            }
        }
        ["status", user] => {
            output_result(&vault.status(user)?, None, cli.json)?;
        }
        _ => anyhow::bail!("unrecognized command, type 'help'"),
    }
    Ok(())
}
