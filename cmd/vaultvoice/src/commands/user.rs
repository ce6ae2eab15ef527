//! User commands: registration, enrollment, login and housekeeping.
//!
//! Each invocation opens the store afresh, so lockout counters do not
//! carry over between invocations. `vaultvoice shell` keeps them.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Args;
use serde::Serialize;

use vaultvoice::WavFileSource;

use super::{
    open_vault, output_result, print_info, print_success, prompt_password, report_attempt,
};
use crate::Cli;

#[derive(Args)]
pub struct RegisterCommand {
    /// User id
    user: String,
    /// Password (prompted for when omitted)
    #[arg(long)]
    password: Option<String>,
}

impl RegisterCommand {
    pub async fn run(&self, cli: &Cli) -> anyhow::Result<()> {
        let vault = open_vault(cli)?;
        let password = match &self.password {
            Some(p) => p.clone(),
            None => prompt_password("New password")?,
        };
        vault.register(&self.user, &password).await?;
        print_success(&format!("registered {}", self.user));
        Ok(())
    }
}

#[derive(Args)]
pub struct EnrollCommand {
    /// User id
    user: String,
    /// WAV recordings of the passphrase, exactly one per enrollment sample
    #[arg(required = true, num_args = 1..)]
    wavs: Vec<PathBuf>,
}

impl EnrollCommand {
    pub async fn run(&self, cli: &Cli) -> anyhow::Result<()> {
        let vault = open_vault(cli)?;
        print_info(&format!("passphrase: \"{}\"", vault.passphrase()));
        let info = vault.enroll_from_files(&self.user, self.wavs.clone()).await?;
        print_success(&format!("enrolled {}", self.user));
        output_result(&info, cli.output.as_deref(), cli.json)
    }
}

#[derive(Args)]
pub struct VerifyCommand {
    /// User id
    user: String,
    /// WAV recording of the passphrase
    wav: PathBuf,
}

impl VerifyCommand {
    pub async fn run(&self, cli: &Cli) -> anyhow::Result<()> {
        let vault = open_vault(cli)?;
        let source = Arc::new(WavFileSource::new([self.wav.clone()]));
        let result = vault.login_voice_from_source(&self.user, source).await?;
        report_attempt(&result);
        output_result(&result, cli.output.as_deref(), cli.json)
    }
}

#[derive(Args)]
pub struct LoginCommand {
    /// User id
    user: String,
    /// Password (prompted for when omitted)
    #[arg(long)]
    password: Option<String>,
}

impl LoginCommand {
    pub async fn run(&self, cli: &Cli) -> anyhow::Result<()> {
        let vault = open_vault(cli)?;
        let password = match &self.password {
            Some(p) => p.clone(),
            None => prompt_password("Password")?,
        };
        let result = vault.login_password(&self.user, &password).await?;
        report_attempt(&result);
        output_result(&result, cli.output.as_deref(), cli.json)
    }
}

#[derive(Args)]
pub struct DeleteCommand {
    /// User id
    user: String,
}

impl DeleteCommand {
    pub async fn run(&self, cli: &Cli) -> anyhow::Result<()> {
        let vault = open_vault(cli)?;
        vault.delete_user(&self.user)?;
        print_success(&format!("deleted {}", self.user));
        Ok(())
    }
}

#[derive(Args)]
pub struct ListCommand {
    /// Only users with a voice profile
    #[arg(long)]
    enrolled: bool,
}

#[derive(Serialize)]
struct UserList {
    users: Vec<String>,
}

impl ListCommand {
    pub async fn run(&self, cli: &Cli) -> anyhow::Result<()> {
        let vault = open_vault(cli)?;
        let users = if self.enrolled {
            vault.list_enrolled()?
        } else {
            vault.list_users()?
        };
        let list = UserList {
            users: users.into_iter().collect(),
        };
        output_result(&list, cli.output.as_deref(), cli.json)
    }
}

#[derive(Args)]
pub struct StatusCommand {
    /// User id
    user: String,
}

impl StatusCommand {
    pub async fn run(&self, cli: &Cli) -> anyhow::Result<()> {
        let vault = open_vault(cli)?;
        let status = vault.status(&self.user)?;
        output_result(&status, cli.output.as_deref(), cli.json)
    }
}
