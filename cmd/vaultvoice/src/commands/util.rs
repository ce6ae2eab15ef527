//! Utility functions for CLI commands.

use std::io::{BufRead, IsTerminal, Write};
use std::path::PathBuf;

use vaultvoice::{AuthResult, Vault, VaultConfig};

use crate::Cli;

/// Resolves the config file path from `--config` or the default location.
pub fn config_path(cli: &Cli) -> anyhow::Result<PathBuf> {
    match &cli.config {
        Some(p) => Ok(PathBuf::from(p)),
        None => VaultConfig::default_config_path()
            .ok_or_else(|| anyhow::anyhow!("cannot determine config path")),
    }
}

/// Loads the configuration; a missing file yields the defaults.
pub fn get_config(cli: &Cli) -> anyhow::Result<VaultConfig> {
    Ok(VaultConfig::load(&config_path(cli)?)?)
}

/// Opens the vault's on-disk store.
pub fn open_vault(cli: &Cli) -> anyhow::Result<Vault> {
    let cfg = get_config(cli)?;
    if cli.verbose {
        print_verbose(cli, &format!("store: {}", cfg.store_path()?.display()));
    }
    Ok(Vault::open(cfg)?)
}

/// Outputs result as JSON or YAML.
pub fn output_result<T: serde::Serialize>(
    result: &T,
    output_path: Option<&str>,
    as_json: bool,
) -> anyhow::Result<()> {
    let output = if as_json {
        serde_json::to_string_pretty(result)?
    } else {
        serde_yaml::to_string(result)?
    };

    match output_path {
        Some(path) => std::fs::write(path, output)?,
        None => print!("{}", output),
    }

    Ok(())
}

/// Prints a one-line verdict for a login attempt.
pub fn report_attempt(result: &AuthResult) {
    use vaultvoice::AuthDecision;

    let a = &result.attempt;
    match a.decision {
        AuthDecision::Granted => print_success(&format!("access granted to {}", result.user_id)),
        AuthDecision::Denied if a.lockout_seconds_remaining > 0 => print_error(&format!(
            "access denied; locked out for {}s",
            a.lockout_seconds_remaining
        )),
        AuthDecision::Denied => print_error(&format!(
            "access denied; {} attempt(s) remaining",
            a.attempts_remaining
        )),
        AuthDecision::LockedOut => print_warning(&format!(
            "locked out; try again in {}s",
            a.lockout_seconds_remaining
        )),
    }
}

/// Reads a password from stdin after printing a prompt to stderr.
///
/// Terminal echo stays on; the prompt says so when stdin is a terminal.
/// Pass `--password` or pipe the password in to keep it off screen.
pub fn prompt_password(prompt: &str) -> anyhow::Result<String> {
    eprint!("{}", prompt_label(prompt, std::io::stdin().is_terminal()));
    std::io::stderr().flush()?;
    let mut line = String::new();
    std::io::stdin().lock().read_line(&mut line)?;
    let password = line.trim_end_matches(['\r', '\n']).to_string();
    if password.is_empty() {
        anyhow::bail!("empty password");
    }
    Ok(password)
}

fn prompt_label(prompt: &str, echoed: bool) -> String {
    if echoed {
        format!("{prompt} (input is visible): ")
    } else {
        format!("{prompt}: ")
    }
}

/// Prints verbose output if enabled.
pub fn print_verbose(cli: &Cli, msg: &str) {
    if cli.verbose {
        eprintln!("[verbose] {}", msg);
    }
}

/// Prints success message.
pub fn print_success(msg: &str) {
    eprintln!("\x1b[32m✓\x1b[0m {}", msg);
}

/// Prints error message.
pub fn print_error(msg: &str) {
    eprintln!("\x1b[31m✗\x1b[0m {}", msg);
}

/// Prints info message.
pub fn print_info(msg: &str) {
    eprintln!("\x1b[34mℹ\x1b[0m {}", msg);
}

/// Prints warning message.
pub fn print_warning(msg: &str) {
    eprintln!("\x1b[33m⚠\x1b[0m {}", msg);
}
