//! Keyhold CLI - Command-line client
//!
//! Usage:
//!   keyhold register <email>
//!   keyhold login <email>
//!   keyhold refresh
//!   keyhold logout
//!   keyhold me
//!
//! Tokens are kept in `~/.keyhold/tokens.json` unless `--token-file` says otherwise.

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use keyhold_client::{AuthClient, FileTokenStore, FormError, FormState, LoginForm, RegisterForm};
use std::io::{self, BufRead, Write};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "keyhold")]
#[command(about = "Keyhold authentication CLI")]
#[command(version)]
struct Cli {
    /// Base URL of the Keyhold API
    #[arg(long, env = "KEYHOLD_SERVER", default_value = "http://localhost:3000")]
    server: String,

    /// Where issued tokens are stored
    #[arg(long, env = "KEYHOLD_TOKEN_FILE")]
    token_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create an account and store its tokens
    Register {
        email: String,
        /// Read from stdin when omitted
        #[arg(long, env = "KEYHOLD_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },
    /// Log in and store the issued tokens
    Login {
        email: String,
        /// Read from stdin when omitted
        #[arg(long, env = "KEYHOLD_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },
    /// Exchange the stored refresh token for a new pair
    Refresh,
    /// Revoke the stored refresh token and forget local tokens
    Logout,
    /// Show the logged-in account
    Me,
}

fn default_token_file() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".keyhold")
        .join("tokens.json")
}

fn prompt(label: &str) -> anyhow::Result<String> {
    print!("{label}: ");
    io::stdout().flush()?;

    let mut line = String::new();
    io::stdin()
        .lock()
        .read_line(&mut line)
        .context("failed to read from stdin")?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

fn report(state: &FormState) -> anyhow::Result<()> {
    match state {
        FormState::Success => Ok(()),
        FormState::Error(errors) => {
            for error in errors {
                match error {
                    FormError::Field { field, message } => eprintln!("  {field}: {message}"),
                    other => eprintln!("  {other}"),
                }
            }
            bail!("request failed")
        }
        other => bail!("unexpected form state: {other:?}"),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "keyhold=warn,keyhold_client=warn".into()),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let token_file = cli.token_file.unwrap_or_else(default_token_file);
    tracing::debug!(server = %cli.server, token_file = %token_file.display(), "starting");
    let client = AuthClient::new(&cli.server, FileTokenStore::new(token_file))?;

    match cli.command {
        Commands::Register { email, password } => {
            let (password, repeat) = match password {
                Some(p) => (p.clone(), p),
                None => (prompt("Password")?, prompt("Repeat password")?),
            };

            let mut form = RegisterForm::new();
            form.set_email(&email);
            form.set_password(&password);
            form.set_repeat_password(&repeat);
            report(form.submit(&client).await)?;

            println!("Registered {}", form.email());
        }
        Commands::Login { email, password } => {
            let password = match password {
                Some(p) => p,
                None => prompt("Password")?,
            };

            let mut form = LoginForm::new();
            form.set_email(&email);
            form.set_password(&password);
            report(form.submit(&client).await)?;

            println!("Logged in as {}", form.email());
        }
        Commands::Refresh => {
            client.refresh().await?;
            println!("Tokens refreshed");
        }
        Commands::Logout => {
            let message = client.logout().await?;
            println!("{message}");
        }
        Commands::Me => {
            let profile = client.me().await?;
            println!("{} ({})", profile.email, profile.id);
        }
    }

    Ok(())
}
