//! Administrative CLI for PWA account management.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use figment::Figment;
use figment::providers::{Env, Format, Toml};
use pwa_accounts::{AccountError, AccountMgr, mailer};
use pwa_core::ObfuscatedPasswd;
use pwa_core::config::AppConfig;
use pwa_metadata::{AccountRow, InstRow, OpenInstRow};
use std::path::Path;
use std::process::ExitCode;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Environment variable prefix for configuration overrides.
const ENV_PREFIX: &str = "PWA_";

#[derive(Parser)]
#[command(name = "pwactl")]
#[command(about = "Administrative CLI for PWA account management")]
#[command(version)]
struct Cli {
    /// Path to configuration file
    #[arg(
        short,
        long,
        global = true,
        env = "PWA_CONFIG",
        default_value = "config/pwa.toml"
    )]
    config: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(flatten)]
    Store(StoreCommand),
    /// Send a test mail with the configured mailer
    TestMail {
        /// Recipient address
        to: String,
    },
}

/// Commands that need the account store.
#[derive(Subcommand)]
enum StoreCommand {
    /// Create the account tables
    SetupDatabase,
    /// Issue an open installation and print its obfuscated password
    AddOpenInst {
        /// Account username, created on first use
        username: String,
        /// Also mail the onboarding link to this address
        #[arg(long)]
        email: Option<String>,
    },
    /// Bind a device or refresh its metadata
    AddOrModifyInst {
        /// Instance id reported by the client
        inst_id: String,
        /// Account username
        username: String,
        /// Obfuscated password (URL-safe base64)
        passwd: String,
        /// Client user agent
        user_agent: String,
        /// Client app version
        app_version: String,
        /// How the app was launched
        #[arg(long)]
        launcher: Option<String>,
    },
    /// Remove an installation, and its account if nothing else is left
    RemoveInst {
        /// Instance id
        inst_id: String,
    },
    /// List records, tab separated
    List {
        #[arg(value_enum)]
        what: ListTarget,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ListTarget {
    Accounts,
    OpenInsts,
    Insts,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            match err.downcast_ref::<AccountError>() {
                Some(AccountError::NotFound(what)) => eprintln!("Not found: {what}"),
                _ => eprintln!("Error: {err:#}"),
            }
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = load_config(Path::new(&cli.config))?;

    match cli.command {
        Commands::TestMail { to } => handle_test_mail(&config, &to).await,
        Commands::Store(command) => {
            let mgr = AccountMgr::from_config(&config)
                .await
                .context("failed to open account store")?;
            handle_command(&mgr, &config, command).await
        }
    }
}

/// Load configuration from an optional TOML file merged with `PWA_`
/// environment variables.
fn load_config(path: &Path) -> Result<AppConfig> {
    let mut figment = Figment::new();
    let has_config_file = path.exists();

    if has_config_file {
        tracing::debug!(config_path = %path.display(), "Loading configuration from file");
        figment = figment.merge(Toml::file(path));
    }

    let has_env_config = std::env::vars()
        .any(|(key, _)| key.starts_with(ENV_PREFIX) && key != "PWA_CONFIG");

    if !has_config_file && !has_env_config {
        anyhow::bail!(
            "No configuration provided.\n\n\
             Provide configuration via one of:\n  \
             1. Config file: pwactl --config /path/to/pwa.toml <command>\n  \
             2. Environment variables: PWA_PASSWD_KEY=... PWA_MAX_OPEN_INST_AGE=P1D \
             PWA_DB__PATH=/var/lib/pwa/pwa.db pwactl <command>\n\n\
             See config/pwa.example.toml for example configuration."
        );
    }

    let config: AppConfig = figment
        .merge(Env::prefixed(ENV_PREFIX).split("__"))
        .extract()
        .context("failed to load configuration")?;
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("invalid configuration: {e}"))?;

    Ok(config)
}

async fn handle_command(
    mgr: &AccountMgr,
    config: &AppConfig,
    command: StoreCommand,
) -> Result<()> {
    match command {
        StoreCommand::SetupDatabase => {
            mgr.create_tables()
                .await
                .context("failed to create tables")?;
            println!("Database set up");
        }
        StoreCommand::AddOpenInst { username, email } => {
            let obfuscated = match email {
                Some(email) => {
                    let mailer = mailer::from_config(&config.mail);
                    mgr.invite(&username, &email, &config.app_url, mailer.as_ref())
                        .await?
                }
                None => mgr.add_open_inst(&username).await?,
            };
            println!("{obfuscated}");
        }
        StoreCommand::AddOrModifyInst {
            inst_id,
            username,
            passwd,
            user_agent,
            app_version,
            launcher,
        } => {
            let obfuscated =
                ObfuscatedPasswd::from_base64(&passwd).context("invalid obfuscated password")?;
            let outcome = mgr
                .add_or_modify_inst(
                    &inst_id,
                    &username,
                    &obfuscated,
                    &user_agent,
                    &app_version,
                    launcher.as_deref(),
                )
                .await?;
            println!("{outcome}");
        }
        StoreCommand::RemoveInst { inst_id } => {
            mgr.remove_inst(&inst_id).await?;
            println!("Removed {inst_id}");
        }
        StoreCommand::List { what } => match what {
            ListTarget::Accounts => {
                for row in mgr.account_accessor().list().await? {
                    println!("{}", format_account(&row)?);
                }
            }
            ListTarget::OpenInsts => {
                for row in mgr.open_inst_accessor().list().await? {
                    println!("{}", format_open_inst(&row)?);
                }
            }
            ListTarget::Insts => {
                for row in mgr.inst_accessor().list().await? {
                    println!("{}", format_inst(&row)?);
                }
            }
        },
    }
    Ok(())
}

async fn handle_test_mail(config: &AppConfig, to: &str) -> Result<()> {
    let mailer = mailer::from_config(&config.mail);
    if !mailer.send_test_mail(to).await? {
        anyhow::bail!("test mail to {to} was not accepted");
    }
    println!("Test mail sent to {to}");
    Ok(())
}

fn format_timestamp(ts: OffsetDateTime) -> Result<String> {
    ts.format(&Rfc3339).context("failed to format timestamp")
}

fn format_account(row: &AccountRow) -> Result<String> {
    Ok(format!(
        "{}\t{}\t{}",
        row.username,
        format_timestamp(row.created)?,
        format_timestamp(row.modified)?
    ))
}

fn format_open_inst(row: &OpenInstRow) -> Result<String> {
    Ok(format!(
        "{}\t{}",
        row.username,
        format_timestamp(row.created)?
    ))
}

fn format_inst(row: &InstRow) -> Result<String> {
    Ok(format!(
        "{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}",
        row.short_inst_id(),
        row.username,
        row.user_agent,
        row.app_version,
        row.launcher.as_deref().unwrap_or("-"),
        row.update_count,
        format_timestamp(row.created)?,
        format_timestamp(row.modified)?
    ))
}
