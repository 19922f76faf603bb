use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use ledgerlink::account_groups::{self, GroupKind};
use ledgerlink::config::{default_config_path, Config};
use ledgerlink::credentials::{FileTokenStore, TokenStore};
use ledgerlink::error::{ApiError, ClientError};
use ledgerlink::export::write_report_csv;
use ledgerlink::http::QueryParams;
use ledgerlink::qbo::{QboAuth, QboClient, QboSession};
use ledgerlink::ramp::{RampClient, RampResource};
use secrecy::SecretString;
use serde::Serialize;
use serde_json::{json, Value};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "ledgerlink")]
#[command(about = "Ramp and QuickBooks Online API exports")]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value_os_t = default_config_path())]
    config: PathBuf,

    /// Emit logs as JSON lines
    #[arg(long)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Ramp developer API
    #[command(subcommand)]
    Ramp(RampCommand),

    /// QuickBooks Online
    #[command(subcommand)]
    Qbo(QboCommand),

    /// GL account groups
    #[command(subcommand)]
    Groups(GroupsCommand),
}

#[derive(Subcommand)]
enum RampCommand {
    /// Fetch an access token with the client-credentials grant
    Token,

    /// List a collection (departments, cards, limits, users, transactions,
    /// accounts, spend-programs)
    List {
        resource: RampResource,

        #[arg(long)]
        page_size: Option<u32>,

        /// Pagination cursor from a previous page
        #[arg(long)]
        start: Option<String>,

        /// Follow pagination to the end
        #[arg(long)]
        all: bool,
    },
}

#[derive(Subcommand)]
enum QboCommand {
    /// Print the consent URL
    AuthUrl,

    /// Run the consent flow and cache the refresh token
    Login {
        /// How long to wait for the redirect (e.g. "5m")
        #[arg(long, default_value = "5m", value_parser = parse_duration_arg)]
        timeout: Duration,
    },

    /// Refresh the access token using the cached refresh token
    Refresh,

    /// Fetch and flatten a report
    Report {
        /// Report name, e.g. TransactionListWithSplits
        name: String,

        /// First day, YYYY-MM-DD
        #[arg(long)]
        start: String,

        /// Last day, YYYY-MM-DD
        #[arg(long)]
        end: String,

        /// Write CSV instead of JSON
        #[arg(long)]
        csv: bool,
    },

    /// Run SELECT * FROM <entity>
    Query {
        entity: String,

        #[arg(long)]
        start_position: Option<u32>,

        #[arg(long)]
        max_results: Option<u32>,
    },
}

#[derive(Subcommand)]
enum GroupsCommand {
    /// List groups and their ranges
    List {
        /// departmental or general-ledger
        #[arg(long)]
        kind: Option<GroupKind>,
    },

    /// Check whether an account code belongs to a group
    Check { account: String, group: String },
}

fn parse_duration_arg(s: &str) -> Result<Duration, String> {
    ledgerlink::duration::parse_duration(s).map_err(|e| e.to_string())
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_level(true);
    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(layer.json())
            .init();
    } else {
        tracing_subscriber::registry().with(filter).with(layer).init();
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Errors print in the same `{error_code, message, status}` shape the API uses.
fn report_error(err: &anyhow::Error) {
    let api = match err.downcast_ref::<ClientError>() {
        Some(client) => client.to_api_error(),
        None => ApiError::new("ERROR", format!("{err:#}"), 500),
    };
    match serde_json::to_string_pretty(&json!({ "error": api })) {
        Ok(body) => eprintln!("{body}"),
        Err(_) => eprintln!("{api}"),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.json);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            report_error(&err);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = Config::load_with_env(&cli.config)
        .with_context(|| format!("Failed to load config: {}", cli.config.display()))?;
    let config_dir = cli
        .config
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."))
        .to_path_buf();

    match cli.command {
        Command::Ramp(command) => run_ramp(&config, command).await,
        Command::Qbo(command) => run_qbo(&config, &config_dir, command).await,
        Command::Groups(command) => run_groups(command),
    }
}

async fn run_ramp(config: &Config, command: RampCommand) -> Result<()> {
    let client = RampClient::new(config.ramp.clone());

    match command {
        RampCommand::Token => {
            let token = client.fetch_access_token().await?.into_model();
            print_json(&token)
        }
        RampCommand::List {
            resource,
            page_size,
            start,
            all,
        } => {
            let token = client.fetch_access_token().await?.into_model();
            let access_token = SecretString::from(token.access_token);
            let params = QueryParams::new()
                .with_opt("page_size", page_size)
                .with_opt("start", start);

            if all {
                let items: Vec<Value> = client.fetch_all(resource, &access_token, &params).await?;
                print_json(&items)
            } else {
                let page = client
                    .fetch_collection::<Value>(resource, &access_token, &params)
                    .await?
                    .into_model();
                print_json(&page)
            }
        }
    }
}

fn token_store(config: &Config, config_dir: &Path) -> Result<FileTokenStore> {
    let dir = config.resolve_token_dir(config_dir)?;
    FileTokenStore::with_path(dir)
}

async fn run_qbo(config: &Config, config_dir: &Path, command: QboCommand) -> Result<()> {
    let auth = QboAuth::new(config.qbo.clone());

    match command {
        QboCommand::AuthUrl => {
            let discovery = auth.discover().await?.into_model();
            let url = auth.authorization_url(&discovery, &QboAuth::new_state())?;
            println!("{url}");
            Ok(())
        }
        QboCommand::Login { timeout } => {
            let discovery = auth.discover().await?.into_model();
            let state = QboAuth::new_state();
            let url = auth.authorization_url(&discovery, &state)?;
            let bind_addr = auth.redirect_bind_addr()?;

            eprintln!("Open this URL to authorize QuickBooks access:\n\n  {url}\n");
            let callback = auth.await_redirect(&bind_addr, &state, timeout).await?;
            let tokens = auth
                .exchange_code(&discovery, &callback.code)
                .await?
                .into_model();

            let refresh_token = tokens
                .refresh_token
                .clone()
                .context("Token response did not include a refresh token")?;
            let store = token_store(config, config_dir)?;
            let key = auth.config().refresh_token_key();
            store.save(&key, SecretString::from(refresh_token)).await?;

            if let (Some(from_redirect), Some(configured)) =
                (callback.realm_id.as_deref(), auth.config().realm_id.as_deref())
            {
                if from_redirect != configured {
                    tracing::warn!(
                        from_redirect,
                        configured,
                        "Authorized company differs from configured QBO_REALM_ID"
                    );
                }
            }
            print_json(&json!({
                "environment": auth.config().environment,
                "realm_id": callback.realm_id,
                "expires_at": tokens.expires_at(Utc::now()),
                "token_key": key,
            }))
        }
        QboCommand::Refresh => {
            let store = token_store(config, config_dir)?;
            let creds = QboSession::new(&auth, &store).credentials().await?;
            print_json(&json!({
                "environment": auth.config().environment,
                "realm_id": creds.realm_id,
                "expires_at": creds.expires_at,
            }))
        }
        QboCommand::Report {
            name,
            start,
            end,
            csv,
        } => {
            let store = token_store(config, config_dir)?;
            let mut client = QboClient::new();
            if let Some(timeout) = config.qbo.report_timeout {
                client = client.with_timeout(timeout);
            }
            let report = QboSession::new(&auth, &store)
                .fetch_report(&client, &name, &start, &end)
                .await?;

            if csv {
                write_report_csv(&report, std::io::stdout().lock())
            } else {
                print_json(&report)
            }
        }
        QboCommand::Query {
            entity,
            start_position,
            max_results,
        } => {
            let store = token_store(config, config_dir)?;
            let items: Vec<Value> = QboSession::new(&auth, &store)
                .query(&QboClient::new(), &entity, start_position, max_results)
                .await?;
            print_json(&items)
        }
    }
}

fn run_groups(command: GroupsCommand) -> Result<()> {
    match command {
        GroupsCommand::List { kind } => {
            let groups: Vec<_> = account_groups::ACCOUNT_GROUPS
                .iter()
                .filter(|g| kind.map_or(true, |k| g.kind == k))
                .collect();
            print_json(&groups)
        }
        GroupsCommand::Check { account, group } => {
            if account_groups::find_group(&group).is_none() {
                tracing::warn!(group = %group, "Unknown account group");
            }
            print_json(&json!({
                "account": account,
                "group": group,
                "member": account_groups::is_account_in_group(Some(&account), &group),
            }))
        }
    }
}
