use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use employee_directory_api::{AppConfig, DirectoryApi};
use employee_directory_core::{EmployeeFilter, EmployeeId, EmployeePatch};
use employee_directory_source::HttpRecordSource;
use serde::Serialize;
use serde_json::Value;
use tracing_subscriber::EnvFilter;

const CLI_CONTRACT_VERSION: &str = "cli.v1";

#[derive(Debug, Parser)]
#[command(name = "edir")]
#[command(about = "Employee directory CLI")]
struct Cli {
    /// JSON config file; flags below override it
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[arg(long, global = true)]
    base_url: Option<String>,

    #[arg(long, global = true)]
    timeout_secs: Option<u64>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    Dashboard,
    EmployeeOfTheDay,
    Directory(DirectoryArgs),
    Feed(FeedArgs),
    Show(ShowArgs),
}

#[derive(Debug, Args)]
struct DirectoryArgs {
    #[arg(long)]
    search: Option<String>,
    #[arg(long)]
    department: Option<String>,
}

#[derive(Debug, Args)]
struct FeedArgs {
    /// Pages to load, the first included
    #[arg(long, default_value_t = 1)]
    pages: usize,
}

#[derive(Debug, Args)]
struct ShowArgs {
    id: u64,
    #[arg(long)]
    first_name: Option<String>,
    #[arg(long)]
    last_name: Option<String>,
    #[arg(long)]
    email: Option<String>,
    #[arg(long)]
    phone: Option<String>,
    #[arg(long)]
    age: Option<u32>,
    /// Remove the employee from this session's view
    #[arg(long, conflicts_with_all = ["first_name", "last_name", "email", "phone", "age"])]
    delete: bool,
}

impl ShowArgs {
    fn patch(&self) -> EmployeePatch {
        EmployeePatch {
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            email: self.email.clone(),
            phone: self.phone.clone(),
            age: self.age,
        }
    }
}

impl Cli {
    fn app_config(&self) -> Result<AppConfig> {
        let mut config = AppConfig::load(self.config.as_deref())?;
        if let Some(base_url) = &self.base_url {
            config.source.base_url.clone_from(base_url);
        }
        if let Some(timeout_secs) = self.timeout_secs {
            config.source.timeout_secs = timeout_secs;
        }
        Ok(config)
    }
}

fn with_contract_version(value: Value) -> Value {
    match value {
        Value::Object(mut object) => {
            object.insert(
                "contract_version".to_string(),
                Value::String(CLI_CONTRACT_VERSION.to_string()),
            );
            Value::Object(object)
        }
        other => serde_json::json!({
            "contract_version": CLI_CONTRACT_VERSION,
            "payload": other
        }),
    }
}

fn emit_json(value: &impl Serialize) -> Result<()> {
    let value = serde_json::to_value(value)?;
    println!("{}", serde_json::to_string_pretty(&with_contract_version(value))?);
    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let config = cli.app_config()?;
    let source = HttpRecordSource::with_config(config.source.clone())
        .context("failed to build record source")?;
    tracing::info!(upstream = %config.source.base_url, command = ?cli.command, "running");
    let api = DirectoryApi::new(source, config.directory);
    run(&api, cli.command).await
}

async fn run(api: &DirectoryApi<HttpRecordSource>, command: Command) -> Result<()> {
    match command {
        Command::Dashboard => {
            let view = api.dashboard().await.context("failed to load dashboard")?;
            emit_json(&view)
        }
        Command::EmployeeOfTheDay => emit_json(&api.employee_of_the_day().await),
        Command::Directory(args) => {
            let filter = EmployeeFilter { search: args.search, department: args.department };
            emit_json(&api.directory(filter).await)
        }
        Command::Feed(args) => {
            let mut view = api.open_feed().await;
            for _ in 1..args.pages {
                if !view.has_more {
                    break;
                }
                view = api.load_more(view.feed_id).await.context("failed to load page")?;
            }
            emit_json(&view)
        }
        Command::Show(args) => {
            let opened = api
                .open_detail(EmployeeId(args.id))
                .await
                .with_context(|| format!("failed to open employee {}", args.id))?;
            let patch = args.patch();
            let view = if args.delete {
                api.delete_detail(opened.session_id)?
            } else if patch.is_empty() {
                opened
            } else {
                api.patch_detail(opened.session_id, patch)?
            };
            emit_json(&view)
        }
    }
}
