use clap::{Parser, Subcommand};
use std::io::Read;
use std::path::{Path, PathBuf};

mod commands;
mod error;
mod spec_file;

use commands::{Audit, ConnectionFile, render};
use dbward::{
    BackupSpec, DbwardConfig, GfsPolicy, PipelineContext, RestoreSpec, Snapshot, SshDescriptor,
};
use error::CliError;

/// Exit code when a connectivity probe ran but did not succeed
const PROBE_FAILED: i32 = 2;

#[derive(Parser, Debug)]
#[command(name = "dbward", version)]
#[command(about = "dbward - database backup and restore through SSH bastions")]
struct Cli {
    /// Runtime configuration (TOML); DBWARD_* environment variables override it
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Buffer the audit log and print it with the result as JSON
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Dump, compress and upload a database
    Backup {
        /// Backup spec (.json, .yaml or .toml)
        #[arg(long)]
        spec: PathBuf,
    },
    /// Download an artifact and replay it into a freshly recreated schema
    Restore {
        /// Restore spec (.json, .yaml or .toml)
        #[arg(long)]
        spec: PathBuf,
    },
    /// Probe a database server, through its bastion if configured
    TestConnection {
        /// File with `connection` and optional `database`
        #[arg(long)]
        connection: PathBuf,
    },
    /// Authenticate against a bastion without forwarding anything
    TestSsh {
        /// SSH descriptor file
        #[arg(long)]
        ssh: PathBuf,
    },
    /// List user databases on a server
    ListDatabases {
        /// File with `connection`
        #[arg(long)]
        connection: PathBuf,
    },
    /// Mask credentials in a command line (reads stdin when no text is given)
    Redact {
        text: Vec<String>,
    },
    /// Plan grandfather-father-son retention over a snapshot list
    Retention {
        /// JSON, YAML or TOML list of `{id, created_at}`
        #[arg(long)]
        snapshots: PathBuf,
        #[arg(long, default_value_t = 7)]
        daily: u32,
        #[arg(long, default_value_t = 4)]
        weekly: u32,
        #[arg(long, default_value_t = 12)]
        monthly: u32,
    },
}

/// TOML has no top-level arrays, so snapshot lists there live under `snapshots`
#[derive(Debug, serde::Deserialize)]
#[serde(untagged)]
enum SnapshotList {
    Bare(Vec<Snapshot>),
    Wrapped { snapshots: Vec<Snapshot> },
}

impl SnapshotList {
    fn into_vec(self) -> Vec<Snapshot> {
        match self {
            SnapshotList::Bare(list) | SnapshotList::Wrapped { snapshots: list } => list,
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<DbwardConfig, CliError> {
    let config = match path {
        Some(path) => DbwardConfig::load_from_file(path)?,
        None => DbwardConfig::default(),
    };
    Ok(config.apply_env_overrides()?)
}

async fn run(cli: Cli) -> Result<i32, CliError> {
    let audit = Audit::new(cli.log_json);
    let logger = audit.logger();

    let output = match cli.command {
        Commands::Backup { spec } => {
            let spec: BackupSpec = spec_file::load(&spec)?;
            let context = PipelineContext::new(load_config(cli.config.as_deref())?);
            let outcome = commands::backup(context, &spec, logger).await?;
            render(&outcome, &audit)?
        }
        Commands::Restore { spec } => {
            let spec: RestoreSpec = spec_file::load(&spec)?;
            let context = PipelineContext::new(load_config(cli.config.as_deref())?);
            commands::restore(context, &spec, logger).await?;
            render(&serde_json::json!({ "restored": spec.destination_schema }), &audit)?
        }
        Commands::TestConnection { connection } => {
            let file: ConnectionFile = spec_file::load(&connection)?;
            let context = PipelineContext::new(load_config(cli.config.as_deref())?);
            let result = commands::test_connection(&context, &file, logger).await?;
            println!("{}", render(&result, &audit)?);
            return Ok(if result.success { 0 } else { PROBE_FAILED });
        }
        Commands::TestSsh { ssh } => {
            let ssh: SshDescriptor = spec_file::load(&ssh)?;
            let context = PipelineContext::new(load_config(cli.config.as_deref())?);
            let result = commands::test_ssh(&context, &ssh, logger).await;
            println!("{}", render(&result, &audit)?);
            return Ok(if result.success { 0 } else { PROBE_FAILED });
        }
        Commands::ListDatabases { connection } => {
            let file: ConnectionFile = spec_file::load(&connection)?;
            let context = PipelineContext::new(load_config(cli.config.as_deref())?);
            let databases = commands::list_databases(&context, &file, logger).await?;
            render(&databases, &audit)?
        }
        Commands::Redact { text } => {
            let input = if text.is_empty() {
                let mut buffer = String::new();
                std::io::stdin()
                    .read_to_string(&mut buffer)
                    .map_err(|source| CliError::Read {
                        path: PathBuf::from("<stdin>"),
                        source,
                    })?;
                buffer
            } else {
                text.join(" ")
            };
            dbward::core::redact(input.trim_end())
        }
        Commands::Retention {
            snapshots,
            daily,
            weekly,
            monthly,
        } => {
            let list: SnapshotList = spec_file::load(&snapshots)?;
            let plan = commands::retention(&GfsPolicy::new(daily, weekly, monthly), &list.into_vec());
            render(&plan, &audit)?
        }
    };

    println!("{}", output);
    Ok(0)
}

#[tokio::main]
async fn main() {
    // Initialize JSON logging once.
    let env_filter = tracing_subscriber::EnvFilter::from_default_env();
    let env_filter = match "info".parse() {
        Ok(directive) => env_filter.add_directive(directive),
        Err(_) => env_filter,
    };

    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .json()
        .try_init();

    let cli = Cli::parse();

    match run(cli).await {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            tracing::error!(error = %e, "Command failed");
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}
