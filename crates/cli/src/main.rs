//! kbpick CLI - browse a connection and index resources into knowledge bases

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use kbpick_core::view::{SortField, StatusFilter};
use kbpick_sync::SyncConfig;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod cmd;
mod session;
mod system_config;
mod util;

/// kbpick - pick files from a connection and index them into a knowledge base
#[derive(Parser)]
#[command(name = "kbpick")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Log debug output (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum SortArg {
    Name,
    Modified,
}

#[derive(Clone, Copy, ValueEnum)]
enum StatusArg {
    All,
    Indexed,
    NotIndexed,
    Processing,
    Error,
}

#[derive(Subcommand)]
enum Commands {
    /// Show a folder with indexing statuses
    View {
        /// JSON fixture describing the connection and knowledge bases
        #[arg(long)]
        fixture: PathBuf,
        /// Folder id (default: connection root)
        #[arg(long)]
        folder: Option<String>,
        /// Knowledge base id (default: first available)
        #[arg(long)]
        kb: Option<String>,
        /// Only show names containing this text
        #[arg(long)]
        filter: Option<String>,
        #[arg(long, value_enum, default_value = "all")]
        status: StatusArg,
        #[arg(long, value_enum, default_value = "name")]
        sort: SortArg,
        /// Sort descending
        #[arg(long)]
        desc: bool,
        /// Preload every subfolder after listing
        #[arg(long)]
        prefetch: bool,
    },
    /// Toggle resources in order and show the resulting selection
    Select {
        #[arg(long)]
        fixture: PathBuf,
        #[arg(long)]
        folder: Option<String>,
        /// Resource ids to toggle
        #[arg(long = "pick", required = true, num_args = 1..)]
        picks: Vec<String>,
    },
    /// Index resources and wait until the knowledge base reports them
    Index {
        #[arg(long)]
        fixture: PathBuf,
        #[arg(long)]
        kb: Option<String>,
        /// Folder id holding the picks (default: connection root)
        #[arg(long)]
        folder: Option<String>,
        #[arg(long = "pick", required = true, num_args = 1..)]
        picks: Vec<String>,
        /// Make the knowledge base reject writes
        #[arg(long)]
        fail_write: bool,
    },
    /// Remove a resource from the knowledge base
    Deindex {
        #[arg(long)]
        fixture: PathBuf,
        #[arg(long)]
        kb: Option<String>,
        /// Folder id holding the resource (default: connection root)
        #[arg(long)]
        folder: Option<String>,
        /// Resource id
        #[arg(long)]
        id: String,
        #[arg(long)]
        fail_write: bool,
    },
    /// View and edit configuration
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Show all values
    List,
    /// Show one value
    Get {
        /// Dotted key, e.g. poll.interval_ms
        key: String,
    },
    /// Change one value
    Set { key: String, value: String },
    /// Show the config file location
    Path {
        /// Create the file with defaults if missing
        #[arg(long)]
        create: bool,
    },
    /// Print a commented example
    Example,
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Timing settings from the system config
fn sync_config() -> Result<SyncConfig> {
    Ok(system_config::load()?.sync_config())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::View { fixture, folder, kb, filter, status, sort, desc, prefetch } => {
            let options = cmd::view::ViewOptions {
                fixture,
                folder,
                kb,
                filter,
                status: status.into(),
                sort: sort.into(),
                desc,
                prefetch,
            };
            cmd::view::run(options, sync_config()?).await
        }
        Commands::Select { fixture, folder, picks } => {
            cmd::select::run(&fixture, folder.as_deref(), &picks, sync_config()?).await
        }
        Commands::Index { fixture, kb, folder, picks, fail_write } => {
            let config = sync_config()?;
            cmd::index::run(&fixture, kb.as_deref(), folder.as_deref(), &picks, fail_write, config).await
        }
        Commands::Deindex { fixture, kb, folder, id, fail_write } => {
            let config = sync_config()?;
            cmd::deindex::run(&fixture, kb.as_deref(), folder.as_deref(), &id, fail_write, config).await
        }
        Commands::Config(config_cmd) => match config_cmd {
            ConfigCommands::List => cmd::config::run_list(),
            ConfigCommands::Get { key } => cmd::config::run_get(&key),
            ConfigCommands::Set { key, value } => cmd::config::run_set(&key, &value),
            ConfigCommands::Path { create } => cmd::config::run_path(create),
            ConfigCommands::Example => cmd::config::run_example(),
        },
    }
}

impl From<SortArg> for SortField {
    fn from(arg: SortArg) -> Self {
        match arg {
            SortArg::Name => SortField::Name,
            SortArg::Modified => SortField::ModifiedAt,
        }
    }
}

impl From<StatusArg> for StatusFilter {
    fn from(arg: StatusArg) -> Self {
        match arg {
            StatusArg::All => StatusFilter::All,
            StatusArg::Indexed => StatusFilter::Indexed,
            StatusArg::NotIndexed => StatusFilter::NotIndexed,
            StatusArg::Processing => StatusFilter::Processing,
            StatusArg::Error => StatusFilter::Error,
        }
    }
}
