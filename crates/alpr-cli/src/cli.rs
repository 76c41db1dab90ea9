use std::path::PathBuf;

use alpr_core::SyncState;
use clap::{Args, Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "alpr")]
#[command(about = "Capture traffic violations offline and deliver them to the authority")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Optional path to local outbox database
    #[arg(long, global = true, value_name = "PATH")]
    pub db_path: Option<PathBuf>,

    /// Optional path to the client config file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Record a captured violation in the local outbox
    #[command(alias = "add")]
    Record(RecordArgs),
    /// List violations, newest first
    List {
        /// Number of violations to show
        #[arg(short, long, default_value = "20")]
        limit: usize,
        /// Number of violations to skip
        #[arg(long, default_value = "0")]
        offset: usize,
        /// Only show violations in this sync state
        #[arg(long, value_enum)]
        state: Option<StateFilter>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Search captured violations
    Search(SearchArgs),
    /// Show one violation
    Show {
        /// Violation id
        id: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show outbox counts and the last sync cycle
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Deliver pending violations now
    Sync {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List violations the authority refused or that were given up on
    Failed {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Move failed violations back to the pending queue
    Retry {
        /// Violation id to requeue
        id: Option<String>,
        /// Requeue every failed violation
        #[arg(long, conflicts_with = "id")]
        all: bool,
    },
    /// Delete synced violations older than the retention window
    Purge {
        /// Retention window in days (defaults to the configured value)
        #[arg(long, value_name = "DAYS")]
        older_than_days: Option<u32>,
    },
    /// Run scheduled sync cycles until interrupted
    Daemon {
        /// Seconds between scheduled cycles (defaults to the configured value)
        #[arg(long, value_name = "SECS")]
        interval_secs: Option<u64>,
    },
    /// Manage client configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Args, Debug, Clone)]
pub struct RecordArgs {
    /// Recognized plate text
    pub plate: String,
    /// Violation category (e.g. speeding, parking)
    #[arg(short = 't', long = "type", value_name = "TYPE")]
    pub violation_type: String,
    /// Recognizer confidence in [0, 1]
    #[arg(long, default_value = "1.0")]
    pub confidence: f64,
    /// Latitude of the capture location
    #[arg(long, requires = "longitude", allow_negative_numbers = true)]
    pub latitude: Option<f64>,
    /// Longitude of the capture location
    #[arg(long, requires = "latitude", allow_negative_numbers = true)]
    pub longitude: Option<f64>,
    /// Path or URL of the evidence image
    #[arg(long, value_name = "PATH")]
    pub image: Option<String>,
    /// Submitting officer (defaults to the configured officer)
    #[arg(long)]
    pub officer: Option<String>,
    /// Capture time (YYYY-MM-DD or RFC 3339, defaults to now)
    #[arg(long, value_name = "TIME")]
    pub captured_at: Option<String>,
    /// Output the stored violation as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug, Clone, Default)]
pub struct SearchArgs {
    /// Plate text fragment
    pub plate: Option<String>,
    /// Exact violation category
    #[arg(short = 't', long = "type", value_name = "TYPE")]
    pub violation_type: Option<String>,
    /// Captured at or after (YYYY-MM-DD or RFC 3339)
    #[arg(long, value_name = "TIME")]
    pub from: Option<String>,
    /// Captured before; a bare date includes that whole day
    #[arg(long, value_name = "TIME")]
    pub to: Option<String>,
    /// Only show violations in this sync state
    #[arg(long, value_enum)]
    pub state: Option<StateFilter>,
    /// Number of violations to show
    #[arg(short, long, default_value = "50")]
    pub limit: usize,
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum StateFilter {
    Pending,
    Synced,
    Failed,
}

impl From<StateFilter> for SyncState {
    fn from(value: StateFilter) -> Self {
        match value {
            StateFilter::Pending => Self::Pending,
            StateFilter::Synced => Self::Synced,
            StateFilter::Failed => Self::Failed,
        }
    }
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Initialize or update the config file
    Init {
        /// Base URL of the remote authority
        #[arg(long, value_name = "URL")]
        api_url: Option<String>,
        /// Bearer token for the remote authority
        #[arg(long, value_name = "TOKEN")]
        api_token: Option<String>,
        /// Device identifier (generated when absent)
        #[arg(long, value_name = "ID")]
        device_id: Option<String>,
        /// Default submitting officer
        #[arg(long, value_name = "NAME")]
        officer: Option<String>,
        /// Seconds between scheduled cycles
        #[arg(long, value_name = "SECS")]
        sync_interval_secs: Option<u64>,
        /// Days synced violations are kept
        #[arg(long, value_name = "DAYS")]
        retention_days: Option<u32>,
    },
    /// Print the effective configuration
    Show {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}
