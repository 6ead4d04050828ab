use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

use tabledesk_core::{AliasTable, DEFAULT_TOP_N};

#[derive(Debug, Parser)]
#[command(name = "tabledesk-studio")]
#[command(about = "TableDesk Studio - Schema-driven table editing over HTTP")]
#[command(version)]
pub struct Args {
    /// Port to listen on
    #[arg(short, long, default_value = "5000")]
    pub port: u16,

    /// Address to bind to
    #[arg(long, default_value = "127.0.0.1")]
    pub host: String,

    /// SQLite database file
    #[arg(short, long, default_value = "tabledesk.db")]
    pub database: PathBuf,

    /// SQL script applied once at startup (e.g. CREATE TABLE IF NOT EXISTS ...)
    #[arg(long)]
    pub init_script: Option<PathBuf>,

    /// Seed the database with demo tables if they are missing
    #[arg(long, default_value_t = false)]
    pub demo: bool,

    /// How long a connection waits on a locked database, in milliseconds
    #[arg(long, default_value_t = 5000)]
    pub busy_timeout_ms: u64,

    /// Largest accepted upload, in megabytes
    #[arg(long, default_value_t = 16)]
    pub max_upload_mb: usize,

    /// Base URL of the completion service
    #[arg(long, default_value = "http://localhost:11434")]
    pub suggest_url: String,

    /// Model name passed to the completion service
    #[arg(long, default_value = "llama3")]
    pub suggest_model: String,

    /// Context window requested from the completion service, in tokens
    #[arg(long, default_value_t = 4096)]
    pub suggest_context: u32,

    /// Completion request timeout in seconds (no timeout when unset)
    #[arg(long)]
    pub suggest_timeout: Option<u64>,

    /// Number of suggestions returned per request
    #[arg(long, default_value_t = DEFAULT_TOP_N)]
    pub suggest_top_n: usize,

    /// Table holding alias groups
    #[arg(long, default_value = "altnames")]
    pub alias_table: String,

    /// Group id column of the alias table
    #[arg(long, default_value = "id")]
    pub alias_group_column: String,

    /// Alias text column of the alias table
    #[arg(long, default_value = "altname")]
    pub alias_name_column: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

#[derive(Debug, Clone)]
pub struct StudioConfig {
    pub host: String,
    pub port: u16,
    pub database: PathBuf,
    pub init_script: Option<PathBuf>,
    pub demo: bool,
    pub busy_timeout: Duration,
    pub max_upload_bytes: usize,
    pub suggest: SuggestConfig,
    pub aliases: AliasTable,
}

/// Completion service settings.
#[derive(Debug, Clone)]
pub struct SuggestConfig {
    pub url: String,
    pub model: String,
    pub context_tokens: u32,
    pub timeout: Option<Duration>,
    pub top_n: usize,
}

impl From<Args> for StudioConfig {
    fn from(args: Args) -> Self {
        Self {
            host: args.host,
            port: args.port,
            database: args.database,
            init_script: args.init_script,
            demo: args.demo,
            busy_timeout: Duration::from_millis(args.busy_timeout_ms),
            max_upload_bytes: args.max_upload_mb * 1024 * 1024,
            suggest: SuggestConfig {
                url: args.suggest_url,
                model: args.suggest_model,
                context_tokens: args.suggest_context,
                timeout: args.suggest_timeout.map(Duration::from_secs),
                top_n: args.suggest_top_n,
            },
            aliases: AliasTable {
                table: args.alias_table,
                group_column: args.alias_group_column,
                alias_column: args.alias_name_column,
            },
        }
    }
}

impl Default for StudioConfig {
    fn default() -> Self {
        Args::parse_from(["tabledesk-studio"]).into()
    }
}

impl StudioConfig {
    /// Default configuration pointed at a database file.
    pub fn for_database(database: impl Into<PathBuf>) -> Self {
        Self {
            database: database.into(),
            ..Self::default()
        }
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn base_url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }
}
