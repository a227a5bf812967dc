//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::{Args as ClapArgs, Parser, Subcommand};

/// Query and feed an Assemblyline malware-analysis server.
///
/// Connection settings come from the config file, then the `ASSEMBLYLINE_*`
/// environment variables, then the flags below (highest priority).
#[derive(Parser, Debug)]
#[command(name = "assemblyline")]
#[command(author, version, about)]
pub struct Args {
    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Config file (default: $XDG_CONFIG_HOME/assemblyline/config.toml)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Server base URL
    #[arg(long, global = true)]
    pub url: Option<String>,

    /// Username to log in as
    #[arg(long, global = true)]
    pub user: Option<String>,

    /// API key (selects API-key login)
    #[arg(long, global = true, conflicts_with = "password")]
    pub apikey: Option<String>,

    /// Password (selects password login)
    #[arg(long, global = true)]
    pub password: Option<String>,

    /// Also send `Authorization: Bearer <TOKEN>`
    #[arg(long, global = true, value_name = "TOKEN")]
    pub bearer_token: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Command {
    /// Log in and print the granted privileges
    Login,

    /// Show a submission
    Submission {
        /// Submission ID
        sid: String,

        /// Include every file's results
        #[arg(long, conflicts_with = "tree")]
        full: bool,

        /// Show the file tree instead
        #[arg(long)]
        tree: bool,
    },

    /// Show what the server knows about a file
    FileInfo {
        /// SHA-256 of the file
        sha256: String,
    },

    /// Look a hash up in the external data sources
    HashSearch {
        /// MD5, SHA-1 or SHA-256
        hash: String,

        /// Data sources to query (comma-separated, default: all)
        #[arg(long, value_delimiter = ',')]
        db: Vec<String>,

        /// Server-side timeout in seconds
        #[arg(long)]
        max_timeout: Option<u32>,
    },

    /// Download a file (CaRT-encoded unless --raw)
    Download {
        /// SHA-256 of the file
        sha256: String,

        /// Download the original bytes
        #[arg(long)]
        raw: bool,

        /// File name recorded in the CaRT metadata
        #[arg(long)]
        name: Option<String>,

        /// Submission whose metadata is included
        #[arg(long)]
        sid: Option<String>,

        /// Output path (default: <sha256>.cart, or <sha256> with --raw)
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },

    /// Ingest a file, hash or URL
    Ingest {
        #[command(flatten)]
        source: SourceArgs,

        /// Queue the completion message is posted to
        #[arg(long)]
        notification_queue: Option<String>,
    },

    /// Submit a file, hash or URL for immediate analysis
    Submit {
        #[command(flatten)]
        source: SourceArgs,
    },

    /// Drain completion messages from a notification queue
    Messages {
        /// Notification queue name
        queue: String,
    },
}

/// Exactly one thing to analyse.
#[derive(ClapArgs, Debug, PartialEq, Eq)]
#[group(required = true, multiple = false)]
pub struct SourceArgs {
    /// SHA-256 of a file already on the server
    #[arg(long)]
    pub sha256: Option<String>,

    /// URL for the server to fetch
    #[arg(long)]
    pub url_source: Option<String>,

    /// Local file to upload
    #[arg(long, value_name = "PATH")]
    pub file: Option<PathBuf>,
}
