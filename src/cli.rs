//! CLI argument parsing for the curation workflow.
//!
//! The CLI is intentionally thin: every subcommand wires explicit
//! configuration (document path, endpoints, timeout) into the core
//! operations, so none of the core carries hardcoded paths or URLs.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::publish::DEFAULT_API_BASE;

/// Default SPARQL endpoint for the cleanup helper.
pub const DEFAULT_SPARQL_ENDPOINT: &str = "https://databus.dbpedia.org/sparql";

/// Root CLI entrypoint for the metadata curation workflow.
#[derive(Parser, Debug)]
#[command(
    name = "lodcur",
    version,
    about = "Release-metadata curation for knowledge-graph datasets",
    after_help = "Examples:\n  lodcur check knowledge-graphs/gnd/metadata.yaml\n  lodcur discover knowledge-graphs/dblp/metadata.yaml --with-sha256\n  lodcur publish knowledge-graphs/dblp/metadata.yaml\n  lodcur daily knowledge-graphs/\n  lodcur remove-group --account m1ci --group dblp",
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct RootArgs {
    #[command(subcommand)]
    pub command: Command,
}

/// Top-level workflow commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    Check(CheckArgs),
    Discover(DiscoverArgs),
    Publish(PublishArgs),
    Daily(DailyArgs),
    RemoveGroup(RemoveGroupArgs),
}

/// Reconcile distribution statuses for one document.
#[derive(Parser, Debug)]
#[command(about = "Probe distributions and reconcile their statuses")]
pub struct CheckArgs {
    /// Path to the dataset's metadata document
    pub metadata: PathBuf,

    /// Re-probe distributions already marked `error` instead of only
    /// `pending` ones
    #[arg(long)]
    pub retry_errors: bool,

    /// Per-probe timeout in seconds
    #[arg(long, value_name = "SECS", default_value_t = 10)]
    pub timeout_secs: u64,
}

/// Look for a newer monthly release and append it.
#[derive(Parser, Debug)]
#[command(about = "Discover a newer release and append a version entry")]
pub struct DiscoverArgs {
    /// Path to the dataset's metadata document
    pub metadata: PathBuf,

    /// Release URL template override with {year}/{month} placeholders;
    /// defaults to the document's `release-url-template`
    #[arg(long, value_name = "TEMPLATE")]
    pub url_template: Option<String>,

    /// Title for an appended version entry
    #[arg(long, value_name = "TITLE", default_value = "Monthly Snapshot")]
    pub title: String,

    /// Compute a SHA-256 content hash for an appended distribution
    /// (downloads the whole file)
    #[arg(long)]
    pub with_sha256: bool,

    /// Per-probe timeout in seconds
    #[arg(long, value_name = "SECS", default_value_t = 10)]
    pub timeout_secs: u64,
}

/// Push the document's metadata to the catalogue API.
#[derive(Parser, Debug)]
#[command(about = "Publish dataset metadata to the catalogue API")]
pub struct PublishArgs {
    /// Path to the dataset's metadata document
    pub metadata: PathBuf,

    /// Catalogue API base URL
    #[arg(long, value_name = "URL", default_value = DEFAULT_API_BASE)]
    pub api_base: String,

    /// Per-request timeout in seconds
    #[arg(long, value_name = "SECS", default_value_t = 10)]
    pub timeout_secs: u64,
}

/// Run every dataset's declared check procedure.
#[derive(Parser, Debug)]
#[command(about = "Run declared checks for every dataset under a root")]
pub struct DailyArgs {
    /// Directory containing one subdirectory per knowledge graph
    pub root: PathBuf,

    /// Re-probe distributions already marked `error`
    #[arg(long)]
    pub retry_errors: bool,

    /// Per-probe timeout in seconds
    #[arg(long, value_name = "SECS", default_value_t = 10)]
    pub timeout_secs: u64,
}

/// Remove a published group and everything in it.
#[derive(Parser, Debug)]
#[command(about = "Delete a group with all its artifacts and versions")]
pub struct RemoveGroupArgs {
    /// Account owning the group; also names the environment variable
    /// holding the API key
    #[arg(long, value_name = "ACCOUNT")]
    pub account: String,

    /// Group identifier to remove
    #[arg(long, value_name = "GROUP")]
    pub group: String,

    /// Catalogue API base URL
    #[arg(long, value_name = "URL", default_value = DEFAULT_API_BASE)]
    pub api_base: String,

    /// SPARQL endpoint used to enumerate group members
    #[arg(long, value_name = "URL", default_value = DEFAULT_SPARQL_ENDPOINT)]
    pub sparql_endpoint: String,

    /// Per-request timeout in seconds
    #[arg(long, value_name = "SECS", default_value_t = 10)]
    pub timeout_secs: u64,
}
