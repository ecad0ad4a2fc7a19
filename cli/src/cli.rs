use clap::{Parser, ValueHint};
use std::path::PathBuf;

#[derive(Parser)]
#[command(about, version, name = "ldf-client")]
/// Evaluates SPARQL queries over Triple Pattern Fragments servers
pub struct Args {
    /// URLs of the Triple Pattern Fragments servers to query
    ///
    /// Replaces the data sources of the configuration file.
    #[arg(value_hint = ValueHint::Url)]
    pub datasources: Vec<String>,
    /// The SPARQL query
    #[arg(short, long, required_unless_present = "query_file", conflicts_with = "query_file")]
    pub query: Option<String>,
    /// File that contains the SPARQL query
    #[arg(short = 'f', long, value_hint = ValueHint::FilePath)]
    pub query_file: Option<PathBuf>,
    /// JSON configuration file
    ///
    /// The options below take precedence over the values of the file.
    #[arg(short, long, value_hint = ValueHint::FilePath)]
    pub config: Option<PathBuf>,
    /// Format of the results
    ///
    /// It can be an extension like "json" or "ttl" or a MIME type like "text/csv".
    /// Defaults to SPARQL JSON for solutions and booleans and to Turtle for graphs.
    #[arg(short = 't', long)]
    pub format: Option<String>,
    /// Asks the servers for the state of the data at this time, in RFC 3339 format
    #[arg(short, long)]
    pub datetime: Option<String>,
    /// Request timeout in milliseconds
    #[arg(long)]
    pub timeout: Option<u64>,
    /// Maximum number of concurrent HTTP requests
    #[arg(long)]
    pub max_active_requests: Option<usize>,
    /// Number of servers that may fail before a query fails
    #[arg(long)]
    pub error_threshold: Option<usize>,
    /// Log filter, e.g. "debug" or "ldf_engine=trace"
    ///
    /// Defaults to the RUST_LOG environment variable or "warn".
    #[arg(short, long)]
    pub log_level: Option<String>,
}
