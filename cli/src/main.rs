use crate::cli::Args;
use anyhow::{bail, Context};
use clap::Parser;
use ldf_client::sparql::QueryResults;
use ldf_client::{ClientConfig, LdfClient};
use oxrdfio::RdfFormat;
use sparesults::QueryResultsFormat;
use std::fs;
use std::io::{self, stdout, BufWriter, Write};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use tracing::debug;
use tracing_subscriber::EnvFilter;

mod cli;

#[tokio::main]
pub async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logging(args.log_level.as_deref())?;

    let config = load_config(&args)?;
    let query = if let Some(query) = &args.query {
        query.clone()
    } else if let Some(file) = &args.query_file {
        fs::read_to_string(file)
            .with_context(|| format!("Unable to read the query file {}", file.display()))?
    } else {
        bail!("Either --query or --query-file must be set")
    };

    let client = LdfClient::new(config)?;
    let results = client.query(&query).await?;
    let writer = write_results(results, args.format.as_deref(), BufWriter::new(stdout())).await?;
    debug!(requests = client.request_count(), "Query finished");
    writer
        .into_inner()
        .map_err(io::IntoInnerError::into_error)?
        .flush()?;
    Ok(())
}

fn init_logging(level: Option<&str>) -> anyhow::Result<()> {
    let filter = match level {
        Some(level) => {
            EnvFilter::try_new(level).with_context(|| format!("Invalid log level {level}"))?
        }
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
    Ok(())
}

/// Reads the configuration file, if any, and applies the command line options on top of it.
fn load_config(args: &Args) -> anyhow::Result<ClientConfig> {
    let mut config = if let Some(path) = &args.config {
        ClientConfig::from_path(path)
            .with_context(|| format!("Invalid configuration file {}", path.display()))?
    } else {
        ClientConfig::default()
    };

    if !args.datasources.is_empty() {
        config.datasources.clone_from(&args.datasources);
    }
    if let Some(timeout) = args.timeout {
        config.timeout = timeout;
    }
    if let Some(max_active_requests) = args.max_active_requests {
        config.max_active_requests = max_active_requests;
    }
    if let Some(error_threshold) = args.error_threshold {
        config.error_threshold = Some(error_threshold);
    }
    if let Some(datetime) = &args.datetime {
        config.datetime = Some(
            OffsetDateTime::parse(datetime, &Rfc3339)
                .with_context(|| format!("Invalid datetime {datetime}"))?,
        );
    }

    if config.datasources.is_empty() {
        bail!("No data sources given, pass at least one fragments server URL")
    }
    Ok(config)
}

async fn write_results<W: Write>(
    results: QueryResults,
    format: Option<&str>,
    writer: W,
) -> anyhow::Result<W> {
    Ok(if matches!(results, QueryResults::Graph(_)) {
        let format = format.map_or(Ok(RdfFormat::Turtle), rdf_format_from_name)?;
        results.write_graph(writer, format).await?
    } else {
        let format = format.map_or(Ok(QueryResultsFormat::Json), results_format_from_name)?;
        results.write(writer, format).await?
    })
}

fn rdf_format_from_name(name: &str) -> anyhow::Result<RdfFormat> {
    if let Some(t) = RdfFormat::from_extension(name) {
        return Ok(t);
    }
    if let Some(t) = RdfFormat::from_media_type(name) {
        return Ok(t);
    }
    bail!("The graph format '{name}' is unknown")
}

fn results_format_from_name(name: &str) -> anyhow::Result<QueryResultsFormat> {
    if let Some(t) = QueryResultsFormat::from_extension(name) {
        return Ok(t);
    }
    if let Some(t) = QueryResultsFormat::from_media_type(name) {
        return Ok(t);
    }
    bail!("The results format '{name}' is unknown")
}

#[cfg(test)]
#[allow(clippy::panic_in_result_fn, reason = "tests")]
mod tests {
    use super::*;
    use anyhow::Result;
    use assert_cmd::Command;
    use assert_fs::prelude::*;
    use assert_fs::NamedTempFile;
    use predicates::prelude::*;

    fn cli_command() -> Command {
        let mut command = Command::new(env!("CARGO"));
        command.arg("run").arg("--bin").arg("ldf-client");
        command.arg("--");
        command
    }

    fn args(arguments: &[&str]) -> Args {
        Args::parse_from(std::iter::once("ldf-client").chain(arguments.iter().copied()))
    }

    #[test]
    fn cli_help() {
        cli_command()
            .assert()
            .failure()
            .stdout("")
            .stderr(predicate::str::contains("--query"));
    }

    #[test]
    fn cli_requires_datasources() {
        cli_command()
            .arg("--query")
            .arg("SELECT * WHERE { ?s ?p ?o }")
            .assert()
            .failure()
            .stderr(predicate::str::contains("No data sources"));
    }

    #[test]
    fn cli_reports_syntax_errors() {
        cli_command()
            .arg("http://localhost:1/dataset")
            .arg("--query")
            .arg("SELECT * WHERE { ?s ?p")
            .assert()
            .failure()
            .stdout("")
            .stderr(predicate::str::contains("Error"));
    }

    #[test]
    fn cli_rejects_invalid_configuration() -> Result<()> {
        let config = NamedTempFile::new("config.json")?;
        config.write_str(r#"{ "timeout": "soon" }"#)?;
        cli_command()
            .arg("--config")
            .arg(config.path())
            .arg("--query")
            .arg("ASK {}")
            .assert()
            .failure()
            .stderr(predicate::str::contains("Invalid configuration file"));
        Ok(())
    }

    #[test]
    fn options_override_the_configuration_file() -> Result<()> {
        let config = NamedTempFile::new("config.json")?;
        config.write_str(
            r#"{ "datasources": ["http://example.org/a"], "timeout": 100, "maxActiveRequests": 3 }"#,
        )?;
        let path = config.path().display().to_string();

        let config = load_config(&args(&[
            "http://example.org/b",
            "--config",
            &path,
            "--timeout",
            "250",
            "--datetime",
            "2015-06-01T12:00:00Z",
            "-q",
            "ASK {}",
        ]))?;

        assert_eq!(config.datasources, vec!["http://example.org/b"]);
        assert_eq!(config.timeout, 250);
        assert_eq!(config.max_active_requests, 3);
        assert!(config.datetime.is_some());
        Ok(())
    }

    #[test]
    fn invalid_datetimes_are_rejected() {
        assert!(load_config(&args(&[
            "http://example.org/a",
            "--datetime",
            "yesterday",
            "-q",
            "ASK {}"
        ]))
        .is_err());
    }

    #[tokio::test]
    async fn booleans_are_written_as_sparql_json() -> Result<()> {
        let output = write_results(QueryResults::Boolean(true), None, Vec::new()).await?;
        assert_eq!(
            String::from_utf8(output)?,
            r#"{"head":{},"boolean":true}"#
        );

        let output = write_results(QueryResults::Boolean(false), Some("tsv"), Vec::new()).await?;
        assert_eq!(String::from_utf8(output)?, "false");
        Ok(())
    }

    #[test]
    fn formats_are_found_by_extension_and_media_type() {
        assert_eq!(rdf_format_from_name("nt").unwrap(), RdfFormat::NTriples);
        assert_eq!(
            results_format_from_name("text/csv").unwrap(),
            QueryResultsFormat::Csv
        );
        assert!(results_format_from_name("pdf").is_err());
    }

    #[test]
    fn clap_debug() {
        use clap::CommandFactory;

        Args::command().debug_assert()
    }
}
