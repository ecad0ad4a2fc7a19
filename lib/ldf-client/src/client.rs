//! The entry point of the crate is the [`LdfClient`] struct.

use crate::config::ClientConfig;
use crate::error::ClientError;
use ldf_engine::results::QueryResults;
use ldf_engine::sparql::{evaluate_query, Query, QueryError, QueryEvaluationError};
use ldf_engine::ExecutionOptions;
use ldf_fragments::create_fragments_client;
use ldf_http::{HttpClient, HttpTransport, ReqwestTransport};
use oxiri::Iri;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tracing::info;

/// Answers SPARQL queries over the Triple Pattern Fragments servers of a [ClientConfig].
///
/// All queries of a client share its HTTP client, so [ClientConfig::max_active_requests] limits
/// the requests of all running queries together. Cloning the client is cheap.
#[derive(Clone)]
pub struct LdfClient {
    http: HttpClient,
    options: ExecutionOptions,
    prefixes: Arc<BTreeMap<String, String>>,
}

impl LdfClient {
    /// Creates a client that fetches fragments with [reqwest](ReqwestTransport).
    pub fn new(config: ClientConfig) -> Result<Self, ClientError> {
        let transport = ReqwestTransport::try_new()?;
        Self::with_transport(config, Arc::new(transport))
    }

    /// Creates a client that performs its requests through `transport`.
    pub fn with_transport(
        config: ClientConfig,
        transport: Arc<dyn HttpTransport>,
    ) -> Result<Self, ClientError> {
        for (prefix, iri) in &config.prefixes {
            Iri::parse(iri.as_str()).map_err(|error| ClientError::InvalidPrefix {
                prefix: prefix.clone(),
                error,
            })?;
        }
        let http = HttpClient::new(transport, config.http_options());
        let fragments_client =
            create_fragments_client(&config.datasources, &http, config.error_threshold)?;
        info!(
            datasources = ?config.datasources,
            max_active_requests = config.max_active_requests,
            "Created fragments client"
        );

        let options = ExecutionOptions {
            max_buffer_size: config.max_buffer_size.max(1),
            ..ExecutionOptions::new(fragments_client)
        };
        Ok(Self {
            http,
            options,
            prefixes: Arc::new(config.prefixes),
        })
    }

    /// Parses and evaluates `query`.
    ///
    /// Results are streamed while the fragments are fetched. Errors of the servers show up as error
    /// items of the returned streams.
    pub async fn query(&self, query: &str) -> Result<QueryResults, QueryEvaluationError> {
        let query = Query::parse(query, &self.prefixes).map_err(QueryError::from)?;
        evaluate_query(&query, &self.options).await
    }

    /// Aborts all pending requests. Running queries end with an error.
    pub fn abort_all(&self) {
        self.http.abort_all();
    }

    /// The number of HTTP requests that have been started so far.
    pub fn request_count(&self) -> u64 {
        self.http.request_count()
    }
}

impl fmt::Debug for LdfClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LdfClient")
            .field("options", &self.options)
            .field("prefixes", &self.prefixes)
            .finish_non_exhaustive()
    }
}
