use crate::error::ClientError;
use ldf_common::iterator::DEFAULT_MAX_BUFFER_SIZE;
use ldf_http::{HttpClientOptions, DEFAULT_ACCEPT};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use std::time::Duration;
use time::OffsetDateTime;

/// The prefixes that queries can use without declaring them.
const DEFAULT_PREFIXES: [(&str, &str); 12] = [
    ("rdf", "http://www.w3.org/1999/02/22-rdf-syntax-ns#"),
    ("rdfs", "http://www.w3.org/2000/01/rdf-schema#"),
    ("xsd", "http://www.w3.org/2001/XMLSchema#"),
    ("owl", "http://www.w3.org/2002/07/owl#"),
    ("skos", "http://www.w3.org/2004/02/skos/core#"),
    ("dc", "http://purl.org/dc/terms/"),
    ("dcterms", "http://purl.org/dc/terms/"),
    ("dc11", "http://purl.org/dc/elements/1.1/"),
    ("foaf", "http://xmlns.com/foaf/0.1/"),
    ("hydra", "http://www.w3.org/ns/hydra/core#"),
    ("dbpedia", "http://dbpedia.org/resource/"),
    ("dbpedia-owl", "http://dbpedia.org/ontology/"),
];

/// The configuration of an [LdfClient](crate::LdfClient).
///
/// The JSON representation uses camel case keys, e.g.:
/// ```json
/// {
///   "datasources": ["https://fragments.dbpedia.org/2016-04/en"],
///   "maxActiveRequests": 10,
///   "timeout": 2000,
///   "prefixes": { "ex": "http://example.org/" }
/// }
/// ```
/// Missing keys take their default value. Configured prefixes are added to the default ones.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ClientConfig {
    /// The URLs of the Triple Pattern Fragments servers.
    #[serde(alias = "endpoints")]
    pub datasources: Vec<String>,
    /// The maximum number of HTTP requests that are in flight at the same time.
    pub max_active_requests: usize,
    /// How many servers may fail per fragment before the fragment fails.
    ///
    /// Defaults to all but one server.
    pub error_threshold: Option<usize>,
    /// The request timeout in milliseconds.
    pub timeout: u64,
    /// Prefixes that queries can use without declaring them.
    #[serde(deserialize_with = "with_default_prefixes")]
    pub prefixes: BTreeMap<String, String>,
    /// The value of the `accept` header of fragment requests.
    pub content_type: String,
    /// Asks the servers for the state of the data at this point in time.
    #[serde(with = "time::serde::rfc3339::option")]
    pub datetime: Option<OffsetDateTime>,
    /// The number of solutions that each stage processes concurrently.
    pub max_buffer_size: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            datasources: Vec::new(),
            max_active_requests: 20,
            error_threshold: None,
            timeout: 5000,
            prefixes: default_prefixes(),
            content_type: DEFAULT_ACCEPT.to_owned(),
            datetime: None,
            max_buffer_size: DEFAULT_MAX_BUFFER_SIZE,
        }
    }
}

impl ClientConfig {
    /// Reads a JSON configuration.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Reads a JSON configuration from `reader`, e.g. a file.
    pub fn from_reader(reader: impl Read) -> Result<Self, serde_json::Error> {
        serde_json::from_reader(reader)
    }

    /// Reads a JSON configuration file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ClientError> {
        let file = File::open(path)?;
        Ok(Self::from_reader(BufReader::new(file))?)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout)
    }

    /// The options of the HTTP client that fetches the fragments.
    pub fn http_options(&self) -> HttpClientOptions {
        HttpClientOptions {
            accept: self.content_type.clone(),
            datetime: self.datetime,
            max_active_requests: self.max_active_requests.max(1),
            timeout: self.timeout(),
            ..HttpClientOptions::default()
        }
    }
}

fn default_prefixes() -> BTreeMap<String, String> {
    DEFAULT_PREFIXES
        .iter()
        .map(|(prefix, iri)| ((*prefix).to_owned(), (*iri).to_owned()))
        .collect()
}

fn with_default_prefixes<'de, D: serde::Deserializer<'de>>(
    deserializer: D,
) -> Result<BTreeMap<String, String>, D::Error> {
    let mut prefixes = default_prefixes();
    prefixes.extend(BTreeMap::<String, String>::deserialize(deserializer)?);
    Ok(prefixes)
}
