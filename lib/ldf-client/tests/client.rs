use async_trait::async_trait;
use futures::StreamExt;
use ldf_client::error::{ClientError, ExecutionError, FetchError};
use ldf_client::fragments::FragmentsError;
use ldf_client::http::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use ldf_client::http::{HttpRequest, HttpTransport, StatusCode, TransportResponse};
use ldf_client::sparql::{QueryError, QueryEvaluationError, QueryResults};
use ldf_client::{ClientConfig, LdfClient};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

const DATASET: &str = "http://example.org/people";

/// Serves the fragments of a small FOAF dataset. The host `slow.example.org` never answers.
#[derive(Debug)]
struct PeopleServer;

impl PeopleServer {
    fn triples() -> Vec<(&'static str, &'static str, String)> {
        let knows = "http://xmlns.com/foaf/0.1/knows";
        let name = "http://xmlns.com/foaf/0.1/name";
        vec![
            ("http://example.org/alice", knows, "<http://example.org/bob>".to_owned()),
            ("http://example.org/bob", knows, "<http://example.org/carol>".to_owned()),
            ("http://example.org/alice", name, "\"Alice\"".to_owned()),
            ("http://example.org/bob", name, "\"Bob\"".to_owned()),
            ("http://example.org/carol", name, "\"Carol\"".to_owned()),
        ]
    }

    fn page(url: &str) -> String {
        let parameters: BTreeMap<_, _> = Url::parse(url)
            .map(|url| url.query_pairs().into_owned().collect())
            .unwrap_or_default();
        let matches: Vec<_> = Self::triples()
            .into_iter()
            .filter(|(subject, predicate, object)| {
                let object = object.trim_start_matches('<').trim_end_matches('>');
                [("subject", *subject), ("predicate", *predicate), ("object", object)]
                    .iter()
                    .all(|(name, value)| parameters.get(*name).map_or(true, |p| p == value))
            })
            .collect();

        let mut page = String::new();
        for (subject, predicate, object) in &matches {
            page.push_str(&format!("<{subject}> <{predicate}> {object} .\n"));
        }
        page.push_str(&format!(
            "<{url}> <http://www.w3.org/ns/hydra/core#totalItems> {} .\n",
            matches.len()
        ));
        page
    }
}

#[async_trait]
impl HttpTransport for PeopleServer {
    async fn execute(&self, request: HttpRequest) -> Result<TransportResponse, FetchError> {
        if request.url.starts_with("http://slow.example.org/") {
            std::future::pending::<()>().await;
        }
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("text/turtle"));
        Ok(TransportResponse {
            status: StatusCode::OK,
            headers,
            body: Self::page(&request.url).into_bytes(),
            url: request.url,
        })
    }
}

fn client(datasources: &[&str]) -> LdfClient {
    let config = ClientConfig::from_json(
        r#"{ "prefixes": { "ex": "http://example.org/" }, "timeout": 60000 }"#,
    )
    .unwrap();
    LdfClient::with_transport(
        ClientConfig {
            datasources: datasources.iter().map(|url| (*url).to_owned()).collect(),
            ..config
        },
        Arc::new(PeopleServer),
    )
    .unwrap()
}

#[tokio::test]
async fn query_uses_configured_prefixes() {
    let client = client(&[DATASET]);

    let QueryResults::Solutions(solutions) = client
        .query("SELECT ?name WHERE { ex:alice foaf:knows ?friend . ?friend foaf:name ?name }")
        .await
        .unwrap()
    else {
        panic!("expected solutions");
    };
    let names: Vec<_> = solutions
        .map(|solution| solution.unwrap().get("name").unwrap().to_string())
        .collect()
        .await;

    assert_eq!(names, vec!["\"Bob\""]);
    assert!(client.request_count() >= 2);
}

#[tokio::test]
async fn ask_is_answered_immediately() {
    let client = client(&[DATASET]);

    let result = client
        .query("ASK { ?person foaf:knows ex:carol }")
        .await
        .unwrap();

    assert!(matches!(result, QueryResults::Boolean(true)));
}

#[tokio::test]
async fn syntax_errors_are_reported() {
    let client = client(&[DATASET]);

    assert!(matches!(
        client.query("SELECT ?s WHERE { ?s ").await,
        Err(QueryEvaluationError::Query(QueryError::Syntax(_)))
    ));
    assert!(matches!(
        client.query("SELECT ?s WHERE { ?s unknown:p ?o }").await,
        Err(QueryEvaluationError::Query(_))
    ));
    assert_eq!(client.request_count(), 0);
}

#[test]
fn datasources_must_be_urls() {
    let result = LdfClient::with_transport(
        ClientConfig {
            datasources: vec!["people".to_owned()],
            ..ClientConfig::default()
        },
        Arc::new(PeopleServer),
    );

    assert!(matches!(
        result,
        Err(ClientError::Fragments(FragmentsError::InvalidEndpoint { .. }))
    ));
}

#[test]
fn prefixes_must_be_iris() {
    let result = LdfClient::with_transport(
        ClientConfig {
            datasources: vec![DATASET.to_owned()],
            prefixes: [("ex".to_owned(), "not an iri".to_owned())].into(),
            ..ClientConfig::default()
        },
        Arc::new(PeopleServer),
    );

    assert!(matches!(result, Err(ClientError::InvalidPrefix { prefix, .. }) if prefix == "ex"));
}

#[tokio::test(start_paused = true)]
async fn abort_all_ends_running_queries() {
    let client = client(&["http://slow.example.org/people"]);
    let QueryResults::Solutions(solutions) = client
        .query("SELECT * WHERE { ?s foaf:name ?name }")
        .await
        .unwrap()
    else {
        panic!("expected solutions");
    };

    let results = tokio::spawn(solutions.collect::<Vec<_>>());
    tokio::time::sleep(Duration::from_millis(10)).await;
    client.abort_all();
    let results = results.await.unwrap();

    assert!(!results.is_empty());
    assert!(results.iter().all(|result| matches!(
        result,
        Err(QueryEvaluationError::Execution(ExecutionError::Fetch(
            FetchError::Aborted { .. }
        )))
    )));
}
