use async_trait::async_trait;
use futures::StreamExt;
use ldf_common::{ExecutionError, FetchError};
use ldf_engine::results::QueryResults;
use ldf_engine::sparql::{evaluate_query, Query, QueryEvaluationError};
use ldf_engine::ExecutionOptions;
use ldf_fragments::create_fragments_client;
use ldf_http::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use ldf_http::{
    HttpClient, HttpClientOptions, HttpRequest, HttpTransport, StatusCode, TransportResponse,
};
use ldf_model::vocab::rdf;
use ldf_model::{Literal, NamedNode, Term, Triple};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

const HYDRA_TOTAL_ITEMS: &str = "http://www.w3.org/ns/hydra/core#totalItems";

/// Answers triple pattern requests for the datasets it hosts.
///
/// Each dataset is served on its own URL as a single page. Hosts named `slow` never answer and
/// unknown URLs get a 404.
#[derive(Debug, Default)]
struct FragmentServer {
    datasets: BTreeMap<String, Vec<Triple>>,
}

impl FragmentServer {
    fn with_dataset(mut self, url: &str, triples: Vec<Triple>) -> Self {
        self.datasets.insert(url.to_owned(), triples);
        self
    }

    fn page(&self, url: &Url) -> Option<String> {
        let mut dataset_url = url.clone();
        dataset_url.set_query(None);
        let triples = self.datasets.get(dataset_url.as_str())?;
        let parameters: BTreeMap<_, _> = url.query_pairs().collect();
        let matches: Vec<_> = triples
            .iter()
            .filter(|triple| {
                let terms = [
                    ("subject", Term::from(triple.subject.clone())),
                    ("predicate", Term::from(triple.predicate.clone())),
                    ("object", triple.object.clone()),
                ];
                terms.iter().all(|(name, term)| {
                    parameters
                        .get(*name)
                        .map_or(true, |value| *value == parameter(term))
                })
            })
            .collect();

        let mut page = String::new();
        for triple in &matches {
            page.push_str(&format!("{triple} .\n"));
        }
        page.push_str(&format!(
            "<{url}> <{HYDRA_TOTAL_ITEMS}> \"{}\"^^<http://www.w3.org/2001/XMLSchema#integer> .\n",
            matches.len()
        ));
        Some(page)
    }
}

fn parameter(term: &Term) -> String {
    match term {
        Term::NamedNode(node) => node.as_str().to_owned(),
        Term::Literal(literal) => format!("\"{}\"", literal.value()),
        term => term.to_string(),
    }
}

#[async_trait]
impl HttpTransport for FragmentServer {
    async fn execute(&self, request: HttpRequest) -> Result<TransportResponse, FetchError> {
        if request.url.starts_with("http://slow.example.org/") {
            std::future::pending::<()>().await;
        }
        let page = Url::parse(&request.url)
            .ok()
            .and_then(|url| self.page(&url));

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("text/turtle"));
        let (status, body) = match page {
            Some(body) => (StatusCode::OK, body),
            None => (StatusCode::NOT_FOUND, String::new()),
        };
        Ok(TransportResponse {
            status,
            headers,
            url: request.url,
            body: body.into_bytes(),
        })
    }
}

fn ex(name: &str) -> NamedNode {
    NamedNode::new_unchecked(format!("http://example.org/{name}"))
}

fn city_types() -> Vec<Triple> {
    ["ghent", "bruges"]
        .into_iter()
        .map(|city| Triple::new(ex(city), rdf::TYPE, ex("City")))
        .collect()
}

fn city_labels() -> Vec<Triple> {
    [("ghent", "Ghent"), ("bruges", "Bruges"), ("paris", "Paris")]
        .into_iter()
        .map(|(city, label)| Triple::new(ex(city), ex("label"), Literal::new_simple_literal(label)))
        .collect()
}

async fn select(
    server: FragmentServer,
    endpoints: &[&str],
    error_threshold: Option<usize>,
    query: &str,
) -> Vec<Result<String, QueryEvaluationError>> {
    let http = HttpClient::new(
        Arc::new(server),
        HttpClientOptions {
            timeout: Duration::from_millis(100),
            ..HttpClientOptions::default()
        },
    );
    let client = create_fragments_client(endpoints, &http, error_threshold).unwrap();
    let options = ExecutionOptions::new(client);
    let query = Query::parse(query, &BTreeMap::new()).unwrap();

    let QueryResults::Solutions(solutions) = evaluate_query(&query, &options).await.unwrap()
    else {
        panic!("expected solutions");
    };
    let mut solutions: Vec<_> = solutions
        .map(|solution| {
            solution.map(|solution| {
                solution
                    .iter()
                    .map(|(variable, value)| format!("{variable}={value}"))
                    .collect::<Vec<_>>()
                    .join(" ")
            })
        })
        .collect()
        .await;
    solutions.sort_by_key(|solution| format!("{solution:?}"));
    solutions
}

const CITY_LABELS: &str = "SELECT ?s ?l WHERE { ?s a <http://example.org/City> ; <http://example.org/label> ?l }";

#[tokio::test]
async fn patterns_are_joined_across_endpoints() {
    let server = FragmentServer::default()
        .with_dataset("http://example.org/types", city_types())
        .with_dataset("http://example.org/labels", city_labels());

    let solutions = select(
        server,
        &["http://example.org/types", "http://example.org/labels"],
        None,
        CITY_LABELS,
    )
    .await;

    assert_eq!(
        solutions.into_iter().map(Result::unwrap).collect::<Vec<_>>(),
        vec![
            r#"?s=<http://example.org/bruges> ?l="Bruges""#,
            r#"?s=<http://example.org/ghent> ?l="Ghent""#,
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn timed_out_endpoint_is_skipped() {
    let mut triples = city_types();
    triples.extend(city_labels());
    let server = FragmentServer::default().with_dataset("http://example.org/cities", triples);

    let solutions = select(
        server,
        &["http://example.org/cities", "http://slow.example.org/cities"],
        Some(1),
        CITY_LABELS,
    )
    .await;

    assert_eq!(solutions.len(), 2);
    assert!(solutions.iter().all(Result::is_ok));
}

#[tokio::test]
async fn failing_endpoint_fails_the_query() {
    let solutions = select(
        FragmentServer::default(),
        &["http://example.org/missing"],
        None,
        "SELECT ?s WHERE { ?s a <http://example.org/City> }",
    )
    .await;

    assert!(!solutions.is_empty());
    assert!(solutions.iter().all(|solution| matches!(
        solution,
        Err(QueryEvaluationError::Execution(ExecutionError::Fetch(
            FetchError::Status { status: 404, .. }
        )))
    )));
}
