use async_trait::async_trait;
use futures::StreamExt;
use ldf_common::{ExecutionError, FetchError};
use ldf_fragments::{
    create_fragments_client, fragment_metadata, FragmentsClient, FragmentsError,
    TriplePatternFragmentsClient,
};
use ldf_http::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use ldf_http::{
    HttpClient, HttpClientOptions, HttpRequest, HttpTransport, StatusCode, TransportResponse,
};
use ldf_model::{NamedNode, TriplePattern, Variable};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use url::Url;

/// Serves fixed Turtle pages. Unknown URLs are answered with 404, hosts named `slow` never answer.
#[derive(Debug, Default)]
struct FragmentServer {
    pages: Vec<(String, String)>,
    requests: Mutex<Vec<String>>,
}

impl FragmentServer {
    fn with_page(mut self, url: &str, body: &str) -> Self {
        self.pages.push((url.to_owned(), body.to_owned()));
        self
    }

    fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl HttpTransport for FragmentServer {
    async fn execute(&self, request: HttpRequest) -> Result<TransportResponse, FetchError> {
        self.requests.lock().unwrap().push(request.url.clone());
        if request.url.starts_with("http://slow.example.org/") {
            std::future::pending::<()>().await;
        }

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("text/turtle"));
        let (status, body) = match self.pages.iter().find(|(url, _)| *url == request.url) {
            Some((_, body)) => (StatusCode::OK, body.clone()),
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

fn http_client(server: &Arc<FragmentServer>, timeout: Duration) -> HttpClient {
    HttpClient::new(
        Arc::clone(server) as Arc<dyn HttpTransport>,
        HttpClientOptions {
            timeout,
            ..HttpClientOptions::default()
        },
    )
}

fn knows_pattern() -> TriplePattern {
    TriplePattern::new(
        Variable::new_unchecked("s"),
        NamedNode::new_unchecked("http://xmlns.com/foaf/0.1/knows"),
        Variable::new_unchecked("o"),
    )
}

const KNOWS_URL: &str = "http://example.org/dataset?predicate=http%3A%2F%2Fxmlns.com%2Ffoaf%2F0.1%2Fknows";

fn first_page() -> String {
    format!(
        r#"
        @prefix foaf: <http://xmlns.com/foaf/0.1/> .
        @prefix hydra: <http://www.w3.org/ns/hydra/core#> .
        <http://example.org/alice> foaf:knows <http://example.org/bob> .
        <http://example.org/bob> foaf:knows <http://example.org/carol> .
        <{KNOWS_URL}> hydra:totalItems 3 ;
            hydra:itemsPerPage 2 ;
            hydra:next <{KNOWS_URL}&page=2> .
        "#
    )
}

fn second_page() -> String {
    format!(
        r#"
        @prefix foaf: <http://xmlns.com/foaf/0.1/> .
        @prefix hydra: <http://www.w3.org/ns/hydra/core#> .
        <http://example.org/carol> foaf:knows <http://example.org/alice> .
        <{KNOWS_URL}&page=2> hydra:totalItems 3 .
        "#
    )
}

#[tokio::test]
async fn all_pages_are_fetched() {
    let server = Arc::new(
        FragmentServer::default()
            .with_page(KNOWS_URL, &first_page())
            .with_page(&format!("{KNOWS_URL}&page=2"), &second_page()),
    );
    let client = TriplePatternFragmentsClient::new(
        Url::parse("http://example.org/dataset").unwrap(),
        http_client(&server, Duration::from_secs(5)),
    );

    let mut fragment = client.fragment_by_pattern(&knows_pattern());
    let metadata = fragment_metadata(fragment.as_mut()).await.unwrap();
    let triples: Vec<_> = fragment.map(Result::unwrap).collect().await;

    assert_eq!(metadata.total_triples, Some(3));
    assert_eq!(metadata.controls.page_size, Some(2));
    assert_eq!(triples.len(), 3);
    assert_eq!(server.requests().len(), 2);
}

#[tokio::test]
async fn error_status_fails_the_fragment() {
    let server = Arc::new(FragmentServer::default());
    let client = TriplePatternFragmentsClient::new(
        Url::parse("http://example.org/dataset").unwrap(),
        http_client(&server, Duration::from_secs(5)),
    );

    let mut fragment = client.fragment_by_pattern(&knows_pattern());

    assert!(matches!(
        fragment_metadata(fragment.as_mut()).await,
        Err(ExecutionError::Fetch(FetchError::Status { status: 404, .. }))
    ));
    assert!(fragment.next().await.unwrap().is_err());
    assert!(fragment.next().await.is_none());
}

#[tokio::test(start_paused = true)]
async fn federation_survives_a_timed_out_endpoint() {
    let server = Arc::new(FragmentServer::default().with_page(KNOWS_URL, &second_page()));
    let http = http_client(&server, Duration::from_millis(100));
    let client = create_fragments_client(
        &["http://example.org/dataset", "http://slow.example.org/dataset"],
        &http,
        Some(1),
    )
    .unwrap();

    let mut fragment = client.fragment_by_pattern(&knows_pattern());
    let metadata = fragment_metadata(fragment.as_mut()).await.unwrap();
    let triples: Vec<_> = fragment.map(Result::unwrap).collect().await;

    assert_eq!(metadata.total_triples, Some(3));
    assert!(!metadata.had_error);
    assert_eq!(triples.len(), 1);
}

#[test]
fn endpoints_must_be_urls() {
    let server = Arc::new(FragmentServer::default());
    let http = HttpClient::new(server, HttpClientOptions::default());

    assert!(matches!(
        create_fragments_client(&["not a url"], &http, None),
        Err(FragmentsError::InvalidEndpoint { .. })
    ));
    let no_endpoints: [&str; 0] = [];
    assert!(matches!(
        create_fragments_client(&no_endpoints, &http, None),
        Err(FragmentsError::NoEndpoints)
    ));
}
