use crate::client::FragmentsClient;
use crate::fragment::{BoxFragment, Fragment, FragmentMetadata};
use crate::parser::{FragmentParser, ParsedFragment, RdfFragmentParser};
use futures::{ready, Stream, StreamExt};
use ldf_common::{ExecResult, ExecutionError, FetchError};
use ldf_http::{HttpClient, ResponseIterator};
use ldf_model::vocab::xsd;
use ldf_model::{PatternTerm, Term, Triple, TriplePattern};
use std::fmt::{Debug, Formatter};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tracing::debug;
use url::Url;

/// A [FragmentsClient] for a single Triple Pattern Fragments server.
#[derive(Clone)]
pub struct TriplePatternFragmentsClient {
    endpoint: Url,
    http: HttpClient,
    parser: Arc<dyn FragmentParser>,
}

impl TriplePatternFragmentsClient {
    /// Creates a client for the fragments of `endpoint` that parses pages as RDF.
    pub fn new(endpoint: Url, http: HttpClient) -> Self {
        Self::with_parser(endpoint, http, Arc::new(RdfFragmentParser))
    }

    pub fn with_parser(endpoint: Url, http: HttpClient, parser: Arc<dyn FragmentParser>) -> Self {
        Self {
            endpoint,
            http,
            parser,
        }
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

impl Debug for TriplePatternFragmentsClient {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TriplePatternFragmentsClient")
            .field("endpoint", &self.endpoint.as_str())
            .finish_non_exhaustive()
    }
}

impl FragmentsClient for TriplePatternFragmentsClient {
    fn fragment_by_pattern(&self, pattern: &TriplePattern) -> BoxFragment {
        let url = fragment_url(&self.endpoint, pattern);
        debug!(%pattern, %url, "Requesting fragment");
        Box::new(HttpFragment::new(
            pattern.clone(),
            url.as_str(),
            self.http.clone(),
            Arc::clone(&self.parser),
        ))
    }

    fn abort_all(&self) {
        self.http.abort_all();
    }
}

/// Builds the URL of the first page of the fragment for `pattern`.
///
/// Every constant of the pattern becomes a `subject`, `predicate` or `object` query parameter.
/// Variables are left out.
pub fn fragment_url(endpoint: &Url, pattern: &TriplePattern) -> Url {
    let mut url = endpoint.clone();
    let parameters = [
        ("subject", &pattern.subject),
        ("predicate", &pattern.predicate),
        ("object", &pattern.object),
    ];
    if parameters.iter().any(|(_, term)| !term.is_variable()) {
        let mut query = url.query_pairs_mut();
        for (name, term) in parameters {
            if let PatternTerm::Constant(term) = term {
                query.append_pair(name, &term_to_parameter(term));
            }
        }
    }
    url
}

fn term_to_parameter(term: &Term) -> String {
    match term {
        Term::NamedNode(node) => node.as_str().to_owned(),
        Term::BlankNode(node) => format!("_:{}", node.as_str()),
        Term::Literal(literal) => {
            if let Some(language) = literal.language() {
                format!("\"{}\"@{language}", literal.value())
            } else if literal.datatype() == xsd::STRING {
                format!("\"{}\"", literal.value())
            } else {
                format!("\"{}\"^^{}", literal.value(), literal.datatype().as_str())
            }
        }
        #[allow(
            unreachable_patterns,
            reason = "Quoted triples only exist with the rdf-star feature"
        )]
        _ => term.to_string(),
    }
}

enum PageState {
    /// Waiting for the response of a page.
    Requesting(ResponseIterator),
    /// Emitting the triples of a page.
    Emitting {
        triples: std::vec::IntoIter<Triple>,
        next_page: Option<String>,
    },
    Finished,
}

enum MetadataState {
    Pending,
    Ready(FragmentMetadata),
    Failed(ExecutionError),
}

/// A fragment that is fetched page by page from a fragments server.
///
/// The metadata is taken from the first page. Later pages are requested once the triples of
/// the previous page have been read.
pub struct HttpFragment {
    pattern: TriplePattern,
    http: HttpClient,
    parser: Arc<dyn FragmentParser>,
    state: PageState,
    metadata: MetadataState,
    pending_error: Option<ExecutionError>,
}

impl HttpFragment {
    /// Creates the fragment and requests its first page at `url`.
    pub fn new(
        pattern: TriplePattern,
        url: &str,
        http: HttpClient,
        parser: Arc<dyn FragmentParser>,
    ) -> Self {
        let response = http.get(url);
        Self {
            pattern,
            http,
            parser,
            state: PageState::Requesting(response),
            metadata: MetadataState::Pending,
            pending_error: None,
        }
    }

    /// Drives the current page request. Does nothing if no request is pending.
    fn poll_page(&mut self, cx: &mut Context<'_>) -> Poll<()> {
        let PageState::Requesting(response) = &mut self.state else {
            return Poll::Ready(());
        };
        let body = ready!(response.poll_next_unpin(cx));
        let page = match (body, response.metadata()) {
            (Some(Ok(body)), Some(metadata)) if metadata.status.is_success() => {
                self.parser
                    .parse(&body, &metadata.url, &metadata.content_type)
            }
            (Some(Ok(_)), Some(metadata)) => Err(FetchError::Status {
                url: metadata.url.clone(),
                status: metadata.status.as_u16(),
            }
            .into()),
            (Some(Err(error)), _) => Err(error),
            (Some(Ok(_)), None) | (None, _) => Err(ExecutionError::internal(format!(
                "The response of {} ended without a body",
                response.url()
            ))),
        };

        match page {
            Ok(page) => self.accept_page(page),
            Err(error) => {
                debug!(pattern = %self.pattern, %error, "Fragment failed");
                if matches!(self.metadata, MetadataState::Pending) {
                    self.metadata = MetadataState::Failed(error.clone());
                }
                self.pending_error = Some(error);
                self.state = PageState::Finished;
            }
        }
        Poll::Ready(())
    }

    fn accept_page(&mut self, page: ParsedFragment) {
        if matches!(self.metadata, MetadataState::Pending) {
            self.metadata = MetadataState::Ready(FragmentMetadata {
                total_triples: page.total_triples,
                controls: page.controls.clone(),
                had_error: false,
            });
        }
        self.state = PageState::Emitting {
            triples: page.triples.into_iter(),
            next_page: page.controls.next_page,
        };
    }
}

impl Stream for HttpFragment {
    type Item = ExecResult<Triple>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = &mut *self;
        loop {
            if let Some(error) = this.pending_error.take() {
                return Poll::Ready(Some(Err(error)));
            }
            if matches!(this.state, PageState::Requesting(_)) {
                ready!(this.poll_page(cx));
                continue;
            }
            match &mut this.state {
                PageState::Requesting(_) => {}
                PageState::Emitting { triples, next_page } => {
                    if let Some(triple) = triples.next() {
                        return Poll::Ready(Some(Ok(triple)));
                    }
                    this.state = match next_page.take() {
                        Some(url) => PageState::Requesting(this.http.get(&url)),
                        None => PageState::Finished,
                    };
                }
                PageState::Finished => return Poll::Ready(None),
            }
        }
    }
}

impl Fragment for HttpFragment {
    fn pattern(&self) -> &TriplePattern {
        &self.pattern
    }

    fn poll_metadata(&mut self, cx: &mut Context<'_>) -> Poll<ExecResult<FragmentMetadata>> {
        loop {
            match &self.metadata {
                MetadataState::Ready(metadata) => return Poll::Ready(Ok(metadata.clone())),
                MetadataState::Failed(error) => return Poll::Ready(Err(error.clone())),
                MetadataState::Pending => {}
            }
            if matches!(self.state, PageState::Requesting(_)) {
                ready!(self.poll_page(cx));
            } else {
                return Poll::Ready(Err(ExecutionError::internal(format!(
                    "The fragment for {} was closed before its metadata arrived",
                    self.pattern
                ))));
            }
        }
    }

    fn close(&mut self) {
        self.state = PageState::Finished;
        self.pending_error = None;
    }
}
