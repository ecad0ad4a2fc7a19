use crate::error::FragmentsError;
use crate::federated::FederatedFragmentsClient;
use crate::fragment::BoxFragment;
use crate::tpf::TriplePatternFragmentsClient;
use ldf_http::HttpClient;
use ldf_model::TriplePattern;
use std::fmt::Debug;
use std::sync::Arc;
use url::Url;

/// Resolves triple patterns to fragments.
pub trait FragmentsClient: Debug + Send + Sync {
    /// Creates the fragment for `pattern`. Requests start right away.
    fn fragment_by_pattern(&self, pattern: &TriplePattern) -> BoxFragment;

    /// Aborts all requests that are still pending.
    fn abort_all(&self) {}
}

/// Creates a client for the fragments of `endpoints`.
///
/// A single endpoint is queried directly. Several endpoints are combined in a
/// [FederatedFragmentsClient] that tolerates up to `error_threshold` failing endpoints per pattern,
/// defaulting to all but one.
pub fn create_fragments_client(
    endpoints: &[impl AsRef<str>],
    http: &HttpClient,
    error_threshold: Option<usize>,
) -> Result<Arc<dyn FragmentsClient>, FragmentsError> {
    let mut clients = endpoints
        .iter()
        .map(|endpoint| {
            let endpoint = endpoint.as_ref();
            let url = Url::parse(endpoint).map_err(|source| FragmentsError::InvalidEndpoint {
                url: endpoint.to_owned(),
                source,
            })?;
            Ok(Arc::new(TriplePatternFragmentsClient::new(url, http.clone()))
                as Arc<dyn FragmentsClient>)
        })
        .collect::<Result<Vec<_>, FragmentsError>>()?;

    match clients.len() {
        0 => Err(FragmentsError::NoEndpoints),
        1 => Ok(clients.remove(0)),
        _ => {
            let federated = match error_threshold {
                Some(error_threshold) => {
                    FederatedFragmentsClient::with_error_threshold(clients, error_threshold)
                }
                None => FederatedFragmentsClient::new(clients),
            };
            Ok(Arc::new(federated))
        }
    }
}
