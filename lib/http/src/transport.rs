use async_trait::async_trait;
use ldf_common::FetchError;
use reqwest::header::HeaderMap;
use reqwest::{redirect, Method, StatusCode};
use std::fmt::Debug;
use std::time::Duration;

/// A request as it is handed to an [HttpTransport].
#[derive(Clone, Debug)]
pub struct HttpRequest {
    pub url: String,
    pub method: Method,
    pub headers: HeaderMap,
    pub timeout: Duration,
    pub follow_redirect: bool,
}

/// The raw response of an [HttpTransport]. The body is still encoded.
#[derive(Clone, Debug)]
pub struct TransportResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    /// The URL of the response after following redirects.
    pub url: String,
    pub body: Vec<u8>,
}

/// Performs HTTP requests.
///
/// The transport does not need to handle concurrency limits, time negotiation or content decoding,
/// all of which is done by the [HttpClient](crate::HttpClient).
#[async_trait]
pub trait HttpTransport: Debug + Send + Sync {
    /// Performs `request` and returns the complete response.
    async fn execute(&self, request: HttpRequest) -> Result<TransportResponse, FetchError>;
}

/// An [HttpTransport] backed by [reqwest].
#[derive(Clone, Debug)]
pub struct ReqwestTransport {
    following: reqwest::Client,
    not_following: reqwest::Client,
}

impl ReqwestTransport {
    pub fn try_new() -> Result<Self, reqwest::Error> {
        Ok(Self {
            following: reqwest::Client::builder().build()?,
            not_following: reqwest::Client::builder()
                .redirect(redirect::Policy::none())
                .build()?,
        })
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn execute(&self, request: HttpRequest) -> Result<TransportResponse, FetchError> {
        let client = if request.follow_redirect {
            &self.following
        } else {
            &self.not_following
        };
        let to_fetch_error = |error: reqwest::Error| {
            if error.is_timeout() {
                FetchError::Timeout {
                    url: request.url.clone(),
                    timeout: request.timeout,
                }
            } else {
                FetchError::Transport {
                    url: request.url.clone(),
                    message: error.to_string(),
                }
            }
        };

        let response = client
            .request(request.method.clone(), request.url.as_str())
            .headers(request.headers.clone())
            .timeout(request.timeout)
            .send()
            .await
            .map_err(to_fetch_error)?;
        let status = response.status();
        let headers = response.headers().clone();
        let url = response.url().to_string();
        let body = response.bytes().await.map_err(to_fetch_error)?.to_vec();

        Ok(TransportResponse {
            status,
            headers,
            url,
            body,
        })
    }
}
