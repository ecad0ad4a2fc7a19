//! The HTTP layer of the Linked Data Fragments client.
//!
//! An [HttpClient] limits the number of requests that are in flight at the same time and queues all
//! other requests in FIFO order. Responses are delivered through a [ResponseIterator] that yields
//! the decoded body. The actual I/O is performed by an [HttpTransport], which is [reqwest] by
//! default.

mod client;
mod decode;
mod link;
mod response;
mod transport;

pub use client::{HttpClient, HttpClientOptions, DEFAULT_ACCEPT, MAX_TIMEGATE_HOPS};
pub use response::{ResponseIterator, ResponseMetadata};
pub use transport::{HttpRequest, HttpTransport, ReqwestTransport, TransportResponse};

// Re-export the HTTP types of the transport interface.
pub use reqwest::header;
pub use reqwest::{Method, StatusCode};
