//! The injectable HTTP client capability (§9 design note: "inject a
//! function with signature `GET(url, timeout, headers) -> (status, body,
//! content_type)` so tests substitute a deterministic responder mock").
//!
//! The default implementation wraps the same `hyper` + `hyper-tls` client
//! the teacher crate used for its remote `JWK` fetches; test code implements
//! [`HttpClient`] directly with an in-memory responder to drive the
//! end-to-end federation scenarios deterministically.

use std::time::Duration;

use async_trait::async_trait;
use hyper::client::HttpConnector;
use hyper::Body;
use hyper::Client;
use hyper_tls::HttpsConnector;

use crate::error::Error;

/// A single HTTP response, reduced to the fields the engine cares about.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Vec<u8>,
    pub content_type: Option<String>,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// The capability a [`fetch`](crate::fetch)er or
/// [`trust_mark`](crate::trust_mark) status check needs from a transport.
#[async_trait]
pub trait HttpClient: Send + Sync {
    async fn get(&self, uri: &http::Uri, timeout: Duration) -> Result<HttpResponse, Error>;
}

/// The default transport: `hyper` over TLS, matching the rest of the
/// dependency graph.
pub struct HyperHttpClient {
    client: Client<HttpsConnector<HttpConnector>>,
}

impl Default for HyperHttpClient {
    fn default() -> Self {
        let https = HttpsConnector::new();
        let client = Client::builder().build::<_, Body>(https);
        Self { client }
    }
}

#[async_trait]
impl HttpClient for HyperHttpClient {
    async fn get(&self, uri: &http::Uri, timeout: Duration) -> Result<HttpResponse, Error> {
        let url = uri.to_string();

        let request = self.client.get(uri.clone());

        let response = match tokio::time::timeout(timeout, request).await {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => {
                return Err(Error::FetchFormatError {
                    url,
                    message: e.to_string(),
                })
            }
            Err(_) => return Err(Error::FetchTimeout { url }),
        };

        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(hyper::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.to_string());

        let body = match tokio::time::timeout(timeout, hyper::body::to_bytes(response.into_body()))
            .await
        {
            Ok(Ok(bytes)) => bytes.to_vec(),
            Ok(Err(e)) => {
                return Err(Error::FetchFormatError {
                    url,
                    message: e.to_string(),
                })
            }
            Err(_) => return Err(Error::FetchTimeout { url }),
        };

        Ok(HttpResponse {
            status,
            body,
            content_type,
        })
    }
}
