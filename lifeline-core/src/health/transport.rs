//! HTTP transport used by the health probe
//!
//! The transport only reports what came back (a status code or a transport
//! error); classification and the deadline live in [`super::HealthProbe`].

use crate::core::ProbeError;
use async_trait::async_trait;
use http_body_util::Empty;
use hyper::body::Bytes;
use hyper::{Request, Uri};
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use tracing::trace;

/// Issues one reachability request and returns the response status
#[async_trait]
pub trait HealthTransport: Send + Sync {
    async fn get_status(&self, url: &str) -> Result<u16, ProbeError>;
}

/// `GET <health_url>` over a pooled hyper client (HTTP/1, `http://` only)
#[derive(Clone)]
pub struct HyperTransport {
    client: Client<HttpConnector, Empty<Bytes>>,
}

impl HyperTransport {
    pub fn new() -> Self {
        let client = Client::builder(TokioExecutor::new()).build_http();
        Self { client }
    }
}

impl Default for HyperTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HealthTransport for HyperTransport {
    async fn get_status(&self, url: &str) -> Result<u16, ProbeError> {
        let uri = url.parse::<Uri>().map_err(|e| ProbeError::InvalidUrl {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

        let request = Request::get(uri)
            .header(hyper::header::CACHE_CONTROL, "no-cache")
            .body(Empty::<Bytes>::new())
            .map_err(|e| ProbeError::InvalidUrl {
                url: url.to_string(),
                reason: e.to_string(),
            })?;

        let response = self
            .client
            .request(request)
            .await
            .map_err(|e| ProbeError::Transport {
                url: url.to_string(),
                reason: e.to_string(),
            })?;

        let status = response.status().as_u16();
        trace!(url, status, "Health response received");
        Ok(status)
    }
}
