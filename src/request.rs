//! Ready-to-send metric requests

use bytes::buf::Reader;
use bytes::{Buf, Bytes};
use reqwest::header::HeaderMap;
use reqwest::Method;
use url::Url;

use crate::error::Result;

/// A compressed metric payload together with the headers needed to send it
///
/// The body is held in a shared byte buffer, so it can be read any number of times
/// (for inspection and again for transmission) without being consumed.
#[derive(Debug, Clone)]
pub struct MetricRequest {
    pub(crate) method: Method,
    pub(crate) url: Url,
    pub(crate) headers: HeaderMap,
    pub(crate) body: Bytes,
    pub(crate) uncompressed_len: usize,
    pub(crate) metric_count: usize,
}

impl MetricRequest {
    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// The gzip-compressed JSON envelope
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// A fresh reader over the compressed body
    ///
    /// Each call starts from the beginning of the body.
    pub fn body_reader(&self) -> Reader<Bytes> {
        self.body.clone().reader()
    }

    /// Length of the compressed body in bytes, as sent in `Content-Length`
    pub fn content_length(&self) -> usize {
        self.body.len()
    }

    /// Length of the JSON envelope before compression
    pub fn uncompressed_len(&self) -> usize {
        self.uncompressed_len
    }

    /// Number of metrics encoded in this request
    pub fn metric_count(&self) -> usize {
        self.metric_count
    }

    /// Convert into a `reqwest::Request` for the given client
    ///
    /// The resulting request's body is backed by the same buffer and can be cloned for
    /// retries.
    pub fn into_reqwest(self, client: &reqwest::Client) -> Result<reqwest::Request> {
        let request = client
            .request(self.method, self.url)
            .headers(self.headers)
            .body(self.body)
            .build()?;
        Ok(request)
    }
}
