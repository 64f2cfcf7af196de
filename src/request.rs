//! Immutable request description handed to the pipeline.
//!
//! Building a request is a consuming, value-style affair: every `with_*` call
//! returns a new `Request`, so interceptors can only change what the next layer
//! sees, never what an earlier layer already observed.

use crate::error::{EncodingKind, Error, RequestBuildingError};
use crate::Result;
use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use reqwest::Method;
use serde::Serialize;
use url::Url;

#[derive(Debug, Clone)]
pub struct Request {
    method: Method,
    url: Url,
    headers: HeaderMap,
    body: Option<Bytes>,
}

impl Request {
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            method,
            url,
            headers: HeaderMap::new(),
            body: None,
        }
    }

    /// Parse `url`, failing with [`Error::InvalidUrl`].
    pub fn parse(method: Method, url: &str) -> Result<Self> {
        let parsed = Url::parse(url).map_err(|e| Error::invalid_url(url, e))?;
        Ok(Self::new(method, parsed))
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn body(&self) -> Option<&Bytes> {
        self.body.as_ref()
    }

    /// First value of header `name`, if present and valid UTF-8.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn with_method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    /// Set (replace) a header from string parts.
    pub fn with_header(self, name: &str, value: &str) -> Result<Self> {
        let header_name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|_| RequestBuildingError::InvalidHeaderName(name.to_string()))?;
        let header_value = HeaderValue::from_str(value)
            .map_err(|_| RequestBuildingError::InvalidHeaderValue(name.to_string()))?;
        Ok(self.with_header_value(header_name, header_value))
    }

    pub fn with_header_value(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn without_header(mut self, name: &str) -> Self {
        self.headers.remove(name);
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Serialize `value` as the JSON body and set `content-type: application/json`.
    pub fn with_json<T: Serialize + ?Sized>(self, value: &T) -> Result<Self> {
        let body = serde_json::to_vec(value).map_err(|e| Error::encoding(EncodingKind::Json, e))?;
        Ok(self
            .with_header_value(CONTENT_TYPE, HeaderValue::from_static("application/json"))
            .with_body(body))
    }

    /// Serialize `value` as an `application/x-www-form-urlencoded` body.
    pub fn with_form<T: Serialize + ?Sized>(self, value: &T) -> Result<Self> {
        let body =
            serde_urlencoded::to_string(value).map_err(|e| Error::encoding(EncodingKind::Form, e))?;
        Ok(self
            .with_header_value(
                CONTENT_TYPE,
                HeaderValue::from_static("application/x-www-form-urlencoded"),
            )
            .with_body(body))
    }
}
