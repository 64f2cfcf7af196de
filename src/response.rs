//! Outcome types: the raw [`ChainResult`] shared between joined callers and the
//! per-caller decoded [`Response`].

use bytes::Bytes;
use reqwest::header::HeaderMap;
use reqwest::StatusCode;
use url::Url;

/// Raw outcome of one successful pass through the pipeline, before decoding.
#[derive(Debug, Clone)]
pub struct ChainResult {
    pub url: Url,
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// A decoded response plus its status metadata.
#[derive(Debug, Clone)]
pub struct Response<T> {
    item: T,
    status: StatusCode,
    headers: HeaderMap,
    url: Url,
}

impl<T> Response<T> {
    pub(crate) fn from_chain(item: T, result: ChainResult) -> Self {
        Self {
            item,
            status: result.status,
            headers: result.headers,
            url: result.url,
        }
    }

    pub fn item(&self) -> &T {
        &self.item
    }

    pub fn into_item(self) -> T {
        self.item
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Response<U> {
        Response {
            item: f(self.item),
            status: self.status,
            headers: self.headers,
            url: self.url,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    #[test]
    fn test_header_lookup_ignores_case() {
        let mut headers = HeaderMap::new();
        headers.insert("x-request-id", HeaderValue::from_static("abc"));
        let result = ChainResult {
            url: Url::parse("https://example.com/").unwrap(),
            status: StatusCode::OK,
            headers,
            body: Bytes::new(),
        };

        let resp = Response::from_chain(7u32, result);
        assert_eq!(resp.header("X-Request-Id"), Some("abc"));
        assert!(resp.header("missing").is_none());

        let mapped = resp.map(|n| n * 2);
        assert_eq!(*mapped.item(), 14);
        assert_eq!(mapped.status(), StatusCode::OK);
    }
}
