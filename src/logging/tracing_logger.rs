use super::{Direction, LogEvent, NetworkLogger, Severity};
use reqwest::header::{HeaderMap, CONTENT_TYPE};
use std::ops::BitOr;

/// Which parts of a request/response get rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LogDetail {
    pub status: bool,
    pub headers: bool,
    pub body: bool,
}

impl LogDetail {
    pub const OFF: LogDetail = LogDetail {
        status: false,
        headers: false,
        body: false,
    };
    pub const STATUS: LogDetail = LogDetail {
        status: true,
        headers: false,
        body: false,
    };
    pub const HEADERS: LogDetail = LogDetail {
        status: false,
        headers: true,
        body: false,
    };
    pub const BODY: LogDetail = LogDetail {
        status: false,
        headers: false,
        body: true,
    };
    pub const FULL: LogDetail = LogDetail {
        status: true,
        headers: true,
        body: true,
    };

    pub fn is_off(&self) -> bool {
        *self == Self::OFF
    }
}

impl BitOr for LogDetail {
    type Output = LogDetail;

    fn bitor(self, rhs: LogDetail) -> LogDetail {
        LogDetail {
            status: self.status || rhs.status,
            headers: self.headers || rhs.headers,
            body: self.body || rhs.body,
        }
    }
}

/// Hides sensitive header values in rendered output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeaderMask {
    /// Header name equals the given name (case-insensitive).
    Exact(String),
    /// Header name contains the given fragment (case-insensitive).
    Contains(String),
}

impl HeaderMask {
    pub fn authorization() -> Self {
        HeaderMask::Exact("authorization".to_string())
    }

    pub fn matches(&self, header: &str) -> bool {
        let header = header.to_ascii_lowercase();
        match self {
            HeaderMask::Exact(name) => header == name.to_ascii_lowercase(),
            HeaderMask::Contains(fragment) => header.contains(&fragment.to_ascii_lowercase()),
        }
    }

    /// At most 20 asterisks, never revealing the value or its full length.
    pub fn mask(value: &str) -> String {
        "*".repeat(value.chars().count().min(20))
    }
}

/// Default logger: renders events as line blocks and emits them via `tracing`.
///
/// Info events go to `debug!`, warnings to `warn!`, critical to `error!`.
#[derive(Debug, Clone)]
pub struct TracingLogger {
    tag: String,
    request_detail: LogDetail,
    response_detail: LogDetail,
    masks: Vec<HeaderMask>,
    expected_content_type: Option<String>,
}

impl Default for TracingLogger {
    fn default() -> Self {
        Self {
            tag: "network".to_string(),
            request_detail: LogDetail::FULL,
            response_detail: LogDetail::FULL,
            masks: vec![HeaderMask::authorization()],
            expected_content_type: Some("application/json".to_string()),
        }
    }
}

impl TracingLogger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = tag.into();
        self
    }

    /// Same detail for both directions.
    pub fn with_detail(self, detail: LogDetail) -> Self {
        self.with_request_detail(detail).with_response_detail(detail)
    }

    pub fn with_request_detail(mut self, detail: LogDetail) -> Self {
        self.request_detail = detail;
        self
    }

    pub fn with_response_detail(mut self, detail: LogDetail) -> Self {
        self.response_detail = detail;
        self
    }

    pub fn with_mask(mut self, mask: HeaderMask) -> Self {
        self.masks.push(mask);
        self
    }

    pub fn without_masks(mut self) -> Self {
        self.masks.clear();
        self
    }

    fn detail(&self, direction: Direction) -> LogDetail {
        match direction {
            Direction::Request => self.request_detail,
            Direction::Response => self.response_detail,
        }
    }

    /// Render an event into lines; empty when nothing passes the detail filter.
    pub fn render(&self, event: &LogEvent<'_>) -> Vec<String> {
        let detail = self.detail(event.direction());
        if detail.is_off() {
            return Vec::new();
        }

        let mut lines = Vec::new();
        match event {
            LogEvent::Request { request } => {
                if detail.status {
                    lines.push(format!("--- {}: {}", request.method(), request.url()));
                }
                if detail.headers {
                    self.push_headers(request.headers(), &mut lines);
                }
                if detail.body {
                    if let Some(body) = request.body() {
                        self.push_body(body, request.headers(), &mut lines);
                    }
                }
                if lines.is_empty() {
                    return lines;
                }
                lines.insert(0, "START --->".to_string());
                lines.push("END ----->".to_string());
            }
            LogEvent::Response {
                url,
                status,
                headers,
                body,
            } => {
                if detail.status {
                    lines.push(format!("--- URL: {}", url));
                    lines.push(format!("--- Status: {}", status.as_u16()));
                }
                if detail.headers {
                    self.push_headers(headers, &mut lines);
                }
                if detail.body && !body.is_empty() {
                    self.push_body(body, headers, &mut lines);
                }
                if lines.is_empty() {
                    return lines;
                }
                lines.insert(0, "START <---".to_string());
                lines.push("END <-----".to_string());
            }
            LogEvent::Message { message, .. } => lines.push(message.to_string()),
        }
        lines
    }

    fn push_headers(&self, headers: &HeaderMap, lines: &mut Vec<String>) {
        lines.push("--- Headers: ---".to_string());
        for (name, value) in headers {
            let value = value.to_str().unwrap_or("<binary>");
            let shown = if self.masks.iter().any(|m| m.matches(name.as_str())) {
                HeaderMask::mask(value)
            } else {
                value.to_string()
            };
            lines.push(format!("{}: {}", name, shown));
        }
    }

    fn push_body(&self, body: &[u8], headers: &HeaderMap, lines: &mut Vec<String>) {
        let content_type = headers
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .or_else(|| self.expected_content_type.clone());

        match content_type.as_deref() {
            Some(ct) if ct.contains("application/json") => {
                if let Ok(pretty) = serde_json::from_slice::<serde_json::Value>(body)
                    .and_then(|v| serde_json::to_string_pretty(&v))
                {
                    lines.push(format!("--- Body: Content-Type {}", ct));
                    lines.extend(pretty.lines().map(|l| format!("--- Body: {}", l)));
                    return;
                }
            }
            Some(ct) if ct.contains("application/x-www-form-urlencoded") => {
                if let Ok(text) = std::str::from_utf8(body) {
                    lines.push(format!("--- Body: Content-Type {}", ct));
                    lines.extend(text.split('&').map(|pair| format!("--- Body: {}", pair)));
                    return;
                }
            }
            _ => {}
        }

        if let Ok(text) = std::str::from_utf8(body) {
            lines.push(format!(
                "--- Body: Unhandled Content Type ({})",
                content_type.as_deref().unwrap_or("none")
            ));
            lines.push(format!("--- Body: {}", text));
        }
    }
}

impl NetworkLogger for TracingLogger {
    fn log(&self, event: &LogEvent<'_>) {
        let lines = self.render(event);
        if lines.is_empty() {
            return;
        }
        let text = lines
            .iter()
            .map(|l| format!("{}:: {}", self.tag, l))
            .collect::<Vec<_>>()
            .join("\n");

        match event.severity() {
            Severity::Info => tracing::debug!(direction = ?event.direction(), "{}", text),
            Severity::Warning => tracing::warn!(direction = ?event.direction(), "{}", text),
            Severity::Critical => tracing::error!(direction = ?event.direction(), "{}", text),
        }
    }
}
