pub mod cache;
pub mod limiter;

use std::time::Duration;

use base64::Engine;
use log::warn;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, RETRY_AFTER, USER_AGENT};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use url::Url;

use crate::config::Config;
use self::cache::ResponseCache;
use self::limiter::RateLimiter;

/// Attempt budget for one upstream call.
const MAX_ATTEMPTS: u32 = 3;
/// Backoff ladder for 429 responses without a usable Retry-After header.
const RATE_LIMIT_BACKOFF_MS: u64 = 2000;
/// Backoff ladder for 5xx responses and transport failures.
const SERVER_BACKOFF_MS: u64 = 1000;
/// Upstream error bodies are quoted at most this many characters.
const ERROR_BODY_LIMIT: usize = 300;

/// Pagination block some endpoints return inside the envelope.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Page {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cursor: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_rows: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offset: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<i64>,
}

/// Outer `{ data, page? }` envelope every pipeline call returns.
///
/// Only the outer keys are guaranteed; the shape of `data` varies per
/// endpoint (see `crate::shape`). A few endpoints paginate via top-level
/// `next`/`has_next_page` instead of `page`, so those are captured here too.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Envelope {
    #[serde(default)]
    pub data: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<Page>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub has_next_page: Option<bool>,
}

/// Failure classes surfaced to tool handlers.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Non-2xx upstream response: after retries for 429/5xx, immediately for
    /// the rest.
    #[error("HiBob API error ({status}): {message}")]
    Upstream { status: StatusCode, message: String },
    /// No usable response at all: DNS, connect, timeout, reset.
    #[error("transport error: {0}")]
    Transport(String),
    /// 2xx response whose body is not valid envelope JSON.
    #[error("invalid JSON in response: {0}")]
    Decode(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorInfo {
    pub code: String,
    pub message: String,
    pub retriable: bool,
}

pub fn map_status_to_error(status: StatusCode, message: String) -> ErrorInfo {
    let (code, retriable) = match status {
        StatusCode::BAD_REQUEST => ("bad_request", false),
        StatusCode::UNAUTHORIZED => ("unauthorized", false),
        StatusCode::FORBIDDEN => ("forbidden", false),
        StatusCode::NOT_FOUND => ("not_found", false),
        StatusCode::TOO_MANY_REQUESTS => ("rate_limited", true),
        s if s.is_server_error() => ("upstream_error", true),
        _ => ("server_error", false),
    };
    ErrorInfo {
        code: code.to_string(),
        message,
        retriable,
    }
}

impl ApiError {
    /// Classify for tool output shapes.
    pub fn to_error_info(&self) -> ErrorInfo {
        match self {
            Self::Upstream { status, message } => map_status_to_error(*status, message.clone()),
            Self::Transport(msg) => ErrorInfo {
                code: "upstream_error".to_string(),
                message: msg.clone(),
                retriable: true,
            },
            Self::Decode(e) => ErrorInfo {
                code: "decode_error".to_string(),
                message: e.to_string(),
                retriable: false,
            },
        }
    }
}

/// Resolve `path` plus query parameters against the base URL. Parameters
/// with a `None` value are omitted entirely, never sent as empty strings.
pub fn build_url(
    base: &str,
    path: &str,
    params: &[(&str, Option<String>)],
) -> Result<Url, ApiError> {
    let full = format!("{}{}", base.trim_end_matches('/'), path);
    let mut url = Url::parse(&full)
        .map_err(|e| ApiError::Transport(format!("invalid URL {full}: {e}")))?;
    if params.iter().any(|(_, v)| v.is_some()) {
        let mut pairs = url.query_pairs_mut();
        for (name, value) in params {
            if let Some(v) = value {
                pairs.append_pair(name, v);
            }
        }
    }
    Ok(url)
}

/// Percent-encode a value used as a single path segment (ids sourced from
/// display fields may contain spaces or slashes).
pub fn encode_path_segment(s: &str) -> String {
    urlencoding::encode(s).into_owned()
}

// Opaque cursor for offset/limit paginated endpoints: base64(JSON { offset, limit })
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OffsetCursor {
    pub offset: u64,
    pub limit: u32,
}

pub fn encode_offset_cursor(c: &OffsetCursor) -> String {
    let bytes = serde_json::to_vec(c).unwrap_or_default();
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}

pub fn decode_offset_cursor(s: &str) -> Option<OffsetCursor> {
    let bytes = base64::engine::general_purpose::URL_SAFE_NO_PAD
        .decode(s)
        .ok()?;
    serde_json::from_slice(&bytes).ok()
}

/// The single choke point for upstream calls: URL construction, response
/// cache, request throttling, bounded retry, error classification. One
/// instance is shared by every tool handler in the process.
#[derive(Debug)]
pub struct Pipeline {
    client: Client,
    cfg: Config,
    limiter: RateLimiter,
    cache: ResponseCache,
}

impl Pipeline {
    pub fn new(cfg: Config) -> reqwest::Result<Self> {
        let mut default_headers = HeaderMap::new();
        if let Ok(ua) = HeaderValue::from_str(&cfg.user_agent) {
            default_headers.insert(USER_AGENT, ua);
        }
        let client = Client::builder()
            .default_headers(default_headers)
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .use_rustls_tls()
            .build()?;
        let cache = ResponseCache::new(Duration::from_secs(cfg.cache_ttl_secs));
        Ok(Self {
            client,
            cfg,
            limiter: RateLimiter::default(),
            cache,
        })
    }

    /// GET an API path and hand back the parsed envelope.
    ///
    /// A live cache hit returns immediately with no network or throttle
    /// interaction. A miss takes a rate-limiter slot, then runs the retry
    /// loop: 429 (honoring Retry-After), 5xx and transport failures retry
    /// with backoff inside the attempt budget; any other non-2xx status
    /// fails on the spot.
    pub async fn get_json(
        &self,
        path: &str,
        params: &[(&str, Option<String>)],
    ) -> Result<Envelope, ApiError> {
        let url = build_url(&self.cfg.api_url, path, params)?;
        let key = url.as_str().to_string();
        if let Some(hit) = self.cache.get(&key) {
            return Ok(hit);
        }
        self.limiter.acquire().await;

        let mut last_err: Option<ApiError> = None;
        for attempt in 0..MAX_ATTEMPTS {
            let res = self
                .client
                .get(url.clone())
                .header(AUTHORIZATION, auth_header(&self.cfg.token))
                .header(ACCEPT, HeaderValue::from_static("application/json"))
                .send()
                .await;

            let res = match res {
                Ok(r) => r,
                Err(e) => {
                    warn!("GET {} failed to send (attempt {}): {}", url, attempt, e);
                    last_err = Some(ApiError::Transport(e.to_string()));
                    if attempt + 1 < MAX_ATTEMPTS {
                        tokio::time::sleep(server_backoff(attempt)).await;
                    }
                    continue;
                }
            };

            let status = res.status();
            if status.is_success() {
                let body = res
                    .text()
                    .await
                    .map_err(|e| ApiError::Transport(e.to_string()))?;
                let envelope: Envelope = serde_json::from_str(&body)?;
                self.cache.insert(key, envelope.clone());
                return Ok(envelope);
            }

            if status == StatusCode::TOO_MANY_REQUESTS {
                let wait = retry_after(res.headers()).unwrap_or_else(|| {
                    Duration::from_millis(RATE_LIMIT_BACKOFF_MS * u64::from(attempt + 1))
                });
                warn!(
                    "GET {} rate limited (attempt {}), backoff {:?}",
                    url, attempt, wait
                );
                last_err = Some(ApiError::Upstream {
                    status,
                    message: "rate limited by upstream".to_string(),
                });
                if attempt + 1 < MAX_ATTEMPTS {
                    tokio::time::sleep(wait).await;
                }
                continue;
            }

            if status.is_server_error() {
                let body = res.text().await.unwrap_or_default();
                warn!("GET {} upstream {} (attempt {})", url, status, attempt);
                last_err = Some(ApiError::Upstream {
                    status,
                    message: upstream_message(status, &body),
                });
                if attempt + 1 < MAX_ATTEMPTS {
                    tokio::time::sleep(server_backoff(attempt)).await;
                }
                continue;
            }

            // Remaining 4xx statuses are request errors; retrying cannot help.
            let body = res.text().await.unwrap_or_default();
            let mut message = upstream_message(status, &body);
            if status == StatusCode::FORBIDDEN {
                message.push_str(
                    "; hint: the service-user token may be missing a permission scope for this endpoint",
                );
            }
            return Err(ApiError::Upstream { status, message });
        }

        Err(last_err.unwrap_or_else(|| ApiError::Transport("retry attempts exhausted".to_string())))
    }
}

fn auth_header(token: &str) -> HeaderValue {
    HeaderValue::from_str(&format!("Bearer {token}"))
        .unwrap_or_else(|_| HeaderValue::from_static("Bearer"))
}

fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

fn server_backoff(attempt: u32) -> Duration {
    Duration::from_millis(SERVER_BACKOFF_MS * u64::from(attempt + 1))
}

/// Best-effort human message for a non-2xx body. HiBob errors usually carry
/// a `message` string or an `errors` list; anything else is quoted raw.
fn upstream_message(status: StatusCode, body: &str) -> String {
    if let Ok(v) = serde_json::from_str::<Value>(body) {
        if let Some(msg) = v.get("message").and_then(Value::as_str) {
            return msg.to_string();
        }
        if let Some(errors) = v.get("errors").and_then(Value::as_array) {
            let parts: Vec<String> = errors
                .iter()
                .map(|e| match e.as_str() {
                    Some(s) => s.to_string(),
                    None => e
                        .get("message")
                        .and_then(Value::as_str)
                        .map(str::to_string)
                        .unwrap_or_else(|| e.to_string()),
                })
                .collect();
            if !parts.is_empty() {
                return parts.join("; ");
            }
        }
    }
    let trimmed = body.trim();
    if trimmed.is_empty() {
        format!("upstream returned {status}")
    } else {
        trimmed.chars().take(ERROR_BODY_LIMIT).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn undefined_params_are_omitted() {
        let url = build_url(
            "https://api.example.com/v1",
            "/people",
            &[
                ("limit", Some("10".to_string())),
                ("cursor", None),
                ("department", None),
            ],
        )
        .unwrap();
        let s = url.as_str();
        assert!(s.contains("limit=10"));
        assert!(!s.contains("cursor"));
        assert!(!s.contains("department"));
    }

    #[test]
    fn no_defined_params_means_no_query_string() {
        let url = build_url("https://api.example.com/v1/", "/tasks", &[("status", None)]).unwrap();
        assert_eq!(url.as_str(), "https://api.example.com/v1/tasks");
    }

    #[test]
    fn offset_cursor_roundtrip() {
        let c = OffsetCursor {
            offset: 40,
            limit: 20,
        };
        let s = encode_offset_cursor(&c);
        let d = decode_offset_cursor(&s).unwrap();
        assert_eq!(c, d);
    }

    #[test]
    fn offset_cursor_rejects_garbage() {
        assert_eq!(decode_offset_cursor("!!not-base64!!"), None);
    }

    #[test]
    fn url_path_segment_encoding() {
        // Spaces, slash, percent and unicode should be percent-encoded
        assert_eq!(encode_path_segment("Site A/EMEA%"), "Site%20A%2FEMEA%25");
        // Unreserved characters remain as-is
        assert_eq!(encode_path_segment("abc-._~123"), "abc-._~123");
    }

    #[test]
    fn error_mapping_matrix() {
        assert_eq!(
            map_status_to_error(StatusCode::BAD_REQUEST, String::new()).code,
            "bad_request"
        );
        assert_eq!(
            map_status_to_error(StatusCode::UNAUTHORIZED, String::new()).code,
            "unauthorized"
        );
        assert_eq!(
            map_status_to_error(StatusCode::FORBIDDEN, String::new()).code,
            "forbidden"
        );
        assert_eq!(
            map_status_to_error(StatusCode::NOT_FOUND, String::new()).code,
            "not_found"
        );
        let rl = map_status_to_error(StatusCode::TOO_MANY_REQUESTS, String::new());
        assert_eq!(rl.code, "rate_limited");
        assert!(rl.retriable);
        let s5 = map_status_to_error(StatusCode::INTERNAL_SERVER_ERROR, String::new());
        assert_eq!(s5.code, "upstream_error");
        assert!(s5.retriable);
    }

    #[test]
    fn upstream_message_prefers_message_field() {
        let msg = upstream_message(StatusCode::NOT_FOUND, r#"{"message":"no such employee"}"#);
        assert_eq!(msg, "no such employee");
    }

    #[test]
    fn upstream_message_joins_error_list() {
        let msg = upstream_message(
            StatusCode::BAD_REQUEST,
            r#"{"errors":["from is required","to is required"]}"#,
        );
        assert_eq!(msg, "from is required; to is required");
    }

    #[test]
    fn upstream_message_falls_back_to_status() {
        let msg = upstream_message(StatusCode::BAD_GATEWAY, "   ");
        assert!(msg.contains("502"));
    }

    #[test]
    fn envelope_tolerates_missing_page() {
        let env: Envelope = serde_json::from_str(r#"{"data":{"id":"1"}}"#).unwrap();
        assert!(env.page.is_none());
        assert!(env.next.is_none());
    }
}
