//! Delivery of presence totals to the attendance API.
//!
//! The API accepts a JSON array of [`ReportRecord`]s and authenticates the
//! caller with a shared `securityCode` header.

use std::fmt;
use std::time::Duration;

use thiserror::Error;
use vp_core::ReportRecord;

/// Default request timeout for API calls.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
const USER_AGENT: &str = concat!("vp/", env!("CARGO_PKG_VERSION"));
const SECURITY_CODE_HEADER: &str = "securityCode";

/// API client errors.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The endpoint URL is unusable.
    #[error("invalid API URL {url:?}: {reason}")]
    InvalidUrl { url: String, reason: &'static str },
    /// The security code is missing.
    #[error("invalid security code: {reason}")]
    InvalidSecurityCode { reason: &'static str },
    /// Failed to build HTTP client.
    #[error("failed to build HTTP client: {0}")]
    ClientBuild(#[source] reqwest::Error),
    /// HTTP request failed.
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    /// The API answered with a non-success status.
    #[error("API returned status {status}: {body}")]
    Status { status: u16, body: String },
}

/// Attendance API client.
///
/// # Thread Safety
///
/// The client is safe to clone and share across threads. Each clone shares
/// the underlying HTTP connection pool.
#[derive(Clone)]
pub struct Client {
    http: reqwest::Client,
    url: String,
    security_code: String,
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("url", &self.url)
            .field("security_code", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}

impl Client {
    /// Creates a client posting to `url`.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is not http(s), if the security code is
    /// empty or whitespace-only, or if the HTTP client fails to build.
    pub fn new(url: impl Into<String>, security_code: impl Into<String>) -> Result<Self, ApiError> {
        let url = url.into();
        let security_code = security_code.into();

        if url.trim().is_empty() {
            return Err(ApiError::InvalidUrl {
                url,
                reason: "URL cannot be empty",
            });
        }
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(ApiError::InvalidUrl {
                url,
                reason: "URL must use http or https",
            });
        }
        if security_code.trim().is_empty() {
            return Err(ApiError::InvalidSecurityCode {
                reason: "security code cannot be empty",
            });
        }

        let http = reqwest::Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .user_agent(USER_AGENT)
            .build()
            .map_err(ApiError::ClientBuild)?;

        Ok(Self {
            http,
            url,
            security_code,
        })
    }

    /// Posts `records` as a JSON array.
    pub async fn submit(&self, records: &[ReportRecord]) -> Result<(), ApiError> {
        let response = self
            .http
            .post(&self.url)
            .header(SECURITY_CODE_HEADER, &self.security_code)
            .json(records)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::Status {
                status: status.as_u16(),
                body,
            });
        }

        tracing::info!(records = records.len(), %status, "submitted presence totals");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{BufRead, BufReader, Read, Write};
    use std::net::TcpListener;
    use std::thread::{self, JoinHandle};

    use chrono::NaiveDate;
    use vp_core::TotalTime;

    /// Serves one HTTP request with a canned response and returns the raw
    /// request text.
    fn serve_once(status_line: &'static str, body: &'static str) -> (String, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind test listener");
        let url = format!("http://{}/attendance", listener.local_addr().unwrap());
        let handle = thread::spawn(move || {
            let (stream, _) = listener.accept().expect("accept test connection");
            let mut reader = BufReader::new(stream.try_clone().expect("clone stream"));
            let mut request = String::new();
            let mut content_length = 0;
            loop {
                let mut line = String::new();
                reader.read_line(&mut line).expect("read request line");
                if let Some(value) = line.to_ascii_lowercase().strip_prefix("content-length:") {
                    content_length = value.trim().parse().expect("numeric content length");
                }
                let done = line == "\r\n" || line.is_empty();
                request.push_str(&line);
                if done {
                    break;
                }
            }
            let mut body_buf = vec![0; content_length];
            reader.read_exact(&mut body_buf).expect("read request body");
            request.push_str(&String::from_utf8_lossy(&body_buf));

            let mut stream = stream;
            write!(
                stream,
                "{status_line}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            )
            .expect("write response");
            request
        });
        (url, handle)
    }

    fn record() -> ReportRecord {
        ReportRecord {
            full_name: "Alice".to_string(),
            email: String::new(),
            google_id: "1001".to_string(),
            total_time: TotalTime::Clock("02:00:00".to_string()),
            date: NaiveDate::from_ymd_opt(2024, 8, 6).unwrap(),
        }
    }

    #[test]
    fn client_rejects_empty_url() {
        assert!(matches!(
            Client::new("", "code"),
            Err(ApiError::InvalidUrl { .. })
        ));
    }

    #[test]
    fn client_rejects_non_http_url() {
        assert!(matches!(
            Client::new("ftp://example.com/upload", "code"),
            Err(ApiError::InvalidUrl { .. })
        ));
    }

    #[test]
    fn client_rejects_blank_security_code() {
        assert!(matches!(
            Client::new("https://example.com", "  "),
            Err(ApiError::InvalidSecurityCode { .. })
        ));
    }

    #[test]
    fn client_debug_redacts_security_code() {
        let client = Client::new("https://example.com", "12345678").unwrap();
        let debug = format!("{client:?}");
        assert!(!debug.contains("12345678"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[tokio::test]
    async fn submit_posts_json_with_security_code() {
        let (url, server) = serve_once("HTTP/1.1 200 OK", "ok");
        let client = Client::new(url, "s3cret").unwrap();

        client.submit(&[record()]).await.unwrap();

        let request = server.join().unwrap();
        assert!(request.starts_with("POST /attendance HTTP/1.1"));
        assert!(request.to_ascii_lowercase().contains("securitycode: s3cret"));
        assert!(request.contains(r#""fullName":"Alice","email":"""#));
        assert!(request.contains(r#""totalTime":"02:00:00""#));
    }

    #[tokio::test]
    async fn submit_reports_error_status() {
        let (url, server) = serve_once("HTTP/1.1 403 Forbidden", "bad code");
        let client = Client::new(url, "wrong").unwrap();

        let err = client.submit(&[record()]).await.unwrap_err();
        server.join().unwrap();
        match err {
            ApiError::Status { status, body } => {
                assert_eq!(status, 403);
                assert_eq!(body, "bad code");
            }
            other => panic!("expected status error, got {other:?}"),
        }
    }
}
