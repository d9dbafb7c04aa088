//! HTTP transport: one shared Agent (TCP connection reuse), env-tuned
//! timeout and bounded retries on 5xx/429. Retry lives here, at the
//! transport layer; callers never retry.

use std::io::Read;
use std::sync::OnceLock;
use std::time::Duration;

const REQUEST_TIMEOUT_MS: u64 = 30_000;
const DEFAULT_RETRY_COUNT: usize = 2;
const DEFAULT_RETRY_BACKOFF_MS: u64 = 250;

fn timeout_ms_from_env() -> u64 {
    std::env::var("CREST_HTTP_TIMEOUT_MS")
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(REQUEST_TIMEOUT_MS)
}

fn retry_count_from_env() -> usize {
    std::env::var("CREST_HTTP_RETRIES")
        .ok()
        .and_then(|v| v.parse::<usize>().ok())
        .unwrap_or(DEFAULT_RETRY_COUNT)
}

fn retry_backoff_ms_from_env() -> u64 {
    std::env::var("CREST_HTTP_RETRY_BACKOFF_MS")
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(DEFAULT_RETRY_BACKOFF_MS)
}

/// Captured response: status, lowercased header pairs, full body.
pub struct Response {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl Response {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// HTTP client: one Agent (connection reuse), blocking requests.
pub struct HttpClient {
    agent: ureq::Agent,
}

impl HttpClient {
    pub fn new() -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(Duration::from_millis(timeout_ms_from_env()))
            .build();
        Self { agent }
    }

    /// GET url with headers; any 2xx is success.
    pub fn get(&self, url: &str, headers: &[(&str, &str)]) -> Result<Response, String> {
        self.send_with_retry(|| {
            let mut req = self.agent.get(url);
            for (k, v) in headers {
                req = req.set(k, v);
            }
            req.call()
        })
    }

    /// HEAD url with headers.
    pub fn head(&self, url: &str, headers: &[(&str, &str)]) -> Result<Response, String> {
        self.send_with_retry(|| {
            let mut req = self.agent.head(url);
            for (k, v) in headers {
                req = req.set(k, v);
            }
            req.call()
        })
    }

    /// POST with an empty body (e.g. to open an upload session).
    pub fn post_empty(&self, url: &str, headers: &[(&str, &str)]) -> Result<Response, String> {
        self.send_with_retry(|| {
            let mut req = self.agent.post(url);
            for (k, v) in headers {
                req = req.set(k, v);
            }
            req.send_bytes(&[])
        })
    }

    /// PUT a full in-memory body.
    pub fn put_bytes(
        &self,
        url: &str,
        headers: &[(&str, &str)],
        body: &[u8],
    ) -> Result<Response, String> {
        self.send_with_retry(|| {
            let mut req = self.agent.put(url);
            for (k, v) in headers {
                req = req.set(k, v);
            }
            req.send_bytes(body)
        })
    }

    fn send_with_retry<F>(&self, send: F) -> Result<Response, String>
    where
        F: Fn() -> Result<ureq::Response, ureq::Error>,
    {
        let retries = retry_count_from_env();
        let mut attempt = 0usize;
        let mut backoff = retry_backoff_ms_from_env();
        loop {
            attempt += 1;
            match send() {
                Ok(resp) => {
                    let status = resp.status();
                    if (200..300).contains(&status) {
                        return capture(resp);
                    }
                    if attempt <= retries && (status >= 500 || status == 429) {
                        std::thread::sleep(Duration::from_millis(backoff));
                        backoff = backoff.saturating_mul(2).min(5_000);
                        continue;
                    }
                    return Err(format!("HTTP {}", status));
                }
                Err(ureq::Error::Status(code, _resp)) => {
                    if attempt <= retries && (code >= 500 || code == 429) {
                        std::thread::sleep(Duration::from_millis(backoff));
                        backoff = backoff.saturating_mul(2).min(5_000);
                        continue;
                    }
                    return Err(format!("HTTP {}", code));
                }
                Err(e) => {
                    if attempt <= retries {
                        std::thread::sleep(Duration::from_millis(backoff));
                        backoff = backoff.saturating_mul(2).min(5_000);
                        continue;
                    }
                    return Err(e.to_string());
                }
            }
        }
    }
}

impl Default for HttpClient {
    fn default() -> Self {
        Self::new()
    }
}

fn capture(resp: ureq::Response) -> Result<Response, String> {
    let status = resp.status();
    let mut headers = Vec::new();
    for name in resp.headers_names() {
        if let Some(value) = resp.header(&name) {
            headers.push((name.to_ascii_lowercase(), value.to_string()));
        }
    }
    let mut body = Vec::new();
    resp.into_reader()
        .read_to_end(&mut body)
        .map_err(|e| e.to_string())?;
    Ok(Response {
        status,
        headers,
        body,
    })
}

static CLIENT: OnceLock<HttpClient> = OnceLock::new();

fn get_global() -> &'static HttpClient {
    CLIENT.get_or_init(HttpClient::new)
}

/// GET url (uses the global shared Agent).
pub fn get(url: &str, headers: &[(&str, &str)]) -> Result<Response, String> {
    get_global().get(url, headers)
}

/// HEAD url (uses the global shared Agent).
pub fn head(url: &str, headers: &[(&str, &str)]) -> Result<Response, String> {
    get_global().head(url, headers)
}

/// POST with an empty body (uses the global shared Agent).
pub fn post_empty(url: &str, headers: &[(&str, &str)]) -> Result<Response, String> {
    get_global().post_empty(url, headers)
}

/// PUT a byte buffer (uses the global shared Agent).
pub fn put_bytes(url: &str, headers: &[(&str, &str)], body: &[u8]) -> Result<Response, String> {
    get_global().put_bytes(url, headers, body)
}
