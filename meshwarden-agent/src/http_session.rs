use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use reqwest::{Client, Method, StatusCode};
use tracing::{debug, warn};

const SESSION_MAX_AGE: Duration = Duration::from_secs(3600);
const SESSION_MAX_REQUESTS: u32 = 1000;
const POOL_MAX_IDLE_PER_HOST: usize = 10;
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
const MAX_RETRY_ATTEMPTS: u32 = 3;

const RETRYABLE_STATUSES: [StatusCode; 5] = [
    StatusCode::TOO_MANY_REQUESTS,
    StatusCode::INTERNAL_SERVER_ERROR,
    StatusCode::BAD_GATEWAY,
    StatusCode::SERVICE_UNAVAILABLE,
    StatusCode::GATEWAY_TIMEOUT,
];

fn is_idempotent(method: &Method) -> bool {
    matches!(method, &Method::GET | &Method::HEAD | &Method::OPTIONS)
}

struct Session {
    client: Client,
    created_at: Instant,
    request_count: AtomicU32,
}

fn build_client() -> reqwest::Result<Client> {
    Client::builder()
        .pool_max_idle_per_host(POOL_MAX_IDLE_PER_HOST)
        .timeout(DEFAULT_TIMEOUT)
        .build()
}

/// Pooled HTTP client the agent uses to talk to the server. Rebuilds itself
/// transparently once it exceeds an age or request-count cap, and retries
/// idempotent requests on a fixed set of transient status codes.
pub struct HttpSessionManager {
    inner: Mutex<Session>,
    base_url: String,
    api_key: Option<String>,
}

impl HttpSessionManager {
    pub fn new(base_url: impl Into<String>, api_key: Option<String>) -> reqwest::Result<Self> {
        Ok(Self {
            inner: Mutex::new(Session {
                client: build_client()?,
                created_at: Instant::now(),
                request_count: AtomicU32::new(0),
            }),
            base_url: base_url.into(),
            api_key,
        })
    }

    /// Returns a clone of the current client, transparently rebuilding it
    /// first if it has aged out or seen too many requests. Rebuild is
    /// double-checked under the lock so two concurrent callers never rebuild
    /// twice in a row.
    fn client(&self) -> Client {
        let mut session = self.inner.lock();
        let expired = session.created_at.elapsed() >= SESSION_MAX_AGE
            || session.request_count.load(Ordering::Relaxed) >= SESSION_MAX_REQUESTS;
        if expired {
            match build_client() {
                Ok(client) => {
                    debug!("rebuilding http session (age or request cap reached)");
                    session.client = client;
                    session.created_at = Instant::now();
                    session.request_count.store(0, Ordering::Relaxed);
                }
                Err(err) => {
                    warn!("failed to rebuild http client, reusing existing one: {err}");
                }
            }
        }
        session.request_count.fetch_add(1, Ordering::Relaxed);
        session.client.clone()
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }

    fn authorize(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => builder.bearer_auth(key),
            None => builder,
        }
    }

    /// Executes one request, retrying up to [`MAX_RETRY_ATTEMPTS`] times only
    /// when the method is idempotent and the response status is one of the
    /// retryable transient codes.
    pub async fn execute(
        &self,
        method: Method,
        path: &str,
        json_body: Option<serde_json::Value>,
    ) -> reqwest::Result<reqwest::Response> {
        let url = self.url(path);
        let idempotent = is_idempotent(&method);
        let mut attempt = 0u32;

        loop {
            attempt += 1;
            let client = self.client();
            let mut builder = client.request(method.clone(), &url);
            builder = self.authorize(builder);
            if let Some(body) = &json_body {
                builder = builder.json(body);
            }

            let response = builder.send().await?;
            let status = response.status();

            if idempotent && RETRYABLE_STATUSES.contains(&status) && attempt < MAX_RETRY_ATTEMPTS {
                let backoff = Duration::from_millis(200 * attempt as u64);
                warn!(%status, attempt, "retrying idempotent request after transient error");
                tokio::time::sleep(backoff).await;
                continue;
            }
            return Ok(response);
        }
    }

    pub async fn get(&self, path: &str) -> reqwest::Result<reqwest::Response> {
        self.execute(Method::GET, path, None).await
    }

    pub async fn post_json(
        &self,
        path: &str,
        body: serde_json::Value,
    ) -> reqwest::Result<reqwest::Response> {
        self.execute(Method::POST, path, Some(body)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn idempotent_methods_are_classified_correctly() {
        assert!(is_idempotent(&Method::GET));
        assert!(is_idempotent(&Method::HEAD));
        assert!(!is_idempotent(&Method::POST));
        assert!(!is_idempotent(&Method::DELETE));
    }

    #[test]
    fn url_joins_base_and_path() {
        let manager = HttpSessionManager::new("http://localhost:8787/", None).unwrap();
        assert_eq!(manager.url("/clients"), "http://localhost:8787/clients");
    }
}
