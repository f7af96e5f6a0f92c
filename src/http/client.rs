//! Breaker-guarded HTTP client for downstream services.
//!
//! # Responsibilities
//! - Issue JSON requests against one dependency's base URL
//! - Enforce the per-call timeout
//! - Run every exchange through the dependency's circuit breaker
//!
//! # Design Decisions
//! - HTTP status >= 400, transport errors and timeouts count as failures
//! - Decoding happens after the breaker recorded success; a malformed body
//!   is a contract problem, not an availability one
//! - Cloning is cheap; clones share the connection pool and the breaker
//! - Paths are passed as segments and appended to the base URL's path, each
//!   percent-encoded as a single segment

use reqwest::header::{ACCEPT, HeaderMap, HeaderValue};
use reqwest::{Client, Method, RequestBuilder};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::config::ServiceConfig;
use crate::resilience::{
    BreakerSnapshot, BreakerState, CallError, CircuitBreaker, TimeoutError, with_timeout,
};

const USER_AGENT: &str = concat!("trading-gateway/", env!("CARGO_PKG_VERSION"));

/// Errors returned by [`ServiceClient`].
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("circuit breaker is open for {service}")]
    CircuitOpen { service: String },

    #[error("request to {service} cancelled")]
    Cancelled { service: String },

    #[error("request to {service} timed out after {}ms", .timeout.as_millis())]
    Timeout { service: String, timeout: Duration },

    #[error("request to {service} failed: {source}")]
    Transport {
        service: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{service} returned HTTP {status}: {body}")]
    Status {
        service: String,
        status: u16,
        body: String,
    },

    #[error("invalid response from {service}: {source}")]
    Decode {
        service: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid url for {service}: {url}")]
    InvalidUrl { service: String, url: String },

    #[error("failed to build HTTP client: {0}")]
    Build(#[source] reqwest::Error),
}

impl ClientError {
    pub fn is_circuit_open(&self) -> bool {
        matches!(self, ClientError::CircuitOpen { .. })
    }

    /// True if the breaker counted this error as a failure.
    pub fn is_breaker_failure(&self) -> bool {
        matches!(
            self,
            ClientError::Timeout { .. } | ClientError::Transport { .. } | ClientError::Status { .. }
        )
    }
}

/// HTTP client for one downstream dependency.
#[derive(Debug, Clone)]
pub struct ServiceClient {
    http: Client,
    base_url: Url,
    timeout: Duration,
    breaker: Arc<CircuitBreaker>,
    cancel: CancellationToken,
}

impl ServiceClient {
    /// Create a client for `config`, guarded by `breaker`.
    ///
    /// Calls issued after `cancel` fires fail with [`ClientError::Cancelled`].
    pub fn new(
        config: &ServiceConfig,
        breaker: Arc<CircuitBreaker>,
        cancel: CancellationToken,
    ) -> Result<Self, ClientError> {
        let base_url = Url::parse(&config.url).map_err(|_| ClientError::InvalidUrl {
            service: breaker.name().to_string(),
            url: config.url.clone(),
        })?;
        if base_url.cannot_be_a_base() {
            return Err(ClientError::InvalidUrl {
                service: breaker.name().to_string(),
                url: config.url.clone(),
            });
        }

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        let http = Client::builder()
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .build()
            .map_err(ClientError::Build)?;

        Ok(Self {
            http,
            base_url,
            timeout: config.timeout(),
            breaker,
            cancel,
        })
    }

    pub fn service(&self) -> &str {
        self.breaker.name()
    }

    pub fn breaker_state(&self) -> BreakerState {
        self.breaker.current_state()
    }

    pub fn breaker_snapshot(&self) -> BreakerSnapshot {
        self.breaker.snapshot()
    }

    /// GET `path` and decode the JSON body.
    ///
    /// `path` is a list of segments, e.g. `&["api", "v1", "prices", symbol]`.
    pub async fn get_json<T: DeserializeOwned>(&self, path: &[&str]) -> Result<T, ClientError> {
        let body = self.send(self.request(Method::GET, path)?).await?;
        self.decode(&body)
    }

    pub async fn post_json<B, T>(&self, path: &[&str], payload: &B) -> Result<T, ClientError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let body = self.send(self.request(Method::POST, path)?.json(payload)).await?;
        self.decode(&body)
    }

    /// POST `payload`, ignoring the response body.
    pub async fn post<B: Serialize + ?Sized>(&self, path: &[&str], payload: &B) -> Result<(), ClientError> {
        self.send(self.request(Method::POST, path)?.json(payload)).await?;
        Ok(())
    }

    pub async fn put_json<B, T>(&self, path: &[&str], payload: &B) -> Result<T, ClientError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let body = self.send(self.request(Method::PUT, path)?.json(payload)).await?;
        self.decode(&body)
    }

    pub async fn delete(&self, path: &[&str]) -> Result<(), ClientError> {
        self.send(self.request(Method::DELETE, path)?).await?;
        Ok(())
    }

    fn request(&self, method: Method, path: &[&str]) -> Result<RequestBuilder, ClientError> {
        let invalid = || ClientError::InvalidUrl {
            service: self.service().to_string(),
            url: format!("{}/{}", self.base_url.as_str().trim_end_matches('/'), path.join("/")),
        };
        // dot segments would be dropped silently and address another resource
        if path.iter().any(|segment| matches!(*segment, "" | "." | "..")) {
            return Err(invalid());
        }

        let mut url = self.base_url.clone();
        url.set_query(None);
        url.set_fragment(None);
        url.path_segments_mut()
            .map_err(|_| invalid())?
            .pop_if_empty()
            .extend(path);
        Ok(self.http.request(method, url))
    }

    /// Run one exchange through the breaker and return the response body.
    async fn send(&self, request: RequestBuilder) -> Result<String, ClientError> {
        let service = self.service();
        let timeout = self.timeout;

        let result = self
            .breaker
            .execute_with_cancel(&self.cancel, || async move {
                let exchange = async {
                    let response = request.send().await?;
                    let status = response.status();
                    let body = response.text().await?;
                    Ok::<_, reqwest::Error>((status, body))
                };

                match with_timeout(timeout, exchange).await {
                    Err(TimeoutError(limit)) => Err(ClientError::Timeout {
                        service: service.to_string(),
                        timeout: limit,
                    }),
                    Ok(Err(source)) => Err(ClientError::Transport {
                        service: service.to_string(),
                        source,
                    }),
                    Ok(Ok((status, body))) if status.is_client_error() || status.is_server_error() => {
                        Err(ClientError::Status {
                            service: service.to_string(),
                            status: status.as_u16(),
                            body,
                        })
                    }
                    Ok(Ok((_, body))) => Ok(body),
                }
            })
            .await;

        result.map_err(|e| match e {
            CallError::CircuitOpen { service } => ClientError::CircuitOpen { service },
            CallError::Cancelled { service } => ClientError::Cancelled { service },
            CallError::Operation(e) => {
                tracing::error!(service = %service, error = %e, "Downstream request failed");
                e
            }
        })
    }

    fn decode<T: DeserializeOwned>(&self, body: &str) -> Result<T, ClientError> {
        serde_json::from_str(body).map_err(|source| {
            tracing::warn!(service = %self.service(), error = %source, "Undecodable response body");
            ClientError::Decode {
                service: self.service().to_string(),
                source,
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CircuitBreakerConfig;
    use crate::observability::NoopObserver;

    fn client(url: &str) -> Result<ServiceClient, ClientError> {
        let breaker = Arc::new(
            CircuitBreaker::new(
                "portfolio-service",
                CircuitBreakerConfig::default(),
                Arc::new(NoopObserver),
            )
            .unwrap(),
        );
        let config = ServiceConfig {
            url: url.to_string(),
            ..Default::default()
        };
        ServiceClient::new(&config, breaker, CancellationToken::new())
    }

    #[test]
    fn test_rejects_invalid_base_url() {
        let err = client("not a url").unwrap_err();
        assert!(matches!(err, ClientError::InvalidUrl { ref url, .. } if url == "not a url"));
    }

    fn url(client: &ServiceClient, path: &[&str]) -> String {
        let request = client.request(Method::GET, path).unwrap().build().unwrap();
        request.url().to_string()
    }

    #[test]
    fn test_appends_segments_to_base() {
        let client = client("http://localhost:8081").unwrap();
        assert_eq!(
            url(&client, &["api", "v1", "portfolio", "user1"]),
            "http://localhost:8081/api/v1/portfolio/user1"
        );
    }

    #[test]
    fn test_keeps_base_path_prefix() {
        for base in ["http://localhost:8081/md", "http://localhost:8081/md/"] {
            let client = client(base).unwrap();
            assert_eq!(
                url(&client, &["api", "v1", "prices", "AAPL"]),
                "http://localhost:8081/md/api/v1/prices/AAPL"
            );
        }
    }

    #[test]
    fn test_user_values_stay_in_one_segment() {
        let client = client("http://localhost:8081/md").unwrap();
        assert_eq!(
            url(&client, &["api", "v1", "prices", "../../admin/reset"]),
            "http://localhost:8081/md/api/v1/prices/..%2F..%2Fadmin%2Freset"
        );
        assert_eq!(
            url(&client, &["api", "v1", "prices", "AAPL?force=true#x"]),
            "http://localhost:8081/md/api/v1/prices/AAPL%3Fforce=true%23x"
        );
    }

    #[test]
    fn test_rejects_dot_segments() {
        let client = client("http://localhost:8081/md").unwrap();
        for segment in ["..", ".", ""] {
            let err = client
                .request(Method::GET, &["api", "v1", "prices", segment])
                .unwrap_err();
            assert!(matches!(err, ClientError::InvalidUrl { .. }));
        }
        assert_eq!(client.breaker_snapshot().requests, 0);
    }

    #[test]
    fn test_rejects_opaque_base_url() {
        let err = client("mailto:ops@example.com").unwrap_err();
        assert!(matches!(err, ClientError::InvalidUrl { .. }));
    }

    #[test]
    fn test_error_classification() {
        let status = ClientError::Status {
            service: "svc".into(),
            status: 503,
            body: "down".into(),
        };
        assert!(status.is_breaker_failure());
        assert_eq!(status.to_string(), "svc returned HTTP 503: down");

        let decode = ClientError::Decode {
            service: "svc".into(),
            source: serde_json::from_str::<u32>("x").unwrap_err(),
        };
        assert!(!decode.is_breaker_failure());

        let open = ClientError::CircuitOpen { service: "svc".into() };
        assert!(open.is_circuit_open());
        assert!(!open.is_breaker_failure());
    }

    #[tokio::test]
    async fn test_cancelled_client_does_not_call() {
        let client = client("http://127.0.0.1:1").unwrap();
        client.cancel.cancel();
        let err = client.get_json::<serde_json::Value>(&["anything"]).await.unwrap_err();
        assert!(matches!(err, ClientError::Cancelled { .. }));
        assert_eq!(client.breaker_snapshot().requests, 0);
    }
}
