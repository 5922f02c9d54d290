/*============================================================
  Rainmeas Project: Registry Check
  Module: rainmeas_regcheck::probe
  Etiquette: Synavera Script Etiquette — Rust Profile v1.1.1
  ------------------------------------------------------------
  Purpose:
    Reachability probes for package download URLs. Defines the
    URL checker boundary consumed by the validator and the
    HTTP implementation used in production runs.

  Security / Safety Notes:
    Issues HEAD requests (GET only when HEAD is refused) and
    never reads response bodies. No credentials are sent.

  Dependencies:
    reqwest for HTTP, async-trait for the checker seam,
    tokio::time for retry backoff.

  Operational Scope:
    Invoked from the validator's bounded probe pool.

  Revision History:
    2026-10-17 RMS  Implemented URL checker and HTTP prober.
  ------------------------------------------------------------
  SSE Principles Observed:
    - Retry with exponential backoff on inconclusive results
    - Definitive and transient failures kept distinct
    - Configurable timeouts
============================================================*/

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Method, StatusCode};
use tokio::time::{self, sleep, Instant};

use crate::config::ProbeConfig;
use crate::error::{RegcheckError, Result};

const MAX_REDIRECTS: usize = 10;

/// Result of probing a single URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    Reachable,
    /// The host answered and the artifact is definitively not there.
    Unreachable(String),
    /// The probe could not be completed (timeout, DNS, refused connection).
    Inconclusive(String),
}

impl ProbeOutcome {
    pub fn is_inconclusive(&self) -> bool {
        matches!(self, ProbeOutcome::Inconclusive(_))
    }
}

/// Anything able to answer "does this URL resolve to a fetchable artifact".
#[async_trait]
pub trait UrlChecker: Send + Sync {
    async fn probe(&self, url: &str, timeout: Duration) -> ProbeOutcome;
}

/// Probe `url`, retrying inconclusive outcomes up to `retries` extra times.
///
/// Each attempt is cut off at `timeout` whether or not the checker honors it.
pub async fn probe_with_retries(
    checker: &dyn UrlChecker,
    url: &str,
    timeout: Duration,
    retries: usize,
) -> ProbeOutcome {
    let mut attempt = 0usize;
    loop {
        let outcome = time::timeout(timeout, checker.probe(url, timeout))
            .await
            .unwrap_or_else(|_| timed_out(timeout));
        if !outcome.is_inconclusive() || attempt >= retries {
            return outcome;
        }
        attempt += 1;
        sleep(backoff(attempt)).await;
    }
}

fn timed_out(timeout: Duration) -> ProbeOutcome {
    ProbeOutcome::Inconclusive(format!("Timed out after {}ms", timeout.as_millis()))
}

fn backoff(attempt: usize) -> Duration {
    let exponent = (attempt as u32).min(6);
    Duration::from_millis(200_u64.saturating_mul(1_u64 << exponent))
}

/// reqwest-backed checker.
#[derive(Clone)]
pub struct HttpUrlChecker {
    client: reqwest::Client,
}

impl HttpUrlChecker {
    pub fn new(config: &ProbeConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(config.timeout())
            .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
            .user_agent(config.user_agent.as_str())
            .build()
            .map_err(|err| RegcheckError::Network(format!("Failed to build HTTP client: {err}")))?;
        Ok(Self { client })
    }

    async fn status(
        &self,
        method: Method,
        url: &str,
        timeout: Duration,
    ) -> reqwest::Result<StatusCode> {
        let response = self
            .client
            .request(method, url)
            .timeout(timeout)
            .send()
            .await?;
        Ok(response.status())
    }
}

#[async_trait]
impl UrlChecker for HttpUrlChecker {
    async fn probe(&self, url: &str, timeout: Duration) -> ProbeOutcome {
        let started = Instant::now();
        let head = match self.status(Method::HEAD, url, timeout).await {
            Ok(status) => status,
            Err(err) => return classify_error(&err, timeout),
        };
        if head != StatusCode::METHOD_NOT_ALLOWED && head != StatusCode::NOT_IMPLEMENTED {
            return classify_status(head);
        }
        // HEAD and the GET fallback share one timeout budget.
        let remaining = timeout.saturating_sub(started.elapsed());
        if remaining.is_zero() {
            return timed_out(timeout);
        }
        match self.status(Method::GET, url, remaining).await {
            Ok(status) => classify_status(status),
            Err(err) => classify_error(&err, timeout),
        }
    }
}

fn classify_status(status: StatusCode) -> ProbeOutcome {
    if status.is_success() {
        return ProbeOutcome::Reachable;
    }
    match status {
        StatusCode::NOT_FOUND | StatusCode::GONE => {
            ProbeOutcome::Unreachable(format!("URL not found ({})", status.as_u16()))
        }
        StatusCode::REQUEST_TIMEOUT
        | StatusCode::TOO_MANY_REQUESTS
        | StatusCode::BAD_GATEWAY
        | StatusCode::SERVICE_UNAVAILABLE
        | StatusCode::GATEWAY_TIMEOUT => {
            ProbeOutcome::Inconclusive(format!("HTTP {}", status.as_u16()))
        }
        _ => ProbeOutcome::Unreachable(format!("HTTP {}", status.as_u16())),
    }
}

fn classify_error(err: &reqwest::Error, timeout: Duration) -> ProbeOutcome {
    if err.is_timeout() {
        timed_out(timeout)
    } else if err.is_redirect() {
        ProbeOutcome::Unreachable(format!("Redirect chain rejected: {err}"))
    } else if err.is_builder() {
        ProbeOutcome::Unreachable(format!("Request could not be built: {err}"))
    } else if err.is_connect() {
        ProbeOutcome::Inconclusive(format!("Connection failed: {err}"))
    } else {
        ProbeOutcome::Inconclusive(format!("Request failed: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Server;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn checker() -> HttpUrlChecker {
        HttpUrlChecker::new(&ProbeConfig::default()).unwrap()
    }

    const TIMEOUT: Duration = Duration::from_secs(5);

    #[tokio::test]
    async fn head_ok_is_reachable() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("HEAD", "/foo-1.0.0.rmskin")
            .with_status(200)
            .create_async()
            .await;
        let url = format!("{}/foo-1.0.0.rmskin", server.url());
        assert_eq!(checker().probe(&url, TIMEOUT).await, ProbeOutcome::Reachable);
    }

    #[tokio::test]
    async fn not_found_is_unreachable() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("HEAD", "/missing.zip")
            .with_status(404)
            .create_async()
            .await;
        let url = format!("{}/missing.zip", server.url());
        assert_eq!(
            checker().probe(&url, TIMEOUT).await,
            ProbeOutcome::Unreachable("URL not found (404)".into())
        );
    }

    #[tokio::test]
    async fn refused_head_falls_back_to_get() {
        let mut server = Server::new_async().await;
        let _head = server
            .mock("HEAD", "/asset.zip")
            .with_status(405)
            .create_async()
            .await;
        let get = server
            .mock("GET", "/asset.zip")
            .with_status(200)
            .with_body("payload")
            .create_async()
            .await;
        let url = format!("{}/asset.zip", server.url());
        assert_eq!(checker().probe(&url, TIMEOUT).await, ProbeOutcome::Reachable);
        get.assert_async().await;
    }

    #[tokio::test]
    async fn service_unavailable_is_inconclusive() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("HEAD", "/busy.zip")
            .with_status(503)
            .create_async()
            .await;
        let url = format!("{}/busy.zip", server.url());
        assert!(checker().probe(&url, TIMEOUT).await.is_inconclusive());
    }

    #[tokio::test]
    async fn refused_connection_is_inconclusive() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);
        let url = format!("http://127.0.0.1:{port}/gone.zip");
        assert!(checker().probe(&url, TIMEOUT).await.is_inconclusive());
    }

    struct Flaky {
        calls: AtomicUsize,
        succeed_on: usize,
    }

    #[async_trait]
    impl UrlChecker for Flaky {
        async fn probe(&self, _url: &str, _timeout: Duration) -> ProbeOutcome {
            let call = self.calls.fetch_add(1, Ordering::Relaxed) + 1;
            if call >= self.succeed_on {
                ProbeOutcome::Reachable
            } else {
                ProbeOutcome::Inconclusive("dns".into())
            }
        }
    }

    #[tokio::test]
    async fn inconclusive_probes_are_retried() {
        let flaky = Flaky {
            calls: AtomicUsize::new(0),
            succeed_on: 2,
        };
        let outcome = probe_with_retries(&flaky, "https://example.com/a", TIMEOUT, 1).await;
        assert_eq!(outcome, ProbeOutcome::Reachable);
        assert_eq!(flaky.calls.load(Ordering::Relaxed), 2);
    }

    #[tokio::test]
    async fn retries_are_bounded() {
        let flaky = Flaky {
            calls: AtomicUsize::new(0),
            succeed_on: usize::MAX,
        };
        let outcome = probe_with_retries(&flaky, "https://example.com/a", TIMEOUT, 2).await;
        assert!(outcome.is_inconclusive());
        assert_eq!(flaky.calls.load(Ordering::Relaxed), 3);
    }

    struct Stalled {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl UrlChecker for Stalled {
        async fn probe(&self, _url: &str, _timeout: Duration) -> ProbeOutcome {
            self.calls.fetch_add(1, Ordering::Relaxed);
            sleep(Duration::from_secs(3)).await;
            ProbeOutcome::Reachable
        }
    }

    #[tokio::test]
    async fn attempts_are_cut_off_at_the_timeout() {
        let stalled = Stalled {
            calls: AtomicUsize::new(0),
        };
        let started = std::time::Instant::now();
        let outcome =
            probe_with_retries(&stalled, "https://example.com/a", Duration::from_millis(100), 1)
                .await;
        assert_eq!(outcome, ProbeOutcome::Inconclusive("Timed out after 100ms".into()));
        assert_eq!(stalled.calls.load(Ordering::Relaxed), 2);
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[test]
    fn status_mapping() {
        assert_eq!(classify_status(StatusCode::NO_CONTENT), ProbeOutcome::Reachable);
        assert_eq!(
            classify_status(StatusCode::GONE),
            ProbeOutcome::Unreachable("URL not found (410)".into())
        );
        assert_eq!(
            classify_status(StatusCode::FORBIDDEN),
            ProbeOutcome::Unreachable("HTTP 403".into())
        );
        assert!(classify_status(StatusCode::TOO_MANY_REQUESTS).is_inconclusive());
    }

    #[test]
    fn backoff_grows_and_caps() {
        assert_eq!(backoff(1), Duration::from_millis(400));
        assert_eq!(backoff(2), Duration::from_millis(800));
        assert_eq!(backoff(50), backoff(6));
    }
}
