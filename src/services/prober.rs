/// Validity prober for CDN URLs
///
/// Answers one question: is this URL still retrievable right now? A
/// single negative answer is trusted for the rest of the run; there are
/// no retries at this layer.
use std::time::Duration;

use reqwest::{redirect, Client, StatusCode};

/// Probe timeout. CDN edges answer HEAD requests fast; anything slower
/// is treated as expired.
const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Redirect-follow cap for the probe request.
const MAX_REDIRECTS: usize = 5;

pub struct UrlProber {
    client: Client,
}

impl UrlProber {
    pub fn new() -> reqwest::Result<Self> {
        let client = Client::builder()
            .timeout(PROBE_TIMEOUT)
            .redirect(redirect::Policy::limited(MAX_REDIRECTS))
            .build()?;

        Ok(Self { client })
    }

    /// Check whether `url` is currently retrievable.
    ///
    /// A missing, empty, or sentinel-"NULL" URL is invalid without any
    /// network traffic. Otherwise a HEAD request is issued and only an
    /// exact 200 counts as valid; timeouts, transport errors, and every
    /// other status collapse to invalid.
    pub async fn probe(&self, url: Option<&str>) -> bool {
        let url = match url {
            Some(u) if !u.is_empty() && !u.eq_ignore_ascii_case("null") => u,
            _ => return false,
        };

        match self.client.head(url).send().await {
            Ok(response) => response.status() == StatusCode::OK,
            Err(e) => {
                tracing::debug!(url, error = %e, "URL probe failed");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_missing_and_sentinel_urls_skip_the_network() {
        let server = MockServer::start().await;
        let prober = UrlProber::new().unwrap();

        assert!(!prober.probe(None).await);
        assert!(!prober.probe(Some("")).await);
        assert!(!prober.probe(Some("NULL")).await);
        assert!(!prober.probe(Some("null")).await);

        let requests = server.received_requests().await.unwrap();
        assert!(requests.is_empty());
    }

    #[tokio::test]
    async fn test_ok_status_is_valid() {
        let server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let prober = UrlProber::new().unwrap();
        assert!(prober.probe(Some(&server.uri())).await);
    }

    #[tokio::test]
    async fn test_non_success_statuses_are_invalid() {
        for status in [204, 301, 403, 404, 500] {
            let server = MockServer::start().await;
            Mock::given(method("HEAD"))
                .respond_with(ResponseTemplate::new(status))
                .mount(&server)
                .await;

            let prober = UrlProber::new().unwrap();
            assert!(!prober.probe(Some(&server.uri())).await, "status {}", status);
        }
    }

    #[tokio::test]
    async fn test_unreachable_host_is_invalid() {
        let prober = UrlProber::new().unwrap();
        assert!(!prober.probe(Some("http://127.0.0.1:1/video.mp4")).await);
    }
}
