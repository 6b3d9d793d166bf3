/// Source resolver: provider API client and failure classification
///
/// Re-resolves a fresh CDN URL for a provider video id. Every call spends
/// exactly one unit of the run's API budget, success or failure alike,
/// and never retries; reacting to a failure is the caller's decision.
use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;

use crate::config::ProviderConfig;
use crate::jobs::stats::ApiBudget;
use crate::metrics;
use crate::models::{FailureKind, ResolveOutcome};

/// Timeout for provider API calls.
const RESOLVE_TIMEOUT: Duration = Duration::from_secs(15);

/// Provider error codes mapped to failure kinds, checked first and in order.
const CODE_RULES: &[(&str, FailureKind)] = &[
    ("NOT_FOUND", FailureKind::NotFound),
    ("FILE_NOT_FOUND", FailureKind::NotFound),
    ("PERMISSION_DENIED", FailureKind::PermissionDenied),
    ("ACCESS_DENIED", FailureKind::PermissionDenied),
    ("RATE_LIMITED", FailureKind::RateLimited),
    ("QUOTA_EXCEEDED", FailureKind::RateLimited),
];

/// Substring fallback on the error message, checked in order when no code
/// rule matched. Keeping the rules in one table keeps the heuristic
/// reproducible and testable independent of the provider's exact wording.
const MESSAGE_RULES: &[(&str, FailureKind)] = &[
    ("not found", FailureKind::NotFound),
    ("does not exist", FailureKind::NotFound),
    ("has been deleted", FailureKind::NotFound),
    ("permission", FailureKind::PermissionDenied),
    ("access denied", FailureKind::PermissionDenied),
    ("forbidden", FailureKind::PermissionDenied),
    ("rate limit", FailureKind::RateLimited),
    ("too many requests", FailureKind::RateLimited),
    ("quota", FailureKind::RateLimited),
];

#[derive(Debug, Deserialize)]
struct SourceResponse {
    url: Option<String>,
    error: Option<ProviderError>,
}

#[derive(Debug, Deserialize)]
struct ProviderError {
    code: Option<String>,
    message: Option<String>,
}

#[derive(Clone)]
pub struct SourceResolver {
    client: Client,
    base_url: String,
    api_key: String,
}

impl SourceResolver {
    pub fn new(config: &ProviderConfig) -> reqwest::Result<Self> {
        let client = Client::builder().timeout(RESOLVE_TIMEOUT).build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        })
    }

    /// Fetch a fresh CDN URL for `video_id` from the provider.
    ///
    /// The budget is spent up front so that success, provider errors, and
    /// transport errors all count the same against the ceiling.
    pub async fn resolve(&self, video_id: &str, budget: &mut ApiBudget) -> ResolveOutcome {
        budget.spend();
        metrics::record_provider_call();

        let request_url = format!("{}/api/v1/videos/{}/source", self.base_url, video_id);
        let response = match self
            .client
            .get(&request_url)
            .query(&[("api_key", self.api_key.as_str())])
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(video_id, error = %e, "Provider request failed");
                return ResolveOutcome::Failed {
                    kind: FailureKind::NetworkError,
                    message: e.to_string(),
                };
            }
        };

        let status = response.status();
        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                return ResolveOutcome::Failed {
                    kind: FailureKind::NetworkError,
                    message: e.to_string(),
                }
            }
        };
        let parsed: Option<SourceResponse> = serde_json::from_str(&body).ok();

        if status.is_success() {
            match parsed.and_then(|p| p.url) {
                Some(url) => ResolveOutcome::Resolved { url },
                None => ResolveOutcome::Failed {
                    kind: FailureKind::ApiError,
                    message: "provider response missing url".to_string(),
                },
            }
        } else {
            let (code, message) = match parsed.and_then(|p| p.error) {
                Some(error) => (error.code, error.message),
                None => (None, None),
            };
            let message =
                message.unwrap_or_else(|| format!("provider returned HTTP {}", status.as_u16()));
            let kind = classify_failure(code.as_deref(), Some(status.as_u16()), &message);

            tracing::warn!(video_id, kind = kind.as_str(), message, "Provider resolve failed");
            ResolveOutcome::Failed { kind, message }
        }
    }
}

/// Classify a provider failure with the ordered rule table: provider
/// error code first, then HTTP status, then message substrings.
pub fn classify_failure(
    code: Option<&str>,
    http_status: Option<u16>,
    message: &str,
) -> FailureKind {
    if let Some(code) = code {
        for (rule, kind) in CODE_RULES {
            if code.eq_ignore_ascii_case(rule) {
                return *kind;
            }
        }
    }

    match http_status {
        Some(404) => return FailureKind::NotFound,
        Some(401) | Some(403) => return FailureKind::PermissionDenied,
        Some(429) => return FailureKind::RateLimited,
        _ => {}
    }

    let message = message.to_lowercase();
    for (needle, kind) in MESSAGE_RULES {
        if message.contains(needle) {
            return *kind;
        }
    }

    FailureKind::ApiError
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn resolver_for(server: &MockServer) -> SourceResolver {
        SourceResolver::new(&ProviderConfig {
            base_url: server.uri(),
            api_key: "test-key".to_string(),
            call_budget: 900,
        })
        .unwrap()
    }

    #[test]
    fn test_classify_code_rules_beat_message_rules() {
        // A misleading message must not override an explicit code.
        assert_eq!(
            classify_failure(Some("QUOTA_EXCEEDED"), None, "video not found"),
            FailureKind::RateLimited
        );
        assert_eq!(
            classify_failure(Some("not_found"), None, "access denied"),
            FailureKind::NotFound
        );
    }

    #[test]
    fn test_classify_http_status_fallback() {
        assert_eq!(classify_failure(None, Some(404), ""), FailureKind::NotFound);
        assert_eq!(
            classify_failure(None, Some(403), ""),
            FailureKind::PermissionDenied
        );
        assert_eq!(
            classify_failure(None, Some(401), ""),
            FailureKind::PermissionDenied
        );
        assert_eq!(
            classify_failure(None, Some(429), ""),
            FailureKind::RateLimited
        );
    }

    #[test]
    fn test_classify_message_substrings() {
        assert_eq!(
            classify_failure(None, Some(500), "The File Does Not Exist"),
            FailureKind::NotFound
        );
        assert_eq!(
            classify_failure(None, Some(500), "request forbidden by policy"),
            FailureKind::PermissionDenied
        );
        assert_eq!(
            classify_failure(None, Some(500), "daily QUOTA reached"),
            FailureKind::RateLimited
        );
    }

    #[test]
    fn test_classify_unknown_is_api_error() {
        assert_eq!(
            classify_failure(Some("MYSTERY"), Some(500), "something odd"),
            FailureKind::ApiError
        );
        assert_eq!(classify_failure(None, None, ""), FailureKind::ApiError);
    }

    #[tokio::test]
    async fn test_resolve_success_spends_budget_once() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/videos/vid42/source"))
            .and(query_param("api_key", "test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "url": "https://cdn.example.com/vid42.mp4"
            })))
            .mount(&server)
            .await;

        let resolver = resolver_for(&server);
        let mut budget = ApiBudget::new(10);

        match resolver.resolve("vid42", &mut budget).await {
            ResolveOutcome::Resolved { url } => {
                assert_eq!(url, "https://cdn.example.com/vid42.mp4")
            }
            other => panic!("expected success, got {:?}", other),
        }
        assert_eq!(budget.used(), 1);
    }

    #[tokio::test]
    async fn test_resolve_not_found_spends_budget_once() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404).set_body_json(serde_json::json!({
                "error": { "code": "NOT_FOUND", "message": "video does not exist" }
            })))
            .mount(&server)
            .await;

        let resolver = resolver_for(&server);
        let mut budget = ApiBudget::new(10);

        match resolver.resolve("gone", &mut budget).await {
            ResolveOutcome::Failed { kind, message } => {
                assert_eq!(kind, FailureKind::NotFound);
                assert_eq!(message, "video does not exist");
            }
            other => panic!("expected failure, got {:?}", other),
        }
        assert_eq!(budget.used(), 1);
    }

    #[tokio::test]
    async fn test_resolve_success_without_url_is_api_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
            .mount(&server)
            .await;

        let resolver = resolver_for(&server);
        let mut budget = ApiBudget::new(10);

        match resolver.resolve("odd", &mut budget).await {
            ResolveOutcome::Failed { kind, .. } => assert_eq!(kind, FailureKind::ApiError),
            other => panic!("expected failure, got {:?}", other),
        }
        assert_eq!(budget.used(), 1);
    }

    #[tokio::test]
    async fn test_resolve_transport_failure_is_network_error_and_spends_budget() {
        let resolver = SourceResolver::new(&ProviderConfig {
            base_url: "http://127.0.0.1:1".to_string(),
            api_key: "test-key".to_string(),
            call_budget: 900,
        })
        .unwrap();
        let mut budget = ApiBudget::new(10);

        match resolver.resolve("vid", &mut budget).await {
            ResolveOutcome::Failed { kind, .. } => assert_eq!(kind, FailureKind::NetworkError),
            other => panic!("expected failure, got {:?}", other),
        }
        assert_eq!(budget.used(), 1);
    }
}
