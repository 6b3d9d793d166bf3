/// Notification sink client
///
/// Pushes run reports and trigger confirmations to a Telegram chat as
/// plain text. Strictly fire-and-forget: a missing configuration or a
/// failed push is logged and never affects the refresh run.
use std::time::Duration;

use reqwest::Client;

use crate::config::NotifierConfig;

const SEND_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Clone)]
pub struct Notifier {
    client: Client,
    settings: Option<NotifierSettings>,
}

#[derive(Clone)]
struct NotifierSettings {
    api_base: String,
    bot_token: String,
    chat_id: String,
}

impl Notifier {
    pub fn new(config: &NotifierConfig) -> reqwest::Result<Self> {
        let client = Client::builder().timeout(SEND_TIMEOUT).build()?;

        let settings = match (&config.bot_token, &config.chat_id) {
            (Some(bot_token), Some(chat_id)) => Some(NotifierSettings {
                api_base: config.api_base.trim_end_matches('/').to_string(),
                bot_token: bot_token.clone(),
                chat_id: chat_id.clone(),
            }),
            _ => {
                tracing::info!("Notifier not configured, run reports will only be logged");
                None
            }
        };

        Ok(Self { client, settings })
    }

    /// Push `text` to the configured chat. No-op when unconfigured.
    pub async fn send(&self, text: &str) {
        let settings = match &self.settings {
            Some(settings) => settings,
            None => return,
        };

        let url = format!(
            "{}/bot{}/sendMessage",
            settings.api_base, settings.bot_token
        );
        let payload = serde_json::json!({
            "chat_id": settings.chat_id,
            "text": text,
        });

        match self.client.post(&url).json(&payload).send().await {
            Ok(response) if response.status().is_success() => {}
            Ok(response) => {
                tracing::warn!(
                    status = response.status().as_u16(),
                    "Notification push rejected"
                );
            }
            Err(e) => {
                tracing::warn!(error = %e, "Notification push failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_unconfigured_notifier_is_a_silent_noop() {
        let notifier = Notifier::new(&NotifierConfig {
            api_base: "https://api.telegram.org".to_string(),
            bot_token: None,
            chat_id: None,
        })
        .unwrap();

        // Must not panic or attempt network traffic.
        notifier.send("hello").await;
    }

    #[tokio::test]
    async fn test_send_posts_text_to_the_chat() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/bottoken123/sendMessage"))
            .and(body_partial_json(serde_json::json!({
                "chat_id": "42",
                "text": "run done",
            })))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let notifier = Notifier::new(&NotifierConfig {
            api_base: server.uri(),
            bot_token: Some("token123".to_string()),
            chat_id: Some("42".to_string()),
        })
        .unwrap();

        notifier.send("run done").await;
    }

    #[tokio::test]
    async fn test_push_failure_does_not_propagate() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let notifier = Notifier::new(&NotifierConfig {
            api_base: server.uri(),
            bot_token: Some("token123".to_string()),
            chat_id: Some("42".to_string()),
        })
        .unwrap();

        notifier.send("report").await;
    }
}
