/// HTTP front door for the refresh service
///
/// Thin handlers over the refresh runner and the queue: an authenticated
/// trigger, a queue status query, a single-video diagnostic resolve, and
/// the chat-command webhook. The trigger accepts and returns immediately;
/// run outcomes only ever surface through the notification sink.
use actix_web::{web, HttpRequest, HttpResponse};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use std::sync::Arc;

use crate::db::task_repo;
use crate::error::AppError;
use crate::jobs::RefreshRunner;
use crate::services::Notifier;

/// Header carrying the shared trigger secret.
pub const TRIGGER_SECRET_HEADER: &str = "x-refresh-token";

/// API Response wrapper
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }
}

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub runner: Arc<RefreshRunner>,
    pub notifier: Notifier,
    pub trigger_secret: String,
    pub admin_sender_id: Option<i64>,
}

#[derive(Debug, Serialize)]
struct TriggerResponse {
    started: bool,
}

#[derive(Debug, Serialize)]
struct StatusResponse {
    pending: i64,
    completed: i64,
    failed: i64,
    timestamp: String,
}

/// Incoming chat update, Telegram webhook shape.
#[derive(Debug, Deserialize)]
pub struct ChatUpdate {
    pub message: Option<ChatMessage>,
}

#[derive(Debug, Deserialize)]
pub struct ChatMessage {
    pub from: Option<ChatSender>,
    pub text: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ChatSender {
    pub id: i64,
}

fn check_trigger_secret(req: &HttpRequest, state: &AppState) -> Result<(), AppError> {
    let presented = req
        .headers()
        .get(TRIGGER_SECRET_HEADER)
        .and_then(|v| v.to_str().ok());

    match presented {
        Some(secret) if secret == state.trigger_secret => Ok(()),
        _ => Err(AppError::Unauthorized(
            "missing or invalid refresh token".to_string(),
        )),
    }
}

/// Liveness + database ping
///
/// GET /health
pub async fn health(state: web::Data<AppState>) -> HttpResponse {
    match sqlx::query("SELECT 1").fetch_one(&state.pool).await {
        Ok(_) => HttpResponse::Ok().json(serde_json::json!({
            "status": "ok",
            "service": "cdn-refresh-service",
            "version": env!("CARGO_PKG_VERSION")
        })),
        Err(e) => HttpResponse::ServiceUnavailable().json(serde_json::json!({
            "status": "unhealthy",
            "error": format!("PostgreSQL connection failed: {}", e),
            "service": "cdn-refresh-service"
        })),
    }
}

/// Start a refresh run in the background
///
/// POST /api/v1/refresh/trigger
///
/// Returns 202 as soon as the run is accepted; 409 when one is active.
pub async fn trigger_refresh(
    req: HttpRequest,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    check_trigger_secret(&req, &state)?;

    if !state.runner.clone().try_trigger() {
        return Err(AppError::Conflict(
            "a refresh run is already in progress".to_string(),
        ));
    }

    tracing::info!("Refresh run accepted via HTTP trigger");
    Ok(HttpResponse::Accepted().json(ApiResponse::ok(TriggerResponse { started: true })))
}

/// Queue status snapshot
///
/// GET /api/v1/refresh/status
pub async fn refresh_status(state: web::Data<AppState>) -> Result<HttpResponse, AppError> {
    let summary = task_repo::summary(&state.pool).await?;

    Ok(HttpResponse::Ok().json(ApiResponse::ok(StatusResponse {
        pending: summary.pending,
        completed: summary.completed,
        failed: summary.failed,
        timestamp: Utc::now().to_rfc3339(),
    })))
}

/// Resolve one provider video id and return the raw outcome
///
/// GET /api/v1/refresh/diagnose/{video_id}
///
/// Operator debugging only: bypasses all database reads and writes.
pub async fn diagnose_video(
    req: HttpRequest,
    path: web::Path<String>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    check_trigger_secret(&req, &state)?;

    let video_id = path.into_inner();
    if video_id.trim().is_empty() {
        return Err(AppError::BadRequest("video id must not be empty".to_string()));
    }

    let outcome = state.runner.diagnose(&video_id).await;
    Ok(HttpResponse::Ok().json(ApiResponse::ok(outcome)))
}

/// Chat-command trigger surface
///
/// POST /api/v1/refresh/webhook
///
/// Accepts a Telegram-style update; only `/refresh` from the configured
/// admin sender starts a run. Always answers 200 so the chat platform
/// does not re-deliver the update.
pub async fn chat_webhook(
    state: web::Data<AppState>,
    update: web::Json<ChatUpdate>,
) -> HttpResponse {
    let (sender_id, text) = match update.into_inner().message {
        Some(message) => (
            message.from.map(|s| s.id),
            message.text.unwrap_or_default(),
        ),
        None => return HttpResponse::Ok().json(serde_json::json!({ "ok": true })),
    };

    let authorized = matches!(
        (sender_id, state.admin_sender_id),
        (Some(sender), Some(admin)) if sender == admin
    );

    if !authorized || !text.trim().starts_with("/refresh") {
        return HttpResponse::Ok().json(serde_json::json!({ "ok": true }));
    }

    if state.runner.clone().try_trigger() {
        tracing::info!(sender_id, "Refresh run accepted via chat command");
        state.notifier.send("Refresh run started").await;
    } else {
        state
            .notifier
            .send("A refresh run is already in progress")
            .await;
    }

    HttpResponse::Ok().json(serde_json::json!({ "ok": true }))
}

/// Register refresh routes
pub fn register(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/v1/refresh")
            .route("/trigger", web::post().to(trigger_refresh))
            .route("/status", web::get().to(refresh_status))
            .route("/diagnose/{video_id}", web::get().to(diagnose_video))
            .route("/webhook", web::post().to(chat_webhook)),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{NotifierConfig, ProviderConfig};
    use crate::services::{SourceResolver, UrlProber};
    use actix_web::{http::StatusCode, test, App};

    fn test_state() -> AppState {
        let pool = PgPool::connect_lazy("postgresql://localhost/catalog_test")
            .expect("lazy pool");
        let prober = UrlProber::new().unwrap();
        let resolver = SourceResolver::new(&ProviderConfig {
            base_url: "http://127.0.0.1:1".to_string(),
            api_key: "k".to_string(),
            call_budget: 10,
        })
        .unwrap();
        let notifier = Notifier::new(&NotifierConfig {
            api_base: "https://api.telegram.org".to_string(),
            bot_token: None,
            chat_id: None,
        })
        .unwrap();

        let runner = Arc::new(RefreshRunner::new(
            pool.clone(),
            prober,
            resolver,
            notifier.clone(),
            10,
        ));

        AppState {
            pool,
            runner,
            notifier,
            trigger_secret: "s3cret".to_string(),
            admin_sender_id: Some(777),
        }
    }

    #[actix_web::test]
    async fn test_trigger_without_secret_is_unauthorized() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(test_state()))
                .configure(register),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/api/v1/refresh/trigger")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[actix_web::test]
    async fn test_trigger_with_wrong_secret_is_unauthorized() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(test_state()))
                .configure(register),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/api/v1/refresh/trigger")
            .insert_header((TRIGGER_SECRET_HEADER, "wrong"))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[actix_web::test]
    async fn test_trigger_with_secret_is_accepted() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(test_state()))
                .configure(register),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/api/v1/refresh/trigger")
            .insert_header((TRIGGER_SECRET_HEADER, "s3cret"))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::ACCEPTED);
    }

    #[actix_web::test]
    async fn test_webhook_ignores_unauthorized_sender() {
        let state = test_state();
        let runner = state.runner.clone();
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state))
                .configure(register),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/api/v1/refresh/webhook")
            .set_json(serde_json::json!({
                "message": { "from": { "id": 1 }, "text": "/refresh" }
            }))
            .to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(resp.status(), StatusCode::OK);
        assert!(!runner.is_busy());
    }

    #[actix_web::test]
    async fn test_webhook_ignores_other_commands() {
        let state = test_state();
        let runner = state.runner.clone();
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state))
                .configure(register),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/api/v1/refresh/webhook")
            .set_json(serde_json::json!({
                "message": { "from": { "id": 777 }, "text": "/status" }
            }))
            .to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(resp.status(), StatusCode::OK);
        assert!(!runner.is_busy());
    }

    #[actix_web::test]
    async fn test_diagnose_requires_secret() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(test_state()))
                .configure(register),
        )
        .await;

        let req = test::TestRequest::get()
            .uri("/api/v1/refresh/diagnose/vid123")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }
}
