//! API routes

use axum::{
    http::HeaderValue,
    routing::{get, post, put},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::warn;

use crate::handlers::{automation, health, outbound, templates, workflows};
use crate::state::AppState;

fn cors_layer(origins: &[String]) -> CorsLayer {
    let cors = CorsLayer::new().allow_methods(Any).allow_headers(Any);

    if origins.is_empty() || origins.iter().any(|o| o == "*") {
        return cors.allow_origin(Any);
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    cors.allow_origin(allowed)
}

/// Create the API router
pub fn create_router(state: AppState, cors_origins: &[String]) -> Router {
    // Health check routes
    let health_routes = Router::new()
        .route("/", get(health::health))
        .route("/live", get(health::liveness))
        .route("/ready", get(health::readiness));

    // Automation routes
    let automation_routes = Router::new()
        .route("/stats", get(automation::get_stats))
        .route(
            "/config",
            get(automation::get_config).put(automation::update_config),
        )
        .route("/activity", get(automation::get_activity))
        .route("/health", get(automation::get_health))
        .route("/dashboard", get(automation::get_dashboard))
        .route("/start", post(automation::start))
        .route("/stop", post(automation::stop))
        .route("/sync", post(automation::sync));

    // Workflow routes
    let workflow_routes = Router::new()
        .route("/:workflow_id/trigger", post(workflows::trigger))
        .route("/batch", post(workflows::batch_trigger));

    // Template routes
    let template_routes = Router::new()
        .route(
            "/",
            get(templates::list_templates).post(templates::create_template),
        )
        .route("/recommend", get(templates::recommend_templates))
        .route("/variant", get(templates::best_variant))
        .route(
            "/:id",
            get(templates::get_template)
                .put(templates::update_template)
                .delete(templates::delete_template),
        )
        .route("/:id/duplicate", post(templates::duplicate_template))
        .route("/:id/preview", post(templates::preview_template))
        .route("/:id/performance", put(templates::record_performance));

    let api_v1 = Router::new()
        .nest("/automation", automation_routes)
        .nest("/workflows", workflow_routes)
        .nest("/templates", template_routes)
        .route("/emails/send", post(outbound::send_email))
        .route("/enrichment", post(outbound::enrich));

    Router::new()
        .nest("/health", health_routes)
        .nest("/api/v1", api_v1)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors_layer(cors_origins)),
        )
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use axum_test::TestServer;
    use pretty_assertions::assert_eq;
    use prospecta_common::config::WorkflowConfig;
    use prospecta_common::types::HealthStatus;
    use prospecta_core::{
        AutomationOrchestrator, AutomationStats, OrchestratorDeps, SystemHealth, TemplateService,
        TracingNotifier, WorkflowClient,
    };
    use prospecta_storage::models::{AutomationConfig, EmailTemplate};
    use prospecta_storage::InMemoryStore;
    use serde_json::{json, Value};
    use std::sync::Arc;
    use std::time::Duration;
    use wiremock::matchers::{body_partial_json, method};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn app_with(
        store: Arc<InMemoryStore>,
        webhook_url: &str,
    ) -> (TestServer, Arc<AutomationOrchestrator>) {
        let workflow = WorkflowClient::new(&WorkflowConfig {
            webhook_url: webhook_url.to_string(),
            signing_secret: Some("secret".to_string()),
            ..WorkflowConfig::default()
        })
        .unwrap();

        let orchestrator = Arc::new(AutomationOrchestrator::new(OrchestratorDeps {
            config_repo: store.clone(),
            prospection: store.clone(),
            templates: store.clone(),
            workflow: Arc::new(workflow),
            email_sender: None,
            enricher: None,
            notifier: Arc::new(TracingNotifier),
            stats_ttl: Duration::from_secs(120),
        }));
        orchestrator.load_config().await.unwrap();

        let state = AppState {
            orchestrator: orchestrator.clone(),
            templates: Arc::new(TemplateService::new(store.clone())),
            datastore: store,
        };

        (TestServer::new(create_router(state, &[])).unwrap(), orchestrator)
    }

    async fn server_with(store: Arc<InMemoryStore>, webhook_url: &str) -> TestServer {
        app_with(store, webhook_url).await.0
    }

    async fn server() -> TestServer {
        server_with(Arc::new(InMemoryStore::new()), "http://127.0.0.1:9/hook").await
    }

    fn template_body(key: &str) -> Value {
        json!({
            "key": key,
            "name": "Intro",
            "subject": "Hello {{name}}",
            "body": "A film for {{company}}",
            "category": "introduction",
            "priority": "high"
        })
    }

    #[tokio::test]
    async fn test_health_endpoints() {
        let server = server().await;
        server.get("/health").await.assert_status_ok();
        server.get("/health/live").await.assert_status_ok();
        server.get("/health/ready").await.assert_status_ok();
    }

    #[tokio::test]
    async fn test_readiness_fails_without_datastore() {
        let store = Arc::new(InMemoryStore::new());
        let server = server_with(store.clone(), "http://127.0.0.1:9/hook").await;
        store.set_available(false);

        server
            .get("/health/ready")
            .await
            .assert_status(StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_config_roundtrip() {
        let server = server().await;

        let config: AutomationConfig = server.get("/api/v1/automation/config").await.json();
        assert_eq!(config, AutomationConfig::default());

        let updated: AutomationConfig = server
            .put("/api/v1/automation/config")
            .json(&json!({"daily_limit": 75, "working_hours": {"end": "17:30"}}))
            .await
            .json();
        assert_eq!(updated.daily_limit, 75);
        assert_eq!(updated.working_hours.start, "09:00");
        assert_eq!(updated.working_hours.end, "17:30");

        server
            .put("/api/v1/automation/config")
            .json(&json!({"working_days": ["someday"]}))
            .await
            .assert_status(StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn test_stats_endpoint() {
        let server = server().await;

        let stats: AutomationStats = server
            .get("/api/v1/automation/stats")
            .add_query_param("period", 7)
            .add_query_param("refresh", true)
            .await
            .json();
        assert_eq!(stats.timeframe_days, 7);
        assert_eq!(stats.emails_sent, 0);

        server
            .get("/api/v1/automation/stats")
            .add_query_param("period", 0)
            .await
            .assert_status(StatusCode::UNPROCESSABLE_ENTITY);

        let response = server
            .get("/api/v1/automation/stats")
            .add_query_param("period", 100_000)
            .await;
        response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);
        let error: Value = response.json();
        assert_eq!(error["error"], "validation_error");
    }

    #[tokio::test]
    async fn test_oversized_config_window_is_rejected() {
        let server = server().await;

        server
            .put("/api/v1/automation/config")
            .json(&json!({"stats_timeframe_days": 1_000_000_000}))
            .await
            .assert_status(StatusCode::UNPROCESSABLE_ENTITY);

        let stats: AutomationStats = server.get("/api/v1/automation/stats").await.json();
        assert_eq!(stats.timeframe_days, 30);
    }

    #[tokio::test]
    async fn test_health_reports_disconnected_workflow() {
        let server = server().await;
        let health: SystemHealth = server.get("/api/v1/automation/health").await.json();
        assert_eq!(health.status, HealthStatus::Disconnected);
        assert_eq!(health.color, "red");
    }

    #[tokio::test]
    async fn test_health_serves_polled_snapshot() {
        let webhook = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&webhook)
            .await;

        let store = Arc::new(InMemoryStore::new());
        let (server, orchestrator) = app_with(store.clone(), &webhook.uri()).await;

        let first: SystemHealth = server.get("/api/v1/automation/health").await.json();
        assert_eq!(first.status, HealthStatus::Paused);
        let checks = webhook.received_requests().await.unwrap().len();

        store.set_available(false);
        let cached: SystemHealth = server.get("/api/v1/automation/health").await.json();
        assert_eq!(cached, first);
        assert_eq!(webhook.received_requests().await.unwrap().len(), checks);

        orchestrator.health_monitor().check_now().await;
        let polled: SystemHealth = server.get("/api/v1/automation/health").await.json();
        assert_eq!(polled.status, HealthStatus::Disconnected);

        store.set_available(true);
        let refreshed: SystemHealth = server
            .get("/api/v1/automation/health")
            .add_query_param("refresh", true)
            .await
            .json();
        assert_eq!(refreshed.status, HealthStatus::Paused);
        assert!(webhook.received_requests().await.unwrap().len() > checks + 1);
    }

    #[tokio::test]
    async fn test_dashboard_shape() {
        let server = server().await;
        let view: Value = server.get("/api/v1/automation/dashboard").await.json();

        assert_eq!(view["performance"]["open"], "poor");
        assert!(view["activity"].as_array().unwrap().is_empty());
        assert_eq!(view["config"]["daily_limit"], 50);
    }

    #[tokio::test]
    async fn test_template_lifecycle() {
        let server = server().await;

        let created = server.post("/api/v1/templates").json(&template_body("intro")).await;
        created.assert_status(StatusCode::CREATED);
        let template: EmailTemplate = created.json();
        assert_eq!(template.variables, vec!["name", "company"]);

        let preview: Value = server
            .post(&format!("/api/v1/templates/{}/preview", template.id))
            .json(&json!({"variables": {"name": "Ana"}}))
            .await
            .json();
        assert_eq!(preview["compiled"]["subject"], "Hello Ana");
        assert_eq!(preview["compiled"]["body"], "A film for [company]");
        assert_eq!(preview["missing"], json!(["company"]));

        let copy = server
            .post(&format!("/api/v1/templates/{}/duplicate", template.id))
            .await;
        copy.assert_status(StatusCode::CREATED);

        let list: Value = server
            .get("/api/v1/templates")
            .add_query_param("category", "introduction")
            .await
            .json();
        assert_eq!(list["total"], 2);

        server
            .delete(&format!("/api/v1/templates/{}", template.id))
            .await
            .assert_status(StatusCode::NO_CONTENT);
        server
            .get(&format!("/api/v1/templates/{}", template.id))
            .await
            .assert_status(StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_recommend_and_variant() {
        let server = server().await;
        let a: EmailTemplate = server
            .post("/api/v1/templates")
            .json(&template_body("followup_a"))
            .await
            .json();
        server
            .post("/api/v1/templates")
            .json(&template_body("followup_b"))
            .await
            .assert_status(StatusCode::CREATED);

        server
            .put(&format!("/api/v1/templates/{}/performance", a.id))
            .json(&json!({"open_rate": 0.4, "response_rate": 0.1}))
            .await
            .assert_status(StatusCode::NO_CONTENT);

        let best: EmailTemplate = server
            .get("/api/v1/templates/variant")
            .add_query_param("base_key", "followup")
            .await
            .json();
        assert_eq!(best.id, a.id);

        let recommended: Value = server
            .get("/api/v1/templates/recommend")
            .add_query_param("segment", "luxury")
            .await
            .json();
        assert_eq!(recommended["data"][0]["key"], "followup_a");

        server
            .get("/api/v1/templates/variant")
            .add_query_param("base_key", "closing")
            .await
            .assert_status(StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_workflow_errors_map_to_status() {
        let server = server().await;

        server
            .post("/api/v1/workflows/batch")
            .json(&json!({"actions": []}))
            .await
            .assert_status(StatusCode::BAD_REQUEST);

        server
            .post("/api/v1/workflows/wf-1/trigger")
            .json(&json!({"payload": {}}))
            .await
            .assert_status(StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_workflow_trigger_proxies_body() {
        let webhook = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_partial_json(json!({"action": "trigger_workflow"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"execution": "e-1"})))
            .mount(&webhook)
            .await;
        Mock::given(method("POST"))
            .and(body_partial_json(json!({"action": "sync_automation_status"})))
            .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway"))
            .mount(&webhook)
            .await;

        let server = server_with(Arc::new(InMemoryStore::new()), &webhook.uri()).await;

        let body: Value = server
            .post("/api/v1/workflows/wf-1/trigger")
            .json(&json!({"payload": {"prospect": "ana"}}))
            .await
            .json();
        assert_eq!(body, json!({"execution": "e-1"}));

        let response = server.post("/api/v1/automation/sync").await;
        response.assert_status(StatusCode::BAD_GATEWAY);
        let error: Value = response.json();
        assert_eq!(error["error"], "upstream_error");
    }

    #[tokio::test]
    async fn test_send_without_gateway_is_rejected() {
        let server = server().await;
        let template: EmailTemplate = server
            .post("/api/v1/templates")
            .json(&template_body("intro"))
            .await
            .json();

        server
            .post("/api/v1/emails/send")
            .json(&json!({
                "template_id": template.id,
                "to": "ana@example.com",
                "variables": {"name": "Ana", "company": "Maison"}
            }))
            .await
            .assert_status(StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_unknown_method_is_405() {
        let server = server().await;
        server
            .delete("/api/v1/automation/config")
            .await
            .assert_status(StatusCode::METHOD_NOT_ALLOWED);
    }
}
