//! Prospecta - Prospection automation engine entry point

use anyhow::{bail, Result};
use prospecta_api::AppState;
use prospecta_common::config::{Config, LoggingConfig, OutboundConfig};
use prospecta_core::{
    AutomationOrchestrator, DomainEnricher, EmailSender, HttpDomainEnricher, HttpEmailSender,
    OrchestratorDeps, TemplateService, TracingNotifier, WorkflowClient,
};
use prospecta_storage::repository::{
    AutomationConfigRepository, DbAutomationConfigRepository, DbProspectionRepository,
    DbTemplateRepository, ProspectionRepository, TemplateRepository,
};
use prospecta_storage::{DatabasePool, InMemoryStore};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Datastore adapters for the selected backend
struct Repositories {
    config: Arc<dyn AutomationConfigRepository>,
    prospection: Arc<dyn ProspectionRepository>,
    templates: Arc<dyn TemplateRepository>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config = Config::load()?;

    // Initialize logging
    init_logging(&config.logging);

    info!("Starting Prospecta automation engine...");

    let repos = open_repositories(&config).await?;

    let workflow = Arc::new(WorkflowClient::new(&config.workflow)?);
    info!(webhook = %workflow.webhook_url(), "Workflow client ready");

    let (email_sender, enricher) = outbound_collaborators(&config.outbound);

    let orchestrator = Arc::new(AutomationOrchestrator::new(OrchestratorDeps {
        config_repo: repos.config,
        prospection: repos.prospection.clone(),
        templates: repos.templates.clone(),
        workflow,
        email_sender,
        enricher,
        notifier: Arc::new(TracingNotifier),
        stats_ttl: Duration::from_secs(config.automation.stats_cache_ttl_secs),
    }));

    let automation = orchestrator.load_config().await?;
    info!(
        is_active = automation.is_active,
        daily_limit = automation.daily_limit,
        "Automation configuration loaded"
    );

    // Start health polling
    let shutdown = CancellationToken::new();
    let health_handle = orchestrator.spawn_health_polling(
        Duration::from_secs(config.automation.health_poll_interval_secs),
        shutdown.child_token(),
    );

    // Start API server
    let state = AppState {
        orchestrator,
        templates: Arc::new(TemplateService::new(repos.templates)),
        datastore: repos.prospection,
    };
    let app = prospecta_api::create_router(state, &config.api.cors_origins);

    let bind = format!("{}:{}", config.server.bind_address, config.api.port);
    let listener = tokio::net::TcpListener::bind(&bind).await?;
    info!("Starting API server on {}", bind);

    let signal_token = shutdown.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "Failed to listen for shutdown signal");
            }
            info!("Shutdown signal received");
            signal_token.cancel();
        })
        .await?;

    // Cleanup
    shutdown.cancel();
    if let Err(e) = health_handle.await {
        warn!(error = %e, "Health polling task ended abnormally");
    }

    info!("Prospecta shutdown complete");

    Ok(())
}

async fn open_repositories(config: &Config) -> Result<Repositories> {
    match config.database.backend.as_str() {
        "postgres" => {
            let db_pool = DatabasePool::new(&config.database).await?;

            if config.database.run_migrations {
                db_pool.migrate().await?;
                info!("Database migrations completed");
            }

            Ok(Repositories {
                config: Arc::new(DbAutomationConfigRepository::new(db_pool.clone())),
                prospection: Arc::new(DbProspectionRepository::new(db_pool.clone())),
                templates: Arc::new(DbTemplateRepository::new(db_pool)),
            })
        }
        "memory" => {
            warn!("Using in-memory datastore; data is lost on restart");
            let store = Arc::new(InMemoryStore::new());
            Ok(Repositories {
                config: store.clone(),
                prospection: store.clone(),
                templates: store,
            })
        }
        other => bail!("Unsupported database backend: {}", other),
    }
}

fn outbound_collaborators(
    config: &OutboundConfig,
) -> (Option<Arc<dyn EmailSender>>, Option<Arc<dyn DomainEnricher>>) {
    let email_sender: Option<Arc<dyn EmailSender>> = match config.email_send_url {
        Some(_) => match HttpEmailSender::new(config) {
            Ok(sender) => Some(Arc::new(sender)),
            Err(e) => {
                warn!(error = %e, "Email gateway disabled");
                None
            }
        },
        None => {
            info!("Email gateway not configured");
            None
        }
    };

    let enricher: Option<Arc<dyn DomainEnricher>> = match config.enrichment_url {
        Some(_) => match HttpDomainEnricher::new(config) {
            Ok(enricher) => Some(Arc::new(enricher)),
            Err(e) => {
                warn!(error = %e, "Domain enrichment disabled");
                None
            }
        },
        None => {
            info!("Domain enrichment not configured");
            None
        }
    };

    (email_sender, enricher)
}

fn init_logging(config: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    let registry = tracing_subscriber::registry().with(filter);
    if config.format == "json" {
        registry
            .with(fmt::layer().json().with_target(true).with_level(true))
            .init();
    } else {
        registry
            .with(fmt::layer().with_target(true).with_level(true))
            .init();
    }
}
