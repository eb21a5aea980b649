//! REST API for custom storefront domains

pub mod handlers;
pub mod models;

use axum::{
    http::{header, HeaderValue, Method},
    routing::{get, post},
    Router,
};
use edgeshop_control::{BatchSslEngine, DomainOrchestrator, RenewalScheduler};
use std::{net::SocketAddr, sync::Arc};
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};
use tracing::info;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

/// Application state shared across handlers
pub struct AppState {
    pub orchestrator: Arc<DomainOrchestrator>,
    pub batch: Arc<BatchSslEngine>,
    pub scheduler: Arc<RenewalScheduler>,
}

/// OpenAPI documentation
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Edgeshop API",
        version = "0.1.0",
        description = "Custom storefront domain provisioning: DNS verification, provider zones and edge certificates",
        contact(
            name = "Edgeshop Team",
            email = "team@edgeshop.dev"
        )
    ),
    paths(
        handlers::health_check,
        handlers::register_domain,
        handlers::list_domains,
        handlers::get_domain,
        handlers::delete_domain,
        handlers::verify_domain,
        handlers::activate_ssl,
        handlers::submit_batch,
        handlers::get_batch,
        handlers::cancel_batch,
        handlers::cron_status,
        handlers::cron_action,
        handlers::update_cron_config,
        handlers::prune_renewal_log,
    ),
    components(
        schemas(
            models::HealthResponse,
            models::ErrorResponse,
            models::DnsConfig,
            models::DomainView,
            models::CertificateView,
            models::ZoneView,
            models::RegisterDomainRequest,
            models::DomainResponse,
            models::DomainListResponse,
            models::VerificationView,
            models::VerifyResponse,
            models::ActivateSslRequest,
            models::SslResponse,
            models::BatchSubmitRequest,
            models::BatchSubmitResponse,
            models::IneligibleDomainView,
            models::DomainResultView,
            models::BatchJobView,
            models::BatchJobResponse,
            models::BatchJobListResponse,
            models::DeleteDomainResponse,
            models::CancelResponse,
            models::CronConfigView,
            models::RunSummaryView,
            models::RenewalLogView,
            models::CronStatusResponse,
            models::CronAction,
            models::CronActionRequest,
            models::CronActionResponse,
            models::CronConfigUpdate,
            models::CronConfigResponse,
            models::PruneResponse,
        )
    ),
    tags(
        (name = "domains", description = "Custom domain registration and DNS verification"),
        (name = "ssl", description = "Edge certificate activation, single and batch"),
        (name = "renewal", description = "Certificate renewal scheduler"),
        (name = "system", description = "System health and info endpoints")
    )
)]
struct ApiDoc;

/// API server configuration
pub struct ApiServerConfig {
    /// Address to bind the API server
    pub bind_addr: SocketAddr,
    /// Enable CORS (for development)
    pub enable_cors: bool,
    /// Allowed CORS origins (if None, allows localhost origins)
    pub cors_origins: Option<Vec<String>>,
}

impl Default for ApiServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 3080)),
            enable_cors: true,
            cors_origins: None,
        }
    }
}

/// API Server
pub struct ApiServer {
    config: ApiServerConfig,
    state: Arc<AppState>,
}

impl ApiServer {
    pub fn new(
        config: ApiServerConfig,
        orchestrator: Arc<DomainOrchestrator>,
        batch: Arc<BatchSslEngine>,
        scheduler: Arc<RenewalScheduler>,
    ) -> Self {
        let state = Arc::new(AppState {
            orchestrator,
            batch,
            scheduler,
        });

        Self { config, state }
    }

    /// Build the router with all routes
    pub fn build_router(&self) -> Router {
        let api_doc = ApiDoc::openapi();

        let api_router = Router::new()
            .route("/api/health", get(handlers::health_check))
            .route(
                "/api/domains",
                get(handlers::list_domains).post(handlers::register_domain),
            )
            .route(
                "/api/domains/{id}",
                get(handlers::get_domain).delete(handlers::delete_domain),
            )
            .route("/api/domains/{id}/verify", post(handlers::verify_domain))
            .route("/api/ssl/activate", post(handlers::activate_ssl))
            .route(
                "/api/ssl/batch",
                get(handlers::get_batch)
                    .post(handlers::submit_batch)
                    .delete(handlers::cancel_batch),
            )
            .route(
                "/api/ssl/cron",
                get(handlers::cron_status)
                    .post(handlers::cron_action)
                    .put(handlers::update_cron_config)
                    .delete(handlers::prune_renewal_log),
            )
            .with_state(self.state.clone());

        // SwaggerUi serves /api/openapi.json itself
        let router = Router::new()
            .merge(SwaggerUi::new("/swagger-ui").url("/api/openapi.json", api_doc))
            .merge(api_router);

        let mut router = router.layer(TraceLayer::new_for_http());

        if self.config.enable_cors {
            router = router.layer(self.cors_layer());
        }

        router
    }

    fn cors_layer(&self) -> CorsLayer {
        let allow_origin = match &self.config.cors_origins {
            Some(origins) => AllowOrigin::list(
                origins
                    .iter()
                    .filter_map(|origin| HeaderValue::from_str(origin).ok()),
            ),
            None => AllowOrigin::predicate(|origin: &HeaderValue, _| {
                let origin = origin.to_str().unwrap_or("");
                origin.starts_with("http://localhost:")
                    || origin.starts_with("http://127.0.0.1:")
                    || origin.starts_with("https://localhost:")
                    || origin.starts_with("https://127.0.0.1:")
            }),
        };

        CorsLayer::new()
            .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
            .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
            .allow_origin(allow_origin)
    }

    /// Start the API server
    pub async fn start(self) -> Result<(), anyhow::Error> {
        let router = self.build_router();

        info!("Starting API server on {}", self.config.bind_addr);
        info!(
            "OpenAPI document: http://{}/api/openapi.json",
            self.config.bind_addr
        );
        info!("Swagger UI: http://{}/swagger-ui", self.config.bind_addr);

        let listener = tokio::net::TcpListener::bind(self.config.bind_addr).await?;

        axum::serve(listener, router)
            .await
            .map_err(|e| anyhow::anyhow!("Server error: {}", e))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openapi_generation() {
        let doc = ApiDoc::openapi();
        let paths: Vec<&String> = doc.paths.paths.keys().collect();
        assert!(paths.iter().any(|p| p.as_str() == "/api/ssl/batch"));
        assert!(paths.iter().any(|p| p.as_str() == "/api/domains/{id}/verify"));
    }
}
