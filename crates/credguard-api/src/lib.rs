pub mod accounts;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;

use axum::{
    http::{header, Method},
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};
use std::{future::Future, net::SocketAddr, path::PathBuf, sync::Arc};
use tower_http::{
    cors::{Any, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};
use tracing::info;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use credguard_auth::{PasswordHasher, SessionError, SessionTokens};
use credguard_db::CredentialStore;

use accounts::AccountService;

/// Application state shared across handlers
pub struct AppState {
    pub accounts: AccountService,
    pub tokens: Arc<SessionTokens>,
}

/// OpenAPI documentation
#[derive(OpenApi)]
#[openapi(
    info(
        title = "credguard API",
        version = "0.1.0",
        description = "Credential registration and session token service"
    ),
    paths(
        handlers::register,
        handlers::list_users,
        handlers::get_current_user,
        handlers::delete_current_user,
        handlers::login,
        handlers::refresh,
        handlers::protected,
        handlers::health_check,
    ),
    components(
        schemas(
            models::ErrorResponse,
            models::ValidationErrorResponse,
            models::RegisterRequest,
            models::UserSummary,
            models::LoginRequest,
            models::TokenResponse,
            models::ProtectedData,
            models::HealthResponse,
        )
    ),
    tags(
        (name = "users", description = "Registration and account endpoints"),
        (name = "auth", description = "Login and session token endpoints"),
        (name = "system", description = "System health and info endpoints")
    )
)]
struct ApiDoc;

/// API server configuration
pub struct ApiServerConfig {
    /// Address to bind the API server
    pub bind_addr: SocketAddr,
    /// Allow cross-origin requests from any origin
    pub enable_cors: bool,
    /// Secret for signing session tokens
    pub jwt_secret: String,
    /// Lifetime of issued session tokens
    pub token_ttl: chrono::Duration,
    /// Directory of static files served for unmatched paths
    pub public_dir: Option<PathBuf>,
}

/// API Server
pub struct ApiServer {
    config: ApiServerConfig,
    state: Arc<AppState>,
}

impl ApiServer {
    /// Create a new API server
    ///
    /// Fails if the signing secret is empty or the token lifetime is not
    /// positive.
    pub fn new(
        config: ApiServerConfig,
        store: Arc<dyn CredentialStore>,
        hasher: Arc<PasswordHasher>,
    ) -> Result<Self, SessionError> {
        let tokens = Arc::new(SessionTokens::new(
            config.jwt_secret.as_bytes(),
            config.token_ttl,
        )?);

        let state = Arc::new(AppState {
            accounts: AccountService::new(store, hasher),
            tokens,
        });

        Ok(Self { config, state })
    }

    /// Build the router with all routes
    pub fn build_router(&self) -> Router {
        let api_doc = ApiDoc::openapi();

        let session_state = Arc::new(middleware::SessionState::new(self.state.tokens.clone()));

        // Build PUBLIC routes (no authentication required)
        let public_router = Router::new()
            .route("/api/health", get(handlers::health_check))
            .route(
                "/api/users",
                get(handlers::list_users).post(handlers::register),
            )
            .route("/api/auth/login", post(handlers::login))
            .with_state(self.state.clone());

        // Build PROTECTED routes (require a bearer session token)
        let protected_router = Router::new()
            .route(
                "/api/users/me",
                get(handlers::get_current_user).delete(handlers::delete_current_user),
            )
            .route("/api/auth/refresh", post(handlers::refresh))
            .route("/api/protected", get(handlers::protected))
            .with_state(self.state.clone())
            .layer(axum_middleware::from_fn_with_state(
                session_state,
                middleware::require_auth,
            ));

        let api_router = public_router.merge(protected_router);

        // SwaggerUi also serves /api/openapi.json
        let mut router = Router::new()
            .merge(SwaggerUi::new("/swagger-ui").url("/api/openapi.json", api_doc))
            .merge(api_router);

        if let Some(dir) = &self.config.public_dir {
            router = router.fallback_service(ServeDir::new(dir));
        }

        let mut router = router.layer(TraceLayer::new_for_http());

        if self.config.enable_cors {
            let cors = CorsLayer::new()
                .allow_methods([
                    Method::GET,
                    Method::POST,
                    Method::PUT,
                    Method::DELETE,
                    Method::PATCH,
                ])
                .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
                .allow_origin(Any);
            router = router.layer(cors);
        }

        router
    }

    /// Start the API server, returning once `shutdown` resolves and
    /// in-flight requests have drained
    pub async fn start<F>(self, shutdown: F) -> Result<(), anyhow::Error>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let router = self.build_router();

        let listener = tokio::net::TcpListener::bind(self.config.bind_addr).await?;

        info!("Starting API server on {}", self.config.bind_addr);
        info!(
            "OpenAPI spec: http://{}/api/openapi.json",
            self.config.bind_addr
        );
        info!("Swagger UI: http://{}/swagger-ui", self.config.bind_addr);

        axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                shutdown.await;
                info!("Gracefully shutdown");
            })
            .await
            .map_err(|e| anyhow::anyhow!("Server error: {}", e))?;

        Ok(())
    }
}
