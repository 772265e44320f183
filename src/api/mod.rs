use anyhow::Result;
use axum::{
    body::Body,
    http::{HeaderName, HeaderValue, Request},
    middleware,
    response::{IntoResponse, Json},
    routing::{get, post},
    Extension, Router,
};
use std::sync::Arc;
use tokio::{net::TcpListener, signal};
use tower::ServiceBuilder;
use tower_http::{
    cors::CorsLayer,
    request_id::PropagateRequestIdLayer,
    set_header::SetRequestHeaderLayer,
    trace::TraceLayer,
};
use tracing::{debug_span, info, Span};
use ulid::Ulid;
use utoipa::OpenApi;

use crate::gateway::{enforce, Gateway};

pub mod handlers;

use self::handlers::{health, info, login, proxy, Upstream};

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health,
        info::info,
        login::login,
        login::logout,
        login::current_user,
    ),
    components(schemas(
        health::Health,
        info::Info,
        login::LoginRequest,
        login::LoginResponse,
        login::LogoutResponse,
        crate::gateway::PrincipalView,
        crate::gateway::Role,
    )),
    tags(
        (name = "fieldgate", description = "Access-control gateway for field data collection"),
    )
)]
struct ApiDoc;

#[must_use]
pub fn openapi() -> utoipa::openapi::OpenApi {
    ApiDoc::openapi()
}

async fn openapi_json() -> impl IntoResponse {
    Json(openapi())
}

/// All routes behind the permission gate.
///
/// The gate runs for the local routes too; they sit in public zones unless
/// the zone table says otherwise.
pub fn router(gateway: Arc<Gateway>, upstream: Option<Arc<Upstream>>) -> Router {
    Router::new()
        .route("/", get(info::pages))
        .route("/omk", get(info::pages))
        .route("/omk/info", get(info::info))
        .route("/health", get(health::health).options(health::health))
        .route("/login", post(login::login))
        .route("/logout", get(login::logout).post(login::logout))
        .route("/current-user", get(login::current_user))
        .route("/api-docs/openapi.json", get(openapi_json))
        .fallback(proxy::forward)
        .layer(middleware::from_fn_with_state(gateway.clone(), enforce))
        .layer(Extension(gateway))
        .layer(Extension(upstream))
}

/// Serve until Ctrl-C or SIGTERM.
///
/// # Errors
/// Returns an error if the listener cannot bind or the server fails
pub async fn new(port: u16, gateway: Arc<Gateway>, upstream: Option<Arc<Upstream>>) -> Result<()> {
    let app = router(gateway, upstream).layer(
        ServiceBuilder::new()
            .layer(SetRequestHeaderLayer::if_not_present(
                HeaderName::from_static("x-request-id"),
                |_req: &_| HeaderValue::from_str(Ulid::new().to_string().as_str()).ok(),
            ))
            .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
                "x-request-id",
            )))
            .layer(TraceLayer::new_for_http().make_span_with(make_span))
            .layer(CorsLayer::permissive()),
    );

    let listener = TcpListener::bind(format!("::0:{port}")).await?;

    info!("Listening on [::]:{}", port);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            tracing::error!("failed to listen for Ctrl-C: {err}");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                tracing::error!("failed to listen for SIGTERM: {err}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    info!("Gracefully shutdown");
}

// span
fn make_span(request: &Request<Body>) -> Span {
    let headers = request.headers();
    let path = request.uri().path();
    let method = request.method().as_str();
    let request_id = headers
        .get("x-request-id")
        .and_then(|val| val.to_str().ok())
        .unwrap_or("none");

    debug_span!("http-request", method, path, request_id)
}
