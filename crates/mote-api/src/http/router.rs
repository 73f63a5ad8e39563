//! Router construction and server host for the configuration API.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router,
    http::Request,
    routing::{get, post},
};
use mote_config::ConfigService;
use mote_telemetry::build_sha;
use mote_telemetry::layers::REQUEST_ID_HEADER;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::{Span, info};

use crate::error::{ApiServerError, ApiServerResult};
use crate::http::constants::{
    ROUTE_CONF_REBOOT, ROUTE_CURRENT, ROUTE_DEFAULTS, ROUTE_REBOOT, ROUTE_RESET, ROUTE_RO_VARS,
    ROUTE_SAVE, ROUTE_UPLOAD,
};
use crate::http::{conf, upload};
use crate::restart::Restarter;
use crate::state::ApiState;

/// Axum router wrapper that hosts the configuration endpoints.
pub struct ApiServer {
    router: Router,
}

impl ApiServer {
    /// Build the router over `config`; save, reset, and reboot restart through `restarter`.
    #[must_use]
    pub fn new(config: ConfigService, restarter: Arc<dyn Restarter>) -> Self {
        let state = Arc::new(ApiState::new(config, restarter));
        let trace_layer = TraceLayer::new_for_http()
            .make_span_with(|request: &Request<_>| {
                let request_id = request
                    .headers()
                    .get(REQUEST_ID_HEADER)
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("")
                    .to_string();
                tracing::info_span!(
                    "http.request",
                    method = %request.method(),
                    route = %request.uri().path(),
                    request_id = %request_id,
                    build_sha = %build_sha(),
                    status_code = tracing::field::Empty,
                    latency_ms = tracing::field::Empty
                )
            })
            .on_request(|_request: &Request<_>, _span: &Span| {})
            .on_response(
                |response: &axum::response::Response, latency: Duration, span: &Span| {
                    span.record("status_code", response.status().as_u16());
                    let latency_ms = u64::try_from(latency.as_millis()).unwrap_or(u64::MAX);
                    span.record("latency_ms", latency_ms);
                },
            );
        let layered = ServiceBuilder::new()
            .layer(mote_telemetry::propagate_request_id_layer())
            .layer(mote_telemetry::set_request_id_layer())
            .layer(trace_layer);

        let router = Self::routes().route_layer(layered).with_state(state);
        Self { router }
    }

    fn routes() -> Router<Arc<ApiState>> {
        Router::new()
            .route(ROUTE_DEFAULTS, get(conf::get_defaults))
            .route(ROUTE_CURRENT, get(conf::get_current))
            .route(ROUTE_SAVE, post(conf::save))
            .route(ROUTE_RESET, post(conf::reset))
            .route(ROUTE_CONF_REBOOT, post(conf::reboot))
            .route(ROUTE_REBOOT, post(conf::reboot))
            .route(ROUTE_RO_VARS, get(conf::ro_vars))
            .route(ROUTE_UPLOAD, post(upload::upload))
    }

    /// The assembled router, for embedding or in-process requests.
    #[must_use]
    pub fn into_router(self) -> Router {
        self.router
    }

    /// Bind the listener on `addr` without serving yet.
    ///
    /// # Errors
    ///
    /// Returns [`ApiServerError::Bind`] if the address cannot be bound.
    pub async fn bind(self, addr: &str) -> ApiServerResult<BoundServer> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| ApiServerError::Bind {
                addr: addr.to_string(),
                source,
            })?;
        info!(addr = %addr, "http listener bound");
        Ok(BoundServer {
            router: self.router,
            listener,
        })
    }
}

/// Router with a bound listener, ready to serve.
pub struct BoundServer {
    router: Router,
    listener: TcpListener,
}

impl BoundServer {
    /// Address the listener is bound to.
    ///
    /// # Errors
    ///
    /// Returns an error if the socket address cannot be queried.
    pub fn local_addr(&self) -> ApiServerResult<SocketAddr> {
        self.listener
            .local_addr()
            .map_err(|source| ApiServerError::Serve { source })
    }

    /// Serve until `shutdown` resolves, then wait for open connections to finish.
    ///
    /// # Errors
    ///
    /// Returns [`ApiServerError::Serve`] if the server terminates with an IO error.
    pub async fn serve_until<F>(self, shutdown: F) -> ApiServerResult<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        axum::serve(self.listener, self.router.into_make_service())
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(|source| ApiServerError::Serve { source })
    }
}
