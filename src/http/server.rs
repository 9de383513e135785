//! HTTP server setup and the proxy pipeline.
//!
//! # Responsibilities
//! - Create the Axum router (client CRUD + catch-all proxy)
//! - Wire up middleware (timeout, request ID, tracing)
//! - Spawn the background loops (health checks, token refill)
//! - Per request: admission check, backend selection, forwarding,
//!   bounded failover retry

use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::State,
    http::uri::{Authority, Scheme},
    http::{header, HeaderValue, Request, StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::{any, get, put},
    Router,
};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use tokio::net::TcpListener;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::admin;
use crate::config::{GatewayConfig, RateLimitConfig};
use crate::health::HealthMonitor;
use crate::http::response::json_error;
use crate::lifecycle::Shutdown;
use crate::load_balancer::ServerPool;
use crate::observability::metrics;
use crate::ratelimit::RateLimiter;
use crate::store::ClientRepository;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub pool: Arc<ServerPool>,
    pub limiter: Arc<RateLimiter>,
    pub repo: Arc<dyn ClientRepository>,
    pub client: Client<HttpConnector, Body>,
    pub rate_limit: RateLimitConfig,
    pub max_attempts: u32,
    pub max_body_bytes: usize,
}

/// HTTP server for the gateway.
pub struct HttpServer {
    router: Router,
    config: GatewayConfig,
    pool: Arc<ServerPool>,
    limiter: Arc<RateLimiter>,
}

impl HttpServer {
    /// Create a new server from a validated config and a quota repository.
    pub fn new(config: GatewayConfig, repo: Arc<dyn ClientRepository>) -> Self {
        let addrs = config.backends.iter().filter_map(|address| {
            match address.parse() {
                Ok(addr) => Some(addr),
                Err(_) => {
                    tracing::warn!(address = %address, "Invalid backend address, skipping");
                    None
                }
            }
        });
        let pool = Arc::new(ServerPool::new(addrs));
        let limiter = Arc::new(RateLimiter::new(
            repo.clone(),
            config.rate_limit.cost_per_request,
        ));

        // The proxy owns its failover loop; hyper must not retry on its
        // own or the attempt accounting drifts.
        let mut builder = Client::builder(TokioExecutor::new());
        builder.retry_canceled_requests(false);
        let client = builder.build(HttpConnector::new());

        let state = AppState {
            pool: pool.clone(),
            limiter: limiter.clone(),
            repo,
            client,
            rate_limit: config.rate_limit.clone(),
            max_attempts: config.proxy.max_attempts,
            max_body_bytes: config.listener.max_body_bytes,
        };

        let router = Self::build_router(&config, state);
        Self {
            router,
            config,
            pool,
            limiter,
        }
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(config: &GatewayConfig, state: AppState) -> Router {
        Router::new()
            .route(
                "/clients",
                get(admin::list_clients).post(admin::create_client),
            )
            .route(
                "/clients/{client_id}",
                put(admin::update_client).delete(admin::delete_client),
            )
            .route("/{*path}", any(proxy_handler))
            .route("/", any(proxy_handler))
            .with_state(state)
            .layer(TimeoutLayer::new(Duration::from_secs(
                config.listener.request_timeout_secs,
            )))
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
            .layer(TraceLayer::new_for_http())
    }

    /// Run the server, accepting connections on the given listener, until
    /// the shutdown signal fires.
    pub async fn run(self, listener: TcpListener, shutdown: Shutdown) -> std::io::Result<()> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let monitor = HealthMonitor::new(self.pool.clone(), self.config.health_check.clone());
        let monitor_shutdown = shutdown.subscribe();
        tokio::spawn(async move {
            monitor.run(monitor_shutdown).await;
        });

        let refill_period = Duration::from_secs(self.config.rate_limit.refill_interval_secs);
        tokio::spawn(
            self.limiter
                .clone()
                .run_refill_loop(refill_period, shutdown.subscribe()),
        );

        let mut rx = shutdown.subscribe();
        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = rx.recv().await;
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }
}

/// Main proxy handler.
///
/// Admission check, then backend selection and forwarding with a bounded
/// failover retry: every transport failure advances the attempt counter and
/// re-selects; once the counter passes the cap the request is rejected.
async fn proxy_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    let start = Instant::now();
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
        .to_string();
    let method = request.method().clone();
    let path = request.uri().path().to_string();

    tracing::debug!(
        request_id = %request_id,
        method = %method,
        path = %path,
        "Proxying request"
    );

    // 1. Admission control, keyed by the optional client_id query param.
    let client_id = request.uri().query().and_then(|query| {
        url::form_urlencoded::parse(query.as_bytes())
            .find(|(key, _)| key == "client_id")
            .map(|(_, value)| value.into_owned())
    });

    match client_id {
        Some(ref id) => match state.limiter.allow(id).await {
            Ok(true) => {}
            Ok(false) => {
                tracing::warn!(request_id = %request_id, client_id = %id, "Request rejected due to rate limit");
                metrics::record_rate_limited();
                return json_error(StatusCode::TOO_MANY_REQUESTS, "Too many requests");
            }
            Err(e) => {
                tracing::error!(request_id = %request_id, client_id = %id, error = %e, "Rate limiting error");
                return json_error(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error");
            }
        },
        None => {
            // Unidentified callers are not rate-limited.
            tracing::warn!(request_id = %request_id, "Request without client_id");
        }
    }

    // 2. Buffer the body so failed attempts can be replayed.
    let (parts, body) = request.into_parts();
    let body_bytes = match axum::body::to_bytes(body, state.max_body_bytes).await {
        Ok(bytes) => bytes,
        Err(_) => {
            return json_error(StatusCode::PAYLOAD_TOO_LARGE, "Request body too large");
        }
    };

    // 3. Selection + forwarding with bounded failover.
    let mut attempts: u32 = 0;
    loop {
        if attempts > state.max_attempts {
            tracing::error!(request_id = %request_id, attempts, "Max attempts reached, terminating");
            return json_error(StatusCode::SERVICE_UNAVAILABLE, "Service not available");
        }

        let backend = match state.pool.select_next() {
            Some(backend) => backend,
            None => {
                tracing::error!(request_id = %request_id, path = %path, "No available backends");
                return json_error(StatusCode::SERVICE_UNAVAILABLE, "Service not available");
            }
        };

        let mut builder = Request::builder().method(method.clone()).version(parts.version);
        if let Some(headers) = builder.headers_mut() {
            for (key, value) in parts.headers.iter() {
                headers.insert(key.clone(), value.clone());
            }
            if let Ok(value) = HeaderValue::from_str(&request_id) {
                headers.insert(header::HeaderName::from_static("x-request-id"), value);
            }
        }

        let mut uri_parts = parts.uri.clone().into_parts();
        uri_parts.scheme = Some(Scheme::HTTP);
        if let Ok(authority) = Authority::from_str(&backend.addr.to_string()) {
            uri_parts.authority = Some(authority);
        }
        let uri = Uri::from_parts(uri_parts).unwrap_or_else(|_| parts.uri.clone());

        let upstream_request = match builder.uri(uri).body(Body::from(body_bytes.clone())) {
            Ok(req) => req,
            Err(e) => {
                tracing::error!(request_id = %request_id, error = %e, "Failed to build upstream request");
                return json_error(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error");
            }
        };

        match state.client.request(upstream_request).await {
            Ok(response) => {
                let status = response.status();
                tracing::info!(
                    request_id = %request_id,
                    backend = %backend.url,
                    status = %status,
                    "Request successfully routed"
                );
                metrics::record_request(
                    method.as_str(),
                    status.as_u16(),
                    &backend.addr.to_string(),
                    start,
                );

                let (response_parts, response_body) = response.into_parts();
                return Response::from_parts(response_parts, Body::new(response_body))
                    .into_response();
            }
            Err(e) => {
                tracing::warn!(
                    request_id = %request_id,
                    backend = %backend.url,
                    attempt = attempts,
                    error = %e,
                    "Forwarding failed, retrying against another backend"
                );
                metrics::record_forward_retry();
                attempts += 1;
            }
        }
    }
}
