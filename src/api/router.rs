//! HTTP routing configuration with rate limiting.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    Json, Router,
    body::Body,
    extract::State,
    http::{HeaderValue, Request, Response, StatusCode},
    middleware::{self, Next},
    response::IntoResponse,
    routing::{get, post},
};
use governor::{Quota, RateLimiter};
use tower::ServiceBuilder;
use tower_http::{
    timeout::TimeoutLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use crate::app::AppState;
use crate::domain::{ErrorDetail, ErrorResponse, RateLimitResponse};

use super::handlers::{
    assign_role_handler, health_check_handler, initialize_handler, liveness_handler,
    list_products_handler, metrics_handler, overview_handler, product_qr_handler,
    readiness_handler, register_product_handler, registry_list_handler, registry_lookup_handler,
    role_handler, update_product_handler, updater_products_handler, verify_handler,
};
use super::middleware::auth_middleware;

/// Chain writes wait for confirmation, so leave room past the RPC timeout.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(90);

/// Rate limiter configuration
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Requests per second for API endpoints
    pub general_rps: u32,
    /// Burst size for API endpoints
    pub general_burst: u32,
    /// Requests per second for health and metrics endpoints
    pub health_rps: u32,
    /// Burst size for health and metrics endpoints
    pub health_burst: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            general_rps: 10,
            general_burst: 20,
            health_rps: 100,
            health_burst: 100,
        }
    }
}

impl RateLimitConfig {
    /// Create config from environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// `RATE_LIMIT_RPS` and `RATE_LIMIT_BURST`; unparsable values fall back
    /// to the defaults.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let read = |key: &str, default: u32| {
            lookup(key)
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(default)
        };

        Self {
            general_rps: read("RATE_LIMIT_RPS", defaults.general_rps),
            general_burst: read("RATE_LIMIT_BURST", defaults.general_burst),
            ..defaults
        }
    }
}

type KeyedLimiter = RateLimiter<
    IpAddr,
    governor::state::keyed::DashMapStateStore<IpAddr>,
    governor::clock::DefaultClock,
>;

/// Shared rate limiter state, keyed by client IP.
pub struct RateLimitState {
    api_limiter: KeyedLimiter,
    health_limiter: KeyedLimiter,
    config: RateLimitConfig,
}

fn non_zero(value: u32) -> NonZeroU32 {
    NonZeroU32::new(value).unwrap_or(NonZeroU32::MIN)
}

impl RateLimitState {
    pub fn new(config: RateLimitConfig) -> Self {
        let api_quota = Quota::per_second(non_zero(config.general_rps))
            .allow_burst(non_zero(config.general_burst));
        let health_quota = Quota::per_second(non_zero(config.health_rps))
            .allow_burst(non_zero(config.health_burst));

        Self {
            api_limiter: RateLimiter::dashmap(api_quota),
            health_limiter: RateLimiter::dashmap(health_quota),
            config,
        }
    }
}

/// Client IP from X-Forwarded-For, X-Real-IP or ConnectInfo.
/// Unknown clients share the 0.0.0.0 bucket.
fn client_ip_from_request<B>(request: &Request<B>) -> IpAddr {
    let forwarded = request
        .headers()
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.split(',').next())
        .and_then(|first| first.trim().parse::<IpAddr>().ok());
    if let Some(ip) = forwarded {
        return ip;
    }

    let real_ip = request
        .headers()
        .get("x-real-ip")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.trim().parse::<IpAddr>().ok());
    if let Some(ip) = real_ip {
        return ip;
    }

    if let Some(addr) = request.extensions().get::<SocketAddr>() {
        return addr.ip();
    }
    if let Some(info) = request
        .extensions()
        .get::<axum::extract::ConnectInfo<SocketAddr>>()
    {
        return info.0.ip();
    }
    IpAddr::V4(Ipv4Addr::UNSPECIFIED)
}

/// Rate limit middleware for API endpoints
async fn rate_limit_api_middleware(
    State(rate_limit): State<Arc<RateLimitState>>,
    request: Request<Body>,
    next: Next,
) -> Response<Body> {
    let client_ip = client_ip_from_request(&request);
    let limit = HeaderValue::from(rate_limit.config.general_rps);

    match rate_limit.api_limiter.check_key(&client_ip) {
        Ok(_) => {
            let mut response = next.run(request).await;
            response.headers_mut().insert("X-RateLimit-Limit", limit);
            response
        }
        Err(not_until) => {
            let wait_time = not_until.wait_time_from(governor::clock::Clock::now(
                &governor::clock::DefaultClock::default(),
            ));
            let retry_after = wait_time.as_secs().max(1);
            metrics::counter!("rate_limited_total", "scope" => "api").increment(1);

            let body = RateLimitResponse {
                error: ErrorDetail {
                    r#type: "rate_limited".to_string(),
                    message: "Rate limit exceeded. Please slow down your requests.".to_string(),
                },
                retry_after,
            };

            let mut response = (StatusCode::TOO_MANY_REQUESTS, Json(body)).into_response();
            let headers = response.headers_mut();
            headers.insert("X-RateLimit-Limit", limit);
            headers.insert("X-RateLimit-Remaining", HeaderValue::from_static("0"));
            headers.insert("Retry-After", HeaderValue::from(retry_after));
            response
        }
    }
}

/// Rate limit middleware for health and metrics endpoints
async fn rate_limit_health_middleware(
    State(rate_limit): State<Arc<RateLimitState>>,
    request: Request<Body>,
    next: Next,
) -> Response<Body> {
    let client_ip = client_ip_from_request(&request);
    match rate_limit.health_limiter.check_key(&client_ip) {
        Ok(_) => next.run(request).await,
        Err(not_until) => {
            let wait_time = not_until.wait_time_from(governor::clock::Clock::now(
                &governor::clock::DefaultClock::default(),
            ));
            let retry_after = wait_time.as_secs().max(1);
            metrics::counter!("rate_limited_total", "scope" => "health").increment(1);

            let body = ErrorResponse {
                error: ErrorDetail {
                    r#type: "rate_limited".to_string(),
                    message: "Rate limit exceeded".to_string(),
                },
            };

            let mut response = (StatusCode::TOO_MANY_REQUESTS, Json(body)).into_response();
            response
                .headers_mut()
                .insert("Retry-After", HeaderValue::from(retry_after));
            response
        }
    }
}

fn api_routes(app_state: &Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(overview_handler))
        .route("/register", post(register_product_handler))
        .route("/verify", get(verify_handler))
        .route(
            "/update",
            get(updater_products_handler).post(update_product_handler),
        )
        .route("/products", get(list_products_handler))
        .route("/products/{address}/qr", get(product_qr_handler))
        .route("/registry", get(registry_list_handler))
        .route("/registry/{name}", get(registry_lookup_handler))
        .route("/role", get(role_handler))
        .route("/admin/initialize", post(initialize_handler))
        .route("/admin/roles", post(assign_role_handler))
        .route_layer(middleware::from_fn_with_state(
            Arc::clone(app_state),
            auth_middleware,
        ))
}

fn health_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/health", get(health_check_handler))
        .route("/health/live", get(liveness_handler))
        .route("/health/ready", get(readiness_handler))
        .route("/metrics", get(metrics_handler))
}

fn build_router(app_state: Arc<AppState>, rate_limit: Option<RateLimitConfig>) -> Router {
    let middleware = ServiceBuilder::new()
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            REQUEST_TIMEOUT,
        ));

    let mut api = api_routes(&app_state);
    let mut health = health_routes();

    if let Some(config) = rate_limit {
        let rate_limit_state = Arc::new(RateLimitState::new(config));
        api = api.layer(middleware::from_fn_with_state(
            Arc::clone(&rate_limit_state),
            rate_limit_api_middleware,
        ));
        health = health.layer(middleware::from_fn_with_state(
            rate_limit_state,
            rate_limit_health_middleware,
        ));
    }

    Router::new()
        .merge(api)
        .merge(health)
        .layer(middleware)
        .with_state(app_state)
}

/// Create router without rate limiting
pub fn create_router(app_state: Arc<AppState>) -> Router {
    build_router(app_state, None)
}

/// Create router with per-IP rate limiting
pub fn create_router_with_rate_limit(app_state: Arc<AppState>, config: RateLimitConfig) -> Router {
    build_router(app_state, Some(config))
}

#[cfg(test)]
mod tests {
    use axum::{
        Router,
        body::Body,
        http::{Request, StatusCode},
        middleware,
        response::IntoResponse,
        routing::get,
    };
    use secrecy::SecretString;
    use std::sync::Arc;
    use tower::ServiceExt;

    use super::*;
    use crate::app::ServiceSettings;
    use crate::domain::Pubkey;
    use crate::test_utils::{MockNotifier, MockProgram, MockRegistry};

    fn state_with(program: MockProgram) -> Arc<AppState> {
        Arc::new(AppState::new(
            Arc::new(program),
            Arc::new(MockRegistry::new()),
            Arc::new(MockNotifier::new()),
            ServiceSettings::default(),
            SecretString::from("router-test-key"),
        ))
    }

    fn test_state() -> Arc<AppState> {
        state_with(MockProgram::new().with_wallet(Pubkey::new_from_array([1u8; 32])))
    }

    fn get_request(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    mod rate_limit_config_tests {
        use super::*;
        use std::collections::HashMap;

        #[test]
        fn test_rate_limit_config_default() {
            let config = RateLimitConfig::default();
            assert_eq!(config.general_rps, 10);
            assert_eq!(config.general_burst, 20);
            assert_eq!(config.health_rps, 100);
            assert_eq!(config.health_burst, 100);
        }

        #[test]
        fn test_rate_limit_config_from_lookup() {
            let vars: HashMap<&str, &str> =
                [("RATE_LIMIT_RPS", "50"), ("RATE_LIMIT_BURST", "bogus")].into();
            let config = RateLimitConfig::from_lookup(|k| vars.get(k).map(|v| v.to_string()));
            assert_eq!(config.general_rps, 50);
            assert_eq!(config.general_burst, 20);
            assert_eq!(config.health_rps, 100);
        }

        #[test]
        fn test_zero_quota_is_clamped() {
            let config = RateLimitConfig {
                general_rps: 0,
                general_burst: 0,
                ..Default::default()
            };
            let _state = RateLimitState::new(config);
        }
    }

    mod middleware_tests {
        use super::*;
        use http_body_util::BodyExt;

        async fn dummy_handler() -> impl IntoResponse {
            StatusCode::OK
        }

        fn limited_app(config: RateLimitConfig, health: bool) -> Router {
            let state = Arc::new(RateLimitState::new(config));
            let router = Router::new().route("/", get(dummy_handler));
            if health {
                router.layer(middleware::from_fn_with_state(
                    state,
                    rate_limit_health_middleware,
                ))
            } else {
                router.layer(middleware::from_fn_with_state(
                    state,
                    rate_limit_api_middleware,
                ))
            }
        }

        fn tight() -> RateLimitConfig {
            RateLimitConfig {
                general_rps: 1,
                general_burst: 1,
                ..Default::default()
            }
        }

        #[tokio::test]
        async fn test_rate_limit_api_middleware_blocks_request() {
            let app = limited_app(tight(), false);

            app.clone().oneshot(get_request("/")).await.unwrap();
            let response = app.oneshot(get_request("/")).await.unwrap();

            assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        }

        #[tokio::test]
        async fn test_rate_limit_success_includes_limit_header() {
            let app = limited_app(
                RateLimitConfig {
                    general_rps: 100,
                    general_burst: 100,
                    ..Default::default()
                },
                false,
            );

            let response = app.oneshot(get_request("/")).await.unwrap();

            assert_eq!(response.status(), StatusCode::OK);
            assert_eq!(response.headers().get("X-RateLimit-Limit").unwrap(), "100");
        }

        #[tokio::test]
        async fn test_rate_limit_exceeded_headers_and_body() {
            let app = limited_app(tight(), false);

            app.clone().oneshot(get_request("/")).await.unwrap();
            let response = app.oneshot(get_request("/")).await.unwrap();

            assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
            assert!(response.headers().contains_key("Retry-After"));
            assert_eq!(
                response.headers().get("X-RateLimit-Remaining").unwrap(),
                "0"
            );

            let body_bytes = response.into_body().collect().await.unwrap().to_bytes();
            let body: RateLimitResponse = serde_json::from_slice(&body_bytes).unwrap();
            assert_eq!(body.error.r#type, "rate_limited");
            assert!(body.retry_after >= 1);
        }

        #[tokio::test]
        async fn test_health_rate_limit_allows_high_volume() {
            let app = limited_app(tight(), true);

            for _ in 0..10 {
                let response = app.clone().oneshot(get_request("/")).await.unwrap();
                assert_eq!(response.status(), StatusCode::OK);
            }
        }

        #[tokio::test]
        async fn test_rate_limit_per_ip() {
            let app = limited_app(tight(), false);
            let from = |ip: &str| {
                Request::builder()
                    .uri("/")
                    .header("X-Forwarded-For", ip)
                    .body(Body::empty())
                    .unwrap()
            };

            app.clone().oneshot(from("192.168.1.1")).await.unwrap();
            let blocked = app.clone().oneshot(from("192.168.1.1")).await.unwrap();
            assert_eq!(blocked.status(), StatusCode::TOO_MANY_REQUESTS);

            let other = app.oneshot(from("10.0.0.1")).await.unwrap();
            assert_eq!(other.status(), StatusCode::OK);
        }

        #[test]
        fn test_client_ip_resolution() {
            let req = Request::builder()
                .header("x-forwarded-for", "203.0.113.9, 10.0.0.1")
                .body(())
                .unwrap();
            assert_eq!(
                client_ip_from_request(&req),
                "203.0.113.9".parse::<IpAddr>().unwrap()
            );

            let req = Request::builder()
                .header("x-real-ip", "198.51.100.2")
                .body(())
                .unwrap();
            assert_eq!(
                client_ip_from_request(&req),
                "198.51.100.2".parse::<IpAddr>().unwrap()
            );

            let req = Request::builder().body(()).unwrap();
            assert_eq!(
                client_ip_from_request(&req),
                IpAddr::V4(Ipv4Addr::UNSPECIFIED)
            );
        }
    }

    mod router_tests {
        use super::*;

        #[tokio::test]
        async fn test_health_routes() {
            let router = create_router(test_state());

            for uri in ["/health", "/health/live", "/health/ready"] {
                let res = router.clone().oneshot(get_request(uri)).await.unwrap();
                assert_eq!(res.status(), StatusCode::OK, "{}", uri);
            }
        }

        #[tokio::test]
        async fn test_readiness_fails_when_node_down() {
            let program = MockProgram::new();
            program.set_healthy(false);
            let router = create_router(state_with(program));

            let res = router.oneshot(get_request("/health/ready")).await.unwrap();
            assert_eq!(res.status(), StatusCode::SERVICE_UNAVAILABLE);
        }

        #[tokio::test]
        async fn test_metrics_without_recorder() {
            let router = create_router(test_state());
            let res = router.oneshot(get_request("/metrics")).await.unwrap();
            assert_eq!(res.status(), StatusCode::SERVICE_UNAVAILABLE);
        }

        #[tokio::test]
        async fn test_post_requires_api_key() {
            let router = create_router(test_state());

            let res = router
                .oneshot(
                    Request::builder()
                        .method("POST")
                        .uri("/admin/initialize")
                        .body(Body::empty())
                        .unwrap(),
                )
                .await
                .unwrap();
            assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
        }

        #[tokio::test]
        async fn test_post_with_api_key() {
            let router = create_router(test_state());

            let res = router
                .oneshot(
                    Request::builder()
                        .method("POST")
                        .uri("/admin/initialize")
                        .header("x-api-key", "router-test-key")
                        .body(Body::empty())
                        .unwrap(),
                )
                .await
                .unwrap();
            assert_eq!(res.status(), StatusCode::OK);
        }

        #[tokio::test]
        async fn test_get_does_not_require_api_key() {
            let router = create_router(test_state());
            let res = router.oneshot(get_request("/products")).await.unwrap();
            assert_eq!(res.status(), StatusCode::OK);
        }

        #[tokio::test]
        async fn test_verify_with_address_requires_api_key() {
            use crate::domain::SupplyChainProgram;

            let program = Arc::new(MockProgram::new().with_wallet(Pubkey::new_from_array([1u8; 32])));
            let (address, _) = program
                .register_product("Widget", "Lagos", &Pubkey::new_from_array([2u8; 32]))
                .await
                .unwrap();
            let state = Arc::new(AppState::new(
                program.clone(),
                Arc::new(MockRegistry::new()),
                Arc::new(MockNotifier::new()),
                ServiceSettings::default(),
                SecretString::from("router-test-key"),
            ));
            let router = create_router(state);
            let uri = format!("/verify?address={}", address);

            for _ in 0..3 {
                let res = router.clone().oneshot(get_request(&uri)).await.unwrap();
                assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
            }
            assert!(program.verified().is_empty());

            let res = router
                .clone()
                .oneshot(
                    Request::builder()
                        .uri(&uri)
                        .header("x-api-key", "router-test-key")
                        .body(Body::empty())
                        .unwrap(),
                )
                .await
                .unwrap();
            assert_eq!(res.status(), StatusCode::OK);
            assert_eq!(program.verified(), vec![address]);

            let res = router.oneshot(get_request("/verify")).await.unwrap();
            assert_eq!(res.status(), StatusCode::OK);
        }

        #[tokio::test]
        async fn test_unknown_route() {
            let router = create_router(test_state());
            let res = router.oneshot(get_request("/items")).await.unwrap();
            assert_eq!(res.status(), StatusCode::NOT_FOUND);
        }

        #[tokio::test]
        async fn test_router_with_rate_limit_applies_limits() {
            let config = RateLimitConfig {
                general_rps: 1,
                general_burst: 1,
                health_rps: 100,
                health_burst: 100,
            };
            let router = create_router_with_rate_limit(test_state(), config);

            let res = router.clone().oneshot(get_request("/products")).await.unwrap();
            assert_eq!(res.status(), StatusCode::OK);

            let res = router.clone().oneshot(get_request("/products")).await.unwrap();
            assert_eq!(res.status(), StatusCode::TOO_MANY_REQUESTS);

            let res = router.oneshot(get_request("/health/live")).await.unwrap();
            assert_eq!(res.status(), StatusCode::OK);
        }
    }
}
