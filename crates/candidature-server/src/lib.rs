pub mod db;
pub mod error;
pub mod mail;
pub mod notify;
pub mod routes;

use std::net::{IpAddr, SocketAddr};
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use axum::{
    body::Body,
    extract::{connect_info::ConnectInfo, DefaultBodyLimit, State},
    http::{
        header::{
            ACCEPT, CONTENT_TYPE, ORIGIN, REFERRER_POLICY, X_CONTENT_TYPE_OPTIONS,
            X_FRAME_OPTIONS,
        },
        HeaderName, HeaderValue, Method, Request, Uri,
    },
    middleware::{self, Next},
    response::Response,
    routing::{get, post},
    Router,
};
use candidature_config::{AppConfig, RateLimitConfig};
use governor::{
    clock::DefaultClock, middleware::NoOpMiddleware, state::keyed::DashMapStateStore, Quota,
    RateLimiter,
};
use tower_http::{
    cors::CorsLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    set_header::SetResponseHeaderLayer,
    trace::TraceLayer,
};

use db::Database;
use error::{ApiError, RequestContext};
use notify::Dispatcher;
use routes::{candidatures, health};

const REQUEST_ID_HEADER: &str = "x-request-id";

type IpRateLimiter = RateLimiter<IpAddr, DashMapStateStore<IpAddr>, DefaultClock, NoOpMiddleware>;

pub struct AppState {
    pub config: AppConfig,
    pub db: Database,
    pub notifier: Dispatcher,
    limiter: IpRateLimiter,
}

pub type SharedState = Arc<AppState>;

impl AppState {
    pub fn new(config: AppConfig, db: Database, notifier: Dispatcher) -> Result<Self> {
        let limiter = build_ip_limiter(&config.rate_limit)?;
        Ok(Self {
            config,
            db,
            notifier,
            limiter,
        })
    }

    pub fn prune_rate_limits(&self) {
        self.limiter.retain_recent();
    }
}

fn build_ip_limiter(config: &RateLimitConfig) -> Result<IpRateLimiter> {
    let burst = NonZeroU32::new(config.max_requests)
        .ok_or_else(|| anyhow!("rate limit max_requests must be positive"))?;
    let period = Duration::from_secs(config.window_seconds) / config.max_requests;
    let quota = Quota::with_period(period)
        .ok_or_else(|| anyhow!("rate limit window must be positive"))?
        .allow_burst(burst);
    Ok(RateLimiter::keyed(quota))
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let allowed = origins
        .iter()
        .filter_map(|origin| origin.parse::<HeaderValue>().ok())
        .collect::<Vec<_>>();

    CorsLayer::new()
        .allow_origin(allowed)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([ACCEPT, CONTENT_TYPE])
        .allow_credentials(true)
}

fn client_ip<B>(req: &Request<B>, trust_proxy: bool) -> Option<IpAddr> {
    if trust_proxy {
        let forwarded = req
            .headers()
            .get("x-forwarded-for")
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.split(',').next())
            .and_then(|first| first.trim().parse::<IpAddr>().ok());
        if forwarded.is_some() {
            return forwarded;
        }
    }
    req.extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|info| info.0.ip())
}

async fn rate_limit(
    State(state): State<SharedState>,
    req: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    if let Some(ip) = client_ip(&req, state.config.server.trust_proxy) {
        if state.limiter.check_key(&ip).is_err() {
            return Err(ApiError::RateLimited);
        }
    }
    Ok(next.run(req).await)
}

/// Requests without an `Origin` header are not cross-origin and pass.
async fn origin_guard(
    State(state): State<SharedState>,
    req: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    if let Some(origin) = req.headers().get(ORIGIN) {
        let origin = String::from_utf8_lossy(origin.as_bytes()).into_owned();
        if !state.config.cors.allows(&origin) {
            return Err(ApiError::OriginRejected(origin));
        }
    }
    Ok(next.run(req).await)
}

async fn attach_request_context(
    State(state): State<SharedState>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let context = RequestContext {
        request_id: req
            .headers()
            .get(REQUEST_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(|value| value.to_string()),
        diagnostics: state.config.server.environment.exposes_diagnostics(),
    };
    error::with_request_context(context, next.run(req)).await
}

async fn not_found(uri: Uri) -> ApiError {
    ApiError::NotFound(uri.path().to_string())
}

async fn method_not_allowed(method: Method) -> ApiError {
    ApiError::MethodNotAllowed(method.to_string())
}

// Path only; query strings carry candidate emails.
fn request_span(request: &Request<Body>) -> tracing::Span {
    let request_id = request
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("");

    tracing::info_span!(
        "http_request",
        method = %request.method(),
        path = %request.uri().path(),
        request_id = %request_id,
    )
}

pub fn create_router(state: SharedState) -> Router {
    let cors = cors_layer(&state.config.cors.origins);

    let request_id_header = HeaderName::from_static(REQUEST_ID_HEADER);
    let trace = TraceLayer::new_for_http().make_span_with(request_span);

    Router::new()
        .route("/health", get(health::health))
        .route("/api/candidatures", post(candidatures::submit))
        .route("/api/candidatures/exists", get(candidatures::exists))
        .route("/api/candidatures/health", get(health::health))
        .method_not_allowed_fallback(method_not_allowed)
        .fallback(not_found)
        .layer(middleware::from_fn_with_state(state.clone(), rate_limit))
        .layer(DefaultBodyLimit::max(state.config.server.body_limit_bytes))
        .layer(cors)
        .layer(middleware::from_fn_with_state(state.clone(), origin_guard))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            attach_request_context,
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            X_FRAME_OPTIONS,
            HeaderValue::from_static("SAMEORIGIN"),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            REFERRER_POLICY,
            HeaderValue::from_static("no-referrer"),
        ))
        .layer(trace)
        .layer(PropagateRequestIdLayer::new(request_id_header.clone()))
        .layer(SetRequestIdLayer::new(
            request_id_header,
            MakeRequestUuid,
        ))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use tower::ServiceExt;

    #[test]
    fn forwarded_for_is_only_read_behind_a_proxy() {
        let req = Request::builder()
            .uri("/")
            .header("x-forwarded-for", "203.0.113.7, 10.0.0.1")
            .body(Body::empty())
            .unwrap();
        assert_eq!(
            client_ip(&req, true),
            Some("203.0.113.7".parse().unwrap())
        );
        assert_eq!(client_ip(&req, false), None);
    }

    #[test]
    fn socket_address_is_the_fallback() {
        let mut req = Request::builder()
            .uri("/")
            .header("x-forwarded-for", "garbage")
            .body(Body::empty())
            .unwrap();
        req.extensions_mut()
            .insert(ConnectInfo(SocketAddr::from(([192, 0, 2, 1], 4000))));
        assert_eq!(
            client_ip(&req, true),
            Some("192.0.2.1".parse().unwrap())
        );
    }

    #[test]
    fn limiter_allows_a_burst_of_max_requests() {
        let limiter = build_ip_limiter(&RateLimitConfig {
            window_seconds: 900,
            max_requests: 3,
        })
        .unwrap();
        let ip: IpAddr = "198.51.100.4".parse().unwrap();
        for _ in 0..3 {
            assert!(limiter.check_key(&ip).is_ok());
        }
        assert!(limiter.check_key(&ip).is_err());

        let other: IpAddr = "198.51.100.5".parse().unwrap();
        assert!(limiter.check_key(&other).is_ok());
    }

    #[derive(Clone, Default)]
    struct CapturedLogs(Arc<std::sync::Mutex<Vec<u8>>>);

    impl std::io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn request_span_omits_the_query_string() {
        let logs = CapturedLogs::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();

        let req = Request::builder()
            .uri("/api/candidatures/exists?email=estelle@example.cm")
            .header(REQUEST_ID_HEADER, "req-42")
            .body(Body::empty())
            .unwrap();
        tracing::subscriber::with_default(subscriber, || {
            let span = request_span(&req);
            let _entered = span.enter();
            tracing::info!("handled");
        });

        let output = String::from_utf8(logs.0.lock().unwrap().clone()).unwrap();
        assert!(output.contains("path=/api/candidatures/exists"), "{output}");
        assert!(output.contains("req-42"), "{output}");
        assert!(!output.contains("estelle"), "{output}");
    }

    #[tokio::test]
    async fn request_id_is_set_when_missing() {
        let app = Router::new()
            .route("/", get(|| async { "ok" }))
            .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
                REQUEST_ID_HEADER,
            )))
            .layer(SetRequestIdLayer::new(
                HeaderName::from_static(REQUEST_ID_HEADER),
                MakeRequestUuid,
            ));

        let response = app
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key(REQUEST_ID_HEADER));
    }
}
