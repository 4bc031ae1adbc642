//! Vis4T API Gateway
//!
//! The HTTP entry point for the teacher dashboard frontend.
//! Handles:
//! - Teacher accounts and JWT authentication
//! - Class management and roster upload
//! - Signed Metabase dashboard links
//! - Observability (logging, metrics, request IDs)

mod handlers;
mod middleware;

use axum::{
    extract::{DefaultBodyLimit, FromRef, Request},
    routing::{get, post},
    Router, ServiceExt,
};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tower::{limit::ConcurrencyLimitLayer, Layer, ServiceBuilder};
use tower_http::{
    cors::{Any, CorsLayer},
    normalize_path::{NormalizePath, NormalizePathLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use vis4t_common::{
    auth::JwtManager,
    config::AppConfig,
    dashboard::DashboardSigner,
    db::DbPool,
    metrics,
};

/// Multipart framing on top of the file itself
const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub db: DbPool,
    pub jwt: Arc<JwtManager>,
    /// `None` when no embedding secret is configured
    pub dashboard: Option<Arc<DashboardSigner>>,
}

impl FromRef<AppState> for Arc<JwtManager> {
    fn from_ref(state: &AppState) -> Self {
        state.jwt.clone()
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Load configuration
    let config = AppConfig::load().map_err(|e| {
        eprintln!("Failed to load configuration: {}", e);
        e
    })?;

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.observability.log_level));
    if config.observability.json_logging {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    info!("Starting Vis4T API Gateway v{}", vis4t_common::VERSION);

    // Initialize metrics
    metrics::register_metrics();
    if config.observability.metrics_port != 0 {
        let metrics_addr = SocketAddr::from(([0, 0, 0, 0], config.observability.metrics_port));
        PrometheusBuilder::new()
            .set_buckets(metrics::LATENCY_BUCKETS)?
            .with_http_listener(metrics_addr)
            .install()?;
        info!("Metrics exporter listening on {}", metrics_addr);
    }

    // Initialize database connection
    let db = DbPool::new(&config.database).await?;
    if config.database.auto_migrate {
        db.create_schema().await?;
    }

    let jwt = JwtManager::new(
        config.jwt_secret()?,
        config.auth.access_expiration_secs,
        config.auth.refresh_expiration_secs,
    );

    let dashboard = match DashboardSigner::from_config(&config.dashboard) {
        Ok(signer) => Some(Arc::new(signer)),
        Err(e) => {
            warn!(error = %e, "Dashboard embedding disabled");
            None
        }
    };

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;

    // Create app state
    let state = AppState {
        config: Arc::new(config),
        db,
        jwt: Arc::new(jwt),
        dashboard,
    };

    let app = create_app(state);

    info!("Listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, ServiceExt::<Request>::into_make_service(app))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

/// Router wrapped so `/api/classes/` and `/api/classes` hit the same route
fn create_app(state: AppState) -> NormalizePath<Router> {
    NormalizePathLayer::trim_trailing_slash().layer(create_router(state))
}

/// Create the main application router
fn create_router(state: AppState) -> Router {
    let config = state.config.clone();

    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let upload_limit = config.server.max_upload_bytes + MULTIPART_OVERHEAD_BYTES;

    // API routes
    let mut api_routes = Router::new()
        // Health endpoints (no auth)
        .route("/health", get(handlers::health::health))
        .route("/ready", get(handlers::health::ready))

        // Account endpoints
        .route("/auth/register", post(handlers::auth::register))
        .route("/auth/login", post(handlers::auth::login))
        .route("/auth/logout", post(handlers::auth::logout))
        .route("/auth/refresh", post(handlers::auth::refresh))
        .route(
            "/user/profile",
            get(handlers::profile::get_profile).put(handlers::profile::update_profile),
        )

        // Class endpoints
        .route(
            "/classes",
            get(handlers::classes::list_classes).post(handlers::classes::create_class),
        )
        .route(
            "/classes/{class_name}",
            get(handlers::classes::get_class)
                .put(handlers::classes::update_class)
                .delete(handlers::classes::delete_class),
        )
        .route("/classes/{class_name}/students", get(handlers::classes::list_students))
        .route(
            "/classes/{class_name}/upload-students",
            post(handlers::upload::upload_students).layer(DefaultBodyLimit::max(upload_limit)),
        )

        // Dashboard endpoints
        .route("/classes/{class_name}/dashboard", get(handlers::dashboard::class_dashboard))
        .route("/students/{student_id}/dashboard", get(handlers::dashboard::student_dashboard))
        .route_layer(axum::middleware::from_fn(middleware::metrics::track_metrics));

    if config.rate_limit.enabled {
        let limit = config.rate_limit.requests_per_second;
        let limiter = middleware::rate_limit::create_rate_limiter(limit, config.rate_limit.burst);
        api_routes = api_routes.layer(axum::middleware::from_fn(move |request: Request, next: axum::middleware::Next| {
            middleware::rate_limit::rate_limit_middleware(request, next, limiter.clone(), limit)
        }));
    }

    // Compose the app
    Router::new()
        .nest("/api", api_routes)
        .layer(
            ServiceBuilder::new()
                // Request ID outermost
                .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                .layer(PropagateRequestIdLayer::x_request_id())
                .layer(TraceLayer::new_for_http())
                .layer(cors)
                // Request timeout
                .layer(TimeoutLayer::new(config.request_timeout()))
                // Concurrency limit for backpressure
                .layer(ConcurrencyLimitLayer::new(config.server.max_concurrent_requests.max(1))),
        )
        .with_state(state)
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, starting shutdown..."),
        _ = terminate => info!("Received SIGTERM, starting shutdown..."),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{header, StatusCode};
    use sea_orm::{Database, DatabaseConnection};
    use serde_json::Value;
    use tempfile::TempDir;
    use tower::ServiceExt as _;
    use vis4t_common::{
        auth::TokenKind,
        db::{NewClass, NewTeacher, Repository},
    };

    const BOUNDARY: &str = "vis4t-test-boundary";

    fn test_state() -> AppState {
        let mut config = AppConfig::default();
        config.rate_limit.enabled = false;

        AppState {
            config: Arc::new(config),
            db: DbPool::from_connection(DatabaseConnection::Disconnected),
            jwt: Arc::new(JwtManager::new("test-secret", 3600, 86400)),
            dashboard: None,
        }
    }

    /// SQLite-backed state with teacher `test` owning class `KHMT16A`
    async fn seeded_state() -> (TempDir, AppState) {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite://{}?mode=rwc", dir.path().join("vis4t.db").display());
        let db = DbPool::from_connection(Database::connect(url).await.unwrap());
        db.create_schema().await.unwrap();

        let repo = Repository::new(db.clone());
        for teacher_id in ["test", "other"] {
            repo.create_teacher(NewTeacher {
                teacher_id: teacher_id.to_string(),
                email: format!("{}@gmail.com", teacher_id),
                password_hash: String::new(),
                full_name: String::new(),
                phone: String::new(),
            })
            .await
            .unwrap();
        }
        repo.create_class(
            "test",
            NewClass {
                class_name: "KHMT16A".to_string(),
                number_of_student: 0,
                class_major: "Khoa Học Máy Tính".to_string(),
                teacher_note: String::new(),
                total_credit: 128,
                total_semester: 8,
            },
        )
        .await
        .unwrap();

        let mut config = AppConfig::default();
        config.rate_limit.enabled = false;
        config.server.upload_dir = dir.path().join("uploads");
        config.dashboard.secret_key = Some("a".repeat(64));

        let dashboard = DashboardSigner::from_config(&config.dashboard).unwrap();
        let state = AppState {
            config: Arc::new(config),
            db,
            jwt: Arc::new(JwtManager::new("test-secret", 3600, 86400)),
            dashboard: Some(Arc::new(dashboard)),
        };
        (dir, state)
    }

    async fn send_to(state: AppState, request: axum::http::Request<Body>) -> (StatusCode, Value) {
        let response = create_app(state).oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    async fn send(request: axum::http::Request<Body>) -> (StatusCode, Value) {
        send_to(test_state(), request).await
    }

    fn get(uri: &str) -> axum::http::Request<Body> {
        axum::http::Request::get(uri).body(Body::empty()).unwrap()
    }

    fn bearer(state: &AppState, teacher_id: &str) -> String {
        let token = state.jwt.generate_token(teacher_id, TokenKind::Access).unwrap();
        format!("Bearer {}", token)
    }

    fn roster_csv() -> String {
        let mut lines: Vec<String> = (0..9).map(|i| format!("banner {},,,", i)).collect();
        lines.push(
            "STT,Mã SV,Họ đệm,Tên,Ngày sinh,Lớp,Số TC đạt,Điểm TB 10,Điểm TB 4,Xếp loại chữ,Xếp loại,Ghi chú"
                .to_string(),
        );
        lines.push("1,22000001,Nguyễn Văn,An,01/02/2004,KHMT16A,120,8.1,3.5,B+,Giỏi,".to_string());
        lines.push("2,22000002,Trần Minh,Đức,11/12/2004,KHMT16A,118,7.2,3.0,B,Khá,".to_string());
        lines.push("Người lập bảng,,,".to_string());
        lines.push("Ký tên,,,".to_string());
        lines.join("\n")
    }

    fn upload_request(auth: &str, class_name: &str, file_name: &str, content: &str) -> axum::http::Request<Body> {
        let body = format!(
            "--{b}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{f}\"\r\nContent-Type: application/octet-stream\r\n\r\n{c}\r\n--{b}--\r\n",
            b = BOUNDARY,
            f = file_name,
            c = content
        );

        axum::http::Request::post(format!("/api/classes/{}/upload-students", class_name))
            .header(header::AUTHORIZATION, auth)
            .header(header::CONTENT_TYPE, format!("multipart/form-data; boundary={}", BOUNDARY))
            .body(Body::from(body))
            .unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let (status, body) = send(get("/api/health")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
    }

    #[tokio::test]
    async fn test_trailing_slash_tolerated() {
        let (status, _) = send(get("/api/health/")).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_ready_reports_database_down() {
        let (status, body) = send(get("/api/ready")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "not_ready");
        assert_eq!(body["checks"]["database"]["status"], "down");
    }

    #[tokio::test]
    async fn test_ready_reports_catalog_and_dashboard() {
        let (_dir, state) = seeded_state().await;
        let (status, body) = send_to(state, get("/api/ready")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ready");
        assert_eq!(body["checks"]["database"]["status"], "up");
        assert_eq!(body["checks"]["database"]["subjects"], 0);
        assert_eq!(body["checks"]["dashboard"], true);
    }

    #[tokio::test]
    async fn test_protected_routes_require_token() {
        let (status, _) = send(get("/api/classes")).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let request = axum::http::Request::get("/api/user/profile")
            .header(header::AUTHORIZATION, "Bearer not-a-token")
            .body(Body::empty())
            .unwrap();
        let (status, _) = send(request).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_login_validation() {
        let request = axum::http::Request::post("/api/auth/login")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(r#"{"username": "", "password": ""}"#))
            .unwrap();
        let (status, _) = send(request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_dashboard_unconfigured() {
        let state = test_state();
        let request = axum::http::Request::get("/api/classes/KHMT14A/dashboard")
            .header(header::AUTHORIZATION, bearer(&state, "test"))
            .body(Body::empty())
            .unwrap();
        let (status, _) = send_to(state, request).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_upload_then_reupload() {
        let (_dir, state) = seeded_state().await;
        let auth = bearer(&state, "test");

        let (status, body) =
            send_to(state.clone(), upload_request(&auth, "KHMT16A", "roster.csv", &roster_csv())).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["total"], 2);
        assert_eq!(body["created"], 2);
        assert_eq!(body["updated"], 0);
        assert_eq!(body["errors"].as_array().map(Vec::len), Some(0));

        let (status, body) =
            send_to(state.clone(), upload_request(&auth, "KHMT16A", "roster.csv", &roster_csv())).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["created"], 0);
        assert_eq!(body["updated"], 2);

        let request = axum::http::Request::get("/api/classes/KHMT16A/students")
            .header(header::AUTHORIZATION, auth.as_str())
            .body(Body::empty())
            .unwrap();
        let (status, body) = send_to(state.clone(), request).await;
        assert_eq!(status, StatusCode::OK);
        let students = body.as_array().unwrap();
        assert_eq!(students.len(), 2);
        assert!(students
            .iter()
            .any(|s| s["student_gmail"] == "duc.22000002@iuh.edu.vn"));

        let (status, body) = send_to(state, get_with("/api/classes/KHMT16A", &auth)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["number_of_student"], 2);
    }

    fn get_with(uri: &str, auth: &str) -> axum::http::Request<Body> {
        axum::http::Request::get(uri)
            .header(header::AUTHORIZATION, auth)
            .body(Body::empty())
            .unwrap()
    }

    #[tokio::test]
    async fn test_upload_rejections() {
        let (dir, state) = seeded_state().await;
        let owner = bearer(&state, "test");

        let request = upload_request(&bearer(&state, "other"), "KHMT16A", "roster.csv", &roster_csv());
        let (status, _) = send_to(state.clone(), request).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let request = upload_request(&owner, "KHMT99Z", "roster.csv", &roster_csv());
        let (status, _) = send_to(state.clone(), request).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let request = upload_request(&owner, "KHMT16A", "roster.pdf", &roster_csv());
        let (status, _) = send_to(state.clone(), request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let request = upload_request(&owner, "KHMT16A", "roster.csv", "banner,,,\nheader,,,");
        let (status, _) = send_to(state, request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        // Staged files never outlive the request
        let uploads = dir.path().join("uploads");
        let leftovers = std::fs::read_dir(&uploads).map(|d| d.count()).unwrap_or(0);
        assert_eq!(leftovers, 0);
    }

    #[tokio::test]
    async fn test_class_dashboard_url() {
        let (_dir, state) = seeded_state().await;
        let auth = bearer(&state, "test");

        let (status, body) = send_to(state.clone(), get_with("/api/classes/KHMT16A/dashboard", &auth)).await;
        assert_eq!(status, StatusCode::OK);
        let url = body["dashboard_url"].as_str().unwrap();
        assert!(url.contains("/embed/dashboard/"));

        let (status, _) = send_to(state, get_with("/api/students/22000001/dashboard", &auth)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
