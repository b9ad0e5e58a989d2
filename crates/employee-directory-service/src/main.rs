use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post, put};
use axum::{Json, Router};
use clap::Parser;
use employee_directory_api::{
    ApiError, AppConfig, DashboardView, DetailView, DirectoryApi, DirectoryView, FeedId,
    FeedView, RandomEmployeeView, SessionId, API_CONTRACT_VERSION,
};
use employee_directory_core::{
    Clock, DirectoryError, EmployeeFilter, EmployeeId, EmployeePatch, Preferences, RecordSource,
};
use employee_directory_source::HttpRecordSource;
use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;

const SERVICE_CONTRACT_VERSION: &str = "service.v1";

struct ServiceState<S, C> {
    api: Arc<DirectoryApi<S, C>>,
}

impl<S, C> Clone for ServiceState<S, C> {
    fn clone(&self) -> Self {
        Self { api: Arc::clone(&self.api) }
    }
}

#[derive(Debug, Clone, Serialize)]
struct ServiceEnvelope<T>
where
    T: Serialize,
{
    service_contract_version: &'static str,
    api_contract_version: &'static str,
    data: T,
}

#[derive(Debug, Clone, Serialize)]
struct ServiceError {
    #[serde(skip)]
    status: StatusCode,
    service_contract_version: &'static str,
    error: String,
    notice: String,
}

#[derive(Debug, Clone, Serialize)]
struct HealthResponse {
    status: &'static str,
}

#[derive(Debug, Clone, Serialize)]
struct ClosedResponse {
    closed: String,
}

#[derive(Debug, Clone, Deserialize)]
struct LoginRequest {
    name: String,
}

#[derive(Debug, Clone, Deserialize)]
struct DepartmentRequest {
    #[serde(default)]
    department: Option<String>,
}

#[derive(Debug, Parser)]
#[command(name = "employee-directory-service")]
#[command(about = "Local HTTP service for the employee directory")]
struct Args {
    /// JSON config file; flags below override it
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long)]
    base_url: Option<String>,
    #[arg(long)]
    timeout_secs: Option<u64>,
    #[arg(long, default_value = "127.0.0.1:4020")]
    bind: SocketAddr,
    /// Serve every detail view on demand instead of materializing the leading ids first
    #[arg(long)]
    skip_prebuild: bool,
}

fn status_for(err: &ApiError) -> StatusCode {
    match err {
        ApiError::UnknownSession(_)
        | ApiError::UnknownFeed(_)
        | ApiError::Directory(DirectoryError::NotFound(_)) => StatusCode::NOT_FOUND,
        ApiError::Directory(DirectoryError::Transport(_)) => StatusCode::BAD_GATEWAY,
        ApiError::Directory(DirectoryError::InvalidPatch(_)) => StatusCode::UNPROCESSABLE_ENTITY,
        ApiError::Directory(DirectoryError::StaleResponseDiscarded) => StatusCode::GONE,
        ApiError::Directory(DirectoryError::EmptyCategoryList) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl From<ApiError> for ServiceError {
    fn from(err: ApiError) -> Self {
        Self {
            status: status_for(&err),
            service_contract_version: SERVICE_CONTRACT_VERSION,
            error: err.to_string(),
            notice: err.notice(),
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        (self.status, Json(self)).into_response()
    }
}

fn envelope<T>(data: T) -> ServiceEnvelope<T>
where
    T: Serialize,
{
    ServiceEnvelope {
        service_contract_version: SERVICE_CONTRACT_VERSION,
        api_contract_version: API_CONTRACT_VERSION,
        data,
    }
}

type Reply<T> = Result<Json<ServiceEnvelope<T>>, ServiceError>;

fn app<S, C>(state: ServiceState<S, C>) -> Router
where
    S: RecordSource + 'static,
    C: Clock + 'static,
{
    Router::new()
        .route("/v1/health", get(health))
        .route("/v1/dashboard", get(dashboard::<S, C>))
        .route("/v1/dashboard/employee-of-the-day", get(employee_of_the_day::<S, C>))
        .route("/v1/feeds", post(open_feed::<S, C>))
        .route("/v1/feeds/:feed_id", get(feed::<S, C>).delete(close_feed::<S, C>))
        .route("/v1/feeds/:feed_id/more", post(load_more::<S, C>))
        .route("/v1/employees", get(directory::<S, C>))
        .route("/v1/employees/:id/sessions", post(open_detail::<S, C>))
        .route(
            "/v1/sessions/:session_id",
            get(detail::<S, C>).patch(patch_detail::<S, C>).delete(close_detail::<S, C>),
        )
        .route("/v1/sessions/:session_id/employee", delete(delete_employee::<S, C>))
        .route("/v1/preferences", get(preferences::<S, C>))
        .route("/v1/preferences/theme/toggle", post(toggle_theme::<S, C>))
        .route("/v1/preferences/login", post(login::<S, C>))
        .route("/v1/preferences/logout", post(logout::<S, C>))
        .route("/v1/preferences/department", put(select_department::<S, C>))
        .with_state(state)
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();

    let args = Args::parse();
    let mut config = AppConfig::load(args.config.as_deref())?;
    if let Some(base_url) = args.base_url {
        config.source.base_url = base_url;
    }
    if let Some(timeout_secs) = args.timeout_secs {
        config.source.timeout_secs = timeout_secs;
    }

    let source = HttpRecordSource::with_config(config.source.clone())
        .context("failed to build record source")?;
    let api = Arc::new(DirectoryApi::new(source, config.directory));
    if !args.skip_prebuild {
        if let Err(err) = api.prebuild().await {
            tracing::warn!(error = %err, "prebuild failed; details will be fetched on demand");
        }
    }

    let listener = tokio::net::TcpListener::bind(args.bind)
        .await
        .with_context(|| format!("failed to bind {}", args.bind))?;
    tracing::info!(bind = %args.bind, upstream = %config.source.base_url, "serving");
    axum::serve(listener, app(ServiceState { api })).await?;
    Ok(())
}

async fn health() -> Json<ServiceEnvelope<HealthResponse>> {
    Json(envelope(HealthResponse { status: "ok" }))
}

async fn dashboard<S: RecordSource, C: Clock>(
    State(state): State<ServiceState<S, C>>,
) -> Reply<DashboardView> {
    Ok(Json(envelope(state.api.dashboard().await?)))
}

async fn employee_of_the_day<S: RecordSource, C: Clock>(
    State(state): State<ServiceState<S, C>>,
) -> Json<ServiceEnvelope<RandomEmployeeView>> {
    Json(envelope(state.api.employee_of_the_day().await))
}

async fn open_feed<S: RecordSource, C: Clock>(
    State(state): State<ServiceState<S, C>>,
) -> (StatusCode, Json<ServiceEnvelope<FeedView>>) {
    (StatusCode::CREATED, Json(envelope(state.api.open_feed().await)))
}

async fn feed<S: RecordSource, C: Clock>(
    State(state): State<ServiceState<S, C>>,
    Path(feed_id): Path<FeedId>,
) -> Reply<FeedView> {
    Ok(Json(envelope(state.api.feed(feed_id)?)))
}

async fn load_more<S: RecordSource, C: Clock>(
    State(state): State<ServiceState<S, C>>,
    Path(feed_id): Path<FeedId>,
) -> Reply<FeedView> {
    Ok(Json(envelope(state.api.load_more(feed_id).await?)))
}

async fn close_feed<S: RecordSource, C: Clock>(
    State(state): State<ServiceState<S, C>>,
    Path(feed_id): Path<FeedId>,
) -> Reply<ClosedResponse> {
    state.api.close_feed(feed_id)?;
    Ok(Json(envelope(ClosedResponse { closed: feed_id.to_string() })))
}

async fn directory<S: RecordSource, C: Clock>(
    State(state): State<ServiceState<S, C>>,
    Query(filter): Query<EmployeeFilter>,
) -> Json<ServiceEnvelope<DirectoryView>> {
    Json(envelope(state.api.directory(filter).await))
}

async fn open_detail<S: RecordSource, C: Clock>(
    State(state): State<ServiceState<S, C>>,
    Path(id): Path<u64>,
) -> Result<(StatusCode, Json<ServiceEnvelope<DetailView>>), ServiceError> {
    let view = state.api.open_detail(EmployeeId(id)).await?;
    Ok((StatusCode::CREATED, Json(envelope(view))))
}

async fn detail<S: RecordSource, C: Clock>(
    State(state): State<ServiceState<S, C>>,
    Path(session_id): Path<SessionId>,
) -> Reply<DetailView> {
    Ok(Json(envelope(state.api.detail(session_id)?)))
}

async fn patch_detail<S: RecordSource, C: Clock>(
    State(state): State<ServiceState<S, C>>,
    Path(session_id): Path<SessionId>,
    Json(patch): Json<EmployeePatch>,
) -> Reply<DetailView> {
    Ok(Json(envelope(state.api.patch_detail(session_id, patch)?)))
}

async fn delete_employee<S: RecordSource, C: Clock>(
    State(state): State<ServiceState<S, C>>,
    Path(session_id): Path<SessionId>,
) -> Reply<DetailView> {
    Ok(Json(envelope(state.api.delete_detail(session_id)?)))
}

async fn close_detail<S: RecordSource, C: Clock>(
    State(state): State<ServiceState<S, C>>,
    Path(session_id): Path<SessionId>,
) -> Reply<ClosedResponse> {
    state.api.close_detail(session_id)?;
    Ok(Json(envelope(ClosedResponse { closed: session_id.to_string() })))
}

async fn preferences<S: RecordSource, C: Clock>(
    State(state): State<ServiceState<S, C>>,
) -> Json<ServiceEnvelope<Preferences>> {
    Json(envelope(state.api.preferences()))
}

async fn toggle_theme<S: RecordSource, C: Clock>(
    State(state): State<ServiceState<S, C>>,
) -> Json<ServiceEnvelope<Preferences>> {
    Json(envelope(state.api.toggle_theme()))
}

async fn login<S: RecordSource, C: Clock>(
    State(state): State<ServiceState<S, C>>,
    Json(request): Json<LoginRequest>,
) -> Json<ServiceEnvelope<Preferences>> {
    Json(envelope(state.api.login(&request.name)))
}

async fn logout<S: RecordSource, C: Clock>(
    State(state): State<ServiceState<S, C>>,
) -> Json<ServiceEnvelope<Preferences>> {
    Json(envelope(state.api.logout()))
}

async fn select_department<S: RecordSource, C: Clock>(
    State(state): State<ServiceState<S, C>>,
    Json(request): Json<DepartmentRequest>,
) -> Json<ServiceEnvelope<Preferences>> {
    Json(envelope(state.api.select_department(request.department)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use employee_directory_api::DirectoryConfig;
    use employee_directory_core::InMemorySource;
    use http::{Method, Request};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    fn test_state(count: u64) -> ServiceState<InMemorySource, employee_directory_core::SystemClock> {
        let api = DirectoryApi::new(
            InMemorySource::with_sample_employees(count),
            DirectoryConfig::default(),
        );
        ServiceState { api: Arc::new(api) }
    }

    async fn send(router: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder().uri(uri).method(method);
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string())),
            None => builder.body(Body::empty()),
        }
        .unwrap_or_else(|err| panic!("failed to build request: {err}"));

        let response = match router.clone().oneshot(request).await {
            Ok(response) => response,
            Err(err) => panic!("router request failed: {err}"),
        };
        let status = response.status();
        let bytes = match to_bytes(response.into_body(), 1024 * 1024).await {
            Ok(bytes) => bytes,
            Err(err) => panic!("failed to read response body: {err}"),
        };
        let value = match serde_json::from_slice(&bytes) {
            Ok(value) => value,
            Err(err) => panic!("response body is not JSON: {err}"),
        };
        (status, value)
    }

    fn str_at<'a>(value: &'a Value, pointer: &str) -> &'a str {
        value
            .pointer(pointer)
            .and_then(Value::as_str)
            .unwrap_or_else(|| panic!("missing string at `{pointer}` in payload: {value}"))
    }

    #[tokio::test]
    async fn health_endpoint_reports_ok() {
        let router = app(test_state(1));
        let (status, value) = send(&router, Method::GET, "/v1/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(str_at(&value, "/service_contract_version"), SERVICE_CONTRACT_VERSION);
        assert_eq!(str_at(&value, "/api_contract_version"), API_CONTRACT_VERSION);
        assert_eq!(str_at(&value, "/data/status"), "ok");
    }

    #[tokio::test]
    async fn dashboard_is_enveloped() {
        let router = app(test_state(25));
        let (status, value) = send(&router, Method::GET, "/v1/dashboard", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(value.pointer("/data/total_employees").and_then(Value::as_u64), Some(25));
        assert_eq!(str_at(&value, "/data/departments/origin"), "dashboard_snapshot");
    }

    #[tokio::test]
    async fn upstream_failure_maps_to_bad_gateway() {
        let state = test_state(5);
        state.api.source().fail_next(1);
        let router = app(state);

        let (status, value) = send(&router, Method::GET, "/v1/dashboard", None).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert!(!str_at(&value, "/notice").is_empty());
    }

    #[tokio::test]
    async fn unknown_employee_maps_to_not_found() {
        let router = app(test_state(5));
        let (status, value) = send(&router, Method::POST, "/v1/employees/404/sessions", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(str_at(&value, "/notice"), "Employee 404 was not found.");
    }

    #[tokio::test]
    async fn detail_session_edits_and_closes() {
        let router = app(test_state(5));
        let (status, opened) = send(&router, Method::POST, "/v1/employees/1/sessions", None).await;
        assert_eq!(status, StatusCode::CREATED);
        let session = format!("/v1/sessions/{}", str_at(&opened, "/data/session_id"));

        let (status, patched) =
            send(&router, Method::PATCH, &session, Some(json!({ "phone": "999" }))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(str_at(&patched, "/data/employee/phone"), "999");
        assert_eq!(str_at(&patched, "/data/overlay/state"), "patched");

        let (status, _) =
            send(&router, Method::PATCH, &session, Some(json!({ "email": "nope" }))).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

        let (status, deleted) =
            send(&router, Method::DELETE, &format!("{session}/employee"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(deleted.pointer("/data/employee"), Some(&Value::Null));

        let (status, _) = send(&router, Method::DELETE, &session, None).await;
        assert_eq!(status, StatusCode::OK);
        let (status, _) = send(&router, Method::GET, &session, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (_, reopened) = send(&router, Method::POST, "/v1/employees/1/sessions", None).await;
        assert_eq!(str_at(&reopened, "/data/overlay/state"), "unchanged");
    }

    #[tokio::test]
    async fn feed_pages_through_the_listing() {
        let router = app(test_state(25));
        let (status, opened) = send(&router, Method::POST, "/v1/feeds", None).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(opened.pointer("/data/loaded").and_then(Value::as_u64), Some(10));
        let more = format!("/v1/feeds/{}/more", str_at(&opened, "/data/feed_id"));

        let (_, _) = send(&router, Method::POST, &more, None).await;
        let (status, last) = send(&router, Method::POST, &more, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(last.pointer("/data/loaded").and_then(Value::as_u64), Some(25));
        assert_eq!(last.pointer("/data/has_more").and_then(Value::as_bool), Some(false));

        let feed = format!("/v1/feeds/{}", str_at(&opened, "/data/feed_id"));
        let (status, _) = send(&router, Method::DELETE, &feed, None).await;
        assert_eq!(status, StatusCode::OK);
        let (status, _) = send(&router, Method::POST, &more, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn directory_uses_query_filter_and_preferred_department() {
        let router = app(test_state(10));
        let (status, value) =
            send(&router, Method::GET, "/v1/employees?department=Legal", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(value.pointer("/data/employees").and_then(Value::as_array).map(Vec::len), Some(2));

        let (status, _) = send(
            &router,
            Method::PUT,
            "/v1/preferences/department",
            Some(json!({ "department": "Support" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let (_, value) = send(&router, Method::GET, "/v1/employees?search=first1", None).await;
        let ids: Vec<u64> = value
            .pointer("/data/employees")
            .and_then(Value::as_array)
            .map(|employees| {
                employees.iter().filter_map(|employee| employee.get("id").and_then(Value::as_u64)).collect()
            })
            .unwrap_or_default();
        assert_eq!(ids, vec![1]);
    }

    #[tokio::test]
    async fn preferences_toggle_and_login() {
        let router = app(test_state(1));
        let (_, toggled) = send(&router, Method::POST, "/v1/preferences/theme/toggle", None).await;
        assert_eq!(str_at(&toggled, "/data/theme"), "dark");

        let (_, logged_in) =
            send(&router, Method::POST, "/v1/preferences/login", Some(json!({ "name": "Ada" }))).await;
        assert_eq!(str_at(&logged_in, "/data/user_name"), "Ada");

        let (_, logged_out) = send(&router, Method::POST, "/v1/preferences/logout", None).await;
        assert_eq!(str_at(&logged_out, "/data/user_name"), "Guest");
        assert_eq!(str_at(&logged_out, "/data/theme"), "dark");
    }
}
