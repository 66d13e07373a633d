//! # API REST
//!
//! REST API implementation for the story service.
//!
//! Handles:
//! - HTTP endpoints with axum
//! - OpenAPI documentation
//! - REST-specific concerns (JSON serialization, CORS, status codes)
//!
//! Uses `api-shared` for wire types and `story-core` for all story logic.

#![warn(rust_2018_idioms)]

use axum::{
    async_trait,
    body::Bytes,
    extract::{FromRequest, Path, Request, State},
    http::{header, StatusCode},
    response::Json,
    routing::{get, post},
    Form, Router,
};
use chrono::NaiveDate;
use tower_http::cors::CorsLayer;
use utoipa::OpenApi;

use story_api_shared::{
    AuthorsRes, DataReq, DataRes, ErrorRes, HealthRes, HealthService, PingRes, StoryRes,
};
use story_core::constants::DATE_FORMAT;
use story_core::{parse_date, AuthorRecord, StoryError, StoryService};

type ApiError = (StatusCode, Json<ErrorRes>);

/// Application state shared across REST API handlers
///
/// Holds the story service, which owns the store and relay for the life of the process.
#[derive(Clone)]
pub struct AppState {
    pub story_service: StoryService,
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health,
        get_story,
        get_story_on,
        get_authors,
        get_authors_on,
        post_data,
        ping
    ),
    components(schemas(
        HealthRes,
        StoryRes,
        AuthorsRes,
        DataReq,
        DataRes,
        PingRes,
        ErrorRes
    ))
)]
pub struct ApiDoc;

/// Builds the REST router with permissive CORS, matching what the browser client expects.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/story", get(get_story))
        .route("/story/:date", get(get_story_on))
        .route("/authors", get(get_authors))
        .route("/authors/:date", get(get_authors_on))
        .route("/data", post(post_data))
        .route("/ping", get(ping))
        .route("/api-docs/openapi.json", get(openapi))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

fn error(status: StatusCode, message: impl Into<String>) -> ApiError {
    (status, Json(ErrorRes::new(message)))
}

fn date_param(value: &str) -> Result<NaiveDate, ApiError> {
    parse_date(value).map_err(|e| {
        tracing::info!("Bad date parameter: {}", e);
        error(StatusCode::BAD_REQUEST, "Invalid date (expected YYYY-MM-DD)")
    })
}

/// Body of `POST /data`, accepted as JSON or as an urlencoded form.
///
/// An empty body parses as a request with no fields, so it is reported as a missing word.
/// Malformed bodies are rejected with a 400 `ErrorRes` rather than axum's plain-text rejection.
struct DataBody(DataReq);

#[async_trait]
impl<S> FromRequest<S> for DataBody
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let is_form = req
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .is_some_and(|value| value.starts_with("application/x-www-form-urlencoded"));

        if is_form {
            let Form(body) = Form::<DataReq>::from_request(req, state)
                .await
                .map_err(|e| bad_body(e.body_text()))?;
            return Ok(Self(body));
        }

        let bytes = Bytes::from_request(req, state)
            .await
            .map_err(|e| bad_body(e.body_text()))?;
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Self(DataReq::default()));
        }

        let Json(body) =
            Json::<DataReq>::from_bytes(&bytes).map_err(|e| bad_body(e.body_text()))?;
        Ok(Self(body))
    }
}

fn bad_body(detail: String) -> ApiError {
    tracing::info!("Rejected contribution body: {}", detail);
    error(StatusCode::BAD_REQUEST, "Invalid contribution body")
}

fn authors_res(record: AuthorRecord) -> AuthorsRes {
    AuthorsRes {
        date: record.date.format(DATE_FORMAT).to_string(),
        names: record.names,
    }
}

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Health check response", body = HealthRes)
    )
)]
/// Health check endpoint for the REST API
async fn health() -> Json<HealthRes> {
    Json(HealthService::check_health())
}

async fn openapi() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

#[utoipa::path(
    get,
    path = "/story",
    responses(
        (status = 200, description = "Today's story", body = StoryRes),
        (status = 500, description = "Failed to read story", body = ErrorRes)
    )
)]
/// Returns the trimmed text of today's story.
///
/// The first request of a new day creates that day's document, seeded with the opening line
/// for its weekday.
#[axum::debug_handler]
async fn get_story(State(state): State<AppState>) -> Result<Json<StoryRes>, ApiError> {
    match state.story_service.current_story() {
        Ok(story) => Ok(Json(StoryRes { story })),
        Err(e) => {
            tracing::error!("Read story error: {:?}", e);
            Err(error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to read story",
            ))
        }
    }
}

#[utoipa::path(
    get,
    path = "/story/{date}",
    params(("date" = String, Path, description = "Calendar date, YYYY-MM-DD")),
    responses(
        (status = 200, description = "Story for the date", body = StoryRes),
        (status = 400, description = "Invalid date", body = ErrorRes),
        (status = 404, description = "No story on record for the date", body = ErrorRes),
        (status = 500, description = "Failed to read story", body = ErrorRes)
    )
)]
/// Returns the story for an explicit date, including days that have rotated out.
#[axum::debug_handler]
async fn get_story_on(
    State(state): State<AppState>,
    Path(date): Path<String>,
) -> Result<Json<StoryRes>, ApiError> {
    let date = date_param(&date)?;
    match state.story_service.story_on(date) {
        Ok(Some(story)) => Ok(Json(StoryRes { story })),
        Ok(None) => Err(error(StatusCode::NOT_FOUND, "No story for that date")),
        Err(e) => {
            tracing::error!("Read story error: {:?}", e);
            Err(error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to read story",
            ))
        }
    }
}

#[utoipa::path(
    get,
    path = "/authors",
    responses(
        (status = 200, description = "Today's author ledger", body = AuthorsRes),
        (status = 500, description = "Failed to read authors", body = ErrorRes)
    )
)]
#[axum::debug_handler]
async fn get_authors(State(state): State<AppState>) -> Result<Json<AuthorsRes>, ApiError> {
    match state.story_service.current_authors() {
        Ok(record) => Ok(Json(authors_res(record))),
        Err(e) => {
            tracing::error!("Read authors error: {:?}", e);
            Err(error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to read authors",
            ))
        }
    }
}

#[utoipa::path(
    get,
    path = "/authors/{date}",
    params(("date" = String, Path, description = "Calendar date, YYYY-MM-DD")),
    responses(
        (status = 200, description = "Author ledger for the date", body = AuthorsRes),
        (status = 400, description = "Invalid date", body = ErrorRes),
        (status = 404, description = "No authors on record for the date", body = ErrorRes),
        (status = 500, description = "Failed to read authors", body = ErrorRes)
    )
)]
#[axum::debug_handler]
async fn get_authors_on(
    State(state): State<AppState>,
    Path(date): Path<String>,
) -> Result<Json<AuthorsRes>, ApiError> {
    let date = date_param(&date)?;
    match state.story_service.authors_on(date) {
        Ok(Some(record)) => Ok(Json(authors_res(record))),
        Ok(None) => Err(error(StatusCode::NOT_FOUND, "No authors for that date")),
        Err(e) => {
            tracing::error!("Read authors error: {:?}", e);
            Err(error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to read authors",
            ))
        }
    }
}

#[utoipa::path(
    post,
    path = "/data",
    request_body(
        content = DataReq,
        content_type = "application/json",
        description = "Also accepted as application/x-www-form-urlencoded"
    ),
    responses(
        (status = 200, description = "Contribution added to the story", body = DataRes),
        (status = 400, description = "Missing or invalid contribution", body = ErrorRes),
        (status = 500, description = "Storage failure, or relay failure when relay failures are fatal", body = ErrorRes)
    )
)]
/// Adds a contribution to today's story and relays it to the visualisation consumer.
///
/// A relay failure never removes the contribution. Depending on configuration it is either
/// reported in `relayWarning` on a successful response, or as a 500 that still carries the
/// committed story.
#[axum::debug_handler]
async fn post_data(
    State(state): State<AppState>,
    DataBody(req): DataBody,
) -> Result<Json<DataRes>, ApiError> {
    let Some(word) = req.word else {
        return Err(error(StatusCode::BAD_REQUEST, "No word provided"));
    };

    match state
        .story_service
        .submit(
            &word,
            req.name.as_deref().unwrap_or_default(),
            req.color.as_deref().unwrap_or_default(),
        )
        .await
    {
        Ok(submission) => Ok(Json(DataRes {
            success: true,
            message: match submission.relay_warning {
                None => "Contribution added and relayed".into(),
                Some(_) => "Contribution added; relay failed".into(),
            },
            story: submission.story,
            relay_warning: submission.relay_warning,
        })),
        Err(StoryError::Validation(e)) => Err(error(StatusCode::BAD_REQUEST, e.to_string())),
        Err(StoryError::RelayFailed { story, source }) => {
            tracing::error!("Relay error after commit: {:?}", source);
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorRes {
                    error: "Failed to relay contribution".into(),
                    story: Some(story),
                }),
            ))
        }
        Err(e) => {
            tracing::error!("Submit contribution error: {:?}", e);
            Err(error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to save contribution",
            ))
        }
    }
}

#[utoipa::path(
    get,
    path = "/ping",
    responses(
        (status = 200, description = "Ping sent", body = PingRes),
        (status = 500, description = "Ping failed", body = PingRes)
    )
)]
/// Sends a diagnostic datagram to the visualisation consumer.
#[axum::debug_handler]
async fn ping(State(state): State<AppState>) -> (StatusCode, Json<PingRes>) {
    match state.story_service.ping().await {
        Ok(()) => (
            StatusCode::OK,
            Json(PingRes {
                success: true,
                message: "Ping sent".into(),
            }),
        ),
        Err(e) => {
            tracing::error!("Ping error: {:?}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(PingRes {
                    success: false,
                    message: "Failed to ping visualisation consumer".into(),
                }),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{header, Request};
    use std::net::{Ipv4Addr, SocketAddr};
    use std::path::PathBuf;
    use std::sync::Arc;
    use std::time::Duration;
    use story_core::constants::RECURRING_OPENING_LINE;
    use story_core::{CoreConfig, EventRelay, FixedClock, RelayFailurePolicy, StoryStore};
    use tempfile::TempDir;
    use tokio::net::UdpSocket;
    use tower::ServiceExt;

    fn sunday() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 2).expect("valid date")
    }

    fn unreachable_target() -> SocketAddr {
        (Ipv4Addr::BROADCAST, 9).into()
    }

    async fn test_app(
        temp_dir: &TempDir,
        policy: RelayFailurePolicy,
        target: SocketAddr,
    ) -> (Router, Arc<FixedClock>) {
        let cfg = Arc::new(
            CoreConfig::new(temp_dir.path().join("story_data"))
                .expect("valid config")
                .with_relay_failure_policy(policy),
        );
        let store = Arc::new(StoryStore::open(cfg.clone()).expect("open store"));
        let relay = Arc::new(EventRelay::bind(target, true).await.expect("bind relay"));
        let clock = Arc::new(FixedClock::new(sunday()));
        let story_service = StoryService::new(cfg, store, relay, clock.clone());
        (router(AppState { story_service }), clock)
    }

    async fn send(app: &Router, request: Request<Body>) -> (StatusCode, serde_json::Value) {
        let response = app.clone().oneshot(request).await.expect("request");
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body");
        let json = serde_json::from_slice(&bytes).expect("json body");
        (status, json)
    }

    async fn recv_json(receiver: &UdpSocket) -> serde_json::Value {
        let mut buf = [0u8; 4096];
        let (len, _) = tokio::time::timeout(Duration::from_secs(5), receiver.recv_from(&mut buf))
            .await
            .expect("datagram should arrive")
            .expect("recv_from");
        serde_json::from_slice(&buf[..len]).expect("payload is JSON")
    }

    fn story_path(temp_dir: &TempDir) -> PathBuf {
        temp_dir.path().join("story_data").join("story-2024-06-02.txt")
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder()
            .uri(uri)
            .body(Body::empty())
            .expect("request")
    }

    fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .expect("request")
    }

    #[tokio::test]
    async fn test_get_story_returns_seeded_opening_line() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let (app, _clock) =
            test_app(&temp_dir, RelayFailurePolicy::Warn, unreachable_target()).await;

        let (status, json) = send(&app, get("/story")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["story"], RECURRING_OPENING_LINE);
    }

    #[tokio::test]
    async fn test_post_data_appends_and_relays() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let receiver = UdpSocket::bind("127.0.0.1:0").await.expect("bind receiver");
        let (app, _clock) = test_app(
            &temp_dir,
            RelayFailurePolicy::Warn,
            receiver.local_addr().expect("local addr"),
        )
        .await;

        let (status, json) = send(
            &app,
            post_json(
                "/data",
                serde_json::json!({"word": "Hello World", "name": "ann", "color": "(30,86,195)"}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["success"], true);
        assert!(json["story"]
            .as_str()
            .expect("story string")
            .ends_with("hello world"));
        assert!(json.get("relayWarning").is_none());

        let datagram = recv_json(&receiver).await;
        assert_eq!(datagram["name"], "ANN");

        let (_, authors) = send(&app, get("/authors")).await;
        assert_eq!(authors["date"], "2024-06-02");
        assert_eq!(authors["names"], serde_json::json!(["ANN"]));
    }

    #[tokio::test]
    async fn test_post_data_rejects_missing_and_invalid_words() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let (app, _clock) =
            test_app(&temp_dir, RelayFailurePolicy::Warn, unreachable_target()).await;

        let (status, json) =
            send(&app, post_json("/data", serde_json::json!({"name": "ann"}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"], "No word provided");

        let (status, json) =
            send(&app, post_json("/data", serde_json::json!({"word": ""}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(json["error"].is_string());

        let (status, _) = send(
            &app,
            post_json("/data", serde_json::json!({"word": "a b c d e"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (_, story) = send(&app, get("/story")).await;
        assert_eq!(story["story"], RECURRING_OPENING_LINE);
    }

    fn post_raw(content_type: Option<&str>, body: &'static str) -> Request<Body> {
        let mut builder = Request::builder().method("POST").uri("/data");
        if let Some(content_type) = content_type {
            builder = builder.header(header::CONTENT_TYPE, content_type);
        }
        builder.body(Body::from(body)).expect("request")
    }

    #[tokio::test]
    async fn test_post_data_without_body_reports_missing_word() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let (app, _clock) =
            test_app(&temp_dir, RelayFailurePolicy::Warn, unreachable_target()).await;

        let (status, json) = send(&app, post_raw(None, "")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"], "No word provided");

        let (status, json) = send(&app, post_raw(Some("application/json"), "")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"], "No word provided");
    }

    #[tokio::test]
    async fn test_post_data_accepts_form_body() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let (app, _clock) =
            test_app(&temp_dir, RelayFailurePolicy::Warn, unreachable_target()).await;

        let (status, json) = send(
            &app,
            post_raw(Some("application/x-www-form-urlencoded"), "word=hi&name=ann"),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(json["story"].as_str().expect("story").ends_with("hi"));

        let (_, authors) = send(&app, get("/authors")).await;
        assert_eq!(authors["names"], serde_json::json!(["ANN"]));

        let (status, json) = send(
            &app,
            post_raw(Some("application/x-www-form-urlencoded"), "name=ann"),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"], "No word provided");
    }

    #[tokio::test]
    async fn test_post_data_malformed_body_is_json_error() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let (app, _clock) =
            test_app(&temp_dir, RelayFailurePolicy::Warn, unreachable_target()).await;

        for body in [r#"{"word":5}"#, "{not json", "[1,2]"] {
            let (status, json) = send(&app, post_raw(Some("application/json"), body)).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "body {body}");
            assert_eq!(json["error"], "Invalid contribution body");
        }

        let (status, json) = send(&app, post_raw(Some("text/plain"), "hello")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(json["error"].is_string());

        let (_, story) = send(&app, get("/story")).await;
        assert_eq!(story["story"], RECURRING_OPENING_LINE);
    }

    #[tokio::test]
    async fn test_storage_failure_maps_to_server_error() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let (app, _clock) =
            test_app(&temp_dir, RelayFailurePolicy::Warn, unreachable_target()).await;
        std::fs::create_dir(story_path(&temp_dir)).expect("occupy story path");

        let (status, json) = send(&app, get("/story")).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json["error"], "Failed to read story");

        let (status, json) =
            send(&app, post_json("/data", serde_json::json!({"word": "lost"}))).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json["error"], "Failed to save contribution");
        assert!(json.get("story").is_none());

        let (status, authors) = send(&app, get("/authors")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(authors["names"], serde_json::json!([]));
    }

    #[tokio::test]
    async fn test_relay_failure_is_warning_by_default() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let (app, _clock) =
            test_app(&temp_dir, RelayFailurePolicy::Warn, unreachable_target()).await;

        let (status, json) =
            send(&app, post_json("/data", serde_json::json!({"word": "echo"}))).await;
        assert_eq!(status, StatusCode::OK);
        assert!(json["relayWarning"].is_string());

        let (_, story) = send(&app, get("/story")).await;
        assert!(story["story"].as_str().expect("story").ends_with("echo"));
    }

    #[tokio::test]
    async fn test_relay_failure_under_fail_policy_still_commits() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let (app, _clock) =
            test_app(&temp_dir, RelayFailurePolicy::Fail, unreachable_target()).await;

        let (status, json) =
            send(&app, post_json("/data", serde_json::json!({"word": "echo"}))).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json["error"], "Failed to relay contribution");
        assert!(json["story"].as_str().expect("story").ends_with("echo"));

        let (_, story) = send(&app, get("/story")).await;
        assert!(story["story"].as_str().expect("story").ends_with("echo"));
    }

    #[tokio::test]
    async fn test_rotation_serves_new_day_and_keeps_old_one() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let (app, clock) =
            test_app(&temp_dir, RelayFailurePolicy::Warn, unreachable_target()).await;

        send(&app, post_json("/data", serde_json::json!({"word": "comet"}))).await;
        clock.advance_days(1);

        let (_, today) = send(&app, get("/story")).await;
        assert_eq!(today["story"], "It was a dark and stormy night, and");

        let (status, old) = send(&app, get("/story/2024-06-02")).await;
        assert_eq!(status, StatusCode::OK);
        assert!(old["story"].as_str().expect("story").ends_with("comet"));
    }

    #[tokio::test]
    async fn test_dated_routes_reject_bad_and_unknown_dates() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let (app, _clock) =
            test_app(&temp_dir, RelayFailurePolicy::Warn, unreachable_target()).await;

        let (status, _) = send(&app, get("/story/not-a-date")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = send(&app, get("/story/2020-01-01")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = send(&app, get("/authors/2020-01-01")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_ping_reports_relay_outcome() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let receiver = UdpSocket::bind("127.0.0.1:0").await.expect("bind receiver");
        let (app, _clock) = test_app(
            &temp_dir,
            RelayFailurePolicy::Warn,
            receiver.local_addr().expect("local addr"),
        )
        .await;
        let (status, json) = send(&app, get("/ping")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["success"], true);

        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let (app, _clock) =
            test_app(&temp_dir, RelayFailurePolicy::Warn, unreachable_target()).await;
        let (status, json) = send(&app, get("/ping")).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json["success"], false);
    }

    #[tokio::test]
    async fn test_health_and_openapi() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let (app, _clock) =
            test_app(&temp_dir, RelayFailurePolicy::Warn, unreachable_target()).await;

        let (status, json) = send(&app, get("/health")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["ok"], true);

        let (status, json) = send(&app, get("/api-docs/openapi.json")).await;
        assert_eq!(status, StatusCode::OK);
        assert!(json["paths"].get("/data").is_some());
    }
}
