use std::sync::Arc;

use api::{
    auth::{AuthConfig, CurrentUser, decode_token, token_from_headers},
    schema::{OvertimeSchema, export_overtime_csv},
    session::SessionRegistry,
};
use async_graphql::http::GraphiQLSource;
use async_graphql_axum::{GraphQLRequest, GraphQLResponse};
use axum::{
    Json, Router,
    extract::{Query, State},
    http::{HeaderMap, HeaderValue, Method, StatusCode, header},
    response::{Html, IntoResponse, Response},
    routing::{get, post},
};
use chrono::{NaiveDate, Utc};
use products_overtime::{Decision, Page, ReportFilter, access};
use sea_orm::DatabaseConnection;
use serde::Deserialize;
use tower_http::{
    compression::CompressionLayer,
    cors::{AllowOrigin, Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use tracing::{debug, warn};

#[derive(Clone)]
pub struct AppState {
    pub schema: OvertimeSchema,
    pub db: Arc<DatabaseConnection>,
    pub auth: Arc<AuthConfig>,
    pub sessions: SessionRegistry,
}

#[derive(Clone, Debug, Default)]
pub struct RouterOptions {
    pub graphiql: bool,
    pub cors_origins: Vec<String>,
}

pub fn app_router(state: AppState, options: &RouterOptions) -> Router {
    let mut router = Router::new()
        .route("/healthz", get(|| async { "ok" }))
        // POST only: a cookie-authenticated GET could carry a mutation.
        .route("/graphql", post(graphql))
        .route("/export/overtime.csv", get(export_csv));
    if options.graphiql {
        router = router.route("/graphiql", get(graphiql));
    }
    router
        .layer(CompressionLayer::new())
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(cors_layer(&options.cors_origins))
        .with_state(state)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(%origin, "ignoring malformed CORS origin");
                None
            }
        })
        .collect();
    if allowed.is_empty() {
        return CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);
    }
    // Cookies need an explicit origin list.
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_credentials(true)
}

async fn graphql(
    State(state): State<AppState>,
    headers: HeaderMap,
    req: GraphQLRequest,
) -> GraphQLResponse {
    let mut request = req.into_inner();
    if let Some(current_user) = authenticate_request(&state, &headers) {
        request = request.data(current_user);
    }
    state.schema.execute(request).await.into()
}

/// Resolve the caller from the request headers. A token whose session has
/// been signed out or timed out counts as anonymous; a live one records
/// activity.
fn authenticate_request(state: &AppState, headers: &HeaderMap) -> Option<CurrentUser> {
    let authorization = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok());
    let cookie = headers
        .get(header::COOKIE)
        .and_then(|value| value.to_str().ok());
    let token = token_from_headers(authorization, cookie)?;
    let claims = match decode_token(token, &state.auth) {
        Ok(claims) => claims,
        Err(err) => {
            debug!(error = %err, "rejected session token");
            return None;
        }
    };
    let user = CurrentUser::from_claims(&claims)?;
    if !state.sessions.touch(user.session_id) {
        debug!(session_id = %user.session_id, "session no longer active");
        return None;
    }
    Some(user)
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExportParams {
    start_date: Option<NaiveDate>,
    end_date: Option<NaiveDate>,
    search: Option<String>,
}

async fn export_csv(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<ExportParams>,
) -> Response {
    let identity = authenticate_request(&state, &headers).map(|user| user.role);
    match access::decide(identity, Page::Export.access()) {
        Decision::Render => {}
        Decision::RedirectLogin => {
            return error_response(StatusCode::UNAUTHORIZED, "UNAUTHENTICATED");
        }
        Decision::RedirectHome => return error_response(StatusCode::FORBIDDEN, "FORBIDDEN"),
    }
    let filter = ReportFilter {
        search: params.search,
        start_date: params.start_date,
        end_date: params.end_date,
    };
    match export_overtime_csv(state.db.as_ref(), filter, Utc::now().date_naive()).await {
        Ok(export) => (
            [
                (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
                (
                    header::CONTENT_DISPOSITION,
                    format!("attachment; filename=\"{}\"", export.filename),
                ),
            ],
            export.content,
        )
            .into_response(),
        Err(err) => {
            warn!(error = %err, "overtime csv export failed");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, err.code())
        }
    }
}

fn error_response(status: StatusCode, code: &str) -> Response {
    (status, Json(serde_json::json!({ "error": code }))).into_response()
}

async fn graphiql() -> Html<String> {
    Html(GraphiQLSource::build().endpoint("/graphql").finish())
}

pub async fn shutdown_signal() {
    use tokio::signal;
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            warn!(error = %err, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };
    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                warn!(error = %err, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();
    tokio::select! { _ = ctrl_c => {}, _ = terminate => {}, }
}

#[cfg(test)]
mod tests {
    use super::*;
    use api::{
        auth::issue_token,
        schema::{AppSchema, GraphCredentials, SeededRecords, UserRole, build_schema, seed_demo},
    };
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use migration::{Migrator, MigratorTrait};
    use platform_db::DatabaseSettings;
    use products_overtime::Role;
    use std::time::Duration;
    use tower::ServiceExt;

    struct Harness {
        router: Router,
        state: AppState,
        seeded: SeededRecords,
    }

    impl Harness {
        async fn new() -> Self {
            let conn = platform_db::connect(&DatabaseSettings::new("sqlite::memory:"))
                .await
                .unwrap();
            Migrator::up(&conn, None).await.unwrap();
            let seeded = seed_demo(&conn).await.unwrap();
            let db = Arc::new(conn);
            let auth = Arc::new(AuthConfig {
                jwt_secret: "router-test-secret".into(),
                session_ttl_minutes: 60,
                inactivity_timeout: Duration::from_secs(15 * 60),
            });
            let sessions = SessionRegistry::new(auth.inactivity_timeout);
            let AppSchema(schema) = build_schema(
                db.clone(),
                auth.clone(),
                sessions.clone(),
                GraphCredentials::default(),
            );
            let state = AppState {
                schema,
                db,
                auth,
                sessions,
            };
            let options = RouterOptions {
                graphiql: true,
                cors_origins: Vec::new(),
            };
            Self {
                router: app_router(state.clone(), &options),
                state,
                seeded,
            }
        }

        fn token_for(&self, admin: bool) -> String {
            let profile = if admin {
                &self.seeded.admin
            } else {
                &self.seeded.user
            };
            let role: Role = UserRole::from(profile.role).into();
            let session_id = self.state.sessions.open(profile.user_id);
            issue_token(profile.user_id, session_id, role, &self.state.auth).unwrap()
        }

        async fn send(&self, request: Request<Body>) -> (StatusCode, HeaderMap, String) {
            let response = self.router.clone().oneshot(request).await.unwrap();
            let status = response.status();
            let headers = response.headers().clone();
            let bytes = response.into_body().collect().await.unwrap().to_bytes();
            (status, headers, String::from_utf8(bytes.to_vec()).unwrap())
        }
    }

    fn get(uri: &str, token: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        builder.body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn healthz_answers_and_tags_request_id() {
        let harness = Harness::new().await;
        let (status, headers, body) = harness.send(get("/healthz", None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "ok");
        assert!(headers.contains_key("x-request-id"));
    }

    #[tokio::test]
    async fn csv_download_requires_admin() {
        let harness = Harness::new().await;
        let (status, _, _) = harness.send(get("/export/overtime.csv", None)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let token = harness.token_for(false);
        let (status, _, body) = harness
            .send(get("/export/overtime.csv", Some(&token)))
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert!(body.contains("FORBIDDEN"));
    }

    #[tokio::test]
    async fn csv_download_streams_filtered_rows() {
        let harness = Harness::new().await;
        let token = harness.token_for(true);
        let (status, headers, body) = harness
            .send(get(
                "/export/overtime.csv?startDate=2025-08-19&endDate=2025-08-19",
                Some(&token),
            ))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(headers[header::CONTENT_TYPE], "text/csv; charset=utf-8");
        let disposition = headers[header::CONTENT_DISPOSITION].to_str().unwrap();
        assert!(disposition.starts_with("attachment; filename=\"overtime_report_"));
        let lines: Vec<_> = body.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("EmployeeID;"));
        assert!(
            lines[1..]
                .iter()
                .any(|line| line.starts_with("MTI240264;19.08.2025;N;3;"))
        );
        assert!(lines[1..].iter().all(|line| !line.starts_with("OPS-007")));
    }

    #[tokio::test]
    async fn csv_download_rejects_ended_sessions() {
        let harness = Harness::new().await;
        let token = harness.token_for(true);
        harness
            .state
            .sessions
            .end_all_for(harness.seeded.admin.user_id);
        let (status, _, _) = harness
            .send(get("/export/overtime.csv", Some(&token)))
            .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn graphql_reads_the_session_cookie() {
        let harness = Harness::new().await;
        let token = harness.token_for(false);
        let request = Request::builder()
            .method(Method::POST)
            .uri("/graphql")
            .header(header::CONTENT_TYPE, "application/json")
            .header(header::COOKIE, format!("theme=dark; overtime_session={token}"))
            .body(Body::from(r#"{"query":"{ me { user { email role } } }"}"#))
            .unwrap();
        let (status, _, body) = harness.send(request).await;
        assert_eq!(status, StatusCode::OK);
        let json: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["data"]["me"]["user"]["email"], "user@overtime.local");
        assert_eq!(json["data"]["me"]["user"]["role"], "USER");
    }

    #[tokio::test]
    async fn graphql_treats_bad_tokens_as_anonymous() {
        let harness = Harness::new().await;
        let request = Request::builder()
            .method(Method::POST)
            .uri("/graphql")
            .header(header::CONTENT_TYPE, "application/json")
            .header(header::AUTHORIZATION, "Bearer not-a-token")
            .body(Body::from(r#"{"query":"{ me { user { email } } }"}"#))
            .unwrap();
        let (status, _, body) = harness.send(request).await;
        assert_eq!(status, StatusCode::OK);
        let json: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert!(json["data"]["me"].is_null());
    }

    #[tokio::test]
    async fn graphql_refuses_get_so_cookies_cannot_mutate() {
        let harness = Harness::new().await;
        let token = harness.token_for(true);
        let request = Request::builder()
            .method(Method::GET)
            .uri("/graphql?query=mutation%7BdeleteEmployee(employeeId:%22OPS-007%22)%7D")
            .header(header::COOKIE, format!("overtime_session={token}"))
            .body(Body::empty())
            .unwrap();
        let (status, _, body) = harness.send(request).await;
        assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
        assert!(!body.contains("deleteEmployee"));

        let lookup = Request::builder()
            .method(Method::POST)
            .uri("/graphql")
            .header(header::CONTENT_TYPE, "application/json")
            .header(header::AUTHORIZATION, format!("Bearer {token}"))
            .body(Body::from(
                r#"{"query":"{ employee(employeeId: \"OPS-007\") { name } }"}"#,
            ))
            .unwrap();
        let (status, _, body) = harness.send(lookup).await;
        assert_eq!(status, StatusCode::OK);
        let json: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["data"]["employee"]["name"], "Agus Wijaya");
    }
}
