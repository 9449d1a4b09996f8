//! HTTP routes: status text, health, conference mapping.

use std::sync::Arc;

use axum::{extract::{Query, State}, routing::get, Json, Router};
use tower_http::trace::TraceLayer;

use crate::mapper::{ConferenceMapper, Resolution, ResolveRequest};
use crate::registry::SqliteRegistry;

#[derive(Clone)]
pub struct AppState {
    pub mapper: Arc<ConferenceMapper<SqliteRegistry>>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/healthz", get(healthz))
        .route("/conferenceMapper", get(conference_mapper))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn index() -> &'static str { "Conference Mapper (for jitsi) is running" }

pub async fn healthz() -> &'static str { "ok" }

/// `GET /conferenceMapper?conference=<room@domain>&id=<pin>`
///
/// Always answers 200 with `{"id": .., "conference": ..}`; an unreadable
/// query string is treated like an empty one.
pub async fn conference_mapper(
    State(state): State<AppState>,
    query: Option<Query<ResolveRequest>>,
) -> Json<Resolution> {
    let request = query.map(|Query(q)| q).unwrap_or_default();
    let mapper = Arc::clone(&state.mapper);
    let resolution = tokio::task::spawn_blocking(move || mapper.resolve(&request))
        .await
        .unwrap_or_else(|err| {
            tracing::error!(%err, "conference mapper task failed");
            Resolution::default()
        });
    Json(resolution)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::registry::Registry;
    use axum::{body::Body, http::{Request, StatusCode}};
    use tower::ServiceExt;

    fn app() -> (Router, Arc<SqliteRegistry>) {
        let registry = Arc::new(SqliteRegistry::open_in_memory().unwrap());
        let mapper = Arc::new(ConferenceMapper::new(Arc::clone(&registry), &Config::default()));
        (router(AppState { mapper }), registry)
    }

    async fn get_body(app: Router, uri: &str) -> (StatusCode, String) {
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn index_and_health() {
        let (app, _) = app();
        assert_eq!(
            get_body(app.clone(), "/").await,
            (StatusCode::OK, "Conference Mapper (for jitsi) is running".to_string())
        );
        assert_eq!(get_body(app, "/healthz").await, (StatusCode::OK, "ok".to_string()));
    }

    #[tokio::test]
    async fn maps_known_name() {
        let (app, registry) = app();
        registry.insert("thisisatest@test.example.com", 12553).unwrap();

        let uri = "/conferenceMapper?conference=thisIsATest@test.example.com";
        let (status, body) = get_body(app, uri).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, r#"{"id":12553,"conference":"thisisatest@test.example.com"}"#);
    }

    #[tokio::test]
    async fn unknown_id_has_empty_conference() {
        let (app, _) = app();
        let (status, body) = get_body(app, "/conferenceMapper?id=01234").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, r#"{"id":1234,"conference":""}"#);
    }

    #[tokio::test]
    async fn duplicate_parameters_still_answer() {
        let (app, _) = app();
        let (status, body) = get_body(app, "/conferenceMapper?id=1&id=2").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, r#"{"id":0,"conference":""}"#);
    }
}
