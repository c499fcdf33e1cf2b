//! API layer -- axum routes, handlers, and middleware.

pub mod error;
mod routes;
pub mod state;

use axum::http::StatusCode;
use axum::{Json, Router};
use serde_json::{json, Value};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub use self::error::ApiError;
pub use self::routes::SKIPPED_HEADER;
use self::state::AppState;
use crate::config::ServerConfig;

/// Build the application router with all API routes.
pub fn router(state: AppState, server: &ServerConfig) -> Router {
    let mut router = Router::new()
        .nest("/api", routes::api_routes())
        .fallback(fallback)
        .layer(TraceLayer::new_for_http());
    if server.cors_permissive {
        router = router.layer(CorsLayer::permissive());
    }
    router.with_state(state)
}

async fn fallback() -> (StatusCode, Json<Value>) {
    (StatusCode::NOT_FOUND, Json(json!({ "error": "Not found" })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::AnalyticsEngine;
    use crate::config::AnalyticsConfig;
    use crate::incident::{IncidentFilter, ProviderError, Snapshot, SnapshotProvider};
    use crate::storage::{open_store, IncidentStore};
    use axum::body::Body;
    use axum::http::{Request, Response};
    use std::sync::Arc;
    use tempfile::TempDir;
    use tower::ServiceExt; // for `oneshot`

    fn app(seed: bool) -> (TempDir, IncidentStore, Router) {
        let dir = TempDir::new().unwrap();
        let (store, _) = open_store(&dir.path().join("campuswatch.db"), seed).unwrap();
        let state = AppState::from_store(store.clone(), AnalyticsConfig::default());
        (dir, store, router(state, &ServerConfig::default()))
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn send_json(method: &str, uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn json_body(response: Response<Body>) -> Value {
        let body = axum::body::to_bytes(response.into_body(), 1_000_000)
            .await
            .unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    fn skipped(response: &Response<Body>) -> usize {
        response.headers()[SKIPPED_HEADER]
            .to_str()
            .unwrap()
            .parse()
            .unwrap()
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let (_dir, _, app) = app(false);
        let response = app.oneshot(get("/api/health")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let json = json_body(response).await;
        assert_eq!(json["status"], "ok");
        assert!(json["version"].is_string());
    }

    #[tokio::test]
    async fn test_unknown_route_is_json_404() {
        let (_dir, _, app) = app(false);
        let response = app.oneshot(get("/api/nope")).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(json_body(response).await, json!({ "error": "Not found" }));
    }

    #[tokio::test]
    async fn test_heatmap_over_seeded_data() {
        let (_dir, _, app) = app(true);
        let response = app.oneshot(get("/api/analytics/heatmap")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(skipped(&response), 0);

        let json = json_body(response).await;
        let points = json.as_array().unwrap();
        assert_eq!(points.len(), 5);
        let road_block = points.iter().find(|p| p["type"] == "road_block").unwrap();
        assert_eq!(road_block["weight"], 3);
        assert_eq!(road_block["lat"], 40.7605);
    }

    #[tokio::test]
    async fn test_clusters_trends_and_summary() {
        let (_dir, _, app) = app(true);

        let response = app.clone().oneshot(get("/api/analytics/clusters")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = json_body(response).await;
        assert!(json["clusters"].is_array());
        assert!(json.get("message").is_none());

        let response = app.clone().oneshot(get("/api/analytics/trends")).await.unwrap();
        let json = json_body(response).await;
        let hourly: u64 = json["hourly_distribution"]
            .as_object()
            .unwrap()
            .values()
            .map(|v| v.as_u64().unwrap())
            .sum();
        assert_eq!(hourly, 8);

        let response = app.oneshot(get("/api/analytics/summary")).await.unwrap();
        let json = json_body(response).await;
        assert_eq!(json["total"], 8);
        assert_eq!(json["active"], 5);
        assert_eq!(json["resolved"], 3);
        assert_eq!(json["recent_24h"], 8);
        assert_eq!(json["by_severity"]["high"], 2);
    }

    #[tokio::test]
    async fn test_clusters_on_empty_store() {
        let (_dir, _, app) = app(false);
        let response = app.oneshot(get("/api/analytics/clusters")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            json_body(response).await,
            json!({ "clusters": [], "message": "Not enough data for clustering" })
        );
    }

    #[tokio::test]
    async fn test_buffer_endpoint() {
        let (_dir, _, app) = app(true);

        let response = app.clone().oneshot(get("/api/analysis/buffer/150")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = json_body(response).await;
        let buffers = json.as_array().unwrap();
        // Only the active road block is high or critical.
        assert_eq!(buffers.len(), 1);
        assert_eq!(buffers[0]["type"], "road_block");
        assert_eq!(buffers[0]["radius"], 150.0);
        assert_eq!(buffers[0]["buffer"]["type"], "Polygon");

        for bad in ["0", "-20", "wide"] {
            let response = app
                .clone()
                .oneshot(get(&format!("/api/analysis/buffer/{bad}")))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::BAD_REQUEST, "distance {bad}");
            let json = json_body(response).await;
            assert!(json["error"].as_str().unwrap().contains("distance"));
        }
    }

    #[tokio::test]
    async fn test_create_list_and_update_incident() {
        let (_dir, _, app) = app(false);

        let response = app
            .clone()
            .oneshot(send_json(
                "POST",
                "/api/incidents",
                json!({
                    "type": "security",
                    "description": "Door propped open",
                    "latitude": 40.7575,
                    "longitude": -73.9855,
                    "severity": "critical"
                }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let json = json_body(response).await;
        assert_eq!(json["message"], "Incident created successfully");
        let id = json["id"].as_i64().unwrap();

        let response = app
            .clone()
            .oneshot(get("/api/incidents?status=active&type=security"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = json_body(response).await;
        assert_eq!(json[0]["id"], id);
        assert_eq!(json[0]["reporter_name"], "Anonymous");
        assert_eq!(json[0]["severity"], "critical");

        let response = app
            .clone()
            .oneshot(send_json(
                "PUT",
                &format!("/api/incidents/{id}"),
                json!({ "status": "resolved" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            json_body(response).await,
            json!({ "message": "Incident updated successfully" })
        );

        let response = app
            .oneshot(get("/api/incidents?status=active"))
            .await
            .unwrap();
        assert_eq!(json_body(response).await, json!([]));
    }

    #[tokio::test]
    async fn test_create_validation_errors() {
        let (_dir, _, app) = app(false);

        let response = app
            .clone()
            .oneshot(send_json(
                "POST",
                "/api/incidents",
                json!({ "type": "noise", "description": "d", "longitude": 1.0, "severity": "low" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            json_body(response).await,
            json!({ "error": "Missing field: latitude" })
        );

        let response = app
            .oneshot(send_json(
                "POST",
                "/api/incidents",
                json!({
                    "type": "noise",
                    "description": "d",
                    "latitude": 1.0,
                    "longitude": 1.0,
                    "severity": "apocalyptic"
                }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_update_errors() {
        let (_dir, _, app) = app(false);

        let response = app
            .clone()
            .oneshot(send_json("PUT", "/api/incidents/99", json!({ "status": "resolved" })))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            json_body(response).await,
            json!({ "error": "Incident not found" })
        );

        let response = app
            .oneshot(send_json("PUT", "/api/incidents/99", json!({ "reporter_name": "x" })))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            json_body(response).await,
            json!({ "error": "No valid fields to update" })
        );
    }

    #[tokio::test]
    async fn test_skipped_records_header_counts_bad_rows() {
        let (_dir, store, app) = app(true);
        store
            .pool()
            .get()
            .unwrap()
            .execute_batch(
                "INSERT INTO incidents (type, description, latitude, longitude, severity, status, timestamp)
                 VALUES ('noise', 'off the map', 200.0, -73.0, 'low', 'active', '2026-10-01T08:00:00Z');
                 INSERT INTO incidents (type, description, latitude, longitude, severity, status, timestamp)
                 VALUES ('noise', 'bad clock', 40.0, -73.0, 'low', 'active', 'soon');",
            )
            .unwrap();

        let response = app.clone().oneshot(get("/api/analytics/heatmap")).await.unwrap();
        assert_eq!(skipped(&response), 2);
        assert_eq!(json_body(response).await.as_array().unwrap().len(), 5);

        let response = app.oneshot(get("/api/analytics/summary")).await.unwrap();
        assert_eq!(skipped(&response), 1);
        assert_eq!(json_body(response).await["total"], 9);
    }

    #[tokio::test]
    async fn test_malformed_query_and_path_are_json_400() {
        let (_dir, _, app) = app(false);

        let response = app
            .clone()
            .oneshot(get("/api/incidents?limit=abc"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = json_body(response).await;
        assert!(json["error"].as_str().unwrap().contains("limit"));

        let response = app
            .oneshot(send_json("PUT", "/api/incidents/abc", json!({ "status": "resolved" })))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(json_body(response).await["error"].is_string());
    }

    #[tokio::test]
    async fn test_mixed_case_status_is_consistent_across_views() {
        let (_dir, store, app) = app(false);
        store
            .pool()
            .get()
            .unwrap()
            .execute_batch(
                "INSERT INTO incidents (type, description, latitude, longitude, severity, status, timestamp)
                 VALUES ('fire', 'lab fire', 40.7589, -73.9851, 'critical', 'Active', '2026-10-01T08:00:00Z');",
            )
            .unwrap();

        let response = app.clone().oneshot(get("/api/analytics/summary")).await.unwrap();
        assert_eq!(json_body(response).await["active"], 1);

        let response = app.clone().oneshot(get("/api/analytics/heatmap")).await.unwrap();
        assert_eq!(json_body(response).await.as_array().unwrap().len(), 1);

        let response = app.oneshot(get("/api/analysis/buffer/100")).await.unwrap();
        assert_eq!(json_body(response).await.as_array().unwrap().len(), 1);
    }

    struct Stalled;

    impl SnapshotProvider for Stalled {
        fn fetch_incidents(&self, _filter: &IncidentFilter) -> Result<Snapshot, ProviderError> {
            std::thread::sleep(std::time::Duration::from_millis(1500));
            Ok(Snapshot::default())
        }
    }

    struct Offline;

    impl SnapshotProvider for Offline {
        fn fetch_incidents(&self, _filter: &IncidentFilter) -> Result<Snapshot, ProviderError> {
            Err(ProviderError::Unavailable("database is locked".to_string()))
        }
    }

    fn app_with(provider: Arc<dyn SnapshotProvider>, timeout_secs: u64) -> (TempDir, Router) {
        let dir = TempDir::new().unwrap();
        let (store, _) = open_store(&dir.path().join("campuswatch.db"), false).unwrap();
        let config = AnalyticsConfig {
            compute_timeout_secs: timeout_secs,
            ..AnalyticsConfig::default()
        };
        let state = AppState::new(AnalyticsEngine::new(provider, config), store);
        (dir, router(state, &ServerConfig::default()))
    }

    #[tokio::test]
    async fn test_slow_computation_times_out() {
        let (_dir, app) = app_with(Arc::new(Stalled), 1);
        let response = app.oneshot(get("/api/analytics/heatmap")).await.unwrap();
        assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);
    }

    #[tokio::test]
    async fn test_provider_failure_is_503() {
        let (_dir, app) = app_with(Arc::new(Offline), 10);
        let response = app.oneshot(get("/api/analytics/trends")).await.unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        let json = json_body(response).await;
        assert!(json["error"].as_str().unwrap().contains("database is locked"));
    }
}
