//! HTTP 路由：把 PlotService 的操作暴露为 JSON 接口
//!
//! 所有操作都是 `/api/plot/...` 下的 POST（HasPower 为 GET），响应体为 CommandResponse / HasPowerResponse。

use std::sync::Arc;

use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;

use crate::server::{CommandResponse, HasPowerResponse, PlotService};

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct InitializeRequest {
    pub options: Vec<String>,
    pub definitions: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct CommandRequest {
    pub command: String,
}

#[derive(Debug, Deserialize)]
pub struct WalkRequest {
    pub axis: String,
    pub distance: f64,
}

pub fn router(service: Arc<PlotService>) -> Router {
    Router::new()
        .route("/api/plot/initialize", post(initialize))
        .route("/api/plot/command", post(command))
        .route("/api/plot/disconnect", post(disconnect))
        .route("/api/plot/power", get(has_power))
        .route("/api/plot/alignment", post(alignment))
        .route("/api/plot/walk", post(walk_home))
        .route("/api/plot/home/reset", post(reset_home))
        .route("/api/plot/interactive/restore", post(restore_interactive))
        .route("/api/plot/interactive/end", post(end_interactive))
        .route("/api/health", get(|| async { "OK" }))
        .with_state(service)
}

async fn initialize(
    State(service): State<Arc<PlotService>>,
    Json(req): Json<InitializeRequest>,
) -> Json<CommandResponse> {
    Json(service.initialize_plot(&req.options, &req.definitions).await)
}

async fn command(
    State(service): State<Arc<PlotService>>,
    Json(req): Json<CommandRequest>,
) -> Json<CommandResponse> {
    Json(service.process_command(&req.command).await)
}

async fn disconnect(State(service): State<Arc<PlotService>>) -> Json<CommandResponse> {
    Json(service.disconnect().await)
}

async fn has_power(State(service): State<Arc<PlotService>>) -> Json<HasPowerResponse> {
    Json(service.has_power().await)
}

async fn alignment(State(service): State<Arc<PlotService>>) -> Json<CommandResponse> {
    Json(service.plot_alignment_svg().await)
}

async fn walk_home(
    State(service): State<Arc<PlotService>>,
    Json(req): Json<WalkRequest>,
) -> Json<CommandResponse> {
    Json(service.walk_home(&req.axis, req.distance).await)
}

async fn reset_home(State(service): State<Arc<PlotService>>) -> Json<CommandResponse> {
    Json(service.reset_home_position().await)
}

async fn restore_interactive(State(service): State<Arc<PlotService>>) -> Json<CommandResponse> {
    Json(service.restore_interactive_context().await)
}

async fn end_interactive(State(service): State<Arc<PlotService>>) -> Json<CommandResponse> {
    Json(service.end_interactive_context().await)
}

#[cfg(test)]
mod tests {
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    use super::*;
    use crate::core::MachineSettings;
    use crate::device::{MockDevice, PlotDevice};
    use crate::dispatch::Dispatcher;

    fn app() -> Router {
        let service = PlotService::new(
            Box::new(|| Box::new(MockDevice::new()) as Box<dyn PlotDevice>),
            Dispatcher::default(),
            MachineSettings::default(),
        );
        router(Arc::new(service))
    }

    fn post_json(uri: &str, body: &str) -> Request<Body> {
        Request::post(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn json(response: axum::response::Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), 64 * 1024).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let response = app()
            .oneshot(Request::get("/api/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_command_round_trip() {
        let app = app();
        let response = app
            .clone()
            .oneshot(post_json("/api/plot/command", r#"{"command":"penup"}"#))
            .await
            .unwrap();
        let body = json(response).await;
        assert_eq!(body["success"], false);
        assert_eq!(body["message"], crate::server::NOT_INITIALIZED);

        let response = app
            .clone()
            .oneshot(post_json(
                "/api/plot/initialize",
                r#"{"options":["speed_penup 30"],"definitions":["up penup"]}"#,
            ))
            .await
            .unwrap();
        assert_eq!(json(response).await["success"], true);

        let response = app
            .clone()
            .oneshot(post_json("/api/plot/command", r#"{"command":"up"}"#))
            .await
            .unwrap();
        assert_eq!(
            json(response).await["message"],
            "Defined command up executed successfully"
        );

        let response = app
            .oneshot(Request::get("/api/plot/power").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(json(response).await["has_power"], true);
    }
}
