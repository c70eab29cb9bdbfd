//! Upgrade Endpoint

use axum::{
    extract::{
        ws::{rejection::WebSocketUpgradeRejection, WebSocketUpgrade},
        ConnectInfo, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::any,
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{error, info, info_span, warn, Instrument};
use uuid::Uuid;

use super::RelayEngine;

/// Router with the relay's single endpoint at `/`
pub fn create_router(engine: Arc<RelayEngine>) -> Router {
    Router::new()
        .route("/", any(relay_handler))
        .with_state(engine)
}

/// Upgrade the request and hand the connection to the engine.
///
/// Any origin is accepted. A request that cannot be upgraded gets a plain 500.
async fn relay_handler(
    State(engine): State<Arc<RelayEngine>>,
    ConnectInfo(client_addr): ConnectInfo<SocketAddr>,
    upgrade: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response {
    let upgrade = match upgrade {
        Ok(upgrade) => upgrade,
        Err(rejection) => {
            warn!(
                client_addr = %client_addr,
                phase = "upgrade",
                "Failed to upgrade client connection: {}", rejection
            );
            return (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error").into_response();
        }
    };

    let session_id = Uuid::new_v4().to_string();
    let span = info_span!("session", session_id = %session_id, client_addr = %client_addr);
    let failed_span = span.clone();

    upgrade
        .max_message_size(usize::MAX)
        .max_frame_size(usize::MAX)
        .on_failed_upgrade(move |e| {
            let _entered = failed_span.enter();
            warn!(phase = "upgrade", "Client upgrade did not complete: {}", e);
        })
        .on_upgrade(move |socket| {
            async move {
                match engine.run_session(session_id, socket, client_addr).await {
                    Ok(stats) => info!(
                        duration = %humantime::format_duration(stats.duration),
                        "Client disconnected"
                    ),
                    Err(e) => error!(
                        phase = e.phase(),
                        target_url = %engine.target_url(),
                        "Failed to connect to target server: {}", e
                    ),
                }
            }
            .instrument(span)
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use axum::{body::Body, http::Request};
    use tower::ServiceExt;

    fn test_router() -> Router {
        let engine = RelayEngine::from_config(Arc::new(Config::default())).unwrap();
        create_router(Arc::new(engine))
    }

    fn request(uri: &str) -> Request<Body> {
        let mut request = Request::builder().uri(uri).body(Body::empty()).unwrap();
        request
            .extensions_mut()
            .insert(ConnectInfo(SocketAddr::from(([127, 0, 0, 1], 40000))));
        request
    }

    #[tokio::test]
    async fn test_plain_request_gets_server_error() {
        let response = test_router().oneshot(request("/")).await.unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_only_root_path_is_served() {
        let response = test_router().oneshot(request("/other")).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
