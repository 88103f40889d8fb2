//! # HTTP mount adapter
//!
//! Optional `axum` binding (feature `web-api`) implementing the Mount HTTP contract from §6: POST
//! the envelope JSON body, get back `202 Accepted` once the mount has finished processing this
//! delivery (whether that means "suspended at an interrupt" or "ran the handler tail and
//! disposed" — both are success from the transport's point of view), or `422` if the event failed
//! schema validation. This is a thin framework convenience layered on top of the core (§4.2's
//! "mount(worker, mountOptions) -> handler" note) — nothing in `tasker-core` or `tasker-worker`'s
//! other modules depends on it.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::post;
use axum::Router;
use tasker_core::Mount;
use tasker_shared::TaskerError;
use tower_http::trace::TraceLayer;
use tracing::{error, warn};

#[derive(Clone)]
struct MountState(Arc<Mount>);

/// Build a router exposing `mount` at `POST /` per §6's Mount HTTP contract. Nest this under
/// whatever path prefix an application's own router uses.
pub fn router(mount: Arc<Mount>) -> Router {
    Router::new()
        .route("/", post(process_envelope))
        .with_state(MountState(mount))
        .layer(TraceLayer::new_for_http())
}

async fn process_envelope(State(state): State<MountState>, body: Bytes) -> impl IntoResponse {
    match state.0.process(&body).await {
        Ok(()) => (StatusCode::ACCEPTED, "accepted").into_response(),
        Err(err @ (TaskerError::InvalidEvent(_) | TaskerError::Serialization(_))) => {
            warn!(error = %err, "rejecting envelope: invalid event");
            (StatusCode::UNPROCESSABLE_ENTITY, err.to_string()).into_response()
        }
        Err(err) => {
            error!(error = %err, "mount failed to process envelope");
            (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()).into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::json_schema::JsonSchemaEventSchema;
    use crate::stores::memory::MemoryStore;
    use axum::body::Body;
    use axum::http::Request;
    use serde_json::{json, Value};
    use tasker_core::{create_function, Dispatcher, Store};
    use tasker_shared::config::ExecutionMode;
    use tower::ServiceExt;

    async fn noop_dispatcher() -> Arc<dyn Dispatcher> {
        Arc::new(crate::dispatch::in_process::InProcessDispatcher::new())
    }

    #[tokio::test]
    async fn valid_envelope_is_accepted() {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::default());
        let dispatcher = noop_dispatcher().await;
        let handler: tasker_core::function::HandlerFn = Arc::new(|_e, _c| Box::pin(async { Ok(Value::Null) }));
        let mount = Arc::new(
            Mount::new(
                vec![create_function("func1", "ping", handler)],
                store,
                dispatcher,
                Arc::new(JsonSchemaEventSchema::default()),
                ExecutionMode::Isolated,
                16,
            )
            .unwrap(),
        );

        let app = router(mount);
        let body = json!({"event": {"type": "ping"}}).to_string();
        let response = app
            .oneshot(Request::builder().method("POST").uri("/").body(Body::from(body)).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::ACCEPTED);
    }

    #[tokio::test]
    async fn missing_type_field_is_unprocessable() {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::default());
        let dispatcher = noop_dispatcher().await;
        let handler: tasker_core::function::HandlerFn = Arc::new(|_e, _c| Box::pin(async { Ok(Value::Null) }));
        let mount = Arc::new(
            Mount::new(
                vec![create_function("func1", "ping", handler)],
                store,
                dispatcher,
                Arc::new(JsonSchemaEventSchema::default()),
                ExecutionMode::Isolated,
                16,
            )
            .unwrap(),
        );

        let app = router(mount);
        let body = json!({"event": {"data": {}}}).to_string();
        let response = app
            .oneshot(Request::builder().method("POST").uri("/").body(Body::from(body)).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }
}
