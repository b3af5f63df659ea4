use axum::{
    Json, Router,
    body::Bytes,
    extract::{Extension, Path},
    http::StatusCode,
    routing::{get, post},
};
use std::sync::Arc;

use super::protocol::{
    ENDPOINT_OBJECT, ENDPOINT_RPC, ENDPOINT_TABLE, Envelope, ObjectResponse, PROTOCOL_VERSION,
    Response, TableSnapshot,
};
use super::transport::RpcHandler;
use crate::error::OverlayError;
use crate::node::TapestryNode;

/// Every route a node serves, with the node shared through `Extension`.
pub fn router(node: Arc<TapestryNode>) -> Router {
    Router::new()
        .route(ENDPOINT_RPC, post(handle_rpc))
        .route(
            &format!("{}/:key", ENDPOINT_OBJECT),
            get(handle_get_object)
                .put(handle_put_object)
                .delete(handle_delete_object),
        )
        .route(ENDPOINT_TABLE, get(handle_get_table))
        .layer(Extension(node))
}

pub async fn handle_rpc(
    Extension(node): Extension<Arc<TapestryNode>>,
    body: Bytes,
) -> (StatusCode, Vec<u8>) {
    let envelope: Envelope = match bincode::deserialize(&body) {
        Ok(envelope) => envelope,
        Err(e) => {
            tracing::error!("Failed to decode RPC envelope: {}", e);
            return (StatusCode::BAD_REQUEST, Vec::new());
        }
    };

    if envelope.version != PROTOCOL_VERSION {
        tracing::warn!(
            "Rejected {} with protocol version {}",
            envelope.request.name(),
            envelope.version
        );
        let error = OverlayError::VersionMismatch {
            expected: PROTOCOL_VERSION,
            got: envelope.version,
        };
        return encode(Response::Error(error.to_string()));
    }

    let response = match node.dispatch(envelope.request).await {
        Ok(response) => response,
        Err(OverlayError::NodeStopped) => {
            return (StatusCode::SERVICE_UNAVAILABLE, Vec::new());
        }
        Err(e) => Response::Error(e.to_string()),
    };

    encode(response)
}

fn encode(response: Response) -> (StatusCode, Vec<u8>) {
    match bincode::serialize(&response) {
        Ok(bytes) => (StatusCode::OK, bytes),
        Err(e) => {
            tracing::error!("Failed to encode RPC response: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, Vec::new())
        }
    }
}

pub async fn handle_put_object(
    Extension(node): Extension<Arc<TapestryNode>>,
    Path(key): Path<String>,
    body: Bytes,
) -> (StatusCode, Json<ObjectResponse>) {
    match node.store(&key, body.to_vec()).await {
        Ok(()) => (
            StatusCode::OK,
            Json(ObjectResponse {
                success: true,
                error: None,
            }),
        ),
        Err(e) => {
            tracing::error!("Failed to store {}: {}", key, e);
            (status_of(&e), failure(e))
        }
    }
}

pub async fn handle_get_object(
    Extension(node): Extension<Arc<TapestryNode>>,
    Path(key): Path<String>,
) -> Result<Vec<u8>, (StatusCode, Json<ObjectResponse>)> {
    node.fetch(&key).await.map_err(|e| {
        tracing::debug!("Fetch of {} failed: {}", key, e);
        (status_of(&e), failure(e))
    })
}

pub async fn handle_delete_object(
    Extension(node): Extension<Arc<TapestryNode>>,
    Path(key): Path<String>,
) -> (StatusCode, Json<ObjectResponse>) {
    match node.remove(&key).await {
        Ok(()) => (
            StatusCode::OK,
            Json(ObjectResponse {
                success: true,
                error: None,
            }),
        ),
        Err(e) => {
            tracing::error!("Failed to remove {}: {}", key, e);
            (status_of(&e), failure(e))
        }
    }
}

pub async fn handle_get_table(
    Extension(node): Extension<Arc<TapestryNode>>,
) -> Json<TableSnapshot> {
    Json(node.snapshot())
}

fn status_of(e: &OverlayError) -> StatusCode {
    match e {
        OverlayError::NotFound(_) => StatusCode::NOT_FOUND,
        OverlayError::NodeStopped => StatusCode::SERVICE_UNAVAILABLE,
        e if e.is_transient() => StatusCode::BAD_GATEWAY,
        OverlayError::RootUnreachable(_) => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn failure(e: OverlayError) -> Json<ObjectResponse> {
    Json(ObjectResponse {
        success: false,
        error: Some(e.to_string()),
    })
}
