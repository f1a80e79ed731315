use super::protocol::{
    ENDPOINT_MAP, ENDPOINT_PARTITION, ENDPOINT_TABLE, MapPutRequest, MapValueResponse,
    TableUpdateResponse,
};
use crate::error::GridError;
use crate::invocation::protocol::ENDPOINT_OPERATION;
use crate::node::NodeEngine;
use crate::partition::PartitionTable;
use crate::replication::protocol::ENDPOINT_BACKUP;

use axum::{
    Json, Router,
    body::Bytes,
    extract::{Extension, Path},
    http::StatusCode,
    routing::{get, post},
};
use serde_json::Value;
use std::sync::Arc;

/// All routes a member serves, internal and public.
pub fn router(engine: Arc<NodeEngine>) -> Router {
    Router::new()
        .route(ENDPOINT_OPERATION, post(handle_operation))
        .route(ENDPOINT_BACKUP, post(handle_backup))
        .route(
            &format!("{}/:partition_id", ENDPOINT_PARTITION),
            get(handle_partition_dump),
        )
        .route(ENDPOINT_TABLE, get(handle_get_table).put(handle_put_table))
        .route(
            &format!("{}/:name/:key", ENDPOINT_MAP),
            get(handle_map_get)
                .put(handle_map_put)
                .delete(handle_map_remove),
        )
        .layer(Extension(engine))
}

fn status_for(error: &GridError) -> StatusCode {
    match error {
        GridError::Serialization(_) | GridError::UnknownType { .. } => StatusCode::BAD_REQUEST,
        GridError::PartitionOutOfRange { .. } => StatusCode::NOT_FOUND,
        GridError::InvalidTable(_) => StatusCode::UNPROCESSABLE_ENTITY,
        GridError::OperationTimeout { .. } => StatusCode::GATEWAY_TIMEOUT,
        e if e.is_retryable() => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

pub async fn handle_operation(
    Extension(engine): Extension<Arc<NodeEngine>>,
    body: Bytes,
) -> Bytes {
    engine.handle_operation(body).await
}

pub async fn handle_backup(
    Extension(engine): Extension<Arc<NodeEngine>>,
    body: Bytes,
) -> Result<Bytes, (StatusCode, String)> {
    engine.handle_backup(body).await.map_err(|e| {
        tracing::error!("Failed to apply backup: {}", e);
        (status_for(&e), e.to_string())
    })
}

pub async fn handle_partition_dump(
    Extension(engine): Extension<Arc<NodeEngine>>,
    Path(partition_id): Path<u32>,
) -> Result<Bytes, (StatusCode, String)> {
    engine
        .handle_partition_dump(partition_id)
        .await
        .map_err(|e| (status_for(&e), e.to_string()))
}

pub async fn handle_get_table(
    Extension(engine): Extension<Arc<NodeEngine>>,
) -> Json<PartitionTable> {
    Json(engine.current_table().as_ref().clone())
}

pub async fn handle_put_table(
    Extension(engine): Extension<Arc<NodeEngine>>,
    Json(table): Json<PartitionTable>,
) -> Result<Json<TableUpdateResponse>, (StatusCode, String)> {
    match engine.apply_table(table).await {
        Ok(applied) => Ok(Json(TableUpdateResponse {
            applied,
            version: engine.partitions().version(),
        })),
        Err(e) => {
            tracing::error!("Rejected partition table: {}", e);
            Err((status_for(&e), e.to_string()))
        }
    }
}

fn value_response(value: Option<Value>, warnings: Vec<String>) -> Json<MapValueResponse> {
    Json(MapValueResponse {
        value_json: value.map(|v| v.to_string()),
        warnings,
    })
}

pub async fn handle_map_get(
    Extension(engine): Extension<Arc<NodeEngine>>,
    Path((name, key)): Path<(String, String)>,
) -> (StatusCode, Json<MapValueResponse>) {
    match engine.map::<String, Value>(&name).get(&key).await {
        Ok(Some(value)) => (StatusCode::OK, value_response(Some(value), Vec::new())),
        Ok(None) => (StatusCode::NOT_FOUND, value_response(None, Vec::new())),
        Err(e) => {
            tracing::error!("Map get {}/{} failed: {}", name, key, e);
            (status_for(&e), value_response(None, vec![e.to_string()]))
        }
    }
}

pub async fn handle_map_put(
    Extension(engine): Extension<Arc<NodeEngine>>,
    Path((name, key)): Path<(String, String)>,
    Json(req): Json<MapPutRequest>,
) -> (StatusCode, Json<MapValueResponse>) {
    let value: Value = match serde_json::from_str(&req.value_json) {
        Ok(v) => v,
        Err(e) => {
            tracing::error!("Failed to deserialize value: {}", e);
            return (
                StatusCode::BAD_REQUEST,
                value_response(None, vec![e.to_string()]),
            );
        }
    };

    match engine.map::<String, Value>(&name).put(&key, &value).await {
        Ok(previous) => (StatusCode::OK, value_response(previous, Vec::new())),
        Err(e) => {
            tracing::error!("Map put {}/{} failed: {}", name, key, e);
            (status_for(&e), value_response(None, vec![e.to_string()]))
        }
    }
}

pub async fn handle_map_remove(
    Extension(engine): Extension<Arc<NodeEngine>>,
    Path((name, key)): Path<(String, String)>,
) -> (StatusCode, Json<MapValueResponse>) {
    match engine.map::<String, Value>(&name).remove(&key).await {
        Ok(Some(previous)) => (StatusCode::OK, value_response(Some(previous), Vec::new())),
        Ok(None) => (StatusCode::NOT_FOUND, value_response(None, Vec::new())),
        Err(e) => {
            tracing::error!("Map remove {}/{} failed: {}", name, key, e);
            (status_for(&e), value_response(None, vec![e.to_string()]))
        }
    }
}
