//! HTTP endpoints and the JSON DTOs of the public map surface.
//!
//! Internal frames (`/internal/operation`, `/internal/backup`) are opaque binary bodies encoded
//! by the invocation and replication modules; only the table feed and the map endpoints speak
//! JSON.

use serde::{Deserialize, Serialize};

/// `GET /internal/partition/:id` returns the encoded snapshot of one local partition.
pub const ENDPOINT_PARTITION: &str = "/internal/partition";
/// `GET` returns the current table, `PUT` installs a newer one.
pub const ENDPOINT_TABLE: &str = "/internal/table";
/// `GET`/`PUT`/`DELETE /map/:name/:key`.
pub const ENDPOINT_MAP: &str = "/map";

#[derive(Debug, Serialize, Deserialize)]
pub struct MapPutRequest {
    /// The value as a JSON document.
    pub value_json: String,
}

/// Value read, replaced or removed by a map call; `None` when there was none.
#[derive(Debug, Serialize, Deserialize)]
pub struct MapValueResponse {
    pub value_json: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TableUpdateResponse {
    /// `false` when the pushed table was not newer than the installed one.
    pub applied: bool,
    pub version: u64,
}
