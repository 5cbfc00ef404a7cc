// Entity Access Services - per-table wrappers over the gateway.
// Each service takes an explicit gateway handle; there are no module
// singletons, so tests substitute a fake backend by construction.
pub mod categories;
pub mod interactions;
pub mod posts;

pub use categories::CategoryService;
pub use interactions::InteractionService;
pub use posts::{PostQuery, PostService};

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::{AppResult, Error};
use crate::gateway::GatewayError;

/// Decode a gateway row into a typed entity. A row the backend returned
/// but we cannot decode counts as a remote fault, not a validation one.
pub(crate) fn decode<T: DeserializeOwned>(row: Value) -> AppResult<T> {
    serde_json::from_value(row).map_err(|e| Error::Remote(GatewayError::Serde(e)))
}

pub(crate) fn decode_rows<T: DeserializeOwned>(rows: Vec<Value>) -> AppResult<Vec<T>> {
    rows.into_iter().map(decode).collect()
}
