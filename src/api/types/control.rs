use serde::Serialize;

use crate::domain::WorkerState;

/// Result of a deploy attempt
#[derive(Debug, Clone, Serialize)]
pub struct UpdateResponse {
    pub version: String,
    pub state: WorkerState,
}
