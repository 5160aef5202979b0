//! Shared API types used by the HTTP surface.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use clipdock_model::{ConsumerKind, WatchTargetId};

/// Standard envelope for admin endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            status: "success".to_string(),
            data: Some(data),
            error: None,
            message: None,
        }
    }

    pub fn error(error: String) -> Self {
        Self {
            status: "error".to_string(),
            data: None,
            error: Some(error),
            message: None,
        }
    }

    pub fn with_message(mut self, message: String) -> Self {
        self.message = Some(message);
        self
    }
}

/// Create-or-update payload for a watch target. `id` is omitted on create.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpsertTargetRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<WatchTargetId>,
    pub source_dir: PathBuf,
    pub project_path: PathBuf,
    pub bin_path: String,
    pub consumer: ConsumerKind,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

/// Active-project report from a consumer panel.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveProjectReport {
    pub project_path: Option<PathBuf>,
}
