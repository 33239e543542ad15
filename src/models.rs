use serde::{Deserialize, Serialize};

use crate::error::CODE_SUCCESS;

/// `{code, message, data}` envelope wrapping every api response
#[derive(Serialize, Deserialize, Debug)]
pub struct ApiResponse<T> {
    pub code: i32,
    pub message: String,
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            code: CODE_SUCCESS,
            message: "success".to_string(),
            data: Some(data),
        }
    }

    pub fn error(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }
}

// request to open an upload session
#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct InitUploadRequest {
    #[serde(default)]
    pub file_id: String,
    #[serde(default)]
    pub file_name: String,
    #[serde(default)]
    pub file_size: u64,
    // negative or zero means "use the server default"
    #[serde(default)]
    pub chunk_size: i64,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct InitUploadData {
    pub file_id: String,
    pub total_chunks: usize,
    pub chunk_size: u64,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct ChunkUploadData {
    pub chunk_index: usize,
    pub uploaded_chunks: usize,
    pub total_chunks: usize,
    pub file_name: String,
    /// hex sha256 of the stored chunk
    pub checksum: String,
}

// request to assemble an upload
#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct CompleteUploadRequest {
    #[serde(default)]
    pub file_id: String,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct CompleteUploadData {
    pub file_path: String,
    pub file_size: u64,
    pub file_name: String,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct ProgressData {
    pub progress: f64,
    pub uploaded_chunks: usize,
    pub total_chunks: usize,
    pub file_name: String,
    pub file_size: u64,
}

/// user resolved by the mock auth layer
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct CurrentUser {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub nickname: String,
    pub status: i32,
}

impl CurrentUser {
    /// the one account the mock auth layer knows about
    pub fn mock_admin(username: &str) -> Self {
        Self {
            id: 1,
            username: username.to_string(),
            email: format!("{}@example.com", username),
            nickname: "Administrator".to_string(),
            status: 1,
        }
    }
}

#[derive(Deserialize, Debug)]
pub struct LoginRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct LoginData {
    pub token: String,
    pub user_info: CurrentUser,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct HelloData {
    pub message: String,
    pub service: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<CurrentUser>,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct HealthData {
    pub status: String,
    pub service: String,
    pub timestamp: String,
    pub active_uploads: usize,
}
