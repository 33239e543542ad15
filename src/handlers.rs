use axum::{
    extract::{
        multipart::MultipartRejection,
        rejection::JsonRejection,
        Multipart, Path, State,
    },
    response::Json,
    Extension,
};
use std::sync::Arc;

use crate::config::MockCredentials;
use crate::error::{AppError, AppResult};
use crate::models::{
    ApiResponse, ChunkUploadData, CompleteUploadData, CompleteUploadRequest, CurrentUser,
    HealthData, HelloData, InitUploadData, InitUploadRequest, LoginData, LoginRequest,
    ProgressData,
};
use crate::state::AppState;

// open an upload session
pub async fn init_upload(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<InitUploadRequest>, JsonRejection>,
) -> AppResult<Json<ApiResponse<InitUploadData>>> {
    let Json(req) = payload.map_err(|e| AppError::InvalidParam(e.body_text()))?;
    tracing::debug!("Init upload request: {} ({} bytes)", req.file_id, req.file_size);

    if req.file_id.is_empty() || req.file_name.is_empty() {
        return Err(AppError::InvalidParam("fileId and fileName are required".to_string()));
    }

    let session = state
        .uploads
        .init_upload(&req.file_id, &req.file_name, req.file_size, req.chunk_size)
        .await?;

    Ok(Json(ApiResponse::success(InitUploadData {
        file_id: session.id.clone(),
        total_chunks: session.total_chunks,
        chunk_size: session.chunk_size,
    })))
}

// receive one chunk as multipart form data (fileId, chunkIndex, optional checksum, file)
pub async fn upload_chunk(
    State(state): State<Arc<AppState>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> AppResult<Json<ApiResponse<ChunkUploadData>>> {
    let mut multipart = multipart.map_err(|e| AppError::InvalidParam(e.body_text()))?;

    let mut file_id = String::new();
    let mut chunk_index = String::new();
    let mut checksum = String::new();
    let mut part = None;

    // browsers send the file part first, so the whole form is read before
    // the session is known
    while let Some(field) = multipart.next_field().await.map_err(|e| {
        tracing::warn!("Failed to read multipart field: {}", e);
        AppError::InvalidParam(format!("failed to read multipart field: {}", e))
    })? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                let part_name = field.file_name().unwrap_or_default().to_string();
                let data = field.bytes().await.map_err(|e| {
                    AppError::InvalidParam(format!("failed to read chunk data: {}", e))
                })?;
                part = Some((part_name, data));
            }
            "fileId" | "chunkIndex" | "checksum" => {
                let value = field.text().await.map_err(|e| {
                    AppError::InvalidParam(format!("failed to read field {}: {}", name, e))
                })?;
                let value = value.trim().to_string();
                match name.as_str() {
                    "fileId" => file_id = value,
                    "chunkIndex" => chunk_index = value,
                    _ => checksum = value,
                }
            }
            other => tracing::trace!("Ignoring form field {}", other),
        }
    }

    if file_id.is_empty() || chunk_index.is_empty() {
        return Err(AppError::InvalidParam("fileId and chunkIndex are required".to_string()));
    }
    let chunk_index: usize = chunk_index
        .parse()
        .map_err(|_| AppError::InvalidParam(format!("invalid chunkIndex: {}", chunk_index)))?;
    let (part_name, data) =
        part.ok_or_else(|| AppError::InvalidParam("no file part provided".to_string()))?;

    tracing::trace!("Received chunk {} for upload {} ({} bytes)", chunk_index, file_id, data.len());

    let expected = (!checksum.is_empty()).then_some(checksum.as_str());
    let receipt = state
        .uploads
        .receive_chunk(&file_id, chunk_index, &data[..], expected)
        .await?;

    Ok(Json(ApiResponse::success(ChunkUploadData {
        chunk_index: receipt.chunk_index,
        uploaded_chunks: receipt.received_count,
        total_chunks: receipt.total_chunks,
        file_name: part_name,
        checksum: receipt.checksum,
    })))
}

// assemble all chunks into the final file
pub async fn complete_upload(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<CompleteUploadRequest>, JsonRejection>,
) -> AppResult<Json<ApiResponse<CompleteUploadData>>> {
    let Json(req) = payload.map_err(|e| AppError::InvalidParam(e.body_text()))?;
    if req.file_id.is_empty() {
        return Err(AppError::InvalidParam("fileId is required".to_string()));
    }
    tracing::debug!("Completing upload: {}", req.file_id);

    let assembled = state.uploads.complete_upload(&req.file_id).await?;

    Ok(Json(ApiResponse::success(CompleteUploadData {
        file_path: assembled.path.to_string_lossy().to_string(),
        file_size: assembled.size,
        file_name: assembled.file_name,
    })))
}

// report how far along an upload is
pub async fn upload_progress(
    State(state): State<Arc<AppState>>,
    Path(file_id): Path<String>,
) -> AppResult<Json<ApiResponse<ProgressData>>> {
    let progress = state.uploads.progress(&file_id)?;

    Ok(Json(ApiResponse::success(ProgressData {
        progress: progress.progress,
        uploaded_chunks: progress.received_count,
        total_chunks: progress.total_chunks,
        file_name: progress.file_name,
        file_size: progress.file_size,
    })))
}

// greeting, personalized when the mock auth layer resolved a user
pub async fn hello(user: Option<Extension<CurrentUser>>) -> Json<ApiResponse<HelloData>> {
    let mut data = HelloData {
        message: "Hello, World!".to_string(),
        service: "hello".to_string(),
        user: None,
    };

    if let Some(Extension(user)) = user {
        data.message = format!("Hello, {}!", user.nickname);
        data.user = Some(user);
    }

    Json(ApiResponse::success(data))
}

// mock login: the configured account trades its password for the bearer token
pub async fn login(
    Extension(credentials): Extension<MockCredentials>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> AppResult<Json<ApiResponse<LoginData>>> {
    let Json(req) = payload.map_err(|e| AppError::InvalidParam(e.body_text()))?;
    if req.username.is_empty() || req.password.is_empty() {
        return Err(AppError::InvalidParam("username and password are required".to_string()));
    }
    if req.username != credentials.username || req.password != credentials.password {
        return Err(AppError::Unauthorized("invalid username or password".to_string()));
    }

    tracing::info!("🔑 User {} logged in", req.username);
    Ok(Json(ApiResponse::success(LoginData {
        token: credentials.token,
        user_info: CurrentUser::mock_admin(&credentials.username),
    })))
}

pub async fn current_user(
    user: Option<Extension<CurrentUser>>,
) -> AppResult<Json<ApiResponse<CurrentUser>>> {
    let Extension(user) = user.ok_or_else(|| AppError::Unauthorized("not logged in".to_string()))?;
    Ok(Json(ApiResponse::success(user)))
}

pub async fn user_profile(
    user: Option<Extension<CurrentUser>>,
) -> AppResult<Json<ApiResponse<CurrentUser>>> {
    let Extension(user) =
        user.ok_or_else(|| AppError::Unauthorized("login required".to_string()))?;
    tracing::debug!("Profile requested by {}", user.username);
    Ok(Json(ApiResponse::success(user)))
}

// health check endpoint
pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<ApiResponse<HealthData>> {
    Json(ApiResponse::success(HealthData {
        status: "healthy".to_string(),
        service: "tradejournal".to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
        active_uploads: state.uploads.active_sessions(),
    }))
}
