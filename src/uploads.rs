use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use sha2::{Digest, Sha256};
use tokio::fs;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use uuid::Uuid;

use crate::config::UploadLimits;
use crate::error::{AppError, AppResult};
use crate::session::{SessionStore, UploadSession};
use crate::utils::sanitize_filename;

/// scratch directory for chunk files, relative to the upload dir
pub const CHUNKS_DIR: &str = ".chunks";

const COPY_BUFFER_SIZE: usize = 64 * 1024;

/// outcome of storing one chunk
#[derive(Debug, Clone)]
pub struct ChunkReceipt {
    pub chunk_index: usize,
    pub received_count: usize,
    pub total_chunks: usize,
    pub checksum: String,
}

/// outcome of a successful assembly
#[derive(Debug, Clone)]
pub struct AssembledFile {
    pub path: PathBuf,
    pub size: u64,
    pub file_name: String,
}

#[derive(Debug, Clone)]
pub struct UploadProgress {
    pub progress: f64,
    pub received_count: usize,
    pub total_chunks: usize,
    pub file_name: String,
    pub file_size: u64,
}

/// owns every upload session and the files behind them
#[derive(Debug)]
pub struct UploadManager {
    upload_dir: PathBuf,
    limits: UploadLimits,
    sessions: SessionStore,
}

impl UploadManager {
    pub fn new(upload_dir: PathBuf, limits: UploadLimits) -> Self {
        Self {
            upload_dir,
            limits,
            sessions: SessionStore::new(),
        }
    }

    pub fn active_sessions(&self) -> usize {
        self.sessions.len()
    }

    pub fn has_session(&self, file_id: &str) -> bool {
        self.sessions.contains(file_id)
    }

    /// parent of every scratch directory created for `file_id`
    pub fn chunk_dir(&self, file_id: &str) -> PathBuf {
        self.upload_dir.join(CHUNKS_DIR).join(file_id)
    }

    /// scratch directory owned by one session instance
    pub fn session_dir(&self, session: &UploadSession) -> PathBuf {
        self.chunk_dir(&session.id).join(&session.instance)
    }

    fn lookup(&self, file_id: &str) -> AppResult<Arc<UploadSession>> {
        self.sessions
            .get(file_id)
            .ok_or_else(|| AppError::SessionNotFound(file_id.to_string()))
    }

    /// pick the chunk size actually used for a session
    pub fn negotiate_chunk_size(&self, requested: i64) -> u64 {
        match u64::try_from(requested) {
            Ok(size) if size > 0 && size <= self.limits.max_chunk_size => size,
            _ => self.limits.max_chunk_size,
        }
    }

    /// open (or reopen) a session with its own empty scratch directory
    pub async fn init_upload(
        &self,
        file_id: &str,
        file_name: &str,
        file_size: u64,
        chunk_size: i64,
    ) -> AppResult<Arc<UploadSession>> {
        let file_id = validated_id(file_id)?;
        let file_name = sanitize_filename(file_name);
        if file_name.is_empty() {
            return Err(AppError::InvalidParam("fileName is required".to_string()));
        }
        if file_size == 0 {
            return Err(AppError::InvalidParam("fileSize must be positive".to_string()));
        }
        if file_size > self.limits.max_upload_size {
            return Err(AppError::LimitExceeded {
                size: file_size,
                max: self.limits.max_upload_size,
            });
        }

        let requested = chunk_size;
        let chunk_size = self.negotiate_chunk_size(requested);
        tracing::trace!("Negotiated chunk size {} (requested {})", chunk_size, requested);

        let session = UploadSession::new(file_id.clone(), file_name, file_size, chunk_size);
        let session_dir = self.session_dir(&session);
        fs::create_dir_all(&session_dir).await.map_err(|e| {
            tracing::error!("Failed to create chunk directory {:?}: {}", session_dir, e);
            AppError::Io(e)
        })?;

        let (session, replaced) = self.sessions.insert(session);
        if let Some(previous) = replaced {
            tracing::warn!("Upload session {} re-initialized, previous state discarded", file_id);
            self.discard_scratch(&previous).await;
        }

        tracing::info!(
            "📤 Initialized upload {} ({}, {} bytes, {} chunks of {} bytes)",
            session.id,
            session.file_name,
            session.file_size,
            session.total_chunks,
            session.chunk_size
        );
        Ok(session)
    }

    /// store one chunk of the live session for `file_id`, then mark it received
    pub async fn receive_chunk<R>(
        &self,
        file_id: &str,
        chunk_index: usize,
        reader: R,
        expected_checksum: Option<&str>,
    ) -> AppResult<ChunkReceipt>
    where
        R: AsyncRead + Unpin,
    {
        let session = self.lookup(file_id)?;
        self.store_chunk(&session, chunk_index, reader, expected_checksum).await
    }

    /// store one chunk into `session`'s scratch directory.
    ///
    /// The bytes are hashed while they are copied to a private temp file, which
    /// is synced and renamed over `chunk_{index}` before the index is recorded.
    /// A supplied `expected_checksum` (hex sha256) must match or the chunk is
    /// discarded. A session replaced by a re-init has lost its directory, so a
    /// late write for it fails with `SessionNotFound` and touches nothing else.
    pub async fn store_chunk<R>(
        &self,
        session: &Arc<UploadSession>,
        chunk_index: usize,
        mut reader: R,
        expected_checksum: Option<&str>,
    ) -> AppResult<ChunkReceipt>
    where
        R: AsyncRead + Unpin,
    {
        if chunk_index >= session.total_chunks {
            return Err(AppError::ChunkOutOfRange {
                index: chunk_index,
                total: session.total_chunks,
            });
        }

        let chunk_dir = self.session_dir(session);
        let tmp_path = chunk_dir.join(format!("chunk_{}.{}.tmp", chunk_index, Uuid::new_v4()));

        let (written, checksum) = match write_hashed(&mut reader, &tmp_path).await {
            Ok(result) => result,
            Err(e) => {
                let _ = fs::remove_file(&tmp_path).await;
                if !self.sessions.is_current(session) {
                    return Err(AppError::SessionNotFound(session.id.clone()));
                }
                tracing::error!("Failed to write chunk {} for upload {}: {}", chunk_index, session.id, e);
                return Err(e.into());
            }
        };

        if let Some(expected) = expected_checksum {
            if !expected.trim().eq_ignore_ascii_case(&checksum) {
                let _ = fs::remove_file(&tmp_path).await;
                return Err(AppError::ChecksumMismatch {
                    index: chunk_index,
                    expected: expected.trim().to_ascii_lowercase(),
                    actual: checksum,
                });
            }
        }

        let chunk_path = chunk_dir.join(chunk_file_name(chunk_index));
        if let Err(e) = fs::rename(&tmp_path, &chunk_path).await {
            let _ = fs::remove_file(&tmp_path).await;
            if !self.sessions.is_current(session) {
                return Err(AppError::SessionNotFound(session.id.clone()));
            }
            tracing::error!("Failed to move chunk into place {:?}: {}", chunk_path, e);
            return Err(e.into());
        }

        let received_count = session.mark_received(chunk_index);
        tracing::debug!(
            "📦 Received chunk {} ({} bytes) for upload {}: {}/{}",
            chunk_index,
            written,
            session.id,
            received_count,
            session.total_chunks
        );

        Ok(ChunkReceipt {
            chunk_index,
            received_count,
            total_chunks: session.total_chunks,
            checksum,
        })
    }

    /// concatenate all chunks into `{upload_dir}/{file_name}`.
    ///
    /// Assembly goes to a staging file that is renamed into place only after
    /// every chunk has been copied and synced. On failure the session and its
    /// chunks are left alone so the call can be retried.
    pub async fn complete_upload(&self, file_id: &str) -> AppResult<AssembledFile> {
        let session = self.lookup(file_id)?;

        if !session.is_complete() {
            return Err(AppError::IncompleteUpload {
                received: session.received_count(),
                total: session.total_chunks,
            });
        }

        let chunk_dir = self.session_dir(&session);
        let final_path = self.upload_dir.join(&session.file_name);
        let staging_path = self
            .upload_dir
            .join(format!(".{}.{}.part", session.file_name, Uuid::new_v4()));
        tracing::debug!("Assembling {} chunks into {:?}", session.total_chunks, final_path);

        let size = match assemble(&chunk_dir, session.total_chunks, &staging_path).await {
            Ok(size) => size,
            Err(e) => {
                tracing::error!("Failed to assemble upload {}: {}", session.id, e);
                let _ = fs::remove_file(&staging_path).await;
                return Err(AppError::AssemblyFailed(e.to_string()));
            }
        };

        if let Err(e) = fs::rename(&staging_path, &final_path).await {
            tracing::error!("Failed to move assembled file into place {:?}: {}", final_path, e);
            let _ = fs::remove_file(&staging_path).await;
            return Err(AppError::AssemblyFailed(e.to_string()));
        }

        if size != session.file_size {
            tracing::warn!(
                "Upload {} assembled to {} bytes but declared {} bytes",
                session.id,
                size,
                session.file_size
            );
        }

        // a session re-initialized meanwhile already discarded this one's chunks
        if self.sessions.remove_if_same(&session.id, &session) {
            self.discard_scratch(&session).await;
        }

        tracing::info!("✅ Completed upload {}: {} ({} bytes)", session.id, session.file_name, size);

        Ok(AssembledFile {
            path: final_path,
            size,
            file_name: session.file_name.clone(),
        })
    }

    pub fn progress(&self, file_id: &str) -> AppResult<UploadProgress> {
        let session = self.lookup(file_id)?;

        Ok(UploadProgress {
            progress: session.progress(),
            received_count: session.received_count(),
            total_chunks: session.total_chunks,
            file_name: session.file_name.clone(),
            file_size: session.file_size,
        })
    }

    /// evict sessions older than `ttl` and delete their chunk directories
    pub async fn sweep_expired(&self, ttl: Duration) -> usize {
        let Ok(ttl) = chrono::Duration::from_std(ttl) else {
            return 0;
        };
        if self.sessions.is_empty() {
            return 0;
        }
        let cutoff = Utc::now() - ttl;

        let expired = self.sessions.remove_expired(cutoff);
        for session in &expired {
            self.discard_scratch(session).await;
            tracing::info!(
                "🧹 Expired upload {} ({}, {}/{} chunks)",
                session.id,
                session.file_name,
                session.received_count(),
                session.total_chunks
            );
        }
        expired.len()
    }

    // delete a session's chunks, and the id's directory once nothing else uses it
    async fn discard_scratch(&self, session: &UploadSession) {
        let session_dir = self.session_dir(session);
        match fs::remove_dir_all(&session_dir).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!("Failed to clean up chunk directory {:?}: {}", session_dir, e),
        }
        // fails while a newer session of the same id still has its directory
        let _ = fs::remove_dir(self.chunk_dir(&session.id)).await;
    }
}

pub fn chunk_file_name(chunk_index: usize) -> String {
    format!("chunk_{}", chunk_index)
}

fn validated_id(file_id: &str) -> AppResult<String> {
    let sanitized = sanitize_filename(file_id);
    if sanitized.is_empty() {
        return Err(AppError::InvalidParam("fileId is required".to_string()));
    }
    if sanitized != file_id {
        return Err(AppError::InvalidParam(format!("fileId contains invalid characters: {}", file_id)));
    }
    Ok(sanitized)
}

// copy `reader` into a new file at `path`, returning bytes written and hex sha256
async fn write_hashed<R>(reader: &mut R, path: &Path) -> std::io::Result<(u64, String)>
where
    R: AsyncRead + Unpin,
{
    let mut file = fs::File::create(path).await?;
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; COPY_BUFFER_SIZE];
    let mut written = 0u64;

    loop {
        let n = reader.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
        file.write_all(&buf[..n]).await?;
        written += n as u64;
    }

    file.sync_all().await?;
    Ok((written, hex::encode(hasher.finalize())))
}

async fn assemble(chunk_dir: &Path, total_chunks: usize, dest: &Path) -> std::io::Result<u64> {
    let mut out = fs::File::create(dest).await?;
    let mut size = 0u64;

    for chunk_index in 0..total_chunks {
        let chunk_path = chunk_dir.join(chunk_file_name(chunk_index));
        tracing::trace!("Appending chunk {:?}", chunk_path);
        let mut chunk = fs::File::open(&chunk_path).await?;
        size += tokio::io::copy(&mut chunk, &mut out).await?;
    }

    out.flush().await?;
    out.sync_all().await?;
    Ok(size)
}
