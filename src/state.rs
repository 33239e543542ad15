use std::path::PathBuf;

use crate::config::UploadLimits;
use crate::uploads::UploadManager;

/// shared application state
#[derive(Debug)]
pub struct AppState {
    /// chunked upload sessions and their files
    pub uploads: UploadManager,
}

impl AppState {
    /// create a new app state storing uploads under `upload_dir`
    pub fn new(upload_dir: PathBuf, limits: UploadLimits) -> Self {
        Self {
            uploads: UploadManager::new(upload_dir, limits),
        }
    }
}
