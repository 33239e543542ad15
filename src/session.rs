use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use uuid::Uuid;

/// number of chunks needed to cover `file_size` bytes
pub fn total_chunks(file_size: u64, chunk_size: u64) -> usize {
    file_size.div_ceil(chunk_size) as usize
}

pub fn progress_percent(received: usize, total: usize) -> f64 {
    if total == 0 {
        return 100.0;
    }
    received as f64 / total as f64 * 100.0
}

/// server-side record of one in-flight chunked upload
#[derive(Debug)]
pub struct UploadSession {
    pub id: String,
    pub file_name: String,
    pub file_size: u64,
    pub chunk_size: u64,
    /// fixed at creation
    pub total_chunks: usize,
    pub created_at: DateTime<Utc>,
    /// names this session's scratch directory, so a re-initialized id never
    /// shares chunk files with its predecessor
    pub instance: String,
    /// indices whose bytes are already on disk
    received_chunks: Mutex<HashSet<usize>>,
}

impl UploadSession {
    pub fn new(id: String, file_name: String, file_size: u64, chunk_size: u64) -> Self {
        Self {
            id,
            file_name,
            file_size,
            chunk_size,
            total_chunks: total_chunks(file_size, chunk_size),
            created_at: Utc::now(),
            instance: Uuid::new_v4().simple().to_string(),
            received_chunks: Mutex::new(HashSet::new()),
        }
    }

    // a panic while holding the lock cannot leave the set half-updated
    fn received(&self) -> MutexGuard<'_, HashSet<usize>> {
        self.received_chunks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// record a durably written chunk, returns the new received count
    pub fn mark_received(&self, chunk_index: usize) -> usize {
        let mut received = self.received();
        received.insert(chunk_index);
        received.len()
    }

    pub fn received_count(&self) -> usize {
        self.received().len()
    }

    pub fn is_complete(&self) -> bool {
        self.received_count() == self.total_chunks
    }

    /// completion percentage in `[0, 100]`
    pub fn progress(&self) -> f64 {
        progress_percent(self.received_count(), self.total_chunks)
    }

    pub fn created_before(&self, cutoff: DateTime<Utc>) -> bool {
        self.created_at <= cutoff
    }
}

/// `id -> session` map shared by every request.
///
/// The map lock is only ever held inside these methods. Callers get an
/// `Arc` back and take the session's own lock afterwards, so the two locks
/// are never nested.
#[derive(Debug, Default)]
pub struct SessionStore {
    sessions: DashMap<String, Arc<UploadSession>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// register a session, returning the one it replaced (if any)
    pub fn insert(&self, session: UploadSession) -> (Arc<UploadSession>, Option<Arc<UploadSession>>) {
        let session = Arc::new(session);
        let replaced = self.sessions.insert(session.id.clone(), Arc::clone(&session));
        (session, replaced)
    }

    pub fn get(&self, id: &str) -> Option<Arc<UploadSession>> {
        self.sessions.get(id).map(|entry| Arc::clone(entry.value()))
    }

    /// whether `session` is still the live session for its id
    pub fn is_current(&self, session: &Arc<UploadSession>) -> bool {
        self.sessions
            .get(&session.id)
            .is_some_and(|entry| Arc::ptr_eq(entry.value(), session))
    }

    /// remove `id` only if it still maps to `session`
    pub fn remove_if_same(&self, id: &str, session: &Arc<UploadSession>) -> bool {
        self.sessions
            .remove_if(id, |_, current| Arc::ptr_eq(current, session))
            .is_some()
    }

    /// drop every session created at or before `cutoff`
    pub fn remove_expired(&self, cutoff: DateTime<Utc>) -> Vec<Arc<UploadSession>> {
        let candidates: Vec<String> = self
            .sessions
            .iter()
            .filter(|entry| entry.value().created_before(cutoff))
            .map(|entry| entry.key().clone())
            .collect();

        candidates
            .into_iter()
            .filter_map(|id| {
                self.sessions
                    .remove_if(&id, |_, session| session.created_before(cutoff))
                    .map(|(_, session)| session)
            })
            .collect()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.sessions.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
