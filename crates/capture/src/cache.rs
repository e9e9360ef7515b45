use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::time::Instant;

use crate::session::UploadedCapture;

/// Single-slot, last-writer-wins cache that lets a freshly remounted capture
/// view pick up the photo that was just uploaded instead of re-opening the
/// camera.
///
/// Entries older than the TTL are discarded on read.
#[derive(Debug)]
pub struct RemountCache {
    ttl: Duration,
    slot: Mutex<Option<(Instant, Arc<UploadedCapture>)>>,
}

impl Default for RemountCache {
    fn default() -> Self {
        Self::new(Self::DEFAULT_TTL)
    }
}

impl RemountCache {
    pub const DEFAULT_TTL: Duration = Duration::from_secs(5);

    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            slot: Mutex::new(None),
        }
    }

    pub fn store(&self, capture: Arc<UploadedCapture>) {
        *self.slot.lock().unwrap_or_else(PoisonError::into_inner) = Some((Instant::now(), capture));
    }

    /// The cached capture if it is younger than the TTL. A stale entry is
    /// removed.
    pub fn fresh(&self) -> Option<Arc<UploadedCapture>> {
        let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        match slot.as_ref() {
            Some((stored_at, capture)) if stored_at.elapsed() < self.ttl => Some(capture.clone()),
            Some(_) => {
                tracing::debug!("Discarding stale remount cache entry");
                *slot = None;
                None
            }
            None => None,
        }
    }

    pub fn clear(&self) {
        *self.slot.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }
}
