//! Single-slot "current error" state shared by the directory client and the
//! connection manager. Last write wins; nothing clears it except an explicit
//! [`ErrorReporter::clear`].

use std::sync::{Arc, Mutex, MutexGuard};
use tracing::warn;

use crate::error::ClientError;

#[derive(Clone, Default)]
pub struct ErrorReporter {
    slot: Arc<Mutex<Option<Arc<ClientError>>>>,
}

impl ErrorReporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrite the current error. Returns the stored error so callers can
    /// also hand it back to their own caller.
    pub fn report(&self, error: ClientError) -> Arc<ClientError> {
        warn!(error = %error, "client error");
        let error = Arc::new(error);
        *self.lock() = Some(error.clone());
        error
    }

    pub fn current(&self) -> Option<Arc<ClientError>> {
        self.lock().clone()
    }

    /// User-initiated dismissal. Never called by the core.
    pub fn clear(&self) {
        self.lock().take();
    }

    fn lock(&self) -> MutexGuard<'_, Option<Arc<ClientError>>> {
        // The slot holds plain data, so a poisoned guard is still usable.
        self.slot.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl std::fmt::Debug for ErrorReporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ErrorReporter")
            .field("current", &self.current().map(|e| e.to_string()))
            .finish()
    }
}
