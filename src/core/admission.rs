//! Admission control for backend invocations.
//!
//! A fixed number of permits bounds how many requests may be executing against the
//! backend client at once. Acquisition waits until a permit frees up or the caller's
//! deadline passes. Permits are RAII guards: dropping one (on success, error or unwind)
//! returns it to the pool, so accounting cannot leak.
use std::sync::Arc;

use thiserror::Error;
use tokio::{
    sync::{OwnedSemaphorePermit, Semaphore},
    time::{Instant, timeout_at},
};

/// Default number of concurrent backend invocations.
pub const DEFAULT_MAX_CONCURRENT: usize = 50;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AdmissionError {
    /// No permit became available before the deadline
    #[error("server overloaded")]
    Overloaded,
}

/// Counting gate bounding concurrent backend invocations.
#[derive(Debug, Clone)]
pub struct AdmissionController {
    permits: Arc<Semaphore>,
    capacity: usize,
}

impl AdmissionController {
    pub fn new(capacity: usize) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(capacity)),
            capacity,
        }
    }

    /// Wait for a free permit until `deadline`.
    pub async fn acquire(&self, deadline: Instant) -> Result<AdmissionPermit, AdmissionError> {
        match timeout_at(deadline, self.permits.clone().acquire_owned()).await {
            Ok(Ok(permit)) => Ok(AdmissionPermit { _permit: permit }),
            // The semaphore is never closed; treat it like saturation if it ever is.
            Ok(Err(_)) | Err(_) => Err(AdmissionError::Overloaded),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Permits currently free.
    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }

    /// Permits currently held by in-flight requests.
    pub fn in_flight(&self) -> usize {
        self.capacity - self.available()
    }
}

impl Default for AdmissionController {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_CONCURRENT)
    }
}

/// A held admission slot. Released on drop.
#[derive(Debug)]
pub struct AdmissionPermit {
    _permit: OwnedSemaphorePermit,
}
