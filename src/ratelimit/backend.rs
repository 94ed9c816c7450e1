//! Admission backend trait and the fail-safe call boundary.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::error;

use super::decision::Decision;
use super::policy::LimitType;
use crate::error::{BouncerError, Result};

/// Reason attached to requests rejected by a fail-closed boundary.
pub const UNAVAILABLE_REASON: &str = "rate limiter unavailable";

/// What to do with a request when the limiter itself fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureMode {
    /// Admit the request; a limiter fault never becomes an outage
    #[default]
    FailOpen,
    /// Reject the request; for deployments where admission is a security control
    FailClosed,
}

/// Trait for admission-control implementations.
///
/// Front-ends call through [`FailSafe`] rather than using a backend directly.
pub trait AdmissionBackend: Send + Sync {
    /// Decide whether `identifier` may proceed.
    ///
    /// Quota and block outcomes are `Ok`; `Err` is reserved for internal faults.
    fn try_check(&self, identifier: &str, limit_type: LimitType) -> Result<Decision>;
}

/// Call boundary that turns backend faults into decisions per [`FailureMode`].
pub struct FailSafe<B: AdmissionBackend> {
    backend: Arc<B>,
    mode: FailureMode,
}

impl<B: AdmissionBackend> FailSafe<B> {
    pub fn new(backend: Arc<B>, mode: FailureMode) -> Self {
        Self { backend, mode }
    }

    pub fn mode(&self) -> FailureMode {
        self.mode
    }

    pub fn backend(&self) -> &Arc<B> {
        &self.backend
    }

    /// Check admission, never failing.
    ///
    /// Errors and panics inside the backend are logged at error level and
    /// resolved by the configured failure mode.
    pub fn admit(&self, identifier: &str, limit_type: LimitType) -> Decision {
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            self.backend.try_check(identifier, limit_type)
        }))
        .unwrap_or_else(|payload| Err(BouncerError::Internal(panic_message(payload.as_ref()))));

        match outcome {
            Ok(decision) => decision,
            Err(e) => self.on_fault(identifier, limit_type, &e),
        }
    }

    fn on_fault(&self, identifier: &str, limit_type: LimitType, fault: &BouncerError) -> Decision {
        match self.mode {
            FailureMode::FailOpen => {
                error!(
                    identifier = %identifier,
                    limit_type = %limit_type,
                    error = %fault,
                    "Rate limiter fault, failing open"
                );
                Decision::unchecked()
            }
            FailureMode::FailClosed => {
                error!(
                    identifier = %identifier,
                    limit_type = %limit_type,
                    error = %fault,
                    "Rate limiter fault, failing closed"
                );
                Decision::denied(UNAVAILABLE_REASON)
            }
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("panic: {}", s)
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("panic: {}", s)
    } else {
        "panic".to_string()
    }
}
