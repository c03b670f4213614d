use std::fmt;

use crate::error::{RejectReason, Rejection};
use crate::state::PipelineState;

/// Per-request logging handle.
///
/// Every event carries the request id. Credential values never reach the
/// log: they travel as [`Secret`](crate::Secret), which redacts itself.
#[derive(Debug, Clone, Copy)]
pub struct RequestLog<'a> {
    request_id: &'a str,
}

impl<'a> RequestLog<'a> {
    pub(crate) fn new(request_id: &'a str) -> Self {
        Self { request_id }
    }

    /// Returns the request ID associated with this logger.
    pub fn request_id(&self) -> &str {
        self.request_id
    }

    /// Logs a stage transition.
    pub fn stage(&self, state: PipelineState, args: fmt::Arguments<'_>) {
        tracing::debug!(request_id = %self.request_id, state = %state, "{}", args);
    }

    /// Logs a rejection at a level matching its reason.
    pub fn rejected(&self, state: PipelineState, rejection: &Rejection) {
        let reason = rejection.reason.as_str();
        match rejection.reason {
            RejectReason::InternalError => tracing::error!(
                request_id = %self.request_id,
                state = %state,
                reason,
                detail = %rejection.detail,
                "request rejected"
            ),
            _ => tracing::info!(
                request_id = %self.request_id,
                state = %state,
                reason,
                detail = %rejection.detail,
                "request rejected"
            ),
        }
    }

    /// Logs an info-level message with request ID.
    pub fn info(&self, args: fmt::Arguments<'_>) {
        tracing::info!(request_id = %self.request_id, "{}", args);
    }

    /// Logs a warning-level message with request ID.
    pub fn warn(&self, args: fmt::Arguments<'_>) {
        tracing::warn!(request_id = %self.request_id, "{}", args);
    }

    /// Logs a debug-level message with request ID.
    pub fn debug(&self, args: fmt::Arguments<'_>) {
        tracing::debug!(request_id = %self.request_id, "{}", args);
    }
}
