//! Logging hook for client operations.
//!
//! This module provides the [`ClientLogger`] trait that lets callers capture
//! every request the [`ChatClient`](crate::ChatClient) makes and how each one
//! ended.

use crate::error::Error;
use crate::types::{ChatRequest, ValidationStatus};

/// A trait for logging chat client operations.
///
/// Implement this trait to record API interactions. The credential never
/// reaches the logger: [`ChatRequest`]'s `Debug` output redacts it and the
/// probe hook only receives the outcome.
pub trait ClientLogger: Send + Sync {
    /// Log an outbound chat request before it is sent.
    fn log_request(&self, request: &ChatRequest);

    /// Log that the response headers arrived with a success status.
    fn log_stream_opened(&self, status: u16);

    /// Log a failure, whether opening the request or reading its body.
    fn log_stream_error(&self, error: &Error);

    /// Log the outcome of a credential probe.
    fn log_probe(&self, status: ValidationStatus);
}

/// Writes one line per client event to stderr.
#[derive(Debug, Default, Clone, Copy)]
pub struct StderrLogger;

impl ClientLogger for StderrLogger {
    fn log_request(&self, request: &ChatRequest) {
        eprintln!("[streamchat] request: {request:?}");
    }

    fn log_stream_opened(&self, status: u16) {
        eprintln!("[streamchat] stream opened: HTTP {status}");
    }

    fn log_stream_error(&self, error: &Error) {
        eprintln!("[streamchat] stream error: {error}");
    }

    fn log_probe(&self, status: ValidationStatus) {
        eprintln!("[streamchat] key check: {status}");
    }
}
