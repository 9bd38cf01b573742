//! Credential validation.

use crate::client::Transport;
use crate::types::ValidationStatus;

/// Checks a credential against the provider by probing its model listing.
///
/// A blank credential is invalid without touching the network. Every probe
/// failure, whether a status or a transport error, is reduced to
/// [`ValidationStatus::Invalid`]; nothing is raised to the caller.
#[derive(Debug, Clone)]
pub struct CredentialValidator<T> {
    transport: T,
}

impl<T: Transport> CredentialValidator<T> {
    /// Creates a validator that probes through `transport`.
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    /// Probes `credential` and returns `Valid` or `Invalid`.
    pub async fn validate(&self, credential: &str) -> ValidationStatus {
        if credential.trim().is_empty() {
            return ValidationStatus::Invalid;
        }
        match self.transport.probe(credential).await {
            Ok(()) => ValidationStatus::Valid,
            Err(_) => ValidationStatus::Invalid,
        }
    }
}

/// Identifies one issued probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct ProbeTicket(u64);

/// Orders probes so only the most recently issued one may report.
///
/// A probe that completes after a newer probe was issued, or after the
/// credential changed, is stale and its outcome must be discarded.
#[derive(Debug, Default)]
pub struct ProbeSequence {
    latest: u64,
}

impl ProbeSequence {
    /// Creates an empty sequence.
    pub fn new() -> Self {
        Self::default()
    }

    /// Issues a ticket for a new probe, superseding every earlier one.
    pub fn issue(&mut self) -> ProbeTicket {
        self.latest = self.latest.wrapping_add(1);
        ProbeTicket(self.latest)
    }

    /// Supersedes every outstanding probe without issuing a new one.
    pub fn invalidate(&mut self) {
        self.latest = self.latest.wrapping_add(1);
    }

    /// Returns true if `ticket` is the latest issued and not invalidated.
    pub fn is_current(&self, ticket: ProbeTicket) -> bool {
        ticket.0 == self.latest
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accumulator::ByteStream;
    use crate::error::{Error, Result};
    use crate::types::ChatRequest;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FixedProbe {
        accept: &'static str,
        calls: AtomicUsize,
    }

    impl FixedProbe {
        fn new(accept: &'static str) -> Self {
            Self {
                accept,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait::async_trait]
    impl Transport for FixedProbe {
        async fn open_stream(&self, _: &ChatRequest) -> Result<ByteStream> {
            Err(Error::connection("not used", None))
        }

        async fn probe(&self, credential: &str) -> Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if credential == self.accept {
                Ok(())
            } else {
                Err(Error::authentication("HTTP status 401"))
            }
        }
    }

    #[tokio::test]
    async fn accepted_credential_is_valid() {
        let validator = CredentialValidator::new(FixedProbe::new("sk-good"));
        assert_eq!(validator.validate("sk-good").await, ValidationStatus::Valid);
    }

    #[tokio::test]
    async fn rejected_credential_is_invalid() {
        let validator = CredentialValidator::new(FixedProbe::new("sk-good"));
        assert_eq!(validator.validate("sk-bad").await, ValidationStatus::Invalid);
    }

    #[tokio::test]
    async fn blank_credential_skips_probe() {
        let validator = CredentialValidator::new(FixedProbe::new(""));
        assert_eq!(validator.validate("").await, ValidationStatus::Invalid);
        assert_eq!(validator.validate("  \t").await, ValidationStatus::Invalid);
        assert_eq!(validator.transport.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn later_ticket_supersedes_earlier() {
        let mut sequence = ProbeSequence::new();
        let first = sequence.issue();
        assert!(sequence.is_current(first));
        let second = sequence.issue();
        assert!(!sequence.is_current(first));
        assert!(sequence.is_current(second));
        assert!(second > first);
    }

    #[test]
    fn invalidate_supersedes_outstanding() {
        let mut sequence = ProbeSequence::new();
        let ticket = sequence.issue();
        sequence.invalidate();
        assert!(!sequence.is_current(ticket));
    }
}
