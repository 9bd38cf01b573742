//! The chat session controller.
//!
//! A [`SessionController`] owns the transcript, the session settings, and the
//! loading/error/validation flags. It drives one turn at a time through
//! `Idle -> Sending -> Streaming -> Idle` and hands an immutable
//! [`SessionSnapshot`] to its observer after every mutation.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::StreamExt;

use crate::accumulator::ResponseAccumulator;
use crate::client::Transport;
use crate::config::{ChatConfig, DEFAULT_DEVELOPER_MESSAGE};
use crate::credential::{CredentialValidator, ProbeSequence, ProbeTicket};
use crate::decoder::Framing;
use crate::error::{Error, Result};
use crate::observability::{
    SESSION_CANCELLED_TURNS, SESSION_REJECTED_SENDS, SESSION_STALE_PROBES,
    SESSION_TURN_FAILURES, SESSION_TURNS,
};
use crate::transcript::Transcript;
use crate::types::{ChatRequest, Message, Model, ValidationStatus};

/// Shown when a failure carries no usable description.
pub const FALLBACK_ERROR: &str =
    "Failed to send message. Please check your API key and try again.";

/////////////////////////////////////////// SessionSettings ///////////////////////////////////////////

/// User-editable settings sent with every turn.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionSettings {
    /// Developer (system) instruction text.
    pub developer_message: String,
    /// Model identifier.
    pub model: Model,
    /// API credential; empty when none has been entered.
    pub credential: String,
}

impl SessionSettings {
    /// Settings seeded from a resolved configuration, with no credential.
    pub fn from_config(config: &ChatConfig) -> Self {
        Self {
            developer_message: config.developer_message.clone(),
            model: config.model.clone(),
            credential: String::new(),
        }
    }

    /// Sets the credential.
    pub fn with_credential(mut self, credential: impl Into<String>) -> Self {
        self.credential = credential.into();
        self
    }

    /// Returns true if a non-blank credential is present.
    pub fn has_credential(&self) -> bool {
        !self.credential.trim().is_empty()
    }
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            developer_message: DEFAULT_DEVELOPER_MESSAGE.to_string(),
            model: Model::default(),
            credential: String::new(),
        }
    }
}

impl fmt::Debug for SessionSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionSettings")
            .field("developer_message", &self.developer_message)
            .field("model", &self.model)
            .field("credential", &if self.has_credential() { "<redacted>" } else { "" })
            .finish()
    }
}

/////////////////////////////////////////////// Turns ///////////////////////////////////////////////

/// Where the controller is within a turn.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TurnState {
    /// No turn in flight.
    #[default]
    Idle,
    /// The user message is appended and the request is being opened.
    Sending,
    /// The response body is being accumulated into the assistant message.
    Streaming,
}

/// Why a turn failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnFailure {
    /// The request could not be opened; no body was read.
    Open(String),
    /// The body failed after streaming began.
    Read(String),
}

impl TurnFailure {
    /// The user-visible description.
    pub fn message(&self) -> &str {
        match self {
            TurnFailure::Open(message) | TurnFailure::Read(message) => message,
        }
    }
}

/// How an accepted turn ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnOutcome {
    /// The assistant message is complete.
    Sealed,
    /// The turn was rolled back.
    Failed(TurnFailure),
}

///////////////////////////////////////////// Snapshots /////////////////////////////////////////////

/// A read-only view of the session, published after every mutation.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSnapshot {
    /// The transcript in conversation order.
    pub messages: Vec<Message>,
    /// True while a turn is in flight.
    pub loading: bool,
    /// The error from the last failed turn, if any.
    pub error: Option<String>,
    /// Credential validation status.
    pub validation: ValidationStatus,
    /// True while a probe is outstanding.
    pub validating: bool,
    /// The turn state.
    pub state: TurnState,
    /// The selected model.
    pub model: Model,
    /// True if a non-blank credential is set.
    pub has_credential: bool,
}

impl SessionSnapshot {
    /// Returns the guidance to show where the user types.
    pub fn input_hint(&self) -> &'static str {
        if !self.has_credential {
            return "Please add your API key first";
        }
        match self.validation {
            ValidationStatus::Invalid => "Please validate your API key first",
            ValidationStatus::Valid => "Type your message...",
            ValidationStatus::Unknown => {
                "Type your message... (consider testing your API key first)"
            }
        }
    }

    /// Returns true if sending `text` now would be accepted.
    pub fn can_send(&self, text: &str) -> bool {
        !text.trim().is_empty()
            && self.has_credential
            && !self.loading
            && self.validation != ValidationStatus::Invalid
    }
}

/// Receives a snapshot after every change to the session.
///
/// Observers are called while the session is locked and must not call back
/// into the controller.
pub trait SnapshotObserver: Send {
    /// Called with the new state.
    fn snapshot_changed(&mut self, snapshot: &SessionSnapshot);
}

impl<F> SnapshotObserver for F
where
    F: FnMut(&SessionSnapshot) + Send,
{
    fn snapshot_changed(&mut self, snapshot: &SessionSnapshot) {
        self(snapshot)
    }
}

///////////////////////////////////////////// SessionInner ////////////////////////////////////////////

struct SessionInner {
    settings: SessionSettings,
    transcript: Transcript,
    state: TurnState,
    error: Option<String>,
    validation: ValidationStatus,
    validating: bool,
    probes: ProbeSequence,
    observer: Option<Box<dyn SnapshotObserver>>,
}

impl SessionInner {
    fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            messages: self.transcript.messages().to_vec(),
            loading: self.state != TurnState::Idle,
            error: self.error.clone(),
            validation: self.validation,
            validating: self.validating,
            state: self.state,
            model: self.settings.model.clone(),
            has_credential: self.settings.has_credential(),
        }
    }

    fn publish(&mut self) {
        if self.observer.is_none() {
            return;
        }
        let snapshot = self.snapshot();
        if let Some(observer) = self.observer.as_mut() {
            observer.snapshot_changed(&snapshot);
        }
    }

    fn roll_back(&mut self, baseline: usize) {
        while self.transcript.len() > baseline {
            if self.transcript.remove_last().is_err() {
                break;
            }
        }
        self.state = TurnState::Idle;
    }

    fn admit(&self, text: &str) -> Result<()> {
        if text.is_empty() {
            return Err(Error::validation(
                "message is empty",
                Some("text".to_string()),
            ));
        }
        if !self.settings.has_credential() {
            return Err(Error::validation(
                "an API key is required before sending",
                Some("api_key".to_string()),
            ));
        }
        if self.state != TurnState::Idle {
            return Err(Error::validation(
                "a message is already being sent",
                None,
            ));
        }
        if self.validation == ValidationStatus::Invalid {
            return Err(Error::validation(
                "the API key is invalid",
                Some("api_key".to_string()),
            ));
        }
        Ok(())
    }
}

////////////////////////////////////////////// TurnGuard //////////////////////////////////////////////

/// Owns an accepted turn until it is sealed or failed.
///
/// Dropping an armed guard means the `send_message` future was dropped
/// mid-turn; the transcript is restored to `baseline` and the session returns
/// to `Idle`.
struct TurnGuard {
    inner: Arc<Mutex<SessionInner>>,
    baseline: usize,
    armed: bool,
}

impl TurnGuard {
    fn disarm(mut self) -> usize {
        self.armed = false;
        self.baseline
    }
}

impl Drop for TurnGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        SESSION_CANCELLED_TURNS.click();
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        inner.roll_back(self.baseline);
        inner.publish();
    }
}

////////////////////////////////////////// SessionController //////////////////////////////////////////

/// Orchestrates turns and credential probes for one chat session.
///
/// The controller is a cheap handle: clones share the same session, so a
/// probe may run on one clone while a turn runs on another. At most one turn
/// is in flight at a time; a second `send_message` is rejected, not queued.
/// No lock is held across a network await.
pub struct SessionController<T> {
    transport: Arc<T>,
    validator: CredentialValidator<Arc<T>>,
    framing: Framing,
    inner: Arc<Mutex<SessionInner>>,
}

impl<T> Clone for SessionController<T> {
    fn clone(&self) -> Self {
        Self {
            transport: Arc::clone(&self.transport),
            validator: self.validator.clone(),
            framing: self.framing,
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Transport> SessionController<T> {
    /// Creates an idle session with an empty transcript.
    pub fn new(transport: T, settings: SessionSettings) -> Self {
        let transport = Arc::new(transport);
        Self {
            validator: CredentialValidator::new(Arc::clone(&transport)),
            transport,
            framing: Framing::default(),
            inner: Arc::new(Mutex::new(SessionInner {
                settings,
                transcript: Transcript::new(),
                state: TurnState::Idle,
                error: None,
                validation: ValidationStatus::Unknown,
                validating: false,
                probes: ProbeSequence::new(),
                observer: None,
            })),
        }
    }

    /// Sets how response bodies are framed.
    pub fn with_framing(mut self, framing: Framing) -> Self {
        self.framing = framing;
        self
    }

    /// Installs the observer that receives every snapshot.
    pub fn with_observer(self, observer: impl SnapshotObserver + 'static) -> Self {
        self.lock().observer = Some(Box::new(observer));
        self
    }

    /// Returns the current state of the session.
    pub fn snapshot(&self) -> SessionSnapshot {
        self.lock().snapshot()
    }

    /// Returns a copy of the current settings.
    pub fn settings(&self) -> SessionSettings {
        self.lock().settings.clone()
    }

    /// Sends one user message and streams the reply into the transcript.
    ///
    /// Returns `Err` only when the send is rejected up front: the text is
    /// blank, no credential is set, a turn is already in flight, or the
    /// credential is known to be invalid. A rejected send changes nothing.
    /// Once accepted, the turn either seals the assistant message or is
    /// rolled back so the transcript is exactly as it was before the call.
    /// Dropping the returned future mid-turn also rolls the turn back, without
    /// recording an error.
    pub async fn send_message(&self, text: &str) -> Result<TurnOutcome> {
        let text = text.trim();
        let (request, guard) = self.begin_turn(text)?;

        let body = match self.transport.open_stream(&request).await {
            Ok(body) => body,
            Err(err) => return Ok(self.fail_turn(guard, TurnFailure::Open(describe(&err)))),
        };

        self.open_assistant();
        let mut accumulator = ResponseAccumulator::new(body, self.framing.decoder());
        while let Some(item) = accumulator.next().await {
            let applied = item.and_then(|total| self.apply_total(total));
            if let Err(err) = applied {
                return Ok(self.fail_turn(guard, TurnFailure::Read(describe(&err))));
            }
        }

        self.seal_turn(guard);
        Ok(TurnOutcome::Sealed)
    }

    /// Probes the current credential and records the outcome.
    ///
    /// Returns the status in effect afterwards. If the credential changed or
    /// another probe was started while this one was outstanding, the outcome
    /// is discarded and the newer state is returned instead.
    pub async fn validate_credential(&self) -> ValidationStatus {
        let Some((ticket, credential)) = self.begin_probe() else {
            return ValidationStatus::Invalid;
        };
        let status = self.validator.validate(&credential).await;
        self.finish_probe(ticket, status)
    }

    /// Empties the transcript and clears the error.
    ///
    /// Returns false, changing nothing, while a turn is in flight.
    pub fn clear_transcript(&self) -> bool {
        let mut inner = self.lock();
        if inner.state != TurnState::Idle {
            return false;
        }
        inner.transcript.clear();
        inner.error = None;
        inner.publish();
        true
    }

    /// Sets the developer message used by subsequent turns.
    pub fn set_developer_message(&self, message: impl Into<String>) {
        let mut inner = self.lock();
        inner.settings.developer_message = message.into();
        inner.publish();
    }

    /// Sets the model used by subsequent turns.
    pub fn set_model(&self, model: Model) {
        let mut inner = self.lock();
        inner.settings.model = model;
        inner.publish();
    }

    /// Sets the credential and resets validation to `Unknown`.
    ///
    /// Any probe still outstanding for the previous credential is discarded
    /// when it completes.
    pub fn set_credential(&self, credential: impl Into<String>) {
        let mut inner = self.lock();
        inner.settings.credential = credential.into();
        inner.validation = ValidationStatus::Unknown;
        inner.validating = false;
        inner.probes.invalidate();
        inner.publish();
    }

    fn lock(&self) -> MutexGuard<'_, SessionInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn begin_turn(&self, text: &str) -> Result<(ChatRequest, TurnGuard)> {
        let mut inner = self.lock();
        if let Err(err) = inner.admit(text) {
            SESSION_REJECTED_SENDS.click();
            return Err(err);
        }
        SESSION_TURNS.click();
        inner.error = None;
        inner.state = TurnState::Sending;
        let baseline = inner.transcript.len();
        inner.transcript.append(Message::user(text));
        inner.publish();
        let settings = &inner.settings;
        let request = ChatRequest::new(
            settings.developer_message.clone(),
            text,
            settings.model.clone(),
            settings.credential.clone(),
        );
        let guard = TurnGuard {
            inner: Arc::clone(&self.inner),
            baseline,
            armed: true,
        };
        Ok((request, guard))
    }

    fn open_assistant(&self) {
        let mut inner = self.lock();
        inner.state = TurnState::Streaming;
        inner.transcript.append(Message::assistant());
        inner.publish();
    }

    fn apply_total(&self, total: String) -> Result<()> {
        let mut inner = self.lock();
        inner.transcript.replace_last(total)?;
        inner.publish();
        Ok(())
    }

    fn seal_turn(&self, guard: TurnGuard) {
        guard.disarm();
        let mut inner = self.lock();
        inner.transcript.seal_last();
        inner.state = TurnState::Idle;
        inner.publish();
    }

    fn fail_turn(&self, guard: TurnGuard, failure: TurnFailure) -> TurnOutcome {
        SESSION_TURN_FAILURES.click();
        let baseline = guard.disarm();
        let mut inner = self.lock();
        inner.roll_back(baseline);
        inner.error = Some(failure.message().to_string());
        inner.publish();
        TurnOutcome::Failed(failure)
    }

    fn begin_probe(&self) -> Option<(ProbeTicket, String)> {
        let mut inner = self.lock();
        if !inner.settings.has_credential() {
            inner.probes.invalidate();
            inner.validation = ValidationStatus::Invalid;
            inner.validating = false;
            inner.publish();
            return None;
        }
        let ticket = inner.probes.issue();
        inner.validation = ValidationStatus::Unknown;
        inner.validating = true;
        inner.publish();
        Some((ticket, inner.settings.credential.clone()))
    }

    fn finish_probe(&self, ticket: ProbeTicket, status: ValidationStatus) -> ValidationStatus {
        let mut inner = self.lock();
        if inner.probes.is_current(ticket) {
            inner.validation = status;
            inner.validating = false;
            inner.publish();
        } else {
            SESSION_STALE_PROBES.click();
        }
        inner.validation
    }
}

impl<T> fmt::Debug for SessionController<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionController")
            .field("framing", &self.framing)
            .finish_non_exhaustive()
    }
}

/// Renders an error as a single line, whitespace runs collapsed.
fn describe(err: &Error) -> String {
    let text = err.to_string().split_whitespace().collect::<Vec<_>>().join(" ");
    if text.is_empty() {
        FALLBACK_ERROR.to_string()
    } else {
        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot() -> SessionSnapshot {
        SessionSnapshot {
            messages: Vec::new(),
            loading: false,
            error: None,
            validation: ValidationStatus::Unknown,
            validating: false,
            state: TurnState::Idle,
            model: Model::default(),
            has_credential: true,
        }
    }

    #[test]
    fn input_hint_follows_credential() {
        let mut snap = snapshot();
        assert_eq!(
            snap.input_hint(),
            "Type your message... (consider testing your API key first)"
        );
        snap.validation = ValidationStatus::Valid;
        assert_eq!(snap.input_hint(), "Type your message...");
        snap.validation = ValidationStatus::Invalid;
        assert_eq!(snap.input_hint(), "Please validate your API key first");
        snap.has_credential = false;
        assert_eq!(snap.input_hint(), "Please add your API key first");
    }

    #[test]
    fn can_send_rules() {
        let mut snap = snapshot();
        assert!(snap.can_send("Hello"));
        assert!(!snap.can_send("   "));
        snap.loading = true;
        assert!(!snap.can_send("Hello"));
        snap.loading = false;
        snap.validation = ValidationStatus::Invalid;
        assert!(!snap.can_send("Hello"));
        snap.validation = ValidationStatus::Valid;
        snap.has_credential = false;
        assert!(!snap.can_send("Hello"));
    }

    #[test]
    fn settings_debug_redacts_credential() {
        let settings = SessionSettings::default().with_credential("sk-secret");
        let debug = format!("{settings:?}");
        assert!(!debug.contains("sk-secret"));
        assert!(debug.contains("<redacted>"));
        assert!(settings.has_credential());
        assert!(!SessionSettings::default().with_credential("  ").has_credential());
    }

    #[test]
    fn settings_from_config() {
        let config = ChatConfig::new().with_developer_message("Be brief.");
        let settings = SessionSettings::from_config(&config);
        assert_eq!(settings.developer_message, "Be brief.");
        assert_eq!(settings.model, config.model);
        assert!(!settings.has_credential());
    }

    #[test]
    fn turn_failure_message() {
        let failure = TurnFailure::Open("Authentication error: HTTP status 401".to_string());
        assert_eq!(failure.message(), "Authentication error: HTTP status 401");
    }

    #[test]
    fn describe_uses_display() {
        let err = Error::authentication("HTTP status 401");
        assert_eq!(describe(&err), "Authentication error: HTTP status 401");
    }

    #[test]
    fn describe_is_single_line() {
        let err = Error::upstream(502, "HTTP status 502: line one\r\n  line two\n");
        assert_eq!(
            describe(&err),
            "Upstream error: HTTP status 502: line one line two"
        );
    }
}
