//! A streaming chat client core.
//!
//! The crate keeps a chat transcript, streams each reply from a chat endpoint
//! into the transcript as it arrives, and rolls a turn back completely when
//! the request or the stream fails. [`SessionController`] is the entry point;
//! [`ChatClient`] is the HTTP transport it is normally paired with.

// Public modules
pub mod accumulator;
pub mod client;
pub mod client_logger;
pub mod commands;
pub mod config;
pub mod credential;
pub mod decoder;
pub mod error;
pub mod render;
pub mod session;
pub mod sse;
pub mod transcript;
pub mod types;

mod observability;

// Re-exports
pub use accumulator::{AccumulatorState, ByteStream, ResponseAccumulator};
pub use client::{ChatClient, Transport};
pub use client_logger::{ClientLogger, StderrLogger};
pub use config::{ChatArgs, ChatConfig};
pub use credential::{CredentialValidator, ProbeSequence, ProbeTicket};
pub use decoder::{ChunkDecoder, Framing, PlainTextDecoder};
pub use error::{Error, Result};
pub use observability::register_biometrics;
pub use render::{PlainTextRenderer, Renderer, TerminalPresenter};
pub use session::{
    SessionController, SessionSettings, SessionSnapshot, SnapshotObserver, TurnFailure,
    TurnOutcome, TurnState,
};
pub use sse::EventStreamDecoder;
pub use transcript::Transcript;
pub use types::*;
