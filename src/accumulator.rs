//! Accumulates a streamed response body into a growing message.

use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Instant;

use bytes::Bytes;
use futures::Stream;

use crate::decoder::ChunkDecoder;
use crate::error::Result;
use crate::observability::{
    STREAM_BYTES, STREAM_CHUNKS, STREAM_DURATION, STREAM_ERRORS, STREAM_TTFB,
};

/// A response body as delivered by the transport.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes>> + Send>>;

/// Where an accumulator is in its lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccumulatorState {
    /// Still reading the body.
    Streaming,
    /// The body ended cleanly; the text is final.
    Sealed,
    /// The body failed; nothing more will be produced.
    Failed,
}

/// A stream wrapper that turns body chunks into the full text received so far.
///
/// Every item is the complete accumulated text, never a delta, so a consumer
/// that skips an item still ends up showing everything that arrived. Chunks
/// that decode to nothing (half a character, half an event record) produce no
/// item. The stream ends after the body ends; it cannot be restarted.
pub struct ResponseAccumulator {
    inner: ByteStream,
    decoder: Box<dyn ChunkDecoder>,
    text: String,
    state: AccumulatorState,
    started: Instant,
    saw_first_chunk: bool,
}

impl ResponseAccumulator {
    /// Wraps an opened body with the decoder for its framing.
    pub fn new(inner: ByteStream, decoder: Box<dyn ChunkDecoder>) -> Self {
        Self {
            inner,
            decoder,
            text: String::new(),
            state: AccumulatorState::Streaming,
            started: Instant::now(),
            saw_first_chunk: false,
        }
    }

    /// Returns the text accumulated so far.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Returns the current state.
    pub fn state(&self) -> AccumulatorState {
        self.state
    }

    /// Returns true once the body has ended cleanly.
    pub fn is_sealed(&self) -> bool {
        self.state == AccumulatorState::Sealed
    }

    fn push(&mut self, fragment: &str) -> bool {
        if fragment.is_empty() {
            return false;
        }
        self.text.push_str(fragment);
        STREAM_CHUNKS.click();
        true
    }

    fn seal(&mut self) {
        self.state = AccumulatorState::Sealed;
        STREAM_DURATION.add(self.started.elapsed().as_secs_f64());
    }

    fn fail(&mut self) {
        self.state = AccumulatorState::Failed;
        STREAM_ERRORS.click();
    }
}

impl Stream for ResponseAccumulator {
    type Item = Result<String>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.state != AccumulatorState::Streaming {
            return Poll::Ready(None);
        }
        loop {
            match self.inner.as_mut().poll_next(cx) {
                Poll::Ready(Some(Ok(bytes))) => {
                    if !self.saw_first_chunk {
                        self.saw_first_chunk = true;
                        STREAM_TTFB.add(self.started.elapsed().as_secs_f64());
                    }
                    STREAM_BYTES.count(bytes.len() as u64);
                    match self.decoder.decode(&bytes) {
                        Ok(fragment) => {
                            if self.push(&fragment) {
                                return Poll::Ready(Some(Ok(self.text.clone())));
                            }
                        }
                        Err(err) => {
                            self.fail();
                            return Poll::Ready(Some(Err(err)));
                        }
                    }
                }
                Poll::Ready(Some(Err(err))) => {
                    self.fail();
                    return Poll::Ready(Some(Err(err)));
                }
                Poll::Ready(None) => {
                    return match self.decoder.finish() {
                        Ok(tail) => {
                            let grew = self.push(&tail);
                            self.seal();
                            if grew {
                                Poll::Ready(Some(Ok(self.text.clone())))
                            } else {
                                Poll::Ready(None)
                            }
                        }
                        Err(err) => {
                            self.fail();
                            Poll::Ready(Some(Err(err)))
                        }
                    };
                }
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}
