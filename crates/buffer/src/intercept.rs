//! Capturing a handler's response in memory.
//!
//! [`ResponseState`] is the pooled per-request state: the status the handler asked for, the
//! open encoder (which owns the body buffer) and whether any body bytes arrived. It moves
//! through a small state machine:
//!
//! ```text
//! Idle --begin--> HeadersPending --write--> BodyWritten
//!                        |                       |
//!                        +-------finalize--------+--> Finalized --reset--> Idle
//! ```
//!
//! [`InterceptWriter`] is what the inner handler sees. It borrows the state and the real sink
//! for one handler call only, so nothing can keep writing into a state once it is finalized
//! or hold on to a previous request's sink after release.

use crate::encoding::{BodyBuffer, EncodeWriter, Encoding};
use crate::pool::Reusable;
use crate::writer::{Pusher, ResponseWriter};
use http::{HeaderMap, StatusCode};
use std::fmt;
use std::io;
use tracing::{debug, trace, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    /// Sitting in the pool.
    #[default]
    Idle,
    /// Encoder open, nothing written yet; a status may still be set.
    HeadersPending,
    /// At least one write happened, the status is fixed.
    BodyWritten,
    Finalized,
}

/// The result of finalizing a [`ResponseState`].
#[derive(Debug)]
pub(crate) struct Finalized {
    pub status: StatusCode,
    /// Whether the handler produced any body bytes.
    pub has_body: bool,
    /// The encoded body; only meaningful when `has_body` is set.
    pub body: BodyBuffer,
}

#[derive(Default)]
pub struct ResponseState {
    phase: Phase,
    status: Option<StatusCode>,
    writer: Option<Box<dyn EncodeWriter>>,
    has_body: bool,
}

impl ResponseState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// The status set explicitly by the handler, if any.
    pub fn status(&self) -> Option<StatusCode> {
        self.status
    }

    pub fn has_body(&self) -> bool {
        self.has_body
    }

    pub(crate) fn begin(&mut self, writer: Box<dyn EncodeWriter>) {
        debug_assert_eq!(self.phase, Phase::Idle, "response state handed out without reset");
        self.writer = Some(writer);
        self.phase = Phase::HeadersPending;
    }

    fn write_header(&mut self, status: StatusCode) {
        match (self.phase, self.status) {
            (Phase::HeadersPending, None) => {
                trace!(%status, "recorded response status");
                self.status = Some(status);
            }
            (phase, current) => {
                debug!(%status, ?current, ?phase, "superfluous write_header call ignored");
            }
        }
    }

    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let writer = match (self.phase, self.writer.as_mut()) {
            (Phase::HeadersPending | Phase::BodyWritten, Some(writer)) => writer,
            (phase, _) => {
                return Err(io::Error::other(format!("write on response state in phase {phase:?}")));
            }
        };

        // the status is fixed from the first write on, even an empty one
        self.phase = Phase::BodyWritten;
        if let Err(e) = writer.write_all(buf) {
            warn!(cause = %e, "failed to write response body into buffer");
            return Err(e);
        }
        if !buf.is_empty() {
            self.has_body = true;
        }
        trace!(len = buf.len(), "buffered response body");
        Ok(buf.len())
    }

    /// Closes the encoder and decides the final status.
    ///
    /// No body means `204 No Content` unless the handler chose a status itself; otherwise
    /// the handler's status or `200 OK`.
    pub(crate) fn finalize(&mut self, encoding: &dyn Encoding) -> io::Result<Finalized> {
        let writer = match (self.phase, self.writer.take()) {
            (Phase::HeadersPending | Phase::BodyWritten, Some(writer)) => writer,
            (phase, _) => {
                return Err(io::Error::other(format!("finalize on response state in phase {phase:?}")));
            }
        };
        self.phase = Phase::Finalized;

        let body = encoding.close(writer)?;
        let status = match (self.status, self.has_body) {
            (Some(status), _) => status,
            (None, true) => StatusCode::OK,
            (None, false) => StatusCode::NO_CONTENT,
        };
        Ok(Finalized { status, has_body: self.has_body, body })
    }

    /// Closes an encoder that will never be finalized and returns its buffer.
    ///
    /// Returns `None` once finalized, or when closing fails.
    pub(crate) fn abandon(&mut self, encoding: &dyn Encoding) -> Option<BodyBuffer> {
        let writer = self.writer.take()?;
        self.phase = Phase::Finalized;
        match encoding.close(writer) {
            Ok(body) => Some(body),
            Err(e) => {
                debug!(cause = %e, "failed to close abandoned encoder");
                None
            }
        }
    }
}

impl Reusable for ResponseState {
    fn reset(&mut self) {
        *self = Self::new();
    }
}

impl fmt::Debug for ResponseState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResponseState")
            .field("phase", &self.phase)
            .field("status", &self.status)
            .field("writer", &self.writer.is_some())
            .field("has_body", &self.has_body)
            .finish()
    }
}

/// The [`ResponseWriter`] handed to the inner handler on the buffered path.
///
/// Headers go straight to the real sink. Status and body are captured. Flushing and
/// hijacking are hidden since the body is not final yet; pushing is passed through.
pub struct InterceptWriter<'a> {
    state: &'a mut ResponseState,
    sink: &'a mut (dyn ResponseWriter + Send),
}

impl<'a> InterceptWriter<'a> {
    pub(crate) fn new(state: &'a mut ResponseState, sink: &'a mut (dyn ResponseWriter + Send)) -> Self {
        Self { state, sink }
    }
}

impl ResponseWriter for InterceptWriter<'_> {
    fn headers(&self) -> &HeaderMap {
        self.sink.headers()
    }

    fn headers_mut(&mut self) -> &mut HeaderMap {
        self.sink.headers_mut()
    }

    fn write_header(&mut self, status: StatusCode) {
        self.state.write_header(status);
    }

    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.state.write(buf)
    }

    fn pusher(&mut self) -> Option<&mut dyn Pusher> {
        self.sink.pusher()
    }
}

impl fmt::Debug for InterceptWriter<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InterceptWriter").field("state", &self.state).finish_non_exhaustive()
    }
}
