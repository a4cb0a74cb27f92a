//! Content encodings applied to buffered response bodies.
//!
//! An [`Encoding`] turns a [`BodyBuffer`] into a transforming [`EncodeWriter`] and takes it
//! back once the handler is done. The buffer moves into the writer on [`Encoding::open`] and
//! comes back out of [`Encoding::close`], so a body can only be read after its encoder has
//! been flushed and closed.
//!
//! Provided encodings:
//! - [`Identity`]: passthrough, wire name `""` (no `Content-Encoding` header)
//! - [`Gzip`]: `gzip` (and the legacy `x-gzip` alias)
//! - [`Deflate`]: `deflate`, the zlib wrapped format
//! - [`Brotli`]: `br`
//! - [`Zstd`]: `zstd`
//!
//! The gzip and deflate encoders keep a private pool of encoder states which are reset
//! between requests; brotli and zstd build a fresh encoder per request.

use crate::pool::Reusable;
use bytes::BytesMut;
use std::fmt;
use std::io;

mod brotli;
mod deflate;
mod gzip;
mod zstd;

pub use self::brotli::Brotli;
pub use self::deflate::Deflate;
pub use self::gzip::Gzip;
pub use self::zstd::Zstd;

/// A named byte-stream transform that can be negotiated through `Accept-Encoding`.
pub trait Encoding: Send + Sync {
    /// The wire name used in `Content-Encoding`, empty for identity.
    fn name(&self) -> &str;

    /// Wraps `sink` in a transforming writer.
    fn open(&self, sink: BodyBuffer) -> io::Result<Box<dyn EncodeWriter>>;

    /// Flushes everything still held by `writer` into its sink and returns the sink.
    fn close(&self, writer: Box<dyn EncodeWriter>) -> io::Result<BodyBuffer> {
        writer.finish()
    }
}

impl fmt::Debug for dyn Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Encoding").field(&self.name()).finish()
    }
}

/// The writer side of an opened [`Encoding`].
pub trait EncodeWriter: io::Write + Send {
    /// Writes any trailing encoded bytes and hands back the sink.
    fn finish(self: Box<Self>) -> io::Result<BodyBuffer>;
}

/// In-memory sink that collects a response body.
#[derive(Debug, Default)]
pub struct BodyBuffer {
    buf: BytesMut,
}

impl BodyBuffer {
    pub fn with_capacity(capacity: usize) -> Self {
        Self { buf: BytesMut::with_capacity(capacity) }
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.buf.capacity()
    }

    /// Ensures room for at least `capacity` bytes past the current length.
    pub fn reserve(&mut self, capacity: usize) {
        self.buf.reserve(capacity);
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    /// Truncates to zero length, keeping the allocation.
    pub fn clear(&mut self) {
        self.buf.clear();
    }

    pub(crate) fn extend_from_slice(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
    }
}

impl io::Write for BodyBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buf.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Reusable for BodyBuffer {
    fn reset(&mut self) {
        self.clear();
    }
}

/// The passthrough encoding.
#[derive(Debug, Default, Clone, Copy)]
pub struct Identity;

impl Encoding for Identity {
    fn name(&self) -> &str {
        ""
    }

    fn open(&self, sink: BodyBuffer) -> io::Result<Box<dyn EncodeWriter>> {
        Ok(Box::new(IdentityWriter(sink)))
    }
}

struct IdentityWriter(BodyBuffer);

impl io::Write for IdentityWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        io::Write::write(&mut self.0, buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl EncodeWriter for IdentityWriter {
    fn finish(self: Box<Self>) -> io::Result<BodyBuffer> {
        Ok(self.0)
    }
}
