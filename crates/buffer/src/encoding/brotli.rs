use crate::encoding::{BodyBuffer, EncodeWriter, Encoding};
use ::brotli::CompressorWriter;
use std::io;
use std::io::Write;
use tracing::trace;

const BUFFER_SIZE: usize = 32 * 1024;

/// `br` content encoding.
///
/// The brotli compressor has no way to swap its output, so each request gets its own.
#[derive(Debug, Clone, Copy)]
pub struct Brotli {
    quality: u32,
    lgwin: u32,
}

impl Brotli {
    /// `quality` is clamped to 0-11.
    pub fn new(quality: u32) -> Self {
        Self { quality: quality.min(11), lgwin: 22 }
    }
}

impl Default for Brotli {
    fn default() -> Self {
        Self::new(4)
    }
}

impl Encoding for Brotli {
    fn name(&self) -> &str {
        "br"
    }

    fn open(&self, sink: BodyBuffer) -> io::Result<Box<dyn EncodeWriter>> {
        Ok(Box::new(BrotliWriter(Box::new(CompressorWriter::new(sink, BUFFER_SIZE, self.quality, self.lgwin)))))
    }
}

struct BrotliWriter(Box<CompressorWriter<BodyBuffer>>);

impl io::Write for BrotliWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.0.flush()
    }
}

impl EncodeWriter for BrotliWriter {
    fn finish(self: Box<Self>) -> io::Result<BodyBuffer> {
        let BrotliWriter(encoder) = *self;
        let mut encoder = *encoder;
        encoder.flush()?;
        // into_inner writes the final meta-block
        let body = encoder.into_inner();
        trace!(output = body.len(), "finished brotli stream");
        Ok(body)
    }
}
