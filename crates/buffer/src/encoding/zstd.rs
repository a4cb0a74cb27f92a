use crate::encoding::{BodyBuffer, EncodeWriter, Encoding};
use ::zstd::stream::write::Encoder as ZstdEncoder;
use std::io;
use tracing::trace;

/// `zstd` content encoding.
#[derive(Debug, Clone, Copy)]
pub struct Zstd {
    level: i32,
}

impl Zstd {
    pub fn new(level: i32) -> Self {
        Self { level }
    }
}

impl Default for Zstd {
    fn default() -> Self {
        Self::new(::zstd::DEFAULT_COMPRESSION_LEVEL)
    }
}

impl Encoding for Zstd {
    fn name(&self) -> &str {
        "zstd"
    }

    fn open(&self, sink: BodyBuffer) -> io::Result<Box<dyn EncodeWriter>> {
        let encoder = ZstdEncoder::new(sink, self.level)?;
        Ok(Box::new(ZstdWriter(encoder)))
    }
}

struct ZstdWriter(ZstdEncoder<'static, BodyBuffer>);

impl io::Write for ZstdWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        io::Write::write(&mut self.0, buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        io::Write::flush(&mut self.0)
    }
}

impl EncodeWriter for ZstdWriter {
    fn finish(self: Box<Self>) -> io::Result<BodyBuffer> {
        let body = self.0.finish()?;
        trace!(output = body.len(), "finished zstd stream");
        Ok(body)
    }
}
