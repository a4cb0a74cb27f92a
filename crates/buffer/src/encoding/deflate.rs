use crate::encoding::{BodyBuffer, EncodeWriter, Encoding};
use crate::pool::{Pool, Reusable};
use flate2::Compression;
use flate2::write::ZlibEncoder;
use std::io;
use std::sync::Arc;
use tracing::{error, trace};

/// `deflate` content encoding, i.e. a zlib wrapped deflate stream.
#[derive(Clone)]
pub struct Deflate {
    pool: Arc<Pool<DeflateState>>,
}

impl Deflate {
    /// Creates a deflate encoding at compression `level` (0-9).
    pub fn new(level: u32) -> Self {
        let compression = Compression::new(level.min(9));
        Self { pool: Arc::new(Pool::new(move || DeflateState(ZlibEncoder::new(BodyBuffer::default(), compression)))) }
    }
}

impl Default for Deflate {
    fn default() -> Self {
        Self::new(Compression::best().level())
    }
}

impl std::fmt::Debug for Deflate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Deflate").finish_non_exhaustive()
    }
}

impl Encoding for Deflate {
    fn name(&self) -> &str {
        "deflate"
    }

    fn open(&self, sink: BodyBuffer) -> io::Result<Box<dyn EncodeWriter>> {
        let mut state = self.pool.take();
        *state.0.get_mut() = sink;
        Ok(Box::new(DeflateWriter { state, pool: Arc::clone(&self.pool) }))
    }
}

pub(crate) struct DeflateState(ZlibEncoder<BodyBuffer>);

impl Reusable for DeflateState {
    fn reset(&mut self) {
        self.0.get_mut().clear();
    }
}

struct DeflateWriter {
    state: DeflateState,
    pool: Arc<Pool<DeflateState>>,
}

impl io::Write for DeflateWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        io::Write::write(&mut self.state.0, buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        io::Write::flush(&mut self.state.0)
    }
}

impl EncodeWriter for DeflateWriter {
    fn finish(self: Box<Self>) -> io::Result<BodyBuffer> {
        let DeflateWriter { state, pool } = *self;

        pool.recycle_with(state, |state| {
            if let Err(e) = state.0.try_finish() {
                error!(cause = %e, "failed to finish deflate stream, dropping encoder state");
                return Err(e);
            }
            let input = state.0.total_in();
            let body = state.0.reset(BodyBuffer::default())?;
            trace!(input, output = body.len(), "finished deflate stream");
            Ok(body)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoding::tests::encode_chunks;
    use flate2::read::ZlibDecoder;
    use std::io::Read;

    fn inflate(data: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        ZlibDecoder::new(data).read_to_end(&mut out).unwrap();
        out
    }

    #[test]
    fn produces_zlib_stream() {
        let deflate = Deflate::default();
        let encoded = encode_chunks(&deflate, &[b"hello, ", b"world"]);
        assert_eq!(inflate(&encoded), b"hello, world");
    }

    #[test]
    fn reused_state_does_not_carry_over() {
        let deflate = Deflate::new(1);
        let first = encode_chunks(&deflate, &[b"aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa"]);
        let second = encode_chunks(&deflate, &[b"bbbb"]);

        assert_eq!(deflate.pool.idle(), 1);
        assert_eq!(inflate(&first), b"aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa");
        assert_eq!(inflate(&second), b"bbbb");
    }
}
