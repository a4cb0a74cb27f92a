use crate::encoding::{BodyBuffer, EncodeWriter, Encoding};
use crate::pool::{Pool, Reusable};
use flate2::write::DeflateEncoder;
use flate2::{Compression, Crc};
use std::io;
use std::sync::Arc;
use tracing::{error, trace};

const GZIP_MAGIC: [u8; 3] = [0x1f, 0x8b, 0x08];
// RFC 1952 OS field: unknown
const OS_UNKNOWN: u8 = 0xff;

/// Gzip content encoding.
///
/// The stream is written as a raw deflate body framed by a gzip header and a CRC32/size
/// trailer, which lets the deflate state be reset and reused instead of rebuilt per request.
#[derive(Clone)]
pub struct Gzip {
    name: &'static str,
    header: [u8; 10],
    pool: Arc<Pool<GzipState>>,
}

impl Gzip {
    /// Creates a gzip encoding at compression `level` (0-9).
    pub fn new(level: u32) -> Self {
        let compression = Compression::new(level.min(9));
        Self {
            name: "gzip",
            header: header(compression),
            pool: Arc::new(Pool::new(move || GzipState::new(compression))),
        }
    }

    /// The same encoder registered under the legacy `x-gzip` token.
    ///
    /// Both names share one pool of encoder states.
    pub fn x_gzip(&self) -> Self {
        Self { name: "x-gzip", ..self.clone() }
    }
}

impl Default for Gzip {
    fn default() -> Self {
        Self::new(Compression::best().level())
    }
}

impl std::fmt::Debug for Gzip {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Gzip").field("name", &self.name).finish_non_exhaustive()
    }
}

impl Encoding for Gzip {
    fn name(&self) -> &str {
        self.name
    }

    fn open(&self, mut sink: BodyBuffer) -> io::Result<Box<dyn EncodeWriter>> {
        sink.extend_from_slice(&self.header);
        let mut state = self.pool.take();
        *state.encoder.get_mut() = sink;
        Ok(Box::new(GzipWriter { state, pool: Arc::clone(&self.pool) }))
    }
}

fn header(compression: Compression) -> [u8; 10] {
    let xfl = match compression.level() {
        9 => 2,
        1 => 4,
        _ => 0,
    };
    let [m0, m1, cm] = GZIP_MAGIC;
    // no flags, no mtime
    [m0, m1, cm, 0, 0, 0, 0, 0, xfl, OS_UNKNOWN]
}

pub(crate) struct GzipState {
    encoder: DeflateEncoder<BodyBuffer>,
    crc: Crc,
}

impl GzipState {
    fn new(compression: Compression) -> Self {
        Self { encoder: DeflateEncoder::new(BodyBuffer::default(), compression), crc: Crc::new() }
    }
}

impl Reusable for GzipState {
    fn reset(&mut self) {
        self.encoder.get_mut().clear();
        self.crc.reset();
    }
}

struct GzipWriter {
    state: GzipState,
    pool: Arc<Pool<GzipState>>,
}

impl io::Write for GzipWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = io::Write::write(&mut self.state.encoder, buf)?;
        self.state.crc.update(&buf[..n]);
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        io::Write::flush(&mut self.state.encoder)
    }
}

impl EncodeWriter for GzipWriter {
    fn finish(self: Box<Self>) -> io::Result<BodyBuffer> {
        let GzipWriter { state, pool } = *self;

        pool.recycle_with(state, |state| {
            if let Err(e) = state.encoder.try_finish() {
                error!(cause = %e, "failed to finish gzip stream, dropping encoder state");
                return Err(e);
            }
            // swaps in an empty sink and clears the deflate stream for the next borrower
            let mut body = state.encoder.reset(BodyBuffer::default())?;
            body.extend_from_slice(&state.crc.sum().to_le_bytes());
            body.extend_from_slice(&state.crc.amount().to_le_bytes());
            trace!(input = state.crc.amount(), output = body.len(), "finished gzip stream");
            Ok(body)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoding::tests::encode_chunks;
    use flate2::read::GzDecoder;
    use std::io::Read;

    fn gunzip(data: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        GzDecoder::new(data).read_to_end(&mut out).unwrap();
        out
    }

    #[test]
    fn produces_valid_gzip() {
        let gzip = Gzip::default();
        let encoded = encode_chunks(&gzip, &[b"hello, ", b"world"]);

        assert_eq!(&encoded[..3], &GZIP_MAGIC);
        assert_eq!(gunzip(&encoded), b"hello, world");
    }

    #[test]
    fn reused_state_does_not_carry_over() {
        let gzip = Gzip::new(6);
        let first = encode_chunks(&gzip, &[b"first request body, first request body"]);
        assert_eq!(gzip.pool.idle(), 1);

        let second = encode_chunks(&gzip, &[b"second"]);
        assert_eq!(gzip.pool.idle(), 1);

        assert_eq!(gunzip(&first), b"first request body, first request body");
        assert_eq!(gunzip(&second), b"second");
    }

    #[test]
    fn empty_input_is_still_a_valid_stream() {
        let encoded = encode_chunks(&Gzip::default(), &[]);
        assert!(!encoded.is_empty());
        assert!(gunzip(&encoded).is_empty());
    }

    #[test]
    fn x_gzip_shares_the_pool() {
        let gzip = Gzip::default();
        let alias = gzip.x_gzip();
        assert_eq!(alias.name(), "x-gzip");

        let encoded = encode_chunks(&alias, &[b"aliased"]);
        assert_eq!(gunzip(&encoded), b"aliased");
        assert_eq!(gzip.pool.idle(), 1);
    }
}
