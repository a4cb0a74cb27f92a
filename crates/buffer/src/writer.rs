//! The response sink handlers write to.
//!
//! [`ResponseWriter`] is the contract between a handler and whatever emits the response:
//! headers are mutated in place, the status is written once, and body bytes follow. Optional
//! capabilities are exposed through the `flusher`/`hijacker`/`pusher` queries, which return
//! `None` when the sink does not support them.

use http::{HeaderMap, StatusCode};
use std::io;

pub trait ResponseWriter {
    fn headers(&self) -> &HeaderMap;

    fn headers_mut(&mut self) -> &mut HeaderMap;

    /// Sends the status line. Only the first call takes effect.
    fn write_header(&mut self, status: StatusCode);

    /// Writes body bytes, implying `200 OK` if no status was written yet.
    fn write(&mut self, buf: &[u8]) -> io::Result<usize>;

    fn write_all(&mut self, mut buf: &[u8]) -> io::Result<()> {
        while !buf.is_empty() {
            match self.write(buf) {
                Ok(0) => return Err(io::Error::new(io::ErrorKind::WriteZero, "failed to write whole response body")),
                Ok(n) => buf = &buf[n..],
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    /// Sends whatever has been written so far to the client.
    fn flusher(&mut self) -> Option<&mut dyn Flusher> {
        None
    }

    /// Takes over the underlying connection.
    fn hijacker(&mut self) -> Option<&mut dyn Hijacker> {
        None
    }

    /// Initiates a server push.
    fn pusher(&mut self) -> Option<&mut dyn Pusher> {
        None
    }
}

pub trait Flusher {
    fn flush(&mut self) -> io::Result<()>;
}

/// A raw connection taken over from the server.
pub trait Connection: io::Read + io::Write + Send {}

impl<T: io::Read + io::Write + Send> Connection for T {}

pub trait Hijacker {
    fn hijack(&mut self) -> io::Result<Box<dyn Connection>>;
}

pub trait Pusher {
    /// Pushes `target` to the client, as if requested with `headers`.
    fn push(&mut self, target: &str, headers: &HeaderMap) -> io::Result<()>;
}
