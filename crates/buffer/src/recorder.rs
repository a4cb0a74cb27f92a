//! An in-memory [`ResponseWriter`] that turns what was written into an `http::Response`.

use crate::writer::{Flusher, Pusher, ResponseWriter};
use bytes::{Bytes, BytesMut};
use http::{HeaderMap, Response, StatusCode};
use std::io;
use tracing::debug;

/// Records a response the way a real connection would send it.
///
/// The first `write_header` (or the first `write`, which implies `200 OK`) fixes the status.
/// Flushes and pushes are counted so tests can check what a handler attempted.
#[derive(Debug, Default)]
pub struct ResponseRecorder {
    status: Option<StatusCode>,
    headers: HeaderMap,
    body: BytesMut,
    flushes: usize,
    pushes: Vec<String>,
}

impl ResponseRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(&self) -> Option<StatusCode> {
        self.status
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn flushes(&self) -> usize {
        self.flushes
    }

    pub fn pushes(&self) -> &[String] {
        &self.pushes
    }

    /// Builds the recorded response; a response nobody wrote to is `200 OK` with no body.
    pub fn into_response(self) -> Response<Bytes> {
        let mut response = Response::new(self.body.freeze());
        *response.status_mut() = self.status.unwrap_or(StatusCode::OK);
        *response.headers_mut() = self.headers;
        response
    }
}

impl ResponseWriter for ResponseRecorder {
    fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    fn write_header(&mut self, status: StatusCode) {
        if let Some(current) = self.status {
            debug!(%status, %current, "status already written");
            return;
        }
        self.status = Some(status);
    }

    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.status.is_none() {
            self.status = Some(StatusCode::OK);
        }
        self.body.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flusher(&mut self) -> Option<&mut dyn Flusher> {
        Some(self)
    }

    fn pusher(&mut self) -> Option<&mut dyn Pusher> {
        Some(self)
    }
}

impl Flusher for ResponseRecorder {
    fn flush(&mut self) -> io::Result<()> {
        self.flushes += 1;
        Ok(())
    }
}

impl Pusher for ResponseRecorder {
    fn push(&mut self, target: &str, _headers: &HeaderMap) -> io::Result<()> {
        self.pushes.push(target.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_implies_ok() {
        let mut recorder = ResponseRecorder::new();
        recorder.write_all(b"hello").unwrap();
        recorder.write_header(StatusCode::NOT_FOUND);

        let response = recorder.into_response();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.body().as_ref(), b"hello");
    }

    #[test]
    fn first_status_wins() {
        let mut recorder = ResponseRecorder::new();
        recorder.write_header(StatusCode::NO_CONTENT);
        recorder.write_header(StatusCode::OK);
        assert_eq!(recorder.status(), Some(StatusCode::NO_CONTENT));
    }

    #[test]
    fn capabilities() {
        let mut recorder = ResponseRecorder::new();
        recorder.flusher().unwrap().flush().unwrap();
        recorder.pusher().unwrap().push("/style.css", &HeaderMap::new()).unwrap();
        assert!(recorder.hijacker().is_none());

        assert_eq!(recorder.flushes(), 1);
        assert_eq!(recorder.pushes(), ["/style.css"]);
    }
}
