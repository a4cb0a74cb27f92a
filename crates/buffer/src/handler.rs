//! Handlers and the buffering handler that wraps them.
//!
//! A [`Handler`] writes its response to a [`ResponseWriter`]. [`BufferHandler`] wraps another
//! handler, negotiates a content-encoding, lets the inner handler write into a pooled buffer
//! and only then emits the response with an exact `Content-Length`.
//!
//! Per request:
//! 1. negotiate against the registry; on failure answer `406 Not Acceptable` without calling
//!    the inner handler
//! 2. remove `Accept-Encoding` from the request so the inner handler does not encode again
//! 3. borrow a response state and a body buffer from the pools and open the encoder
//! 4. run the inner handler against an [`InterceptWriter`]
//! 5. close the encoder, decide status and headers, write status then body to the real sink
//! 6. the pool guards reset and release the borrowed objects, also when the handler fails or
//!    the request future is dropped half way

use crate::config::BufferConfig;
use crate::encoding::{BodyBuffer, Encoding};
use crate::error::{BoxError, BufferError};
use crate::intercept::{Finalized, InterceptWriter, ResponseState};
use crate::pool::{Pool, Pooled};
use crate::registry::Registry;
use crate::writer::ResponseWriter;
use async_trait::async_trait;
use http::header::{ACCEPT_ENCODING, CONTENT_ENCODING, CONTENT_LENGTH, HeaderMap, HeaderValue, VARY};
use http::{Request, StatusCode};
use std::fmt;
use std::io;
use std::mem;
use std::sync::Arc;
use tower_layer::Layer;
use tracing::{debug, trace, warn};

#[async_trait]
pub trait Handler<ReqBody>: Send + Sync {
    async fn serve(&self, writer: &mut (dyn ResponseWriter + Send), req: Request<ReqBody>) -> Result<(), BoxError>;
}

#[async_trait]
impl<ReqBody, H> Handler<ReqBody> for Arc<H>
where
    ReqBody: Send + 'static,
    H: Handler<ReqBody> + ?Sized,
{
    async fn serve(&self, writer: &mut (dyn ResponseWriter + Send), req: Request<ReqBody>) -> Result<(), BoxError> {
        (**self).serve(writer, req).await
    }
}

/// A [`Handler`] built from a synchronous closure, see [`handler_fn`].
#[derive(Debug, Clone, Copy)]
pub struct HandlerFn<F> {
    f: F,
}

pub fn handler_fn<ReqBody, F>(f: F) -> HandlerFn<F>
where
    F: Fn(&mut (dyn ResponseWriter + Send), Request<ReqBody>) -> Result<(), BoxError>,
{
    HandlerFn { f }
}

#[async_trait]
impl<ReqBody, F> Handler<ReqBody> for HandlerFn<F>
where
    ReqBody: Send + 'static,
    F: Fn(&mut (dyn ResponseWriter + Send), Request<ReqBody>) -> Result<(), BoxError> + Send + Sync,
{
    async fn serve(&self, writer: &mut (dyn ResponseWriter + Send), req: Request<ReqBody>) -> Result<(), BoxError> {
        (self.f)(writer, req)
    }
}

/// Buffers the inner handler's response so it can be encoded and sent with a `Content-Length`.
pub struct BufferHandler<H> {
    handler: H,
    registry: Arc<Registry>,
    states: Pool<ResponseState>,
    buffers: Pool<BodyBuffer>,
    initial_capacity: usize,
}

pub struct BufferHandlerBuilder<H> {
    handler: H,
    registry: Option<Arc<Registry>>,
    config: BufferConfig,
}

impl<H> BufferHandlerBuilder<H> {
    fn new(handler: H) -> Self {
        Self { handler, registry: None, config: BufferConfig::default() }
    }

    /// Negotiate against `registry` instead of one built from the config.
    pub fn registry(mut self, registry: Arc<Registry>) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn config(mut self, config: BufferConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> BufferHandler<H> {
        let registry = self.registry.unwrap_or_else(|| Arc::new(self.config.registry()));
        BufferHandler {
            handler: self.handler,
            registry,
            states: Pool::with_max_idle(self.config.max_idle, ResponseState::new),
            buffers: Pool::with_max_idle(self.config.max_idle, BodyBuffer::default),
            initial_capacity: self.config.initial_capacity,
        }
    }
}

impl<H> BufferHandler<H> {
    /// Wraps `handler` with the default config and its registry.
    pub fn new(handler: H) -> Self {
        Self::builder(handler).build()
    }

    pub fn builder(handler: H) -> BufferHandlerBuilder<H> {
        BufferHandlerBuilder::new(handler)
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    pub fn inner(&self) -> &H {
        &self.handler
    }

    /// Idle response states and body buffers waiting in the pools.
    pub fn idle(&self) -> (usize, usize) {
        (self.states.idle(), self.buffers.idle())
    }

    /// Serves `req` through the inner handler and writes the buffered response to `sink`.
    ///
    /// On [`BufferError::NotAcceptable`] a `406` has already been written to `sink`; on any
    /// other error nothing has been written and the caller decides how to answer.
    pub async fn handle<ReqBody>(
        &self,
        sink: &mut (dyn ResponseWriter + Send),
        mut req: Request<ReqBody>,
    ) -> Result<(), BufferError>
    where
        H: Handler<ReqBody>,
        ReqBody: Send + 'static,
    {
        let negotiated = match self.registry.negotiate(req.headers()) {
            Ok(negotiated) => negotiated,
            Err(e) => {
                not_acceptable(sink);
                return Err(e);
            }
        };
        req.headers_mut().remove(ACCEPT_ENCODING);
        let encoding = negotiated.encoding();

        let mut loan =
            Loan { state: self.states.acquire(), buffer: self.buffers.acquire(), encoding: encoding.as_ref() };
        loan.buffer.reserve(self.initial_capacity);
        let sink_buffer = mem::take(&mut *loan.buffer);
        loan.state.begin(encoding.open(sink_buffer)?);

        let result = {
            let mut writer = InterceptWriter::new(&mut loan.state, &mut *sink);
            self.handler.serve(&mut writer, req).await
        };
        if let Err(e) = result {
            warn!(cause = %e, "inner handler failed, discarding buffered response");
            return Err(BufferError::handler(e));
        }

        let Finalized { status, has_body, body } = loan.state.finalize(loan.encoding)?;
        *loan.buffer = body;
        emit(sink, negotiated.name(), status, has_body, &loan.buffer)?;
        Ok(())
    }
}

/// The pooled objects one request borrows.
///
/// A request that ends before finalizing (handler error, dropped future) still closes its
/// encoder here, so the body buffer goes back to its pool with its allocation.
struct Loan<'a> {
    state: Pooled<'a, ResponseState>,
    buffer: Pooled<'a, BodyBuffer>,
    encoding: &'a dyn Encoding,
}

impl Drop for Loan<'_> {
    fn drop(&mut self) {
        if let Some(body) = self.state.abandon(self.encoding) {
            *self.buffer = body;
        }
    }
}

impl<H> fmt::Debug for BufferHandler<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BufferHandler")
            .field("registry", &self.registry)
            .field("initial_capacity", &self.initial_capacity)
            .finish_non_exhaustive()
    }
}

impl<H> fmt::Debug for BufferHandlerBuilder<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BufferHandlerBuilder")
            .field("registry", &self.registry)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl<ReqBody, H> Handler<ReqBody> for BufferHandler<H>
where
    ReqBody: Send + 'static,
    H: Handler<ReqBody>,
{
    async fn serve(&self, writer: &mut (dyn ResponseWriter + Send), req: Request<ReqBody>) -> Result<(), BoxError> {
        match self.handle(writer, req).await {
            // the 406 response is already written
            Ok(()) | Err(BufferError::NotAcceptable { .. }) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

fn not_acceptable(sink: &mut (dyn ResponseWriter + Send)) {
    sink.headers_mut().insert(CONTENT_LENGTH, HeaderValue::from(0));
    sink.write_header(StatusCode::NOT_ACCEPTABLE);
}

fn emit(
    sink: &mut (dyn ResponseWriter + Send),
    encoding: &str,
    status: StatusCode,
    has_body: bool,
    body: &BodyBuffer,
) -> io::Result<()> {
    let has_body = if has_body && !permits_body(status) {
        warn!(%status, len = body.len(), "status does not permit a body, dropping it");
        false
    } else {
        has_body
    };

    let headers = sink.headers_mut();
    if has_body {
        if !encoding.is_empty() {
            set_content_encoding(headers, encoding)?;
        }
        add_vary(headers);
        headers.insert(CONTENT_LENGTH, HeaderValue::from(body.len()));
    } else {
        headers.remove(CONTENT_ENCODING);
        if permits_body(status) {
            headers.insert(CONTENT_LENGTH, HeaderValue::from(0));
        } else {
            headers.remove(CONTENT_LENGTH);
        }
    }

    debug!(%status, encoding, len = if has_body { body.len() } else { 0 }, "writing buffered response");
    sink.write_header(status);
    if has_body {
        if let Err(e) = sink.write_all(body.as_bytes()) {
            warn!(cause = %e, "failed to write buffered response");
            return Err(e);
        }
    }
    Ok(())
}

fn permits_body(status: StatusCode) -> bool {
    !(status.is_informational() || status == StatusCode::NO_CONTENT || status == StatusCode::NOT_MODIFIED)
}

// a coding the handler applied itself stays first, ours goes on top
fn set_content_encoding(headers: &mut HeaderMap, encoding: &str) -> io::Result<()> {
    let value = match headers.get(CONTENT_ENCODING).and_then(|v| v.to_str().ok()) {
        Some(existing) if !existing.trim().is_empty() => {
            trace!(existing, encoding, "response already carries a content-encoding");
            format!("{existing}, {encoding}")
        }
        _ => encoding.to_string(),
    };
    let value = HeaderValue::try_from(value).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    headers.insert(CONTENT_ENCODING, value);
    Ok(())
}

fn add_vary(headers: &mut HeaderMap) {
    let covered = headers.get_all(VARY).iter().filter_map(|v| v.to_str().ok()).flat_map(|v| v.split(',')).any(|v| {
        let v = v.trim();
        v == "*" || v.eq_ignore_ascii_case(ACCEPT_ENCODING.as_str())
    });
    if !covered {
        headers.append(VARY, HeaderValue::from_static("accept-encoding"));
    }
}

/// A [`Layer`] that wraps handlers in a [`BufferHandler`] sharing one registry.
#[derive(Debug, Clone)]
pub struct BufferLayer {
    registry: Arc<Registry>,
    config: BufferConfig,
}

impl BufferLayer {
    pub fn new(config: BufferConfig) -> Self {
        Self { registry: Arc::new(config.registry()), config }
    }

    pub fn with_registry(registry: Arc<Registry>, config: BufferConfig) -> Self {
        Self { registry, config }
    }
}

impl Default for BufferLayer {
    fn default() -> Self {
        Self::new(BufferConfig::default())
    }
}

impl<H> Layer<H> for BufferLayer {
    type Service = BufferHandler<H>;

    fn layer(&self, inner: H) -> Self::Service {
        BufferHandler::builder(inner).registry(Arc::clone(&self.registry)).config(self.config.clone()).build()
    }
}
