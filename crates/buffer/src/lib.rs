//! Response buffering with content-encoding negotiation.
//!
//! This crate wraps a request handler so that everything it writes is collected in memory,
//! optionally compressed, and only then sent with an exact `Content-Length` and the right
//! status code. A streamed response cannot do this once its headers have gone out.
//!
//! # Example
//!
//! ```
//! use http::Request;
//! use http::header::{ACCEPT_ENCODING, CONTENT_ENCODING, CONTENT_LENGTH};
//! use micro_buffer::{BoxError, BufferHandler, BufferService, ResponseWriter, handler_fn};
//!
//! fn hello(writer: &mut (dyn ResponseWriter + Send), _req: Request<()>) -> Result<(), BoxError> {
//!     writer.write_all(b"Hello, World!")?;
//!     Ok(())
//! }
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let service = BufferService::new(BufferHandler::new(handler_fn(hello)));
//!
//! let response = service.call(Request::new(())).await.unwrap();
//! assert_eq!(response.headers()[CONTENT_LENGTH], "13");
//!
//! let req = Request::builder().header(ACCEPT_ENCODING, "gzip").body(()).unwrap();
//! let response = service.call(req).await.unwrap();
//! assert_eq!(response.headers()[CONTENT_ENCODING], "gzip");
//! # }
//! ```
//!
//! # Architecture
//!
//! - [`encoding`]: the [`Encoding`] capability and the identity, gzip, deflate, brotli and
//!   zstd implementations
//! - [`Registry`]: the encodings a handler may negotiate, always including identity
//! - [`negotiate`]: `Accept-Encoding` parsing and selection
//! - [`ResponseWriter`]: the sink contract handlers write to
//! - [`intercept`]: the per-request response state and the writer the inner handler sees
//! - [`pool`]: free lists that let states, buffers and encoders be reused across requests
//! - [`BufferHandler`]: negotiates, runs the inner handler, finalizes and emits
//!
//! # Status codes
//!
//! A handler that writes no body bytes and sets no status produces `204 No Content`. An
//! explicit status always wins, with or without a body. Otherwise the response is `200 OK`.
//! A request whose `Accept-Encoding` cannot be satisfied gets `406 Not Acceptable` and the
//! inner handler is never called.
//!
//! # Limitations
//!
//! - the whole body is held in memory before anything is sent
//! - flushing and hijacking are unavailable to the inner handler

mod config;
mod error;
mod handler;
mod recorder;
mod registry;
mod service;
mod writer;

pub mod encoding;
pub mod intercept;
pub mod negotiate;
pub mod pool;

pub use config::BufferConfig;
pub use config::DEFAULT_INITIAL_CAPACITY;
pub use encoding::Encoding;
pub use error::BoxError;
pub use error::BufferError;
pub use handler::BufferHandler;
pub use handler::BufferHandlerBuilder;
pub use handler::BufferLayer;
pub use handler::Handler;
pub use handler::HandlerFn;
pub use handler::handler_fn;
pub use negotiate::{Match, Negotiated};
pub use recorder::ResponseRecorder;
pub use registry::Registry;
pub use service::BufferService;
pub use writer::{Connection, Flusher, Hijacker, Pusher, ResponseWriter};
