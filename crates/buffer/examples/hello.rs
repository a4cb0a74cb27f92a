use http::header::{ACCEPT_ENCODING, CONTENT_ENCODING, CONTENT_LENGTH, CONTENT_TYPE};
use http::{HeaderValue, Request};
use micro_buffer::{BoxError, BufferConfig, BufferHandler, BufferService, ResponseWriter, handler_fn};
use tracing::{Level, info};
use tracing_subscriber::FmtSubscriber;

fn hello(writer: &mut (dyn ResponseWriter + Send), req: Request<()>) -> Result<(), BoxError> {
    writer.headers_mut().insert(CONTENT_TYPE, HeaderValue::from_static(mime::TEXT_PLAIN_UTF_8.as_ref()));
    for _ in 0..16 {
        writer.write_all(b"Hello, World! ")?;
    }
    info!(path = req.uri().path(), "handled request");
    Ok(())
}

#[tokio::main]
async fn main() {
    let subscriber = FmtSubscriber::builder().with_max_level(Level::DEBUG).finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    let config = BufferConfig { initial_capacity: 4096, ..BufferConfig::default() };
    let service = BufferService::new(BufferHandler::builder(handler_fn(hello)).config(config).build());

    for accept_encoding in ["identity", "gzip", "br;q=0.9, zstd", "compress"] {
        let req = Request::builder().uri("/").header(ACCEPT_ENCODING, accept_encoding).body(()).expect("valid request");
        let response = match service.call(req).await {
            Ok(response) => response,
            Err(e) => {
                eprintln!("{accept_encoding}: {e}");
                continue;
            }
        };

        println!(
            "{accept_encoding:>16} -> {} content-encoding={:?} content-length={:?}",
            response.status(),
            response.headers().get(CONTENT_ENCODING),
            response.headers().get(CONTENT_LENGTH),
        );
    }
}
