use crate::error::BufferError;
use crate::handler::{BufferHandler, Handler};
use crate::recorder::ResponseRecorder;
use bytes::Bytes;
use http::{Request, Response};
use http_body_util::Full;
use std::sync::Arc;
use tracing::error;

/// Request-in, response-out adapter for hosts that expect an `http::Response` back.
///
/// The buffered response is recorded in memory and returned with a [`Full`] body. A failed
/// negotiation comes back as a `406 Not Acceptable` response rather than an error.
#[derive(Debug)]
pub struct BufferService<H> {
    handler: Arc<BufferHandler<H>>,
}

impl<H> Clone for BufferService<H> {
    fn clone(&self) -> Self {
        Self { handler: Arc::clone(&self.handler) }
    }
}

impl<H> BufferService<H> {
    pub fn new(handler: BufferHandler<H>) -> Self {
        Self { handler: Arc::new(handler) }
    }

    pub fn handler(&self) -> &BufferHandler<H> {
        &self.handler
    }

    pub async fn call<ReqBody>(&self, req: Request<ReqBody>) -> Result<Response<Full<Bytes>>, BufferError>
    where
        H: Handler<ReqBody>,
        ReqBody: Send + 'static,
    {
        let mut recorder = ResponseRecorder::new();
        match self.handler.handle(&mut recorder, req).await {
            Ok(()) | Err(BufferError::NotAcceptable { .. }) => Ok(recorder.into_response().map(Full::new)),
            Err(e) => {
                error!(cause = %e, "failed to serve buffered response");
                Err(e)
            }
        }
    }
}

impl<H> From<BufferHandler<H>> for BufferService<H> {
    fn from(handler: BufferHandler<H>) -> Self {
        Self::new(handler)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BoxError;
    use crate::handler::handler_fn;
    use crate::registry::Registry;
    use crate::writer::ResponseWriter;
    use http::StatusCode;
    use http::header::{ACCEPT_ENCODING, CONTENT_LENGTH};
    use http_body_util::BodyExt;

    fn hello(writer: &mut (dyn ResponseWriter + Send), _req: Request<()>) -> Result<(), BoxError> {
        writer.write_all(b"Hello, World!")?;
        Ok(())
    }

    #[tokio::test]
    async fn sets_content_length() {
        let service = BufferService::new(BufferHandler::new(handler_fn(hello)));
        let response = service.call(Request::new(())).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[CONTENT_LENGTH], "13");
        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(body, Bytes::from_static(b"Hello, World!"));
    }

    #[tokio::test]
    async fn not_acceptable_is_a_response() {
        let handler = BufferHandler::builder(handler_fn(hello)).registry(Arc::new(Registry::new())).build();
        let service = BufferService::from(handler);

        let req = Request::builder().header(ACCEPT_ENCODING, "br").body(()).unwrap();
        let response = service.call(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_ACCEPTABLE);
        assert_eq!(response.headers()[CONTENT_LENGTH], "0");
    }

    #[tokio::test]
    async fn handler_errors_propagate() {
        let service = BufferService::new(BufferHandler::new(handler_fn(|_writer, _req: Request<()>| Err("boom".into()))));
        let err = service.call(Request::new(())).await.unwrap_err();
        assert!(matches!(err, BufferError::Handler { .. }));
    }
}
