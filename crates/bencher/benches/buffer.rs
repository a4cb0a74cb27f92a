use bencher::{TestBody, TestCase};
use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use http::Request;
use http::header::ACCEPT_ENCODING;
use micro_buffer::{BoxError, BufferHandler, Handler, ResponseRecorder, ResponseWriter, handler_fn};
use std::hint::black_box;
use std::sync::Arc;

const LIST_ITEM: &[u8] = b"<li class=\"item\"><a href=\"/items/42\">item forty two</a></li>\n";

static SMALL_BODY: TestBody = TestBody::new(b"<p>hello, world</p>", 4);
static LARGE_BODY: TestBody = TestBody::new(LIST_ITEM, 2048);

fn create_test_cases() -> Vec<TestCase> {
    vec![TestCase::small("small_body", SMALL_BODY), TestCase::large("large_body", LARGE_BODY)]
}

fn benchmark_buffer_handler(criterion: &mut Criterion) {
    let runtime = tokio::runtime::Builder::new_current_thread().build().expect("runtime should build");
    let mut group = criterion.benchmark_group("buffer_handler");

    for case in create_test_cases() {
        let body: Arc<[u8]> = case.body().to_vec().into();
        let chunk_size = case.chunk_size();
        let handler = BufferHandler::new(handler_fn(move |writer: &mut (dyn ResponseWriter + Send), _req: Request<()>| -> Result<(), BoxError> {
            for chunk in body.chunks(chunk_size) {
                writer.write_all(chunk)?;
            }
            Ok(())
        }));

        group.throughput(Throughput::Bytes(case.body().len() as u64));
        for encoding in ["identity", "gzip", "deflate", "br", "zstd"] {
            let id = BenchmarkId::new(case.name(), encoding);
            group.bench_with_input(id, &encoding, |b, encoding| {
                b.iter(|| {
                    let req = Request::builder().header(ACCEPT_ENCODING, *encoding).body(()).expect("valid request");
                    let mut recorder = ResponseRecorder::new();
                    runtime.block_on(handler.serve(&mut recorder, req)).expect("handler should not fail");
                    black_box(recorder.into_response());
                });
            });
        }
    }

    group.finish();
}

criterion_group!(buffer, benchmark_buffer_handler);
criterion_main!(buffer);
