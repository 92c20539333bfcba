use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use std::sync::Arc;

use conveyor_core::TenantId;
use conveyor_queue::{
    FnHandler, HandlerOutcome, InMemoryJobStore, Job, JobKind, NewJob, ProcessRequest, QueueEngine,
    QueueFamily,
};
use tokio::runtime::Runtime;

fn scrape_request() -> NewJob {
    NewJob::new(JobKind::WebsiteScrape).with_url("https://example.com")
}

fn engine_with_ok_handler() -> QueueEngine<Arc<InMemoryJobStore>> {
    let mut engine = QueueEngine::new(InMemoryJobStore::arc());
    engine.register_handler(
        JobKind::WebsiteScrape,
        Arc::new(FnHandler(|_job: &Job| {
            HandlerOutcome::Success(serde_json::json!({}))
        })),
    );
    engine
}

fn bench_enqueue_latency(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let mut group = c.benchmark_group("enqueue_latency");
    group.sample_size(1000);

    group.bench_function("single_enqueue", |b| {
        let engine = engine_with_ok_handler();
        let tenant = TenantId::new();
        b.iter(|| {
            rt.block_on(async {
                black_box(
                    engine
                        .enqueue(tenant, QueueFamily::Crawler, scrape_request())
                        .await
                        .unwrap(),
                )
            })
        });
    });

    group.finish();
}

fn bench_bulk_enqueue_throughput(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let mut group = c.benchmark_group("bulk_enqueue_throughput");

    for batch_size in [1usize, 10, 100].iter() {
        group.throughput(Throughput::Elements(*batch_size as u64));
        group.bench_with_input(
            BenchmarkId::new("bulk_add", batch_size),
            batch_size,
            |b, &size| {
                let engine = engine_with_ok_handler();
                let tenant = TenantId::new();
                b.iter(|| {
                    let requests: Vec<_> = (0..size).map(|_| scrape_request()).collect();
                    let report =
                        rt.block_on(engine.enqueue_bulk(tenant, QueueFamily::Crawler, requests));
                    black_box(report);
                });
            },
        );
    }

    group.finish();
}

fn bench_full_lifecycle(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let mut group = c.benchmark_group("full_lifecycle");

    // Enqueue, claim, execute, finalize, sweep: the whole path one worker
    // invocation walks per batch.
    for batch_size in [1usize, 10, 50].iter() {
        group.throughput(Throughput::Elements(*batch_size as u64));
        group.bench_with_input(
            BenchmarkId::new("enqueue_process_sweep", batch_size),
            batch_size,
            |b, &size| {
                let engine = engine_with_ok_handler();
                let tenant = TenantId::new();
                b.iter(|| {
                    rt.block_on(async {
                        let requests: Vec<_> = (0..size).map(|_| scrape_request()).collect();
                        engine
                            .enqueue_bulk(tenant, QueueFamily::Crawler, requests)
                            .await;
                        let report = engine
                            .process(
                                None,
                                QueueFamily::Crawler,
                                ProcessRequest {
                                    limit: Some(size),
                                    kind: None,
                                },
                            )
                            .await
                            .unwrap();
                        engine
                            .sweep(None, QueueFamily::Crawler, chrono::Duration::zero())
                            .await
                            .unwrap();
                        black_box(report)
                    })
                });
            },
        );
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_enqueue_latency,
    bench_bulk_enqueue_throughput,
    bench_full_lifecycle
);
criterion_main!(benches);
