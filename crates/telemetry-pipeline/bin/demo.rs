//! # Telemetry Pipeline Demo
//!
//! Several producer threads finish spans concurrently while a
//! [`BatchProcessor`] ships them from its worker thread. A
//! [`MultiProcessor`] fans the same spans out to a second, in-memory
//! pipeline so the final counts can be cross-checked.
//!
//! Batch settings come from the `OTEL_BSP_*` environment variables.
//!
//! ## Running
//!
//! ```bash
//! # Quick mode (4 producers, 250 spans each), spans discarded
//! cargo run -p telemetry-pipeline --bin demo --release -- --quick
//!
//! # Print every span as a JSON line
//! cargo run -p telemetry-pipeline --bin demo --release -- --stdout
//!
//! # See worker activity
//! RUST_LOG=telemetry_pipeline=debug cargo run -p telemetry-pipeline --bin demo
//! ```

use rand::Rng;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant, SystemTime};
use telemetry_pipeline::{
    AttributeValue, BatchConfig, BatchProcessor, InMemoryExporter, MultiProcessor, NullExporter,
    Processor, Recordable, SpanContext, SpanData, SpanKind, SpanStatus, StdoutExporter,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

const OPERATIONS: &[(&str, SpanKind)] = &[
    ("GET /api/users", SpanKind::Server),
    ("SELECT users", SpanKind::Client),
    ("cache.get", SpanKind::Client),
    ("publish order.created", SpanKind::Producer),
    ("render", SpanKind::Internal),
];

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_thread_names(true)
        .init();

    let args: Vec<String> = std::env::args().collect();
    let quick = args.iter().any(|a| a == "--quick");
    let to_stdout = args.iter().any(|a| a == "--stdout");
    let (producers, spans_per_producer) = if quick { (4u64, 250u64) } else { (8, 2_000) };

    let config = BatchConfig::from_env();
    info!(?config, producers, spans_per_producer, "starting demo");

    let primary: Box<dyn Processor<SpanData>> = if to_stdout {
        Box::new(BatchProcessor::new(StdoutExporter::new(), config.clone()).expect("valid config"))
    } else {
        Box::new(BatchProcessor::new(NullExporter::new(), config.clone()).expect("valid config"))
    };
    let audit = InMemoryExporter::new();
    let audit_processor: Box<dyn Processor<SpanData>> =
        Box::new(BatchProcessor::new(audit.clone(), config).expect("valid config"));

    let pipeline = Arc::new(MultiProcessor::new(vec![primary, audit_processor]));

    let started = Instant::now();
    let handles: Vec<_> = (0..producers)
        .map(|producer| {
            let pipeline = Arc::clone(&pipeline);
            thread::Builder::new()
                .name(format!("producer-{producer}"))
                .spawn(move || run_producer(&pipeline, producer, spans_per_producer))
                .expect("spawn producer")
        })
        .collect();

    for handle in handles {
        handle.join().expect("producer panicked");
    }
    let produced = producers * spans_per_producer;
    let elapsed = started.elapsed();

    let flushed = pipeline.force_flush(Duration::from_secs(5));
    let shut_down = pipeline.shutdown(Duration::from_secs(10));

    let delivered = audit.exported_count() as u64;
    info!(
        produced,
        delivered,
        dropped = produced - delivered,
        batches = audit.export_calls(),
        flushed,
        shut_down,
        throughput = %format!("{:.0} spans/s", produced as f64 / elapsed.as_secs_f64()),
        "demo finished"
    );
}

fn run_producer(pipeline: &MultiProcessor<SpanData>, producer: u64, spans: u64) {
    let mut rng = rand::thread_rng();
    let trace_id: u128 = rng.gen();

    for seq in 0..spans {
        let (name, kind) = OPERATIONS[rng.gen_range(0..OPERATIONS.len())];
        let start = SystemTime::now();

        let mut span = pipeline.make_recordable();
        let parent = if seq == 0 {
            SpanContext::invalid()
        } else {
            SpanContext::new(trace_id, (producer << 48) | seq)
        };
        pipeline.on_start(&mut span, &parent);

        span.set_identity(
            &SpanContext::new(trace_id, (producer << 48) | (seq + 1)),
            parent.span_id,
        );
        span.set_name(name);
        span.set_kind(kind);
        span.set_start_time(start);
        span.set_attribute("service.name", "demo".into());
        span.set_attribute("producer.id", AttributeValue::Int(producer as i64));

        if rng.gen_bool(0.1) {
            span.add_event("exception", SystemTime::now());
            span.set_status(SpanStatus::Error, "simulated failure");
        } else {
            span.set_status(SpanStatus::Ok, "");
        }
        span.set_duration(Duration::from_micros(rng.gen_range(50..5_000)));

        pipeline.on_end(span);
    }
}
