//! Criterion benchmarks for live tick decoding

use coinpulse::parsers::{parse_tick_message, parse_time, SseDecoder, SseEvent};
use coinpulse::types::Symbol;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

const SAMPLE_TICK: &[u8] =
    br#"{"time":"2024-05-01 10:00:00","USD":64012.37,"predictedPrice":64100.5}"#;

/// An SSE body carrying `count` tick events
fn sse_body(count: usize) -> Vec<u8> {
    let mut body = Vec::new();
    for i in 0..count {
        body.extend_from_slice(
            format!(
                "data: {{\"time\":\"2024-05-01 {:02}:{:02}:00\",\"USD\":{}.5}}\n\n",
                (i / 60) % 24,
                i % 60,
                60000 + i
            )
            .as_bytes(),
        );
    }
    body
}

fn bench_parse_tick(c: &mut Criterion) {
    let mut group = c.benchmark_group("tick");
    group.throughput(Throughput::Bytes(SAMPLE_TICK.len() as u64));

    group.bench_function("parse_tick_message", |b| {
        b.iter(|| parse_tick_message(Symbol::Btc, "USD", black_box(SAMPLE_TICK)));
    });

    group.bench_function("parse_time", |b| {
        b.iter(|| parse_time(black_box("2024-05-01 10:00:00")));
    });

    group.finish();
}

fn bench_sse_stream(c: &mut Criterion) {
    let mut group = c.benchmark_group("sse");

    for count in [100usize, 1000] {
        let body = sse_body(count);
        group.throughput(Throughput::Bytes(body.len() as u64));

        // Split into network-sized chunks so events straddle boundaries
        group.bench_with_input(
            BenchmarkId::new("decode_and_parse", format!("{} events", count)),
            &body,
            |b, body| {
                b.iter(|| {
                    let mut decoder = SseDecoder::new();
                    let mut parsed = 0usize;
                    for chunk in body.chunks(1460) {
                        for event in decoder.feed(black_box(chunk)) {
                            let SseEvent::Data(payload) = event else {
                                continue;
                            };
                            if parse_tick_message(Symbol::Btc, "USD", &payload).is_ok() {
                                parsed += 1;
                            }
                        }
                    }
                    parsed
                });
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_parse_tick, bench_sse_stream);
criterion_main!(benches);
