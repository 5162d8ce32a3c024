use criterion::{criterion_group, criterion_main, Criterion};

use mailsift::detect::DetectorPipeline;
use mailsift::parser::MboxParser;
use mailsift::reader::ArchiveSource;

/// Build a synthetic archive of `n` small messages.
fn synthetic_mbox(n: usize) -> Vec<u8> {
    let mut out = String::with_capacity(n * 256);
    for i in 0..n {
        out.push_str(&format!(
            "From sender{i}@example.com Thu Jan 04 10:00:00 2024\n\
             From: Sender {i} <sender{i}@example.com>\n\
             Subject: Message number {i}\n\
             Date: Thu, 04 Jan 2024 10:00:00 +0000\n\
             Message-ID: <bench-{i}@example.com>\n\
             \n\
             Body of message {i} with a little text to decode.\n\n"
        ));
    }
    out.into_bytes()
}

fn bench_parse_mbox(c: &mut Criterion) {
    let data = synthetic_mbox(500);
    c.bench_function("parse_mbox_500", |b| {
        b.iter(|| {
            let emails = MboxParser::new()
                .parse(ArchiveSource::Buffer(data.clone()))
                .unwrap();
            emails.len()
        })
    });
}

fn bench_detectors(c: &mut Criterion) {
    let data = synthetic_mbox(500);
    let emails = MboxParser::new()
        .parse(ArchiveSource::Buffer(data))
        .unwrap();
    let pipeline = DetectorPipeline::new();

    c.bench_function("detect_all_500", |b| {
        b.iter(|| {
            let results = pipeline.run(
                &emails,
                mailsift::detect::DetectorSelection::all(),
            );
            results.newsletters.len()
        })
    });
}

criterion_group!(benches, bench_parse_mbox, bench_detectors);
criterion_main!(benches);
