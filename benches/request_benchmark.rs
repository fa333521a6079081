// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use ministruts::{ActionMapping, HeaderParser, Module, Request};

fn simple_request_parse_benchmark(c: &mut Criterion) {
    let request = b"GET /home HTTP/1.1\r\nHost: localhost:7878\r\nUser-Agent: Test\r\n\r\n";

    c.bench_function("simple_request_parse", |b| {
        b.iter(|| {
            let buffer = black_box(request.to_vec());
            let _ = Request::try_from(&buffer, 0).unwrap();
        });
    });
}

fn form_request_parse_benchmark(c: &mut Criterion) {
    let body = "name=bob&email=bob%40example.com&message=hello+world%21";
    let request = format!(
        "POST /guestbook/post HTTP/1.1\r\n\
         Host: localhost:7878\r\n\
         Content-Type: application/x-www-form-urlencoded\r\n\
         Content-Length: {}\r\n\
         Cookie: theme=dark; MINISTRUTSID=0123456789abcdef0123456789abcdef\r\n\
         \r\n{}",
        body.len(),
        body
    );

    c.bench_function("form_request_parse", |b| {
        b.iter(|| {
            let buffer = black_box(request.as_bytes().to_vec());
            let _ = Request::try_from(&buffer, 0).unwrap();
        });
    });
}

fn header_block_parse_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("header_block_parse");

    for count in [4, 16, 64].iter() {
        let text: String = (0..*count)
            .map(|i| format!("X-Header-{}: value {}\r\n", i, i))
            .collect();
        group.bench_with_input(BenchmarkId::from_parameter(count), &text, |b, text| {
            b.iter(|| {
                let _ = HeaderParser::parse(black_box(text));
            });
        });
    }

    group.finish();
}

fn mapping_lookup_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("mapping_lookup");

    for size in [10, 100, 1000].iter() {
        let mut module = Module::new("");
        for i in 0..*size {
            let mapping = ActionMapping::new(&format!("/page{}", i))
                .unwrap()
                .with_forward(ministruts::ActionForward::to("page.html"));
            module = module.with_mapping(mapping);
        }
        module = module.with_mapping(
            ActionMapping::new("/items/*")
                .unwrap()
                .with_forward(ministruts::ActionForward::to("item.html")),
        );

        group.bench_with_input(BenchmarkId::new("exact", size), &module, |b, module| {
            b.iter(|| module.find_mapping(black_box("/page7")));
        });
        group.bench_with_input(BenchmarkId::new("pattern", size), &module, |b, module| {
            b.iter(|| module.find_mapping(black_box("/items/42")));
        });
        group.bench_with_input(BenchmarkId::new("miss", size), &module, |b, module| {
            b.iter(|| module.find_mapping(black_box("/nothing")));
        });
    }

    group.finish();
}

fn request_parse_batch_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("request_parse_batch");

    for count in [10, 100, 1000].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(count), count, |b, &count| {
            let request = b"GET /home?page=2 HTTP/1.1\r\nHost: localhost\r\nUser-Agent: Test\r\nAccept-Encoding: gzip\r\n\r\n";

            b.iter(|| {
                for _ in 0..count {
                    let buffer = black_box(request.to_vec());
                    let _ = Request::try_from(&buffer, 0).unwrap();
                }
            });
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    simple_request_parse_benchmark,
    form_request_parse_benchmark,
    header_block_parse_benchmark,
    mapping_lookup_benchmark,
    request_parse_batch_benchmark
);
criterion_main!(benches);
