use criterion::{black_box, criterion_group, criterion_main, Criterion};
use impersonet::http::orderedheaders::OrderedHeaderMap;
use impersonet::lookup;

fn caller_headers() -> OrderedHeaderMap {
    let mut headers = OrderedHeaderMap::new();
    headers.insert("Accept", "application/json").unwrap();
    headers
        .insert(
            "Cookie",
            "WMF-Last-Access=xxxxxxxxxxx; GeoIP=xxxxxxxxxxxxxxxxxxxxxxxxxxx; NetworkProbeLimit=0.001",
        )
        .unwrap();
    headers.insert("X-Requested-With", "XMLHttpRequest").unwrap();
    headers
}

fn benchmark_merge_profile(c: &mut Criterion) {
    let emulation = lookup("chrome_131").unwrap();
    let caller = caller_headers();

    // Per-request cost of laying caller headers over the profile
    c.bench_function("merge_profile_h1", |b| {
        b.iter(|| OrderedHeaderMap::merge_profile(black_box(&emulation.headers), black_box(&caller), true))
    });
    c.bench_function("merge_profile_h2", |b| {
        b.iter(|| OrderedHeaderMap::merge_profile(black_box(&emulation.headers), black_box(&caller), false))
    });
}

fn benchmark_headers_to_header_map(c: &mut Criterion) {
    let emulation = lookup("firefox_133").unwrap();
    c.bench_function("headers_to_header_map", |b| {
        b.iter(|| black_box(emulation.headers.clone()).to_header_map())
    });
}

fn benchmark_headers_insert(c: &mut Criterion) {
    c.bench_function("headers_insert", |b| {
        b.iter(|| {
            let mut headers = OrderedHeaderMap::new();
            headers.insert("Accept", "text/html").unwrap();
            headers.insert("User-Agent", "Mozilla/5.0").unwrap();
            headers.insert("Connection", "keep-alive").unwrap();
            black_box(headers)
        })
    });
}

criterion_group!(
    benches,
    benchmark_merge_profile,
    benchmark_headers_to_header_map,
    benchmark_headers_insert
);
criterion_main!(benches);
