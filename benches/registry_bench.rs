use criterion::{black_box, criterion_group, criterion_main, Criterion};
use impersonet::{list_profiles, lookup, lookup_with_os, Client, ImpersonateOs};

fn benchmark_lookup(c: &mut Criterion) {
    // Force the registry to load outside the measurement.
    let _ = lookup("chrome_131");

    c.bench_function("lookup_native", |b| b.iter(|| lookup(black_box("chrome_131")).unwrap()));
    c.bench_function("lookup_with_os", |b| {
        b.iter(|| lookup_with_os(black_box("firefox_133"), ImpersonateOs::MacOs).unwrap())
    });
    c.bench_function("list_profiles", |b| b.iter(list_profiles));
}

fn benchmark_client_build(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let _guard = rt.enter();
    c.bench_function("client_build", |b| {
        b.iter(|| {
            Client::builder()
                .impersonate(black_box("chrome_131"))
                .impersonate_os(ImpersonateOs::Linux)
                .build()
                .unwrap()
        })
    });
}

criterion_group!(benches, benchmark_lookup, benchmark_client_build);
criterion_main!(benches);
