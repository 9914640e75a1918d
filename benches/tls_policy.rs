//! TLS policy benchmarks
//!
//! Measures the per-connection cost of turning options into a policy and
//! applying it to a fresh OpenSSL context.
//!
//! Run with: cargo bench --bench tls_policy

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use openssl::ssl::{SslContextBuilder, SslMethod};
use std::time::Duration;
use xtransport::tls::{TlsOptions, TlsPolicy, CIPHER_SUITES};

fn bench_policy_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("policy_build");

    group.bench_function("default", |b| b.iter(|| black_box(TlsPolicy::default())));

    let restricted = TlsOptions::builder()
        .version("TLSv1.2")
        .unwrap()
        .version("TLSv1.3")
        .unwrap()
        .ciphersuites([
            "TLS_AES_128_GCM_SHA256",
            "TLS_ECDHE_ECDSA_WITH_AES_128_GCM_SHA256",
            "TLS_ECDHE_RSA_WITH_AES_256_GCM_SHA384",
        ])
        .build()
        .unwrap();

    group.bench_function("for_options", |b| {
        b.iter(|| black_box(TlsPolicy::for_options(black_box(&restricted)).unwrap()))
    });

    group.finish();
}

fn bench_set_ciphers(c: &mut Criterion) {
    let mut group = c.benchmark_group("set_ciphers");

    for count in [1usize, 8, CIPHER_SUITES.len()] {
        // Reverse order so tier sorting has work to do.
        let names: Vec<&str> = CIPHER_SUITES.iter().rev().take(count).map(|c| c.iana).collect();

        group.bench_with_input(BenchmarkId::from_parameter(count), &names, |b, names| {
            let mut policy = TlsPolicy::default();
            b.iter(|| policy.set_ciphers(black_box(names), CIPHER_SUITES));
        });
    }

    group.finish();
}

fn bench_context_setup(c: &mut Criterion) {
    let policy = TlsPolicy::default();

    c.bench_function("context_setup", |b| {
        b.iter(|| {
            let mut ctx = SslContextBuilder::new(SslMethod::tls_client()).unwrap();
            policy.setup(&mut ctx).unwrap();
            black_box(ctx.build())
        })
    });
}

criterion_group! {
    name = policy;
    config = Criterion::default()
        .measurement_time(Duration::from_secs(5));
    targets =
        bench_policy_build,
        bench_set_ciphers,
        bench_context_setup
}

criterion_main!(policy);
