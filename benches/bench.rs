use criterion::{criterion_group, criterion_main, Criterion};
use memcache_meta::client::cooperative::Client;
use memcache_meta::{ClientOptions, Endpoint, GetOptions};
use tokio::runtime::Runtime;

const LARGE_PAYLOAD_SIZE: usize = 1000 * 1024; // memcached's default max value size

fn setup_client() -> Client {
    Client::new(vec![Endpoint::new("127.0.0.1", 11211)], ClientOptions::default())
}

fn bench_get(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();

    rt.block_on(async {
        let client = setup_client();
        client.set("foo", &b"bar".to_vec(), None).await.unwrap();
    });

    c.bench_function("get_small", |b| {
        b.to_async(&rt).iter_custom(|iters| async move {
            let client = setup_client();
            let start = std::time::Instant::now();
            for _ in 0..iters {
                let _ = client.get::<Vec<u8>>("foo", GetOptions::default()).await;
            }
            start.elapsed()
        });
    });
}

fn bench_set_with_string(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();

    c.bench_function("set_small_with_string", |b| {
        b.to_async(&rt).iter_custom(|iters| async move {
            let client = setup_client();
            let start = std::time::Instant::now();
            for _ in 0..iters {
                let _ = client.set("foo", &"bar".to_string(), None).await;
            }
            start.elapsed()
        });
    });
}

fn bench_set_with_large_string(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();

    c.bench_function("set_with_large_string", |b| {
        b.to_async(&rt).iter_custom(|iters| async move {
            let client = setup_client();
            let large_payload = "a".repeat(LARGE_PAYLOAD_SIZE);
            let start = std::time::Instant::now();
            for _ in 0..iters {
                let _ = client.set("large_foo", &large_payload, None).await;
            }
            start.elapsed()
        });
    });
}

fn bench_get_many(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();

    rt.block_on(async {
        let client = setup_client();
        for i in 0..8 {
            client.set(format!("many-{i}"), &b"bar".to_vec(), None).await.unwrap();
        }
    });

    c.bench_function("get_many_small", |b| {
        b.to_async(&rt).iter_custom(|iters| async move {
            let client = setup_client();
            let keys: Vec<String> = (0..8).map(|i| format!("many-{i}")).collect();
            let start = std::time::Instant::now();
            for _ in 0..iters {
                let _ = client.get_many::<Vec<u8>>(keys.iter()).await;
            }
            start.elapsed()
        });
    });
}

fn bench_increment(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();

    rt.block_on(async {
        let client = setup_client();
        client.set("counter", &1u64, None).await.unwrap();
    });

    c.bench_function("increment", |b| {
        b.to_async(&rt).iter_custom(|iters| async move {
            let client = setup_client();
            let start = std::time::Instant::now();
            for _ in 0..iters {
                let _ = client.incr("counter", 1, None, None, None).await;
            }
            start.elapsed()
        });
    });
}

fn bench_decrement(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();

    rt.block_on(async {
        let client = setup_client();
        client.set("counter_two", &99999999999u64, None).await.unwrap();
    });

    c.bench_function("decrement", |b| {
        b.to_async(&rt).iter_custom(|iters| async move {
            let client = setup_client();
            let start = std::time::Instant::now();
            for _ in 0..iters {
                let _ = client.decr("counter_two", 1, None, None, None).await;
            }
            start.elapsed()
        });
    });
}

criterion_group!(
    benches,
    bench_get,
    bench_set_with_string,
    bench_set_with_large_string,
    bench_get_many,
    bench_increment,
    bench_decrement,
);
criterion_main!(benches);
