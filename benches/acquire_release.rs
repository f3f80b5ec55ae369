// Acquire/release overhead with a zero-cost resource, so only pool
// bookkeeping is measured.

use std::convert::Infallible;
use std::hint::black_box;
use std::thread;
use std::time::{Duration, Instant};

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use esox_resourcepool::{PoolConfiguration, ResourceFactory, ResourcePool, TestScheme};

struct NoOp;

impl ResourceFactory for NoOp {
    type Resource = u64;
    type Error = Infallible;

    fn create_resource(&self) -> Result<u64, Infallible> {
        Ok(0)
    }

    fn test_resource(&self, _resource: &mut u64) -> bool {
        true
    }

    fn close_resource(&self, _resource: u64) {}
}

fn warm_pool(config: PoolConfiguration) -> ResourcePool<NoOp> {
    let pool = ResourcePool::new(NoOp, config.with_min_connections(8));
    pool.fill();
    pool
}

fn single_thread(c: &mut Criterion) {
    let mut group = c.benchmark_group("single_thread");

    let pool = warm_pool(PoolConfiguration::new());
    group.bench_function("acquire_release", |b| {
        b.iter(|| {
            let resource = pool.acquire().unwrap();
            black_box(*resource);
        })
    });

    let validating = warm_pool(PoolConfiguration::new().with_test_scheme(TestScheme::Always));
    group.bench_function("acquire_release_validated", |b| {
        b.iter(|| {
            let resource = validating.acquire().unwrap();
            black_box(*resource);
        })
    });

    group.finish();
}

fn contended(c: &mut Criterion) {
    let mut group = c.benchmark_group("contended");
    group.measurement_time(Duration::from_secs(5));

    for threads in [2usize, 4, 8] {
        let config = PoolConfiguration::new().with_max_connections(threads / 2);
        let pool = warm_pool(config);

        group.bench_with_input(BenchmarkId::from_parameter(threads), &threads, |b, &threads| {
            b.iter_custom(|iters| {
                let per_thread = iters / threads as u64 + 1;
                let start = Instant::now();
                thread::scope(|scope| {
                    for _ in 0..threads {
                        let pool = pool.clone();
                        scope.spawn(move || {
                            for _ in 0..per_thread {
                                let resource = pool.acquire().unwrap();
                                black_box(*resource);
                            }
                        });
                    }
                });
                start.elapsed()
            })
        });
    }

    group.finish();
}

criterion_group!(benches, single_thread, contended);
criterion_main!(benches);
