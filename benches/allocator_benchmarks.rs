//! Strategy comparison benchmarks.
//!
//! Simulates short-lived request/response allocation patterns across the
//! composable strategies.

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use stratalloc::{
    Allocator, FallbackAllocator, GlobalAllocator, NullLock, PoolAllocator, SegregatingAllocator,
    StackAllocator,
};

/// Allocate a request and a response buffer, touch them, release both.
fn request_response<A: Allocator>(alloc: &A) {
    let req = alloc.allocate(256, 8).expect("request allocation failed");
    let resp = alloc.allocate(512, 8).expect("response allocation failed");
    // SAFETY: Both blocks are live for their full sizes.
    unsafe {
        req.as_ptr().write_bytes(0x42, 256);
        resp.as_ptr().write_bytes(0x24, 512);
    }
    black_box((req, resp));
    alloc.deallocate(resp).expect("response deallocation failed");
    alloc.deallocate(req).expect("request deallocation failed");
}

fn bench_request_response(c: &mut Criterion) {
    let mut group = c.benchmark_group("request_response");
    group.throughput(Throughput::Elements(2));

    group.bench_function("stack", |b| {
        let alloc = StackAllocator::<65536>::boxed();
        b.iter(|| request_response(&*alloc));
    });

    group.bench_function("global", |b| {
        let alloc = GlobalAllocator::<NullLock>::new();
        b.iter(|| request_response(&alloc));
    });

    group.bench_function("pool", |b| {
        let alloc: PoolAllocator<4096, GlobalAllocator<NullLock>> = PoolAllocator::new();
        b.iter(|| request_response(&alloc));
    });

    group.bench_function("stack_with_heap_fallback", |b| {
        let alloc = FallbackAllocator::new(
            StackAllocator::<65536>::boxed(),
            GlobalAllocator::<NullLock>::new(),
        );
        b.iter(|| request_response(&alloc));
    });

    group.finish();
}

fn bench_size_routing(c: &mut Criterion) {
    let mut group = c.benchmark_group("size_routing");
    group.throughput(Throughput::Elements(64));

    group.bench_function("segregated_mixed_sizes", |b| {
        let alloc: SegregatingAllocator<
            128,
            PoolAllocator<4096, GlobalAllocator<NullLock>>,
            GlobalAllocator<NullLock>,
        > = SegregatingAllocator::new(PoolAllocator::new(), GlobalAllocator::new());

        b.iter(|| {
            let mut live = Vec::with_capacity(64);
            for i in 0..64usize {
                let size = if i % 4 == 0 { 1024 } else { 64 };
                live.push(alloc.allocate(size, 8).expect("allocation failed"));
            }
            for block in live.drain(..).rev() {
                alloc.deallocate(block).expect("deallocation failed");
            }
        });
    });

    group.finish();
}

fn bench_arena_churn(c: &mut Criterion) {
    let mut group = c.benchmark_group("arena_churn");
    group.throughput(Throughput::Elements(32));

    group.bench_function("stack_bulk_reset", |b| {
        let alloc = StackAllocator::<65536>::boxed();
        b.iter(|| {
            for _ in 0..32 {
                let block = alloc.allocate(1024, 16).expect("allocation failed");
                black_box(block);
            }
            alloc.deallocate_all();
        });
    });

    group.bench_function("pool_scattered_free", |b| {
        let alloc: PoolAllocator<8192, GlobalAllocator<NullLock>> = PoolAllocator::new();
        b.iter(|| {
            let mut live: Vec<_> = (0..32)
                .map(|_| alloc.allocate(1024, 16).expect("allocation failed"))
                .collect();
            // Free odd positions first, then the rest.
            let mut i = 0;
            live.retain(|block| {
                i += 1;
                if i % 2 == 1 {
                    alloc.deallocate(*block).expect("deallocation failed");
                    false
                } else {
                    true
                }
            });
            for block in live {
                alloc.deallocate(block).expect("deallocation failed");
            }
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_request_response,
    bench_size_routing,
    bench_arena_churn
);
criterion_main!(benches);
