// benches/benchmarks.rs -- CPU executor benchmarks.
//
//   cargo bench --bench benchmarks
//
// Compares the sequential reference against the partitioned executor at
// several worker counts on a VGA and a 1080p frame.

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use gaussblur::convolution::{blur_rows, GAUSSIAN_3X3};
use gaussblur::grid::{PixelGrid, Rgb};
use gaussblur::partition::{split_rows, PartitionedExecutor};
use gaussblur::sequential::SequentialExecutor;

// ============================================================
// Helpers
// ============================================================

/// Synthetic RGB scene: per-channel gradients plus a few bright blocks.
fn make_scene(w: usize, h: usize) -> PixelGrid {
    PixelGrid::from_fn(w, h, |x, y| {
        let in_block = (x / 64 + y / 48) % 5 == 0;
        if in_block {
            Rgb::new(230, 210, 40)
        } else {
            Rgb::new((x * 255 / w) as u8, (y * 255 / h) as u8, ((x + y) % 256) as u8)
        }
    })
    .expect("non-empty scene")
}

// ============================================================
// Kernel
// ============================================================

fn bench_blur_rows(c: &mut Criterion) {
    let img = make_scene(640, 480);
    let mut out = vec![Rgb::BLACK; img.len()];

    let mut group = c.benchmark_group("kernel");
    group.throughput(Throughput::Elements(img.len() as u64));
    group.bench_function("blur_rows_640x480", |b| {
        b.iter(|| blur_rows(&img, &GAUSSIAN_3X3, 0..img.height(), &mut out))
    });
    group.bench_function("split_rows_1080_by_16", |b| b.iter(|| split_rows(1080, 16)));
    group.finish();
}

// ============================================================
// Sequential vs partitioned
// ============================================================

fn bench_executors(c: &mut Criterion) {
    for (w, h) in [(640, 480), (1920, 1080)] {
        let img = make_scene(w, h);

        let mut group = c.benchmark_group(format!("blur_{w}x{h}"));
        group.throughput(Throughput::Elements((w * h) as u64));

        let seq = SequentialExecutor::new();
        group.bench_function("sequential", |b| b.iter(|| seq.run(&img)));

        for workers in [1, 2, 4, 8, 16] {
            let exec = PartitionedExecutor::new(workers).expect("workers > 0");
            group.bench_with_input(BenchmarkId::new("partitioned", workers), &img, |b, img| {
                b.iter(|| exec.run(img).expect("blur"))
            });
        }

        group.finish();
    }
}

criterion_group!(benches, bench_blur_rows, bench_executors);
criterion_main!(benches);
