// demos/blur_file.rs — blur an image file with a chosen executor.
//
// USAGE
//   cargo run --example blur_file -- <input> <output> [strategy] [workers]
//
//   strategy: sequential | partitioned | device
//             (default: GAUSSBLUR_STRATEGY, else partitioned)
//   workers:  partitioned worker count (default: GAUSSBLUR_WORKERS, else
//             the number of available cores)
//
// Set RUST_LOG=gaussblur=debug to see per-band and per-dispatch logs.
//
// With `device`, a missing adapter is reported and the program exits 1; it
// does not rerun on the CPU.

use std::env;
use std::num::NonZeroUsize;
use std::process;
use std::time::Instant;

use gaussblur::{blur, BlurConfig, Executor, PixelGrid, StrategyKind};
use tracing::info;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args: Vec<String> = env::args().collect();
    if args.len() < 3 {
        eprintln!("Usage: {} <input> <output> [sequential|partitioned|device] [workers]", args[0]);
        process::exit(1);
    }
    let (input, output) = (&args[1], &args[2]);

    let mut config = BlurConfig::from_env().unwrap_or_else(|e| {
        eprintln!("Error: {e}");
        process::exit(1);
    });
    if let Some(kind) = args.get(3) {
        config.strategy = kind.parse::<StrategyKind>().unwrap_or_else(|e| {
            eprintln!("Error: {e}");
            process::exit(1);
        });
    }
    if let Some(n) = args.get(4) {
        config.workers = n.parse::<NonZeroUsize>().unwrap_or_else(|_| {
            eprintln!("Error: worker count must be a positive integer, got {n:?}");
            process::exit(1);
        });
    }

    let img = image::open(input)
        .unwrap_or_else(|e| {
            eprintln!("Error: failed to open {input}: {e}");
            process::exit(1);
        })
        .to_rgb8();
    let (w, h) = img.dimensions();
    let src = PixelGrid::from_raw_rgb(w as usize, h as usize, img.into_raw()).unwrap_or_else(|e| {
        eprintln!("Error: {e}");
        process::exit(1);
    });
    info!(input = %input, width = w, height = h, "loaded image");

    let strategy = config.strategy();
    let t0 = Instant::now();
    let out = blur(&src, &strategy).unwrap_or_else(|e| {
        eprintln!("Error: {} executor failed: {e}", strategy.name());
        process::exit(1);
    });
    let elapsed = t0.elapsed();
    info!(
        strategy = strategy.name(),
        ms = elapsed.as_secs_f64() * 1e3,
        "blurred {w}×{h}"
    );

    let rgb = image::RgbImage::from_raw(w, h, out.into_raw_rgb()).unwrap_or_else(|| {
        eprintln!("Error: output buffer does not match {w}×{h}");
        process::exit(1);
    });
    if let Err(e) = rgb.save(output) {
        eprintln!("Error: failed to save {output}: {e}");
        process::exit(1);
    }
    println!("{} -> {} ({}, {:.2} ms)", input, output, strategy.name(), elapsed.as_secs_f64() * 1e3);
}
