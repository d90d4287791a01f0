// tests/test_strategies.rs — Cross-executor integration tests.
//
// The sequential executor is the reference. The partitioned executor must
// match it exactly for every worker count; the device executor must match
// it within 1 per channel (GPU tests are #[ignore]d, run with
// `cargo test -- --ignored` on a machine with an adapter).

use gaussblur::partition::split_rows;
use gaussblur::{blur, BlurConfig, BlurError, Executor, PixelGrid, Rgb, Strategy};
use proptest::prelude::{any, prop_assert, prop_assert_eq, proptest};
use proptest::strategy::Strategy as _;

// ===== Helpers =====

fn gradient(w: usize, h: usize) -> PixelGrid {
    PixelGrid::from_fn(w, h, |x, y| {
        Rgb::new((x * 13 % 256) as u8, (y * 29 % 256) as u8, ((x * y) % 256) as u8)
    })
    .unwrap()
}

fn cpu_strategies(max_workers: usize) -> Vec<Strategy> {
    let mut s = vec![Strategy::sequential()];
    for n in 1..=max_workers {
        s.push(Strategy::partitioned(n).unwrap());
    }
    s
}

fn assert_border_copied(src: &PixelGrid, out: &PixelGrid) {
    for (x, y, p) in src.pixels() {
        if !src.is_interior(x, y) {
            assert_eq!(out.get(x, y), p, "border pixel ({x},{y}) changed");
        }
    }
}

// ===== Named scenarios =====

#[test]
fn bright_center_spreads_a_quarter() {
    let src = PixelGrid::from_fn(3, 3, |x, y| {
        if (x, y) == (1, 1) { Rgb::new(255, 0, 0) } else { Rgb::BLACK }
    })
    .unwrap();
    for strategy in cpu_strategies(4) {
        let out = blur(&src, &strategy).unwrap();
        // 255 * 4/16 = 63.75, truncated.
        assert_eq!(out.get(1, 1), Rgb::new(63, 0, 0), "{}", strategy.name());
        assert_border_copied(&src, &out);
    }
}

#[test]
fn uniform_image_is_unchanged() {
    let src = PixelGrid::filled(17, 12, Rgb::new(200, 100, 50)).unwrap();
    for strategy in cpu_strategies(5) {
        assert_eq!(blur(&src, &strategy).unwrap(), src, "{}", strategy.name());
    }
}

#[test]
fn degenerate_grids_are_all_border() {
    for (w, h) in [(1, 1), (2, 2), (1, 7), (7, 1), (2, 9), (9, 2)] {
        let src = gradient(w, h);
        for strategy in cpu_strategies(4) {
            let out = blur(&src, &strategy).unwrap();
            assert_eq!(out, src, "{w}×{h} with {}", strategy.name());
        }
    }
}

#[test]
fn output_keeps_dimensions() {
    let src = gradient(31, 19);
    for strategy in cpu_strategies(3) {
        let out = blur(&src, &strategy).unwrap();
        assert_eq!((out.width(), out.height()), (31, 19));
    }
}

#[test]
fn input_is_left_untouched() {
    let src = gradient(24, 16);
    let before = src.clone();
    let _ = blur(&src, &Strategy::partitioned(4).unwrap()).unwrap();
    assert_eq!(src, before);
}

#[test]
fn more_workers_than_rows() {
    let src = gradient(10, 3);
    let reference = blur(&src, &Strategy::sequential()).unwrap();
    let out = blur(&src, &Strategy::partitioned(16).unwrap()).unwrap();
    assert_eq!(out, reference);
}

#[test]
fn zero_workers_is_invalid_input() {
    assert!(matches!(Strategy::partitioned(0), Err(BlurError::InvalidInput { .. })));
}

#[test]
fn config_builds_a_working_strategy() {
    let cfg = BlurConfig::from_lookup(|key: &str| match key {
        "GAUSSBLUR_STRATEGY" => Some("partitioned".to_string()),
        "GAUSSBLUR_WORKERS" => Some("3".to_string()),
        _ => None,
    })
    .unwrap();
    let src = gradient(12, 12);
    let out = blur(&src, &cfg.strategy()).unwrap();
    assert_eq!(out, blur(&src, &Strategy::sequential()).unwrap());
}

// ===== Property tests =====

fn arb_grid() -> impl proptest::strategy::Strategy<Value = PixelGrid> {
    (1usize..24, 1usize..24).prop_flat_map(|(w, h)| {
        proptest::collection::vec(any::<[u8; 3]>(), w * h).prop_map(move |px| {
            PixelGrid::from_vec(w, h, px.into_iter().map(Rgb::from).collect()).unwrap()
        })
    })
}

proptest! {
    #[test]
    fn bands_cover_every_row_once(height in 1usize..500, workers in 1usize..64) {
        let bands = split_rows(height, workers);
        prop_assert_eq!(bands.len(), workers);
        let mut next = 0;
        for band in &bands {
            prop_assert_eq!(band.start, next);
            prop_assert!(band.end >= band.start);
            next = band.end;
        }
        prop_assert_eq!(next, height);
    }

    #[test]
    fn partitioned_matches_sequential(src in arb_grid(), workers in 1usize..12) {
        let reference = blur(&src, &Strategy::sequential()).unwrap();
        let out = blur(&src, &Strategy::partitioned(workers).unwrap()).unwrap();
        prop_assert_eq!(out, reference);
    }

    #[test]
    fn blurred_channels_stay_within_neighbourhood(src in arb_grid()) {
        let out = blur(&src, &Strategy::sequential()).unwrap();
        for (x, y, p) in out.pixels() {
            if !src.is_interior(x, y) {
                prop_assert_eq!(p, src.get(x, y));
                continue;
            }
            for c in 0..3 {
                let mut lo = u8::MAX;
                let mut hi = u8::MIN;
                for yy in y - 1..=y + 1 {
                    for xx in x - 1..=x + 1 {
                        let v = src.get(xx, yy).channels()[c];
                        lo = lo.min(v);
                        hi = hi.max(v);
                    }
                }
                let v = p.channels()[c];
                prop_assert!(v >= lo && v <= hi, "({},{}) ch{}: {} not in {}..={}", x, y, c, v, lo, hi);
            }
        }
    }
}

// ===== Device =====

#[test]
#[ignore = "requires a GPU adapter"]
fn device_within_one_of_sequential() {
    let src = gradient(97, 61);
    let reference = blur(&src, &Strategy::sequential()).unwrap();
    let out = blur(&src, &Strategy::device()).expect("need a compute adapter");
    assert!(out.max_channel_diff(&reference) <= 1);
    assert_border_copied(&src, &out);
}
