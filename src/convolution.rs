// convolution.rs — the 3×3 Gaussian kernel and the per-pixel weighted sum.
//
// Everything in here is single-threaded and knows nothing about how the
// work is split. The executors differ only in *who* calls `blur_rows` on
// *which* rows; the numbers always come from `convolve_pixel`.
//
// KERNEL
// ──────
//        1 2 1
//   1/16 2 4 2        weights()[dy + 1][dx + 1], dy = row offset
//        1 2 1
//
// ROUNDING: each channel is accumulated in f32 in a fixed order (dy outer,
// dx inner) and truncated toward zero with `as u8`. The weights are exact
// binary fractions and the inputs are integers ≤ 255, so every partial sum is
// exactly representable and the result never exceeds 255.
//
// BORDER HANDLING: copy-input. Any pixel without a full 3×3 neighbourhood
// is copied unchanged from the input. The device kernel follows the same
// policy, so all executors agree on the border.

use std::ops::Range;

use crate::grid::{PixelGrid, Rgb};

/// A 3×3 table of non-negative convolution weights, row-major by `dy`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KernelWeights([[f32; 3]; 3]);

/// The fixed normalized Gaussian kernel `{1,2,1; 2,4,2; 1,2,1} / 16`.
pub const GAUSSIAN_3X3: KernelWeights = KernelWeights([
    [1.0 / 16.0, 2.0 / 16.0, 1.0 / 16.0],
    [2.0 / 16.0, 4.0 / 16.0, 2.0 / 16.0],
    [1.0 / 16.0, 2.0 / 16.0, 1.0 / 16.0],
]);

impl KernelWeights {
    /// Weight for neighbour offset `(dx, dy)`, both in `-1..=1`.
    ///
    /// # Panics
    /// Panics if either offset is outside `-1..=1`.
    #[inline]
    pub fn weight(&self, dx: i32, dy: i32) -> f32 {
        assert!(
            (-1..=1).contains(&dx) && (-1..=1).contains(&dy),
            "kernel offset ({dx},{dy}) outside 3×3 window"
        );
        self.0[(dy + 1) as usize][(dx + 1) as usize]
    }

    /// The raw table, `rows()[dy + 1][dx + 1]`.
    #[inline]
    pub fn rows(&self) -> &[[f32; 3]; 3] {
        &self.0
    }

    /// Sum of all nine weights. 1.0 for a normalized kernel.
    pub fn sum(&self) -> f32 {
        self.0.iter().flatten().sum()
    }
}

impl Default for KernelWeights {
    fn default() -> Self {
        GAUSSIAN_3X3
    }
}

/// Weighted sum of the 3×3 neighbourhood around the interior pixel `(x, y)`.
///
/// Pure function of its inputs. The caller guarantees `(x, y)` is interior;
/// this is checked only in debug builds.
#[inline]
pub fn convolve_pixel(src: &PixelGrid, x: usize, y: usize, weights: &KernelWeights) -> Rgb {
    debug_assert!(
        src.is_interior(x, y),
        "convolve_pixel({x},{y}) is not interior in {}×{}",
        src.width(),
        src.height()
    );

    let (mut r, mut g, mut b) = (0.0f32, 0.0f32, 0.0f32);
    for (ky, krow) in weights.rows().iter().enumerate() {
        let row = src.row(y + ky - 1);
        for (kx, &w) in krow.iter().enumerate() {
            let p = row[x + kx - 1];
            r += p.r as f32 * w;
            g += p.g as f32 * w;
            b += p.b as f32 * w;
        }
    }
    // `as u8` truncates toward zero and saturates, so no overflow is
    // possible even for a non-normalized table.
    Rgb::new(r as u8, g as u8, b as u8)
}

/// Fill `out` with the blurred rows `rows` of `src`.
///
/// `out` holds exactly `rows.len() * src.width()` pixels and row
/// `rows.start` lands at `out[0]`. Border pixels are copied from `src`,
/// interior pixels are computed. Rows above and below `rows` are read from
/// `src` as needed, so a block boundary is never treated as an image border.
///
/// # Panics
/// Panics if `rows` extends past the grid or `out` has the wrong length.
pub fn blur_rows(src: &PixelGrid, weights: &KernelWeights, rows: Range<usize>, out: &mut [Rgb]) {
    let w = src.width();
    let h = src.height();
    assert!(rows.end <= h, "rows {rows:?} exceed grid height {h}");
    assert_eq!(
        out.len(),
        rows.len() * w,
        "output block holds {} pixels, rows {rows:?} need {}",
        out.len(),
        rows.len() * w
    );

    for (y, out_row) in rows.zip(out.chunks_exact_mut(w)) {
        out_row.copy_from_slice(src.row(y));
        if y == 0 || y + 1 >= h {
            continue;
        }
        for x in 1..w.saturating_sub(1) {
            out_row[x] = convolve_pixel(src, x, y, weights);
        }
    }
}
