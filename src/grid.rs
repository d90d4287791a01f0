// grid.rs — RGB pixel and the immutable pixel grid shared by every executor.
//
// MEMORY LAYOUT
// ─────────────
// Row-major, tightly packed, three bytes per pixel:
//
//   byte index:  0 1 2 | 3 4 5 | 6 7 8 | ...
//   channel:     R G B | R G B | R G B | ...
//   pixel:      (0,0)   (1,0)   (2,0)    ...   then row 1 starts at W*3
//
// `Rgb` is `#[repr(C)]` with three `u8` fields, so it has size 3, alignment
// 1 and no padding. That makes it `bytemuck::Pod`: a `&[Rgb]` can be viewed
// as the flat `&[u8]` channel buffer above with no copy, which is exactly
// the marshaling format the device executor starts from.
//
// IMMUTABILITY
// ────────────
// There is no `set` and no `IndexMut`. A grid is validated once when it is
// built and never changes afterwards; executors assemble their output in a
// private `Vec<Rgb>` and only wrap it in a `PixelGrid` once every pixel has
// been written.

use std::fmt;

use bytemuck::{Pod, Zeroable};

use crate::error::{BlurError, Result};

// ---------------------------------------------------------------------------
// Rgb
// ---------------------------------------------------------------------------

/// One 8-bit-per-channel RGB pixel. No alpha.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Pod, Zeroable)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const BLACK: Rgb = Rgb::new(0, 0, 0);

    #[inline]
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Rgb { r, g, b }
    }

    /// Channels in storage order: `[r, g, b]`.
    #[inline]
    pub fn channels(self) -> [u8; 3] {
        [self.r, self.g, self.b]
    }

    /// Largest absolute per-channel difference between two pixels.
    #[inline]
    pub fn max_channel_diff(self, other: Rgb) -> u8 {
        self.r
            .abs_diff(other.r)
            .max(self.g.abs_diff(other.g))
            .max(self.b.abs_diff(other.b))
    }
}

impl From<[u8; 3]> for Rgb {
    #[inline]
    fn from([r, g, b]: [u8; 3]) -> Self {
        Rgb { r, g, b }
    }
}

// ---------------------------------------------------------------------------
// PixelGrid
// ---------------------------------------------------------------------------

/// A `width × height` grid of [`Rgb`] pixels, row-major, never mutated after
/// construction.
///
/// Every constructor rejects a zero dimension and a pixel buffer whose
/// length does not match `width * height`, so a `PixelGrid` in hand always
/// has a defined pixel at every in-range coordinate.
#[derive(Clone, PartialEq, Eq)]
pub struct PixelGrid {
    data: Vec<Rgb>,
    width: usize,
    height: usize,
}

impl PixelGrid {
    // --- Constructors ---

    /// Build a grid from row-major pixels.
    ///
    /// # Errors
    /// `InvalidInput` if either dimension is zero or
    /// `pixels.len() != width * height`.
    pub fn from_vec(width: usize, height: usize, pixels: Vec<Rgb>) -> Result<Self> {
        check_dimensions(width, height)?;
        let expected = pixel_count(width, height)?;
        if pixels.len() != expected {
            return Err(BlurError::invalid_input(format!(
                "pixel buffer holds {} pixels, {width}×{height} needs {expected}",
                pixels.len()
            )));
        }
        Ok(PixelGrid { data: pixels, width, height })
    }

    /// Build a grid from a packed `[r, g, b, r, g, b, ...]` byte buffer, the
    /// layout produced by most decoders (e.g. `image::RgbImage::into_raw`).
    ///
    /// # Errors
    /// `InvalidInput` if either dimension is zero or
    /// `bytes.len() != width * height * 3`.
    pub fn from_raw_rgb(width: usize, height: usize, bytes: Vec<u8>) -> Result<Self> {
        check_dimensions(width, height)?;
        let expected = pixel_count(width, height)? * 3;
        if bytes.len() != expected {
            return Err(BlurError::invalid_input(format!(
                "RGB buffer holds {} bytes, {width}×{height} needs {expected}",
                bytes.len()
            )));
        }
        let pixels = bytes
            .chunks_exact(3)
            .map(|c| Rgb::new(c[0], c[1], c[2]))
            .collect();
        Ok(PixelGrid { data: pixels, width, height })
    }

    /// A grid where every pixel is `value`.
    pub fn filled(width: usize, height: usize, value: Rgb) -> Result<Self> {
        check_dimensions(width, height)?;
        Ok(PixelGrid {
            data: vec![value; pixel_count(width, height)?],
            width,
            height,
        })
    }

    /// A grid whose pixel at `(x, y)` is `f(x, y)`.
    pub fn from_fn(
        width: usize,
        height: usize,
        mut f: impl FnMut(usize, usize) -> Rgb,
    ) -> Result<Self> {
        check_dimensions(width, height)?;
        let mut data = Vec::with_capacity(pixel_count(width, height)?);
        for y in 0..height {
            for x in 0..width {
                data.push(f(x, y));
            }
        }
        Ok(PixelGrid { data, width, height })
    }

    /// Wrap an executor's fully written output buffer.
    ///
    /// Dimensions come from an already validated input grid, so only the
    /// length is re-checked, and only in debug builds.
    pub(crate) fn from_output(width: usize, height: usize, data: Vec<Rgb>) -> Self {
        debug_assert_eq!(data.len(), width * height);
        PixelGrid { data, width, height }
    }

    // --- Accessors ---

    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    /// Total number of pixels (`width * height`).
    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Always `false`: a grid has at least one pixel.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Pixel at column `x`, row `y`.
    ///
    /// # Panics
    /// Panics if `(x, y)` is out of bounds.
    #[inline]
    pub fn get(&self, x: usize, y: usize) -> Rgb {
        self.bounds_check(x, y);
        self.data[y * self.width + x]
    }

    /// `true` when `(x, y)` has a full 3×3 neighbourhood inside the grid.
    #[inline]
    pub fn is_interior(&self, x: usize, y: usize) -> bool {
        x >= 1 && y >= 1 && x + 1 < self.width && y + 1 < self.height
    }

    /// Borrow row `y` as a slice of `width` pixels.
    #[inline]
    pub fn row(&self, y: usize) -> &[Rgb] {
        assert!(y < self.height, "row {y} out of bounds (height {})", self.height);
        let start = y * self.width;
        &self.data[start..start + self.width]
    }

    /// All pixels, row-major.
    #[inline]
    pub fn as_pixels(&self) -> &[Rgb] {
        &self.data
    }

    /// All channels as one flat `[r, g, b, ...]` slice of `width * height * 3`
    /// bytes, borrowed without copying.
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.data)
    }

    /// Consume the grid, returning the packed `[r, g, b, ...]` bytes.
    pub fn into_raw_rgb(self) -> Vec<u8> {
        self.as_bytes().to_vec()
    }

    /// Iterate over all pixels as `(x, y, value)`, row by row.
    pub fn pixels(&self) -> impl Iterator<Item = (usize, usize, Rgb)> + '_ {
        let w = self.width;
        self.data
            .iter()
            .enumerate()
            .map(move |(i, &p)| (i % w, i / w, p))
    }

    /// Largest per-channel difference between two grids of equal size.
    ///
    /// # Panics
    /// Panics if the dimensions differ.
    pub fn max_channel_diff(&self, other: &PixelGrid) -> u8 {
        assert!(
            self.width == other.width && self.height == other.height,
            "cannot compare {}×{} with {}×{}",
            self.width,
            self.height,
            other.width,
            other.height,
        );
        self.data
            .iter()
            .zip(&other.data)
            .map(|(&a, &b)| a.max_channel_diff(b))
            .max()
            .unwrap_or(0)
    }

    #[inline]
    fn bounds_check(&self, x: usize, y: usize) {
        assert!(
            x < self.width && y < self.height,
            "pixel ({x},{y}) out of bounds for grid {}×{}",
            self.width,
            self.height,
        );
    }
}

fn check_dimensions(width: usize, height: usize) -> Result<()> {
    if width == 0 || height == 0 {
        return Err(BlurError::invalid_input(format!(
            "grid dimensions must be at least 1×1, got {width}×{height}"
        )));
    }
    Ok(())
}

fn pixel_count(width: usize, height: usize) -> Result<usize> {
    width
        .checked_mul(height)
        .filter(|n| n.checked_mul(3).is_some())
        .ok_or_else(|| BlurError::invalid_input(format!("grid {width}×{height} overflows usize")))
}

impl std::ops::Index<(usize, usize)> for PixelGrid {
    type Output = Rgb;

    #[inline]
    fn index(&self, (x, y): (usize, usize)) -> &Rgb {
        self.bounds_check(x, y);
        &self.data[y * self.width + x]
    }
}

// Small grids print their pixels; large ones are cut off.
impl fmt::Debug for PixelGrid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "PixelGrid {{ {}×{} }}", self.width, self.height)?;
        for y in 0..self.height.min(8) {
            write!(f, "  row {y}: [")?;
            for x in 0..self.width.min(8) {
                if x > 0 {
                    write!(f, ", ")?;
                }
                let p = self.get(x, y);
                write!(f, "({},{},{})", p.r, p.g, p.b)?;
            }
            if self.width > 8 {
                write!(f, ", ...")?;
            }
            writeln!(f, "]")?;
        }
        if self.height > 8 {
            writeln!(f, "  ...")?;
        }
        Ok(())
    }
}
