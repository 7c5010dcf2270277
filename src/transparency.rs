//! Per-pixel transparency selection over the alpha channel.
//!
//! Runs after color translation and overwrites indices of pixels it deems
//! transparent with a caller-chosen reserved index. The color indices of the
//! remaining pixels are never touched.

use crate::IndexBuffer;
use crate::dither::{BuiltinKernel, ErrorRows};
use crate::error::QuantizeError;
use crate::source::PixelSource;

/// Alpha below which a pixel is transparent when no threshold is given.
pub const DEFAULT_ALPHA_THRESHOLD: u8 = 128;

/// How pixels are picked for the reserved transparent index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Transparency {
    /// Alpha is ignored.
    #[default]
    None,
    /// Transparent iff `alpha < threshold`. Equal counts as opaque.
    Threshold(u8),
    /// Alpha is error-diffused to 0 or 255 with one of the built-in kernels.
    ErrorDiffusion(BuiltinKernel),
    /// Transparent iff `alpha < matrix[x & 7][y & 7]`.
    Ordered(OrderedMatrix),
}

impl Transparency {
    pub fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }
}

/// 8x8 tileable threshold patterns for ordered alpha dithering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OrderedMatrix {
    /// Scattered thresholds with no visible structure.
    Random,
    /// Clustered dots on an 8x8 grid.
    Dot8,
    /// Clustered dots on a 4x4 grid.
    Dot4,
    HLine,
    VLine,
    /// Diagonal lines rising to the right.
    SlashLine,
    /// Diagonal lines falling to the right.
    BackLine,
    /// Recursive Bayer dispersion, the finest-grained pattern.
    #[default]
    Tiny,
    /// Thresholds indexed `[x][y]`.
    Custom([[u8; 8]; 8]),
}

impl OrderedMatrix {
    pub fn matrix(&self) -> [[u8; 8]; 8] {
        match self {
            Self::Random => RANDOM,
            Self::Dot8 => DOT8,
            Self::Dot4 => DOT4,
            Self::HLine => HLINE,
            Self::VLine => VLINE,
            Self::SlashLine => SLASH_LINE,
            Self::BackLine => BACK_LINE,
            Self::Tiny => TINY,
            Self::Custom(m) => *m,
        }
    }

    #[inline]
    pub fn threshold(&self, x: usize, y: usize) -> u8 {
        self.matrix()[x & 7][y & 7]
    }
}

/// Spread 64 ranks over 2..=254 so that alpha 0 is always below and alpha 255
/// always above every threshold.
const fn ranks64(m: [[u8; 8]; 8]) -> [[u8; 8]; 8] {
    let mut out = [[0u8; 8]; 8];
    let mut x = 0;
    while x < 8 {
        let mut y = 0;
        while y < 8 {
            out[x][y] = m[x][y] * 4 + 2;
            y += 1;
        }
        x += 1;
    }
    out
}

const fn tile4(m: [[u8; 4]; 4]) -> [[u8; 8]; 8] {
    let mut out = [[0u8; 8]; 8];
    let mut x = 0;
    while x < 8 {
        let mut y = 0;
        while y < 8 {
            out[x][y] = m[x & 3][y & 3] * 16 + 8;
            y += 1;
        }
        x += 1;
    }
    out
}

#[derive(Clone, Copy)]
enum Slope {
    Horizontal,
    Vertical,
    Rising,
    Falling,
}

/// Eight parallel lines filled in a coarse-to-fine order.
const fn lines(slope: Slope) -> [[u8; 8]; 8] {
    const ORDER: [u8; 8] = [0, 4, 2, 6, 1, 5, 3, 7];
    let mut out = [[0u8; 8]; 8];
    let mut x = 0;
    while x < 8 {
        let mut y = 0;
        while y < 8 {
            let band = match slope {
                Slope::Horizontal => y,
                Slope::Vertical => x,
                Slope::Rising => (x + y) & 7,
                Slope::Falling => (x + 8 - y) & 7,
            };
            out[x][y] = ORDER[band] * 32 + 16;
            y += 1;
        }
        x += 1;
    }
    out
}

const TINY: [[u8; 8]; 8] = ranks64([
    [0, 32, 8, 40, 2, 34, 10, 42],
    [48, 16, 56, 24, 50, 18, 58, 26],
    [12, 44, 4, 36, 14, 46, 6, 38],
    [60, 28, 52, 20, 62, 30, 54, 22],
    [3, 35, 11, 43, 1, 33, 9, 41],
    [51, 19, 59, 27, 49, 17, 57, 25],
    [15, 47, 7, 39, 13, 45, 5, 37],
    [63, 31, 55, 23, 61, 29, 53, 21],
]);

const DOT8: [[u8; 8]; 8] = ranks64([
    [24, 10, 12, 26, 35, 47, 49, 37],
    [8, 0, 2, 14, 45, 59, 61, 51],
    [22, 6, 4, 16, 43, 57, 63, 53],
    [30, 20, 18, 28, 33, 41, 55, 39],
    [34, 46, 48, 36, 25, 11, 13, 27],
    [44, 58, 60, 50, 9, 1, 3, 15],
    [42, 56, 62, 52, 23, 7, 5, 17],
    [32, 40, 54, 38, 31, 21, 19, 29],
]);

const DOT4: [[u8; 8]; 8] = tile4([
    [12, 5, 6, 13], //
    [4, 0, 1, 7],
    [11, 3, 2, 8],
    [15, 10, 9, 14],
]);

const RANDOM: [[u8; 8]; 8] = ranks64([
    [10, 20, 12, 31, 50, 55, 19, 56],
    [43, 45, 0, 21, 1, 16, 8, 22],
    [11, 54, 53, 42, 24, 29, 18, 33],
    [30, 28, 49, 61, 44, 40, 17, 48],
    [38, 59, 62, 39, 14, 7, 36, 51],
    [46, 35, 47, 15, 57, 26, 27, 5],
    [2, 13, 32, 58, 37, 23, 6, 34],
    [52, 4, 3, 63, 25, 9, 60, 41],
]);

const HLINE: [[u8; 8]; 8] = lines(Slope::Horizontal);
const VLINE: [[u8; 8]; 8] = lines(Slope::Vertical);
const SLASH_LINE: [[u8; 8]; 8] = lines(Slope::Rising);
const BACK_LINE: [[u8; 8]; 8] = lines(Slope::Falling);

/// Overwrite the indices of transparent pixels with `reserved_index`.
///
/// `buffer` must have the same dimensions as `image`.
pub fn apply_transparency<S: PixelSource>(
    image: &S,
    buffer: &mut IndexBuffer,
    reserved_index: u8,
    policy: &Transparency,
) -> Result<(), QuantizeError> {
    let (width, height) = (image.width(), image.height());
    if buffer.width() != width || buffer.height() != height {
        return Err(QuantizeError::DimensionMismatch {
            buffer_width: buffer.width(),
            buffer_height: buffer.height(),
            width,
            height,
        });
    }

    match *policy {
        Transparency::None => {}
        Transparency::Threshold(threshold) => {
            select(image, buffer, reserved_index, |_, _, alpha| alpha < threshold);
        }
        Transparency::Ordered(matrix) => {
            let m = matrix.matrix();
            select(image, buffer, reserved_index, |x, y, alpha| {
                alpha < m[x & 7][y & 7]
            });
        }
        Transparency::ErrorDiffusion(kernel) => {
            diffuse_alpha(image, buffer, reserved_index, kernel)?;
        }
    }
    Ok(())
}

fn select<S, F>(image: &S, buffer: &mut IndexBuffer, reserved_index: u8, transparent: F)
where
    S: PixelSource,
    F: Fn(usize, usize, u8) -> bool,
{
    let width = image.width();
    if width == 0 {
        return;
    }
    for (y, row) in buffer.indices_mut().chunks_mut(width).enumerate() {
        for (x, slot) in row.iter_mut().enumerate() {
            if transparent(x, y, image.pixel(x, y).a) {
                *slot = reserved_index;
            }
        }
    }
}

fn diffuse_alpha<S: PixelSource>(
    image: &S,
    buffer: &mut IndexBuffer,
    reserved_index: u8,
    kernel: BuiltinKernel,
) -> Result<(), QuantizeError> {
    let (width, height) = (image.width(), image.height());
    let kernel = kernel.kernel();
    let mut errors = ErrorRows::<1>::new(width, &kernel)?;
    let indices = buffer.indices_mut();

    for y in 0..height {
        for x in 0..width {
            let [correction] = errors.correction(x);
            let working = (i64::from(image.pixel(x, y).a) - correction).clamp(0, 255);
            let out = if working >= i64::from(DEFAULT_ALPHA_THRESHOLD) { 255 } else { 0 };
            if out == 0 {
                indices[y * width + x] = reserved_index;
            }
            errors.spread(x, [out - working]);
        }
        errors.next_row();
    }
    Ok(())
}
