//! Error-diffusion dithering with arbitrary integer kernels.
//!
//! Quantization error is spread to not-yet-visited neighbours through a small
//! rolling window of accumulator rows. Accumulators hold the raw weighted sum;
//! the division by the kernel total happens once, when a pixel reads its
//! correction, so overlapping contributions do not each lose a rounding step.

use std::borrow::Cow;

use rgb::RGB8;

use crate::IndexBuffer;
use crate::error::{ConfigError, QuantizeError, try_filled};
use crate::hashbox::NearestColor;
use crate::source::PixelSource;

/// An error-diffusion kernel: a `width` x `height` grid of integer weights.
///
/// The pixel being quantized sits in row 0 at column `origin`. Cells left of
/// and including the origin in row 0 describe pixels already visited and are
/// normally zero. Each weight receives `error * weight / total` where `total`
/// is the sum of all weights.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Kernel {
    width: usize,
    height: usize,
    origin: usize,
    coefficients: Cow<'static, [i32]>,
}

impl Kernel {
    /// Largest accepted sum of absolute weights: a full-scale error of 255
    /// spread over the whole footprint still fits an `i64` accumulator.
    pub const MAX_MAGNITUDE: i64 = i64::MAX / 255;

    /// ```text
    ///     X 7
    ///   3 5 1
    /// ```
    pub const FLOYD_STEINBERG: Kernel = Kernel {
        width: 3,
        height: 2,
        origin: 1,
        coefficients: Cow::Borrowed(&[
            0, 0, 7, //
            3, 5, 1,
        ]),
    };

    /// ```text
    ///       X 7 5
    ///   3 5 7 5 3
    ///   1 3 5 3 1
    /// ```
    pub const JARVIS_JUDICE_NINKE: Kernel = Kernel {
        width: 5,
        height: 3,
        origin: 2,
        coefficients: Cow::Borrowed(&[
            0, 0, 0, 7, 5, //
            3, 5, 7, 5, 3, //
            1, 3, 5, 3, 1,
        ]),
    };

    /// ```text
    ///       X 8 4
    ///   2 4 8 4 2
    ///   1 2 4 2 1
    /// ```
    pub const STUCKI: Kernel = Kernel {
        width: 5,
        height: 3,
        origin: 2,
        coefficients: Cow::Borrowed(&[
            0, 0, 0, 8, 4, //
            2, 4, 8, 4, 2, //
            1, 2, 4, 2, 1,
        ]),
    };

    /// A caller-defined kernel. `coefficients` are row-major, `width * height`
    /// long, and must sum to a positive total. The absolute weights may add up
    /// to at most [`Kernel::MAX_MAGNITUDE`].
    pub fn custom(
        width: usize,
        height: usize,
        origin: usize,
        coefficients: Vec<i32>,
    ) -> Result<Self, ConfigError> {
        if width == 0 || height == 0 || coefficients.len() != width * height {
            return Err(ConfigError::KernelShape {
                width,
                height,
                len: coefficients.len(),
            });
        }
        if origin >= width {
            return Err(ConfigError::KernelOrigin { origin, width });
        }
        coefficients
            .iter()
            .try_fold(0i64, |acc, &c| acc.checked_add(i64::from(c).abs()))
            .filter(|&m| m <= Self::MAX_MAGNITUDE)
            .ok_or(ConfigError::KernelMagnitude)?;
        let total: i64 = coefficients.iter().map(|&c| i64::from(c)).sum();
        if total <= 0 {
            return Err(ConfigError::KernelSum(total));
        }
        Ok(Self {
            width,
            height,
            origin,
            coefficients: Cow::Owned(coefficients),
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn origin(&self) -> usize {
        self.origin
    }

    /// Weight at column `dx`, row `dy` of the grid.
    pub fn coefficient(&self, dx: usize, dy: usize) -> i32 {
        self.coefficients[dy * self.width + dx]
    }

    /// Sum of all weights.
    pub fn total(&self) -> i64 {
        self.coefficients.iter().map(|&c| i64::from(c)).sum()
    }
}

impl Default for Kernel {
    fn default() -> Self {
        Self::FLOYD_STEINBERG
    }
}

/// The kernels available without a custom definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BuiltinKernel {
    #[default]
    FloydSteinberg,
    JarvisJudiceNinke,
    Stucki,
}

impl BuiltinKernel {
    pub fn kernel(self) -> Kernel {
        match self {
            Self::FloydSteinberg => Kernel::FLOYD_STEINBERG,
            Self::JarvisJudiceNinke => Kernel::JARVIS_JUDICE_NINKE,
            Self::Stucki => Kernel::STUCKI,
        }
    }
}

impl From<BuiltinKernel> for Kernel {
    fn from(k: BuiltinKernel) -> Self {
        k.kernel()
    }
}

/// Row of the accumulator window, 0 being the scanline in progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Row(usize);

/// Rolling accumulator window for `N` channels: `kernel.height()` rows, each
/// `width + kernel.width()` cells wide so writes never run off the right edge.
#[derive(Debug, Clone)]
pub(crate) struct ErrorRows<'k, const N: usize> {
    kernel: &'k Kernel,
    total: i64,
    stride: usize,
    cells: Vec<[i64; N]>,
}

impl<'k, const N: usize> ErrorRows<'k, N> {
    pub(crate) fn new(width: usize, kernel: &'k Kernel) -> Result<Self, QuantizeError> {
        let stride = width + kernel.width();
        let cells = try_filled(stride * kernel.height(), [0i64; N])?;
        Ok(Self {
            kernel,
            total: kernel.total().max(1),
            stride,
            cells,
        })
    }

    #[inline]
    fn cell_mut(&mut self, row: Row, column: usize) -> &mut [i64; N] {
        debug_assert!(row.0 < self.kernel.height() && column < self.stride);
        &mut self.cells[row.0 * self.stride + column]
    }

    /// Accumulated correction for column `x` of the current row, normalized by
    /// the kernel total (rounding toward zero).
    #[inline]
    pub(crate) fn correction(&self, x: usize) -> [i64; N] {
        let raw = self.cells[x + self.kernel.origin()];
        raw.map(|v| v / self.total)
    }

    /// Spread `error` made at column `x` over the kernel footprint.
    #[inline]
    pub(crate) fn spread(&mut self, x: usize, error: [i64; N]) {
        let kernel = self.kernel;
        for dy in 0..kernel.height() {
            for dx in 0..kernel.width() {
                let weight = i64::from(kernel.coefficient(dx, dy));
                if weight == 0 {
                    continue;
                }
                let cell = self.cell_mut(Row(dy), x + dx);
                for (acc, e) in cell.iter_mut().zip(error) {
                    *acc += e * weight;
                }
            }
        }
    }

    /// Move every row up by one and clear the bottom row.
    pub(crate) fn next_row(&mut self) {
        let stride = self.stride;
        self.cells.copy_within(stride.., 0);
        let last = self.cells.len() - stride;
        self.cells[last..].fill([0; N]);
    }
}

/// Quantize `image` against `nearest`, diffusing the error with `kernel`.
///
/// Pixels are processed strictly in scan order: each one depends on the error
/// left by those before it.
pub fn dither_image<S, N>(
    image: &S,
    nearest: &N,
    kernel: &Kernel,
) -> Result<IndexBuffer, QuantizeError>
where
    S: PixelSource,
    N: NearestColor,
{
    let (width, height) = (image.width(), image.height());
    let mut out = IndexBuffer::new(width, height)?;
    let mut errors = ErrorRows::<3>::new(width, kernel)?;
    let indices = out.indices_mut();

    for y in 0..height {
        for x in 0..width {
            let p = image.pixel(x, y);
            let [cr, cg, cb] = errors.correction(x);
            let working = [
                (i64::from(p.r) - cr).clamp(0, 255),
                (i64::from(p.g) - cg).clamp(0, 255),
                (i64::from(p.b) - cb).clamp(0, 255),
            ];

            let (index, _) = nearest.nearest(RGB8::new(
                working[0] as u8,
                working[1] as u8,
                working[2] as u8,
            ));
            indices[y * width + x] = index;

            let chosen = nearest.entry(index);
            errors.spread(x, [
                i64::from(chosen.r) - working[0],
                i64::from(chosen.g) - working[1],
                i64::from(chosen.b) - working[2],
            ]);
        }
        errors.next_row();
    }

    Ok(out)
}
