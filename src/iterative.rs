//! Iterative palette construction: histogram-seeded centroids refined by a
//! fixed number of Lloyd passes over every source pixel.

use rand::Rng;
use rgb::RGB8;

use crate::error::{QuantizeError, try_filled};
use crate::hashbox::{Hashbox, NearestColor, distance_sq};
use crate::histogram::CellHistogram;
use crate::palette::Palette;
use crate::source::PixelSource;

/// Number of refinement passes.
pub const REFINE_PASSES: usize = 3;

/// A palette entry while it is being refined.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Centroid {
    pub color: RGB8,
    /// Caller-supplied color: never moved, never dropped.
    pub fixed: bool,
    /// Attracted pixels in the most recent pass that touched it.
    pub used: bool,
}

impl Centroid {
    fn fixed(color: RGB8) -> Self {
        Self {
            color,
            fixed: true,
            used: true,
        }
    }

    fn seed(color: RGB8) -> Self {
        Self {
            color,
            fixed: false,
            used: false,
        }
    }
}

/// Per-pass running sums for one centroid.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Accum {
    count: u64,
    r: u64,
    g: u64,
    b: u64,
}

impl Accum {
    #[inline]
    fn add(&mut self, c: RGB8) {
        self.count += 1;
        self.r += c.r as u64;
        self.g += c.g as u64;
        self.b += c.b as u64;
    }

    #[cfg(feature = "threads")]
    fn merge(&mut self, other: &Accum) {
        self.count += other.count;
        self.r += other.r;
        self.g += other.g;
        self.b += other.b;
    }

    /// Rounded mean of the accumulated pixels.
    fn mean(&self) -> Option<RGB8> {
        if self.count == 0 {
            return None;
        }
        let n = self.count;
        let avg = |sum: u64| ((sum + n / 2) / n) as u8;
        Some(RGB8::new(avg(self.r), avg(self.g), avg(self.b)))
    }
}

/// Build a palette of at most `max_colors` entries for `images`.
///
/// `fixed` colors take the first slots and stay put. The remaining slots are
/// seeded from the cell histogram and refined for [`REFINE_PASSES`] passes.
/// Slots that attract no pixels in a pass are reseeded at random; any still
/// unused after the last pass are dropped.
pub fn build_palette<S, R>(
    images: &[S],
    fixed: &[RGB8],
    max_colors: usize,
    rng: &mut R,
) -> Result<Palette, QuantizeError>
where
    S: PixelSource,
    R: Rng + ?Sized,
{
    let slots = max_colors.saturating_sub(fixed.len());
    if slots == 0 {
        return Ok(Palette::with_fixed(fixed, std::iter::empty()));
    }

    let hist = CellHistogram::from_sources(images)?;
    tracing::debug!(
        pixels = hist.total(),
        occupied_cells = hist.occupied(),
        slots,
        "seeding centroids"
    );

    let mut centroids: Vec<Centroid> = fixed.iter().copied().map(Centroid::fixed).collect();
    centroids.extend(hist.seeds(slots, rng).into_iter().map(Centroid::seed));

    for pass in 0..REFINE_PASSES {
        refine(images, &mut centroids, rng, pass)?;
    }

    let palette = Palette::with_fixed(
        fixed,
        centroids
            .iter()
            .filter(|c| !c.fixed && c.used)
            .map(|c| c.color),
    );
    tracing::debug!(
        requested = max_colors,
        produced = palette.len(),
        "iterative palette finished"
    );
    Ok(palette)
}

/// One Lloyd pass: assign every pixel to its nearest centroid, then move each
/// free centroid to the mean of its pixels.
fn refine<S, R>(
    images: &[S],
    centroids: &mut [Centroid],
    rng: &mut R,
    pass: usize,
) -> Result<(), QuantizeError>
where
    S: PixelSource,
    R: Rng + ?Sized,
{
    let colors: Vec<RGB8> = centroids.iter().map(|c| c.color).collect();
    let hashbox = Hashbox::new(&colors)?;
    let sums = assign(images, &hashbox)?;

    let mut moved = 0u64;
    let mut reseeded = 0usize;
    for (centroid, acc) in centroids.iter_mut().zip(&sums) {
        if centroid.fixed {
            continue;
        }
        match acc.mean() {
            Some(mean) => {
                moved += distance_sq(centroid.color, mean) as u64;
                centroid.color = mean;
                centroid.used = true;
            }
            None => {
                centroid.color = RGB8::new(rng.random(), rng.random(), rng.random());
                centroid.used = false;
                reseeded += 1;
            }
        }
    }

    tracing::trace!(
        pass,
        moved,
        reseeded,
        mean_candidates = hashbox.mean_candidates(),
        "refinement pass"
    );
    Ok(())
}

#[inline]
fn accumulate_row<S: PixelSource>(image: &S, y: usize, hashbox: &Hashbox, sums: &mut [Accum]) {
    for x in 0..image.width() {
        let p = image.pixel(x, y);
        let c = RGB8::new(p.r, p.g, p.b);
        let (index, _) = hashbox.nearest(c);
        sums[index as usize].add(c);
    }
}

#[cfg(not(feature = "threads"))]
fn assign<S: PixelSource>(images: &[S], hashbox: &Hashbox) -> Result<Vec<Accum>, QuantizeError> {
    let mut sums = try_filled(hashbox.len(), Accum::default())?;
    for image in images {
        for y in 0..image.height() {
            accumulate_row(image, y, hashbox, &mut sums);
        }
    }
    Ok(sums)
}

/// Rows are split across workers, each filling its own partial sums, which
/// are merged afterwards. Integer sums make the result identical to a serial
/// pass.
#[cfg(feature = "threads")]
fn assign<S: PixelSource>(images: &[S], hashbox: &Hashbox) -> Result<Vec<Accum>, QuantizeError> {
    use rayon::prelude::*;

    let k = hashbox.len();
    let mut sums = try_filled(k, Accum::default())?;
    for image in images {
        let partial = (0..image.height())
            .into_par_iter()
            .fold(
                || vec![Accum::default(); k],
                |mut local, y| {
                    accumulate_row(image, y, hashbox, &mut local);
                    local
                },
            )
            .reduce(
                || vec![Accum::default(); k],
                |mut a, b| {
                    merge_into(&mut a, &b);
                    a
                },
            );
        merge_into(&mut sums, &partial);
    }
    Ok(sums)
}

#[cfg(feature = "threads")]
fn merge_into(into: &mut [Accum], from: &[Accum]) {
    for (a, b) in into.iter_mut().zip(from) {
        a.merge(b);
    }
}
