use std::collections::BTreeMap;

use rand::Rng;
use rgb::RGB8;

use crate::error::{QuantizeError, try_filled};
use crate::hashbox::{CELL_COUNT, Cell};
use crate::source::PixelSource;

/// Half-width of the jitter applied when a cell seeds more than one centroid.
const SEED_JITTER: i16 = 12;

/// Pixel counts per hashbox cell, over every source image.
#[derive(Debug, Clone)]
pub struct CellHistogram {
    counts: Vec<u64>,
}

impl CellHistogram {
    pub fn from_sources<S: PixelSource>(images: &[S]) -> Result<Self, QuantizeError> {
        let mut counts = try_filled(CELL_COUNT, 0u64)?;
        for image in images {
            for y in 0..image.height() {
                for x in 0..image.width() {
                    let p = image.pixel(x, y);
                    counts[Cell::of(RGB8::new(p.r, p.g, p.b)).index()] += 1;
                }
            }
        }
        Ok(Self { counts })
    }

    pub fn count(&self, cell: Cell) -> u64 {
        self.counts[cell.index()]
    }

    pub fn total(&self) -> u64 {
        self.counts.iter().sum()
    }

    /// Number of cells holding at least one pixel.
    pub fn occupied(&self) -> usize {
        self.counts.iter().filter(|&&c| c > 0).count()
    }

    /// Choose `slots` starting centroids by popularity.
    ///
    /// Each pick takes the cell with the highest `count / (picks + 1)^2`, so a
    /// busy cell keeps winning until its priority decays below the next one.
    /// A cell's first pick seeds its center, later picks seed points jittered
    /// by up to ±12 per channel inside the cell.
    pub fn seeds<R: Rng + ?Sized>(&self, slots: usize, rng: &mut R) -> Vec<RGB8> {
        let mut picks = vec![0u32; CELL_COUNT];
        let mut seeds = Vec::with_capacity(slots);

        for _ in 0..slots {
            let mut best = 0usize;
            for i in 1..CELL_COUNT {
                if outranks(
                    (self.counts[i], picks[i]),
                    (self.counts[best], picks[best]),
                ) {
                    best = i;
                }
            }

            let Some(cell) = Cell::from_index(best) else {
                break;
            };
            let seed = if picks[best] == 0 {
                cell.center()
            } else {
                jitter(cell, rng)
            };
            picks[best] += 1;
            seeds.push(seed);
        }

        seeds
    }
}

/// Whether a cell with `(count, picks)` has strictly higher priority than
/// another, comparing `count / (picks + 1)^2` without rounding.
fn outranks(a: (u64, u32), b: (u64, u32)) -> bool {
    let da = (a.1 as u128 + 1).pow(2);
    let db = (b.1 as u128 + 1).pow(2);
    a.0 as u128 * db > b.0 as u128 * da
}

fn jitter<R: Rng + ?Sized>(cell: Cell, rng: &mut R) -> RGB8 {
    let c = cell.center();
    let mut channel = |v: u8| (v as i16 + rng.random_range(-SEED_JITTER..=SEED_JITTER)) as u8;
    RGB8::new(channel(c.r), channel(c.g), channel(c.b))
}

/// Distinct colors of all sources in first-seen order, skipping any already
/// among `fixed`. Returns `None` as soon as more than `limit` are found.
pub(crate) fn distinct_colors<S: PixelSource>(
    images: &[S],
    fixed: &[RGB8],
    limit: usize,
) -> Option<Vec<RGB8>> {
    let mut seen: Vec<RGB8> = Vec::with_capacity(limit);
    let mut last = None;
    for image in images {
        for y in 0..image.height() {
            for x in 0..image.width() {
                let p = image.pixel(x, y);
                let color = RGB8::new(p.r, p.g, p.b);
                if last == Some(color) {
                    continue;
                }
                last = Some(color);
                if fixed.contains(&color) || seen.contains(&color) {
                    continue;
                }
                if seen.len() == limit {
                    return None;
                }
                seen.push(color);
            }
        }
    }
    Some(seen)
}

/// A histogram bucket: summed channels and pixel count.
#[derive(Debug, Clone, Default)]
struct Bucket {
    r_sum: u64,
    g_sum: u64,
    b_sum: u64,
    count: u64,
}

impl Bucket {
    fn mean(&self) -> [f32; 3] {
        let n = self.count as f32;
        [
            self.r_sum as f32 / n,
            self.g_sum as f32 / n,
            self.b_sum as f32 / n,
        ]
    }
}

/// Build a 5-bit-per-channel color histogram of all sources.
///
/// Returns each occupied bucket's mean color and its pixel count.
pub fn build_histogram<S: PixelSource>(images: &[S]) -> Vec<([f32; 3], f32)> {
    let mut buckets: BTreeMap<u16, Bucket> = BTreeMap::new();

    for image in images {
        for y in 0..image.height() {
            for x in 0..image.width() {
                let p = image.pixel(x, y);
                let key = ((p.r as u16 >> 3) << 10) | ((p.g as u16 >> 3) << 5) | (p.b as u16 >> 3);
                let e = buckets.entry(key).or_default();
                e.r_sum += p.r as u64;
                e.g_sum += p.g as u64;
                e.b_sum += p.b as u64;
                e.count += 1;
            }
        }
    }

    buckets
        .into_values()
        .map(|e| (e.mean(), e.count as f32))
        .collect()
}
