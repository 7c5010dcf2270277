//! Exact nearest-color search over a partitioned RGB cube.
//!
//! The cube is split into 8 bands of 32 values per channel, giving 512 cells.
//! For each cell the [`Hashbox`] keeps only the palette entries that could be
//! nearest to *some* point of the cell, so a lookup scans a short list and still
//! returns exactly what a full linear scan would.

use rgb::RGB8;

use crate::error::QuantizeError;

/// Number of cells the RGB cube is split into (3 bits per channel).
pub const CELL_COUNT: usize = 512;

const BAND_SHIFT: u32 = 5;
const BAND_MASK: u8 = 0b1110_0000;

/// Squared Euclidean distance over R, G, B.
#[inline]
pub fn distance_sq(a: RGB8, b: RGB8) -> u32 {
    let dr = a.r as i32 - b.r as i32;
    let dg = a.g as i32 - b.g as i32;
    let db = a.b as i32 - b.b as i32;
    (dr * dr + dg * dg + db * db) as u32
}

/// One of the 512 cells of the RGB cube, addressed by the top three bits of
/// each channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Cell(u16);

impl Cell {
    /// The cell containing `color`.
    #[inline]
    pub fn of(color: RGB8) -> Self {
        let r = (color.r >> BAND_SHIFT) as u16;
        let g = (color.g >> BAND_SHIFT) as u16;
        let b = (color.b >> BAND_SHIFT) as u16;
        Self((r << 6) | (g << 3) | b)
    }

    pub fn from_index(index: usize) -> Option<Self> {
        (index < CELL_COUNT).then_some(Self(index as u16))
    }

    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }

    /// Every cell in index order.
    pub fn all() -> impl Iterator<Item = Cell> {
        (0..CELL_COUNT as u16).map(Cell)
    }

    /// Smallest color inside the cell.
    pub fn lower(self) -> RGB8 {
        let i = self.0;
        RGB8::new(
            ((i >> 6) as u8 & 7) << BAND_SHIFT,
            ((i >> 3) as u8 & 7) << BAND_SHIFT,
            (i as u8 & 7) << BAND_SHIFT,
        )
    }

    /// Largest color inside the cell.
    pub fn upper(self) -> RGB8 {
        let lo = self.lower();
        RGB8::new(lo.r | !BAND_MASK, lo.g | !BAND_MASK, lo.b | !BAND_MASK)
    }

    /// Geometric center of the cell, rounded up.
    pub fn center(self) -> RGB8 {
        let lo = self.lower();
        RGB8::new(lo.r + 16, lo.g + 16, lo.b + 16)
    }

    /// Largest squared distance from `color` to any point in the cell.
    pub fn max_distance(self, color: RGB8) -> u32 {
        let (lo, hi) = (self.lower(), self.upper());
        let far = |v: u8, lo: u8, hi: u8| -> u32 {
            let d = (v as i32 - lo as i32).abs().max((v as i32 - hi as i32).abs()) as u32;
            d * d
        };
        far(color.r, lo.r, hi.r) + far(color.g, lo.g, hi.g) + far(color.b, lo.b, hi.b)
    }

    /// Smallest squared distance from `color` to any point in the cell.
    /// Zero when the color lies inside.
    pub fn min_distance(self, color: RGB8) -> u32 {
        let (lo, hi) = (self.lower(), self.upper());
        let near = |v: u8, lo: u8, hi: u8| -> u32 {
            let d = if v < lo {
                (lo - v) as u32
            } else if v > hi {
                (v - hi) as u32
            } else {
                0
            };
            d * d
        };
        near(color.r, lo.r, hi.r) + near(color.g, lo.g, hi.g) + near(color.b, lo.b, hi.b)
    }
}

/// A nearest-color search strategy over a fixed set of palette entries.
///
/// Implementations must return the lowest index among equally near entries.
pub trait NearestColor {
    /// Index of the nearest entry and its squared distance.
    fn nearest(&self, color: RGB8) -> (u8, u32);

    /// The color of entry `index`.
    fn entry(&self, index: u8) -> RGB8;

    /// Number of searchable entries.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Brute-force search over every entry. Reference implementation for the
/// [`Hashbox`].
#[derive(Debug, Clone, Copy)]
pub struct LinearScan<'a> {
    colors: &'a [RGB8],
}

impl<'a> LinearScan<'a> {
    pub fn new(colors: &'a [RGB8]) -> Result<Self, QuantizeError> {
        check_palette_len(colors.len())?;
        Ok(Self { colors })
    }
}

impl NearestColor for LinearScan<'_> {
    fn nearest(&self, color: RGB8) -> (u8, u32) {
        let mut best = (0u8, u32::MAX);
        for (i, &entry) in self.colors.iter().enumerate() {
            let d = distance_sq(entry, color);
            if d < best.1 {
                best = (i as u8, d);
            }
        }
        best
    }

    fn entry(&self, index: u8) -> RGB8 {
        self.colors[index as usize]
    }

    fn len(&self) -> usize {
        self.colors.len()
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct Span {
    start: u32,
    len: u16,
}

/// Per-cell candidate lists for exact nearest-color lookup.
///
/// For each cell, `bound` is the smallest over all entries of the entry's
/// farthest distance to the cell; no point of the cell can have its nearest
/// entry farther than that. Every entry whose closest approach to the cell is
/// within `bound` becomes a candidate. Candidate lists live back to back in one
/// arena and keep palette order.
#[derive(Debug, Clone)]
pub struct Hashbox {
    colors: Vec<RGB8>,
    spans: Vec<Span>,
    arena: Vec<u8>,
}

impl Hashbox {
    /// Build the table for `colors` (1 to 256 entries).
    pub fn new(colors: &[RGB8]) -> Result<Self, QuantizeError> {
        check_palette_len(colors.len())?;

        let mut spans = Vec::new();
        spans
            .try_reserve_exact(CELL_COUNT)
            .map_err(|_| QuantizeError::OutOfMemory {
                bytes: CELL_COUNT * core::mem::size_of::<Span>(),
            })?;
        let mut arena: Vec<u8> = Vec::new();

        for cell in Cell::all() {
            let bound = colors
                .iter()
                .map(|&c| cell.max_distance(c))
                .min()
                .unwrap_or(u32::MAX);

            arena
                .try_reserve(colors.len())
                .map_err(|_| QuantizeError::OutOfMemory {
                    bytes: arena.len() + colors.len(),
                })?;
            let start = arena.len();
            arena.extend(
                colors
                    .iter()
                    .enumerate()
                    .filter(|&(_, &c)| cell.min_distance(c) <= bound)
                    .map(|(i, _)| i as u8),
            );
            spans.push(Span {
                start: start as u32,
                len: (arena.len() - start) as u16,
            });
        }

        Ok(Self {
            colors: colors.to_vec(),
            spans,
            arena,
        })
    }

    /// Candidate palette indices for `cell`, in palette order.
    pub fn candidates(&self, cell: Cell) -> &[u8] {
        let span = self.spans[cell.index()];
        let start = span.start as usize;
        &self.arena[start..start + span.len as usize]
    }

    /// The entries this table was built for.
    pub fn colors(&self) -> &[RGB8] {
        &self.colors
    }

    /// Average candidate list length over all cells.
    pub fn mean_candidates(&self) -> f32 {
        self.arena.len() as f32 / CELL_COUNT as f32
    }
}

impl NearestColor for Hashbox {
    #[inline]
    fn nearest(&self, color: RGB8) -> (u8, u32) {
        let mut best = (0u8, u32::MAX);
        for &i in self.candidates(Cell::of(color)) {
            let d = distance_sq(self.colors[i as usize], color);
            if d < best.1 {
                best = (i, d);
            }
        }
        best
    }

    fn entry(&self, index: u8) -> RGB8 {
        self.colors[index as usize]
    }

    fn len(&self) -> usize {
        self.colors.len()
    }
}

fn check_palette_len(len: usize) -> Result<(), QuantizeError> {
    if len == 0 || len > 256 {
        return Err(QuantizeError::InvalidPalette { len });
    }
    Ok(())
}
