use rgb::RGB8;

use crate::error::QuantizeError;
use crate::hashbox::Hashbox;

/// Largest palette the engine produces or accepts.
pub const MAX_PALETTE: usize = 256;

/// An ordered list of at most 256 colors. Pixels refer to entries by index.
///
/// Entries `0..fixed_count()` are the caller's fixed colors, unchanged and in
/// the order they were supplied.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Palette {
    entries: Vec<RGB8>,
    fixed: usize,
}

impl Palette {
    /// Wrap a list of colors. Fails if there are more than 256.
    pub fn new(entries: Vec<RGB8>) -> Result<Self, QuantizeError> {
        if entries.len() > MAX_PALETTE {
            return Err(QuantizeError::InvalidPalette { len: entries.len() });
        }
        Ok(Self { entries, fixed: 0 })
    }

    /// Fixed colors followed by generated ones. Callers guarantee the total
    /// stays within 256.
    pub(crate) fn with_fixed(fixed: &[RGB8], generated: impl IntoIterator<Item = RGB8>) -> Self {
        let mut entries = fixed.to_vec();
        entries.extend(generated);
        debug_assert!(entries.len() <= MAX_PALETTE);
        Self {
            entries,
            fixed: fixed.len(),
        }
    }

    pub fn entries(&self) -> &[RGB8] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, index: u8) -> Option<RGB8> {
        self.entries.get(index as usize).copied()
    }

    /// How many leading entries are caller-fixed colors.
    pub fn fixed_count(&self) -> usize {
        self.fixed
    }

    /// Index of the first entry equal to `color`.
    pub fn position(&self, color: RGB8) -> Option<u8> {
        self.entries
            .iter()
            .position(|&c| c == color)
            .map(|i| i as u8)
    }

    /// Flat `[r, g, b, r, g, b, ...]` bytes, as stored in GIF and PNG color tables.
    pub fn to_rgb_bytes(&self) -> Vec<u8> {
        self.entries.iter().flat_map(|c| [c.r, c.g, c.b]).collect()
    }

    /// Append an entry, returning its index. `None` once the palette is full.
    pub fn push(&mut self, color: RGB8) -> Option<u8> {
        if self.entries.len() >= MAX_PALETTE {
            return None;
        }
        self.entries.push(color);
        Some((self.entries.len() - 1) as u8)
    }

    /// Build the exact nearest-color index for this palette.
    pub fn hashbox(&self) -> Result<Hashbox, QuantizeError> {
        Hashbox::new(&self.entries)
    }
}

/// The 216-color web-safe cube: every channel in steps of 0x33.
pub fn web_safe_colors() -> Vec<RGB8> {
    const LEVELS: [u8; 6] = [0x00, 0x33, 0x66, 0x99, 0xcc, 0xff];
    let mut colors = Vec::with_capacity(216);
    for r in LEVELS {
        for g in LEVELS {
            for b in LEVELS {
                colors.push(RGB8::new(r, g, b));
            }
        }
    }
    colors
}

/// Black and white.
pub fn mono_colors() -> Vec<RGB8> {
    vec![RGB8::new(0, 0, 0), RGB8::new(255, 255, 255)]
}

/// Evenly spaced grays from black to white, `step` apart.
/// `step` must divide 255 (1, 17 and 85 give 256, 16 and 4 levels).
pub fn gray_ramp(step: u8) -> Vec<RGB8> {
    debug_assert!(step > 0 && 255 % step == 0);
    (0..=255u8)
        .step_by(step as usize)
        .map(|v| RGB8::new(v, v, v))
        .collect()
}
