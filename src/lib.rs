#![forbid(unsafe_code)]

pub mod delegate;
pub mod dither;
pub mod error;
pub mod hashbox;
pub mod histogram;
pub mod iterative;
pub mod median_cut;
pub mod palette;
pub mod remap;
pub mod source;
pub mod transparency;

pub use delegate::ExternalQuantizer;
pub use dither::{BuiltinKernel, Kernel};
pub use error::{ConfigError, QuantizeError};
pub use hashbox::{Hashbox, LinearScan, NearestColor};
pub use palette::{MAX_PALETTE, Palette};
pub use source::PixelSource;
pub use transparency::{DEFAULT_ALPHA_THRESHOLD, OrderedMatrix, Transparency, apply_transparency};

use std::sync::Arc;

use imgref::ImgRef;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rgb::RGB8;

use crate::error::try_filled;

/// How the palette is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PaletteMode {
    /// The fixed colors are the whole palette.
    None,
    /// The fixed colors followed by the 216-color web-safe cube.
    WebSafe,
    /// Histogram-seeded centroids refined over the source pixels.
    #[default]
    Iterative,
    /// Black and white.
    Mono,
    /// Four evenly spaced grays.
    Gray4,
    /// Sixteen evenly spaced grays.
    Gray16,
    /// Every gray level.
    Gray256,
    /// Recursive median-cut boxes over a 5-bit histogram.
    MedianCut,
}

/// How pixels are mapped to palette indices.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum TranslateMode {
    /// Hand both palette construction and translation to
    /// [`QuantizeConfig::delegate`]. Falls back to [`TranslateMode::Nearest`]
    /// when no delegate is set.
    Delegate,
    /// Exact nearest color.
    #[default]
    Nearest,
    /// Nearest color after Gaussian noise with the given standard deviation.
    Perturb { deviation: f32 },
    /// Nearest color with error diffusion.
    ErrorDiffusion(Kernel),
}

/// Configuration for palette building and translation.
#[derive(Debug, Clone)]
pub struct QuantizeConfig {
    /// Palette capacity (1..=256).
    pub max_colors: usize,
    /// Colors that lead the palette unchanged, in this order.
    pub fixed_colors: Vec<RGB8>,
    pub palette_mode: PaletteMode,
    pub translate: TranslateMode,
    /// Alpha policy used by [`quantize`].
    pub transparency: Transparency,
    /// Seed for the generator behind [`build_palette`] and [`translate`].
    pub seed: u64,
    /// External quantizer used in [`TranslateMode::Delegate`].
    pub delegate: Option<Arc<dyn ExternalQuantizer>>,
}

impl Default for QuantizeConfig {
    fn default() -> Self {
        Self {
            max_colors: MAX_PALETTE,
            fixed_colors: Vec::new(),
            palette_mode: PaletteMode::Iterative,
            translate: TranslateMode::Nearest,
            transparency: Transparency::None,
            seed: 0,
            delegate: None,
        }
    }
}

impl QuantizeConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn max_colors(mut self, n: usize) -> Self {
        self.max_colors = n;
        self
    }

    pub fn fixed_colors(mut self, colors: impl Into<Vec<RGB8>>) -> Self {
        self.fixed_colors = colors.into();
        self
    }

    pub fn palette_mode(mut self, mode: PaletteMode) -> Self {
        self.palette_mode = mode;
        self
    }

    pub fn translate(mut self, mode: TranslateMode) -> Self {
        self.translate = mode;
        self
    }

    pub fn transparency(mut self, policy: Transparency) -> Self {
        self.transparency = policy;
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn delegate(mut self, quantizer: Arc<dyn ExternalQuantizer>) -> Self {
        self.delegate = Some(quantizer);
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_colors == 0 || self.max_colors > MAX_PALETTE {
            return Err(ConfigError::InvalidMaxColors(self.max_colors));
        }
        if self.fixed_colors.len() > self.max_colors {
            return Err(ConfigError::TooManyFixedColors {
                fixed: self.fixed_colors.len(),
                max_colors: self.max_colors,
            });
        }
        if let TranslateMode::Perturb { deviation } = self.translate {
            if !deviation.is_finite() {
                return Err(ConfigError::NonFiniteDeviation);
            }
        }
        Ok(())
    }

    fn rng(&self) -> StdRng {
        StdRng::seed_from_u64(self.seed)
    }

    fn active_delegate(&self) -> Option<&dyn ExternalQuantizer> {
        match self.translate {
            TranslateMode::Delegate => self.delegate.as_deref(),
            _ => None,
        }
    }
}

/// One palette index per pixel, row-major.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexBuffer {
    width: usize,
    height: usize,
    indices: Vec<u8>,
}

impl IndexBuffer {
    /// A zeroed buffer. Fails rather than aborting if it cannot be allocated.
    pub fn new(width: usize, height: usize) -> Result<Self, QuantizeError> {
        let len = width
            .checked_mul(height)
            .ok_or(QuantizeError::OutOfMemory { bytes: usize::MAX })?;
        Ok(Self {
            width,
            height,
            indices: try_filled(len, 0u8)?,
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn indices(&self) -> &[u8] {
        &self.indices
    }

    pub fn indices_mut(&mut self) -> &mut [u8] {
        &mut self.indices
    }

    pub fn get(&self, x: usize, y: usize) -> Option<u8> {
        if x >= self.width || y >= self.height {
            return None;
        }
        Some(self.indices[y * self.width + x])
    }

    /// Panics if `(x, y)` is outside the buffer.
    pub fn set(&mut self, x: usize, y: usize, index: u8) {
        assert!(x < self.width && y < self.height, "({x}, {y}) out of bounds");
        self.indices[y * self.width + x] = index;
    }

    pub fn as_img(&self) -> ImgRef<'_, u8> {
        ImgRef::new(&self.indices, self.width, self.height)
    }

    pub fn into_vec(self) -> Vec<u8> {
        self.indices
    }
}

/// Build one palette shared by every image in `images`.
///
/// Uses a generator seeded from [`QuantizeConfig::seed`], so equal inputs give
/// equal palettes.
pub fn build_palette<S: PixelSource>(
    images: &[S],
    config: &QuantizeConfig,
) -> Result<Palette, QuantizeError> {
    build_palette_with_rng(images, config, &mut config.rng())
}

/// [`build_palette`] drawing randomness from `rng`.
pub fn build_palette_with_rng<S, R>(
    images: &[S],
    config: &QuantizeConfig,
    rng: &mut R,
) -> Result<Palette, QuantizeError>
where
    S: PixelSource,
    R: Rng + ?Sized,
{
    config.validate()?;
    if images.is_empty() {
        return Err(QuantizeError::EmptySourceSet);
    }
    if let Some(external) = config.active_delegate() {
        return delegate::build_palette(external, images, config);
    }

    let fixed = config.fixed_colors.as_slice();
    let slots = config.max_colors - fixed.len();
    let palette = match config.palette_mode {
        PaletteMode::None => Palette::with_fixed(fixed, std::iter::empty()),
        PaletteMode::WebSafe => fixed_map(fixed, palette::web_safe_colors(), slots)?,
        PaletteMode::Mono => fixed_map(fixed, palette::mono_colors(), slots)?,
        PaletteMode::Gray4 => fixed_map(fixed, palette::gray_ramp(85), slots)?,
        PaletteMode::Gray16 => fixed_map(fixed, palette::gray_ramp(17), slots)?,
        PaletteMode::Gray256 => fixed_map(fixed, palette::gray_ramp(1), slots)?,
        PaletteMode::Iterative | PaletteMode::MedianCut => {
            match histogram::distinct_colors(images, fixed, slots) {
                Some(distinct) => {
                    tracing::debug!(colors = distinct.len(), "source fits, replicating colors");
                    Palette::with_fixed(fixed, distinct)
                }
                None if config.palette_mode == PaletteMode::Iterative => {
                    iterative::build_palette(images, fixed, config.max_colors, rng)?
                }
                None => {
                    let hist = histogram::build_histogram(images);
                    Palette::with_fixed(fixed, median_cut::median_cut(hist, slots))
                }
            }
        }
    };

    if palette.is_empty() {
        return Err(QuantizeError::InvalidPalette { len: 0 });
    }
    Ok(palette)
}

/// Fixed colors followed by the map entries not already among them.
fn fixed_map(fixed: &[RGB8], map: Vec<RGB8>, slots: usize) -> Result<Palette, ConfigError> {
    let extra: Vec<RGB8> = map.into_iter().filter(|c| !fixed.contains(c)).collect();
    if extra.len() > slots {
        return Err(ConfigError::PaletteCapacity {
            needed: extra.len(),
            available: slots,
        });
    }
    Ok(Palette::with_fixed(fixed, extra))
}

/// Map every pixel of `image` to an index into `palette`.
pub fn translate<S: PixelSource>(
    image: &S,
    palette: &Palette,
    config: &QuantizeConfig,
) -> Result<IndexBuffer, QuantizeError> {
    translate_with_rng(image, palette, config, &mut config.rng())
}

/// [`translate`] drawing perturbation noise from `rng`.
pub fn translate_with_rng<S, R>(
    image: &S,
    palette: &Palette,
    config: &QuantizeConfig,
    rng: &mut R,
) -> Result<IndexBuffer, QuantizeError>
where
    S: PixelSource,
    R: Rng + ?Sized,
{
    config.validate()?;
    if let Some(external) = config.active_delegate() {
        return delegate::translate(external, image, palette, config);
    }

    let hashbox = palette.hashbox()?;
    match &config.translate {
        TranslateMode::Delegate => {
            tracing::debug!("no delegate configured, translating to nearest");
            remap::remap(image, &hashbox)
        }
        TranslateMode::Nearest => remap::remap(image, &hashbox),
        TranslateMode::Perturb { deviation } => {
            remap::remap_perturbed(image, &hashbox, *deviation, rng)
        }
        TranslateMode::ErrorDiffusion(kernel) => dither::dither_image(image, &hashbox, kernel),
    }
}

/// A shared palette and one index buffer per source image.
#[derive(Debug, Clone)]
pub struct QuantizeResult {
    palette: Palette,
    frames: Vec<IndexBuffer>,
    transparent_index: Option<u8>,
}

impl QuantizeResult {
    pub fn palette(&self) -> &Palette {
        &self.palette
    }

    /// Index buffers in the order the images were given.
    pub fn frames(&self) -> &[IndexBuffer] {
        &self.frames
    }

    /// The entry reserved for transparent pixels, when a policy is set.
    /// Its color is a black placeholder.
    pub fn transparent_index(&self) -> Option<u8> {
        self.transparent_index
    }

    pub fn palette_len(&self) -> usize {
        self.palette.len()
    }

    pub fn into_frames(self) -> Vec<IndexBuffer> {
        self.frames
    }
}

/// Build a shared palette for `images`, translate each of them, and apply the
/// transparency policy.
///
/// With a policy set, the last palette slot is reserved for transparency: the
/// colors are built with one slot fewer and translated against that smaller
/// palette, so no opaque pixel can land on the reserved entry.
pub fn quantize<S: PixelSource>(
    images: &[S],
    config: &QuantizeConfig,
) -> Result<QuantizeResult, QuantizeError> {
    config.validate()?;
    if images.is_empty() {
        return Err(QuantizeError::EmptySourceSet);
    }

    let mut rng = config.rng();
    let reserve = !config.transparency.is_none();
    let mut palette = if reserve {
        // The reserved slot needs a palette of at least one color beside it.
        if config.max_colors < 2 || config.fixed_colors.len() >= config.max_colors {
            return Err(ConfigError::PaletteCapacity {
                needed: 1,
                available: 0,
            }
            .into());
        }
        let colors_only = config.clone().max_colors(config.max_colors - 1);
        build_palette_with_rng(images, &colors_only, &mut rng)?
    } else {
        build_palette_with_rng(images, config, &mut rng)?
    };

    let mut frames = Vec::with_capacity(images.len());
    for image in images {
        frames.push(translate_with_rng(image, &palette, config, &mut rng)?);
    }

    let transparent_index = if reserve {
        let index = palette
            .push(RGB8::new(0, 0, 0))
            .ok_or(QuantizeError::InvalidPalette { len: palette.len() + 1 })?;
        for (image, frame) in images.iter().zip(frames.iter_mut()) {
            apply_transparency(image, frame, index, &config.transparency)?;
        }
        Some(index)
    } else {
        None
    };

    tracing::debug!(
        frames = frames.len(),
        colors = palette.len(),
        ?transparent_index,
        "quantized"
    );
    Ok(QuantizeResult {
        palette,
        frames,
        transparent_index,
    })
}
