//! Hand-off to an external quantizer.
//!
//! Some container formats ship their own quantizer. Plugging one in through
//! [`ExternalQuantizer`] and selecting [`TranslateMode::Delegate`] routes both
//! palette construction and translation through it unchanged.
//!
//! [`TranslateMode::Delegate`]: crate::TranslateMode::Delegate

use core::fmt::Debug;

use crate::error::QuantizeError;
use crate::palette::Palette;
use crate::source::PixelSource;
use crate::{IndexBuffer, QuantizeConfig};

/// An opaque quantizer honoring the same contract as the built-in one.
///
/// `build_palette` must return at most `config.max_colors` entries with the
/// configured fixed colors first; `translate` must return a buffer the size of
/// `image` whose indices are all below `palette.len()`. Results are checked
/// and a violating delegate gets [`QuantizeError::InvalidPalette`].
pub trait ExternalQuantizer: Debug + Send + Sync {
    fn build_palette(
        &self,
        images: &[&dyn PixelSource],
        config: &QuantizeConfig,
    ) -> Result<Palette, QuantizeError>;

    fn translate(
        &self,
        image: &dyn PixelSource,
        palette: &Palette,
        config: &QuantizeConfig,
    ) -> Result<IndexBuffer, QuantizeError>;
}

pub(crate) fn build_palette<S: PixelSource>(
    delegate: &dyn ExternalQuantizer,
    images: &[S],
    config: &QuantizeConfig,
) -> Result<Palette, QuantizeError> {
    let sources: Vec<&dyn PixelSource> = images.iter().map(|s| s as &dyn PixelSource).collect();
    let palette = delegate.build_palette(&sources, config)?;
    tracing::debug!(?delegate, colors = palette.len(), "delegate built palette");
    if palette.is_empty() || palette.len() > config.max_colors {
        return Err(QuantizeError::InvalidPalette { len: palette.len() });
    }
    Ok(palette)
}

pub(crate) fn translate<S: PixelSource>(
    delegate: &dyn ExternalQuantizer,
    image: &S,
    palette: &Palette,
    config: &QuantizeConfig,
) -> Result<IndexBuffer, QuantizeError> {
    let out = delegate.translate(image, palette, config)?;
    if out.width() != image.width() || out.height() != image.height() {
        return Err(QuantizeError::DimensionMismatch {
            buffer_width: out.width(),
            buffer_height: out.height(),
            width: image.width(),
            height: image.height(),
        });
    }
    if out.indices().iter().any(|&i| i as usize >= palette.len()) {
        return Err(QuantizeError::InvalidPalette { len: palette.len() });
    }
    Ok(out)
}
