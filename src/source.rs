//! Read access to source pixels.
//!
//! The quantizer never owns image storage. Anything that can report its
//! dimensions and hand out RGBA8 samples can be quantized; `imgref` views over
//! `RGBA8` and `RGB8` work out of the box.

use imgref::{Img, ImgRef, ImgVec};
use rgb::{RGB8, RGBA8};

/// A readable raster of RGBA8 pixels.
///
/// `Sync` is required so palette building and translation can fan rows out
/// across threads.
pub trait PixelSource: Sync {
    fn width(&self) -> usize;
    fn height(&self) -> usize;

    /// Pixel at column `x`, row `y`. Callers stay within `width() x height()`.
    fn pixel(&self, x: usize, y: usize) -> RGBA8;

    /// Total number of pixels.
    fn pixel_count(&self) -> usize {
        self.width() * self.height()
    }
}

impl<T: PixelSource + ?Sized> PixelSource for &T {
    fn width(&self) -> usize {
        (**self).width()
    }

    fn height(&self) -> usize {
        (**self).height()
    }

    fn pixel(&self, x: usize, y: usize) -> RGBA8 {
        (**self).pixel(x, y)
    }
}

impl PixelSource for ImgRef<'_, RGBA8> {
    fn width(&self) -> usize {
        Img::width(self)
    }

    fn height(&self) -> usize {
        Img::height(self)
    }

    fn pixel(&self, x: usize, y: usize) -> RGBA8 {
        self[(x, y)]
    }
}

impl PixelSource for ImgVec<RGBA8> {
    fn width(&self) -> usize {
        Img::width(self)
    }

    fn height(&self) -> usize {
        Img::height(self)
    }

    fn pixel(&self, x: usize, y: usize) -> RGBA8 {
        self[(x, y)]
    }
}

/// RGB sources are fully opaque.
impl PixelSource for ImgRef<'_, RGB8> {
    fn width(&self) -> usize {
        Img::width(self)
    }

    fn height(&self) -> usize {
        Img::height(self)
    }

    fn pixel(&self, x: usize, y: usize) -> RGBA8 {
        let p = self[(x, y)];
        RGBA8::new(p.r, p.g, p.b, 255)
    }
}

impl PixelSource for ImgVec<RGB8> {
    fn width(&self) -> usize {
        Img::width(self)
    }

    fn height(&self) -> usize {
        Img::height(self)
    }

    fn pixel(&self, x: usize, y: usize) -> RGBA8 {
        let p = self[(x, y)];
        RGBA8::new(p.r, p.g, p.b, 255)
    }
}
