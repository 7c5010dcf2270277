use std::sync::Arc;

use imgref::ImgVec;
use palquant::{
    BuiltinKernel, ExternalQuantizer, IndexBuffer, Kernel, OrderedMatrix, Palette, PaletteMode,
    PixelSource, QuantizeConfig, QuantizeError, TranslateMode, Transparency,
};
use rgb::{RGB8, RGBA8};

fn gradient(width: usize, height: usize) -> ImgVec<RGBA8> {
    let mut pixels = Vec::with_capacity(width * height);
    for y in 0..height {
        for x in 0..width {
            let r = (x * 255 / width) as u8;
            let g = (y * 255 / height) as u8;
            pixels.push(RGBA8::new(r, g, 128, 255));
        }
    }
    ImgVec::new(pixels, width, height)
}

fn row(colors: &[RGB8]) -> ImgVec<RGBA8> {
    let px = colors.iter().map(|c| RGBA8::new(c.r, c.g, c.b, 255)).collect();
    ImgVec::new(px, colors.len(), 1)
}

fn gray_row(width: usize, v: u8) -> ImgVec<RGBA8> {
    ImgVec::new(vec![RGBA8::new(v, v, v, 255); width], width, 1)
}

fn assert_valid(result: &palquant::QuantizeResult) {
    for frame in result.frames() {
        for &idx in frame.indices() {
            assert!((idx as usize) < result.palette_len());
        }
    }
}

#[test]
fn smoke_test_rgb() {
    let img = gradient(32, 32);
    let result = palquant::quantize(&[&img], &QuantizeConfig::default()).unwrap();

    assert!(result.palette_len() <= 256);
    assert!(result.palette_len() >= 2);
    assert_eq!(result.frames().len(), 1);
    assert_eq!(result.frames()[0].indices().len(), 32 * 32);
    assert!(result.transparent_index().is_none());
    assert_valid(&result);
}

#[test]
fn smoke_test_rgb8_source() {
    let px: Vec<RGB8> = (0..64).map(|i| RGB8::new(i * 4, 255 - i * 4, 7)).collect();
    let img = ImgVec::new(px, 8, 8);
    let config = QuantizeConfig::new().max_colors(16);
    let result = palquant::quantize(&[img.as_ref()], &config).unwrap();
    assert!(result.palette_len() <= 16);
    assert_valid(&result);
}

#[test]
fn exact_fit_scenario() {
    let colors = [
        RGB8::new(255, 0, 0),
        RGB8::new(0, 255, 0),
        RGB8::new(0, 0, 255),
        RGB8::new(255, 255, 255),
    ];
    let img = row(&colors);
    let config = QuantizeConfig::new().max_colors(4);
    let result = palquant::quantize(&[&img], &config).unwrap();

    assert_eq!(result.palette_len(), 4);
    let palette = result.palette();
    for (x, &c) in colors.iter().enumerate() {
        let idx = result.frames()[0].get(x, 0).unwrap();
        assert_eq!(palette.get(idx), Some(c));
    }
}

#[test]
fn fixed_colors_scenario() {
    let black = RGB8::new(0, 0, 0);
    let white = RGB8::new(255, 255, 255);
    let img = gradient(16, 16);
    let config = QuantizeConfig::new()
        .max_colors(8)
        .fixed_colors(vec![black, white]);
    let palette = palquant::build_palette(&[&img], &config).unwrap();

    assert!(palette.len() <= 8);
    assert_eq!(palette.get(0), Some(black));
    assert_eq!(palette.get(1), Some(white));
    assert_eq!(palette.fixed_count(), 2);
}

#[test]
fn threshold_transparency_scenario() {
    let img = ImgVec::new(
        vec![RGBA8::new(50, 50, 50, 127), RGBA8::new(50, 50, 50, 128)],
        2,
        1,
    );
    let palette = Palette::new(vec![RGB8::new(50, 50, 50), RGB8::new(0, 0, 0)]).unwrap();
    let config = QuantizeConfig::new();
    let mut frame = palquant::translate(&img, &palette, &config).unwrap();
    assert_eq!(frame.indices(), &[0, 0]);

    palquant::apply_transparency(&img, &mut frame, 1, &Transparency::Threshold(128)).unwrap();
    assert_eq!(frame.indices(), &[1, 0]);
}

#[test]
fn error_diffusion_alternates_between_neighbours() {
    let palette = Palette::new(
        [0u8, 64, 128, 192, 255]
            .iter()
            .map(|&v| RGB8::new(v, v, v))
            .collect(),
    )
    .unwrap();
    let img = gray_row(100, 96);
    let config = QuantizeConfig::new()
        .translate(TranslateMode::ErrorDiffusion(Kernel::FLOYD_STEINBERG));
    let frame = palquant::translate(&img, &palette, &config).unwrap();

    let low = frame.indices().iter().filter(|&&i| i == 1).count();
    let high = frame.indices().iter().filter(|&&i| i == 2).count();
    assert_eq!(low + high, 100);
    assert!((45..=55).contains(&low), "low={low} high={high}");
}

#[test]
fn replicate_is_lossless() {
    let colors: Vec<RGB8> = (0..40u8).map(|i| RGB8::new(i * 6, i, 255 - i * 3)).collect();
    let mut px = Vec::new();
    for _ in 0..3 {
        px.extend(colors.iter().rev().map(|c| RGBA8::new(c.r, c.g, c.b, 255)));
    }
    let img = ImgVec::new(px, 40, 3);

    for mode in [PaletteMode::Iterative, PaletteMode::MedianCut] {
        let config = QuantizeConfig::new().max_colors(64).palette_mode(mode);
        let result = palquant::quantize(&[&img], &config).unwrap();
        assert_eq!(result.palette_len(), 40, "{mode:?}");
        // First-seen order: the rows are reversed.
        assert_eq!(result.palette().get(0), colors.last().copied());
        let frame = &result.frames()[0];
        for y in 0..3 {
            for x in 0..40 {
                let src = img.pixel(x, y);
                let got = result.palette().get(frame.get(x, y).unwrap()).unwrap();
                assert_eq!(got, RGB8::new(src.r, src.g, src.b));
            }
        }
    }
}

#[test]
fn frames_share_one_palette() {
    let a = gradient(16, 16);
    let b = row(&[RGB8::new(255, 0, 255); 8]);
    let config = QuantizeConfig::new().max_colors(32);
    let result = palquant::quantize(&[&a, &b], &config).unwrap();

    assert_eq!(result.frames().len(), 2);
    assert_eq!(result.frames()[1].width(), 8);
    assert_valid(&result);
    let magenta = result.frames()[1].get(0, 0).unwrap();
    let c = result.palette().get(magenta).unwrap();
    assert!(c.r > 200 && c.g < 60 && c.b > 200, "magenta mapped to {c:?}");
}

#[test]
fn every_translate_mode_runs() {
    let img = gradient(24, 24);
    for mode in [
        TranslateMode::Nearest,
        TranslateMode::Perturb { deviation: 8.0 },
        TranslateMode::ErrorDiffusion(BuiltinKernel::FloydSteinberg.kernel()),
        TranslateMode::ErrorDiffusion(BuiltinKernel::JarvisJudiceNinke.kernel()),
        TranslateMode::ErrorDiffusion(BuiltinKernel::Stucki.kernel()),
        TranslateMode::ErrorDiffusion(Kernel::custom(3, 1, 0, vec![0, 2, 1]).unwrap()),
        TranslateMode::Delegate,
    ] {
        let config = QuantizeConfig::new().max_colors(12).translate(mode.clone());
        let result = palquant::quantize(&[&img], &config).unwrap();
        assert!(result.palette_len() <= 12, "{mode:?}");
        assert_valid(&result);
    }
}

#[test]
fn every_palette_mode_runs() {
    let img = gradient(8, 8);
    for (mode, len) in [
        (PaletteMode::WebSafe, 216),
        (PaletteMode::Mono, 2),
        (PaletteMode::Gray4, 4),
        (PaletteMode::Gray16, 16),
        (PaletteMode::Gray256, 256),
    ] {
        let config = QuantizeConfig::new().palette_mode(mode);
        let result = palquant::quantize(&[&img], &config).unwrap();
        assert_eq!(result.palette_len(), len, "{mode:?}");
        assert_valid(&result);
    }
}

#[test]
fn same_seed_same_output() {
    let img = gradient(40, 40);
    let config = QuantizeConfig::new()
        .max_colors(20)
        .seed(1234)
        .translate(TranslateMode::Perturb { deviation: 10.0 });
    let a = palquant::quantize(&[&img], &config).unwrap();
    let b = palquant::quantize(&[&img], &config).unwrap();
    assert_eq!(a.palette(), b.palette());
    assert_eq!(a.frames(), b.frames());
}

#[test]
fn ordered_transparency_through_quantize() {
    let mut px = Vec::new();
    for y in 0..16 {
        for x in 0..16 {
            let a = if y < 8 { 0 } else { 255 };
            px.push(RGBA8::new(x as u8 * 16, 100, 100, a));
        }
    }
    let img = ImgVec::new(px, 16, 16);
    let config = QuantizeConfig::new()
        .max_colors(16)
        .transparency(Transparency::Ordered(OrderedMatrix::Dot8));
    let result = palquant::quantize(&[&img], &config).unwrap();

    let ti = result.transparent_index().unwrap();
    assert_eq!(ti as usize, result.palette_len() - 1);
    let frame = &result.frames()[0];
    for y in 0..16 {
        for x in 0..16 {
            let clear = frame.get(x, y) == Some(ti);
            assert_eq!(clear, y < 8, "({x}, {y})");
        }
    }
}

#[test]
fn diffused_transparency_through_quantize() {
    let img = ImgVec::new(vec![RGBA8::new(30, 60, 90, 0); 64], 8, 8);
    let config = QuantizeConfig::new()
        .transparency(Transparency::ErrorDiffusion(BuiltinKernel::Stucki));
    let result = palquant::quantize(&[&img], &config).unwrap();
    let ti = result.transparent_index().unwrap();
    assert!(result.frames()[0].indices().iter().all(|&i| i == ti));
}

#[derive(Debug)]
struct Posterize;

impl ExternalQuantizer for Posterize {
    fn build_palette(
        &self,
        _images: &[&dyn PixelSource],
        config: &QuantizeConfig,
    ) -> Result<Palette, QuantizeError> {
        let mut colors = config.fixed_colors.clone();
        colors.push(RGB8::new(0, 0, 0));
        colors.push(RGB8::new(255, 255, 255));
        Palette::new(colors)
    }

    fn translate(
        &self,
        image: &dyn PixelSource,
        palette: &Palette,
        _config: &QuantizeConfig,
    ) -> Result<IndexBuffer, QuantizeError> {
        let mut out = IndexBuffer::new(image.width(), image.height())?;
        let white = palette.len() as u8 - 1;
        for y in 0..image.height() {
            for x in 0..image.width() {
                let p = image.pixel(x, y);
                let luma = (p.r as u32 + p.g as u32 + p.b as u32) / 3;
                out.set(x, y, if luma >= 128 { white } else { white - 1 });
            }
        }
        Ok(out)
    }
}

#[test]
fn delegate_handles_everything() {
    let img = gradient(16, 4);
    let config = QuantizeConfig::new()
        .translate(TranslateMode::Delegate)
        .delegate(Arc::new(Posterize));
    let result = palquant::quantize(&[&img], &config).unwrap();

    assert_eq!(result.palette_len(), 2);
    let frame = &result.frames()[0];
    assert_eq!(frame.get(0, 0), Some(0));
    assert_eq!(frame.get(15, 3), Some(1));
}

#[test]
fn delegate_ignored_in_other_modes() {
    let img = gradient(16, 4);
    let config = QuantizeConfig::new().max_colors(4).delegate(Arc::new(Posterize));
    let palette = palquant::build_palette(&[&img], &config).unwrap();
    assert_ne!(palette.entries(), &[RGB8::new(0, 0, 0), RGB8::new(255, 255, 255)]);
}

#[test]
fn invalid_inputs_are_errors() {
    let img = gradient(4, 4);
    assert!(matches!(
        palquant::quantize(&[&img], &QuantizeConfig::new().max_colors(0)),
        Err(QuantizeError::InvalidConfig(_))
    ));
    assert!(matches!(
        palquant::translate(&img, &Palette::default(), &QuantizeConfig::new()),
        Err(QuantizeError::InvalidPalette { len: 0 })
    ));

    let mut wrong = IndexBuffer::new(3, 3).unwrap();
    assert!(matches!(
        palquant::apply_transparency(&img, &mut wrong, 0, &Transparency::Threshold(128)),
        Err(QuantizeError::DimensionMismatch { .. })
    ));
}

#[test]
fn extreme_translate_settings_stay_in_range() {
    let palette = Palette::new(vec![RGB8::new(0, 0, 0), RGB8::new(255, 255, 255)]).unwrap();
    let img = ImgVec::new(vec![RGBA8::new(200, 200, 200, 255); 64], 8, 8);

    let heavy = Kernel::custom(2, 1, 0, vec![0, 100_000_000]).unwrap();
    let config = QuantizeConfig::new().translate(TranslateMode::ErrorDiffusion(heavy));
    let frame = palquant::translate(&img, &palette, &config).unwrap();
    let white = frame.indices().iter().filter(|&&i| i == 1).count();
    // 200 / 255 of the pixels, give or take rounding at row ends.
    assert!((44..=56).contains(&white), "white={white}");

    let config = QuantizeConfig::new().translate(TranslateMode::Perturb { deviation: f32::MAX });
    let frame = palquant::translate(&img, &palette, &config).unwrap();
    assert!(frame.indices().iter().all(|&i| i < 2));

    let config = QuantizeConfig::new().translate(TranslateMode::Perturb { deviation: f32::NAN });
    assert!(matches!(
        palquant::translate(&img, &palette, &config),
        Err(QuantizeError::InvalidConfig(palquant::ConfigError::NonFiniteDeviation))
    ));
}

struct Blank;

impl PixelSource for Blank {
    fn width(&self) -> usize {
        0
    }

    fn height(&self) -> usize {
        0
    }

    fn pixel(&self, _x: usize, _y: usize) -> RGBA8 {
        unreachable!("blank image has no pixels")
    }
}

#[test]
fn zero_sized_image() {
    let empty = Blank;
    let palette = Palette::new(vec![RGB8::new(1, 2, 3)]).unwrap();
    for mode in [
        TranslateMode::Nearest,
        TranslateMode::Perturb { deviation: 3.0 },
        TranslateMode::ErrorDiffusion(Kernel::STUCKI),
    ] {
        let config = QuantizeConfig::new().translate(mode);
        let frame = palquant::translate(&empty, &palette, &config).unwrap();
        assert!(frame.indices().is_empty());
    }
}
