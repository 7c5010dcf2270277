//! Quantize a synthetic RGBA image and write it as an indexed PNG.
//!
//! ```text
//! RUST_LOG=palquant=debug cargo run --example indexed_png -- out.png [colors]
//! ```

use std::fs::File;
use std::io::BufWriter;

use imgref::ImgVec;
use palquant::{BuiltinKernel, OrderedMatrix, QuantizeConfig, TranslateMode, Transparency};
use rgb::RGBA8;
use tracing_subscriber::EnvFilter;

const WIDTH: usize = 256;
const HEIGHT: usize = 128;

/// Hue sweep left to right, fading out toward the bottom right corner.
fn test_card() -> ImgVec<RGBA8> {
    let mut px = Vec::with_capacity(WIDTH * HEIGHT);
    for y in 0..HEIGHT {
        for x in 0..WIDTH {
            let t = x as f32 / WIDTH as f32 * 6.0;
            let f = t.fract();
            let (r, g, b) = match t as u32 {
                0 => (1.0, f, 0.0),
                1 => (1.0 - f, 1.0, 0.0),
                2 => (0.0, 1.0, f),
                3 => (0.0, 1.0 - f, 1.0),
                4 => (f, 0.0, 1.0),
                _ => (1.0, 0.0, 1.0 - f),
            };
            let shade = 1.0 - y as f32 / HEIGHT as f32 * 0.8;
            let alpha = if x + y > WIDTH { 255 - (x + y - WIDTH).min(255) } else { 255 };
            px.push(RGBA8::new(
                (r * shade * 255.0) as u8,
                (g * shade * 255.0) as u8,
                (b * shade * 255.0) as u8,
                alpha as u8,
            ));
        }
    }
    ImgVec::new(px, WIDTH, HEIGHT)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let mut args = std::env::args().skip(1);
    let path = args.next().unwrap_or_else(|| "indexed.png".to_owned());
    let colors: usize = match args.next() {
        Some(n) => n.parse()?,
        None => 32,
    };

    let image = test_card();
    let config = QuantizeConfig::new()
        .max_colors(colors)
        .translate(TranslateMode::ErrorDiffusion(
            BuiltinKernel::JarvisJudiceNinke.kernel(),
        ))
        .transparency(Transparency::Ordered(OrderedMatrix::Dot8));
    let result = palquant::quantize(&[&image], &config)?;

    let mut trns = vec![255u8; result.palette_len()];
    if let Some(index) = result.transparent_index() {
        trns[index as usize] = 0;
    }

    let file = BufWriter::new(File::create(&path)?);
    let mut encoder = png::Encoder::new(file, WIDTH as u32, HEIGHT as u32);
    encoder.set_color(png::ColorType::Indexed);
    encoder.set_depth(png::BitDepth::Eight);
    encoder.set_palette(result.palette().to_rgb_bytes());
    encoder.set_trns(trns);
    let mut writer = encoder.write_header()?;
    writer.write_image_data(result.frames()[0].indices())?;

    println!("wrote {path} with {} colors", result.palette_len());
    Ok(())
}
