use rand::Rng;
use rgb::RGB8;

use crate::IndexBuffer;
use crate::error::QuantizeError;
use crate::hashbox::NearestColor;
use crate::source::PixelSource;

/// Map every pixel to its nearest palette entry.
///
/// With the `threads` feature rows are translated in parallel; the result is
/// identical either way.
pub fn remap<S, N>(image: &S, nearest: &N) -> Result<IndexBuffer, QuantizeError>
where
    S: PixelSource,
    N: NearestColor + Sync,
{
    let (width, height) = (image.width(), image.height());
    let mut out = IndexBuffer::new(width, height)?;
    if width == 0 || height == 0 {
        return Ok(out);
    }

    #[cfg(feature = "threads")]
    {
        use rayon::prelude::*;
        out.indices_mut()
            .par_chunks_mut(width)
            .enumerate()
            .for_each(|(y, row)| remap_row(image, y, nearest, row));
    }

    #[cfg(not(feature = "threads"))]
    for (y, row) in out.indices_mut().chunks_mut(width).enumerate() {
        remap_row(image, y, nearest, row);
    }

    Ok(out)
}

#[inline]
fn remap_row<S: PixelSource, N: NearestColor>(image: &S, y: usize, nearest: &N, row: &mut [u8]) {
    for (x, slot) in row.iter_mut().enumerate() {
        let p = image.pixel(x, y);
        *slot = nearest.nearest(RGB8::new(p.r, p.g, p.b)).0;
    }
}

/// Nearest-color mapping after nudging each channel by Gaussian noise with
/// standard deviation `deviation`. Noise breaks up flat banding the way
/// dithering does, without carrying error between pixels.
///
/// Pixels are visited in scan order so a seeded `rng` gives repeatable output.
pub fn remap_perturbed<S, N, R>(
    image: &S,
    nearest: &N,
    deviation: f32,
    rng: &mut R,
) -> Result<IndexBuffer, QuantizeError>
where
    S: PixelSource,
    N: NearestColor + Sync,
    R: Rng + ?Sized,
{
    if deviation <= 0.0 {
        return remap(image, nearest);
    }

    let (width, height) = (image.width(), image.height());
    let mut out = IndexBuffer::new(width, height)?;
    let deviation = deviation as f64;
    let indices = out.indices_mut();

    for y in 0..height {
        for x in 0..width {
            let p = image.pixel(x, y);
            let r = jiggle(p.r, deviation, rng);
            let g = jiggle(p.g, deviation, rng);
            let b = jiggle(p.b, deviation, rng);
            indices[y * width + x] = nearest.nearest(RGB8::new(r, g, b)).0;
        }
    }

    Ok(out)
}

#[inline]
fn jiggle<R: Rng + ?Sized>(v: u8, deviation: f64, rng: &mut R) -> u8 {
    let offset = (deviation * gaussian(rng)).trunc();
    (f64::from(v) + offset).clamp(0.0, 255.0) as u8
}

/// Standard normal sample (Marsaglia polar method).
pub(crate) fn gaussian<R: Rng + ?Sized>(rng: &mut R) -> f64 {
    loop {
        let u = rng.random::<f64>() * 2.0 - 1.0;
        let v = rng.random::<f64>() * 2.0 - 1.0;
        let s = u * u + v * v;
        if s > 0.0 && s < 1.0 {
            return u * (-2.0 * s.ln() / s).sqrt();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hashbox::{Hashbox, LinearScan};
    use imgref::ImgVec;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use rgb::RGBA8;

    fn grays() -> Vec<RGB8> {
        [0u8, 85, 170, 255]
            .iter()
            .map(|&v| RGB8::new(v, v, v))
            .collect()
    }

    fn gradient(width: usize) -> ImgVec<RGBA8> {
        let px = (0..width)
            .map(|x| {
                let v = (x * 255 / width.max(1)) as u8;
                RGBA8::new(v, v, v, 255)
            })
            .collect();
        ImgVec::new(px, width, 1)
    }

    #[test]
    fn nearest_finds_closest() {
        let hb = Hashbox::new(&grays()).unwrap();
        let img = ImgVec::new(
            vec![
                RGBA8::new(0, 0, 0, 255),
                RGBA8::new(80, 80, 80, 255),
                RGBA8::new(250, 250, 250, 255),
            ],
            3,
            1,
        );
        let out = remap(&img, &hb).unwrap();
        assert_eq!(out.indices(), &[0, 1, 3]);
    }

    #[test]
    fn hashbox_and_linear_agree() {
        let mut rng = StdRng::seed_from_u64(11);
        let colors: Vec<RGB8> = (0..40)
            .map(|_| RGB8::new(rng.random(), rng.random(), rng.random()))
            .collect();
        let img = gradient(200);
        let a = remap(&img, &Hashbox::new(&colors).unwrap()).unwrap();
        let b = remap(&img, &LinearScan::new(&colors).unwrap()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn multi_row_layout() {
        let hb = Hashbox::new(&grays()).unwrap();
        let px = vec![
            RGBA8::new(0, 0, 0, 255),
            RGBA8::new(255, 255, 255, 255),
            RGBA8::new(170, 170, 170, 255),
            RGBA8::new(85, 85, 85, 255),
        ];
        let out = remap(&ImgVec::new(px, 2, 2), &hb).unwrap();
        assert_eq!(out.get(0, 1), Some(2));
        assert_eq!(out.get(1, 1), Some(1));
        assert_eq!(out.width(), 2);
        assert_eq!(out.height(), 2);
    }

    #[test]
    fn zero_deviation_is_exact() {
        let hb = Hashbox::new(&grays()).unwrap();
        let img = gradient(64);
        let mut rng = StdRng::seed_from_u64(3);
        let exact = remap(&img, &hb).unwrap();
        let perturbed = remap_perturbed(&img, &hb, 0.0, &mut rng).unwrap();
        assert_eq!(exact, perturbed);
    }

    #[test]
    fn perturbation_changes_some_indices() {
        let hb = Hashbox::new(&grays()).unwrap();
        // Every pixel sits just below the 85/170 midpoint.
        let img = ImgVec::new(vec![RGBA8::new(125, 125, 125, 255); 256], 16, 16);
        let mut rng = StdRng::seed_from_u64(4);
        let out = remap_perturbed(&img, &hb, 20.0, &mut rng).unwrap();
        let upper = out.indices().iter().filter(|&&i| i == 2).count();
        assert!(upper > 0 && upper < 256, "upper={upper}");
        for &i in out.indices() {
            assert!(i < 4);
        }
    }

    #[test]
    fn perturbation_is_repeatable_with_seed() {
        let hb = Hashbox::new(&grays()).unwrap();
        let img = gradient(128);
        let a = remap_perturbed(&img, &hb, 12.0, &mut StdRng::seed_from_u64(8)).unwrap();
        let b = remap_perturbed(&img, &hb, 12.0, &mut StdRng::seed_from_u64(8)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn huge_deviation_saturates_to_extremes() {
        let hb = Hashbox::new(&grays()).unwrap();
        let img = ImgVec::new(vec![RGBA8::new(128, 128, 128, 255); 64], 8, 8);
        let mut rng = StdRng::seed_from_u64(5);
        let out = remap_perturbed(&img, &hb, f32::MAX, &mut rng).unwrap();
        assert!(out.indices().iter().all(|&i| i < 4));
        // Every channel saturates to 0 or 255.
        assert!(out.indices().contains(&0) || out.indices().contains(&3));
    }

    #[test]
    fn gaussian_is_centered() {
        let mut rng = StdRng::seed_from_u64(99);
        let n = 20_000;
        let mean: f64 = (0..n).map(|_| gaussian(&mut rng)).sum::<f64>() / n as f64;
        assert!(mean.abs() < 0.05, "mean={mean}");
    }
}
