//! Train-time image augmentation for histopathology patches.
//!
//! The pipeline runs four top-level steps in random order: horizontal flip,
//! vertical flip, an occasional affine warp (rotation + shear, symmetric
//! border), and a "some of" block that applies between zero and
//! `max_extra_ops` of the photometric ops below, also in random order:
//!
//! - one of gaussian blur / average blur / median blur
//! - additive gaussian noise
//! - pixel dropout
//! - hue and saturation shift
//! - linear contrast
//!
//! Noise, dropout, and contrast sample per channel with probability
//! `per_channel_prob`.

use image::RgbImage;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};

/// Kernel sizes median blur draws from.
const MEDIAN_KERNELS: [u32; 5] = [3, 5, 7, 9, 11];
/// Gaussian blur below this sigma is a no-op.
const MIN_BLUR_SIGMA: f32 = 0.1;

#[derive(Debug, Clone, PartialEq)]
pub struct AugmentPipeline {
    pub flip_horizontal_prob: f32,
    pub flip_vertical_prob: f32,
    /// Probability of the affine warp.
    pub affine_prob: f32,
    /// Rotation drawn from `[-max_rotate_deg, max_rotate_deg]`.
    pub max_rotate_deg: f32,
    /// Shear drawn from `[-max_shear_deg, max_shear_deg]`.
    pub max_shear_deg: f32,
    /// Upper bound of the photometric block; at most five ops exist.
    pub max_extra_ops: usize,
    pub blur_sigma_max: f32,
    /// Inclusive average-blur kernel range.
    pub average_blur_kernel: (u32, u32),
    /// Noise sigma drawn from `[0, noise_sigma_max]`, in 0-255 units.
    pub noise_sigma_max: f32,
    /// Fraction of pixels zeroed.
    pub dropout_range: (f32, f32),
    /// Shift drawn from `[-hue_saturation_shift, hue_saturation_shift]`.
    pub hue_saturation_shift: i32,
    pub contrast_range: (f32, f32),
    pub per_channel_prob: f32,
    /// Per-sample deterministic RNG when set (`seed ^ key`).
    pub seed: Option<u64>,
}

impl Default for AugmentPipeline {
    fn default() -> Self {
        Self {
            flip_horizontal_prob: 0.5,
            flip_vertical_prob: 0.5,
            affine_prob: 0.2,
            max_rotate_deg: 45.0,
            max_shear_deg: 16.0,
            max_extra_ops: 5,
            blur_sigma_max: 3.0,
            average_blur_kernel: (2, 7),
            noise_sigma_max: 0.05 * 255.0,
            dropout_range: (0.01, 0.1),
            hue_saturation_shift: 20,
            contrast_range: (0.5, 2.0),
            per_channel_prob: 0.5,
            seed: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    FlipHorizontal,
    FlipVertical,
    Affine,
    Photometric,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Photometric {
    Blur,
    Noise,
    Dropout,
    HueSaturation,
    Contrast,
}

impl AugmentPipeline {
    pub fn builder() -> AugmentPipelineBuilder {
        AugmentPipelineBuilder::new()
    }

    /// A pipeline that never changes the image.
    pub fn identity() -> Self {
        Self {
            flip_horizontal_prob: 0.0,
            flip_vertical_prob: 0.0,
            affine_prob: 0.0,
            max_extra_ops: 0,
            ..Self::default()
        }
    }

    pub fn describe(&self) -> String {
        format!(
            "flip_h_p={:.2} flip_v_p={:.2} affine_p={:.2} rotate=±{:.0} shear=±{:.0} extra_ops=0..={} blur_sigma<={:.1} avg_k={}..={} noise_sigma<={:.2} dropout=[{:.2},{:.2}] hue_sat=±{} contrast=[{:.2},{:.2}] per_channel_p={:.2} seed={}",
            self.flip_horizontal_prob,
            self.flip_vertical_prob,
            self.affine_prob,
            self.max_rotate_deg,
            self.max_shear_deg,
            self.max_extra_ops.min(5),
            self.blur_sigma_max,
            self.average_blur_kernel.0,
            self.average_blur_kernel.1,
            self.noise_sigma_max,
            self.dropout_range.0,
            self.dropout_range.1,
            self.hue_saturation_shift,
            self.contrast_range.0,
            self.contrast_range.1,
            self.per_channel_prob,
            self.seed
                .map(|s| s.to_string())
                .unwrap_or_else(|| "none".to_string())
        )
    }

    /// Augment `img`. With a seed the result depends only on `(seed, key)`.
    pub fn apply(&self, mut img: RgbImage, key: u64) -> RgbImage {
        let mut rng_local;
        let mut seeded_rng;
        let rng: &mut dyn rand::RngCore = if let Some(seed) = self.seed {
            seeded_rng = rand::rngs::StdRng::seed_from_u64(seed ^ key);
            &mut seeded_rng
        } else {
            rng_local = rand::rng();
            &mut rng_local
        };
        self.apply_with_rng(&mut img, rng);
        img
    }

    pub fn apply_with_rng(&self, img: &mut RgbImage, rng: &mut dyn rand::RngCore) {
        if img.width() == 0 || img.height() == 0 {
            return;
        }
        let mut steps = [
            Step::FlipHorizontal,
            Step::FlipVertical,
            Step::Affine,
            Step::Photometric,
        ];
        steps.shuffle(rng);
        for step in steps {
            match step {
                Step::FlipHorizontal => {
                    if chance(rng, self.flip_horizontal_prob) {
                        image::imageops::flip_horizontal_in_place(img);
                    }
                }
                Step::FlipVertical => {
                    if chance(rng, self.flip_vertical_prob) {
                        image::imageops::flip_vertical_in_place(img);
                    }
                }
                Step::Affine => {
                    if chance(rng, self.affine_prob) {
                        let rotate = uniform(rng, -self.max_rotate_deg, self.max_rotate_deg);
                        let shear = uniform(rng, -self.max_shear_deg, self.max_shear_deg);
                        let bilinear = rng.random_bool(0.5);
                        *img = affine(img, rotate, shear, bilinear);
                    }
                }
                Step::Photometric => self.photometric(img, rng),
            }
        }
    }

    fn photometric(&self, img: &mut RgbImage, rng: &mut dyn rand::RngCore) {
        let upper = self.max_extra_ops.min(5);
        if upper == 0 {
            return;
        }
        let count = rng.random_range(0..=upper);
        let mut ops = [
            Photometric::Blur,
            Photometric::Noise,
            Photometric::Dropout,
            Photometric::HueSaturation,
            Photometric::Contrast,
        ];
        ops.shuffle(rng);
        for op in &ops[..count] {
            match op {
                Photometric::Blur => self.one_of_blur(img, rng),
                Photometric::Noise => {
                    let sigma = uniform(rng, 0.0, self.noise_sigma_max);
                    let per_channel = chance(rng, self.per_channel_prob);
                    additive_gaussian_noise(img, sigma, per_channel, rng);
                }
                Photometric::Dropout => {
                    let p = uniform(rng, self.dropout_range.0, self.dropout_range.1);
                    let per_channel = chance(rng, self.per_channel_prob);
                    dropout(img, p, per_channel, rng);
                }
                Photometric::HueSaturation => {
                    let shift = self.hue_saturation_shift.abs();
                    let value = rng.random_range(-shift..=shift);
                    add_to_hue_and_saturation(img, value);
                }
                Photometric::Contrast => {
                    let (lo, hi) = self.contrast_range;
                    let alphas = if chance(rng, self.per_channel_prob) {
                        [uniform(rng, lo, hi), uniform(rng, lo, hi), uniform(rng, lo, hi)]
                    } else {
                        [uniform(rng, lo, hi); 3]
                    };
                    linear_contrast(img, alphas);
                }
            }
        }
    }

    fn one_of_blur(&self, img: &mut RgbImage, rng: &mut dyn rand::RngCore) {
        match rng.random_range(0..3) {
            0 => {
                let sigma = uniform(rng, 0.0, self.blur_sigma_max);
                if sigma >= MIN_BLUR_SIGMA {
                    *img = image::imageops::blur(img, sigma);
                }
            }
            1 => {
                let (lo, hi) = self.average_blur_kernel;
                let k = if hi > lo { rng.random_range(lo..=hi) } else { lo };
                *img = average_blur(img, k);
            }
            _ => {
                let k = MEDIAN_KERNELS[rng.random_range(0..MEDIAN_KERNELS.len())];
                *img = median_blur(img, k);
            }
        }
    }
}

pub struct AugmentPipelineBuilder {
    inner: AugmentPipeline,
}

impl Default for AugmentPipelineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl AugmentPipelineBuilder {
    pub fn new() -> Self {
        Self {
            inner: AugmentPipeline::default(),
        }
    }
    pub fn flips(mut self, horizontal: f32, vertical: f32) -> Self {
        self.inner.flip_horizontal_prob = horizontal;
        self.inner.flip_vertical_prob = vertical;
        self
    }
    pub fn affine(mut self, prob: f32, max_rotate_deg: f32, max_shear_deg: f32) -> Self {
        self.inner.affine_prob = prob;
        self.inner.max_rotate_deg = max_rotate_deg;
        self.inner.max_shear_deg = max_shear_deg;
        self
    }
    pub fn max_extra_ops(mut self, max: usize) -> Self {
        self.inner.max_extra_ops = max;
        self
    }
    pub fn blur(mut self, sigma_max: f32, average_kernel: (u32, u32)) -> Self {
        self.inner.blur_sigma_max = sigma_max;
        self.inner.average_blur_kernel = average_kernel;
        self
    }
    pub fn noise(mut self, sigma_max: f32) -> Self {
        self.inner.noise_sigma_max = sigma_max;
        self
    }
    pub fn dropout(mut self, min: f32, max: f32) -> Self {
        self.inner.dropout_range = (min, max);
        self
    }
    pub fn hue_saturation(mut self, shift: i32) -> Self {
        self.inner.hue_saturation_shift = shift;
        self
    }
    pub fn contrast(mut self, min: f32, max: f32) -> Self {
        self.inner.contrast_range = (min, max);
        self
    }
    pub fn per_channel_prob(mut self, p: f32) -> Self {
        self.inner.per_channel_prob = p;
        self
    }
    pub fn seed(mut self, seed: Option<u64>) -> Self {
        self.inner.seed = seed;
        self
    }
    pub fn build(self) -> AugmentPipeline {
        self.inner
    }
}

fn chance(rng: &mut dyn rand::RngCore, prob: f32) -> bool {
    prob > 0.0 && rng.random_range(0.0..1.0) < prob
}

fn uniform(rng: &mut dyn rand::RngCore, lo: f32, hi: f32) -> f32 {
    if hi > lo {
        rng.random_range(lo..=hi)
    } else {
        lo
    }
}

/// Mirror an out-of-range index back into `0..n` (`d c b a | a b c d | d c b a`).
pub(crate) fn reflect(i: i64, n: u32) -> u32 {
    let n = i64::from(n);
    let period = 2 * n;
    let m = i.rem_euclid(period);
    let idx = if m < n { m } else { period - 1 - m };
    idx as u32
}

fn to_u8(v: f32) -> u8 {
    v.round().clamp(0.0, 255.0) as u8
}

/// Rotate by `rotate_deg` and shear by `shear_deg` about the image centre.
pub(crate) fn affine(img: &RgbImage, rotate_deg: f32, shear_deg: f32, bilinear: bool) -> RgbImage {
    let (w, h) = img.dimensions();
    let r = rotate_deg.to_radians();
    let s = shear_deg.to_radians();
    let (a, b, c, d) = (r.cos(), -(r + s).sin(), r.sin(), (r + s).cos());
    let det = a * d - b * c;
    if det.abs() < 1e-6 {
        return img.clone();
    }
    let (ia, ib, ic, id) = (d / det, -b / det, -c / det, a / det);
    let cx = (w as f32 - 1.0) / 2.0;
    let cy = (h as f32 - 1.0) / 2.0;
    let mut out = RgbImage::new(w, h);
    for (x, y, px) in out.enumerate_pixels_mut() {
        let dx = x as f32 - cx;
        let dy = y as f32 - cy;
        let sx = ia * dx + ib * dy + cx;
        let sy = ic * dx + id * dy + cy;
        *px = if bilinear {
            sample_bilinear(img, sx, sy)
        } else {
            let rx = reflect(sx.round() as i64, w);
            let ry = reflect(sy.round() as i64, h);
            *img.get_pixel(rx, ry)
        };
    }
    out
}

fn sample_bilinear(img: &RgbImage, sx: f32, sy: f32) -> image::Rgb<u8> {
    let (w, h) = img.dimensions();
    let x0 = sx.floor();
    let y0 = sy.floor();
    let fx = sx - x0;
    let fy = sy - y0;
    let (x0, y0) = (x0 as i64, y0 as i64);
    let p00 = img.get_pixel(reflect(x0, w), reflect(y0, h));
    let p10 = img.get_pixel(reflect(x0 + 1, w), reflect(y0, h));
    let p01 = img.get_pixel(reflect(x0, w), reflect(y0 + 1, h));
    let p11 = img.get_pixel(reflect(x0 + 1, w), reflect(y0 + 1, h));
    let mut out = [0u8; 3];
    for (c, slot) in out.iter_mut().enumerate() {
        let top = p00[c] as f32 * (1.0 - fx) + p10[c] as f32 * fx;
        let bottom = p01[c] as f32 * (1.0 - fx) + p11[c] as f32 * fx;
        *slot = to_u8(top * (1.0 - fy) + bottom * fy);
    }
    image::Rgb(out)
}

/// Box filter with a `k × k` window anchored at `k / 2`.
pub(crate) fn average_blur(img: &RgbImage, k: u32) -> RgbImage {
    if k <= 1 {
        return img.clone();
    }
    let (w, h) = img.dimensions();
    let lo = -i64::from(k / 2);
    let hi = i64::from(k - k / 2);
    let norm = k as f32;
    let mut horizontal = vec![0f32; (w * h * 3) as usize];
    for y in 0..h {
        for x in 0..w {
            let mut acc = [0f32; 3];
            for off in lo..hi {
                let p = img.get_pixel(reflect(i64::from(x) + off, w), y);
                for c in 0..3 {
                    acc[c] += p[c] as f32;
                }
            }
            let base = ((y * w + x) * 3) as usize;
            for c in 0..3 {
                horizontal[base + c] = acc[c] / norm;
            }
        }
    }
    let mut out = RgbImage::new(w, h);
    for (x, y, px) in out.enumerate_pixels_mut() {
        let mut acc = [0f32; 3];
        for off in lo..hi {
            let ry = reflect(i64::from(y) + off, h);
            let base = ((ry * w + x) * 3) as usize;
            for c in 0..3 {
                acc[c] += horizontal[base + c];
            }
        }
        *px = image::Rgb([to_u8(acc[0] / norm), to_u8(acc[1] / norm), to_u8(acc[2] / norm)]);
    }
    out
}

/// Per-channel median over a `k × k` window, `k` odd.
pub(crate) fn median_blur(img: &RgbImage, k: u32) -> RgbImage {
    if k <= 1 {
        return img.clone();
    }
    let (w, h) = img.dimensions();
    let radius = i64::from(k / 2);
    let mut window: Vec<u8> = Vec::with_capacity((k * k) as usize);
    let mut out = RgbImage::new(w, h);
    for (x, y, px) in out.enumerate_pixels_mut() {
        for c in 0..3 {
            window.clear();
            for dy in -radius..=radius {
                let ry = reflect(i64::from(y) + dy, h);
                for dx in -radius..=radius {
                    let rx = reflect(i64::from(x) + dx, w);
                    window.push(img.get_pixel(rx, ry)[c]);
                }
            }
            let mid = window.len() / 2;
            let (_, median, _) = window.select_nth_unstable(mid);
            px[c] = *median;
        }
    }
    out
}

fn additive_gaussian_noise(
    img: &mut RgbImage,
    sigma: f32,
    per_channel: bool,
    rng: &mut dyn rand::RngCore,
) {
    if sigma <= 0.0 {
        return;
    }
    let Ok(normal) = Normal::new(0.0f32, sigma) else {
        return;
    };
    for pixel in img.pixels_mut() {
        if per_channel {
            for c in 0..3 {
                pixel[c] = to_u8(pixel[c] as f32 + normal.sample(rng));
            }
        } else {
            let n = normal.sample(rng);
            for c in 0..3 {
                pixel[c] = to_u8(pixel[c] as f32 + n);
            }
        }
    }
}

fn dropout(img: &mut RgbImage, p: f32, per_channel: bool, rng: &mut dyn rand::RngCore) {
    if p <= 0.0 {
        return;
    }
    for pixel in img.pixels_mut() {
        if per_channel {
            for c in 0..3 {
                if rng.random_range(0.0..1.0) < p {
                    pixel[c] = 0;
                }
            }
        } else if rng.random_range(0.0..1.0) < p {
            *pixel = image::Rgb([0, 0, 0]);
        }
    }
}

/// `v' = 128 + alpha * (v - 128)` per channel.
pub(crate) fn linear_contrast(img: &mut RgbImage, alphas: [f32; 3]) {
    for pixel in img.pixels_mut() {
        for c in 0..3 {
            pixel[c] = to_u8(128.0 + alphas[c] * (pixel[c] as f32 - 128.0));
        }
    }
}

/// Shift hue by `value * 360 / 255` degrees and saturation by `value / 255`.
pub(crate) fn add_to_hue_and_saturation(img: &mut RgbImage, value: i32) {
    if value == 0 {
        return;
    }
    let hue_shift = value as f32 * 360.0 / 255.0;
    let sat_shift = value as f32 / 255.0;
    for pixel in img.pixels_mut() {
        let (hue, sat, val) = rgb_to_hsv(pixel[0], pixel[1], pixel[2]);
        let hue = (hue + hue_shift).rem_euclid(360.0);
        let sat = (sat + sat_shift).clamp(0.0, 1.0);
        let [r, g, b] = hsv_to_rgb(hue, sat, val);
        *pixel = image::Rgb([r, g, b]);
    }
}

/// Hue in degrees, saturation and value in `[0, 1]`.
pub(crate) fn rgb_to_hsv(r: u8, g: u8, b: u8) -> (f32, f32, f32) {
    let (r, g, b) = (r as f32 / 255.0, g as f32 / 255.0, b as f32 / 255.0);
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let delta = max - min;
    let hue = if delta == 0.0 {
        0.0
    } else if max == r {
        60.0 * ((g - b) / delta).rem_euclid(6.0)
    } else if max == g {
        60.0 * ((b - r) / delta + 2.0)
    } else {
        60.0 * ((r - g) / delta + 4.0)
    };
    let sat = if max == 0.0 { 0.0 } else { delta / max };
    (hue, sat, max)
}

pub(crate) fn hsv_to_rgb(hue: f32, sat: f32, val: f32) -> [u8; 3] {
    let c = val * sat;
    let h = hue / 60.0;
    let x = c * (1.0 - (h.rem_euclid(2.0) - 1.0).abs());
    let (r, g, b) = match h as u32 {
        0 => (c, x, 0.0),
        1 => (x, c, 0.0),
        2 => (0.0, c, x),
        3 => (0.0, x, c),
        4 => (x, 0.0, c),
        _ => (c, 0.0, x),
    };
    let m = val - c;
    [
        to_u8((r + m) * 255.0),
        to_u8((g + m) * 255.0),
        to_u8((b + m) * 255.0),
    ]
}
