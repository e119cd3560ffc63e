//! Normalized cross-correlation (mean-subtracted, single scale) over grayscale images.
//!
//! For a placement `(x, y)` the score is
//! `Σ (T - T̄)(I - Ī) / sqrt(Σ (T - T̄)² · Σ (I - Ī)²)`, the same measure as
//! OpenCV's `TM_CCOEFF_NORMED`. Window sums come from integral images and the cross
//! term for every placement comes from one FFT correlation, so a search costs
//! `O(N log N)` in the capture size rather than capture × reference. Placements where
//! either side has no variance score 0, and scores are clamped to [0, 1].

use image::GrayImage;
use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};

/// Best placement of a reference inside a capture (physical pixels).
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct BestMatch {
    pub x: u32,
    pub y: u32,
    pub score: f32,
}

/// Find the highest-scoring placement of `reference` inside `haystack`.
/// Returns `None` when the reference does not fit inside the capture.
pub fn best_match(haystack: &GrayImage, reference: &GrayImage) -> Option<BestMatch> {
    Matcher::new(reference).best_match(haystack)
}

/// A reference prepared for repeated searches.
///
/// The reference spectrum is kept for the last capture size, so retrying against
/// same-sized captures only transforms the capture.
pub struct Matcher {
    width: u32,
    height: u32,
    centered: Vec<f64>,
    energy: f64,
    planner: FftPlanner<f64>,
    spectrum: Option<Spectrum>,
}

impl Matcher {
    pub fn new(reference: &GrayImage) -> Self {
        let (width, height) = reference.dimensions();
        let raw = reference.as_raw();
        let (sum, sum_sq) = raw.iter().fold((0_u64, 0_u64), |(s, sq), &p| {
            let v = u64::from(p);
            (s + v, sq + v * v)
        });
        let n = raw.len() as u64;
        let (mean, energy) = if n == 0 {
            (0.0, 0.0)
        } else {
            (sum as f64 / n as f64, spread(n, sum, sum_sq))
        };
        Self {
            width,
            height,
            centered: raw.iter().map(|&p| f64::from(p) - mean).collect(),
            energy,
            planner: FftPlanner::new(),
            spectrum: None,
        }
    }

    /// First highest-scoring placement in row-major order, or `None` when the
    /// reference does not fit inside `haystack`.
    pub fn best_match(&mut self, haystack: &GrayImage) -> Option<BestMatch> {
        let (hw, hh) = haystack.dimensions();
        let (rw, rh) = (self.width, self.height);
        if rw == 0 || rh == 0 || rw > hw || rh > hh {
            return None;
        }

        let mut best = BestMatch {
            x: 0,
            y: 0,
            score: 0.0,
        };
        if self.energy == 0.0 {
            return Some(best);
        }

        let (cross, stride) = self.correlate(haystack);
        let integral = Integral::new(haystack);
        let n = u64::from(rw) * u64::from(rh);

        for y in 0..=(hh - rh) {
            let row = &cross[y as usize * stride..];
            for x in 0..=(hw - rw) {
                let (sum, sum_sq) = integral.window(x, y, rw, rh);
                let win_energy = spread(n, sum, sum_sq);
                if win_energy == 0.0 {
                    continue;
                }
                // Σ (T - T̄)·I equals Σ (T - T̄)(I - Ī) because Σ (T - T̄) = 0.
                let score = (row[x as usize] / (self.energy * win_energy).sqrt()).clamp(0.0, 1.0);
                let score = score as f32;
                if score > best.score {
                    best = BestMatch { x, y, score };
                }
            }
        }

        Some(best)
    }

    /// `Σ (T - T̄)·I` for every top-left placement, laid out row-major with the
    /// returned stride. Entries past the last valid placement are meaningless.
    fn correlate(&mut self, haystack: &GrayImage) -> (Vec<f64>, usize) {
        let (hw, hh) = haystack.dimensions();
        let rows = fast_len(hh as usize);
        let cols = fast_len(hw as usize);
        let forward = Plans {
            rows: self.planner.plan_fft_forward(rows),
            cols: self.planner.plan_fft_forward(cols),
        };
        let inverse = Plans {
            rows: self.planner.plan_fft_inverse(rows),
            cols: self.planner.plan_fft_inverse(cols),
        };

        let spectrum = match self.spectrum.take() {
            Some(cached) if cached.rows == rows && cached.cols == cols => cached,
            _ => Spectrum::of(&self.centered, self.width as usize, rows, cols, &forward),
        };

        let mut grid = vec![Complex::default(); rows * cols];
        for (r, line) in haystack.as_raw().chunks_exact(hw as usize).enumerate() {
            for (c, &p) in line.iter().enumerate() {
                grid[r * cols + c].re = f64::from(p);
            }
        }
        forward.transform(&mut grid, rows, cols);
        for (bin, reference) in grid.iter_mut().zip(&spectrum.bins) {
            *bin *= reference.conj();
        }
        inverse.transform(&mut grid, rows, cols);
        self.spectrum = Some(spectrum);

        let scale = 1.0 / (rows * cols) as f64;
        (grid.into_iter().map(|bin| bin.re * scale).collect(), cols)
    }
}

/// Zero-padded 2-D spectrum of the centered reference.
struct Spectrum {
    rows: usize,
    cols: usize,
    bins: Vec<Complex<f64>>,
}

impl Spectrum {
    fn of(centered: &[f64], width: usize, rows: usize, cols: usize, plans: &Plans) -> Self {
        let mut bins = vec![Complex::default(); rows * cols];
        for (r, line) in centered.chunks_exact(width).enumerate() {
            for (c, &v) in line.iter().enumerate() {
                bins[r * cols + c].re = v;
            }
        }
        plans.transform(&mut bins, rows, cols);
        Self { rows, cols, bins }
    }
}

/// Row and column plans for one direction of a 2-D transform.
struct Plans {
    rows: std::sync::Arc<dyn Fft<f64>>,
    cols: std::sync::Arc<dyn Fft<f64>>,
}

impl Plans {
    /// In-place 2-D transform of a row-major `rows × cols` grid (unnormalized).
    fn transform(&self, grid: &mut [Complex<f64>], rows: usize, cols: usize) {
        self.cols.process(grid);
        let mut columns = transpose(grid, rows, cols);
        self.rows.process(&mut columns);
        let restored = transpose(&columns, cols, rows);
        grid.copy_from_slice(&restored);
    }
}

fn transpose(grid: &[Complex<f64>], rows: usize, cols: usize) -> Vec<Complex<f64>> {
    let mut out = vec![Complex::default(); grid.len()];
    for (r, line) in grid.chunks_exact(cols).enumerate() {
        for (c, &v) in line.iter().enumerate() {
            out[c * rows + r] = v;
        }
    }
    out
}

/// Smallest length `>= n` whose only prime factors are 2, 3 and 5.
fn fast_len(n: usize) -> usize {
    let mut len = n.max(1);
    loop {
        let mut rest = len;
        for p in [2, 3, 5] {
            while rest % p == 0 {
                rest /= p;
            }
        }
        if rest == 1 {
            return len;
        }
        len += 1;
    }
}

/// `Σ (v - v̄)²` over `n` values from their exact integer sums; 0 means flat.
fn spread(n: u64, sum: u64, sum_sq: u64) -> f64 {
    let numerator = u128::from(n) * u128::from(sum_sq) - u128::from(sum) * u128::from(sum);
    numerator as f64 / n as f64
}

/// Summed-area tables for pixel values and squared values.
struct Integral {
    width: usize,
    sum: Vec<u64>,
    sum_sq: Vec<u64>,
}

impl Integral {
    fn new(img: &GrayImage) -> Self {
        let (w, h) = (img.width() as usize, img.height() as usize);
        let width = w + 1;
        let mut sum = vec![0; width * (h + 1)];
        let mut sum_sq = vec![0; width * (h + 1)];
        let raw = img.as_raw();

        for y in 0..h {
            let mut row_sum = 0;
            let mut row_sq = 0;
            for x in 0..w {
                let v = u64::from(raw[y * w + x]);
                row_sum += v;
                row_sq += v * v;
                let idx = (y + 1) * width + (x + 1);
                sum[idx] = sum[y * width + (x + 1)] + row_sum;
                sum_sq[idx] = sum_sq[y * width + (x + 1)] + row_sq;
            }
        }

        Self { width, sum, sum_sq }
    }

    /// (Σ I, Σ I²) over the `w × h` window with top-left `(x, y)`.
    fn window(&self, x: u32, y: u32, w: u32, h: u32) -> (u64, u64) {
        let (x0, y0) = (x as usize, y as usize);
        let (x1, y1) = (x0 + w as usize, y0 + h as usize);
        let at = |t: &[u64], xx: usize, yy: usize| t[yy * self.width + xx];
        let area = |t: &[u64]| (at(t, x1, y1) + at(t, x0, y0)) - (at(t, x0, y1) + at(t, x1, y0));
        (area(&self.sum), area(&self.sum_sq))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;
    use std::time::{Duration, Instant};

    fn textured(w: u32, h: u32) -> GrayImage {
        GrayImage::from_fn(w, h, |x, y| Luma([((x * 37 + y * 91 + x * y * 13) % 251) as u8]))
    }

    fn paste(background: u8, w: u32, h: u32, patch: &GrayImage, at: (u32, u32)) -> GrayImage {
        let mut img = GrayImage::from_pixel(w, h, Luma([background]));
        image::imageops::replace(&mut img, patch, i64::from(at.0), i64::from(at.1));
        img
    }

    #[test]
    fn finds_exact_placement() {
        let patch = textured(12, 9);
        let screen = paste(40, 80, 60, &patch, (31, 17));
        let found = best_match(&screen, &patch).unwrap();
        assert_eq!((found.x, found.y), (31, 17));
        assert!(found.score > 0.999, "score was {}", found.score);
    }

    #[test]
    fn brightness_shift_still_matches() {
        let patch = textured(10, 10);
        let brighter = GrayImage::from_fn(10, 10, |x, y| {
            Luma([patch.get_pixel(x, y)[0] / 2 + 60])
        });
        let screen = paste(0, 50, 50, &brighter, (5, 20));
        let found = best_match(&screen, &patch).unwrap();
        assert_eq!((found.x, found.y), (5, 20));
        assert!(found.score > 0.95);
    }

    #[test]
    fn flat_capture_scores_zero() {
        let patch = textured(8, 8);
        let screen = GrayImage::from_pixel(40, 40, Luma([128]));
        assert_eq!(best_match(&screen, &patch).unwrap().score, 0.0);
    }

    #[test]
    fn flat_reference_scores_zero() {
        let patch = GrayImage::from_pixel(4, 4, Luma([9]));
        let screen = textured(20, 20);
        assert_eq!(best_match(&screen, &patch).unwrap().score, 0.0);
    }

    #[test]
    fn oversized_reference_does_not_fit() {
        let patch = textured(30, 5);
        let screen = textured(20, 20);
        assert!(best_match(&screen, &patch).is_none());
    }

    #[test]
    fn integral_window_matches_direct_sum() {
        let img = textured(7, 5);
        let integral = Integral::new(&img);
        let (sum, sum_sq) = integral.window(2, 1, 3, 4);
        let (mut s, mut sq) = (0_u64, 0_u64);
        for y in 1..5 {
            for x in 2..5 {
                let v = u64::from(img.get_pixel(x, y)[0]);
                s += v;
                sq += v * v;
            }
        }
        assert_eq!((sum, sum_sq), (s, sq));
    }

    /// Deterministic pseudo-random noise.
    fn noise(w: u32, h: u32, seed: u32) -> GrayImage {
        let mut state = seed;
        GrayImage::from_fn(w, h, |_, _| {
            state = state.wrapping_mul(1_103_515_245).wrapping_add(12_345);
            Luma([(state >> 16) as u8])
        })
    }

    fn direct_score(haystack: &GrayImage, reference: &GrayImage, x: u32, y: u32) -> f64 {
        let (rw, rh) = reference.dimensions();
        let n = f64::from(rw * rh);
        let window: Vec<f64> = (0..rh)
            .flat_map(|j| (0..rw).map(move |i| (i, j)))
            .map(|(i, j)| f64::from(haystack.get_pixel(x + i, y + j)[0]))
            .collect();
        let refs: Vec<f64> = reference.pixels().map(|p| f64::from(p[0])).collect();
        let (wm, rm) = (window.iter().sum::<f64>() / n, refs.iter().sum::<f64>() / n);
        let cross: f64 = window.iter().zip(&refs).map(|(a, b)| (a - wm) * (b - rm)).sum();
        let we: f64 = window.iter().map(|a| (a - wm).powi(2)).sum();
        let re: f64 = refs.iter().map(|b| (b - rm).powi(2)).sum();
        (cross / (we * re).sqrt()).clamp(0.0, 1.0)
    }

    #[test]
    fn scores_agree_with_direct_correlation() {
        let haystack = noise(37, 23, 7);
        let reference = noise(9, 6, 99);
        let found = best_match(&haystack, &reference).unwrap();

        let mut expected = (0, 0, 0.0);
        for y in 0..=(23 - 6) {
            for x in 0..=(37 - 9) {
                let score = direct_score(&haystack, &reference, x, y);
                if score > expected.2 {
                    expected = (x, y, score);
                }
            }
        }
        assert_eq!((found.x, found.y), (expected.0, expected.1));
        assert!((f64::from(found.score) - expected.2).abs() < 1e-4);
    }

    #[test]
    fn prepared_reference_is_reused_across_capture_sizes() {
        let patch = noise(10, 8, 3);
        let mut matcher = Matcher::new(&patch);
        let small = paste(90, 40, 30, &patch, (4, 9));
        let large = paste(90, 64, 48, &patch, (50, 33));
        assert_eq!(matcher.best_match(&small).map(|m| (m.x, m.y)), Some((4, 9)));
        assert_eq!(matcher.best_match(&large).map(|m| (m.x, m.y)), Some((50, 33)));
        assert_eq!(matcher.best_match(&small).map(|m| (m.x, m.y)), Some((4, 9)));
    }

    #[test]
    fn padded_lengths_have_small_factors() {
        assert_eq!(fast_len(0), 1);
        assert_eq!(fast_len(900), 900);
        assert_eq!(fast_len(1440), 1440);
        assert_eq!(fast_len(7), 8);
        assert_eq!(fast_len(1081), 1125);
    }

    #[test]
    fn full_screen_capture_is_searched_within_a_frame_budget() {
        let patch = noise(80, 40, 11);
        let mut screen = noise(1440, 900, 5);
        image::imageops::replace(&mut screen, &patch, 1203, 611);

        let started = Instant::now();
        let found = best_match(&screen, &patch).unwrap();
        let elapsed = started.elapsed();
        assert_eq!((found.x, found.y), (1203, 611));
        assert!(found.score > 0.999, "score was {}", found.score);
        assert!(elapsed < Duration::from_secs(2), "search took {elapsed:?}");
    }
}
