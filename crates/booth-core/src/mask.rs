//! Single-channel floating-point segmentation mask.
//!
//! Values are per-pixel subject weights in [0, 1]: near 1 keeps the source
//! pixel, near 0 lets the backdrop show through. All backends produce a
//! [`Mask`]; the pipeline post-processes it (clamp, resize, soften) before
//! blending.

/// Row-major W×H grid of f32 blend weights.
#[derive(Debug, Clone)]
pub struct Mask {
    width: u32,
    height: u32,
    data: Vec<f32>,
}

impl Mask {
    /// Build a mask from raw row-major data. `data.len()` must equal `w * h`.
    pub fn from_data(width: u32, height: u32, data: Vec<f32>) -> Self {
        debug_assert_eq!(data.len(), (width * height) as usize);
        Self { width, height, data }
    }

    /// All-ones mask: the whole frame is treated as subject, so compositing
    /// becomes a visual no-op.
    pub fn ones(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            data: vec![1.0; (width * height) as usize],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn get(&self, x: u32, y: u32) -> f32 {
        self.data[(y * self.width + x) as usize]
    }

    pub fn data(&self) -> &[f32] {
        &self.data
    }

    /// Clamp every weight into [0, 1].
    pub fn clamp(&mut self) {
        for v in &mut self.data {
            *v = v.clamp(0.0, 1.0);
        }
    }

    /// Divide by the maximum weight so the peak becomes 1.0.
    /// An all-zero mask is left untouched.
    pub fn normalize_max(&mut self) {
        let max = self.data.iter().fold(0.0f32, |a, &b| a.max(b));
        if max > 0.0 {
            for v in &mut self.data {
                *v /= max;
            }
        }
    }

    /// Resize to `new_w` × `new_h` with bilinear interpolation.
    pub fn resize(&self, new_w: u32, new_h: u32) -> Mask {
        if new_w == self.width && new_h == self.height {
            return self.clone();
        }

        let (w, h) = (self.width as usize, self.height as usize);
        let scale_x = w as f32 / new_w as f32;
        let scale_y = h as f32 / new_h as f32;

        let mut out = vec![0.0f32; (new_w * new_h) as usize];
        for y in 0..new_h as usize {
            let src_y = (y as f32 + 0.5) * scale_y - 0.5;
            let y0 = (src_y.floor() as i32).clamp(0, h as i32 - 1) as usize;
            let y1 = (y0 + 1).min(h - 1);
            let fy = (src_y - src_y.floor()).clamp(0.0, 1.0);

            for x in 0..new_w as usize {
                let src_x = (x as f32 + 0.5) * scale_x - 0.5;
                let x0 = (src_x.floor() as i32).clamp(0, w as i32 - 1) as usize;
                let x1 = (x0 + 1).min(w - 1);
                let fx = (src_x - src_x.floor()).clamp(0.0, 1.0);

                let tl = self.data[y0 * w + x0];
                let tr = self.data[y0 * w + x1];
                let bl = self.data[y1 * w + x0];
                let br = self.data[y1 * w + x1];

                out[y * new_w as usize + x] = tl * (1.0 - fx) * (1.0 - fy)
                    + tr * fx * (1.0 - fy)
                    + bl * (1.0 - fx) * fy
                    + br * fx * fy;
            }
        }

        Mask::from_data(new_w, new_h, out)
    }

    /// Gaussian smoothing with an odd `kernel`-wide separable filter.
    ///
    /// Sigma is derived from the kernel size the same way OpenCV does when
    /// none is given. Edges are clamped. Not idempotent: re-blurring an
    /// already-smooth mask shifts values slightly, which is expected.
    pub fn gaussian_blur(&self, kernel: usize) -> Mask {
        debug_assert!(kernel % 2 == 1, "kernel must be odd");
        let radius = kernel / 2;
        let sigma = 0.3 * ((kernel as f32 - 1.0) * 0.5 - 1.0) + 0.8;
        let two_sigma_sq = 2.0 * sigma * sigma;

        let mut weights = vec![0.0f32; kernel];
        for (i, w) in weights.iter_mut().enumerate() {
            let d = i as f32 - radius as f32;
            *w = (-d * d / two_sigma_sq).exp();
        }
        let sum: f32 = weights.iter().sum();
        for w in &mut weights {
            *w /= sum;
        }

        let (w, h) = (self.width as usize, self.height as usize);

        // Horizontal pass
        let mut tmp = vec![0.0f32; w * h];
        for y in 0..h {
            for x in 0..w {
                let mut acc = 0.0f32;
                for (k, &wt) in weights.iter().enumerate() {
                    let sx = (x as i64 + k as i64 - radius as i64).clamp(0, w as i64 - 1) as usize;
                    acc += self.data[y * w + sx] * wt;
                }
                tmp[y * w + x] = acc;
            }
        }

        // Vertical pass
        let mut out = vec![0.0f32; w * h];
        for y in 0..h {
            for x in 0..w {
                let mut acc = 0.0f32;
                for (k, &wt) in weights.iter().enumerate() {
                    let sy = (y as i64 + k as i64 - radius as i64).clamp(0, h as i64 - 1) as usize;
                    acc += tmp[sy * w + x] * wt;
                }
                out[y * w + x] = acc;
            }
        }

        Mask::from_data(self.width, self.height, out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ones_in_range() {
        let m = Mask::ones(8, 4);
        assert_eq!(m.width(), 8);
        assert_eq!(m.height(), 4);
        assert!(m.data().iter().all(|&v| v == 1.0));
    }

    #[test]
    fn test_clamp() {
        let mut m = Mask::from_data(2, 2, vec![-0.5, 0.3, 1.7, 1.0]);
        m.clamp();
        assert_eq!(m.data(), &[0.0, 0.3, 1.0, 1.0]);
    }

    #[test]
    fn test_normalize_max() {
        let mut m = Mask::from_data(2, 1, vec![0.25, 0.5]);
        m.normalize_max();
        assert!((m.get(0, 0) - 0.5).abs() < 1e-6);
        assert!((m.get(1, 0) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_normalize_max_all_zero_untouched() {
        let mut m = Mask::from_data(2, 2, vec![0.0; 4]);
        m.normalize_max();
        assert!(m.data().iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_resize_dimensions() {
        let m = Mask::ones(10, 20);
        let r = m.resize(33, 7);
        assert_eq!(r.width(), 33);
        assert_eq!(r.height(), 7);
    }

    #[test]
    fn test_resize_uniform_stays_uniform() {
        let m = Mask::from_data(16, 16, vec![0.5; 256]);
        let r = m.resize(40, 24);
        assert!(r.data().iter().all(|&v| (v - 0.5).abs() < 1e-5));
    }

    #[test]
    fn test_resize_same_size_is_identity() {
        let m = Mask::from_data(3, 2, vec![0.1, 0.2, 0.3, 0.4, 0.5, 0.6]);
        let r = m.resize(3, 2);
        assert_eq!(r.data(), m.data());
    }

    #[test]
    fn test_blur_uniform_stays_uniform() {
        let m = Mask::from_data(32, 32, vec![0.7; 1024]);
        let b = m.gaussian_blur(15);
        assert!(b.data().iter().all(|&v| (v - 0.7).abs() < 1e-4));
    }

    #[test]
    fn test_blur_preserves_range() {
        // A hard 0/1 step stays within [0, 1] after smoothing.
        let mut data = vec![0.0f32; 32 * 32];
        for y in 0..32 {
            for x in 16..32 {
                data[y * 32 + x] = 1.0;
            }
        }
        let b = Mask::from_data(32, 32, data).gaussian_blur(21);
        assert!(b.data().iter().all(|&v| (-1e-6..=1.0 + 1e-6).contains(&v)));
        // The step edge is actually softened.
        let mid = b.get(16, 16);
        assert!(mid > 0.05 && mid < 0.95, "edge value {mid} should be blended");
    }

    #[test]
    fn test_blur_twice_is_close_but_not_identical() {
        // Smoothing is not idempotent; a second pass moves values only a
        // little on an already-smooth mask.
        let mut data = vec![0.0f32; 64 * 64];
        for y in 0..64 {
            for x in 32..64 {
                data[y * 64 + x] = 1.0;
            }
        }
        let once = Mask::from_data(64, 64, data).gaussian_blur(15);
        let twice = once.gaussian_blur(15);
        let max_diff = once
            .data()
            .iter()
            .zip(twice.data().iter())
            .map(|(a, b)| (a - b).abs())
            .fold(0.0f32, f32::max);
        assert!(max_diff > 0.0, "second blur should change something");
        assert!(max_diff < 0.25, "second blur moved values too far: {max_diff}");
    }
}
