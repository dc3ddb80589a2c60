/// Packed 8-bit RGB image. Row-major, 3 bytes per pixel, no padding.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Frame {
    width: usize,
    height: usize,
    data: Vec<u8>,
}

impl Frame {
    pub const CHANNELS: usize = 3;

    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            data: vec![0; width.saturating_mul(height).saturating_mul(Self::CHANNELS)],
        }
    }

    pub fn filled(width: usize, height: usize, rgb: [u8; 3]) -> Self {
        let mut f = Self::new(width, height);
        for px in f.data.chunks_exact_mut(Self::CHANNELS) {
            px.copy_from_slice(&rgb);
        }
        f
    }

    /// Wraps an existing buffer. Returns `None` when the length does not match `w*h*3`.
    pub fn from_rgb(width: usize, height: usize, data: Vec<u8>) -> Option<Self> {
        if data.len() != width.saturating_mul(height).saturating_mul(Self::CHANNELS) {
            return None;
        }
        Some(Self { width, height, data })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    pub fn same_shape(&self, other: &Frame) -> bool {
        self.width == other.width && self.height == other.height
    }

    #[inline]
    fn idx(&self, x: usize, y: usize) -> usize {
        (y * self.width + x) * Self::CHANNELS
    }

    #[inline]
    pub fn pixel(&self, x: usize, y: usize) -> [u8; 3] {
        let i = self.idx(x, y);
        [self.data[i], self.data[i + 1], self.data[i + 2]]
    }

    #[inline]
    pub fn set_pixel(&mut self, x: usize, y: usize, rgb: [u8; 3]) {
        let i = self.idx(x, y);
        self.data[i..i + 3].copy_from_slice(&rgb);
    }

    /// Edge-clamped integer lookup.
    #[inline]
    pub fn sample_clamped(&self, x: isize, y: isize) -> [u8; 3] {
        if self.is_empty() {
            return [0, 0, 0];
        }
        let xx = x.clamp(0, self.width as isize - 1) as usize;
        let yy = y.clamp(0, self.height as isize - 1) as usize;
        self.pixel(xx, yy)
    }

    /// Nearest-neighbour lookup at pixel coordinates, clamped to the border.
    #[inline]
    pub fn sample(&self, x: f32, y: f32) -> [u8; 3] {
        if !x.is_finite() || !y.is_finite() {
            return self.sample_clamped(0, 0);
        }
        self.sample_clamped(x.round() as isize, y.round() as isize)
    }

    /// Builds a new frame by pulling every output pixel from `map(x, y)` in source coordinates.
    pub fn remap(&self, map: impl Fn(f32, f32) -> (f32, f32)) -> Frame {
        let mut out = Frame::new(self.width, self.height);
        for y in 0..self.height {
            for x in 0..self.width {
                let (sx, sy) = map(x as f32, y as f32);
                out.set_pixel(x, y, self.sample(sx, sy));
            }
        }
        out
    }

    /// Per-pixel linear crossfade: `a*(1-t) + b*t`, truncated to u8.
    pub fn blend(a: &Frame, b: &Frame, t: f32) -> Frame {
        let t = t.clamp(0.0, 1.0);
        let it = 1.0 - t;
        let mut out = Frame::new(a.width, a.height);
        for ((o, &pa), &pb) in out.data.iter_mut().zip(&a.data).zip(&b.data) {
            *o = (pa as f32 * it + pb as f32 * t) as u8;
        }
        out
    }

    /// Separable box blur, edge-clamped.
    pub fn box_blur(&self, radius: usize) -> Frame {
        if radius == 0 || self.is_empty() {
            return self.clone();
        }
        let (w, h) = (self.width, self.height);
        let r = radius as isize;
        let norm = 1.0 / (2 * radius + 1) as f32;

        let mut tmp = Frame::new(w, h);
        for y in 0..h {
            for x in 0..w {
                let mut acc = [0.0f32; 3];
                for k in -r..=r {
                    let p = self.sample_clamped(x as isize + k, y as isize);
                    acc[0] += p[0] as f32;
                    acc[1] += p[1] as f32;
                    acc[2] += p[2] as f32;
                }
                tmp.set_pixel(x, y, [(acc[0] * norm) as u8, (acc[1] * norm) as u8, (acc[2] * norm) as u8]);
            }
        }

        let mut out = Frame::new(w, h);
        for y in 0..h {
            for x in 0..w {
                let mut acc = [0.0f32; 3];
                for k in -r..=r {
                    let p = tmp.sample_clamped(x as isize, y as isize + k);
                    acc[0] += p[0] as f32;
                    acc[1] += p[1] as f32;
                    acc[2] += p[2] as f32;
                }
                out.set_pixel(x, y, [(acc[0] * norm) as u8, (acc[1] * norm) as u8, (acc[2] * norm) as u8]);
            }
        }
        out
    }

    /// Nearest-neighbour resize.
    pub fn resized(&self, width: usize, height: usize) -> Frame {
        if width == self.width && height == self.height {
            return self.clone();
        }
        let mut out = Frame::new(width, height);
        if self.is_empty() {
            return out;
        }
        for y in 0..height {
            let sy = y * self.height / height.max(1);
            for x in 0..width {
                let sx = x * self.width / width.max(1);
                out.set_pixel(x, y, self.pixel(sx, sy));
            }
        }
        out
    }

    /// Rec.601 luma per pixel.
    pub fn luma(&self) -> Vec<u8> {
        self.data
            .chunks_exact(Self::CHANNELS)
            .map(|p| luma_of(p[0], p[1], p[2]))
            .collect()
    }

    /// Alpha-over splat. Out-of-bounds writes are ignored.
    pub fn mix_pixel(&mut self, x: i32, y: i32, rgb: [u8; 3], alpha: f32) {
        if x < 0 || y < 0 || x as usize >= self.width || y as usize >= self.height {
            return;
        }
        let a = alpha.clamp(0.0, 1.0);
        let i = self.idx(x as usize, y as usize);
        for c in 0..3 {
            self.data[i + c] = lerp_u8(self.data[i + c], rgb[c], a);
        }
    }

    pub fn fill_disc(&mut self, cx: f32, cy: f32, radius: f32, rgb: [u8; 3], alpha: f32) {
        let r = radius.max(0.5);
        let x0 = (cx - r).floor() as i32;
        let x1 = (cx + r).ceil() as i32;
        let y0 = (cy - r).floor() as i32;
        let y1 = (cy + r).ceil() as i32;
        for y in y0..=y1 {
            for x in x0..=x1 {
                let dx = x as f32 - cx;
                let dy = y as f32 - cy;
                if dx * dx + dy * dy <= r * r {
                    self.mix_pixel(x, y, rgb, alpha);
                }
            }
        }
    }

    /// Thick line by stamping discs along the segment.
    pub fn draw_line(&mut self, from: (f32, f32), to: (f32, f32), thickness: f32, rgb: [u8; 3], alpha: f32) {
        let dx = to.0 - from.0;
        let dy = to.1 - from.1;
        let len = (dx * dx + dy * dy).sqrt();
        let steps = len.ceil().max(1.0) as usize;
        let radius = (thickness * 0.5).max(0.5);
        for s in 0..=steps {
            let t = s as f32 / steps as f32;
            self.fill_disc(from.0 + dx * t, from.1 + dy * t, radius, rgb, alpha);
        }
    }
}

#[inline]
pub fn luma_of(r: u8, g: u8, b: u8) -> u8 {
    (0.299 * r as f32 + 0.587 * g as f32 + 0.114 * b as f32) as u8
}

#[inline]
pub fn lerp_u8(a: u8, b: u8, t: f32) -> u8 {
    let t = t.clamp(0.0, 1.0);
    (a as f32 * (1.0 - t) + b as f32 * t) as u8
}
