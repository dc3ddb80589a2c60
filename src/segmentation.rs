use crate::frame::{luma_of, Frame};

/// Binary foreground mask, one byte per pixel (0 or 1).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Mask {
    width: usize,
    height: usize,
    bits: Vec<u8>,
}

impl Mask {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            bits: vec![0; width.saturating_mul(height)],
        }
    }

    pub fn from_fn(width: usize, height: usize, mut f: impl FnMut(usize, usize) -> bool) -> Self {
        let mut m = Self::new(width, height);
        for y in 0..height {
            for x in 0..width {
                if f(x, y) {
                    m.bits[y * width + x] = 1;
                }
            }
        }
        m
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    #[inline]
    pub fn get(&self, x: usize, y: usize) -> bool {
        x < self.width && y < self.height && self.bits[y * self.width + x] != 0
    }

    pub fn count(&self) -> usize {
        self.bits.iter().filter(|&&b| b != 0).count()
    }

    pub fn is_empty(&self) -> bool {
        self.bits.iter().all(|&b| b == 0)
    }

    /// Top-centre of the topmost foreground row ("top of the head").
    pub fn top_anchor(&self) -> Option<(f32, f32)> {
        for y in 0..self.height {
            let row = &self.bits[y * self.width..(y + 1) * self.width];
            let (sum, n) = row
                .iter()
                .enumerate()
                .filter(|(_, b)| **b != 0)
                .fold((0usize, 0usize), |(s, n), (x, _)| (s + x, n + 1));
            if n > 0 {
                return Some((sum as f32 / n as f32, y as f32));
            }
        }
        None
    }

    pub fn centroid(&self) -> Option<(f32, f32)> {
        let mut sx = 0.0f64;
        let mut sy = 0.0f64;
        let mut n = 0usize;
        for y in 0..self.height {
            for x in 0..self.width {
                if self.bits[y * self.width + x] != 0 {
                    sx += x as f64;
                    sy += y as f64;
                    n += 1;
                }
            }
        }
        (n > 0).then(|| ((sx / n as f64) as f32, (sy / n as f64) as f32))
    }

    /// Foreground pixels with at least one 4-neighbour outside the mask, every `step`-th one.
    pub fn boundary_points(&self, step: usize) -> Vec<(usize, usize)> {
        let step = step.max(1);
        let mut out = Vec::new();
        let mut k = 0usize;
        for y in 0..self.height {
            for x in 0..self.width {
                if !self.get(x, y) {
                    continue;
                }
                let edge = x == 0
                    || y == 0
                    || !self.get(x - 1, y)
                    || !self.get(x + 1, y)
                    || !self.get(x, y - 1)
                    || !self.get(x, y + 1);
                if edge {
                    if k % step == 0 {
                        out.push((x, y));
                    }
                    k += 1;
                }
            }
        }
        out
    }

    /// Square dilation by `radius` pixels.
    pub fn dilate(&self, radius: usize) -> Mask {
        if radius == 0 {
            return self.clone();
        }
        let (w, h) = (self.width, self.height);
        // Separable: horizontal pass, then vertical.
        let mut tmp = Mask::new(w, h);
        for y in 0..h {
            for x in 0..w {
                let lo = x.saturating_sub(radius);
                let hi = (x + radius).min(w.saturating_sub(1));
                if (lo..=hi).any(|xx| self.bits[y * w + xx] != 0) {
                    tmp.bits[y * w + x] = 1;
                }
            }
        }
        let mut out = Mask::new(w, h);
        for y in 0..h {
            let lo = y.saturating_sub(radius);
            let hi = (y + radius).min(h.saturating_sub(1));
            for x in 0..w {
                if (lo..=hi).any(|yy| tmp.bits[yy * w + x] != 0) {
                    out.bits[y * w + x] = 1;
                }
            }
        }
        out
    }

    /// Copy of `frame` with background pixels blacked out.
    pub fn apply(&self, frame: &Frame) -> Frame {
        let mut out = frame.clone();
        if !self.matches(frame) {
            return out;
        }
        for (px, &b) in out.data_mut().chunks_exact_mut(Frame::CHANNELS).zip(&self.bits) {
            if b == 0 {
                px.fill(0);
            }
        }
        out
    }

    pub fn matches(&self, frame: &Frame) -> bool {
        self.width == frame.width() && self.height == frame.height()
    }
}

/// Human-silhouette segmentation, consumed by effects as an optional anchor source.
pub trait Segmenter: Send + Sync {
    /// `None` when nothing was detected. Otherwise the mask and the masked frame.
    fn segment(&self, frame: &Frame) -> Option<(Mask, Frame)>;

    /// Composites the foreground of `frame` over `background`. Segments on demand when no mask
    /// is given; returns `frame` unchanged when nothing is detected or sizes disagree.
    fn replace_background(&self, frame: &Frame, background: &Frame, mask: Option<&Mask>) -> Frame {
        let owned;
        let mask = match mask {
            Some(m) => m,
            None => match self.segment(frame) {
                Some((m, _)) => {
                    owned = m;
                    &owned
                }
                None => return frame.clone(),
            },
        };
        if !mask.matches(frame) || !background.same_shape(frame) {
            return frame.clone();
        }

        let mut out = background.clone();
        for y in 0..frame.height() {
            for x in 0..frame.width() {
                if mask.get(x, y) {
                    out.set_pixel(x, y, frame.pixel(x, y));
                }
            }
        }
        out
    }
}

/// Never detects anything.
pub struct NoSegmenter;

impl Segmenter for NoSegmenter {
    fn segment(&self, _frame: &Frame) -> Option<(Mask, Frame)> {
        None
    }
}

/// Treats bright pixels as foreground. Good enough for lit subjects on dark stages and for
/// the built-in test pattern.
pub struct LumaKeySegmenter {
    pub threshold: u8,
    /// Detections smaller than this fraction of the frame count as nothing.
    pub min_coverage: f32,
}

impl Default for LumaKeySegmenter {
    fn default() -> Self {
        Self {
            threshold: 200,
            min_coverage: 0.005,
        }
    }
}

impl Segmenter for LumaKeySegmenter {
    fn segment(&self, frame: &Frame) -> Option<(Mask, Frame)> {
        if frame.is_empty() {
            return None;
        }
        let mask = Mask::from_fn(frame.width(), frame.height(), |x, y| {
            let [r, g, b] = frame.pixel(x, y);
            luma_of(r, g, b) >= self.threshold
        });
        let total = (frame.width() * frame.height()) as f32;
        if (mask.count() as f32) < total * self.min_coverage {
            return None;
        }
        let masked = mask.apply(frame);
        Some((mask, masked))
    }
}
