use super::{Dwell, Effect, EffectCtx, EffectDeps};
use crate::frame::{luma_of, Frame};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SortAxis {
    Horizontal,
    Vertical,
}

/// Sorts bright runs of pixels by luma along rows or columns; beats flip the axis.
pub struct PixelSorting {
    axis: SortAxis,
    flip: Dwell,
}

impl PixelSorting {
    pub fn new(_deps: &EffectDeps) -> Self {
        Self {
            axis: SortAxis::Horizontal,
            flip: Dwell::secs(0.5),
        }
    }

    pub fn axis(&self) -> SortAxis {
        self.axis
    }
}

impl Effect for PixelSorting {
    fn name(&self) -> &'static str {
        "pixel_sorting"
    }

    fn transform(&mut self, ctx: &EffectCtx<'_>, frame: &Frame) -> Frame {
        let f = ctx.features;
        if f.beat && self.flip.try_fire(ctx.now) {
            self.axis = match self.axis {
                SortAxis::Horizontal => SortAxis::Vertical,
                SortAxis::Vertical => SortAxis::Horizontal,
            };
        }
        if frame.is_empty() {
            return frame.clone();
        }

        let (w, h) = (frame.width(), frame.height());
        let volume = f.volume.clamp(0.0, 1.0);
        // Louder audio lowers the bar, so more of the frame gets sorted.
        let threshold = 160.0 - 100.0 * volume;
        let (lines, len) = match self.axis {
            SortAxis::Horizontal => (h, w),
            SortAxis::Vertical => (w, h),
        };
        let chunk = (len / 32).max(10);
        let at = |line: usize, i: usize| match self.axis {
            SortAxis::Horizontal => (i, line),
            SortAxis::Vertical => (line, i),
        };

        let mut sorted = frame.clone();
        let mut run: Vec<[u8; 3]> = Vec::with_capacity(chunk);
        for line in 0..lines {
            let mut start = 0;
            while start < len {
                let end = (start + chunk).min(len);
                run.clear();
                run.extend((start..end).map(|i| {
                    let (x, y) = at(line, i);
                    frame.pixel(x, y)
                }));
                let mean = run.iter().map(|p| luma_of(p[0], p[1], p[2]) as f32).sum::<f32>() / run.len() as f32;
                if mean > threshold {
                    run.sort_by_key(|p| luma_of(p[0], p[1], p[2]));
                    for (k, px) in run.iter().enumerate() {
                        let (x, y) = at(line, start + k);
                        sorted.set_pixel(x, y, *px);
                    }
                }
                start = end;
            }
        }
        Frame::blend(frame, &sorted, 0.5 + 0.5 * volume)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PixelPattern {
    Uniform,
    Radial,
    Horizontal,
}

const PIXEL_PATTERNS: [PixelPattern; 3] = [PixelPattern::Uniform, PixelPattern::Radial, PixelPattern::Horizontal];

/// Mosaic whose block size follows the volume. The block layout pattern re-picks on loud passages.
pub struct Pixelate {
    pattern: PixelPattern,
    repick: Dwell,
    rng: fastrand::Rng,
}

impl Pixelate {
    pub fn new(deps: &EffectDeps) -> Self {
        Self {
            pattern: PixelPattern::Uniform,
            repick: Dwell::secs(1.0),
            rng: deps.rng_for("pixelate"),
        }
    }

    pub fn pattern(&self) -> PixelPattern {
        self.pattern
    }
}

impl Effect for Pixelate {
    fn name(&self) -> &'static str {
        "pixelate"
    }

    fn transform(&mut self, ctx: &EffectCtx<'_>, frame: &Frame) -> Frame {
        let f = ctx.features;
        if f.volume > 0.7 && self.rng.f32() < 0.3 && self.repick.try_fire(ctx.now) {
            self.pattern = PIXEL_PATTERNS[self.rng.usize(..PIXEL_PATTERNS.len())];
        }
        if frame.is_empty() {
            return frame.clone();
        }

        let base = 4.0 + 20.0 * f.volume.clamp(0.0, 1.0);
        let (w, h) = (frame.width() as f32, frame.height() as f32);
        let (cx, cy) = (w * 0.5, h * 0.5);
        let max_r = (cx * cx + cy * cy).sqrt().max(1.0);
        let pattern = self.pattern;

        frame.remap(|x, y| {
            // Blocks grow away from the centre (radial) or towards the bottom (horizontal).
            let size = match pattern {
                PixelPattern::Uniform => base,
                PixelPattern::Radial => {
                    let r = ((x - cx).powi(2) + (y - cy).powi(2)).sqrt() / max_r;
                    base * (0.5 + 1.5 * r)
                }
                PixelPattern::Horizontal => base * (0.5 + 1.5 * y / h),
            }
            .max(1.0)
            .round();
            ((x / size).floor() * size, (y / size).floor() * size)
        })
    }
}
