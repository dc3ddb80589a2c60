mod blocks;
mod color;
mod particles;
mod scene;
mod warp;

pub use blocks::{PixelSorting, Pixelate};
pub use color::{ColorInversion, EdgeDetection, Glitch, NeonGlow, PsychedelicColors};
pub use particles::{Fireworks, LaserBeams};
pub use scene::{AudioWaveform, BackgroundReplacement, Halo, Passthrough};
pub use warp::{Kaleidoscope, Liquid, MirrorSplit, Vortex};

use crate::audio::AudioFeatures;
use crate::frame::Frame;
use crate::segmentation::{Mask, NoSegmenter, Segmenter};
use std::f32::consts::PI;
use std::sync::Arc;
use std::time::{Duration, Instant};

pub struct EffectCtx<'a> {
    pub now: Instant,
    /// Seconds since the pipeline started.
    pub t: f32,
    pub features: &'a AudioFeatures,
}

/// A named, stateful per-frame transform. Implementations must not assume they are called
/// every tick, and must return a frame with the same dimensions as the input.
pub trait Effect: Send {
    fn name(&self) -> &'static str;
    fn transform(&mut self, ctx: &EffectCtx<'_>, frame: &Frame) -> Frame;
}

/// Shared collaborators handed to effect constructors.
#[derive(Clone)]
pub struct EffectDeps {
    pub segmenter: Arc<dyn Segmenter>,
    /// Fixed seed for reproducible runs; each effect derives its own stream from it.
    pub seed: Option<u64>,
}

impl Default for EffectDeps {
    fn default() -> Self {
        Self {
            segmenter: Arc::new(NoSegmenter),
            seed: None,
        }
    }
}

impl EffectDeps {
    pub fn rng_for(&self, name: &str) -> fastrand::Rng {
        match self.seed {
            Some(seed) => {
                let salt = name
                    .bytes()
                    .fold(0xcbf2_9ce4_8422_2325u64, |h, b| (h ^ b as u64).wrapping_mul(0x0100_0000_01b3));
                fastrand::Rng::with_seed(seed ^ salt)
            }
            None => fastrand::Rng::new(),
        }
    }
}

pub type EffectFactory = fn(&EffectDeps) -> anyhow::Result<Box<dyn Effect>>;

/// Built-in catalog, in enumeration order.
pub fn builtin_factories() -> Vec<(&'static str, EffectFactory)> {
    fn boxed<E: Effect + 'static>(e: E) -> anyhow::Result<Box<dyn Effect>> {
        Ok(Box::new(e))
    }

    let table: [(&'static str, EffectFactory); 17] = [
        ("kaleidoscope", |d| boxed(Kaleidoscope::new(d))),
        ("vortex", |d| boxed(Vortex::new(d))),
        ("liquid", |d| boxed(Liquid::new(d))),
        ("mirror_split", |d| boxed(MirrorSplit::new(d))),
        ("fireworks", |d| boxed(Fireworks::new(d))),
        ("laser_beams", |d| boxed(LaserBeams::new(d))),
        ("psychedelic_colors", |d| boxed(PsychedelicColors::new(d))),
        ("color_inversion", |d| boxed(ColorInversion::new(d))),
        ("glitch", |d| boxed(Glitch::new(d))),
        ("neon_glow", |d| boxed(NeonGlow::new(d))),
        ("edge_detection", |d| boxed(EdgeDetection::new(d))),
        ("pixel_sorting", |d| boxed(PixelSorting::new(d))),
        ("pixelate", |d| boxed(Pixelate::new(d))),
        ("halo", |d| boxed(Halo::new(d))),
        ("audio_waveform", |d| boxed(AudioWaveform::new(d))),
        ("background_replacement", |d| boxed(BackgroundReplacement::new(d))),
        ("passthrough", |_| boxed(Passthrough)),
    ];
    table.into()
}

/// Minimum dwell between random re-picks of a visual parameter.
#[derive(Clone, Copy, Debug)]
pub struct Dwell {
    min: Duration,
    last: Option<Instant>,
}

impl Dwell {
    pub fn new(min: Duration) -> Self {
        Self { min, last: None }
    }

    pub fn secs(min: f32) -> Self {
        Self::new(Duration::from_secs_f32(min))
    }

    pub fn ready(&self, now: Instant) -> bool {
        self.last
            .is_none_or(|last| now.saturating_duration_since(last) >= self.min)
    }

    /// Returns true (and restarts the dwell) when the minimum interval has passed.
    pub fn try_fire(&mut self, now: Instant) -> bool {
        if self.ready(now) {
            self.last = Some(now);
            true
        } else {
            false
        }
    }
}

/// Per-effect wall clock. Effects may be skipped for many ticks, so each keeps its own.
#[derive(Clone, Copy, Debug, Default)]
pub struct EffectClock {
    start: Option<Instant>,
    last: Option<Instant>,
}

impl EffectClock {
    /// Returns (seconds since first call, seconds since previous call clamped to 0.25).
    pub fn tick(&mut self, now: Instant) -> (f32, f32) {
        let start = *self.start.get_or_insert(now);
        let dt = self
            .last
            .map(|l| now.saturating_duration_since(l).as_secs_f32())
            .unwrap_or(0.0)
            .min(0.25);
        self.last = Some(now);
        (now.saturating_duration_since(start).as_secs_f32(), dt)
    }
}

pub(crate) fn hsv_to_rgb(h: f32, s: f32, v: f32) -> [u8; 3] {
    let h = fract01(h) * 6.0;
    let i = h.floor() as i32;
    let f = h - i as f32;
    let p = v * (1.0 - s);
    let q = v * (1.0 - f * s);
    let t = v * (1.0 - (1.0 - f) * s);
    let (r, g, b) = match i.rem_euclid(6) {
        0 => (v, t, p),
        1 => (q, v, p),
        2 => (p, v, t),
        3 => (p, q, v),
        4 => (t, p, v),
        _ => (v, p, q),
    };
    [
        (r.clamp(0.0, 1.0) * 255.0) as u8,
        (g.clamp(0.0, 1.0) * 255.0) as u8,
        (b.clamp(0.0, 1.0) * 255.0) as u8,
    ]
}

pub(crate) fn rgb_to_hsv(rgb: [u8; 3]) -> (f32, f32, f32) {
    let r = rgb[0] as f32 / 255.0;
    let g = rgb[1] as f32 / 255.0;
    let b = rgb[2] as f32 / 255.0;
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let d = max - min;
    let h = if d <= 1e-6 {
        0.0
    } else if max == r {
        ((g - b) / d).rem_euclid(6.0) / 6.0
    } else if max == g {
        ((b - r) / d + 2.0) / 6.0
    } else {
        ((r - g) / d + 4.0) / 6.0
    };
    let s = if max <= 1e-6 { 0.0 } else { d / max };
    (h, s, max)
}

pub(crate) fn random_vivid(rng: &mut fastrand::Rng) -> [u8; 3] {
    hsv_to_rgb(rng.f32(), 0.8 + rng.f32() * 0.2, 1.0)
}

pub(crate) fn fract01(x: f32) -> f32 {
    let f = x - x.floor();
    if f < 0.0 { f + 1.0 } else { f }
}

/// Folds `angle` into one wedge of an N-way mirror: odd wedges are reflected.
pub(crate) fn kaleido_fold(angle: f32, segments: u32) -> f32 {
    let seg = 2.0 * PI / segments.max(2) as f32;
    let a = angle.rem_euclid(2.0 * PI);
    let idx = (a / seg).floor() as u32;
    let local = a - idx as f32 * seg;
    if idx % 2 == 1 { seg - local } else { local }
}

/// Sobel gradient magnitude on luma, thresholded.
pub(crate) fn edge_mask(frame: &Frame, threshold: f32) -> Mask {
    let (w, h) = (frame.width(), frame.height());
    let luma = frame.luma();
    let at = |x: isize, y: isize| -> f32 {
        let xx = x.clamp(0, w as isize - 1) as usize;
        let yy = y.clamp(0, h as isize - 1) as usize;
        luma[yy * w + xx] as f32
    };
    Mask::from_fn(w, h, |x, y| {
        let (x, y) = (x as isize, y as isize);
        let gx = -at(x - 1, y - 1) - 2.0 * at(x - 1, y) - at(x - 1, y + 1)
            + at(x + 1, y - 1)
            + 2.0 * at(x + 1, y)
            + at(x + 1, y + 1);
        let gy = -at(x - 1, y - 1) - 2.0 * at(x, y - 1) - at(x + 1, y - 1)
            + at(x - 1, y + 1)
            + 2.0 * at(x, y + 1)
            + at(x + 1, y + 1);
        (gx * gx + gy * gy).sqrt() > threshold
    })
}

/// Paints `color` where `mask` is set onto a black frame.
pub(crate) fn mask_layer(mask: &Mask, color: [u8; 3]) -> Frame {
    let mut layer = Frame::new(mask.width(), mask.height());
    for y in 0..mask.height() {
        for x in 0..mask.width() {
            if mask.get(x, y) {
                layer.set_pixel(x, y, color);
            }
        }
    }
    layer
}

/// `base + layer * gain`, saturating.
pub(crate) fn add_layer(base: &Frame, layer: &Frame, gain: f32) -> Frame {
    let mut out = base.clone();
    if !base.same_shape(layer) {
        return out;
    }
    for (o, &l) in out.data_mut().iter_mut().zip(layer.data()) {
        *o = o.saturating_add((l as f32 * gain).min(255.0) as u8);
    }
    out
}

/// Scale factor relative to a 720-line frame, so pixel-space tuning carries across resolutions.
pub(crate) fn res_scale(frame: &Frame) -> f32 {
    (frame.width().min(frame.height()) as f32 / 720.0).max(0.05)
}
