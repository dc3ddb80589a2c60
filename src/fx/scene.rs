use super::{add_layer, hsv_to_rgb, mask_layer, random_vivid, res_scale, Dwell, Effect, EffectClock, EffectCtx, EffectDeps};
use crate::frame::{lerp_u8, Frame};
use crate::segmentation::{Mask, Segmenter};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Identity. Always loads, so a catalog is never empty.
pub struct Passthrough;

impl Effect for Passthrough {
    fn name(&self) -> &'static str {
        "passthrough"
    }

    fn transform(&mut self, _ctx: &EffectCtx<'_>, frame: &Frame) -> Frame {
        frame.clone()
    }
}

/// Glowing ring around the detected figure, or a centred elliptical glow when nothing is found.
pub struct Halo {
    color: [u8; 3],
    recolor: Dwell,
    segmenter: Arc<dyn Segmenter>,
    rng: fastrand::Rng,
}

impl Halo {
    pub fn new(deps: &EffectDeps) -> Self {
        let mut rng = deps.rng_for("halo");
        Self {
            color: random_vivid(&mut rng),
            recolor: Dwell::secs(1.0),
            segmenter: Arc::clone(&deps.segmenter),
            rng,
        }
    }

    pub fn color(&self) -> [u8; 3] {
        self.color
    }
}

impl Effect for Halo {
    fn name(&self) -> &'static str {
        "halo"
    }

    fn transform(&mut self, ctx: &EffectCtx<'_>, frame: &Frame) -> Frame {
        let f = ctx.features;
        if f.beat && self.recolor.try_fire(ctx.now) {
            self.color = random_vivid(&mut self.rng);
        }
        if frame.is_empty() {
            return frame.clone();
        }

        let volume = f.volume.clamp(0.0, 1.0);
        let scale = res_scale(frame);
        let width = ((10.0 + 30.0 * volume) * scale).max(1.0) as usize;
        let gain = 0.6 + 0.6 * volume + if f.beat { 0.3 } else { 0.0 };

        let ring = match self.segmenter.segment(frame) {
            Some((mask, _)) if mask.matches(frame) => {
                let grown = mask.dilate(width);
                Mask::from_fn(frame.width(), frame.height(), |x, y| grown.get(x, y) && !mask.get(x, y))
            }
            _ => centred_ellipse_ring(frame.width(), frame.height(), width),
        };
        let layer = mask_layer(&ring, self.color).box_blur((width / 2).max(1));
        add_layer(frame, &layer, gain)
    }
}

fn centred_ellipse_ring(w: usize, h: usize, width: usize) -> Mask {
    let (cx, cy) = (w as f32 * 0.5, h as f32 * 0.5);
    let (rx, ry) = ((w as f32 * 0.25).max(1.0), (h as f32 * 0.4).max(1.0));
    let band = width as f32 / rx.min(ry);
    Mask::from_fn(w, h, |x, y| {
        let dx = (x as f32 - cx) / rx;
        let dy = (y as f32 - cy) / ry;
        let d = (dx * dx + dy * dy).sqrt();
        d >= 1.0 && d < 1.0 + band
    })
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WaveformPosition {
    Bottom,
    Top,
    Center,
}

const WAVEFORM_POSITIONS: [WaveformPosition; 3] =
    [WaveformPosition::Bottom, WaveformPosition::Top, WaveformPosition::Center];

/// Draws the raw audio samples of the current chunk as a glowing polyline.
pub struct AudioWaveform {
    position: WaveformPosition,
    color: [u8; 3],
    repick: Dwell,
    rng: fastrand::Rng,
}

impl AudioWaveform {
    pub fn new(deps: &EffectDeps) -> Self {
        Self {
            position: WaveformPosition::Bottom,
            color: [0, 255, 200],
            repick: Dwell::secs(2.0),
            rng: deps.rng_for("audio_waveform"),
        }
    }

    pub fn position(&self) -> WaveformPosition {
        self.position
    }

    pub fn color(&self) -> [u8; 3] {
        self.color
    }
}

impl Effect for AudioWaveform {
    fn name(&self) -> &'static str {
        "audio_waveform"
    }

    fn transform(&mut self, ctx: &EffectCtx<'_>, frame: &Frame) -> Frame {
        let f = ctx.features;
        if f.beat && self.repick.try_fire(ctx.now) {
            self.position = WAVEFORM_POSITIONS[self.rng.usize(..WAVEFORM_POSITIONS.len())];
            self.color = random_vivid(&mut self.rng);
        }
        let samples = &f.samples;
        if frame.is_empty() || samples.len() < 2 {
            return frame.clone();
        }

        let (w, h) = (frame.width() as f32, frame.height() as f32);
        let baseline = match self.position {
            WaveformPosition::Bottom => h * 0.85,
            WaveformPosition::Top => h * 0.15,
            WaveformPosition::Center => h * 0.5,
        };
        let amp = h * (0.1 + 0.2 * f.volume.clamp(0.0, 1.0));
        let thickness = (3.0 * res_scale(frame)).max(1.0);

        let points = (w as usize / 4).clamp(2, samples.len());
        let at = |i: usize| {
            let s = samples[i * (samples.len() - 1) / (points - 1)];
            (i as f32 * (w - 1.0) / (points - 1) as f32, baseline - s.clamp(-1.0, 1.0) * amp)
        };

        let mut out = frame.clone();
        let mut prev = at(0);
        for i in 1..points {
            let next = at(i);
            out.draw_line(prev, next, thickness * 3.0, self.color, 0.3);
            out.draw_line(prev, next, thickness, self.color, 1.0);
            prev = next;
        }
        out
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Scene {
    Gradient,
    Starfield,
}

const SCENE_HOLD: Duration = Duration::from_secs(5);

/// Swaps the background behind the detected figure for a generated, slowly moving scene.
pub struct BackgroundReplacement {
    scene: Scene,
    palette: ([u8; 3], [u8; 3]),
    stars: Vec<(f32, f32, f32)>,
    scene_since: Option<Instant>,
    beat_gate: Dwell,
    segmenter: Arc<dyn Segmenter>,
    clock: EffectClock,
    rng: fastrand::Rng,
}

impl BackgroundReplacement {
    pub fn new(deps: &EffectDeps) -> Self {
        let mut rng = deps.rng_for("background_replacement");
        let palette = (random_vivid(&mut rng), random_vivid(&mut rng));
        let stars = (0..200).map(|_| (rng.f32(), rng.f32(), 0.3 + rng.f32() * 0.7)).collect();
        Self {
            scene: Scene::Gradient,
            palette,
            stars,
            scene_since: None,
            beat_gate: Dwell::secs(1.0),
            segmenter: Arc::clone(&deps.segmenter),
            clock: EffectClock::default(),
            rng,
        }
    }

    pub fn scene(&self) -> Scene {
        self.scene
    }

    fn repick(&mut self, now: Instant) {
        self.scene = if self.rng.bool() { Scene::Gradient } else { Scene::Starfield };
        self.palette = (random_vivid(&mut self.rng), random_vivid(&mut self.rng));
        self.scene_since = Some(now);
    }

    fn render_scene(&self, w: usize, h: usize, elapsed: f32, volume: f32) -> Frame {
        let mut bg = Frame::new(w, h);
        let scroll = elapsed * 0.05;
        match self.scene {
            Scene::Gradient => {
                let (a, b) = self.palette;
                for y in 0..h {
                    let t = (y as f32 / h.max(1) as f32 + scroll).fract();
                    let t = if t > 0.5 { 2.0 - 2.0 * t } else { 2.0 * t };
                    let rgb = [lerp_u8(a[0], b[0], t), lerp_u8(a[1], b[1], t), lerp_u8(a[2], b[2], t)];
                    for x in 0..w {
                        bg.set_pixel(x, y, rgb);
                    }
                }
            }
            Scene::Starfield => {
                let zoom = 1.0 + 0.3 * volume;
                let tint = hsv_to_rgb(elapsed * 0.02, 0.3, 1.0);
                let radius = (2.0 * res_scale(&bg) * zoom).max(1.0);
                for &(sx, sy, bright) in &self.stars {
                    let x = ((sx - 0.5) * zoom + 0.5 + scroll).fract() * w as f32;
                    let y = ((sy - 0.5) * zoom + 0.5) * h as f32;
                    bg.fill_disc(x, y, radius, tint, bright);
                }
            }
        }
        bg
    }
}

impl Effect for BackgroundReplacement {
    fn name(&self) -> &'static str {
        "background_replacement"
    }

    fn transform(&mut self, ctx: &EffectCtx<'_>, frame: &Frame) -> Frame {
        let (elapsed, _) = self.clock.tick(ctx.now);
        let f = ctx.features;
        let since = *self.scene_since.get_or_insert(ctx.now);
        let expired = ctx.now.saturating_duration_since(since) >= SCENE_HOLD;
        if expired || (f.beat && self.beat_gate.try_fire(ctx.now)) {
            self.repick(ctx.now);
        }
        if frame.is_empty() {
            return frame.clone();
        }

        let bg = self.render_scene(frame.width(), frame.height(), elapsed, f.volume.clamp(0.0, 1.0));
        match self.segmenter.segment(frame) {
            Some((mask, _)) => self.segmenter.replace_background(frame, &bg, Some(&mask)),
            None => Frame::blend(frame, &bg, 0.35),
        }
    }
}
