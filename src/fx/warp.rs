use super::{kaleido_fold, res_scale, Dwell, Effect, EffectClock, EffectCtx, EffectDeps};
use crate::frame::Frame;
use std::f32::consts::{PI, TAU};
use std::time::{Duration, Instant};

/// N-fold mirror around a centre that drifts with the bass; beats nudge the fold count.
pub struct Kaleidoscope {
    segments: u32,
    zoom: f32,
    clock: EffectClock,
    rng: fastrand::Rng,
}

impl Kaleidoscope {
    pub fn new(deps: &EffectDeps) -> Self {
        Self {
            segments: 6,
            zoom: 1.0,
            clock: EffectClock::default(),
            rng: deps.rng_for("kaleidoscope"),
        }
    }

    pub fn segments(&self) -> u32 {
        self.segments
    }
}

impl Effect for Kaleidoscope {
    fn name(&self) -> &'static str {
        "kaleidoscope"
    }

    fn transform(&mut self, ctx: &EffectCtx<'_>, frame: &Frame) -> Frame {
        let (elapsed, _) = self.clock.tick(ctx.now);
        let f = ctx.features;

        if f.beat {
            let jitter = self.rng.i32(-1..=1);
            self.segments = (self.segments as i32 + jitter).clamp(3, 8) as u32;
        }
        let target_zoom = 0.8 + 0.4 * f.volume.clamp(0.0, 1.0);
        self.zoom += (target_zoom - self.zoom) * 0.3;

        let (w, h) = (frame.width() as f32, frame.height() as f32);
        let cx = w * 0.5 + 0.1 * w * (f.bass() * 20.0).sin();
        let cy = h * 0.5 + 0.05 * h * (f.mid() * 20.0).cos();
        let spin = elapsed * 0.25;
        let segments = self.segments;
        let zoom = self.zoom.max(0.1);

        frame.remap(|x, y| {
            let dx = x - cx;
            let dy = y - cy;
            let r = (dx * dx + dy * dy).sqrt() / zoom;
            let a = kaleido_fold(dy.atan2(dx) + spin, segments) - spin;
            (cx + r * a.cos(), cy + r * a.sin())
        })
    }
}

/// Swirl whose strength pumps on beats and decays between them.
pub struct Vortex {
    strength: f32,
    speed: f32,
    center: (f32, f32),
    recenter: Dwell,
    clock: EffectClock,
    rng: fastrand::Rng,
}

impl Vortex {
    pub fn new(deps: &EffectDeps) -> Self {
        Self {
            strength: 10.0,
            speed: 0.5,
            center: (0.5, 0.5),
            recenter: Dwell::secs(1.0),
            clock: EffectClock::default(),
            rng: deps.rng_for("vortex"),
        }
    }

    pub fn strength(&self) -> f32 {
        self.strength
    }
}

impl Effect for Vortex {
    fn name(&self) -> &'static str {
        "vortex"
    }

    fn transform(&mut self, ctx: &EffectCtx<'_>, frame: &Frame) -> Frame {
        let (elapsed, _) = self.clock.tick(ctx.now);
        let f = ctx.features;

        if f.beat {
            self.strength = (self.strength + 2.0).min(20.0);
        } else {
            self.strength = (self.strength - 0.2).max(5.0);
        }
        if f.volume > 0.6 && self.recenter.try_fire(ctx.now) {
            self.center = (0.3 + self.rng.f32() * 0.4, 0.3 + self.rng.f32() * 0.4);
        }

        let (w, h) = (frame.width() as f32, frame.height() as f32);
        let cx = self.center.0 * w;
        let cy = self.center.1 * h;
        let max_r = (w * w + h * h).sqrt() * 0.5;
        let reach = max_r * (0.5 + 2.0 * f.bass()).min(1.5);
        let twist = self.strength / 20.0 * PI;
        let drift = elapsed * self.speed * (1.0 + 2.0 * f.volume);

        frame.remap(|x, y| {
            let dx = x - cx;
            let dy = y - cy;
            let r = (dx * dx + dy * dy).sqrt();
            let falloff = (1.0 - r / reach).max(0.0);
            let a = dy.atan2(dx) + twist * falloff * falloff + drift * falloff;
            (cx + r * a.cos(), cy + r * a.sin())
        })
    }
}

/// Sine displacement field with a flow direction that occasionally flips, plus beat ripples.
pub struct Liquid {
    amplitude: f32,
    flow: f32,
    phase: f32,
    flip: Dwell,
    ripple: Option<(Instant, f32, f32)>,
    clock: EffectClock,
    rng: fastrand::Rng,
}

const RIPPLE_SECS: f32 = 1.0;

impl Liquid {
    pub fn new(deps: &EffectDeps) -> Self {
        Self {
            amplitude: 5.0,
            flow: 1.0,
            phase: 0.0,
            flip: Dwell::secs(1.0),
            ripple: None,
            clock: EffectClock::default(),
            rng: deps.rng_for("liquid"),
        }
    }
}

impl Effect for Liquid {
    fn name(&self) -> &'static str {
        "liquid"
    }

    fn transform(&mut self, ctx: &EffectCtx<'_>, frame: &Frame) -> Frame {
        let (_, dt) = self.clock.tick(ctx.now);
        let f = ctx.features;
        let scale = res_scale(frame);

        let target = 5.0 + 15.0 * f.volume.clamp(0.0, 1.0);
        self.amplitude += (target - self.amplitude) * 0.2;
        if f.volume > 0.7 && self.rng.f32() < 0.3 && self.flip.try_fire(ctx.now) {
            self.flow = -self.flow;
        }
        self.phase += dt * 3.0 * self.flow;
        if f.beat {
            let (w, h) = (frame.width() as f32, frame.height() as f32);
            self.ripple = Some((ctx.now, self.rng.f32() * w, self.rng.f32() * h));
        }

        let freq = 10.0 + 30.0 * f.band_levels()[3];
        let (w, h) = (frame.width().max(1) as f32, frame.height().max(1) as f32);
        let amp = self.amplitude * scale;
        let phase = self.phase;
        let ripple = self.ripple.and_then(|(born, rx, ry)| {
            let age = ctx.now.saturating_duration_since(born).as_secs_f32();
            (age < RIPPLE_SECS).then_some((age, rx, ry))
        });
        if ripple.is_none() {
            self.ripple = None;
        }

        let warped = frame.remap(|x, y| {
            let mut sx = x + amp * (TAU * y / h * freq * 0.1 + phase).sin();
            let mut sy = y + amp * (TAU * x / w * freq * 0.1 + phase).cos();
            if let Some((age, rx, ry)) = ripple {
                let dx = x - rx;
                let dy = y - ry;
                let r = (dx * dx + dy * dy).sqrt().max(1e-3);
                let k = amp * 1.5 * (1.0 - age / RIPPLE_SECS) * (r / (10.0 * scale.max(0.1)) - age * 20.0).sin();
                sx += dx / r * k;
                sy += dy / r * k;
            }
            (sx, sy)
        });
        warped.box_blur(1)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MirrorMode {
    LeftToRight,
    TopToBottom,
    Quad,
    Diagonal,
}

const MIRROR_MODES: [MirrorMode; 4] = [
    MirrorMode::LeftToRight,
    MirrorMode::TopToBottom,
    MirrorMode::Quad,
    MirrorMode::Diagonal,
];

/// Mirrors one half or quadrant onto the rest; re-picks the layout every 5s or on a strong beat.
pub struct MirrorSplit {
    mode: MirrorMode,
    mode_since: Option<Instant>,
    rng: fastrand::Rng,
}

const MIRROR_HOLD: Duration = Duration::from_secs(5);
const MIRROR_MIN_HOLD: Duration = Duration::from_secs(1);

impl MirrorSplit {
    pub fn new(deps: &EffectDeps) -> Self {
        Self {
            mode: MirrorMode::LeftToRight,
            mode_since: None,
            rng: deps.rng_for("mirror_split"),
        }
    }

    pub fn mode(&self) -> MirrorMode {
        self.mode
    }
}

impl Effect for MirrorSplit {
    fn name(&self) -> &'static str {
        "mirror_split"
    }

    fn transform(&mut self, ctx: &EffectCtx<'_>, frame: &Frame) -> Frame {
        let f = ctx.features;
        let since = *self.mode_since.get_or_insert(ctx.now);
        let held = ctx.now.saturating_duration_since(since);
        let strong_beat = f.beat && f.volume > 0.6;
        if held >= MIRROR_HOLD || (strong_beat && held >= MIRROR_MIN_HOLD) {
            let others = MIRROR_MODES
                .iter()
                .copied()
                .filter(|m| *m != self.mode)
                .collect::<Vec<_>>();
            self.mode = others[self.rng.usize(..others.len())];
            self.mode_since = Some(ctx.now);
        }

        let (w, h) = (frame.width() as f32, frame.height() as f32);
        let mode = self.mode;
        frame.remap(|x, y| match mode {
            MirrorMode::LeftToRight => (if x > w * 0.5 { w - 1.0 - x } else { x }, y),
            MirrorMode::TopToBottom => (x, if y > h * 0.5 { h - 1.0 - y } else { y }),
            MirrorMode::Quad => (
                if x > w * 0.5 { w - 1.0 - x } else { x },
                if y > h * 0.5 { h - 1.0 - y } else { y },
            ),
            MirrorMode::Diagonal => {
                // Reflect across the main diagonal in normalised space.
                let u = x / w;
                let v = y / h;
                if v > u { (v * w, u * h) } else { (x, y) }
            }
        })
    }
}
