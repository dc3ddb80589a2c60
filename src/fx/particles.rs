use super::{hsv_to_rgb, res_scale, Dwell, Effect, EffectClock, EffectCtx, EffectDeps};
use crate::frame::Frame;
use crate::segmentation::Segmenter;
use std::f32::consts::TAU;
use std::sync::Arc;
use std::time::{Duration, Instant};

// Kinematics are tuned in pixels per 1/30 s step at 720 lines.
const STEP_HZ: f32 = 30.0;

#[derive(Clone, Debug)]
pub struct Particle {
    pub pos: (f32, f32),
    pub vel: (f32, f32),
    pub color: [u8; 3],
    pub born: Instant,
    pub lifetime: Duration,
}

impl Particle {
    pub fn alpha(&self, now: Instant) -> f32 {
        let age = now.saturating_duration_since(self.born).as_secs_f32();
        (1.0 - age / self.lifetime.as_secs_f32().max(1e-3)).max(0.0)
    }
}

const FIREWORK_LIFETIME: Duration = Duration::from_millis(1000);
const FIREWORK_GRAVITY: f32 = 0.2;

/// Beat-triggered particle bursts launched from the top of the detected figure.
pub struct Fireworks {
    particles: Vec<Particle>,
    spawn_gate: Dwell,
    segmenter: Arc<dyn Segmenter>,
    clock: EffectClock,
    rng: fastrand::Rng,
}

impl Fireworks {
    pub fn new(deps: &EffectDeps) -> Self {
        Self {
            particles: Vec::new(),
            spawn_gate: Dwell::secs(0.2),
            segmenter: Arc::clone(&deps.segmenter),
            clock: EffectClock::default(),
            rng: deps.rng_for("fireworks"),
        }
    }

    pub fn particles(&self) -> &[Particle] {
        &self.particles
    }

    fn spawn(&mut self, frame: &Frame, intensity: f32, now: Instant) {
        let (w, h) = (frame.width() as f32, frame.height() as f32);
        let origin = self
            .segmenter
            .segment(frame)
            .and_then(|(mask, _)| mask.top_anchor())
            .unwrap_or_else(|| (self.rng.f32() * w, self.rng.f32() * h * 0.6));

        let count = (20.0 + 30.0 * intensity) as usize;
        let max_speed = 5.0 + 3.0 * intensity;
        let scale = res_scale(frame);
        let hue = self.rng.f32();
        for _ in 0..count {
            let angle = self.rng.f32() * TAU;
            let speed = (2.0 + self.rng.f32() * (max_speed - 2.0)) * scale;
            let color = hsv_to_rgb(hue + (self.rng.f32() - 0.5) * 0.12, 0.85, 1.0);
            self.particles.push(Particle {
                pos: origin,
                vel: (angle.cos() * speed, angle.sin() * speed),
                color,
                born: now,
                lifetime: FIREWORK_LIFETIME,
            });
        }
    }
}

impl Effect for Fireworks {
    fn name(&self) -> &'static str {
        "fireworks"
    }

    fn transform(&mut self, ctx: &EffectCtx<'_>, frame: &Frame) -> Frame {
        let (_, dt) = self.clock.tick(ctx.now);
        let f = ctx.features;

        if f.beat && self.spawn_gate.try_fire(ctx.now) {
            self.spawn(frame, f.volume.clamp(0.0, 1.0), ctx.now);
        }

        let steps = dt * STEP_HZ;
        let gravity = FIREWORK_GRAVITY * res_scale(frame);
        let (w, h) = (frame.width() as f32, frame.height() as f32);
        for p in &mut self.particles {
            p.pos.0 += p.vel.0 * steps;
            p.pos.1 += p.vel.1 * steps;
            p.vel.1 += gravity * steps;
        }
        self.particles.retain(|p| {
            p.alpha(ctx.now) > 0.0 && p.pos.0 >= 0.0 && p.pos.0 < w && p.pos.1 >= 0.0 && p.pos.1 < h
        });

        let mut out = frame.clone();
        let radius = (3.0 * res_scale(frame)).max(1.0);
        for p in &self.particles {
            let a = p.alpha(ctx.now);
            out.fill_disc(p.pos.0, p.pos.1, radius * 2.0, p.color, a * 0.25);
            out.fill_disc(p.pos.0, p.pos.1, radius, p.color, a);
        }
        out
    }
}

#[derive(Clone, Debug)]
pub struct Beam {
    pub origin: (f32, f32),
    pub angle: f32,
    pub max_len: f32,
    pub thickness: f32,
    pub color: [u8; 3],
    pub born: Instant,
}

const MAX_BEAMS: usize = 10;
const BEAM_LIFETIME: Duration = Duration::from_millis(800);
const BEAM_GROWTH: f32 = 30.0;
const BEAM_COLORS: [[u8; 3]; 5] = [
    [255, 40, 40],
    [40, 255, 80],
    [60, 120, 255],
    [255, 60, 255],
    [40, 255, 255],
];

/// Beams shot outward from the figure's outline, growing then fading.
pub struct LaserBeams {
    beams: Vec<Beam>,
    spawn_gate: Dwell,
    segmenter: Arc<dyn Segmenter>,
    rng: fastrand::Rng,
}

impl LaserBeams {
    pub fn new(deps: &EffectDeps) -> Self {
        Self {
            beams: Vec::new(),
            spawn_gate: Dwell::secs(0.1),
            segmenter: Arc::clone(&deps.segmenter),
            rng: deps.rng_for("laser_beams"),
        }
    }

    pub fn beams(&self) -> &[Beam] {
        &self.beams
    }

    fn spawn(&mut self, frame: &Frame, volume: f32, now: Instant) {
        let (w, h) = (frame.width() as f32, frame.height() as f32);
        let scale = res_scale(frame);
        let anchors = self.segmenter.segment(frame).and_then(|(mask, _)| {
            let pts = mask.boundary_points(4);
            let c = mask.centroid()?;
            (!pts.is_empty()).then_some((pts, c))
        });

        let want = (1 + (volume * 3.0) as usize).min(MAX_BEAMS.saturating_sub(self.beams.len()));
        for _ in 0..want {
            let (origin, angle) = match &anchors {
                Some((pts, c)) => {
                    let (px, py) = pts[self.rng.usize(..pts.len())];
                    let (px, py) = (px as f32, py as f32);
                    ((px, py), (py - c.1).atan2(px - c.0))
                }
                None => (
                    (self.rng.f32() * w, self.rng.f32() * h),
                    self.rng.f32() * TAU,
                ),
            };
            self.beams.push(Beam {
                origin,
                angle,
                max_len: (100.0 + self.rng.f32() * 400.0) * scale,
                thickness: (2.0 + 4.0 * volume) * scale.max(0.25),
                color: BEAM_COLORS[self.rng.usize(..BEAM_COLORS.len())],
                born: now,
            });
        }
    }
}

impl Effect for LaserBeams {
    fn name(&self) -> &'static str {
        "laser_beams"
    }

    fn transform(&mut self, ctx: &EffectCtx<'_>, frame: &Frame) -> Frame {
        let f = ctx.features;
        self.beams
            .retain(|b| ctx.now.saturating_duration_since(b.born) < BEAM_LIFETIME);
        if f.beat && self.beams.len() < MAX_BEAMS && self.spawn_gate.try_fire(ctx.now) {
            self.spawn(frame, f.volume.clamp(0.0, 1.0), ctx.now);
        }

        let scale = res_scale(frame);
        let mut out = frame.clone();
        for b in &self.beams {
            let age = ctx.now.saturating_duration_since(b.born).as_secs_f32();
            let alpha = (1.0 - age / BEAM_LIFETIME.as_secs_f32()).max(0.0);
            let len = (age * STEP_HZ * BEAM_GROWTH * scale).min(b.max_len);
            let end = (b.origin.0 + b.angle.cos() * len, b.origin.1 + b.angle.sin() * len);
            out.draw_line(b.origin, end, b.thickness * 3.0, b.color, alpha * 0.3);
            out.draw_line(b.origin, end, b.thickness, b.color, alpha);
            out.draw_line(b.origin, end, (b.thickness * 0.4).max(1.0), [255, 255, 255], alpha * 0.8);
        }
        out
    }
}
