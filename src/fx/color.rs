use super::{
    add_layer, edge_mask, fract01, hsv_to_rgb, mask_layer, random_vivid, res_scale, rgb_to_hsv, Dwell, Effect,
    EffectClock, EffectCtx, EffectDeps,
};
use crate::frame::Frame;
use std::time::{Duration, Instant};

const POSTERIZE_CHOICES: [u32; 5] = [3, 4, 5, 6, 8];

/// Hue rotation, saturation boost and posterize, with a channel roll on beats and bass grain.
pub struct PsychedelicColors {
    hue_shift: f32,
    levels: u32,
    levels_gate: Dwell,
    roll_until: Option<Instant>,
    clock: EffectClock,
    rng: fastrand::Rng,
}

impl PsychedelicColors {
    pub fn new(deps: &EffectDeps) -> Self {
        Self {
            hue_shift: 0.0,
            levels: 5,
            levels_gate: Dwell::secs(0.5),
            roll_until: None,
            clock: EffectClock::default(),
            rng: deps.rng_for("psychedelic_colors"),
        }
    }
}

impl Effect for PsychedelicColors {
    fn name(&self) -> &'static str {
        "psychedelic_colors"
    }

    fn transform(&mut self, ctx: &EffectCtx<'_>, frame: &Frame) -> Frame {
        let (_, dt) = self.clock.tick(ctx.now);
        let f = ctx.features;

        self.hue_shift = fract01(self.hue_shift + dt * (30.0 + 120.0 * f.volume) / 360.0);
        if f.beat && self.levels_gate.try_fire(ctx.now) {
            self.levels = POSTERIZE_CHOICES[self.rng.usize(..POSTERIZE_CHOICES.len())];
            self.roll_until = Some(ctx.now + Duration::from_millis(150));
        }
        let rolling = self.roll_until.is_some_and(|t| ctx.now < t);
        let grain = f.bass() * 40.0;
        let step = 255.0 / (self.levels - 1).max(1) as f32;
        let shift = self.hue_shift;

        let mut out = frame.clone();
        for px in out.data_mut().chunks_exact_mut(Frame::CHANNELS) {
            let (h, s, v) = rgb_to_hsv([px[0], px[1], px[2]]);
            let mut rgb = hsv_to_rgb(h + shift, (s * 1.5).min(1.0), v);
            for c in &mut rgb {
                let mut x = *c as f32;
                if grain > 0.5 {
                    x += (self.rng.f32() - 0.5) * grain;
                }
                *c = ((x / step).round() * step).clamp(0.0, 255.0) as u8;
            }
            if rolling {
                rgb.rotate_left(1);
            }
            px.copy_from_slice(&rgb);
        }
        out
    }
}

const INVERT_FLASH: Duration = Duration::from_millis(200);

/// Full negative for a short flash after each beat.
pub struct ColorInversion {
    flash_until: Option<Instant>,
}

impl ColorInversion {
    pub fn new(_deps: &EffectDeps) -> Self {
        Self { flash_until: None }
    }
}

impl Effect for ColorInversion {
    fn name(&self) -> &'static str {
        "color_inversion"
    }

    fn transform(&mut self, ctx: &EffectCtx<'_>, frame: &Frame) -> Frame {
        if ctx.features.beat {
            self.flash_until = Some(ctx.now + INVERT_FLASH);
        }
        let mut out = frame.clone();
        if self.flash_until.is_some_and(|t| ctx.now < t) {
            for v in out.data_mut() {
                *v = 255 - *v;
            }
        }
        out
    }
}

const GLITCH_BURST: Duration = Duration::from_millis(200);

/// Short burst of RGB split, displaced slabs, scanlines and noise after each beat.
pub struct Glitch {
    burst_until: Option<Instant>,
    rng: fastrand::Rng,
}

impl Glitch {
    pub fn new(deps: &EffectDeps) -> Self {
        Self {
            burst_until: None,
            rng: deps.rng_for("glitch"),
        }
    }

    pub fn active(&self, now: Instant) -> bool {
        self.burst_until.is_some_and(|t| now < t)
    }
}

impl Effect for Glitch {
    fn name(&self) -> &'static str {
        "glitch"
    }

    fn transform(&mut self, ctx: &EffectCtx<'_>, frame: &Frame) -> Frame {
        let f = ctx.features;
        if f.beat {
            self.burst_until = Some(ctx.now + GLITCH_BURST);
        }
        if !self.active(ctx.now) {
            return frame.clone();
        }

        let (w, h) = (frame.width(), frame.height());
        let scale = res_scale(frame);
        let split = ((4.0 + 16.0 * f.volume) * scale).max(1.0) as isize;

        let mut out = frame.clone();
        for y in 0..h {
            for x in 0..w {
                let r = frame.sample_clamped(x as isize + split, y as isize)[0];
                let b = frame.sample_clamped(x as isize - split, y as isize)[2];
                let g = frame.pixel(x, y)[1];
                out.set_pixel(x, y, [r, g, b]);
            }
        }

        // Horizontal slabs slid sideways.
        let slabs = 3 + (f.volume * 6.0) as usize;
        for _ in 0..slabs {
            let sh = self.rng.usize(2..=(h / 10).max(3)).min(h);
            let y0 = self.rng.usize(..=(h - sh));
            let dx = self.rng.i32(-40..=40) as isize;
            let dx = (dx as f32 * scale) as isize;
            for y in y0..y0 + sh {
                let row = (0..w).map(|x| out.pixel(x, y)).collect::<Vec<_>>();
                for x in 0..w {
                    let sx = (x as isize - dx).clamp(0, w as isize - 1) as usize;
                    out.set_pixel(x, y, row[sx]);
                }
            }
        }

        for (i, v) in out.data_mut().iter_mut().enumerate() {
            let row = i / (w * Frame::CHANNELS);
            let mut x = *v as f32;
            if row % 2 == 1 {
                x *= 0.7;
            }
            x += (self.rng.f32() - 0.5) * 40.0;
            *v = x.clamp(0.0, 255.0) as u8;
        }
        out
    }
}

/// Edges drawn as a blurred, hue-cycling neon glow over the frame.
pub struct NeonGlow {
    phase: f32,
}

impl NeonGlow {
    pub fn new(_deps: &EffectDeps) -> Self {
        Self { phase: 0.0 }
    }
}

impl Effect for NeonGlow {
    fn name(&self) -> &'static str {
        "neon_glow"
    }

    fn transform(&mut self, ctx: &EffectCtx<'_>, frame: &Frame) -> Frame {
        let f = ctx.features;
        self.phase = fract01(self.phase + 0.02);
        let glow = 7.0 + 18.0 * f.volume.clamp(0.0, 1.0);
        let hue = fract01(self.phase + f.high());
        let color = hsv_to_rgb(hue, 1.0, 1.0);

        let edges = edge_mask(frame, 100.0).dilate(1);
        let layer = mask_layer(&edges, color);
        let blur = ((glow * res_scale(frame)) * 0.5).max(1.0) as usize;
        let halo = layer.box_blur(blur);
        let lit = add_layer(frame, &halo, 0.8);
        add_layer(&lit, &layer, 0.8)
    }
}

/// Edges in one colour over a darkened frame; colour re-picks on beats, at most once a second.
pub struct EdgeDetection {
    color: [u8; 3],
    recolor: Dwell,
    rng: fastrand::Rng,
}

impl EdgeDetection {
    pub fn new(deps: &EffectDeps) -> Self {
        let mut rng = deps.rng_for("edge_detection");
        Self {
            color: random_vivid(&mut rng),
            recolor: Dwell::secs(1.0),
            rng,
        }
    }

    pub fn color(&self) -> [u8; 3] {
        self.color
    }
}

impl Effect for EdgeDetection {
    fn name(&self) -> &'static str {
        "edge_detection"
    }

    fn transform(&mut self, ctx: &EffectCtx<'_>, frame: &Frame) -> Frame {
        let f = ctx.features;
        if f.beat && self.recolor.try_fire(ctx.now) {
            self.color = random_vivid(&mut self.rng);
        }
        let threshold = 120.0 - 60.0 * f.volume.clamp(0.0, 1.0);
        let edges = edge_mask(frame, threshold);

        let mut out = frame.clone();
        for v in out.data_mut() {
            *v = (*v as f32 * 0.3) as u8;
        }
        for y in 0..frame.height() {
            for x in 0..frame.width() {
                if edges.get(x, y) {
                    out.set_pixel(x, y, self.color);
                }
            }
        }
        out
    }
}
