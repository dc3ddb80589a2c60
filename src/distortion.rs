use crate::frame::Frame;
use std::time::{Duration, Instant};

pub const KIND_DWELL: Duration = Duration::from_secs(3);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DistortionKind {
    Posterize,
    WashOut,
    ChannelShift,
    Noise,
    BlockGlitch,
}

impl DistortionKind {
    pub const ALL: [DistortionKind; 5] = [
        DistortionKind::Posterize,
        DistortionKind::WashOut,
        DistortionKind::ChannelShift,
        DistortionKind::Noise,
        DistortionKind::BlockGlitch,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Self::Posterize => "posterize",
            Self::WashOut => "wash-out",
            Self::ChannelShift => "channel-shift",
            Self::Noise => "noise",
            Self::BlockGlitch => "block-glitch",
        }
    }
}

/// Level-controlled pre-filter applied to captured frames before any effect sees them.
pub struct DistortionStage {
    level: f32,
    kind: DistortionKind,
    kind_since: Option<Instant>,
    rng: fastrand::Rng,
}

impl DistortionStage {
    pub fn new(level: f32) -> Self {
        Self::with_rng(level, fastrand::Rng::new())
    }

    pub fn with_seed(level: f32, seed: u64) -> Self {
        Self::with_rng(level, fastrand::Rng::with_seed(seed))
    }

    fn with_rng(level: f32, mut rng: fastrand::Rng) -> Self {
        let kind = DistortionKind::ALL[rng.usize(..DistortionKind::ALL.len())];
        let mut stage = Self {
            level: 0.0,
            kind,
            kind_since: None,
            rng,
        };
        stage.set_level(level);
        stage
    }

    pub fn set_level(&mut self, level: f32) {
        self.level = if level.is_finite() { level.clamp(0.0, 100.0) } else { 0.0 };
    }

    pub fn level(&self) -> f32 {
        self.level
    }

    pub fn kind(&self) -> DistortionKind {
        self.kind
    }

    /// Level 0 returns `frame` untouched. Otherwise the active kind is applied and blended over
    /// the input at `level/100` opacity.
    pub fn apply(&mut self, frame: Frame, now: Instant) -> Frame {
        if self.level <= 0.0 || frame.is_empty() {
            return frame;
        }

        match self.kind_since {
            None => self.kind_since = Some(now),
            Some(since) if now.saturating_duration_since(since) >= KIND_DWELL => {
                let next = DistortionKind::ALL[self.rng.usize(..DistortionKind::ALL.len())];
                if next != self.kind {
                    tracing::debug!(from = self.kind.label(), to = next.label(), "distortion kind changed");
                }
                self.kind = next;
                self.kind_since = Some(now);
            }
            Some(_) => {}
        }

        let i = self.level / 100.0;
        let distorted = match self.kind {
            DistortionKind::Posterize => posterize(&frame, i),
            DistortionKind::WashOut => wash_out(&frame, i),
            DistortionKind::ChannelShift => channel_shift(&frame, i, &mut self.rng),
            DistortionKind::Noise => noise(&frame, i, &mut self.rng),
            DistortionKind::BlockGlitch => block_glitch(&frame, i, &mut self.rng),
        };
        Frame::blend(&frame, &distorted, i)
    }
}

fn posterize(frame: &Frame, i: f32) -> Frame {
    let levels = ((256.0 * (1.0 - i * 0.95)) as i32).max(2);
    let step = (256 / levels).max(1);
    let mut out = frame.clone();
    for v in out.data_mut() {
        *v = ((*v as i32 / step) * step).clamp(0, 255) as u8;
    }
    out
}

fn wash_out(frame: &Frame, i: f32) -> Frame {
    let contrast = 1.0 - i * 0.7;
    let brightness = i * 50.0;
    let mut out = frame.clone();
    for v in out.data_mut() {
        *v = (*v as f32 * contrast + brightness).round().clamp(0.0, 255.0) as u8;
    }
    if i > 0.5 {
        let r = ((frame.width().min(frame.height()) as f32) * 0.01 * i).max(1.0) as usize;
        out = out.box_blur(r);
    }
    out
}

fn channel_shift(frame: &Frame, i: f32, rng: &mut fastrand::Rng) -> Frame {
    let ch = rng.usize(..3);
    let dx = (i * 20.0) as isize;
    let dy = (i * 15.0) as isize;
    let mut out = frame.clone();
    for y in 0..frame.height() {
        for x in 0..frame.width() {
            let src = frame.sample_clamped(x as isize - dx, y as isize - dy);
            let mut px = out.pixel(x, y);
            px[ch] = src[ch];
            out.set_pixel(x, y, px);
        }
    }
    out
}

fn noise(frame: &Frame, i: f32, rng: &mut fastrand::Rng) -> Frame {
    let amount = i * 0.7;
    let mut out = frame.clone();
    for v in out.data_mut() {
        let n = gaussian(rng) * 30.0 * amount;
        *v = (*v as f32 + n).clamp(0.0, 255.0) as u8;
    }
    out
}

fn block_glitch(frame: &Frame, i: f32, rng: &mut fastrand::Rng) -> Frame {
    let (w, h) = (frame.width(), frame.height());
    let mut out = frame.clone();
    let blocks = (i * 15.0) as usize;
    for _ in 0..blocks {
        let bw = rng.usize(8..=(w / 4).max(9)).min(w);
        let bh = rng.usize(4..=(h / 8).max(5)).min(h);
        let x = rng.usize(..=(w - bw));
        let y = rng.usize(..=(h - bh));
        let ox = rng.i32(-30..=30) as isize;
        let oy = rng.i32(-30..=30) as isize;
        for yy in 0..bh {
            for xx in 0..bw {
                let tx = x as isize + xx as isize + ox;
                let ty = y as isize + yy as isize + oy;
                if tx < 0 || ty < 0 || tx as usize >= w || ty as usize >= h {
                    continue;
                }
                out.set_pixel(tx as usize, ty as usize, frame.pixel(x + xx, y + yy));
            }
        }
    }
    out
}

/// Box-Muller standard normal.
fn gaussian(rng: &mut fastrand::Rng) -> f32 {
    let u1 = rng.f32().max(f32::MIN_POSITIVE);
    let u2 = rng.f32();
    (-2.0 * u1.ln()).sqrt() * (std::f32::consts::TAU * u2).cos()
}
