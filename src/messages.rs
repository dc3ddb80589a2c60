use crate::audio::AudioFeatures;
use crate::frame::Frame;
use crate::fx::hsv_to_rgb;
use std::path::Path;
use std::time::{Duration, Instant};

pub const DEFAULT_MESSAGES: [&str; 9] = [
    "Welcome to the party!",
    "Feel the beat",
    "Dance!",
    "Let the music take control",
    "Vibe with the music",
    "The night is young",
    "Lost in the rhythm",
    "Feel the energy",
    "Music is life",
];

/// Line-delimited message resource. Never empty: missing or blank sources fall back to the
/// built-in set.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MessageBook {
    messages: Vec<String>,
}

impl Default for MessageBook {
    fn default() -> Self {
        Self::defaults()
    }
}

impl MessageBook {
    pub fn defaults() -> Self {
        Self {
            messages: DEFAULT_MESSAGES.iter().map(|s| s.to_string()).collect(),
        }
    }

    pub fn from_lines(text: &str) -> Self {
        let messages = text
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect::<Vec<_>>();
        if messages.is_empty() {
            Self::defaults()
        } else {
            Self { messages }
        }
    }

    pub fn load(path: Option<&Path>) -> Self {
        let Some(path) = path else {
            return Self::defaults();
        };
        match std::fs::read_to_string(path) {
            Ok(text) => {
                let book = Self::from_lines(&text);
                tracing::info!(path = %path.display(), count = book.len(), "messages loaded");
                book
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "messages file unreadable; using defaults");
                Self::defaults()
            }
        }
    }

    pub fn messages(&self) -> &[String] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Placement {
    Center,
    Top,
    Bottom,
    Left,
    Right,
    Random,
}

const PLACEMENTS: [Placement; 6] = [
    Placement::Center,
    Placement::Top,
    Placement::Bottom,
    Placement::Left,
    Placement::Right,
    Placement::Random,
];

/// Top-left corner of the text block, either fixed or derived from the frame at render time.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum MessagePosition {
    Fixed { x: i32, y: i32 },
    Computed(Placement),
}

const MARGIN: i32 = 30;

impl MessagePosition {
    /// `jitter` is a pair of fractions in [0, 1] that pins where a `Random` placement lands,
    /// so the text does not jump between frames.
    pub fn resolve(&self, frame: (usize, usize), text: (i32, i32), jitter: (f32, f32)) -> (i32, i32) {
        let (fw, fh) = (frame.0 as i32, frame.1 as i32);
        let (tw, th) = text;
        match *self {
            Self::Fixed { x, y } => (x, y),
            Self::Computed(p) => match p {
                Placement::Center => ((fw - tw) / 2, (fh - th) / 2),
                Placement::Top => ((fw - tw) / 2, MARGIN),
                Placement::Bottom => ((fw - tw) / 2, fh - th - MARGIN),
                Placement::Left => (MARGIN, (fh - th) / 2),
                Placement::Right => (fw - tw - MARGIN, (fh - th) / 2),
                Placement::Random => {
                    let span_x = (fw - tw - 2 * MARGIN).max(0) as f32;
                    let span_y = (fh - th - 2 * MARGIN).max(0) as f32;
                    (
                        MARGIN + (jitter.0.clamp(0.0, 1.0) * span_x) as i32,
                        MARGIN + (jitter.1.clamp(0.0, 1.0) * span_y) as i32,
                    )
                }
            },
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Animation {
    Static,
    Scroll,
    Pulse,
    Wave,
}

const ANIMATIONS: [Animation; 4] = [Animation::Static, Animation::Scroll, Animation::Pulse, Animation::Wave];

#[derive(Clone, Debug, PartialEq)]
pub struct ActiveMessage {
    pub text: String,
    /// Font scale in [1, 3].
    pub scale: f32,
    pub color: [u8; 3],
    pub position: MessagePosition,
    pub animation: Animation,
    pub glow: bool,
    pub jitter: (f32, f32),
    pub started: Instant,
}

impl ActiveMessage {
    pub fn new(text: impl Into<String>, started: Instant) -> Self {
        Self {
            text: text.into(),
            scale: 1.0,
            color: [255, 255, 255],
            position: MessagePosition::Computed(Placement::Center),
            animation: Animation::Static,
            glow: false,
            jitter: (0.5, 0.5),
            started,
        }
    }
}

/// Shows a random message every `interval` for `duration`, with a random look per message.
pub struct MessageOverlay {
    book: MessageBook,
    interval: Duration,
    duration: Duration,
    enabled: bool,
    active: Option<ActiveMessage>,
    last_pick: Option<Instant>,
    rng: fastrand::Rng,
}

impl MessageOverlay {
    pub fn new(book: MessageBook, interval: Duration, duration: Duration) -> Self {
        Self::with_rng(book, interval, duration, fastrand::Rng::new())
    }

    pub fn with_seed(book: MessageBook, interval: Duration, duration: Duration, seed: u64) -> Self {
        Self::with_rng(book, interval, duration, fastrand::Rng::with_seed(seed))
    }

    fn with_rng(book: MessageBook, interval: Duration, duration: Duration, rng: fastrand::Rng) -> Self {
        Self {
            book,
            interval,
            duration,
            enabled: true,
            active: None,
            last_pick: None,
            rng,
        }
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn set_enabled(&mut self, on: bool) {
        self.enabled = on;
        if !on {
            self.active = None;
        }
    }

    pub fn active(&self) -> Option<&ActiveMessage> {
        self.active.as_ref()
    }

    pub fn book(&self) -> &MessageBook {
        &self.book
    }

    /// Replaces whatever is on screen and restarts the interval.
    pub fn show(&mut self, message: ActiveMessage) {
        self.last_pick = Some(message.started);
        self.active = Some(message);
    }

    fn pick(&mut self, now: Instant) {
        let messages = self.book.messages();
        if messages.is_empty() {
            return;
        }
        let text = messages[self.rng.usize(..messages.len())].clone();
        let hue = self.rng.f32();
        let sat = self.rng.u8(200..=255) as f32 / 255.0;
        let val = self.rng.u8(200..=255) as f32 / 255.0;
        let message = ActiveMessage {
            text,
            scale: 1.0 + self.rng.f32() * 2.0,
            color: hsv_to_rgb(hue, sat, val),
            position: MessagePosition::Computed(PLACEMENTS[self.rng.usize(..PLACEMENTS.len())]),
            animation: ANIMATIONS[self.rng.usize(..ANIMATIONS.len())],
            glow: self.rng.bool(),
            jitter: (self.rng.f32(), self.rng.f32()),
            started: now,
        };
        tracing::debug!(text = %message.text, animation = ?message.animation, "message shown");
        self.show(message);
    }

    /// Expires and picks messages on schedule, then draws the active one onto `frame`.
    pub fn apply(&mut self, mut frame: Frame, features: &AudioFeatures, now: Instant) -> Frame {
        if !self.enabled || frame.is_empty() {
            return frame;
        }
        if self
            .active
            .as_ref()
            .is_some_and(|m| now.saturating_duration_since(m.started) > self.duration)
        {
            self.active = None;
        }
        if self.active.is_none()
            && self
                .last_pick
                .is_none_or(|l| now.saturating_duration_since(l) >= self.interval)
        {
            self.pick(now);
        }
        if let Some(message) = &self.active {
            draw_message(&mut frame, message, features, now, self.duration);
        }
        frame
    }
}

fn draw_message(frame: &mut Frame, m: &ActiveMessage, features: &AudioFeatures, now: Instant, duration: Duration) {
    let (fw, fh) = (frame.width(), frame.height());
    let text = display_text(&m.text);
    let age = now.saturating_duration_since(m.started).as_secs_f32();
    let volume = features.volume.clamp(0.0, 1.0);

    // One glyph cell is 1/144 of the frame height at scale 1.
    let unit = fh as f32 / 144.0;
    let mut scale = m.scale;
    if m.animation == Animation::Pulse {
        scale *= if features.beat { 1.2 + 0.5 * volume } else { 1.0 + 0.1 * (age * 5.0).sin() };
    }
    let px = (unit * scale).round().max(1.0) as i32;
    let size = text_size(&text, px);

    let (mut x, mut y) = m.position.resolve((fw, fh), size, m.jitter);
    match m.animation {
        Animation::Static => {}
        Animation::Scroll => {
            let progress = age / duration.as_secs_f32().max(1e-3);
            x = fw as i32 - ((fw as i32 + size.0) as f32 * progress) as i32;
        }
        Animation::Pulse => {
            x = (fw as i32 - size.0) / 2;
            y = (fh as i32 - size.1) / 2;
        }
        Animation::Wave => {
            y += ((age * 4.0).sin() * (20.0 + 30.0 * volume) * unit / 5.0) as i32;
        }
    }

    let mut color = m.color;
    if features.beat {
        color = color.map(|c| c.saturating_add(50));
    }
    if m.glow {
        let sum: u32 = color.iter().map(|&c| c as u32).sum();
        let halo = if sum > 380 { [0, 0, 0] } else { [255, 255, 255] };
        let d = (px / 2).max(1);
        for (ox, oy) in [(-d, 0), (d, 0), (0, -d), (0, d)] {
            draw_text(frame, &text, x + ox, y + oy, px, halo, 0.6);
        }
    }
    draw_text(frame, &text, x, y, px, color, 1.0);
}

/// Pixel size of `text` drawn with the 3x5 font at `px` pixels per glyph cell.
pub fn text_size(text: &str, px: i32) -> (i32, i32) {
    let px = px.max(1);
    let count = text.chars().count() as i32;
    let w = if count == 0 { 0 } else { count * 4 * px - px };
    (w, 5 * px)
}

fn display_text(text: &str) -> String {
    text.chars()
        .map(|c| if c.is_whitespace() { ' ' } else { c.to_ascii_uppercase() })
        .collect()
}

pub fn draw_text(frame: &mut Frame, text: &str, x: i32, y: i32, px: i32, rgb: [u8; 3], alpha: f32) {
    let px = px.max(1);
    let mut cursor = x;
    for ch in text.chars() {
        for (ry, bits) in glyph_3x5(ch).iter().enumerate() {
            for rx in 0..3 {
                if bits & (1 << (2 - rx)) == 0 {
                    continue;
                }
                let gx = cursor + rx * px;
                let gy = y + ry as i32 * px;
                for oy in 0..px {
                    for ox in 0..px {
                        frame.mix_pixel(gx + ox, gy + oy, rgb, alpha);
                    }
                }
            }
        }
        cursor += 4 * px;
    }
}

fn glyph_3x5(ch: char) -> [u8; 5] {
    match ch.to_ascii_uppercase() {
        'A' => [0b111, 0b101, 0b111, 0b101, 0b101],
        'B' => [0b110, 0b101, 0b110, 0b101, 0b110],
        'C' => [0b111, 0b100, 0b100, 0b100, 0b111],
        'D' => [0b110, 0b101, 0b101, 0b101, 0b110],
        'E' => [0b111, 0b100, 0b110, 0b100, 0b111],
        'F' => [0b111, 0b100, 0b110, 0b100, 0b100],
        'G' => [0b111, 0b100, 0b101, 0b101, 0b111],
        'H' => [0b101, 0b101, 0b111, 0b101, 0b101],
        'I' => [0b111, 0b010, 0b010, 0b010, 0b111],
        'J' => [0b001, 0b001, 0b001, 0b101, 0b111],
        'K' => [0b101, 0b101, 0b110, 0b101, 0b101],
        'L' => [0b100, 0b100, 0b100, 0b100, 0b111],
        'M' => [0b101, 0b111, 0b111, 0b101, 0b101],
        'N' => [0b101, 0b111, 0b111, 0b111, 0b101],
        'O' => [0b111, 0b101, 0b101, 0b101, 0b111],
        'P' => [0b111, 0b101, 0b111, 0b100, 0b100],
        'Q' => [0b111, 0b101, 0b101, 0b111, 0b001],
        'R' => [0b111, 0b101, 0b110, 0b101, 0b101],
        'S' => [0b111, 0b100, 0b111, 0b001, 0b111],
        'T' => [0b111, 0b010, 0b010, 0b010, 0b010],
        'U' => [0b101, 0b101, 0b101, 0b101, 0b111],
        'V' => [0b101, 0b101, 0b101, 0b101, 0b010],
        'W' => [0b101, 0b101, 0b111, 0b111, 0b101],
        'X' => [0b101, 0b101, 0b010, 0b101, 0b101],
        'Y' => [0b101, 0b101, 0b010, 0b010, 0b010],
        'Z' => [0b111, 0b001, 0b010, 0b100, 0b111],
        '0' => [0b111, 0b101, 0b101, 0b101, 0b111],
        '1' => [0b010, 0b110, 0b010, 0b010, 0b111],
        '2' => [0b111, 0b001, 0b111, 0b100, 0b111],
        '3' => [0b111, 0b001, 0b111, 0b001, 0b111],
        '4' => [0b101, 0b101, 0b111, 0b001, 0b001],
        '5' => [0b111, 0b100, 0b111, 0b001, 0b111],
        '6' => [0b111, 0b100, 0b111, 0b101, 0b111],
        '7' => [0b111, 0b001, 0b001, 0b001, 0b001],
        '8' => [0b111, 0b101, 0b111, 0b101, 0b111],
        '9' => [0b111, 0b101, 0b111, 0b001, 0b111],
        '!' => [0b010, 0b010, 0b010, 0b000, 0b010],
        '?' => [0b111, 0b001, 0b011, 0b000, 0b010],
        '.' => [0b000, 0b000, 0b000, 0b000, 0b010],
        ',' => [0b000, 0b000, 0b000, 0b010, 0b100],
        '\'' => [0b010, 0b010, 0b000, 0b000, 0b000],
        ':' => [0b000, 0b010, 0b000, 0b010, 0b000],
        '+' => [0b000, 0b010, 0b111, 0b010, 0b000],
        '-' => [0b000, 0b000, 0b111, 0b000, 0b000],
        '#' => [0b101, 0b111, 0b101, 0b111, 0b101],
        '*' => [0b101, 0b010, 0b111, 0b010, 0b101],
        ' ' => [0b000, 0b000, 0b000, 0b000, 0b000],
        _ => [0b111, 0b101, 0b111, 0b101, 0b111],
    }
}
