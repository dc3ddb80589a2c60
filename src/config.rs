use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug, Clone)]
#[command(name = "beatfx", version, about = "Audio-reactive live video effects engine with a terminal preview")]
pub struct Config {
    #[arg(long, default_value_t = 1280)]
    pub width: usize,

    #[arg(long, default_value_t = 720)]
    pub height: usize,

    #[arg(long, default_value_t = 30)]
    pub fps: u32,

    #[arg(long, value_enum, default_value_t = VideoSource::Pattern)]
    pub video: VideoSource,

    #[arg(long, value_enum, default_value_t = SegmenterMode::Luma)]
    pub segmenter: SegmenterMode,

    #[arg(long, default_value_t = 44_100)]
    pub sample_rate: u32,

    #[arg(long, default_value_t = 1024)]
    pub chunk_size: usize,

    #[arg(long, default_value_t = 1)]
    pub channels: u16,

    #[arg(long, default_value_t = 1.3)]
    pub beat_threshold: f32,

    #[arg(long, default_value_t = 0.1)]
    pub beat_min_interval: f32,

    #[arg(long, default_value_t = false)]
    pub no_audio: bool,

    #[arg(long)]
    pub device: Option<String>,

    #[arg(long, default_value_t = false)]
    pub list_devices: bool,

    #[arg(long, default_value_t = false)]
    pub list_effects: bool,

    #[arg(long, default_value = "kaleidoscope")]
    pub effect: String,

    #[arg(long, default_value_t = 2.0)]
    pub transition_secs: f32,

    #[arg(long, value_enum, default_value_t = SwitchMode::Time)]
    pub switch: SwitchMode,

    #[arg(long, default_value_t = 20.0)]
    pub seconds_per_switch: f32,

    #[arg(long, default_value_t = 16)]
    pub beats_per_switch: u32,

    #[arg(long, default_value_t = 0.0)]
    pub distortion: f32,

    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    pub messages: bool,

    #[arg(long)]
    pub messages_file: Option<PathBuf>,

    #[arg(long, default_value_t = 10.0)]
    pub message_interval: f32,

    #[arg(long, default_value_t = 5.0)]
    pub message_duration: f32,

    #[arg(long, default_value_t = false)]
    pub headless: bool,

    #[arg(long, default_value_t = 300)]
    pub frames: u64,

    #[arg(long, default_value = "info")]
    pub log_level: String,

    #[arg(long)]
    pub log_file: Option<PathBuf>,

    #[arg(long, default_value_t = false)]
    pub debug: bool,

    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    pub sync_updates: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum VideoSource {
    #[value(alias = "test", alias = "testpattern")]
    Pattern,
    #[value(alias = "black")]
    Blank,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SegmenterMode {
    None,
    #[value(alias = "key", alias = "lumakey")]
    Luma,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SwitchMode {
    Manual,
    Time,
    Beat,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AudioSettings {
    pub sample_rate_hz: u32,
    pub chunk_size: usize,
    pub channels: u16,
    pub beat_threshold: f32,
    pub beat_min_interval: Duration,
}

impl Default for AudioSettings {
    fn default() -> Self {
        Self {
            sample_rate_hz: 44_100,
            chunk_size: 1024,
            channels: 1,
            beat_threshold: 1.3,
            beat_min_interval: Duration::from_millis(100),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VideoSettings {
    pub width: usize,
    pub height: usize,
    pub fps: u32,
}

impl Default for VideoSettings {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
            fps: 30,
        }
    }
}

impl VideoSettings {
    pub fn frame_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.fps.max(1) as f64)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EngineSettings {
    pub default_effect: Option<String>,
    pub transition: Duration,
    pub switch_mode: SwitchMode,
    pub seconds_per_switch: f32,
    pub beats_per_switch: u32,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            default_effect: Some("kaleidoscope".to_string()),
            transition: Duration::from_secs(2),
            switch_mode: SwitchMode::Time,
            seconds_per_switch: 20.0,
            beats_per_switch: 16,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OverlaySettings {
    pub enabled: bool,
    pub messages_file: Option<PathBuf>,
    pub interval: Duration,
    pub duration: Duration,
}

impl Default for OverlaySettings {
    fn default() -> Self {
        Self {
            enabled: true,
            messages_file: None,
            interval: Duration::from_secs(10),
            duration: Duration::from_secs(5),
        }
    }
}

impl Config {
    pub fn audio_settings(&self) -> AudioSettings {
        AudioSettings {
            sample_rate_hz: self.sample_rate.max(1),
            chunk_size: self.chunk_size.max(16),
            channels: self.channels.max(1),
            beat_threshold: self.beat_threshold.max(1.0),
            beat_min_interval: secs(self.beat_min_interval),
        }
    }

    pub fn video_settings(&self) -> VideoSettings {
        VideoSettings {
            width: self.width.max(1),
            height: self.height.max(1),
            fps: self.fps.clamp(1, 240),
        }
    }

    pub fn engine_settings(&self) -> EngineSettings {
        let name = self.effect.trim();
        EngineSettings {
            default_effect: (!name.is_empty()).then(|| name.to_string()),
            transition: secs(self.transition_secs),
            switch_mode: self.switch,
            seconds_per_switch: self.seconds_per_switch.max(1.0),
            beats_per_switch: self.beats_per_switch.max(1),
        }
    }

    pub fn overlay_settings(&self) -> OverlaySettings {
        OverlaySettings {
            enabled: self.messages,
            messages_file: self.messages_file.clone(),
            interval: secs(self.message_interval),
            duration: secs(self.message_duration),
        }
    }

    pub fn log_filter(&self) -> &str {
        if self.debug { "debug" } else { self.log_level.as_str() }
    }
}

fn secs(v: f32) -> Duration {
    Duration::from_secs_f32(if v.is_finite() { v.max(0.0) } else { 0.0 })
}
