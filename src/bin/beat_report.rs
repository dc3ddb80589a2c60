use std::f32::consts::PI;
use std::time::{Duration, Instant};

use anyhow::Result;
use beatfx::audio::FeatureExtractor;
use beatfx::config::AudioSettings;
use clap::{Parser, ValueEnum};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Signal {
    /// Decaying low thump plus a click, like a kick drum.
    Pulse,
    /// 100 ms bursts of a 1 kHz sine separated by silence.
    Burst,
}

/// Feeds a synthetic beat train through the feature extractor and reports what it detects.
#[derive(Parser, Debug)]
#[command(name = "beat_report")]
struct Args {
    #[arg(long, default_value_t = 120.0)]
    bpm: f32,

    #[arg(long, default_value_t = 10.0)]
    seconds: f32,

    #[arg(long, value_enum, default_value_t = Signal::Pulse)]
    signal: Signal,

    #[arg(long, default_value_t = 44_100)]
    sample_rate: u32,

    #[arg(long, default_value_t = 1024)]
    chunk_size: usize,

    #[arg(long, default_value_t = 1.3)]
    beat_threshold: f32,
}

fn main() -> Result<()> {
    let args = Args::parse();
    let sr = args.sample_rate.clamp(8_000, 192_000);
    let chunk = args.chunk_size.max(16);
    let period = 60.0 / args.bpm.clamp(20.0, 400.0);

    let samples = match args.signal {
        Signal::Pulse => pulse_train(sr, args.seconds, period),
        Signal::Burst => burst_train(sr, args.seconds, period),
    };

    let settings = AudioSettings {
        sample_rate_hz: sr,
        chunk_size: chunk,
        beat_threshold: args.beat_threshold.max(1.0),
        ..AudioSettings::default()
    };
    let mut extractor = FeatureExtractor::new(&settings);
    let start = Instant::now();

    println!(
        "signal={:?} bpm={:.1} seconds={:.1} sample_rate={}Hz chunk={}",
        args.signal, args.bpm, args.seconds, sr, chunk
    );
    let mut beats = 0usize;
    for (i, block) in samples.chunks(chunk).enumerate() {
        let t = (i * chunk) as f64 / sr as f64;
        let now = start + Duration::from_secs_f64(t);
        let f = extractor.push_audio_chunk(block, now);
        if f.beat {
            beats += 1;
            println!("beat {:>3} at {:>7.3}s  volume={:.3}  bpm={:.1}", beats, t, f.volume, f.bpm);
        }
    }

    let f = extractor.current_features();
    println!("detected {} beats; final bpm={:.1} (expected {:.1})", beats, f.bpm, args.bpm);
    Ok(())
}

fn pulse_train(sr: u32, seconds: f32, period: f32) -> Vec<i16> {
    let n = (seconds.max(0.0) * sr as f32) as usize;
    (0..n)
        .map(|i| {
            let t = i as f32 / sr as f32;
            let local = t % period;
            let hit = 0.03;
            if local >= hit {
                return 0;
            }
            let env = (1.0 - local / hit).powf(2.4);
            let low = (2.0 * PI * 60.0 * local).sin() * 0.9;
            let click = (2.0 * PI * 2_200.0 * local).sin() * 0.35;
            to_i16((low + click) * env)
        })
        .collect()
}

fn burst_train(sr: u32, seconds: f32, period: f32) -> Vec<i16> {
    let n = (seconds.max(0.0) * sr as f32) as usize;
    (0..n)
        .map(|i| {
            let t = i as f32 / sr as f32;
            if t % period < 0.1 {
                to_i16((2.0 * PI * 1_000.0 * t).sin() * 0.8)
            } else {
                0
            }
        })
        .collect()
}

fn to_i16(x: f32) -> i16 {
    (x.clamp(-1.0, 1.0) * i16::MAX as f32) as i16
}
