use beatfx::audio::{AudioFeatures, FeatureExtractor, BAND_COUNT};
use beatfx::config::AudioSettings;
use std::f32::consts::PI;
use std::sync::Arc;
use std::time::{Duration, Instant};

const SR: f32 = 44_100.0;
const CHUNK: usize = 4_410;

fn sine(freq: f32, amp: f32, n: usize) -> Vec<f32> {
    (0..n)
        .map(|i| (2.0 * PI * freq * i as f32 / SR).sin() * amp)
        .collect()
}

fn extractor() -> FeatureExtractor {
    FeatureExtractor::new(&AudioSettings::default())
}

/// Every fifth 100 ms chunk is a 1 kHz burst, the rest silence: 120 BPM.
fn burst_chunk(i: usize) -> Vec<f32> {
    if i % 5 == 0 {
        sine(1_000.0, 0.8, CHUNK)
    } else {
        vec![0.0; CHUNK]
    }
}

// ── Volume ──────────────────────────────────────────────────────────────────

#[test]
fn silence_has_zero_volume_and_no_beat() {
    let mut fx = extractor();
    let start = Instant::now();
    for i in 0..20 {
        let f = fx.push_audio_chunk_f32(&vec![0.0; CHUNK], start + Duration::from_millis(100 * i));
        assert_eq!(f.volume, 0.0);
        assert!(!f.beat, "silence must never beat (chunk {i})");
    }
}

#[test]
fn full_scale_sine_volume_is_rms() {
    let mut fx = extractor();
    let f = fx.push_audio_chunk_f32(&sine(1_000.0, 1.0, CHUNK), Instant::now());
    assert!(
        (f.volume - std::f32::consts::FRAC_1_SQRT_2).abs() < 0.01,
        "volume {} should be ~0.707",
        f.volume
    );
}

#[test]
fn i16_path_normalises_samples() {
    let mut fx = extractor();
    let pcm = vec![i16::MIN; 512];
    let f = fx.push_audio_chunk(&pcm, Instant::now());
    assert!((f.volume - 1.0).abs() < 1e-3, "volume {}", f.volume);
    assert!(f.samples.iter().all(|&s| (s + 1.0).abs() < 1e-6));
}

#[test]
fn empty_chunk_keeps_previous_features() {
    let mut fx = extractor();
    let now = Instant::now();
    let before = fx.push_audio_chunk_f32(&sine(440.0, 0.5, CHUNK), now).clone();
    let after = fx.push_audio_chunk_f32(&[], now + Duration::from_millis(100)).clone();
    assert_eq!(before.volume, after.volume);
    assert_eq!(before.bands, after.bands);
    assert_eq!(before.samples.len(), after.samples.len());
}

// ── Beats ───────────────────────────────────────────────────────────────────

#[test]
fn no_beat_before_ten_chunks_of_history() {
    let mut fx = extractor();
    let start = Instant::now();
    for i in 0..9u64 {
        let chunk = if i == 8 { sine(1_000.0, 0.9, CHUNK) } else { vec![0.001; CHUNK] };
        let f = fx.push_audio_chunk_f32(&chunk, start + Duration::from_millis(100 * i));
        assert!(!f.beat, "beat reported with only {} chunks of history", i + 1);
    }
}

#[test]
fn loud_chunk_after_quiet_history_is_a_beat() {
    let mut fx = extractor();
    let start = Instant::now();
    for i in 0..10u64 {
        fx.push_audio_chunk_f32(&vec![0.01; CHUNK], start + Duration::from_millis(100 * i));
    }
    let f = fx.push_audio_chunk_f32(&sine(1_000.0, 0.8, CHUNK), start + Duration::from_millis(1_000));
    assert!(f.beat, "volume {} over a 0.01 floor should beat", f.volume);
}

#[test]
fn beats_closer_than_min_interval_are_suppressed() {
    let mut fx = extractor();
    let start = Instant::now();
    for i in 0..10u64 {
        fx.push_audio_chunk_f32(&vec![0.01; CHUNK], start + Duration::from_millis(100 * i));
    }
    let first = fx
        .push_audio_chunk_f32(&sine(1_000.0, 0.8, CHUNK), start + Duration::from_millis(1_000))
        .beat;
    let second = fx
        .push_audio_chunk_f32(&sine(1_000.0, 0.9, CHUNK), start + Duration::from_millis(1_050))
        .beat;
    assert!(first);
    assert!(!second, "a second beat 50 ms later must be debounced");
}

#[test]
fn burst_train_at_120_bpm_reports_beats_and_tempo() {
    let mut fx = extractor();
    let start = Instant::now();
    let mut beat_times = Vec::new();
    let mut last = AudioFeatures::default();
    for i in 0..60usize {
        let now = start + Duration::from_millis(100 * i as u64);
        let f = fx.push_audio_chunk_f32(&burst_chunk(i), now);
        if f.beat {
            beat_times.push(i as f32 * 0.1);
        }
        last = f.clone();
    }

    assert!(beat_times.len() >= 5, "expected regular beats, got {beat_times:?}");
    for pair in beat_times.windows(2) {
        assert!(
            (pair[1] - pair[0] - 0.5).abs() < 0.05,
            "beats should be 0.5 s apart: {beat_times:?}"
        );
    }
    assert!(
        (last.bpm - 120.0).abs() <= 10.0,
        "bpm {} should be near 120",
        last.bpm
    );
}

#[test]
fn bpm_stays_zero_until_five_beats() {
    let mut fx = extractor();
    let start = Instant::now();
    let mut beats = 0;
    for i in 0..60usize {
        let f = fx.push_audio_chunk_f32(&burst_chunk(i), start + Duration::from_millis(100 * i as u64));
        if f.beat {
            beats += 1;
        }
        if beats < 5 {
            assert_eq!(f.bpm, 0.0, "bpm reported after only {beats} beats");
        }
    }
    assert!(beats >= 5);
}

/// Ten quiet chunks of history, then one loud chunk per beat time, each preceded by three quiet
/// chunks. Beat `k` lands `intervals[..k]` seconds after 1 s. Returns the beat flag of every loud
/// chunk and the features after the last one.
fn beat_train(intervals: &[f64]) -> (Vec<bool>, AudioFeatures) {
    let mut fx = extractor();
    let start = Instant::now();
    let quiet = vec![0.01f32; CHUNK];
    let loud = sine(1_000.0, 0.8, CHUNK);
    for i in 0..10u64 {
        fx.push_audio_chunk_f32(&quiet, start + Duration::from_millis(100 * i));
    }

    let mut t = 1.0;
    let mut flags = Vec::new();
    let mut last = AudioFeatures::default();
    for k in 0..=intervals.len() {
        if k > 0 {
            t += intervals[k - 1];
        }
        for j in (1..=3).rev() {
            fx.push_audio_chunk_f32(&quiet, start + Duration::from_secs_f64(t - 0.02 * j as f64));
        }
        let f = fx.push_audio_chunk_f32(&loud, start + Duration::from_secs_f64(t));
        flags.push(f.beat);
        last = f.clone();
    }
    (flags, last)
}

#[test]
fn bpm_is_sixty_over_mean_interval() {
    let intervals = [0.4, 0.5, 0.6, 0.7];
    let (flags, last) = beat_train(&intervals);
    assert!(flags.iter().all(|&b| b), "every loud chunk should beat: {flags:?}");

    let mean = intervals.iter().sum::<f64>() / intervals.len() as f64;
    let expected = (60.0 / mean) as f32;
    assert!(
        (last.bpm - expected).abs() < 1e-3,
        "bpm {} should be {expected}",
        last.bpm
    );
}

#[test]
fn bpm_uses_only_the_last_twenty_beats() {
    // Six fast intervals, then nineteen slow ones: the last 20 beats are all 0.6 s apart.
    let mut intervals = vec![0.25; 6];
    intervals.extend([0.6; 19]);
    let (flags, last) = beat_train(&intervals);
    assert_eq!(flags.len(), 26);
    assert!(flags.iter().all(|&b| b), "every loud chunk should beat: {flags:?}");
    assert!(
        (last.bpm - 100.0).abs() < 1e-3,
        "bpm {} should ignore the older fast beats",
        last.bpm
    );
}

#[test]
fn oscillating_energy_beats_at_most_once_per_min_interval() {
    let min_interval = AudioSettings::default().beat_min_interval;
    // Half-periods of 20, 30 and 45 ms: every full period is shorter than the debounce.
    for half_ms in [20u64, 30, 45] {
        let mut fx = extractor();
        let start = Instant::now();
        let mut beats = Vec::new();
        for i in 0..200u64 {
            let level: f32 = if i % 2 == 0 { 0.1 } else { 1.0 };
            let at = Duration::from_millis(half_ms * i);
            if fx.push_audio_chunk_f32(&vec![level; CHUNK], start + at).beat {
                beats.push(at);
            }
        }

        assert!(beats.len() >= 10, "half-period {half_ms} ms: too few beats {beats:?}");
        for pair in beats.windows(2) {
            assert!(
                pair[1] - pair[0] > min_interval,
                "half-period {half_ms} ms: beats {:?} and {:?} closer than {min_interval:?}",
                pair[0],
                pair[1]
            );
        }
    }
}

// ── Spectrum ────────────────────────────────────────────────────────────────

#[test]
fn low_tone_lands_in_low_band() {
    let mut fx = extractor();
    let f = fx.push_audio_chunk_f32(&sine(200.0, 0.8, 1024), Instant::now());
    let levels = f.band_levels();
    let loudest = levels
        .iter()
        .enumerate()
        .max_by(|a, b| a.1.total_cmp(b.1))
        .map(|(i, _)| i)
        .unwrap_or(usize::MAX);
    assert_eq!(loudest, 0, "200 Hz should dominate the first band: {levels:?}");
    assert!(f.bass() > f.high());
}

#[test]
fn band_levels_are_normalised() {
    let f = AudioFeatures {
        bands: [1e9; BAND_COUNT],
        samples: Arc::from(vec![0.0f32; 256]),
        ..AudioFeatures::default()
    };
    assert!(f.band_levels().iter().all(|&l| l == 1.0));
    assert!(AudioFeatures::default().band_levels().iter().all(|&l| l == 0.0));
}

#[test]
fn chunk_size_change_replans_fft() {
    let mut fx = extractor();
    let now = Instant::now();
    let a = fx.push_audio_chunk_f32(&sine(300.0, 0.5, 1024), now).bands;
    let b = fx
        .push_audio_chunk_f32(&sine(300.0, 0.5, 2048), now + Duration::from_millis(50))
        .bands;
    assert!(a.iter().any(|&v| v > 0.0));
    assert!(b.iter().any(|&v| v > 0.0));
}
