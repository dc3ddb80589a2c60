use crate::config::AudioSettings;
use crate::error::DeviceError;
use crate::shared::{join_with_timeout, LatestCell};
use anyhow::Context;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Sample, SampleFormat};
use ringbuf::HeapRb;
use ringbuf::traits::{Consumer as _, Producer as _, Split as _};
use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner, Length};
use std::collections::VecDeque;
use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

pub const BAND_COUNT: usize = 8;
const ENERGY_HISTORY: usize = 30;
const BEAT_HISTORY: usize = 20;
const MIN_ENERGY_FOR_BEATS: usize = 10;
const MIN_BEATS_FOR_BPM: usize = 5;

/// Per-chunk feature bundle. Cheap to clone; the sample buffer is shared.
#[derive(Debug, Clone)]
pub struct AudioFeatures {
    pub beat: bool,
    /// RMS of the normalised chunk, in [0, 1].
    pub volume: f32,
    pub bpm: f32,
    /// Mean FFT magnitude over 8 equal slices of the lowest quarter of the spectrum.
    pub bands: [f32; BAND_COUNT],
    pub samples: Arc<[f32]>,
}

impl Default for AudioFeatures {
    fn default() -> Self {
        Self {
            beat: false,
            volume: 0.0,
            bpm: 0.0,
            bands: [0.0; BAND_COUNT],
            samples: Arc::from(Vec::new()),
        }
    }
}

impl AudioFeatures {
    /// Bands scaled so a full-scale sine in a band reads ~1.0, clamped to [0, 1].
    pub fn band_levels(&self) -> [f32; BAND_COUNT] {
        let norm = (self.samples.len() as f32 * 0.5).max(1.0);
        self.bands.map(|b| (b / norm).clamp(0.0, 1.0))
    }

    pub fn bass(&self) -> f32 {
        let l = self.band_levels();
        (l[0] + l[1]) * 0.5
    }

    pub fn mid(&self) -> f32 {
        let l = self.band_levels();
        (l[2] + l[3] + l[4]) * (1.0 / 3.0)
    }

    pub fn high(&self) -> f32 {
        let l = self.band_levels();
        (l[5] + l[6] + l[7]) * (1.0 / 3.0)
    }
}

/// Turns fixed-size mono chunks into `AudioFeatures`: RMS volume, adaptive-threshold beats,
/// BPM from recent beat spacing and a coarse low-frequency spectrum.
pub struct FeatureExtractor {
    base_threshold: f32,
    min_beat_interval: Duration,
    energy_history: VecDeque<f32>,
    beat_history: VecDeque<Instant>,
    last_beat: Option<Instant>,
    bpm: f32,
    planner: FftPlanner<f32>,
    fft: Option<Arc<dyn Fft<f32>>>,
    fft_buf: Vec<Complex<f32>>,
    current: AudioFeatures,
}

impl FeatureExtractor {
    pub fn new(settings: &AudioSettings) -> Self {
        Self {
            base_threshold: settings.beat_threshold,
            min_beat_interval: settings.beat_min_interval,
            energy_history: VecDeque::with_capacity(ENERGY_HISTORY),
            beat_history: VecDeque::with_capacity(BEAT_HISTORY),
            last_beat: None,
            bpm: 0.0,
            planner: FftPlanner::new(),
            fft: None,
            fft_buf: Vec::new(),
            current: AudioFeatures::default(),
        }
    }

    /// 16-bit PCM path.
    pub fn push_audio_chunk(&mut self, samples: &[i16], now: Instant) -> &AudioFeatures {
        let normalized = samples
            .iter()
            .map(|&s| s as f32 / 32768.0)
            .collect::<Vec<_>>();
        self.push_audio_chunk_f32(&normalized, now)
    }

    /// Already-normalised path. An empty chunk keeps the previous features.
    pub fn push_audio_chunk_f32(&mut self, samples: &[f32], now: Instant) -> &AudioFeatures {
        if samples.is_empty() {
            return &self.current;
        }

        let volume = rms(samples).clamp(0.0, 1.0);
        let beat = self.detect_beat(volume, now);
        if beat {
            if self.beat_history.len() == BEAT_HISTORY {
                self.beat_history.pop_front();
            }
            self.beat_history.push_back(now);
            self.last_beat = Some(now);
            self.bpm = estimate_bpm(&self.beat_history);
        }

        let bands = self.spectrum_bands(samples);
        self.current = AudioFeatures {
            beat,
            volume,
            bpm: self.bpm,
            bands,
            samples: Arc::from(samples),
        };
        &self.current
    }

    pub fn current_features(&self) -> AudioFeatures {
        self.current.clone()
    }

    fn detect_beat(&mut self, volume: f32, now: Instant) -> bool {
        if self.energy_history.len() == ENERGY_HISTORY {
            self.energy_history.pop_front();
        }
        self.energy_history.push_back(volume);

        let n = self.energy_history.len();
        if n < MIN_ENERGY_FOR_BEATS {
            return false;
        }

        let avg = mean(self.energy_history.iter().take(n - 1).copied());
        let std = std_dev(self.energy_history.iter().take(n - 3).copied());
        let threshold = self.base_threshold.max(1.0 + 0.5 * std);

        let debounced = match self.last_beat {
            Some(t) => now.saturating_duration_since(t) > self.min_beat_interval,
            None => true,
        };

        let beat = volume > avg * threshold && debounced;
        if beat {
            tracing::trace!(volume, avg, threshold, "beat");
        }
        beat
    }

    fn spectrum_bands(&mut self, samples: &[f32]) -> [f32; BAND_COUNT] {
        let n = samples.len();
        let fft = match &self.fft {
            Some(f) if f.len() == n => Arc::clone(f),
            _ => {
                let f = self.planner.plan_fft_forward(n);
                self.fft = Some(Arc::clone(&f));
                f
            }
        };

        self.fft_buf.clear();
        self.fft_buf
            .extend(samples.iter().map(|&s| Complex { re: s, im: 0.0 }));
        fft.process(&mut self.fft_buf);

        // Real-input spectrum has n/2+1 unique bins; keep the lowest quarter of those.
        let unique = n / 2 + 1;
        let low = unique / 4;
        let mags = self.fft_buf[..low]
            .iter()
            .map(|c| (c.re * c.re + c.im * c.im).sqrt())
            .collect::<Vec<_>>();
        split_means(&mags)
    }
}

/// Splits into `BAND_COUNT` contiguous parts, the first `len % BAND_COUNT` one longer,
/// and averages each. Empty parts read 0.
fn split_means(values: &[f32]) -> [f32; BAND_COUNT] {
    let base = values.len() / BAND_COUNT;
    let extra = values.len() % BAND_COUNT;
    let mut out = [0.0f32; BAND_COUNT];
    let mut start = 0usize;
    for (i, band) in out.iter_mut().enumerate() {
        let len = base + usize::from(i < extra);
        if len > 0 {
            *band = values[start..start + len].iter().sum::<f32>() / len as f32;
        }
        start += len;
    }
    out
}

fn rms(samples: &[f32]) -> f32 {
    let acc = samples.iter().map(|s| s * s).sum::<f32>();
    (acc / samples.len().max(1) as f32).sqrt()
}

fn mean(values: impl Iterator<Item = f32>) -> f32 {
    let mut sum = 0.0f32;
    let mut n = 0usize;
    for v in values {
        sum += v;
        n += 1;
    }
    if n == 0 { 0.0 } else { sum / n as f32 }
}

fn std_dev(values: impl Iterator<Item = f32> + Clone) -> f32 {
    let m = mean(values.clone());
    let var = mean(values.map(|v| (v - m) * (v - m)));
    var.sqrt()
}

fn estimate_bpm(beats: &VecDeque<Instant>) -> f32 {
    if beats.len() < MIN_BEATS_FOR_BPM {
        return 0.0;
    }
    let intervals = beats
        .iter()
        .zip(beats.iter().skip(1))
        .map(|(a, b)| b.saturating_duration_since(*a).as_secs_f32());
    let avg = mean(intervals);
    if avg > 0.0 { 60.0 / avg } else { 0.0 }
}

pub fn list_input_devices() -> anyhow::Result<()> {
    let host = cpal::default_host();
    let devices = host
        .input_devices()
        .context("enumerate input devices")?;

    let mut out = io::stdout();
    writeln!(out, "Input devices:")?;
    for dev in devices {
        let name = dev.name().unwrap_or_else(|_| "<unknown>".to_string());
        writeln!(out, "  - {}", name)?;
    }
    Ok(())
}

/// Microphone producer: cpal callback -> ring buffer -> analyser thread -> `LatestCell`.
pub struct AudioCapture {
    stream: Option<cpal::Stream>,
    stop: Arc<AtomicBool>,
    analyzer_handle: Option<thread::JoinHandle<()>>,
    features: Arc<LatestCell<AudioFeatures>>,
    pub sample_rate_hz: u32,
}

impl AudioCapture {
    pub fn start(settings: &AudioSettings, device_query: Option<&str>) -> Result<Self, DeviceError> {
        let host = cpal::default_host();
        let device = select_input_device(&host, device_query)?;
        let (config, sample_format) = pick_stream_config(&device, settings)?;
        let sample_rate_hz = config.sample_rate.0;
        let channels = config.channels as usize;

        let rb_capacity = (sample_rate_hz as usize).saturating_mul(4);
        let rb = HeapRb::<f32>::new(rb_capacity);
        let (mut prod, mut cons) = rb.split();

        let stop = Arc::new(AtomicBool::new(false));
        let features = Arc::new(LatestCell::with_value(AudioFeatures::default()));
        let features_for_thread = Arc::clone(&features);
        let stop_for_thread = Arc::clone(&stop);

        let err_fn = |err: cpal::StreamError| tracing::warn!(%err, "audio stream error");

        let stream = match sample_format {
            SampleFormat::F32 => device.build_input_stream(
                &config,
                move |data: &[f32], _| push_interleaved(data, channels, &mut prod),
                err_fn,
                None,
            ),
            SampleFormat::I16 => device.build_input_stream(
                &config,
                move |data: &[i16], _| push_interleaved(data, channels, &mut prod),
                err_fn,
                None,
            ),
            SampleFormat::U16 => device.build_input_stream(
                &config,
                move |data: &[u16], _| push_interleaved(data, channels, &mut prod),
                err_fn,
                None,
            ),
            fmt => return Err(DeviceError::UnsupportedFormat(format!("{fmt:?}"))),
        }
        .map_err(|e| DeviceError::Audio(e.to_string()))?;

        stream
            .play()
            .map_err(|e| DeviceError::Audio(e.to_string()))?;

        let mut extractor_settings = settings.clone();
        extractor_settings.sample_rate_hz = sample_rate_hz;
        let chunk_size = settings.chunk_size.max(16);
        let analyzer_handle = thread::Builder::new()
            .name("audio-analyzer".into())
            .spawn(move || {
                let mut extractor = FeatureExtractor::new(&extractor_settings);
                analyze_loop(
                    &mut cons,
                    chunk_size,
                    &mut extractor,
                    &stop_for_thread,
                    &features_for_thread,
                )
            })?;

        tracing::info!(sample_rate_hz, channels, chunk_size, "audio capture started");

        Ok(Self {
            stream: Some(stream),
            stop,
            analyzer_handle: Some(analyzer_handle),
            features,
            sample_rate_hz,
        })
    }

    pub fn features(&self) -> Arc<LatestCell<AudioFeatures>> {
        Arc::clone(&self.features)
    }

    pub fn latest_features(&self) -> AudioFeatures {
        self.features.latest().unwrap_or_default()
    }

    /// Signals the analyser to exit and waits up to `timeout` for it.
    pub fn stop(&mut self, timeout: Duration) {
        self.stop.store(true, Ordering::Relaxed);
        // Dropping the stream stops the device callback.
        self.stream = None;
        if let Some(h) = self.analyzer_handle.take() {
            join_with_timeout(h, timeout, "audio-analyzer");
        }
    }
}

impl Drop for AudioCapture {
    fn drop(&mut self) {
        self.stop(Duration::from_millis(500));
    }
}

fn select_input_device(
    host: &cpal::Host,
    device_query: Option<&str>,
) -> Result<cpal::Device, DeviceError> {
    let devices = host
        .input_devices()
        .map_err(|e| DeviceError::Audio(e.to_string()))?
        .collect::<Vec<_>>();

    let want = device_query.map(|s| s.to_lowercase());
    if let Some(want) = want.as_deref() {
        if let Some(dev) = devices.iter().find(|d| {
            d.name()
                .map(|n| n.to_lowercase().contains(want))
                .unwrap_or(false)
        }) {
            return Ok(dev.clone());
        }
        return Err(DeviceError::NoMatchingDevice(want.to_string()));
    }

    host.default_input_device()
        .ok_or(DeviceError::NoDefaultDevice)
}

/// Prefers a config with the requested rate and channel count; falls back to the device default.
fn pick_stream_config(
    device: &cpal::Device,
    settings: &AudioSettings,
) -> Result<(cpal::StreamConfig, SampleFormat), DeviceError> {
    let wanted_rate = cpal::SampleRate(settings.sample_rate_hz);
    if let Ok(ranges) = device.supported_input_configs() {
        for range in ranges {
            if range.channels() == settings.channels
                && range.min_sample_rate() <= wanted_rate
                && wanted_rate <= range.max_sample_rate()
            {
                let fmt = range.sample_format();
                return Ok((range.with_sample_rate(wanted_rate).into(), fmt));
            }
        }
    }

    let supported = device
        .default_input_config()
        .map_err(|e| DeviceError::Audio(e.to_string()))?;
    tracing::info!(
        requested_rate = settings.sample_rate_hz,
        requested_channels = settings.channels,
        rate = supported.sample_rate().0,
        channels = supported.channels(),
        "requested audio format unavailable; using device default"
    );
    let fmt = supported.sample_format();
    Ok((supported.into(), fmt))
}

fn push_interleaved<T: Sample<Float = f32> + Copy>(
    data: &[T],
    channels: usize,
    prod: &mut ringbuf::HeapProd<f32>,
) {
    let channels = channels.max(1);
    for frame in data.chunks(channels) {
        let mut acc = 0.0f32;
        for s in frame {
            acc += (*s).to_float_sample();
        }
        let mono = acc / channels as f32;
        let _ = prod.try_push(mono);
    }
}

fn analyze_loop(
    cons: &mut ringbuf::HeapCons<f32>,
    chunk_size: usize,
    extractor: &mut FeatureExtractor,
    stop: &AtomicBool,
    features: &LatestCell<AudioFeatures>,
) {
    let mut chunk = Vec::with_capacity(chunk_size);

    while !stop.load(Ordering::Relaxed) {
        let mut got_any = false;
        while let Some(s) = cons.try_pop() {
            got_any = true;
            chunk.push(s);
            if chunk.len() == chunk_size {
                let f = extractor.push_audio_chunk_f32(&chunk, Instant::now());
                features.publish(f.clone());
                chunk.clear();
            }
        }

        if !got_any {
            thread::sleep(Duration::from_millis(1));
        }
    }
    tracing::debug!("audio analyzer stopped");
}
