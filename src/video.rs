use crate::config::VideoSettings;
use crate::error::DeviceError;
use crate::frame::Frame;
use crate::shared::{join_with_timeout, LatestCell};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// A camera-like frame producer driven by `VideoCapture`'s thread.
pub trait FrameGrabber: Send {
    fn name(&self) -> &str;

    /// Called once before the capture loop; an error here aborts `VideoCapture::start`.
    fn open(&mut self, settings: &VideoSettings) -> anyhow::Result<()>;

    /// Produces the next frame. Errors are logged by the caller and retried.
    fn grab(&mut self, now: Instant) -> anyhow::Result<Frame>;
}

/// Animated gradient with a bright moving figure, so segmentation-driven effects have an anchor.
pub struct TestPatternGrabber {
    w: usize,
    h: usize,
    started: Option<Instant>,
}

impl TestPatternGrabber {
    pub fn new() -> Self {
        Self {
            w: 0,
            h: 0,
            started: None,
        }
    }

    pub fn render(w: usize, h: usize, t: f32) -> Frame {
        let mut f = Frame::new(w, h);
        if f.is_empty() {
            return f;
        }
        let wf = w as f32;
        let hf = h as f32;
        for y in 0..h {
            for x in 0..w {
                let u = x as f32 / wf;
                let v = y as f32 / hf;
                let r = (40.0 + 60.0 * (u * 3.0 + t * 0.7).sin().abs()) as u8;
                let g = (30.0 + 50.0 * (v * 2.0 - t * 0.5).cos().abs()) as u8;
                let b = (70.0 + 70.0 * ((u + v) * 2.5 + t * 0.3).sin().abs()) as u8;
                f.set_pixel(x, y, [r, g, b]);
            }
        }

        // Figure: head + torso, swaying left/right.
        let cx = wf * (0.5 + 0.22 * (t * 0.6).sin());
        let head_r = hf * 0.09;
        let head_y = hf * 0.32;
        f.fill_disc(cx, head_y, head_r, [235, 220, 205], 1.0);
        let torso_top = (head_y + head_r) as i32;
        let torso_bot = (hf * 0.95) as i32;
        let half_w = (wf * 0.08).max(1.0) as i32;
        for y in torso_top..torso_bot {
            for x in (cx as i32 - half_w)..(cx as i32 + half_w) {
                f.mix_pixel(x, y, [225, 225, 235], 1.0);
            }
        }
        f
    }
}

impl Default for TestPatternGrabber {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameGrabber for TestPatternGrabber {
    fn name(&self) -> &str {
        "test-pattern"
    }

    fn open(&mut self, settings: &VideoSettings) -> anyhow::Result<()> {
        if settings.width == 0 || settings.height == 0 {
            anyhow::bail!("invalid resolution {}x{}", settings.width, settings.height);
        }
        self.w = settings.width;
        self.h = settings.height;
        Ok(())
    }

    fn grab(&mut self, now: Instant) -> anyhow::Result<Frame> {
        let start = *self.started.get_or_insert(now);
        let t = now.saturating_duration_since(start).as_secs_f32();
        Ok(Self::render(self.w, self.h, t))
    }
}

/// Solid black frames.
pub struct BlankGrabber {
    w: usize,
    h: usize,
}

impl BlankGrabber {
    pub fn new() -> Self {
        Self { w: 0, h: 0 }
    }
}

impl Default for BlankGrabber {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameGrabber for BlankGrabber {
    fn name(&self) -> &str {
        "blank"
    }

    fn open(&mut self, settings: &VideoSettings) -> anyhow::Result<()> {
        self.w = settings.width;
        self.h = settings.height;
        Ok(())
    }

    fn grab(&mut self, _now: Instant) -> anyhow::Result<Frame> {
        Ok(Frame::new(self.w, self.h))
    }
}

/// Video producer thread: grabs at the configured rate and publishes into a `LatestCell`.
pub struct VideoCapture {
    stop: Arc<AtomicBool>,
    handle: Option<thread::JoinHandle<()>>,
    frames: Arc<LatestCell<Frame>>,
    pub settings: VideoSettings,
}

impl VideoCapture {
    pub fn start(mut grabber: Box<dyn FrameGrabber>, settings: VideoSettings) -> Result<Self, DeviceError> {
        grabber
            .open(&settings)
            .map_err(|e| DeviceError::VideoOpen(format!("{}: {e:#}", grabber.name())))?;

        let stop = Arc::new(AtomicBool::new(false));
        let frames = Arc::new(LatestCell::new());
        let stop_for_thread = Arc::clone(&stop);
        let frames_for_thread = Arc::clone(&frames);

        let name = grabber.name().to_string();
        let handle = thread::Builder::new()
            .name("video-capture".into())
            .spawn(move || capture_loop(grabber, settings, &stop_for_thread, &frames_for_thread))?;

        tracing::info!(
            source = %name,
            width = settings.width,
            height = settings.height,
            fps = settings.fps,
            "video capture started"
        );

        Ok(Self {
            stop,
            handle: Some(handle),
            frames,
            settings,
        })
    }

    pub fn frames(&self) -> Arc<LatestCell<Frame>> {
        Arc::clone(&self.frames)
    }

    pub fn latest_frame(&self) -> Option<Frame> {
        self.frames.latest()
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Signals the capture thread to exit and waits up to `timeout` for it.
    pub fn stop(&mut self, timeout: Duration) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(h) = self.handle.take() {
            join_with_timeout(h, timeout, "video-capture");
        }
    }
}

impl Drop for VideoCapture {
    fn drop(&mut self) {
        self.stop(Duration::from_millis(500));
    }
}

fn capture_loop(
    mut grabber: Box<dyn FrameGrabber>,
    settings: VideoSettings,
    stop: &AtomicBool,
    frames: &LatestCell<Frame>,
) {
    let interval = settings.frame_interval();
    let mut next_due = Instant::now();
    let mut failures = 0u32;

    while !stop.load(Ordering::Relaxed) {
        let now = Instant::now();
        if now < next_due {
            thread::sleep((next_due - now).min(Duration::from_millis(5)));
            continue;
        }
        next_due += interval;
        // Don't try to catch up after a stall.
        if next_due < now {
            next_due = now + interval;
        }

        match grabber.grab(now) {
            Ok(frame) => {
                failures = 0;
                let frame = if frame.width() != settings.width || frame.height() != settings.height {
                    frame.resized(settings.width, settings.height)
                } else {
                    frame
                };
                frames.publish(frame);
            }
            Err(err) => {
                failures = failures.saturating_add(1);
                if failures == 1 || failures % 100 == 0 {
                    tracing::warn!(failures, "frame grab failed: {err:#}");
                }
                thread::sleep(Duration::from_millis(10));
            }
        }
    }
    tracing::debug!("video capture stopped");
}
