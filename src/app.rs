use crate::audio::AudioCapture;
use crate::config::{Config, SegmenterMode, VideoSource};
use crate::distortion::DistortionStage;
use crate::engine::EffectRegistry;
use crate::fx::{builtin_factories, EffectDeps};
use crate::logging::{self, LogConfig};
use crate::messages::{MessageBook, MessageOverlay};
use crate::pipeline::{EffectPipeline, PipelineSources};
use crate::render::{HalfBlockRenderer, View};
use crate::segmentation::{LumaKeySegmenter, NoSegmenter, Segmenter};
use crate::terminal::PreviewTerminal;
use crate::video::{BlankGrabber, FrameGrabber, TestPatternGrabber, VideoCapture};
use anyhow::Context;
use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};
use std::io::{self, Write};
use std::sync::Arc;
use std::time::{Duration, Instant};

const STOP_TIMEOUT: Duration = Duration::from_millis(500);
const FIRST_FRAME_TIMEOUT: Duration = Duration::from_secs(5);

pub fn run(cfg: Config) -> anyhow::Result<()> {
    logging::init(&LogConfig {
        level: cfg.log_filter().to_string(),
        // The preview owns stderr; log there only when headless.
        console: cfg.headless,
        file: cfg.log_file.clone(),
    })?;

    let grabber: Box<dyn FrameGrabber> = match cfg.video {
        VideoSource::Pattern => Box::new(TestPatternGrabber::new()),
        VideoSource::Blank => Box::new(BlankGrabber::new()),
    };
    let mut video = VideoCapture::start(grabber, cfg.video_settings()).context("start video capture")?;

    let mut audio = if cfg.no_audio {
        tracing::info!("audio disabled; effects see silence");
        None
    } else {
        Some(
            AudioCapture::start(&cfg.audio_settings(), cfg.device.as_deref())
                .with_context(|| format!("start audio capture (device={:?})", cfg.device))?,
        )
    };

    let sources = PipelineSources {
        frames: video.frames(),
        features: audio.as_ref().map(|a| a.features()).unwrap_or_default(),
    };
    let mut pipeline = build_pipeline(&cfg).with_sources(sources);

    let result = if cfg.headless {
        run_headless(&cfg, &mut pipeline)
    } else {
        run_preview(&cfg, &mut pipeline)
    };

    video.stop(STOP_TIMEOUT);
    if let Some(a) = audio.as_mut() {
        a.stop(STOP_TIMEOUT);
    }
    tracing::info!(frames = pipeline.frames_processed(), "stopped");
    result
}

/// Wires segmentation, the effect catalog, distortion and the message overlay from `cfg`.
pub fn build_pipeline(cfg: &Config) -> EffectPipeline {
    let segmenter: Arc<dyn Segmenter> = match cfg.segmenter {
        SegmenterMode::None => Arc::new(NoSegmenter),
        SegmenterMode::Luma => Arc::new(LumaKeySegmenter::default()),
    };
    let deps = EffectDeps { segmenter, seed: None };
    let registry = EffectRegistry::load(&builtin_factories(), &deps, &cfg.engine_settings());

    let overlay_settings = cfg.overlay_settings();
    let book = MessageBook::load(overlay_settings.messages_file.as_deref());
    let mut overlay = MessageOverlay::new(book, overlay_settings.interval, overlay_settings.duration);
    overlay.set_enabled(overlay_settings.enabled);

    EffectPipeline::new(registry, DistortionStage::new(cfg.distortion)).with_overlay(overlay)
}

pub fn list_effects() -> anyhow::Result<()> {
    let mut out = io::stdout();
    writeln!(out, "Effects:")?;
    for (name, _) in builtin_factories() {
        writeln!(out, "  - {name}")?;
    }
    Ok(())
}

fn run_headless(cfg: &Config, pipeline: &mut EffectPipeline) -> anyhow::Result<()> {
    let interval = cfg.video_settings().frame_interval();
    let start = Instant::now();
    let mut next_tick = start;
    let mut produced = 0u64;
    let mut luma_sum = 0.0f64;

    while produced < cfg.frames {
        let now = Instant::now();
        match pipeline.tick(now) {
            Some(frame) => {
                produced += 1;
                let luma = frame.luma();
                luma_sum += luma.iter().map(|&v| v as f64).sum::<f64>() / luma.len().max(1) as f64;
                if produced % (cfg.fps.max(1) as u64 * 5) == 0 {
                    tracing::info!(
                        frames = produced,
                        effect = pipeline.current_effect().unwrap_or("none"),
                        "progress"
                    );
                }
            }
            None if now.duration_since(start) > FIRST_FRAME_TIMEOUT => {
                anyhow::bail!("no video frames after {:?}", FIRST_FRAME_TIMEOUT);
            }
            None => {}
        }
        next_tick += interval;
        let now = Instant::now();
        if next_tick > now {
            std::thread::sleep(next_tick - now);
        } else {
            next_tick = now;
        }
    }

    let elapsed = start.elapsed().as_secs_f32();
    tracing::info!(
        frames = produced,
        secs = elapsed,
        fps = produced as f32 / elapsed.max(1e-3),
        mean_luma = luma_sum / produced.max(1) as f64,
        effect = pipeline.current_effect().unwrap_or("none"),
        "headless run finished"
    );
    Ok(())
}

struct UiState {
    show_hud: bool,
    show_help: bool,
}

fn run_preview(cfg: &Config, pipeline: &mut EffectPipeline) -> anyhow::Result<()> {
    let mut term = PreviewTerminal::enter()?;
    let mut renderer = HalfBlockRenderer::new();
    let mut ui = UiState {
        show_hud: true,
        show_help: false,
    };
    let mut fps = FpsCounter::new(Instant::now());
    let target = cfg.video_settings().frame_interval();

    loop {
        let now = Instant::now();

        while event::poll(Duration::from_millis(0))? {
            if let Event::Key(k) = event::read()? {
                if k.kind != KeyEventKind::Release && handle_key(k.code, k.modifiers, pipeline, &mut ui, now) {
                    return Ok(());
                }
            }
        }

        let layout = term.layout(ui.show_hud)?;

        if let Some(frame) = pipeline.tick(now) {
            let image = frame.resized(layout.px_w, layout.px_h);
            let hud = if ui.show_hud { hud_text(pipeline, fps.fps()) } else { String::new() };
            let view = View {
                term_cols: layout.cols,
                term_rows: layout.rows,
                visual_rows: layout.visual_rows,
                image: &image,
                hud: &hud,
                hud_rows: layout.hud_rows,
                popup: ui.show_help.then_some(HELP_TEXT),
                sync_updates: cfg.sync_updates,
            };
            renderer.render(&view, term.out())?;
            fps.tick(Instant::now());
        }

        let elapsed = now.elapsed();
        if elapsed < target {
            std::thread::sleep(target - elapsed);
        }
    }
}

/// Returns true to quit.
fn handle_key(code: KeyCode, mods: KeyModifiers, pipeline: &mut EffectPipeline, ui: &mut UiState, now: Instant) -> bool {
    if mods.contains(KeyModifiers::CONTROL) && matches!(code, KeyCode::Char('c')) {
        return true;
    }
    match code {
        KeyCode::Esc | KeyCode::Char('q') | KeyCode::Char('Q') => return true,
        KeyCode::Char(' ') => {
            pipeline.switch_to_random(now);
        }
        KeyCode::Left => {
            pipeline.step_effect(-1, now);
        }
        KeyCode::Right => {
            pipeline.step_effect(1, now);
        }
        KeyCode::Char('+') | KeyCode::Char('=') => {
            pipeline.set_distortion_level(pipeline.distortion_level() + 10.0);
        }
        KeyCode::Char('-') | KeyCode::Char('_') => {
            pipeline.set_distortion_level(pipeline.distortion_level() - 10.0);
        }
        KeyCode::Char('a') | KeyCode::Char('A') => {
            let on = !pipeline.auto_switch();
            pipeline.set_auto_switch(on);
        }
        KeyCode::Char('m') | KeyCode::Char('M') => {
            let on = !pipeline.messages_enabled();
            pipeline.set_messages_enabled(on);
        }
        KeyCode::Char('x') | KeyCode::Char('X') => toggle_following_effect(pipeline),
        KeyCode::Char('i') | KeyCode::Char('I') => ui.show_hud = !ui.show_hud,
        KeyCode::Char('h') | KeyCode::Char('H') | KeyCode::Char('?') | KeyCode::F(1) => {
            ui.show_help = !ui.show_help;
        }
        _ => {}
    }
    false
}

/// Flips the enabled flag of the effect after the current one in catalog order.
fn toggle_following_effect(pipeline: &mut EffectPipeline) {
    let names = pipeline.effect_names();
    let Some(pos) = pipeline
        .current_effect()
        .and_then(|cur| names.iter().position(|n| *n == cur))
    else {
        return;
    };
    let name = names[(pos + 1) % names.len()].to_string();
    if pipeline.is_enabled(&name) {
        if !pipeline.disable(&name) {
            tracing::debug!(effect = %name, "cannot disable the active effect");
        }
    } else {
        pipeline.enable(&name);
    }
}

fn hud_text(pipeline: &EffectPipeline, fps: f32) -> String {
    let effect = pipeline.current_effect().unwrap_or("none");
    let transition = match pipeline.transition_target() {
        Some(to) => format!(" -> {to} ({:>3.0}%)", pipeline.transition_progress() * 100.0),
        None => String::new(),
    };
    let auto = if pipeline.auto_switch() {
        format!("{:?}", pipeline.switch_mode()).to_lowercase()
    } else {
        "off".to_string()
    };
    let enabled = pipeline.effect_states().iter().filter(|s| s.enabled).count();
    format!(
        "Effect: {effect}{transition} | Auto: {auto} | Enabled: {enabled}/{} | Distortion: {:.0} ({}) | Msgs: {} | FPS: {fps:>4.1}\n\
Keys: space random | <-/-> prev/next | +/- distortion | a auto | m messages | x toggle next | i HUD | h help | q quit",
        pipeline.effect_names().len(),
        pipeline.distortion_level(),
        pipeline.distortion().kind().label(),
        if pipeline.messages_enabled() { "on" } else { "off" },
    )
}

const HELP_TEXT: &str = "beatfx keys\n\
space  random effect\n\
<- / ->  previous / next enabled effect\n\
+ / -  distortion level up / down by 10\n\
a  toggle auto-switch\n\
m  toggle messages\n\
x  disable / enable the effect after the current one\n\
i  show / hide HUD\n\
h or ?  toggle this help\n\
q or esc  quit";

struct FpsCounter {
    last: Instant,
    frames: u32,
    fps: f32,
}

impl FpsCounter {
    fn new(now: Instant) -> Self {
        Self {
            last: now,
            frames: 0,
            fps: 0.0,
        }
    }

    fn tick(&mut self, now: Instant) {
        self.frames += 1;
        let dt = now.duration_since(self.last).as_secs_f32();
        if dt >= 0.5 {
            self.fps = self.frames as f32 / dt;
            self.frames = 0;
            self.last = now;
        }
    }

    fn fps(&self) -> f32 {
        self.fps
    }
}
