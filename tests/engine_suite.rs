use beatfx::audio::AudioFeatures;
use beatfx::config::{EngineSettings, SwitchMode};
use beatfx::engine::{Blend, EffectRegistry, TransitionEngine};
use beatfx::error::{EffectLoadError, RegistryError};
use beatfx::frame::Frame;
use beatfx::fx::{Effect, EffectCtx, EffectDeps, EffectFactory};
use std::time::{Duration, Instant};

const W: usize = 16;
const H: usize = 12;

struct Solid {
    name: &'static str,
    rgb: [u8; 3],
}

impl Effect for Solid {
    fn name(&self) -> &'static str {
        self.name
    }

    fn transform(&mut self, _ctx: &EffectCtx<'_>, frame: &Frame) -> Frame {
        Frame::filled(frame.width(), frame.height(), self.rgb)
    }
}

struct Panicky;

impl Effect for Panicky {
    fn name(&self) -> &'static str {
        "panicky"
    }

    fn transform(&mut self, _ctx: &EffectCtx<'_>, _frame: &Frame) -> Frame {
        panic!("effect blew up");
    }
}

struct Shrinker;

impl Effect for Shrinker {
    fn name(&self) -> &'static str {
        "shrinker"
    }

    fn transform(&mut self, _ctx: &EffectCtx<'_>, frame: &Frame) -> Frame {
        Frame::filled(frame.width() / 2, frame.height() / 2, [9, 9, 9])
    }
}

fn red(_: &EffectDeps) -> anyhow::Result<Box<dyn Effect>> {
    Ok(Box::new(Solid { name: "red", rgb: [255, 0, 0] }))
}

fn blue(_: &EffectDeps) -> anyhow::Result<Box<dyn Effect>> {
    Ok(Box::new(Solid { name: "blue", rgb: [0, 0, 255] }))
}

fn green(_: &EffectDeps) -> anyhow::Result<Box<dyn Effect>> {
    Ok(Box::new(Solid { name: "green", rgb: [0, 255, 0] }))
}

fn white(_: &EffectDeps) -> anyhow::Result<Box<dyn Effect>> {
    Ok(Box::new(Solid { name: "white", rgb: [255, 255, 255] }))
}

fn colors() -> Vec<(&'static str, EffectFactory)> {
    vec![("red", red), ("blue", blue), ("green", green), ("white", white)]
}

fn settings(default: &str, transition: Duration) -> EngineSettings {
    EngineSettings {
        default_effect: Some(default.to_string()),
        transition,
        switch_mode: SwitchMode::Manual,
        seconds_per_switch: 20.0,
        beats_per_switch: 16,
    }
}

fn seeded() -> EffectDeps {
    EffectDeps {
        seed: Some(1234),
        ..EffectDeps::default()
    }
}

fn input() -> Frame {
    Frame::filled(W, H, [10, 20, 30])
}

fn is_solid(f: &Frame, rgb: [u8; 3]) -> bool {
    f.data().chunks_exact(3).all(|px| px == rgb)
}

fn beat() -> AudioFeatures {
    AudioFeatures {
        beat: true,
        volume: 0.5,
        ..AudioFeatures::default()
    }
}

// ── TransitionEngine ────────────────────────────────────────────────────────

#[test]
fn transition_steps_from_crossfade_to_steady() {
    let mut tr = TransitionEngine::new(Some(0), Duration::from_secs(2));
    let t0 = Instant::now();
    assert_eq!(tr.step(t0), Some(Blend::Steady(0)));
    assert!(tr.begin(1, t0));
    assert!(tr.is_transitioning());

    match tr.step(t0 + Duration::from_millis(500)) {
        Some(Blend::Crossfade { from: 0, to: 1, t }) => assert!((t - 0.25).abs() < 1e-4, "t={t}"),
        other => panic!("expected crossfade, got {other:?}"),
    }
    assert_eq!(tr.step(t0 + Duration::from_secs(2)), Some(Blend::Steady(1)));
    assert_eq!(tr.current(), Some(1));
    assert!(!tr.is_transitioning());
    assert_eq!(tr.progress(), 1.0);
}

#[test]
fn transition_progress_never_exceeds_one() {
    let mut tr = TransitionEngine::new(Some(0), Duration::from_millis(100));
    let t0 = Instant::now();
    tr.begin(1, t0);
    tr.step(t0 + Duration::from_secs(30));
    assert_eq!(tr.progress(), 1.0);
    tr.step(t0 + Duration::from_secs(60));
    assert_eq!(tr.progress(), 1.0);
}

#[test]
fn zero_duration_transition_completes_on_next_step() {
    let mut tr = TransitionEngine::new(Some(0), Duration::ZERO);
    let t0 = Instant::now();
    tr.begin(2, t0);
    assert_eq!(tr.step(t0), Some(Blend::Steady(2)));
}

#[test]
fn rerequesting_running_target_keeps_its_window() {
    let mut tr = TransitionEngine::new(Some(0), Duration::from_secs(2));
    let t0 = Instant::now();
    assert!(tr.begin(1, t0));
    assert!(!tr.begin(1, t0 + Duration::from_secs(1)));
    // Still measured from t0, so finished at t0 + 2 s.
    assert_eq!(tr.step(t0 + Duration::from_secs(2)), Some(Blend::Steady(1)));
}

#[test]
fn requesting_current_cancels_transition() {
    let mut tr = TransitionEngine::new(Some(0), Duration::from_secs(2));
    let t0 = Instant::now();
    tr.begin(1, t0);
    assert!(!tr.begin(0, t0 + Duration::from_millis(200)));
    assert!(!tr.is_transitioning());
    assert_eq!(tr.step(t0 + Duration::from_secs(3)), Some(Blend::Steady(0)));
}

#[test]
fn empty_transition_engine_renders_nothing() {
    let mut tr = TransitionEngine::new(None, Duration::from_secs(1));
    assert_eq!(tr.step(Instant::now()), None);
}

// ── Registry: loading ───────────────────────────────────────────────────────

#[test]
fn load_skips_failing_panicking_and_duplicate_factories() {
    let factories: [(&'static str, EffectFactory); 5] = [
        ("red", red),
        ("broken", |_| Err(anyhow::anyhow!("model file missing"))),
        ("explodes", |_| panic!("constructor panicked")),
        ("red", blue),
        ("blue", blue),
    ];
    let reg = EffectRegistry::load(&factories, &seeded(), &settings("red", Duration::from_secs(1)));

    assert_eq!(reg.names(), vec!["red", "blue"]);
    let errs = reg.load_errors();
    assert_eq!(errs.len(), 3);
    assert!(matches!(&errs[0], EffectLoadError::Failed { name, reason } if name == "broken" && reason.contains("model file missing")));
    assert!(matches!(&errs[1], EffectLoadError::Panicked { name } if name == "explodes"));
    assert!(matches!(&errs[2], EffectLoadError::Duplicate { name } if name == "red"));
}

#[test]
fn duplicate_name_keeps_first_instance() {
    let factories: Vec<(&'static str, EffectFactory)> = vec![("red", red), ("red", blue)];
    let mut reg = EffectRegistry::load(&factories, &seeded(), &settings("red", Duration::ZERO));
    let out = reg.render(&input(), &AudioFeatures::default(), Instant::now());
    assert!(is_solid(&out, [255, 0, 0]));
}

#[test]
fn default_effect_is_selected_when_loaded() {
    let reg = EffectRegistry::load(&colors(), &seeded(), &settings("green", Duration::ZERO));
    assert_eq!(reg.current_name(), Some("green"));
}

#[test]
fn missing_default_falls_back_to_first_loaded() {
    let reg = EffectRegistry::load(&colors(), &seeded(), &settings("nonexistent", Duration::ZERO));
    assert_eq!(reg.current_name(), Some("red"));
}

#[test]
fn all_effects_start_enabled() {
    let reg = EffectRegistry::load(&colors(), &seeded(), &settings("red", Duration::ZERO));
    assert_eq!(reg.enabled_names(), reg.names());
    let states = reg.effect_states();
    assert_eq!(states.len(), 4);
    assert!(states.iter().all(|s| s.enabled));
    assert_eq!(states.iter().filter(|s| s.current).count(), 1);
}

#[test]
fn empty_registry_passes_frames_through() {
    let mut reg = EffectRegistry::load(&[], &seeded(), &settings("red", Duration::ZERO));
    assert!(reg.is_empty());
    assert_eq!(reg.current_name(), None);
    let now = Instant::now();
    assert_eq!(reg.render(&input(), &AudioFeatures::default(), now), input());
    assert_eq!(reg.set_current("red", now), Err(RegistryError::Empty));
    assert_eq!(reg.switch_to_random(now), None);
}

// ── Registry: selection ─────────────────────────────────────────────────────

#[test]
fn red_to_blue_crossfade_end_to_end() {
    let mut reg = EffectRegistry::load(&colors(), &seeded(), &settings("red", Duration::from_secs(2)));
    let feats = AudioFeatures::default();
    let t0 = Instant::now();

    assert!(is_solid(&reg.render(&input(), &feats, t0), [255, 0, 0]));
    reg.set_current("blue", t0).expect("blue is loaded");
    assert_eq!(reg.transition_target(), Some("blue"));

    let mid = reg.render(&input(), &feats, t0 + Duration::from_secs(1));
    assert!(is_solid(&mid, [127, 0, 127]), "midpoint pixel {:?}", mid.pixel(0, 0));
    assert_eq!(reg.current_name(), Some("red"));
    assert!((reg.transition_progress() - 0.5).abs() < 1e-4);

    let end = reg.render(&input(), &feats, t0 + Duration::from_secs(2));
    assert!(is_solid(&end, [0, 0, 255]));
    assert_eq!(reg.current_name(), Some("blue"));
    assert_eq!(reg.transition_target(), None);
    assert_eq!(reg.transition_progress(), 1.0);
}

#[test]
fn crossfade_start_matches_current_output() {
    let mut reg = EffectRegistry::load(&colors(), &seeded(), &settings("red", Duration::from_secs(2)));
    let t0 = Instant::now();
    reg.set_current("green", t0).expect("green is loaded");
    let out = reg.render(&input(), &AudioFeatures::default(), t0);
    assert!(is_solid(&out, [255, 0, 0]), "t=0 should be exactly the current effect");
}

#[test]
fn unknown_effect_is_rejected() {
    let mut reg = EffectRegistry::load(&colors(), &seeded(), &settings("red", Duration::ZERO));
    let err = reg.set_current("magenta", Instant::now()).unwrap_err();
    assert_eq!(err, RegistryError::UnknownEffect("magenta".to_string()));
    assert_eq!(reg.current_name(), Some("red"));
    assert_eq!(reg.transition_target(), None);
}

#[test]
fn selecting_disabled_effect_enables_it() {
    let mut reg = EffectRegistry::load(&colors(), &seeded(), &settings("red", Duration::ZERO));
    assert!(reg.disable("white"));
    assert!(!reg.is_enabled("white"));
    reg.set_current("white", Instant::now()).expect("white is loaded");
    assert!(reg.is_enabled("white"));
}

#[test]
fn current_effect_cannot_be_disabled() {
    let mut reg = EffectRegistry::load(&colors(), &seeded(), &settings("red", Duration::from_secs(2)));
    assert!(!reg.disable("red"));
    assert!(reg.is_enabled("red"));

    reg.set_current("blue", Instant::now()).expect("blue is loaded");
    assert!(!reg.disable("blue"), "the transition target must stay enabled");
    assert!(reg.disable("green"));
    assert!(!reg.disable("nonexistent"));
    assert!(!reg.enable("nonexistent"));
}

#[test]
fn random_switch_avoids_current_and_disabled() {
    let mut reg = EffectRegistry::load(&colors(), &seeded(), &settings("red", Duration::ZERO));
    assert!(reg.disable("white"));
    let feats = AudioFeatures::default();
    let mut now = Instant::now();

    for _ in 0..40 {
        let before = reg.current_name().map(str::to_string);
        let picked = reg.switch_to_random(now).expect("two other effects are enabled");
        assert_ne!(Some(picked.as_str()), before.as_deref());
        assert_ne!(picked, "white");
        reg.render(&input(), &feats, now);
        assert_eq!(reg.current_name(), Some(picked.as_str()));
        now += Duration::from_millis(10);
    }
}

#[test]
fn random_switch_with_single_enabled_effect_is_noop() {
    let mut reg = EffectRegistry::load(&colors(), &seeded(), &settings("red", Duration::ZERO));
    for name in ["blue", "green", "white"] {
        assert!(reg.disable(name));
    }
    assert_eq!(reg.switch_to_random(Instant::now()), None);
    assert_eq!(reg.transition_target(), None);
    assert_eq!(reg.current_name(), Some("red"));
}

#[test]
fn step_walks_enabled_effects_with_wraparound() {
    let mut reg = EffectRegistry::load(&colors(), &seeded(), &settings("red", Duration::ZERO));
    let feats = AudioFeatures::default();
    let now = Instant::now();
    assert!(reg.disable("green"));

    let step = |reg: &mut EffectRegistry, offset: isize| {
        let name = reg.step_by(offset, now);
        reg.render(&input(), &feats, now);
        name
    };
    assert_eq!(step(&mut reg, 1).as_deref(), Some("blue"));
    assert_eq!(step(&mut reg, 1).as_deref(), Some("white"));
    assert_eq!(step(&mut reg, 1).as_deref(), Some("red"));
    assert_eq!(step(&mut reg, -1).as_deref(), Some("white"));
    assert_eq!(step(&mut reg, -2).as_deref(), Some("red"));
}

// ── Registry: failure isolation ─────────────────────────────────────────────

#[test]
fn panicking_effect_falls_back_to_input() {
    let factories: Vec<(&'static str, EffectFactory)> =
        vec![("panicky", |_| Ok(Box::new(Panicky))), ("red", red)];
    let mut reg = EffectRegistry::load(&factories, &seeded(), &settings("panicky", Duration::ZERO));
    let now = Instant::now();
    for i in 0..3u64 {
        let out = reg.render(&input(), &AudioFeatures::default(), now + Duration::from_millis(i));
        assert_eq!(out, input(), "a panicking effect must not take the pipeline down");
    }
    reg.set_current("red", now).expect("red is loaded");
    let out = reg.render(&input(), &AudioFeatures::default(), now + Duration::from_millis(5));
    assert!(is_solid(&out, [255, 0, 0]));
}

#[test]
fn wrongly_sized_output_is_replaced_by_input() {
    let factories: Vec<(&'static str, EffectFactory)> = vec![("shrinker", |_| Ok(Box::new(Shrinker)))];
    let mut reg = EffectRegistry::load(&factories, &seeded(), &settings("shrinker", Duration::ZERO));
    let out = reg.render(&input(), &AudioFeatures::default(), Instant::now());
    assert_eq!(out, input());
}

// ── Registry: auto-switch ───────────────────────────────────────────────────

#[test]
fn time_auto_switch_fires_after_interval() {
    let mut s = settings("red", Duration::ZERO);
    s.switch_mode = SwitchMode::Time;
    s.seconds_per_switch = 1.0;
    let mut reg = EffectRegistry::load(&colors(), &seeded(), &s);
    assert!(reg.auto_switch());
    let feats = AudioFeatures::default();
    let t0 = Instant::now();

    reg.update_auto_switch(t0, &feats);
    reg.update_auto_switch(t0 + Duration::from_millis(900), &feats);
    assert_eq!(reg.transition_target(), None);

    reg.update_auto_switch(t0 + Duration::from_millis(1_500), &feats);
    let target = reg.transition_target().map(str::to_string);
    assert!(target.is_some(), "auto-switch should start a transition");
    assert_ne!(target.as_deref(), Some("red"));
}

#[test]
fn beat_auto_switch_counts_beats() {
    let mut s = settings("red", Duration::ZERO);
    s.switch_mode = SwitchMode::Beat;
    s.beats_per_switch = 4;
    let mut reg = EffectRegistry::load(&colors(), &seeded(), &s);
    let t0 = Instant::now();
    let quiet = AudioFeatures::default();

    for i in 0..3u64 {
        reg.update_auto_switch(t0 + Duration::from_millis(100 * i), &beat());
        reg.update_auto_switch(t0 + Duration::from_millis(100 * i + 50), &quiet);
    }
    assert_eq!(reg.transition_target(), None, "three beats are not enough");

    reg.update_auto_switch(t0 + Duration::from_millis(400), &beat());
    assert!(reg.transition_target().is_some(), "fourth beat should switch");
}

#[test]
fn manual_switch_does_not_delay_auto_timer() {
    let mut s = settings("red", Duration::ZERO);
    s.switch_mode = SwitchMode::Time;
    s.seconds_per_switch = 20.0;
    let mut reg = EffectRegistry::load(&colors(), &seeded(), &s);
    let feats = AudioFeatures::default();
    let t0 = Instant::now();
    let at = |ms: u64| t0 + Duration::from_millis(ms);

    reg.update_auto_switch(t0, &feats);
    reg.set_current("blue", at(19_000)).expect("blue is loaded");
    reg.render(&input(), &feats, at(19_000));
    assert_eq!(reg.current_name(), Some("blue"));

    reg.update_auto_switch(at(19_500), &feats);
    assert_eq!(reg.transition_target(), None, "interval has not elapsed since the start");

    reg.update_auto_switch(at(20_100), &feats);
    let target = reg.transition_target();
    assert!(target.is_some(), "auto-switch should fire 20 s after the last auto-switch");
    assert_ne!(target, Some("blue"));
}

#[test]
fn manual_switch_keeps_beat_count() {
    let mut s = settings("red", Duration::ZERO);
    s.switch_mode = SwitchMode::Beat;
    s.beats_per_switch = 4;
    let mut reg = EffectRegistry::load(&colors(), &seeded(), &s);
    let quiet = AudioFeatures::default();
    let t0 = Instant::now();

    for i in 0..3u64 {
        reg.update_auto_switch(t0 + Duration::from_millis(100 * i), &beat());
    }
    reg.set_current("blue", t0 + Duration::from_millis(300)).expect("blue is loaded");
    reg.render(&input(), &quiet, t0 + Duration::from_millis(300));
    assert_eq!(reg.transition_target(), None);

    reg.update_auto_switch(t0 + Duration::from_millis(400), &beat());
    let target = reg.transition_target();
    assert!(target.is_some(), "fourth beat should switch despite the manual pick");
    assert_ne!(target, Some("blue"));
}

#[test]
fn manual_mode_never_switches() {
    let mut reg = EffectRegistry::load(&colors(), &seeded(), &settings("red", Duration::ZERO));
    assert!(!reg.auto_switch());
    let t0 = Instant::now();
    for i in 0..100u64 {
        reg.update_auto_switch(t0 + Duration::from_secs(i), &beat());
    }
    assert_eq!(reg.transition_target(), None);
}

#[test]
fn enabling_auto_in_manual_mode_uses_time() {
    let mut reg = EffectRegistry::load(&colors(), &seeded(), &settings("red", Duration::ZERO));
    reg.set_auto_switch(true);
    assert!(reg.auto_switch());
    assert_eq!(reg.switch_mode(), SwitchMode::Time);
    reg.set_auto_switch(false);
    assert!(!reg.auto_switch());
}
