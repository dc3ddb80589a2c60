use super::transition::{Blend, TransitionEngine};
use crate::audio::AudioFeatures;
use crate::config::{EngineSettings, SwitchMode};
use crate::error::{EffectLoadError, RegistryError};
use crate::frame::Frame;
use crate::fx::{Effect, EffectCtx, EffectDeps, EffectFactory};
use std::panic::{self, AssertUnwindSafe};
use std::time::Instant;

struct Slot {
    name: String,
    effect: Box<dyn Effect>,
    enabled: bool,
    failures: u64,
}

/// Row of the management view.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EffectState {
    pub name: String,
    pub enabled: bool,
    pub current: bool,
    pub target: bool,
}

/// Owns one instance of every loaded effect, their enabled flags, the current selection
/// and the auto-switch policy.
pub struct EffectRegistry {
    slots: Vec<Slot>,
    transition: TransitionEngine,
    switch_mode: SwitchMode,
    auto_switch: bool,
    seconds_per_switch: f32,
    beats_per_switch: u32,
    last_auto_switch: Option<Instant>,
    beat_counter: u32,
    started: Option<Instant>,
    load_errors: Vec<EffectLoadError>,
    rng: fastrand::Rng,
}

impl EffectRegistry {
    /// Instantiates every factory in order. A factory that fails or panics is logged and
    /// skipped; a repeated name keeps the first instance.
    pub fn load(factories: &[(&'static str, EffectFactory)], deps: &EffectDeps, settings: &EngineSettings) -> Self {
        let mut slots: Vec<Slot> = Vec::with_capacity(factories.len());
        let mut load_errors = Vec::new();

        for &(name, factory) in factories {
            let outcome = if slots.iter().any(|s| s.name == name) {
                Err(EffectLoadError::Duplicate { name: name.to_string() })
            } else {
                match panic::catch_unwind(AssertUnwindSafe(|| factory(deps))) {
                    Ok(Ok(effect)) => Ok(effect),
                    Ok(Err(e)) => Err(EffectLoadError::Failed {
                        name: name.to_string(),
                        reason: format!("{e:#}"),
                    }),
                    Err(_) => Err(EffectLoadError::Panicked { name: name.to_string() }),
                }
            };
            match outcome {
                Ok(effect) => slots.push(Slot {
                    name: name.to_string(),
                    effect,
                    enabled: true,
                    failures: 0,
                }),
                Err(err) => {
                    tracing::warn!(error = %err, "skipping effect");
                    load_errors.push(err);
                }
            }
        }

        let preferred = settings
            .default_effect
            .as_deref()
            .and_then(|want| slots.iter().position(|s| s.name == want));
        if preferred.is_none() {
            if let Some(want) = settings.default_effect.as_deref() {
                tracing::warn!(effect = want, "default effect not loaded; using first available");
            }
        }
        let current = preferred.or((!slots.is_empty()).then_some(0));

        tracing::info!(
            loaded = slots.len(),
            failed = load_errors.len(),
            current = current.map(|i| slots[i].name.as_str()).unwrap_or("none"),
            "effects loaded"
        );

        Self {
            slots,
            transition: TransitionEngine::new(current, settings.transition),
            switch_mode: settings.switch_mode,
            auto_switch: settings.switch_mode != SwitchMode::Manual,
            seconds_per_switch: settings.seconds_per_switch.max(0.0),
            beats_per_switch: settings.beats_per_switch.max(1),
            last_auto_switch: None,
            beat_counter: 0,
            started: None,
            load_errors,
            rng: deps.rng_for("registry"),
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn load_errors(&self) -> &[EffectLoadError] {
        &self.load_errors
    }

    pub fn names(&self) -> Vec<&str> {
        self.slots.iter().map(|s| s.name.as_str()).collect()
    }

    pub fn enabled_names(&self) -> Vec<&str> {
        self.slots
            .iter()
            .filter(|s| s.enabled)
            .map(|s| s.name.as_str())
            .collect()
    }

    pub fn effect_states(&self) -> Vec<EffectState> {
        let current = self.transition.current();
        let target = self.transition.target();
        self.slots
            .iter()
            .enumerate()
            .map(|(i, s)| EffectState {
                name: s.name.clone(),
                enabled: s.enabled,
                current: current == Some(i),
                target: target == Some(i),
            })
            .collect()
    }

    fn index_of(&self, name: &str) -> Option<usize> {
        self.slots.iter().position(|s| s.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index_of(name).is_some()
    }

    pub fn is_enabled(&self, name: &str) -> bool {
        self.index_of(name).is_some_and(|i| self.slots[i].enabled)
    }

    /// Returns false for unknown names.
    pub fn enable(&mut self, name: &str) -> bool {
        match self.index_of(name) {
            Some(i) => {
                self.slots[i].enabled = true;
                true
            }
            None => false,
        }
    }

    /// Refuses unknown names, the current effect and the running transition's target.
    pub fn disable(&mut self, name: &str) -> bool {
        let Some(i) = self.index_of(name) else {
            return false;
        };
        if self.transition.current() == Some(i) || self.transition.target() == Some(i) {
            tracing::debug!(effect = name, "refusing to disable the active effect");
            return false;
        }
        self.slots[i].enabled = false;
        true
    }

    pub fn current_name(&self) -> Option<&str> {
        self.transition.current().map(|i| self.slots[i].name.as_str())
    }

    pub fn transition_target(&self) -> Option<&str> {
        self.transition.target().map(|i| self.slots[i].name.as_str())
    }

    pub fn transition_progress(&self) -> f32 {
        self.transition.progress()
    }

    /// Starts a crossfade to `name`. A disabled effect is enabled first.
    pub fn set_current(&mut self, name: &str, now: Instant) -> Result<(), RegistryError> {
        if self.slots.is_empty() {
            return Err(RegistryError::Empty);
        }
        let i = self
            .index_of(name)
            .ok_or_else(|| RegistryError::UnknownEffect(name.to_string()))?;
        if !self.slots[i].enabled {
            tracing::info!(effect = name, "enabling disabled effect on explicit selection");
            self.slots[i].enabled = true;
        }
        if self.transition.begin(i, now) {
            tracing::info!(
                from = self.current_name().unwrap_or("none"),
                to = name,
                "switching effect"
            );
        }
        Ok(())
    }

    /// Picks uniformly among enabled effects other than the current one. `None` when there is
    /// nothing to switch to.
    pub fn switch_to_random(&mut self, now: Instant) -> Option<String> {
        let current = self.transition.current();
        let candidates = self
            .slots
            .iter()
            .enumerate()
            .filter(|&(i, s)| s.enabled && Some(i) != current)
            .map(|(i, _)| i)
            .collect::<Vec<_>>();
        if candidates.is_empty() {
            return None;
        }
        let name = self.slots[candidates[self.rng.usize(..candidates.len())]].name.clone();
        self.set_current(&name, now).ok()?;
        Some(name)
    }

    /// Moves `offset` enabled effects along the catalog from the current one, wrapping.
    pub fn step_by(&mut self, offset: isize, now: Instant) -> Option<String> {
        let current = self.transition.current()?;
        let n = self.slots.len() as isize;
        let dir = offset.signum();
        let mut remaining = offset.abs();
        let mut i = current as isize;
        for _ in 0..n * offset.abs().max(1) {
            if remaining == 0 {
                break;
            }
            i = (i + dir).rem_euclid(n);
            if self.slots[i as usize].enabled {
                remaining -= 1;
            }
        }
        let idx = i as usize;
        if remaining > 0 || idx == current {
            return None;
        }
        let name = self.slots[idx].name.clone();
        self.set_current(&name, now).ok()?;
        Some(name)
    }

    pub fn switch_mode(&self) -> SwitchMode {
        self.switch_mode
    }

    pub fn auto_switch(&self) -> bool {
        self.auto_switch
    }

    /// Turning auto-switch on while in manual mode falls back to time-based switching.
    pub fn set_auto_switch(&mut self, on: bool) {
        if on && self.switch_mode == SwitchMode::Manual {
            self.switch_mode = SwitchMode::Time;
        }
        self.auto_switch = on;
        self.last_auto_switch = None;
        self.beat_counter = 0;
    }

    pub fn set_switch_mode(&mut self, mode: SwitchMode) {
        self.switch_mode = mode;
        self.auto_switch = mode != SwitchMode::Manual;
        self.last_auto_switch = None;
        self.beat_counter = 0;
    }

    /// Triggers `switch_to_random` when the auto-switch policy says so. The interval and beat
    /// count run from the last auto-switch only; manual selections do not reset them.
    pub fn update_auto_switch(&mut self, now: Instant, features: &AudioFeatures) {
        if !self.auto_switch {
            return;
        }
        let last = *self.last_auto_switch.get_or_insert(now);
        let due = match self.switch_mode {
            SwitchMode::Manual => false,
            SwitchMode::Time => now.saturating_duration_since(last).as_secs_f32() > self.seconds_per_switch,
            SwitchMode::Beat => {
                if features.beat {
                    self.beat_counter += 1;
                }
                self.beat_counter >= self.beats_per_switch
            }
        };
        if !due {
            return;
        }
        self.last_auto_switch = Some(now);
        self.beat_counter = 0;
        match self.switch_to_random(now) {
            Some(name) => tracing::debug!(effect = %name, "auto-switch"),
            None => tracing::trace!("auto-switch found no candidate"),
        }
    }

    /// Runs the current effect, or both sides of a running crossfade, on `frame`. An empty
    /// registry passes the frame through.
    pub fn render(&mut self, frame: &Frame, features: &AudioFeatures, now: Instant) -> Frame {
        let started = *self.started.get_or_insert(now);
        let ctx = EffectCtx {
            now,
            t: now.saturating_duration_since(started).as_secs_f32(),
            features,
        };
        match self.transition.step(now) {
            None => frame.clone(),
            Some(Blend::Steady(i)) => self.run(i, &ctx, frame),
            Some(Blend::Crossfade { from, to, t }) => {
                let a = self.run(from, &ctx, frame);
                let b = self.run(to, &ctx, frame);
                Frame::blend(&a, &b, t)
            }
        }
    }

    /// Calls one effect, replacing a panic or a wrongly sized result with the input frame.
    fn run(&mut self, i: usize, ctx: &EffectCtx<'_>, frame: &Frame) -> Frame {
        let slot = &mut self.slots[i];
        let result = panic::catch_unwind(AssertUnwindSafe(|| slot.effect.transform(ctx, frame)));
        let reason = match result {
            Ok(out) if out.same_shape(frame) && out.data().len() == frame.data().len() => return out,
            Ok(out) => format!(
                "returned {}x{} for a {}x{} input",
                out.width(),
                out.height(),
                frame.width(),
                frame.height()
            ),
            Err(_) => "panicked".to_string(),
        };
        if slot.failures % 100 == 0 {
            tracing::warn!(
                effect = %slot.name,
                failures = slot.failures + 1,
                reason = %reason,
                "effect failed; passing frame through"
            );
        }
        slot.failures += 1;
        frame.clone()
    }
}
