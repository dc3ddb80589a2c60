use crate::audio::AudioFeatures;
use crate::config::SwitchMode;
use crate::distortion::DistortionStage;
use crate::engine::{EffectRegistry, EffectState};
use crate::error::RegistryError;
use crate::frame::Frame;
use crate::messages::MessageOverlay;
use crate::shared::LatestCell;
use std::sync::Arc;
use std::time::Instant;

/// Last-value cells written by the capture threads.
#[derive(Clone, Default)]
pub struct PipelineSources {
    pub frames: Arc<LatestCell<Frame>>,
    pub features: Arc<LatestCell<AudioFeatures>>,
}

/// Composition root: captured frame -> distortion -> current/next effect blend -> overlay.
pub struct EffectPipeline {
    distortion: DistortionStage,
    registry: EffectRegistry,
    overlay: Option<MessageOverlay>,
    sources: Option<PipelineSources>,
    processed: u64,
}

impl EffectPipeline {
    pub fn new(registry: EffectRegistry, distortion: DistortionStage) -> Self {
        Self {
            distortion,
            registry,
            overlay: None,
            sources: None,
            processed: 0,
        }
    }

    pub fn with_overlay(mut self, overlay: MessageOverlay) -> Self {
        self.overlay = Some(overlay);
        self
    }

    pub fn with_sources(mut self, sources: PipelineSources) -> Self {
        self.sources = Some(sources);
        self
    }

    /// Runs one frame through every stage.
    pub fn process(&mut self, frame: Frame, features: &AudioFeatures, now: Instant) -> Frame {
        let frame = self.distortion.apply(frame, now);
        self.registry.update_auto_switch(now, features);
        let mut out = self.registry.render(&frame, features, now);
        if let Some(overlay) = self.overlay.as_mut() {
            out = overlay.apply(out, features, now);
        }
        self.processed += 1;
        out
    }

    /// Pulls the latest captured frame and features and processes them. `None` until the
    /// video source has produced a frame. Silent features stand in when audio is absent.
    pub fn tick(&mut self, now: Instant) -> Option<Frame> {
        let sources = self.sources.as_ref()?;
        let frame = sources.frames.latest()?;
        let features = sources.features.latest().unwrap_or_default();
        Some(self.process(frame, &features, now))
    }

    pub fn frames_processed(&self) -> u64 {
        self.processed
    }

    pub fn registry(&self) -> &EffectRegistry {
        &self.registry
    }

    pub fn set_current_effect(&mut self, name: &str, now: Instant) -> Result<(), RegistryError> {
        self.registry.set_current(name, now)
    }

    pub fn switch_to_random(&mut self, now: Instant) -> Option<String> {
        self.registry.switch_to_random(now)
    }

    pub fn step_effect(&mut self, offset: isize, now: Instant) -> Option<String> {
        self.registry.step_by(offset, now)
    }

    pub fn enable(&mut self, name: &str) -> bool {
        self.registry.enable(name)
    }

    pub fn disable(&mut self, name: &str) -> bool {
        self.registry.disable(name)
    }

    pub fn is_enabled(&self, name: &str) -> bool {
        self.registry.is_enabled(name)
    }

    pub fn effect_names(&self) -> Vec<&str> {
        self.registry.names()
    }

    pub fn effect_states(&self) -> Vec<EffectState> {
        self.registry.effect_states()
    }

    pub fn current_effect(&self) -> Option<&str> {
        self.registry.current_name()
    }

    pub fn transition_target(&self) -> Option<&str> {
        self.registry.transition_target()
    }

    pub fn transition_progress(&self) -> f32 {
        self.registry.transition_progress()
    }

    pub fn set_distortion_level(&mut self, level: f32) {
        self.distortion.set_level(level);
        tracing::debug!(level = self.distortion.level(), "distortion level set");
    }

    pub fn distortion_level(&self) -> f32 {
        self.distortion.level()
    }

    pub fn distortion(&self) -> &DistortionStage {
        &self.distortion
    }

    pub fn set_auto_switch(&mut self, on: bool) {
        self.registry.set_auto_switch(on);
    }

    pub fn auto_switch(&self) -> bool {
        self.registry.auto_switch()
    }

    pub fn switch_mode(&self) -> SwitchMode {
        self.registry.switch_mode()
    }

    pub fn messages_enabled(&self) -> bool {
        self.overlay.as_ref().is_some_and(|o| o.enabled())
    }

    pub fn set_messages_enabled(&mut self, on: bool) {
        if let Some(overlay) = self.overlay.as_mut() {
            overlay.set_enabled(on);
        }
    }

    pub fn overlay(&self) -> Option<&MessageOverlay> {
        self.overlay.as_ref()
    }
}
