mod registry;
mod transition;

pub use registry::{EffectRegistry, EffectState};
pub use transition::{Blend, TransitionEngine};
