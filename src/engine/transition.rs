use std::time::{Duration, Instant};

/// What to render this tick, by catalog index.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Blend {
    Steady(usize),
    Crossfade { from: usize, to: usize, t: f32 },
}

/// Time-boxed crossfade between the current effect and a requested one.
///
/// `step` is the only place the current index changes: once the window has fully elapsed the
/// target becomes current and the engine returns to steady state.
#[derive(Clone, Debug)]
pub struct TransitionEngine {
    current: Option<usize>,
    next: Option<usize>,
    started: Option<Instant>,
    duration: Duration,
    progress: f32,
}

impl TransitionEngine {
    pub fn new(current: Option<usize>, duration: Duration) -> Self {
        Self {
            current,
            next: None,
            started: None,
            duration,
            progress: 0.0,
        }
    }

    pub fn current(&self) -> Option<usize> {
        self.current
    }

    pub fn target(&self) -> Option<usize> {
        self.next
    }

    pub fn is_transitioning(&self) -> bool {
        self.next.is_some()
    }

    /// Progress of the running transition, or of the last finished one.
    pub fn progress(&self) -> f32 {
        self.progress
    }

    /// Requests a crossfade to `target`. Re-requesting the running target keeps its window;
    /// requesting the current index cancels any running transition. Returns true when a new
    /// window was started.
    pub fn begin(&mut self, target: usize, now: Instant) -> bool {
        let Some(current) = self.current else {
            self.current = Some(target);
            return false;
        };
        if target == current {
            self.cancel();
            return false;
        }
        if self.next == Some(target) {
            return false;
        }
        self.next = Some(target);
        self.started = Some(now);
        self.progress = 0.0;
        true
    }

    pub fn cancel(&mut self) {
        self.next = None;
        self.started = None;
    }

    /// Advances the clock and reports what to render. On the tick the window completes, the
    /// target is promoted and rendered alone, so the outgoing effect misses that one update.
    /// The output is unchanged since the blend at t = 1 is the target's frame.
    pub fn step(&mut self, now: Instant) -> Option<Blend> {
        let current = self.current?;
        let (Some(next), Some(started)) = (self.next, self.started) else {
            return Some(Blend::Steady(current));
        };

        let dur = self.duration.as_secs_f32();
        let t = if dur <= 0.0 {
            1.0
        } else {
            (now.saturating_duration_since(started).as_secs_f32() / dur).clamp(0.0, 1.0)
        };
        self.progress = t;
        if t >= 1.0 {
            self.current = Some(next);
            self.cancel();
            tracing::debug!(to = next, "transition finished");
            return Some(Blend::Steady(next));
        }
        Some(Blend::Crossfade {
            from: current,
            to: next,
            t,
        })
    }
}
