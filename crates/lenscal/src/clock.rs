use std::time::{Duration, Instant};

/// Time source used to debounce accepted samples.
pub trait Clock {
    /// Elapsed time since the clock started.
    fn now(&mut self) -> Duration;
}

impl<C: Clock + ?Sized> Clock for Box<C> {
    fn now(&mut self) -> Duration {
        (**self).now()
    }
}

/// Process wall clock.
#[derive(Debug, Clone, Copy)]
pub struct WallClock {
    started: Instant,
}

impl WallClock {
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
        }
    }
}

impl Default for WallClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for WallClock {
    fn now(&mut self) -> Duration {
        self.started.elapsed()
    }
}

/// Frame-count time: every reading is one nominal frame period after the
/// previous one, starting at zero.
#[derive(Debug, Clone, Copy)]
pub struct FrameClock {
    fps: f64,
    frames: u64,
}

impl FrameClock {
    /// `fps` must be finite and positive.
    pub fn new(fps: f64) -> Option<Self> {
        (fps.is_finite() && fps > 0.0).then_some(Self { fps, frames: 0 })
    }

    pub fn fps(&self) -> f64 {
        self.fps
    }

    /// Readings taken so far.
    pub fn frames(&self) -> u64 {
        self.frames
    }
}

impl Clock for FrameClock {
    fn now(&mut self) -> Duration {
        let nanos = (self.frames as f64 * 1e9 / self.fps).round();
        let t = Duration::from_nanos(nanos as u64);
        self.frames += 1;
        t
    }
}

/// Minimum-interval gate between accepted samples.
///
/// The first detection is always admitted; a later one only once at least
/// `min_interval` has passed since the last admitted detection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Debouncer {
    min_interval: Duration,
    last_accepted: Option<Duration>,
}

impl Debouncer {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_accepted: None,
        }
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    pub fn last_accepted(&self) -> Option<Duration> {
        self.last_accepted
    }

    /// Admit a detection observed at `now`, recording it when admitted.
    pub fn admit(&mut self, now: Duration) -> bool {
        let ready = match self.last_accepted {
            None => true,
            Some(last) => now.saturating_sub(last) >= self.min_interval,
        };
        if ready {
            self.last_accepted = Some(now);
        }
        ready
    }
}
