//! Wall-clock sources for frame pacing.

use std::cell::Cell;
use std::rc::Rc;
use std::time::Instant;

/// Milliseconds since an arbitrary fixed origin.
pub trait TimeSource {
    fn now_ms(&self) -> f64;
}

/// Monotonic time from [`Instant`].
#[derive(Debug, Clone, Copy)]
pub struct SystemTime {
    origin: Instant,
}

impl Default for SystemTime {
    fn default() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl TimeSource for SystemTime {
    fn now_ms(&self) -> f64 {
        self.origin.elapsed().as_secs_f64() * 1000.0
    }
}

/// Time that only moves when told to. Clones share the same time.
#[derive(Debug, Clone, Default)]
pub struct ManualTime(Rc<Cell<f64>>);

impl ManualTime {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, ms: f64) {
        self.0.set(ms);
    }

    pub fn advance(&self, ms: f64) {
        self.0.set(self.0.get() + ms);
    }
}

impl TimeSource for ManualTime {
    fn now_ms(&self) -> f64 {
        self.0.get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_time_is_shared_between_clones() {
        let time = ManualTime::new();
        let view = time.clone();
        time.advance(16.5);
        assert!((view.now_ms() - 16.5).abs() < f64::EPSILON);
    }
}
