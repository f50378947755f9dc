use std::cell::Cell;
use std::rc::Rc;

/// Millisecond time base for the debounce timers.
pub trait Clock {
    fn now_ms(&self) -> f64;
}

/// Externally driven clock. Clones share the same time so a test (or the
/// offline renderer) can keep a handle and advance it between ticks.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Rc<Cell<f64>>,
}

impl ManualClock {
    pub fn new(start_ms: f64) -> Self {
        Self {
            now: Rc::new(Cell::new(start_ms)),
        }
    }

    pub fn advance(&self, ms: f64) {
        self.now.set(self.now.get() + ms);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> f64 {
        self.now.get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_clock_handles_share_time() {
        let clock = ManualClock::new(10.0);
        let handle = clock.clone();
        handle.advance(16.5);
        assert_eq!(clock.now_ms(), 26.5);
        clock.advance(1000.0);
        assert_eq!(handle.now_ms(), 1026.5);
    }
}
