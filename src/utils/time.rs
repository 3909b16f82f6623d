//! Node-local freshness clock.
//!
//! `ts` fields in the data model are explicitly *not* a global clock: each
//! node stamps them with seconds elapsed since its own process start. This
//! type is that per-process epoch.

use std::time::Instant;

#[derive(Debug, Clone, Copy)]
pub struct Clock {
    epoch: Instant,
}

impl Clock {
    pub fn start() -> Self {
        Clock {
            epoch: Instant::now(),
        }
    }

    /// Seconds elapsed since this clock was started, as a float.
    pub fn now(&self) -> f64 {
        self.epoch.elapsed().as_secs_f64()
    }
}

impl Default for Clock {
    fn default() -> Self {
        Self::start()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;
    use std::time::Duration;

    #[test]
    fn now_is_monotonic_and_starts_near_zero() {
        let clock = Clock::start();
        let t0 = clock.now();
        assert!(t0 < 0.1);
        sleep(Duration::from_millis(5));
        let t1 = clock.now();
        assert!(t1 > t0);
    }
}
