use std::time::{Duration, Instant};

use log::info;

/// Wall clock timer for the verbose stage reports.
#[derive(Clone, Copy, Debug)]
pub struct Timer {
    start: Instant,
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}

impl Timer {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Log `msg` with the elapsed time and restart.
    pub fn report_clear(&mut self, msg: &str) -> Duration {
        let elapsed = self.elapsed();
        info!("{}: {:.2} s", msg, elapsed.as_secs_f64());
        self.start = Instant::now();
        elapsed
    }
}
