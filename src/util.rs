//! Stage timing for the ingestion pipeline

use std::time::{Duration, Instant};

/// Logs how long a pipeline stage took when it goes out of scope.
///
/// ```ignore
/// let _t = Timed::info("Clustering");
/// // ... work ...
/// // logs "Clustering took 1.234s"
/// ```
pub struct Timed {
    stage: &'static str,
    start: Instant,
    level: log::Level,
}

impl Timed {
    pub fn info(stage: &'static str) -> Self {
        Self::at(stage, log::Level::Info)
    }

    pub fn debug(stage: &'static str) -> Self {
        Self::at(stage, log::Level::Debug)
    }

    fn at(stage: &'static str, level: log::Level) -> Self {
        log::trace!("{} started", stage);
        Self {
            stage,
            start: Instant::now(),
            level,
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

impl Drop for Timed {
    fn drop(&mut self) {
        log::log!(self.level, "{} took {:.3?}", self.stage, self.start.elapsed());
    }
}
