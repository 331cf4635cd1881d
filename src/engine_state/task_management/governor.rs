//! Adaptive threading.
//!
//! The governor watches frame times and recommends a scheduler mode. A full window of
//! frames over budget means the pool is competing with the main thread, so work falls back
//! to the single background thread; a full window under budget brings the pool back.
//! The governor never raises the mode above the one the engine was configured with.

use std::time::Duration;

use crate::core::config::{FrameConfig, ThreadingMode};

/// Frame-time hysteresis between single and multi threaded scheduling.
#[derive(Debug, Clone)]
pub struct ThreadingGovernor {
    budget: Duration,
    window: usize,
    ceiling: ThreadingMode,
    over_budget: usize,
    under_budget: usize,
}

impl ThreadingGovernor {
    /// # Arguments
    ///
    /// * `budget` - Frames longer than this count as over budget
    /// * `window` - Consecutive frames needed before a switch is recommended
    /// * `ceiling` - The most parallel mode the governor may recommend
    pub fn new(budget: Duration, window: usize, ceiling: ThreadingMode) -> Self {
        ThreadingGovernor {
            budget,
            window: window.max(1),
            ceiling,
            over_budget: 0,
            under_budget: 0,
        }
    }

    /// Builds a governor from the frame settings, capped at the configured scheduler mode.
    pub fn from_config(config: &FrameConfig, ceiling: ThreadingMode) -> Self {
        Self::new(config.frame_budget(), config.adaptive_window, ceiling)
    }

    /// Records one frame and returns the mode to switch to, if a switch is due.
    pub fn observe(&mut self, frame_time: Duration, current: ThreadingMode) -> Option<ThreadingMode> {
        if frame_time > self.budget {
            self.over_budget += 1;
            self.under_budget = 0;
        } else {
            self.under_budget += 1;
            self.over_budget = 0;
        }

        match current {
            ThreadingMode::Multi if self.over_budget >= self.window => {
                self.over_budget = 0;
                Some(ThreadingMode::Single)
            }
            ThreadingMode::Single
                if self.ceiling == ThreadingMode::Multi && self.under_budget >= self.window =>
            {
                self.under_budget = 0;
                Some(ThreadingMode::Multi)
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SLOW: Duration = Duration::from_millis(40);
    const FAST: Duration = Duration::from_millis(5);

    #[test]
    fn sustained_slow_frames_fall_back_to_single() {
        let mut governor = ThreadingGovernor::new(Duration::from_millis(16), 3, ThreadingMode::Multi);
        assert_eq!(governor.observe(SLOW, ThreadingMode::Multi), None);
        assert_eq!(governor.observe(SLOW, ThreadingMode::Multi), None);
        assert_eq!(governor.observe(SLOW, ThreadingMode::Multi), Some(ThreadingMode::Single));
        assert_eq!(governor.observe(SLOW, ThreadingMode::Single), None);
    }

    #[test]
    fn a_single_fast_frame_resets_the_window() {
        let mut governor = ThreadingGovernor::new(Duration::from_millis(16), 2, ThreadingMode::Multi);
        assert_eq!(governor.observe(SLOW, ThreadingMode::Multi), None);
        assert_eq!(governor.observe(FAST, ThreadingMode::Multi), None);
        assert_eq!(governor.observe(SLOW, ThreadingMode::Multi), None);

        assert_eq!(governor.observe(FAST, ThreadingMode::Single), None);
        assert_eq!(governor.observe(FAST, ThreadingMode::Single), Some(ThreadingMode::Multi));
    }

    #[test]
    fn a_single_threaded_configuration_is_never_raised() {
        let mut governor = ThreadingGovernor::new(Duration::from_millis(16), 2, ThreadingMode::Single);
        for _ in 0..10 {
            assert_eq!(governor.observe(FAST, ThreadingMode::Single), None);
        }
    }
}
