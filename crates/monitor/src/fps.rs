//! Processed-frame rate

use std::time::Duration;

use tokio::time::Instant;

const WINDOW: Duration = Duration::from_secs(1);

/// Counts processed frames and reports a rate once per second
#[derive(Debug, Clone)]
pub struct FpsMeter {
    frames: u32,
    window_start: Instant,
    current: u32,
}

impl FpsMeter {
    pub fn new(now: Instant) -> Self {
        Self {
            frames: 0,
            window_start: now,
            current: 0,
        }
    }

    pub fn reset(&mut self, now: Instant) {
        *self = Self::new(now);
    }

    /// Last reported rate
    pub fn current(&self) -> u32 {
        self.current
    }

    /// Count a frame; returns the new rate when a window closes
    pub fn record(&mut self, now: Instant) -> Option<u32> {
        self.frames += 1;
        let elapsed = now.saturating_duration_since(self.window_start);
        if elapsed < WINDOW {
            return None;
        }

        self.current = (self.frames as f64 / elapsed.as_secs_f64()).round() as u32;
        self.frames = 0;
        self.window_start = now;
        Some(self.current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reports_once_per_window() {
        let t0 = Instant::now();
        let mut meter = FpsMeter::new(t0);

        for i in 1..30 {
            assert_eq!(meter.record(t0 + Duration::from_millis(i * 33)), None);
        }
        assert_eq!(meter.record(t0 + Duration::from_millis(1000)), Some(30));
        assert_eq!(meter.current(), 30);

        // Slower second window
        for i in 1..10 {
            assert_eq!(meter.record(t0 + Duration::from_millis(1000 + i * 100)), None);
        }
        assert_eq!(meter.record(t0 + Duration::from_millis(2000)), Some(10));
    }
}
