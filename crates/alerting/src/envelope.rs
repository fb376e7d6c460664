//! Parameter automation in the sample clock

use std::time::Duration;

/// Ramp shape
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Curve {
    Linear,
    /// Geometric interpolation; falls back to linear when either end is <= 0
    Exponential,
}

#[derive(Debug, Clone, Copy)]
struct Ramp {
    start: f32,
    target: f32,
    duration: f32,
    elapsed: f32,
    curve: Curve,
}

impl Ramp {
    fn value_at(&self, t: f32) -> f32 {
        let progress = (t / self.duration).clamp(0.0, 1.0);
        match self.curve {
            Curve::Exponential if self.start > 0.0 && self.target > 0.0 => {
                self.start * (self.target / self.start).powf(progress)
            }
            _ => self.start + (self.target - self.start) * progress,
        }
    }
}

/// A value that can be set immediately or ramped over time.
#[derive(Debug, Clone)]
pub struct Envelope {
    value: f32,
    ramp: Option<Ramp>,
}

impl Envelope {
    pub fn new(value: f32) -> Self {
        Self { value, ramp: None }
    }

    pub fn value(&self) -> f32 {
        self.value
    }

    pub fn is_ramping(&self) -> bool {
        self.ramp.is_some()
    }

    /// Jump to `value`, cancelling any ramp in progress
    pub fn set(&mut self, value: f32) {
        self.value = value;
        self.ramp = None;
    }

    /// Ramp from the current value to `target`
    pub fn ramp_to(&mut self, target: f32, duration: Duration, curve: Curve) {
        let duration = duration.as_secs_f32();
        if duration <= 0.0 {
            self.set(target);
            return;
        }
        self.ramp = Some(Ramp {
            start: self.value,
            target,
            duration,
            elapsed: 0.0,
            curve,
        });
    }

    /// Move forward by `dt` seconds and return the new value
    pub fn advance(&mut self, dt: f32) -> f32 {
        if let Some(ramp) = self.ramp.as_mut() {
            ramp.elapsed += dt;
            self.value = ramp.value_at(ramp.elapsed);
            if ramp.elapsed >= ramp.duration {
                self.value = ramp.target;
                self.ramp = None;
            }
        }
        self.value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_linear_ramp() {
        let mut env = Envelope::new(0.0);
        env.ramp_to(1.0, Duration::from_millis(100), Curve::Linear);
        assert!((env.advance(0.05) - 0.5).abs() < 1e-5);
        assert_eq!(env.advance(0.1), 1.0);
        assert!(!env.is_ramping());
    }

    #[test]
    fn test_exponential_ramp() {
        let mut env = Envelope::new(800.0);
        env.ramp_to(1200.0, Duration::from_millis(500), Curve::Exponential);
        let mid = env.advance(0.25);
        assert!((mid - (800.0f32 * 1200.0).sqrt()).abs() < 0.5, "mid = {mid}");
        assert_eq!(env.advance(1.0), 1200.0);
    }

    #[test]
    fn test_exponential_from_zero_is_linear() {
        let mut env = Envelope::new(0.0);
        env.ramp_to(0.4, Duration::from_secs(1), Curve::Exponential);
        assert!((env.advance(0.5) - 0.2).abs() < 1e-5);
    }

    #[test]
    fn test_set_cancels_ramp() {
        let mut env = Envelope::new(0.0);
        env.ramp_to(1.0, Duration::from_secs(1), Curve::Linear);
        env.set(0.3);
        assert_eq!(env.advance(0.5), 0.3);
    }
}
