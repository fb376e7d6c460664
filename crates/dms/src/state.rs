//! Drowsiness state machine

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::analysis::FrameObservation;
use crate::config::DmsConfig;

/// Driver classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Classification {
    #[default]
    Normal,
    Drowsy,
}

/// Counter and classification carried across frames
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DrowsinessState {
    /// Length of the current run of face-present, below-threshold frames
    pub consecutive_low_frames: u32,
    pub classification: Classification,
}

/// What the alarm should do after a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AlarmSignal {
    /// Classification is DROWSY
    Trigger,
    /// Eyes fully reopened or face lost; stop an auto-triggered alarm
    StopRequest,
}

/// Result of one state machine step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateUpdate {
    pub state: DrowsinessState,
    pub alarm: Option<AlarmSignal>,
    pub classification_changed: bool,
}

/// Consecutive-frame hysteresis over the EAR signal
#[derive(Debug, Clone, Default)]
pub struct DrowsinessMonitor {
    state: DrowsinessState,
}

impl DrowsinessMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> DrowsinessState {
        self.state
    }

    /// Advance by one frame. `config` is whatever is current right now.
    pub fn update(&mut self, observation: &FrameObservation, config: &DmsConfig) -> StateUpdate {
        let previous = self.state.classification;

        let ear = match (observation.face_present, observation.ear) {
            (true, Some(ear)) => ear,
            _ => {
                self.state = DrowsinessState::default();
                if previous == Classification::Drowsy {
                    info!("Face lost, classification back to NORMAL");
                }
                return StateUpdate {
                    state: self.state,
                    alarm: Some(AlarmSignal::StopRequest),
                    classification_changed: previous != Classification::Normal,
                };
            }
        };

        // NaN and +inf both fail this comparison and reset the run.
        if ear < config.ear_threshold {
            self.state.consecutive_low_frames = self.state.consecutive_low_frames.saturating_add(1);
        } else {
            self.state.consecutive_low_frames = 0;
        }

        let alarm = if self.state.consecutive_low_frames >= config.consecutive_frame_threshold {
            self.state.classification = Classification::Drowsy;
            Some(AlarmSignal::Trigger)
        } else {
            self.state.classification = Classification::Normal;
            // Only a fully clear frame stops the alarm, not merely dropping
            // below the drowsy threshold.
            (self.state.consecutive_low_frames == 0).then_some(AlarmSignal::StopRequest)
        };

        let classification_changed = previous != self.state.classification;
        if classification_changed {
            info!(
                "Classification {:?} -> {:?} (ear {:.3}, {} low frames)",
                previous, self.state.classification, ear, self.state.consecutive_low_frames
            );
        } else {
            debug!(ear, low_frames = self.state.consecutive_low_frames, "frame classified");
        }

        StateUpdate {
            state: self.state,
            alarm,
            classification_changed,
        }
    }

    /// Back to `{0, NORMAL}`
    pub fn reset(&mut self) {
        self.state = DrowsinessState::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn config(threshold: f32, frames: u32) -> DmsConfig {
        DmsConfig {
            ear_threshold: threshold,
            consecutive_frame_threshold: frames,
            ..Default::default()
        }
    }

    #[test]
    fn test_drowsy_scenario() {
        let config = config(0.18, 5);
        let mut monitor = DrowsinessMonitor::new();
        let ears = [0.25, 0.10, 0.10, 0.10, 0.10, 0.10, 0.25];

        let updates: Vec<_> = ears
            .iter()
            .map(|&ear| monitor.update(&FrameObservation::with_ear(ear), &config))
            .collect();

        let counters: Vec<_> = updates.iter().map(|u| u.state.consecutive_low_frames).collect();
        assert_eq!(counters, vec![0, 1, 2, 3, 4, 5, 0]);

        for update in &updates[..5] {
            assert_eq!(update.state.classification, Classification::Normal);
        }
        assert_eq!(updates[5].state.classification, Classification::Drowsy);
        assert!(updates[5].classification_changed);
        assert_eq!(updates[5].alarm, Some(AlarmSignal::Trigger));

        assert_eq!(updates[6].state.classification, Classification::Normal);
        assert!(updates[6].classification_changed);
        assert_eq!(updates[6].alarm, Some(AlarmSignal::StopRequest));
    }

    #[test]
    fn test_stop_request_only_on_clear_frame() {
        let config = config(0.18, 5);
        let mut monitor = DrowsinessMonitor::new();

        let first = monitor.update(&FrameObservation::with_ear(0.3), &config);
        assert_eq!(first.alarm, Some(AlarmSignal::StopRequest));

        // Low but below the drowsy threshold: no signal either way
        for _ in 0..3 {
            let update = monitor.update(&FrameObservation::with_ear(0.1), &config);
            assert_eq!(update.alarm, None);
        }
    }

    #[test]
    fn test_face_absent_resets() {
        let config = config(0.18, 3);
        let mut monitor = DrowsinessMonitor::new();
        for _ in 0..4 {
            monitor.update(&FrameObservation::with_ear(0.1), &config);
        }
        assert_eq!(monitor.state().classification, Classification::Drowsy);

        let update = monitor.update(&FrameObservation::no_face(), &config);
        assert_eq!(update.state, DrowsinessState::default());
        assert_eq!(update.alarm, Some(AlarmSignal::StopRequest));
        assert!(update.classification_changed);

        let update = monitor.update(&FrameObservation::with_ear(0.1), &config);
        assert_eq!(update.state.consecutive_low_frames, 1);
    }

    #[test]
    fn test_infinite_ear_is_open() {
        let config = config(0.18, 1);
        let mut monitor = DrowsinessMonitor::new();
        monitor.update(&FrameObservation::with_ear(0.1), &config);
        let update = monitor.update(&FrameObservation::with_ear(f32::INFINITY), &config);
        assert_eq!(update.state, DrowsinessState::default());
    }

    #[test]
    fn test_threshold_change_applies_next_frame() {
        let mut monitor = DrowsinessMonitor::new();
        for _ in 0..4 {
            monitor.update(&FrameObservation::with_ear(0.1), &config(0.18, 10));
        }
        assert_eq!(monitor.state().classification, Classification::Normal);

        let update = monitor.update(&FrameObservation::with_ear(0.1), &config(0.18, 5));
        assert_eq!(update.state.classification, Classification::Drowsy);

        // Lowering the EAR threshold below the reading ends the run
        let update = monitor.update(&FrameObservation::with_ear(0.1), &config(0.05, 5));
        assert_eq!(update.state.consecutive_low_frames, 0);
    }

    proptest! {
        #[test]
        fn prop_counter_is_trailing_run(
            frames in prop::collection::vec(prop::option::of(0.0f32..0.5), 1..200),
            threshold in 0.05f32..0.4,
            drowsy_after in 1u32..20,
        ) {
            let config = config(threshold, drowsy_after);
            let mut monitor = DrowsinessMonitor::new();
            let mut run = 0u32;

            for frame in frames {
                let observation = match frame {
                    Some(ear) => FrameObservation::with_ear(ear),
                    None => FrameObservation::no_face(),
                };
                let update = monitor.update(&observation, &config);

                run = match frame {
                    Some(ear) if ear < threshold => run + 1,
                    _ => 0,
                };
                prop_assert_eq!(update.state.consecutive_low_frames, run);
                prop_assert_eq!(
                    update.state.classification == Classification::Drowsy,
                    run >= drowsy_after
                );
            }
        }
    }
}
