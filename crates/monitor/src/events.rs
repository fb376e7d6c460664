//! Events published for the presentation layer

use alerting::AlarmPhase;
use camera_capture::Facing;
use dms::Classification;
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::trace;

/// Everything a dashboard renders
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", content = "value", rename_all = "snake_case")]
pub enum MonitorEvent {
    FaceDetectedChanged(bool),
    /// Combined EAR, `None` without a face
    EarUpdated(Option<f32>),
    /// Consecutive low-EAR frames
    CounterUpdated(u32),
    ClassificationChanged(Classification),
    AlarmPhaseChanged(AlarmPhase),
    FpsUpdated(u32),
    SessionStarted(Facing),
    SessionStopped,
    /// User-facing error message
    SessionError(String),
}

/// Fire-and-forget event publisher
#[derive(Debug, Clone, Default)]
pub struct EventSink {
    tx: Option<mpsc::UnboundedSender<MonitorEvent>>,
}

impl EventSink {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<MonitorEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx: Some(tx) }, rx)
    }

    /// Sink that drops everything
    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn emit(&self, event: MonitorEvent) {
        if let Some(tx) = &self.tx {
            if tx.send(event).is_err() {
                trace!("Event receiver dropped");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_json() {
        let json = serde_json::to_string(&MonitorEvent::ClassificationChanged(Classification::Drowsy)).unwrap();
        assert_eq!(json, r#"{"event":"classification_changed","value":"DROWSY"}"#);

        let json = serde_json::to_string(&MonitorEvent::EarUpdated(None)).unwrap();
        assert_eq!(json, r#"{"event":"ear_updated","value":null}"#);
    }

    #[test]
    fn test_disabled_sink() {
        EventSink::disabled().emit(MonitorEvent::SessionStopped);

        let (sink, rx) = EventSink::channel();
        drop(rx);
        sink.emit(MonitorEvent::SessionStopped);
    }
}
