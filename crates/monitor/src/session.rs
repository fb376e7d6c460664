//! Camera session lifecycle and the per-frame pipeline

use std::future::pending;

use alerting::{AlarmController, AlarmPhase, AlarmState};
use camera_capture::{
    CameraConfig, CameraError, CaptureDevice, Facing, FrameStream, StreamSettings, VideoFrame,
};
use dms::{AlarmSignal, Classification, DrowsinessMonitor, DrowsinessState, FrameObservation, LandmarkDetector};
use metrics::{counter, gauge};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tokio::time::{sleep_until, Instant};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::events::{EventSink, MonitorEvent};
use crate::fps::FpsMeter;
use crate::settings::MonitorConfig;

/// Session error types
#[derive(Debug, Error)]
pub enum SessionError {
    /// Camera permission or hardware failure; the session is fully stopped
    #[error("Failed to start camera: {0}")]
    Acquisition(#[from] CameraError),

    #[error("A camera session is already active")]
    AlreadyActive,

    #[error("Session is not active")]
    NotActive,

    #[error("Camera stream ended")]
    StreamEnded,
}

impl SessionError {
    /// Message for the operator
    pub fn user_message(&self) -> String {
        match self {
            SessionError::Acquisition(_) => {
                "Failed to start camera. Please check camera permissions and try again.".to_string()
            }
            other => other.to_string(),
        }
    }
}

/// Proof of a started session, required to stop or switch it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionHandle {
    id: Uuid,
    facing: Facing,
}

impl SessionHandle {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn facing(&self) -> Facing {
        self.facing
    }
}

/// The active camera session
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CameraSession {
    pub id: Uuid,
    pub facing: Facing,
    pub active: bool,
    /// What the device actually granted
    pub settings: StreamSettings,
}

/// Outcome of one processed frame
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FrameReport {
    pub sequence: u32,
    pub observation: FrameObservation,
    pub state: DrowsinessState,
    pub alarm_phase: AlarmPhase,
}

/// Operator and host commands for [`SessionController::run`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Start(Facing),
    Stop,
    SwitchFacing,
    TestAlarm,
    Silence,
    /// Host shown (`true`) or backgrounded (`false`)
    SetVisible(bool),
    Shutdown,
}

/// Owns the camera session and drives frames through detector, drowsiness
/// state machine and alarm, one frame at a time.
pub struct SessionController<C: CaptureDevice, D: LandmarkDetector> {
    device: C,
    detector: D,
    camera_config: CameraConfig,
    stream: Option<C::Stream>,
    session: Option<CameraSession>,
    monitor: DrowsinessMonitor,
    alarm: AlarmController,
    config: watch::Receiver<MonitorConfig>,
    events: EventSink,
    fps: FpsMeter,
    face_present: bool,
}

impl<C: CaptureDevice, D: LandmarkDetector> SessionController<C, D> {
    pub fn new(
        device: C,
        detector: D,
        alarm: AlarmController,
        config: watch::Receiver<MonitorConfig>,
        events: EventSink,
    ) -> Self {
        Self {
            device,
            detector,
            camera_config: CameraConfig::default(),
            stream: None,
            session: None,
            monitor: DrowsinessMonitor::new(),
            alarm,
            config,
            events,
            fps: FpsMeter::new(Instant::now()),
            face_present: false,
        }
    }

    /// Capture constraints used for every start; the facing is overridden
    pub fn with_camera_config(mut self, camera_config: CameraConfig) -> Self {
        self.camera_config = camera_config;
        self
    }

    pub fn is_active(&self) -> bool {
        self.session.as_ref().is_some_and(|s| s.active)
    }

    pub fn camera_session(&self) -> Option<&CameraSession> {
        self.session.as_ref()
    }

    /// Handle of the active session
    pub fn handle(&self) -> Option<SessionHandle> {
        self.session.as_ref().map(|s| SessionHandle {
            id: s.id,
            facing: s.facing,
        })
    }

    pub fn drowsiness_state(&self) -> DrowsinessState {
        self.monitor.state()
    }

    pub fn alarm_state(&self) -> AlarmState {
        self.alarm.state()
    }

    pub fn alarm(&self) -> &AlarmController {
        &self.alarm
    }

    pub fn device(&self) -> &C {
        &self.device
    }

    /// Open the camera and begin a session
    pub async fn start(&mut self, facing: Facing) -> Result<SessionHandle, SessionError> {
        if self.session.is_some() {
            return Err(SessionError::AlreadyActive);
        }

        let camera_config = self.camera_config.with_facing(facing);
        info!("Starting {} camera session", facing);

        let stream = match self.device.open(&camera_config).await {
            Ok(stream) => stream,
            Err(e) => {
                error!("Camera acquisition failed: {}", e);
                let err = SessionError::Acquisition(e);
                self.teardown();
                self.events.emit(MonitorEvent::SessionError(err.user_message()));
                return Err(err);
            }
        };

        self.monitor.reset();
        self.fps.reset(Instant::now());

        let session = CameraSession {
            id: Uuid::new_v4(),
            facing,
            active: true,
            settings: stream.settings(),
        };
        let handle = SessionHandle {
            id: session.id,
            facing,
        };
        info!(
            "Session {} active on {} camera ({}x{} @ {}fps)",
            session.id, facing, session.settings.width, session.settings.height, session.settings.fps
        );

        self.stream = Some(stream);
        self.session = Some(session);
        self.events.emit(MonitorEvent::SessionStarted(facing));
        Ok(handle)
    }

    /// Stop the session. Stale or repeated handles are no-ops.
    pub fn stop(&mut self, handle: &SessionHandle) {
        match &self.session {
            Some(session) if session.id == handle.id => {}
            Some(_) => {
                warn!("Ignoring stop for stale session {}", handle.id);
                return;
            }
            None => {
                // Nothing to release, but a stop always leaves the alarm silent
                debug!("Session {} already stopped", handle.id);
                self.teardown();
                return;
            }
        }

        info!("Stopping session {}", handle.id);
        self.teardown();
        self.events.emit(MonitorEvent::SessionStopped);
    }

    /// Stop, then start on the other camera. A failed restart leaves the
    /// controller stopped.
    pub async fn switch_facing(&mut self, handle: &SessionHandle) -> Result<SessionHandle, SessionError> {
        let facing = match &self.session {
            Some(session) if session.id == handle.id => session.facing.opposite(),
            _ => return Err(SessionError::NotActive),
        };

        info!("Switching to {} camera", facing);
        self.stop(handle);
        self.start(facing).await
    }

    /// Wait for the next frame and process it
    pub async fn step(&mut self) -> Result<Option<FrameReport>, SessionError> {
        let stream = self.stream.as_mut().ok_or(SessionError::NotActive)?;
        match stream.next_frame().await {
            Some(frame) => Ok(self.process_frame(frame).await),
            None => {
                self.end_stream();
                Err(SessionError::StreamEnded)
            }
        }
    }

    /// Run one frame through detector, state machine and alarm.
    ///
    /// Returns `None` when there is no session or the detector failed on
    /// this frame; a failed frame leaves the counter untouched.
    pub async fn process_frame(&mut self, frame: VideoFrame) -> Option<FrameReport> {
        if self.session.is_none() {
            debug!("Dropping frame {} outside a session", frame.sequence);
            return None;
        }

        let now = Instant::now();
        self.poll_alarm(now);

        let options = self.config.borrow().dms.detector.clone();
        let (width, height) = frame.dimensions_or_default();
        let detection = self.detector.detect(&frame, &options).await;

        let observation = match detection
            .and_then(|face| FrameObservation::from_landmarks(face.as_ref(), width, height))
        {
            Ok(observation) => observation,
            Err(e) => {
                warn!("Skipping frame {}: {}", frame.sequence, e);
                counter!("monitor_detector_errors_total").increment(1);
                return None;
            }
        };
        counter!("monitor_frames_total").increment(1);

        let config = self.config.borrow().clone();
        let update = self.monitor.update(&observation, &config.dms);

        if update.classification_changed {
            self.events
                .emit(MonitorEvent::ClassificationChanged(update.state.classification));
        }
        self.events
            .emit(MonitorEvent::CounterUpdated(update.state.consecutive_low_frames));

        let now = Instant::now();
        let phase_change = match update.alarm {
            Some(AlarmSignal::Trigger) => self.alarm.trigger(now, &config.alarm),
            Some(AlarmSignal::StopRequest) => self.alarm.auto_stop(now),
            None => None,
        };
        self.emit_phase(phase_change);

        if observation.face_present != self.face_present {
            self.face_present = observation.face_present;
            self.events
                .emit(MonitorEvent::FaceDetectedChanged(observation.face_present));
        }
        self.events.emit(MonitorEvent::EarUpdated(observation.ear));

        if let Some(fps) = self.fps.record(now) {
            gauge!("monitor_fps").set(fps as f64);
            self.events.emit(MonitorEvent::FpsUpdated(fps));
        }

        Some(FrameReport {
            sequence: frame.sequence,
            observation,
            state: update.state,
            alarm_phase: self.alarm.phase(),
        })
    }

    /// Run alarm timers due at `now`
    pub fn poll_alarm(&mut self, now: Instant) -> Option<AlarmPhase> {
        let config = self.config.borrow().alarm.clone();
        let change = self.alarm.poll(now, &config);
        self.emit_phase(change);
        change
    }

    /// Operator test: sound for two seconds regardless of classification
    pub fn test_alarm(&mut self) {
        let config = self.config.borrow().alarm.clone();
        let change = self.alarm.test(Instant::now(), &config);
        self.emit_phase(change);
    }

    /// Operator silence
    pub fn silence_alarm(&mut self) {
        let change = self.alarm.silence(Instant::now());
        self.emit_phase(change);
    }

    /// Host visibility; a hidden host never sounds the alarm
    pub fn set_visible(&mut self, visible: bool) {
        if !visible && self.is_active() {
            info!("Host backgrounded, silencing alarm");
        }
        let change = self.alarm.set_visible(visible);
        self.emit_phase(change);
    }

    /// Process frames, alarm timers and commands until `Shutdown` or the
    /// command channel closes.
    pub async fn run(&mut self, mut commands: mpsc::Receiver<Command>) {
        info!("Monitor loop running");
        loop {
            let deadline = self.alarm.next_deadline();
            tokio::select! {
                biased;

                command = commands.recv() => match command {
                    Some(Command::Shutdown) | None => break,
                    Some(command) => self.handle_command(command).await,
                },
                () = sleep_until_deadline(deadline) => {
                    self.poll_alarm(Instant::now());
                }
                frame = next_frame(self.stream.as_mut()) => match frame {
                    Some(frame) => {
                        self.process_frame(frame).await;
                    }
                    None => self.end_stream(),
                },
            }
        }

        if let Some(handle) = self.handle() {
            self.stop(&handle);
        }
        let change = self.alarm.force_silence();
        self.emit_phase(change);
        info!("Monitor loop stopped");
    }

    async fn handle_command(&mut self, command: Command) {
        debug!("Command {:?}", command);
        match command {
            Command::Start(facing) => {
                if let Err(e) = self.start(facing).await {
                    debug!("Start rejected: {}", e);
                }
            }
            Command::Stop => match self.handle() {
                Some(handle) => self.stop(&handle),
                None => self.teardown(),
            },
            Command::SwitchFacing => match self.handle() {
                Some(handle) => {
                    if let Err(e) = self.switch_facing(&handle).await {
                        debug!("Switch failed: {}", e);
                    }
                }
                None => debug!("No session to switch"),
            },
            Command::TestAlarm => self.test_alarm(),
            Command::Silence => self.silence_alarm(),
            Command::SetVisible(visible) => self.set_visible(visible),
            Command::Shutdown => {}
        }
    }

    fn end_stream(&mut self) {
        warn!("Camera stream ended");
        self.teardown();
        self.events
            .emit(MonitorEvent::SessionError(SessionError::StreamEnded.user_message()));
        self.events.emit(MonitorEvent::SessionStopped);
    }

    /// Release the stream and return everything to its idle state
    fn teardown(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            stream.stop();
        }
        self.session = None;

        let change = self.alarm.force_silence();
        self.emit_phase(change);

        let previous = self.monitor.state();
        self.monitor.reset();
        if previous.classification != Classification::Normal {
            self.events
                .emit(MonitorEvent::ClassificationChanged(Classification::Normal));
        }
        if previous.consecutive_low_frames != 0 {
            self.events.emit(MonitorEvent::CounterUpdated(0));
        }
        if self.face_present {
            self.face_present = false;
            self.events.emit(MonitorEvent::FaceDetectedChanged(false));
            self.events.emit(MonitorEvent::EarUpdated(None));
        }
    }

    fn emit_phase(&mut self, change: Option<AlarmPhase>) {
        if let Some(phase) = change {
            if phase == AlarmPhase::Sounding {
                counter!("monitor_alarm_activations_total").increment(1);
            }
            self.events.emit(MonitorEvent::AlarmPhaseChanged(phase));
        }
    }
}

async fn next_frame<S: FrameStream>(stream: Option<&mut S>) -> Option<VideoFrame> {
    match stream {
        Some(stream) => stream.next_frame().await,
        None => pending().await,
    }
}

async fn sleep_until_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => pending().await,
    }
}
