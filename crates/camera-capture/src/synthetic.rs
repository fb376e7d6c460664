//! Synthetic camera producing solid frames at a fixed rate

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use image::{Rgb, RgbImage};
use tokio::time::{interval, Instant, Interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::device::{CaptureDevice, FrameStream, StreamSettings};
use crate::{CameraConfig, CameraError, Facing, VideoFrame};

/// In-process camera used by the demo binary and tests.
///
/// Negotiates the requested constraints down to its own capabilities and
/// can be told to refuse a facing or to deny permission outright.
#[derive(Debug, Clone)]
pub struct SyntheticCamera {
    front_available: bool,
    rear_available: bool,
    permission_granted: bool,
    max_width: u32,
    max_height: u32,
    max_fps: u32,
    frame_limit: Option<u32>,
    open_streams: Arc<AtomicUsize>,
}

impl Default for SyntheticCamera {
    fn default() -> Self {
        Self {
            front_available: true,
            rear_available: true,
            permission_granted: true,
            max_width: 1280,
            max_height: 720,
            max_fps: 30,
            frame_limit: None,
            open_streams: Arc::new(AtomicUsize::new(0)),
        }
    }
}

impl SyntheticCamera {
    pub fn new() -> Self {
        Self::default()
    }

    /// Only the given camera is present
    pub fn only(facing: Facing) -> Self {
        Self {
            front_available: facing == Facing::Front,
            rear_available: facing == Facing::Rear,
            ..Default::default()
        }
    }

    /// Every open attempt fails with `PermissionDenied`
    pub fn denied() -> Self {
        Self {
            permission_granted: false,
            ..Default::default()
        }
    }

    /// Cap the negotiated capture settings
    pub fn with_capabilities(mut self, width: u32, height: u32, fps: u32) -> Self {
        self.max_width = width;
        self.max_height = height;
        self.max_fps = fps.max(1);
        self
    }

    /// End each stream after `frames` frames
    pub fn with_frame_limit(mut self, frames: u32) -> Self {
        self.frame_limit = Some(frames);
        self
    }

    /// Number of streams opened and not yet stopped
    pub fn open_streams(&self) -> usize {
        self.open_streams.load(Ordering::SeqCst)
    }

    fn is_available(&self, facing: Facing) -> bool {
        match facing {
            Facing::Front => self.front_available,
            Facing::Rear => self.rear_available,
        }
    }
}

impl CaptureDevice for SyntheticCamera {
    type Stream = SyntheticStream;

    async fn open(&mut self, config: &CameraConfig) -> Result<SyntheticStream, CameraError> {
        if !self.permission_granted {
            warn!("Camera permission denied");
            return Err(CameraError::PermissionDenied);
        }
        if !self.is_available(config.facing) {
            warn!("No {} camera present", config.facing);
            return Err(CameraError::NoDevice(config.facing));
        }
        if config.fps == 0 {
            return Err(CameraError::Open("requested frame rate is zero".into()));
        }

        let settings = StreamSettings {
            width: config.width.min(self.max_width),
            height: config.height.min(self.max_height),
            fps: config.fps.min(self.max_fps),
        };

        let mut ticker = interval(Duration::from_secs_f64(1.0 / settings.fps as f64));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        self.open_streams.fetch_add(1, Ordering::SeqCst);
        info!(
            "Opened {} camera at {}x{} @ {}fps",
            config.facing, settings.width, settings.height, settings.fps
        );

        Ok(SyntheticStream {
            facing: config.facing,
            settings,
            ticker,
            started: Instant::now(),
            sequence: 0,
            remaining: self.frame_limit,
            stopped: false,
            open_streams: self.open_streams.clone(),
        })
    }
}

/// Stream handed out by [`SyntheticCamera`]
#[derive(Debug)]
pub struct SyntheticStream {
    facing: Facing,
    settings: StreamSettings,
    ticker: Interval,
    started: Instant,
    sequence: u32,
    remaining: Option<u32>,
    stopped: bool,
    open_streams: Arc<AtomicUsize>,
}

impl SyntheticStream {
    pub fn facing(&self) -> Facing {
        self.facing
    }

    fn release(&mut self) {
        if !self.stopped {
            self.stopped = true;
            self.open_streams.fetch_sub(1, Ordering::SeqCst);
        }
    }
}

impl FrameStream for SyntheticStream {
    fn settings(&self) -> StreamSettings {
        self.settings
    }

    async fn next_frame(&mut self) -> Option<VideoFrame> {
        if self.stopped {
            return None;
        }
        if self.remaining == Some(0) {
            debug!("Synthetic stream exhausted");
            return None;
        }

        // Budget is spent after the tick so a cancelled wait loses nothing.
        self.ticker.tick().await;
        if let Some(remaining) = self.remaining.as_mut() {
            *remaining -= 1;
        }

        // Front frames are tinted so the two cameras are distinguishable.
        let shade = match self.facing {
            Facing::Front => Rgb([96, 80, 72]),
            Facing::Rear => Rgb([72, 80, 96]),
        };
        let img = RgbImage::from_pixel(self.settings.width, self.settings.height, shade);
        let timestamp_ns = self.started.elapsed().as_nanos() as u64;
        let frame = VideoFrame::from_rgb_image(img, timestamp_ns, self.sequence);
        self.sequence = self.sequence.wrapping_add(1);
        Some(frame)
    }

    fn stop(&mut self) {
        if !self.stopped {
            info!("Stopping {} camera stream", self.facing);
        }
        self.release();
    }
}

impl Drop for SyntheticStream {
    fn drop(&mut self) {
        self.release();
    }
}
