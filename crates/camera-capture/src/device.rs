//! Capture device contract

use std::future::Future;

use serde::{Deserialize, Serialize};

use crate::{CameraConfig, CameraError, VideoFrame};

/// Settings actually granted by the device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamSettings {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
}

/// A camera that can open a live stream for a requested facing
pub trait CaptureDevice: Send {
    type Stream: FrameStream;

    /// Open a stream. Fails with a permission or hardware error.
    fn open(
        &mut self,
        config: &CameraConfig,
    ) -> impl Future<Output = Result<Self::Stream, CameraError>> + Send;
}

/// A live source of frames
pub trait FrameStream: Send {
    /// Negotiated capture settings
    fn settings(&self) -> StreamSettings;

    /// Wait for the next frame. `None` once the stream has ended.
    fn next_frame(&mut self) -> impl Future<Output = Option<VideoFrame>> + Send;

    /// Release the underlying tracks. Calling twice is harmless.
    fn stop(&mut self);
}
