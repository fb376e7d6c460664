//! Video frame types

use image::RgbImage;

/// Fallback size when a source reports zero dimensions
pub const DEFAULT_FRAME_WIDTH: u32 = 640;
pub const DEFAULT_FRAME_HEIGHT: u32 = 480;

/// Decoded RGB video frame
#[derive(Debug, Clone)]
pub struct VideoFrame {
    /// RGB pixel data (width * height * 3)
    pub data: Vec<u8>,
    /// Frame width
    pub width: u32,
    /// Frame height
    pub height: u32,
    /// Capture timestamp (nanoseconds since stream start)
    pub timestamp_ns: u64,
    /// Frame sequence number
    pub sequence: u32,
}

impl VideoFrame {
    /// Create a new video frame from raw RGB data
    pub fn new(data: Vec<u8>, width: u32, height: u32, timestamp_ns: u64, sequence: u32) -> Self {
        Self {
            data,
            width,
            height,
            timestamp_ns,
            sequence,
        }
    }

    /// Wrap an RGB image buffer
    pub fn from_rgb_image(img: RgbImage, timestamp_ns: u64, sequence: u32) -> Self {
        let (width, height) = img.dimensions();
        Self::new(img.into_raw(), width, height, timestamp_ns, sequence)
    }

    /// Frame size used for landmark scaling.
    ///
    /// Some sources report 0x0 until their first decoded frame; those fall
    /// back to 640x480.
    pub fn dimensions_or_default(&self) -> (u32, u32) {
        let width = if self.width == 0 { DEFAULT_FRAME_WIDTH } else { self.width };
        let height = if self.height == 0 { DEFAULT_FRAME_HEIGHT } else { self.height };
        (width, height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn test_from_rgb_image() {
        let img = RgbImage::from_pixel(4, 2, Rgb([10, 20, 30]));
        let frame = VideoFrame::from_rgb_image(img, 1_000, 7);
        assert_eq!(frame.data.len(), 4 * 2 * 3);
        assert_eq!(&frame.data[..3], &[10, 20, 30]);
        assert_eq!(frame.dimensions_or_default(), (4, 2));
        assert_eq!(frame.sequence, 7);
    }

    #[test]
    fn test_zero_size_falls_back() {
        let frame = VideoFrame::new(Vec::new(), 0, 0, 0, 0);
        assert_eq!(frame.dimensions_or_default(), (640, 480));
    }
}
