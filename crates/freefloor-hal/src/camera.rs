//! `DepthSource` trait and the frames it produces.

use freefloor_perception::PinholeIntrinsics;
use freefloor_types::FloorError;
use image::RgbaImage;

/// A depth image in metres, row-major. `0.0` means "no return".
#[derive(Debug, Clone, PartialEq)]
pub struct DepthFrame {
    pub width: u32,
    pub height: u32,
    pub data: Vec<f32>,
}

impl DepthFrame {
    /// Reject frames without backing storage or with a buffer that does not
    /// match `width * height`.
    pub fn validate(&self) -> Result<(), FloorError> {
        validate_buffer("depth", self.width, self.height, 1, self.data.len())
    }
}

/// An RGB24 color image, row-major.
#[derive(Debug, Clone, PartialEq)]
pub struct ColorFrame {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

impl ColorFrame {
    pub fn validate(&self) -> Result<(), FloorError> {
        validate_buffer("color", self.width, self.height, 3, self.data.len())
    }

    /// Opaque RGBA copy used as the visualization canvas.
    pub fn to_rgba(&self) -> Result<RgbaImage, FloorError> {
        self.validate()?;
        let mut canvas = RgbaImage::new(self.width, self.height);
        for (dst, src) in canvas.pixels_mut().zip(self.data.chunks_exact(3)) {
            dst.0 = [src[0], src[1], src[2], 255];
        }
        Ok(canvas)
    }
}

fn validate_buffer(
    stream: &str,
    width: u32,
    height: u32,
    channels: usize,
    len: usize,
) -> Result<(), FloorError> {
    if len == 0 {
        return Err(FloorError::MalformedFrame {
            stream: stream.to_string(),
            details: "invalid image received (no pixel data)".to_string(),
        });
    }
    let expected = width as usize * height as usize * channels;
    if len != expected {
        return Err(FloorError::MalformedFrame {
            stream: stream.to_string(),
            details: format!("buffer holds {len} values, {width}x{height} needs {expected}"),
        });
    }
    Ok(())
}

/// An RGB-D sensor: synchronised depth and color streams plus the depth
/// intrinsics.
///
/// Backends are opened through the
/// [`DeviceRegistry`][crate::registry::DeviceRegistry].
pub trait DepthSource: Send {
    /// Device name, e.g. `"sim"`.
    fn id(&self) -> &str;

    /// Configured stream width in pixels.
    fn width(&self) -> u32;

    /// Configured stream height in pixels.
    fn height(&self) -> u32;

    /// # Errors
    ///
    /// Returns [`FloorError::IntrinsicsUnavailable`] when the device cannot
    /// report its depth intrinsics.
    fn intrinsics(&self) -> Result<PinholeIntrinsics, FloorError>;

    /// Fetch the next depth frame.
    fn depth_frame(&mut self) -> Result<DepthFrame, FloorError>;

    /// Fetch the color frame matching the last depth frame.
    fn color_frame(&mut self) -> Result<ColorFrame, FloorError>;

    /// Release the device. Calling it more than once is a no-op.
    fn close(&mut self);

    fn is_open(&self) -> bool;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_depth_frame_is_malformed() {
        let frame = DepthFrame {
            width: 2,
            height: 2,
            data: Vec::new(),
        };
        assert!(matches!(frame.validate(), Err(FloorError::MalformedFrame { .. })));
    }

    #[test]
    fn short_color_frame_is_malformed() {
        let frame = ColorFrame {
            width: 2,
            height: 1,
            data: vec![0; 5],
        };
        let err = frame.validate().unwrap_err();
        assert!(err.to_string().contains("needs 6"));
    }

    #[test]
    fn color_to_rgba_is_opaque_copy() {
        let frame = ColorFrame {
            width: 2,
            height: 1,
            data: vec![1, 2, 3, 4, 5, 6],
        };
        let canvas = frame.to_rgba().unwrap();
        assert_eq!(canvas.get_pixel(0, 0).0, [1, 2, 3, 255]);
        assert_eq!(canvas.get_pixel(1, 0).0, [4, 5, 6, 255]);
    }

    #[test]
    fn valid_depth_frame_passes() {
        let frame = DepthFrame {
            width: 3,
            height: 2,
            data: vec![1.0; 6],
        };
        assert!(frame.validate().is_ok());
    }
}
