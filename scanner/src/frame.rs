use image::imageops::flip_horizontal_in_place;
use image::RgbaImage;
use log::debug;

use base::defs::{Error, ErrorKind::*, Result};

use crate::subsystem::CameraSubsystem;

pub type PixelBuffer = RgbaImage;

/// Pulls the camera's latest frame into an owned buffer oriented like mesh
/// space (rotated, then mirrored).
pub fn acquire_frame(camera: &mut dyn CameraSubsystem) -> Result<PixelBuffer> {
    let image = camera.try_acquire_latest_frame().ok_or_else(|| {
        Error::new(NoFrameAvailable, "camera holds no frame".to_string())
    })?;

    // The native image is released when `image` drops, on every path below.
    let raw = image.convert_rgba()?;
    if raw.dimensions() != (image.width(), image.height()) {
        let desc = format!(
            "converted frame is {}x{}, native image is {}x{}",
            raw.width(),
            raw.height(),
            image.width(),
            image.height()
        );
        return Err(Error::new(MalformedData, desc));
    }

    debug!("acquired {}x{} camera frame", raw.width(), raw.height());
    Ok(orient(&raw))
}

pub fn orient(raw: &PixelBuffer) -> PixelBuffer {
    let mut buffer = rotate_clockwise(raw);
    flip_horizontal_in_place(&mut buffer);
    buffer
}

/// Remaps `(x, y)` to `(y, width - 1 - x)`; width and height swap.
pub fn rotate_clockwise(src: &PixelBuffer) -> PixelBuffer {
    let (width, height) = src.dimensions();
    PixelBuffer::from_fn(height, width, |x, y| *src.get_pixel(width - 1 - y, x))
}
