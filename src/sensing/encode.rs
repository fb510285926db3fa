use image::codecs::jpeg::JpegEncoder;

use crate::error::MediaError;
use crate::playback::VideoFrame;

/// Encodes a frame at its native resolution as JPEG.
pub fn encode_jpeg(frame: &VideoFrame, quality: u8) -> Result<Vec<u8>, MediaError> {
    let image = frame.to_image().ok_or_else(|| {
        MediaError::Encode(format!(
            "frame {} has {} bytes for {}x{}",
            frame.index,
            frame.data().len(),
            frame.width,
            frame.height
        ))
    })?;

    let mut jpeg = Vec::new();
    JpegEncoder::new_with_quality(&mut jpeg, quality.clamp(1, 100))
        .encode_image(&image)
        .map_err(|err| MediaError::Encode(err.to_string()))?;
    Ok(jpeg)
}
