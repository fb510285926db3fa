use std::path::Path;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use image::{imageops, imageops::FilterType, RgbImage};
use serde::Serialize;

use crate::models::ClipReference;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SurfaceSize {
    pub width: u32,
    pub height: u32,
}

impl SurfaceSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// One decoded frame, packed RGB24 at the source's native resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoFrame {
    pub index: u64,
    pub width: u32,
    pub height: u32,
    data: Arc<Vec<u8>>,
}

impl VideoFrame {
    pub fn new(index: u64, width: u32, height: u32, data: Vec<u8>) -> Self {
        Self {
            index,
            width,
            height,
            data: Arc::new(data),
        }
    }

    /// A single-colour frame, handy for cameras and clips without real media.
    pub fn filled(index: u64, width: u32, height: u32, rgb: [u8; 3]) -> Self {
        let pixels = width as usize * height as usize;
        let data = rgb.iter().copied().cycle().take(pixels * 3).collect();
        Self::new(index, width, height, data)
    }

    pub fn from_image(index: u64, image: &RgbImage) -> Self {
        Self::new(index, image.width(), image.height(), image.as_raw().clone())
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn to_image(&self) -> Option<RgbImage> {
        RgbImage::from_raw(self.width, self.height, self.data.as_ref().clone())
    }
}

/// Destination the sequencer copies frames onto.
///
/// Implementations scale every frame to their own fixed [`SurfaceSize`].
pub trait DrawingSurface: Send {
    fn size(&self) -> SurfaceSize;

    fn clear(&mut self);

    /// Copies `frame`, decoded from `source`, onto the surface.
    fn draw_frame(&mut self, source: &ClipReference, frame: &VideoFrame);

    /// Current contents, when the surface keeps them in memory.
    fn snapshot(&self) -> Option<RgbImage> {
        None
    }
}

/// In-memory RGB canvas.
pub struct FrameBufferSurface {
    canvas: RgbImage,
    frames_drawn: u64,
}

impl FrameBufferSurface {
    pub fn new(size: SurfaceSize) -> Self {
        Self {
            canvas: RgbImage::new(size.width, size.height),
            frames_drawn: 0,
        }
    }

    pub fn frames_drawn(&self) -> u64 {
        self.frames_drawn
    }
}

impl DrawingSurface for FrameBufferSurface {
    fn size(&self) -> SurfaceSize {
        SurfaceSize::new(self.canvas.width(), self.canvas.height())
    }

    fn clear(&mut self) {
        self.canvas.pixels_mut().for_each(|pixel| pixel.0 = [0, 0, 0]);
    }

    fn draw_frame(&mut self, source: &ClipReference, frame: &VideoFrame) {
        let Some(image) = frame.to_image() else {
            log::warn!(
                "dropping malformed frame {} from clip {} ({}x{}, {} bytes)",
                frame.index,
                source.key(),
                frame.width,
                frame.height,
                frame.data().len()
            );
            return;
        };

        let (width, height) = self.canvas.dimensions();
        if image.dimensions() == (width, height) {
            self.canvas = image;
        } else {
            self.canvas = imageops::resize(&image, width, height, FilterType::Triangle);
        }
        self.frames_drawn += 1;
    }

    fn snapshot(&self) -> Option<RgbImage> {
        Some(self.canvas.clone())
    }
}

/// Writes the surface contents to `path` as PNG.
pub fn save_snapshot(surface: &dyn DrawingSurface, path: &Path) -> Result<()> {
    let image = surface
        .snapshot()
        .ok_or_else(|| anyhow!("surface does not keep its contents in memory"))?;
    image
        .save_with_format(path, image::ImageFormat::Png)
        .with_context(|| format!("Failed to write surface to {}", path.display()))
}
