//! Borrowed frame views handed to the inference pipeline.
//!
//! The kernel never owns pixel data. Capture, decoding and full format
//! conversion stay with the caller; the pipeline receives an `ImageView`
//! whose geometry has already been validated, so later stages can index the
//! buffer without re-checking.

use crate::error::PipelineError;

/// Pixel layouts accepted by the pipeline.
#[non_exhaustive]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PixelFormat {
    /// 3 bytes per pixel, R G B.
    Rgb888,
    /// 1 byte per pixel.
    Grayscale,
    /// 2 bytes per pixel, Y U Y V pairs. Only luma is sampled.
    Yuv422,
}

impl PixelFormat {
    /// Bytes required for one `width * height` frame in this layout.
    pub fn frame_bytes(self, width: u32, height: u32) -> usize {
        let pixels = width as usize * height as usize;
        match self {
            PixelFormat::Rgb888 => pixels * 3,
            PixelFormat::Grayscale => pixels,
            PixelFormat::Yuv422 => pixels * 2,
        }
    }

    fn bytes_per_pixel(self) -> usize {
        match self {
            PixelFormat::Rgb888 => 3,
            PixelFormat::Grayscale => 1,
            PixelFormat::Yuv422 => 2,
        }
    }
}

/// Read-only view of one captured frame.
#[derive(Debug)]
pub struct ImageView<'a> {
    data: &'a [u8],
    width: u32,
    height: u32,
    format: PixelFormat,
}

impl<'a> ImageView<'a> {
    /// Wrap a pixel buffer. Fails when the buffer length does not match the
    /// declared geometry; a mismatched frame must never reach the engine.
    pub fn new(
        data: &'a [u8],
        width: u32,
        height: u32,
        format: PixelFormat,
    ) -> Result<Self, PipelineError> {
        let expected = format.frame_bytes(width, height);
        if data.len() != expected {
            return Err(PipelineError::ImageSize {
                expected,
                actual: data.len(),
            });
        }
        Ok(Self {
            data,
            width,
            height,
            format,
        })
    }

    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    /// Luma value of the pixel at (x, y), clamped to the frame edge.
    ///
    /// This is the sampling primitive the pipeline uses to fill model input
    /// tensors; it collapses every supported layout to one brightness byte.
    pub fn luma_at(&self, x: u32, y: u32) -> u8 {
        let x = x.min(self.width.saturating_sub(1)) as usize;
        let y = y.min(self.height.saturating_sub(1)) as usize;
        let idx = (y * self.width as usize + x) * self.format.bytes_per_pixel();
        match self.format {
            PixelFormat::Rgb888 => {
                let r = self.data[idx] as u16;
                let g = self.data[idx + 1] as u16;
                let b = self.data[idx + 2] as u16;
                ((r + g + b) / 3) as u8
            }
            PixelFormat::Grayscale => self.data[idx],
            // YUYV: even pixels carry luma at offset 0, odd at offset 0 too
            // (each 2-byte cell starts with its own Y).
            PixelFormat::Yuv422 => self.data[idx],
        }
    }
}
