//! Decoded frames as they travel through the pipeline.

use image::{DynamicImage, GrayImage, RgbImage, RgbaImage};

use crate::{
    error::GrabError,
    format::{MediaFormat, Subtype},
    time::ReferenceTime,
};

/// One decoded video frame with its presentation span.
///
/// Pixel data is tightly packed (no row padding) in the layout named by
/// [`format`](Sample::format). Observers receive samples by reference; clone
/// the sample to keep it past the callback.
#[derive(Debug, Clone)]
pub struct Sample {
    format: MediaFormat,
    start: ReferenceTime,
    stop: ReferenceTime,
    data: Vec<u8>,
}

impl Sample {
    /// Wrap packed pixel data.
    pub fn new(
        format: MediaFormat,
        start: ReferenceTime,
        stop: ReferenceTime,
        data: Vec<u8>,
    ) -> Self {
        Self {
            format,
            start,
            stop,
            data,
        }
    }

    /// The format this frame was produced in.
    pub fn format(&self) -> &MediaFormat {
        &self.format
    }

    /// Presentation start time.
    pub fn start(&self) -> ReferenceTime {
        self.start
    }

    /// Presentation stop time.
    pub fn stop(&self) -> ReferenceTime {
        self.stop
    }

    /// Packed pixel bytes.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Consume the sample and take its pixel bytes.
    pub fn into_data(self) -> Vec<u8> {
        self.data
    }

    /// Convert to an [`image::DynamicImage`].
    ///
    /// # Errors
    ///
    /// Returns [`GrabError::VideoDecodeError`] if the buffer length does not
    /// match the format's dimensions.
    pub fn to_image(&self) -> Result<DynamicImage, GrabError> {
        let MediaFormat {
            width,
            height,
            subtype,
            ..
        } = self.format;
        let data = self.data.clone();
        let image = match subtype {
            Subtype::Rgb24 => RgbImage::from_raw(width, height, data).map(DynamicImage::ImageRgb8),
            Subtype::Rgba32 => {
                RgbaImage::from_raw(width, height, data).map(DynamicImage::ImageRgba8)
            }
            Subtype::Gray8 => {
                GrayImage::from_raw(width, height, data).map(DynamicImage::ImageLuma8)
            }
        };
        image.ok_or_else(|| {
            GrabError::VideoDecodeError(format!(
                "{} bytes do not form a {width}x{height} {subtype} image",
                self.data.len()
            ))
        })
    }
}
