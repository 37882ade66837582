//! Media formats: what a stage accepts and what a connection negotiated.
//!
//! An [`AcceptedFormat`] is a partially specified predicate set on the
//! capture stage before the pipeline is assembled ("video, any subtype" or
//! "video, 24-bit RGB"). A [`MediaFormat`] is the fully specified format a
//! connection actually settled on.

use std::{
    fmt::{Display, Formatter, Result as FmtResult},
    str::FromStr,
};

use ffmpeg_next::format::Pixel;

/// Major media category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MajorType {
    /// Decoded video frames.
    Video,
    /// Decoded audio buffers. No bundled source produces these.
    Audio,
}

/// Packed pixel layout of a decoded video frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Subtype {
    /// 8-bit RGB (24 bpp). This is the default.
    #[default]
    Rgb24,
    /// 8-bit RGBA with opaque alpha (32 bpp).
    Rgba32,
    /// 8-bit grayscale (8 bpp).
    Gray8,
}

impl Subtype {
    /// Every subtype the bundled source can convert decoded frames into, in
    /// the order it offers them during negotiation.
    pub const ALL: [Subtype; 3] = [Subtype::Rgb24, Subtype::Rgba32, Subtype::Gray8];

    /// Bytes per pixel in the packed layout.
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            Subtype::Rgb24 => 3,
            Subtype::Rgba32 => 4,
            Subtype::Gray8 => 1,
        }
    }

    /// Map to the corresponding FFmpeg pixel format.
    pub(crate) fn to_ffmpeg_pixel(self) -> Pixel {
        match self {
            Subtype::Rgb24 => Pixel::RGB24,
            Subtype::Rgba32 => Pixel::RGBA,
            Subtype::Gray8 => Pixel::GRAY8,
        }
    }

    fn name(self) -> &'static str {
        match self {
            Subtype::Rgb24 => "rgb24",
            Subtype::Rgba32 => "rgba32",
            Subtype::Gray8 => "gray8",
        }
    }
}

impl Display for Subtype {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.name())
    }
}

impl FromStr for Subtype {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "rgb24" | "rgb8" | "rgb" => Ok(Subtype::Rgb24),
            "rgba32" | "rgba8" | "rgba" => Ok(Subtype::Rgba32),
            "gray8" | "gray" | "grey" | "grayscale" => Ok(Subtype::Gray8),
            other => Err(format!("unsupported pixel subtype: {other}")),
        }
    }
}

/// A fully specified, negotiated media format.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MediaFormat {
    /// Major category.
    pub major: MajorType,
    /// Pixel layout.
    pub subtype: Subtype,
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// Average frame rate, or `0.0` when unknown.
    pub frames_per_second: f64,
}

impl MediaFormat {
    /// A video format with the given layout and dimensions.
    pub fn video(subtype: Subtype, width: u32, height: u32, frames_per_second: f64) -> Self {
        Self {
            major: MajorType::Video,
            subtype,
            width,
            height,
            frames_per_second,
        }
    }

    /// Size in bytes of one tightly packed frame.
    pub fn frame_size(&self) -> usize {
        self.width as usize * self.height as usize * self.subtype.bytes_per_pixel()
    }
}

impl Display for MediaFormat {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(
            f,
            "{:?}/{} {}x{} @ {:.2} fps",
            self.major, self.subtype, self.width, self.height, self.frames_per_second
        )
    }
}

/// Predicate over (major type, subtype) describing which frames the capture
/// stage will surface.
///
/// # Example
///
/// ```
/// use framegrab::{AcceptedFormat, MediaFormat, Subtype};
///
/// let accepted = AcceptedFormat::video(Subtype::Rgb24);
/// assert!(accepted.accepts(&MediaFormat::video(Subtype::Rgb24, 640, 480, 25.0)));
/// assert!(!accepted.accepts(&MediaFormat::video(Subtype::Gray8, 640, 480, 25.0)));
/// assert!(AcceptedFormat::any_video().accepts(&MediaFormat::video(Subtype::Gray8, 1, 1, 0.0)));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AcceptedFormat {
    /// Required major type.
    pub major: MajorType,
    /// Required subtype, or `None` for any.
    pub subtype: Option<Subtype>,
}

impl AcceptedFormat {
    /// Video frames in exactly the given layout.
    pub fn video(subtype: Subtype) -> Self {
        Self {
            major: MajorType::Video,
            subtype: Some(subtype),
        }
    }

    /// Video frames in any layout.
    pub fn any_video() -> Self {
        Self {
            major: MajorType::Video,
            subtype: None,
        }
    }

    /// Returns `true` if `format` satisfies this predicate.
    pub fn accepts(&self, format: &MediaFormat) -> bool {
        self.major == format.major && self.subtype.is_none_or(|subtype| subtype == format.subtype)
    }
}

impl Default for AcceptedFormat {
    fn default() -> Self {
        Self::video(Subtype::Rgb24)
    }
}

impl Display for AcceptedFormat {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self.subtype {
            Some(subtype) => write!(f, "{:?}/{subtype}", self.major),
            None => write!(f, "{:?}/*", self.major),
        }
    }
}
