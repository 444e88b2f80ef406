//! A lossless, single-pass encoder for the [QOI image format](https://qoiformat.org).
//!
//! An [`Image`] wraps an already decoded, top-down pixel buffer. It is
//! validated once at construction, after which [`encode_to_vec`] or
//! [`write_to_sink`] turn it into a QOI byte stream. Loading the pixels from
//! another format is left to the `image` crate, see [`load_image`].
//!
//! ```
//! use qoi_encoder::{Image, encode_to_vec};
//!
//! // Two opaque black pixels, the color every encode starts from.
//! let image = Image::new(vec![0; 6], 2, 1, 3).unwrap();
//! let qoi = encode_to_vec(&image).unwrap();
//! // Header, a single run chunk and the end marker.
//! assert_eq!(qoi.len(), 14 + 1 + 8);
//! ```

pub mod consts;
mod decode;
mod encode;
mod error;
mod file;
mod image;
mod pixel;
mod sink;

pub use decode::*;
pub use encode::*;
pub use error::EncodeError;
pub use file::*;
pub use crate::image::Image;
pub use pixel::Pixel;
pub use sink::{BlockSink, DEFAULT_BLOCK_SIZE};

use consts::{QOI_HEADER_LEN, QOI_MAGIC};

/// The 14-byte header that opens every QOI stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Header {
    pub width: u32,
    pub height: u32,
    pub channels: Channels,
    pub colorspace: Colorspace,
}

impl Header {
    /// Serializes the header, all multi-byte fields big-endian.
    pub fn to_bytes(&self) -> [u8; QOI_HEADER_LEN] {
        let mut bytes = [0u8; QOI_HEADER_LEN];
        bytes[0..4].copy_from_slice(&QOI_MAGIC.to_be_bytes());
        bytes[4..8].copy_from_slice(&self.width.to_be_bytes());
        bytes[8..12].copy_from_slice(&self.height.to_be_bytes());
        bytes[12] = self.channels as u8;
        bytes[13] = self.colorspace as u8;
        bytes
    }

    /// `None` when `width * height` does not fit in a `usize`.
    pub fn n_pixels(&self) -> Option<usize> {
        (self.width as usize).checked_mul(self.height as usize)
    }

    /// Length of the decoded pixel buffer, `None` on overflow.
    pub fn pixel_bytes(&self) -> Option<usize> {
        self.n_pixels()?.checked_mul(self.channels.count())
    }
}

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Channels {
    #[default]
    Rgb = 3,
    Rgba = 4,
}

impl Channels {
    pub(crate) fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            3 => Some(Self::Rgb),
            4 => Some(Self::Rgba),
            _ => None,
        }
    }

    /// Bytes per pixel.
    pub const fn count(self) -> usize {
        self as usize
    }
}

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Colorspace {
    #[default]
    /// sRGB with linear alpha.
    Srgb = 0,
    /// All channels linear.
    Linear = 1,
}

impl Colorspace {
    pub(crate) fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0 => Some(Self::Srgb),
            1 => Some(Self::Linear),
            _ => None,
        }
    }
}
