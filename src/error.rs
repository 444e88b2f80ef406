use std::io;

use derive_more::{Display, Error, From};

/// Everything that can abort building or encoding an [`Image`](crate::Image).
///
/// Malformed input is caught when the image is constructed, so an encode of a
/// valid image only fails when the sink does.
#[derive(Debug, Display, Error, From)]
pub enum EncodeError {
    #[display("invalid image dimensions {width}x{height}, both must be non-zero")]
    InvalidDimensions { width: u32, height: u32 },
    #[display("unsupported channel count {channels}, expected 3 or 4")]
    UnsupportedChannels { channels: u8 },
    #[display("pixel buffer holds {actual} bytes, expected {expected}")]
    BufferLength { expected: usize, actual: usize },
    #[display("pixel at byte offset {offset} runs past the end of a {len} byte buffer")]
    PixelOutOfBounds { offset: usize, len: usize },
    #[display("byte offset {offset} is not a multiple of {channels} channels")]
    MisalignedOffset { offset: usize, channels: u8 },
    /// Failure of the sink or of the storage behind it.
    #[display("{_0}")]
    #[from]
    Io(#[error(source)] io::Error),
    /// Failure of the `image` crate while loading a source image.
    #[display("{_0}")]
    #[from]
    Image(#[error(source)] ::image::ImageError),
}

impl EncodeError {
    /// Whether this error was caused by the input pixel data rather than by
    /// the sink or the image loader.
    pub fn is_malformed_input(&self) -> bool {
        matches!(
            self,
            Self::InvalidDimensions { .. }
                | Self::UnsupportedChannels { .. }
                | Self::BufferLength { .. }
        )
    }
}
