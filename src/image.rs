use crate::{Channels, Colorspace, EncodeError, Header, Pixel, consts::QOI_HEADER_LEN};

/// A decoded raster image: interleaved 8-bit channels, top-down and
/// left-to-right.
///
/// The buffer is validated against the dimensions once in [`Image::new`] and
/// is never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Image {
    pixels: Vec<u8>,
    header: Header,
}

impl Image {
    /// Wraps a pixel buffer, tagged as sRGB.
    ///
    /// Fails if either dimension is zero, if `channels` is neither 3 nor 4, or
    /// if `pixels.len() != width * height * channels`.
    pub fn new(pixels: Vec<u8>, width: u32, height: u32, channels: u8) -> Result<Self, EncodeError> {
        if width == 0 || height == 0 {
            return Err(EncodeError::InvalidDimensions { width, height });
        }
        let channels =
            Channels::from_byte(channels).ok_or(EncodeError::UnsupportedChannels { channels })?;
        let expected = (width as usize)
            .checked_mul(height as usize)
            .and_then(|n| n.checked_mul(channels.count()))
            .ok_or(EncodeError::InvalidDimensions { width, height })?;
        if pixels.len() != expected {
            return Err(EncodeError::BufferLength {
                expected,
                actual: pixels.len(),
            });
        }
        Ok(Self {
            pixels,
            header: Header {
                width,
                height,
                channels,
                colorspace: Colorspace::Srgb,
            },
        })
    }

    pub fn with_colorspace(mut self, colorspace: Colorspace) -> Self {
        self.header.colorspace = colorspace;
        self
    }

    pub fn width(&self) -> u32 {
        self.header.width
    }

    pub fn height(&self) -> u32 {
        self.header.height
    }

    pub fn channels(&self) -> Channels {
        self.header.channels
    }

    pub fn colorspace(&self) -> Colorspace {
        self.header.colorspace
    }

    pub fn meta(&self) -> Header {
        self.header
    }

    /// The raw interleaved channel bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.pixels
    }

    /// The 14-byte QOI header describing this image.
    pub fn header(&self) -> [u8; QOI_HEADER_LEN] {
        self.header.to_bytes()
    }

    /// Reads the pixel starting at `offset` bytes into the buffer. Alpha is
    /// 255 for RGB images.
    ///
    /// `offset` must be a multiple of the channel count and leave a whole
    /// pixel before the end of the buffer. Violating either is a bug in the
    /// caller's scan, reported as an error instead of a panic.
    pub fn pixel_at(&self, offset: usize) -> Result<Pixel, EncodeError> {
        let n = self.header.channels.count();
        if offset % n != 0 {
            return Err(EncodeError::MisalignedOffset {
                offset,
                channels: n as u8,
            });
        }
        let bytes = offset
            .checked_add(n)
            .and_then(|end| self.pixels.get(offset..end))
            .ok_or(EncodeError::PixelOutOfBounds {
                offset,
                len: self.pixels.len(),
            })?;
        Ok(Pixel::rgba(
            bytes[0],
            bytes[1],
            bytes[2],
            bytes.get(3).copied().unwrap_or(255),
        ))
    }

    /// Byte offsets of every pixel, in scan order.
    pub(crate) fn offsets(&self) -> impl Iterator<Item = usize> {
        (0..self.pixels.len()).step_by(self.header.channels.count())
    }
}
