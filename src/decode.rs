use std::io::{self, Cursor, Read};

use derive_more::{Display, Error, From};

use crate::{
    Channels, Colorspace, Header, Pixel,
    consts::{
        QOI_END_MARKER, QOI_INDEX_SIZE, QOI_MAGIC, QOI_MASK_2, QOI_MASK_6, QOI_OP_DIFF,
        QOI_OP_INDEX, QOI_OP_LUMA, QOI_OP_RGB, QOI_OP_RGBA, QOI_OP_RUN,
    },
};

/// Upper limit on the output buffer reserved before any chunk is read.
const MAX_RESERVE: usize = 1 << 20;

/// Decodes a QOI stream back into interleaved pixel bytes with as many
/// channels as the header declares.
pub fn decode(input: &mut impl Read) -> Result<(Header, Vec<u8>), DecodeError> {
    let header = decode_header(input)?;
    let (n_pixels, len) = header
        .n_pixels()
        .zip(header.pixel_bytes())
        .ok_or(DecodeError::InvalidDimensions {
            width: header.width,
            height: header.height,
        })?;
    let mut decoder = Decoder::new(header);
    // The header is untrusted, the buffer grows with the chunks actually read.
    let mut output = Vec::with_capacity(len.min(MAX_RESERVE));
    while decoder.n_pixels < n_pixels {
        decoder.decode_chunk(input, &mut output)?;
    }
    // A run may overshoot the image, the surplus is dropped.
    output.truncate(len);
    verify_end_marker(input)?;
    Ok((header, output))
}

/// Convenience function that calls `decode`.
pub fn decode_from_slice(bytes: &[u8]) -> Result<(Header, Vec<u8>), DecodeError> {
    decode(&mut Cursor::new(bytes))
}

#[derive(Debug, Display, Error, From)]
pub enum DecodeError {
    #[display("{_0}")]
    #[from]
    Io(#[error(source)] io::Error),
    #[display("missing `qoif` magic bytes")]
    InvalidMagic,
    #[display("invalid channel count {channels}")]
    InvalidChannels { channels: u8 },
    #[display("image dimensions {width}x{height} are too large")]
    InvalidDimensions { width: u32, height: u32 },
    #[display("invalid colorspace {colorspace}")]
    InvalidColorspace { colorspace: u8 },
    #[display("stream does not end with the QOI end marker")]
    InvalidEndMarker,
}

pub(crate) trait ReadExt: Read {
    fn read_byte(&mut self) -> io::Result<u8> {
        let [byte] = self.read_array::<1>()?;
        Ok(byte)
    }

    fn read_array<const N: usize>(&mut self) -> io::Result<[u8; N]> {
        let mut result = [0u8; N];
        self.read_exact(&mut result)?;
        Ok(result)
    }
}

impl<R: Read> ReadExt for R {}

pub(crate) fn decode_header(stream: &mut impl Read) -> Result<Header, DecodeError> {
    if u32::from_be_bytes(stream.read_array()?) != QOI_MAGIC {
        return Err(DecodeError::InvalidMagic);
    }
    let width = u32::from_be_bytes(stream.read_array()?);
    let height = u32::from_be_bytes(stream.read_array()?);
    let channels = stream.read_byte()?;
    let colorspace = stream.read_byte()?;
    Ok(Header {
        width,
        height,
        channels: Channels::from_byte(channels).ok_or(DecodeError::InvalidChannels { channels })?,
        colorspace: Colorspace::from_byte(colorspace)
            .ok_or(DecodeError::InvalidColorspace { colorspace })?,
    })
}

fn verify_end_marker(stream: &mut impl Read) -> Result<(), DecodeError> {
    if stream.read_array::<8>()? != QOI_END_MARKER {
        return Err(DecodeError::InvalidEndMarker);
    }
    Ok(())
}

/// Splits a 2-bit field at `shift` into a delta with bias `2` removed.
fn diff2(byte: u8, shift: u8) -> i8 {
    ((byte >> shift) & 0b11) as i8 - 2
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct Decoder {
    pub(crate) header: Header,
    pub(crate) index_array: [Pixel; QOI_INDEX_SIZE],
    pub(crate) previous_pixel: Pixel,
    /// Number of pixels already decoded.
    pub(crate) n_pixels: usize,
}

impl Decoder {
    pub(crate) fn new(header: Header) -> Self {
        Self {
            header,
            index_array: [Pixel::TRANSPARENT_BLACK; QOI_INDEX_SIZE],
            previous_pixel: Pixel::OPAQUE_BLACK,
            n_pixels: 0,
        }
    }

    pub(crate) fn decode_chunk(
        &mut self,
        stream: &mut impl Read,
        output: &mut Vec<u8>,
    ) -> Result<(), DecodeError> {
        let previous = self.previous_pixel;
        let mut run = 1;
        let pixel = match stream.read_byte()? {
            QOI_OP_RGB => {
                let [r, g, b] = stream.read_array()?;
                Pixel::rgba(r, g, b, previous.a())
            }
            QOI_OP_RGBA => Pixel::from(stream.read_array::<4>()?),
            byte0 => match byte0 & QOI_MASK_2 {
                QOI_OP_INDEX => self.index_array[usize::from(byte0 & QOI_MASK_6)],
                QOI_OP_DIFF => Pixel::rgba(
                    previous.r().wrapping_add_signed(diff2(byte0, 4)),
                    previous.g().wrapping_add_signed(diff2(byte0, 2)),
                    previous.b().wrapping_add_signed(diff2(byte0, 0)),
                    previous.a(),
                ),
                QOI_OP_LUMA => {
                    let byte1 = stream.read_byte()?;
                    let dg = (byte0 & QOI_MASK_6) as i8 - 32;
                    let dr_dg = (byte1 >> 4) as i8 - 8;
                    let db_dg = (byte1 & 0x0f) as i8 - 8;
                    Pixel::rgba(
                        previous.r().wrapping_add_signed(dg).wrapping_add_signed(dr_dg),
                        previous.g().wrapping_add_signed(dg),
                        previous.b().wrapping_add_signed(dg).wrapping_add_signed(db_dg),
                        previous.a(),
                    )
                }
                // QOI_OP_RUN, the only remaining tag.
                _ => {
                    debug_assert_eq!(byte0 & QOI_MASK_2, QOI_OP_RUN);
                    run = usize::from(byte0 & QOI_MASK_6) + 1;
                    previous
                }
            },
        };
        self.index_array[usize::from(pixel.hash())] = pixel;
        self.previous_pixel = pixel;
        self.n_pixels += run;
        for _ in 0..run {
            output.extend_from_slice(pixel.to_bytes(self.header.channels));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stream(header: Header, chunks: &[u8]) -> Vec<u8> {
        [&header.to_bytes()[..], chunks, &QOI_END_MARKER].concat()
    }

    fn rgb(width: u32, height: u32) -> Header {
        Header {
            width,
            height,
            channels: Channels::Rgb,
            colorspace: Colorspace::Srgb,
        }
    }

    #[test]
    fn decodes_every_chunk_kind() {
        let chunks = [
            0xfe, 100, 100, 100, // rgb
            0x40 | 3 << 4 | 2 << 2 | 1, // diff (+1, 0, -1)
            0x80 | 40, 0, // luma dg = 8, dr - dg = -8, db - dg = -8
            0xc1, // run of 2
            QOI_OP_INDEX | Pixel::rgb(100, 100, 100).hash(),
        ];
        let (header, pixels) = decode_from_slice(&stream(rgb(6, 1), &chunks)).unwrap();
        assert_eq!(header, rgb(6, 1));
        assert_eq!(
            pixels,
            vec![
                100, 100, 100, //
                101, 100, 99, //
                101, 108, 99, //
                101, 108, 99, //
                101, 108, 99, //
                100, 100, 100,
            ]
        );
    }

    #[test]
    fn rgb_chunk_keeps_previous_alpha() {
        let header = Header {
            channels: Channels::Rgba,
            ..rgb(2, 1)
        };
        let chunks = [0xff, 1, 2, 3, 4, 0xfe, 5, 6, 7];
        let (_, pixels) = decode_from_slice(&stream(header, &chunks)).unwrap();
        assert_eq!(pixels, vec![1, 2, 3, 4, 5, 6, 7, 4]);
    }

    #[test]
    fn rejects_bad_header() {
        let mut bytes = stream(rgb(1, 1), &[0xc0]);
        bytes[0] = b'Q';
        assert!(matches!(
            decode_from_slice(&bytes),
            Err(DecodeError::InvalidMagic)
        ));

        let mut bytes = stream(rgb(1, 1), &[0xc0]);
        bytes[12] = 5;
        assert!(matches!(
            decode_from_slice(&bytes),
            Err(DecodeError::InvalidChannels { channels: 5 })
        ));

        let mut bytes = stream(rgb(1, 1), &[0xc0]);
        bytes[13] = 2;
        assert!(matches!(
            decode_from_slice(&bytes),
            Err(DecodeError::InvalidColorspace { colorspace: 2 })
        ));
    }

    #[test]
    fn rejects_bad_end_marker() {
        let mut bytes = stream(rgb(1, 1), &[0xc0]);
        *bytes.last_mut().unwrap() = 0;
        assert!(matches!(
            decode_from_slice(&bytes),
            Err(DecodeError::InvalidEndMarker)
        ));
    }

    #[test]
    fn oversized_header_is_rejected() {
        let header = Header {
            width: u32::MAX,
            height: u32::MAX,
            channels: Channels::Rgba,
            colorspace: Colorspace::Srgb,
        };
        assert!(matches!(
            decode_from_slice(&header.to_bytes()),
            Err(DecodeError::InvalidDimensions {
                width: u32::MAX,
                height: u32::MAX
            })
        ));
    }

    #[test]
    fn large_header_without_chunks_fails_on_read() {
        // Claims 16 GiB of pixels, must fail on the missing chunks instead of
        // reserving the whole buffer up front.
        let header = Header {
            width: 65536,
            height: 65536,
            channels: Channels::Rgba,
            colorspace: Colorspace::Srgb,
        };
        assert!(matches!(
            decode_from_slice(&header.to_bytes()),
            Err(DecodeError::Io(_))
        ));
    }

    #[test]
    fn truncated_stream_is_io_error() {
        let bytes = stream(rgb(2, 1), &[0xfe, 1, 2]);
        let bytes = &bytes[..14 + 3];
        assert!(matches!(decode_from_slice(bytes), Err(DecodeError::Io(_))));
    }
}
