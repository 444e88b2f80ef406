use std::io::{self, Write};

use log::debug;

use crate::{
    Channels, EncodeError, Header, Image, Pixel,
    consts::{
        QOI_END_MARKER, QOI_HEADER_LEN, QOI_INDEX_SIZE, QOI_MAX_RUN, QOI_OP_DIFF, QOI_OP_INDEX,
        QOI_OP_LUMA, QOI_OP_RGB, QOI_OP_RGBA, QOI_OP_RUN,
    },
};

/// Encodes `image` into a freshly allocated QOI byte stream.
pub fn encode_to_vec(image: &Image) -> Result<Vec<u8>, EncodeError> {
    let mut output = Vec::with_capacity(worst_case_len(&image.meta()).unwrap_or_default());
    write_to_sink(image, &mut output)?;
    Ok(output)
}

/// Encodes `image` into `sink`: header, chunks, then the end marker.
///
/// Chunks are written a few bytes at a time, so `sink` should buffer, see
/// [`BlockSink`](crate::BlockSink). The sink is not flushed.
pub fn write_to_sink(image: &Image, sink: impl Write) -> Result<ChunkStats, EncodeError> {
    let mut encoder = EncoderState::new(image.channels(), sink);
    encoder.encode_header(&image.meta())?;
    for offset in image.offsets() {
        encoder.encode_pixel(image.pixel_at(offset)?)?;
    }
    Ok(encoder.finish()?)
}

/// Encodes an arbitrary pixel stream against `header`.
///
/// Unlike [`write_to_sink`] nothing checks that the number of pixels agrees
/// with the header's dimensions. An empty stream produces only the header and
/// the end marker.
pub fn encode_pixels(
    header: Header,
    pixels: impl IntoIterator<Item = Pixel>,
    output: impl Write,
) -> io::Result<ChunkStats> {
    let mut encoder = EncoderState::new(header.channels, output);
    encoder.encode_header(&header)?;
    for pixel in pixels {
        encoder.encode_pixel(pixel)?;
    }
    encoder.finish()
}

/// Upper bound on the size of an encoded image: every pixel as a raw chunk.
/// `None` if that bound does not fit in a `usize`.
pub fn worst_case_len(header: &Header) -> Option<usize> {
    header
        .n_pixels()?
        .checked_mul(header.channels.count() + 1)?
        .checked_add(QOI_HEADER_LEN + QOI_END_MARKER.len())
}

/// How many chunks of each kind an encode emitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ChunkStats {
    pub index: usize,
    pub diff: usize,
    pub luma: usize,
    pub run: usize,
    pub raw: usize,
    /// Pixels consumed.
    pub pixels: usize,
    /// Bytes written, including header and end marker.
    pub bytes: usize,
}

impl ChunkStats {
    pub fn chunks(&self) -> usize {
        self.index + self.diff + self.luma + self.run + self.raw
    }

    fn record(&mut self, chunk: &Chunk) {
        match chunk {
            Chunk::Index(_) => self.index += 1,
            Chunk::Diff { .. } => self.diff += 1,
            Chunk::Luma { .. } => self.luma += 1,
            Chunk::Run(_) => self.run += 1,
            Chunk::Raw(..) => self.raw += 1,
        }
        self.bytes += chunk.len();
    }
}

/// One unit of the QOI chunk stream, with biases not yet applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Chunk {
    /// Slot of the index cache, `0..64`.
    Index(u8),
    /// Each delta in `-2..=1`.
    Diff { dr: i8, dg: i8, db: i8 },
    /// `dg` in `-32..=31`, `dr_dg` and `db_dg` in `-8..=7`.
    Luma { dg: i8, dr_dg: i8, db_dg: i8 },
    /// Run length, `1..=62`.
    Run(u8),
    /// Literal pixel, written with as many channels as the image has.
    Raw(Pixel, Channels),
}

impl Chunk {
    pub(crate) fn len(&self) -> usize {
        match self {
            Self::Index(_) | Self::Diff { .. } | Self::Run(_) => 1,
            Self::Luma { .. } => 2,
            Self::Raw(_, channels) => 1 + channels.count(),
        }
    }

    pub(crate) fn write_to(&self, output: &mut impl Write) -> io::Result<()> {
        match *self {
            Self::Index(index) => output.write_all(&[QOI_OP_INDEX | index]),
            Self::Diff { dr, dg, db } => {
                let [dr, dg, db] = [dr, dg, db].map(|d| (d + 2) as u8);
                output.write_all(&[QOI_OP_DIFF | (dr << 4) | (dg << 2) | db])
            }
            Self::Luma { dg, dr_dg, db_dg } => {
                let dg = (dg + 32) as u8;
                let dr_dg = (dr_dg + 8) as u8;
                let db_dg = (db_dg + 8) as u8;
                output.write_all(&[QOI_OP_LUMA | dg, (dr_dg << 4) | db_dg])
            }
            Self::Run(run) => output.write_all(&[QOI_OP_RUN | (run - 1)]),
            Self::Raw(pixel, channels) => {
                let tag = match channels {
                    Channels::Rgb => QOI_OP_RGB,
                    Channels::Rgba => QOI_OP_RGBA,
                };
                output.write_all(&[tag])?;
                output.write_all(pixel.to_bytes(channels))
            }
        }
    }
}

/// Tries the two delta encodings of `current` against `previous`. Only valid
/// when both share the same alpha.
fn delta_chunk(current: Pixel, previous: Pixel) -> Option<Chunk> {
    #[inline(always)]
    fn d(current: u8, previous: u8) -> i8 {
        current.wrapping_sub(previous) as i8
    }
    let dr = d(current.r(), previous.r());
    let dg = d(current.g(), previous.g());
    let db = d(current.b(), previous.b());

    let small = -2..=1;
    if small.contains(&dr) && small.contains(&dg) && small.contains(&db) {
        return Some(Chunk::Diff { dr, dg, db });
    }

    // Widened, `dr - dg` can leave the `i8` range.
    let dr_dg = i16::from(dr) - i16::from(dg);
    let db_dg = i16::from(db) - i16::from(dg);
    if (-32..=31).contains(&dg) && (-8..=7).contains(&dr_dg) && (-8..=7).contains(&db_dg) {
        return Some(Chunk::Luma {
            dg,
            dr_dg: dr_dg as i8,
            db_dg: db_dg as i8,
        });
    }
    None
}

/// Scan state of one encode. Never shared between encodes.
#[derive(Debug)]
pub(crate) struct EncoderState<W: Write> {
    pub(crate) channels: Channels,
    pub(crate) index_array: [Pixel; QOI_INDEX_SIZE],
    pub(crate) previous_pixel: Pixel,
    pub(crate) run_length: u8,
    pub(crate) output: W,
    pub(crate) stats: ChunkStats,
}

impl<W: Write> EncoderState<W> {
    pub(crate) fn new(channels: Channels, output: W) -> Self {
        Self {
            channels,
            index_array: [Pixel::TRANSPARENT_BLACK; QOI_INDEX_SIZE],
            previous_pixel: Pixel::OPAQUE_BLACK,
            run_length: 0,
            output,
            stats: ChunkStats::default(),
        }
    }

    pub(crate) fn encode_header(&mut self, header: &Header) -> io::Result<()> {
        debug!(
            "encoding {}x{} image, {:?}, {:?}",
            header.width, header.height, header.channels, header.colorspace
        );
        let bytes = header.to_bytes();
        self.output.write_all(&bytes)?;
        self.stats.bytes += bytes.len();
        Ok(())
    }

    fn emit(&mut self, chunk: Chunk) -> io::Result<()> {
        chunk.write_to(&mut self.output)?;
        self.stats.record(&chunk);
        Ok(())
    }

    fn flush_run(&mut self) -> io::Result<()> {
        if self.run_length > 0 {
            self.emit(Chunk::Run(self.run_length))?;
            self.run_length = 0;
        }
        Ok(())
    }

    /// Picks the chunk for `pixel`, cheapest first.
    pub(crate) fn choose_chunk(&mut self, pixel: Pixel) -> Chunk {
        let hash = pixel.hash();
        let slot = &mut self.index_array[hash as usize];
        if *slot == pixel {
            return Chunk::Index(hash);
        }
        *slot = pixel;

        if pixel.a() == self.previous_pixel.a() {
            if let Some(chunk) = delta_chunk(pixel, self.previous_pixel) {
                return chunk;
            }
        }
        Chunk::Raw(pixel, self.channels)
    }

    pub(crate) fn encode_pixel(&mut self, pixel: Pixel) -> io::Result<()> {
        self.stats.pixels += 1;
        if pixel == self.previous_pixel {
            self.run_length += 1;
            if self.run_length == QOI_MAX_RUN {
                self.flush_run()?;
            }
            return Ok(());
        }
        self.flush_run()?;
        let chunk = self.choose_chunk(pixel);
        self.emit(chunk)?;
        self.previous_pixel = pixel;
        Ok(())
    }

    pub(crate) fn finish(mut self) -> io::Result<ChunkStats> {
        self.flush_run()?;
        self.output.write_all(&QOI_END_MARKER)?;
        self.stats.bytes += QOI_END_MARKER.len();
        debug!(
            "encoded {} pixels into {} bytes ({} chunks: {} index, {} diff, {} luma, {} run, {} raw)",
            self.stats.pixels,
            self.stats.bytes,
            self.stats.chunks(),
            self.stats.index,
            self.stats.diff,
            self.stats.luma,
            self.stats.run,
            self.stats.raw,
        );
        Ok(self.stats)
    }
}
