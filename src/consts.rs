//! Opcodes, masks and fixed byte sequences of the QOI format.

/// `qoif` read as a big-endian `u32`.
pub const QOI_MAGIC: u32 = u32::from_be_bytes(*b"qoif");

/// Seven `0x00` bytes followed by one `0x01`.
pub const QOI_END_MARKER: [u8; 8] = [0, 0, 0, 0, 0, 0, 0, 1];

pub const QOI_HEADER_LEN: usize = 14;

/// Longest run a single `QOI_OP_RUN` chunk can carry.
pub const QOI_MAX_RUN: u8 = 62;

/// Number of slots in the index cache.
pub const QOI_INDEX_SIZE: usize = 64;

pub const QOI_OP_INDEX: u8 = 0x00;
pub const QOI_OP_DIFF: u8 = 0x40;
pub const QOI_OP_LUMA: u8 = 0x80;
pub const QOI_OP_RUN: u8 = 0xc0;
pub const QOI_OP_RGB: u8 = 0xfe;
pub const QOI_OP_RGBA: u8 = 0xff;

/// Selects the 2-bit tag of a chunk's first byte.
pub const QOI_MASK_2: u8 = 0xc0;
/// Selects the 6-bit payload of a chunk's first byte.
pub const QOI_MASK_6: u8 = 0x3f;
