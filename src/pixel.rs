use derive_more::{From, Into};

use crate::Channels;

/// An RGBA pixel, stored in channel order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, From, Into)]
pub struct Pixel(pub [u8; 4]);

impl Default for Pixel {
    /// Opaque black, the "previous pixel" every encode and decode starts from.
    fn default() -> Self {
        Self::OPAQUE_BLACK
    }
}

impl Pixel {
    pub const OPAQUE_BLACK: Self = Self([0, 0, 0, 255]);
    /// Initial value of every index cache slot.
    pub const TRANSPARENT_BLACK: Self = Self([0, 0, 0, 0]);

    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self([r, g, b, a])
    }

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self([r, g, b, 255])
    }

    pub const fn r(self) -> u8 {
        self.0[0]
    }

    pub const fn g(self) -> u8 {
        self.0[1]
    }

    pub const fn b(self) -> u8 {
        self.0[2]
    }

    pub const fn a(self) -> u8 {
        self.0[3]
    }

    /// The hashing function used by QOI to address the index cache.
    pub fn hash(self) -> u8 {
        let [r, g, b, a] = self.0.map(usize::from);
        ((r * 3 + g * 5 + b * 7 + a * 11) % 64) as u8
    }

    /// `r, g, b` for RGB images, `r, g, b, a` for RGBA images.
    pub fn to_bytes(&self, channels: Channels) -> &[u8] {
        &self.0[..channels.count()]
    }
}
