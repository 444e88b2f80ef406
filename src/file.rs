use std::{fs, path::Path};

use ::image::DynamicImage;
use log::debug;

use crate::{BlockSink, ChunkStats, EncodeError, Image, write_to_sink};

impl TryFrom<DynamicImage> for Image {
    type Error = EncodeError;

    /// Images with an alpha channel become RGBA, everything else RGB.
    /// Grayscale and 16-bit sources are converted to 8-bit color.
    fn try_from(source: DynamicImage) -> Result<Self, Self::Error> {
        let (width, height) = (source.width(), source.height());
        if source.color().has_alpha() {
            Image::new(source.into_rgba8().into_raw(), width, height, 4)
        } else {
            Image::new(source.into_rgb8().into_raw(), width, height, 3)
        }
    }
}

/// Decodes any image file the `image` crate understands.
pub fn load_image(path: impl AsRef<Path>) -> Result<Image, EncodeError> {
    let source = ::image::open(path.as_ref())?;
    debug!("loaded {} as {:?}", path.as_ref().display(), source.color());
    Image::try_from(source)
}

/// Encodes `image` into the file at `path`, creating missing parent
/// directories and replacing any existing file.
pub fn save_qoi(image: &Image, path: impl AsRef<Path>) -> Result<ChunkStats, EncodeError> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let file = fs::File::options()
        .write(true)
        .create(true)
        .truncate(true)
        .open(path)?;
    let mut sink = BlockSink::new(file);
    let stats = write_to_sink(image, &mut sink)?;
    sink.close()?;
    debug!("wrote {} bytes to {}", stats.bytes, path.display());
    Ok(stats)
}

/// Loads `src` and saves it as QOI at `dest`.
pub fn transcode_file(
    src: impl AsRef<Path>,
    dest: impl AsRef<Path>,
) -> Result<ChunkStats, EncodeError> {
    let image = load_image(src)?;
    save_qoi(&image, dest)
}
