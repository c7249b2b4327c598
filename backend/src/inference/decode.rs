use image::{DynamicImage, ImageReader, Limits};
use std::io::Cursor;

/// Pixel count above which Pillow treats an image as a decompression bomb.
pub const DEFAULT_MAX_PIXELS: u64 = 178_956_970;

/// Widest decoded pixel the decoder may allocate for (`Rgba32F`).
const MAX_BYTES_PER_PIXEL: u64 = 16;

#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("Unrecognised image format")]
    UnknownFormat,
    #[error("Image decoding failed: {0}")]
    Decode(#[from] image::ImageError),
    #[error("Image has zero-sized dimensions ({width}x{height})")]
    Empty { width: u32, height: u32 },
    #[error("Image of {width}x{height} exceeds the {max_pixels} pixel limit")]
    TooLarge {
        width: u32,
        height: u32,
        max_pixels: u64,
    },
}

fn sniffed_reader(bytes: &[u8]) -> Result<ImageReader<Cursor<&[u8]>>, DecodeError> {
    let reader = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| DecodeError::Decode(image::ImageError::IoError(e)))?;
    if reader.format().is_none() {
        return Err(DecodeError::UnknownFormat);
    }
    Ok(reader)
}

/// Decodes uploaded bytes into a raster image, rejecting anything whose format
/// cannot be sniffed from its content, whose header declares more than
/// `max_pixels`, or whose pixel data does not fully decode.
pub fn decode_image(bytes: &[u8], max_pixels: u64) -> Result<DynamicImage, DecodeError> {
    // Header only, so oversized images are refused before any pixel buffer exists
    let (width, height) = sniffed_reader(bytes)?.into_dimensions()?;
    if width == 0 || height == 0 {
        return Err(DecodeError::Empty { width, height });
    }
    if u64::from(width) * u64::from(height) > max_pixels {
        return Err(DecodeError::TooLarge {
            width,
            height,
            max_pixels,
        });
    }

    let mut reader = sniffed_reader(bytes)?;
    log::debug!("Decoding {:?} upload of {}x{}", reader.format(), width, height);

    let mut limits = Limits::default();
    limits.max_image_width = Some(width);
    limits.max_image_height = Some(height);
    limits.max_alloc = Some(max_pixels.saturating_mul(MAX_BYTES_PER_PIXEL));
    reader.limits(limits);

    let image = reader.decode()?;
    if image.width() == 0 || image.height() == 0 {
        return Err(DecodeError::Empty {
            width: image.width(),
            height: image.height(),
        });
    }

    Ok(image)
}
