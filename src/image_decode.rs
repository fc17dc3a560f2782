use image::{ImageReader, RgbImage};
use std::io::Cursor;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("Uploaded file is empty")]
    Empty,
    #[error("Unable to determine image format: {0}")]
    Format(std::io::Error),
    #[error("Error decoding image: {0}")]
    Decode(image::ImageError),
}

/// Decodes an uploaded byte stream into an 8-bit, 3-channel RGB buffer.
/// Alpha is dropped and grayscale is expanded.
pub fn decode_image(bytes: &[u8]) -> Result<RgbImage, DecodeError> {
    if bytes.is_empty() {
        return Err(DecodeError::Empty);
    }

    let image_reader = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(DecodeError::Format)?;

    let image = image_reader.decode().map_err(DecodeError::Decode)?;

    Ok(image.to_rgb8())
}
