use anyhow::Result;

use crate::data_structures::texture::PixelBuffer;

/// Decodes any format the `image` features enable; the format is sniffed from
/// the content, not the file name.
pub fn decode_image(bytes: &[u8]) -> Result<PixelBuffer> {
    let img = image::load_from_memory(bytes)?;
    let pixels = PixelBuffer::from_image(img);
    anyhow::ensure!(
        pixels.width > 0 && pixels.height > 0,
        "image has an empty extent"
    );
    Ok(pixels)
}
