use std::path::Path;

use image::DynamicImage;
use lumeq_image::{Image, ImageSize};

use crate::error::IoError;

fn read_dynamic_image(file_path: &Path) -> Result<DynamicImage, IoError> {
    if !file_path.exists() {
        return Err(IoError::FileDoesNotExist(file_path.to_path_buf()));
    }

    let img = image::ImageReader::open(file_path)?
        .with_guessed_format()?
        .decode()?;

    Ok(img)
}

fn image_from_luma8(img: image::GrayImage) -> Result<Image<u8, 1>, IoError> {
    let size = ImageSize {
        width: img.width() as usize,
        height: img.height() as usize,
    };
    Ok(Image::new(size, img.into_raw())?)
}

/// Read an 8-bit grayscale image of any supported format.
///
/// The format is guessed from the file contents.
///
/// # Arguments
///
/// * `file_path` - The path to the image file.
///
/// # Errors
///
/// Returns an error if the file cannot be decoded or does not hold an 8-bit
/// single channel image. Other color types are not converted, see
/// [`read_image_any_luma8`] for that.
pub fn read_image_any_mono8(file_path: impl AsRef<Path>) -> Result<Image<u8, 1>, IoError> {
    match read_dynamic_image(file_path.as_ref())? {
        DynamicImage::ImageLuma8(img) => image_from_luma8(img),
        other => Err(IoError::UnsupportedColorType(format!("{:?}", other.color()))),
    }
}

/// Read an image of any supported format and convert it to 8-bit luma.
///
/// # Arguments
///
/// * `file_path` - The path to the image file.
///
/// # Errors
///
/// Returns an error if the file cannot be decoded.
pub fn read_image_any_luma8(file_path: impl AsRef<Path>) -> Result<Image<u8, 1>, IoError> {
    let img = read_dynamic_image(file_path.as_ref())?;
    image_from_luma8(img.into_luma8())
}

/// Write an 8-bit grayscale image, the format being deduced from the extension.
///
/// # Arguments
///
/// * `file_path` - The path to the image file.
/// * `image` - The image to write.
pub fn write_image_any_mono8(
    file_path: impl AsRef<Path>,
    image: &Image<u8, 1>,
) -> Result<(), IoError> {
    image::save_buffer(
        file_path,
        image.as_slice(),
        image.width() as u32,
        image.height() as u32,
        image::ColorType::L8,
    )?;
    Ok(())
}
