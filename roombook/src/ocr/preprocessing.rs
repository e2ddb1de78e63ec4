use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, GrayImage, ImageFormat, ImageReader, Luma};

use crate::config::OcrConfig;
use crate::error::{Result, RoombookError};

/// Prepares a decoded captcha for recognition.
///
/// Captchas are small, noisy and colourful, so the image is:
/// 1. scaled down to `max_image_dimension` if oversized
/// 2. scaled up until its height reaches `min_image_dimension`
/// 3. converted to grayscale without alpha
/// 4. contrast-stretched to the full 0..=255 range
///
/// The result is re-encoded as PNG.
pub fn preprocess_captcha(bytes: &[u8], config: &OcrConfig) -> Result<Vec<u8>> {
    let img = ImageReader::new(std::io::Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| RoombookError::DecodeFailure(format!("Failed to read captcha image: {e}")))?
        .decode()
        .map_err(|e| {
            RoombookError::DecodeFailure(format!("Failed to decode captcha image: {e}"))
        })?;

    let img = shrink_to_fit(img, config.max_image_dimension);
    let img = upscale_to_height(img, config.min_image_dimension);
    let gray = stretch_contrast(to_gray(img));

    let mut output = Vec::new();
    DynamicImage::ImageLuma8(gray)
        .write_to(&mut std::io::Cursor::new(&mut output), ImageFormat::Png)
        .map_err(|e| RoombookError::Ocr(format!("Failed to encode captcha image: {e}")))?;

    Ok(output)
}

fn shrink_to_fit(img: DynamicImage, max_dim: u32) -> DynamicImage {
    let (width, height) = img.dimensions();
    if width <= max_dim && height <= max_dim {
        return img;
    }
    // `resize` keeps the aspect ratio within the bounding box.
    img.resize(max_dim, max_dim, FilterType::Lanczos3)
}

fn upscale_to_height(img: DynamicImage, min_height: u32) -> DynamicImage {
    let (width, height) = img.dimensions();
    if height == 0 || height >= min_height {
        return img;
    }
    let scale = min_height as f32 / height as f32;
    let new_width = ((width as f32 * scale).round() as u32).max(1);
    img.resize_exact(new_width, min_height, FilterType::CatmullRom)
}

fn to_gray(img: DynamicImage) -> GrayImage {
    match img {
        DynamicImage::ImageLuma8(gray) => gray,
        other => other.to_luma8(),
    }
}

/// Linear histogram stretch: darkest pixel → 0, lightest → 255.
fn stretch_contrast(gray: GrayImage) -> GrayImage {
    let (min_val, max_val) = gray
        .pixels()
        .fold((u8::MAX, u8::MIN), |(lo, hi), p| (lo.min(p[0]), hi.max(p[0])));

    if max_val <= min_val {
        return gray;
    }

    let range = (max_val - min_val) as f32;
    GrayImage::from_fn(gray.width(), gray.height(), |x, y| {
        let value = gray.get_pixel(x, y)[0];
        Luma([(((value - min_val) as f32 / range) * 255.0).round() as u8])
    })
}
