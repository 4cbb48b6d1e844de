// SPDX-FileCopyrightText: © 2025 David Bliss
//
// SPDX-License-Identifier: GPL-3.0-or-later

use crate::Result;

use fast_image_resize as fr;
use fr::images::Image;
use fr::{FilterType, ResizeAlg, ResizeOptions, Resizer};

use image::error::{ParameterError, ParameterErrorKind};
use image::{DynamicImage, ImageError, RgbImage};

/// Resize with bilinear filtering. Used to squash pre-aligned inputs to the face size.
pub fn resize_bilinear(src: &RgbImage, width: u32, height: u32) -> Result<RgbImage> {
    resize(src, width, height, FilterType::Bilinear)
}

/// Resize with Lanczos filtering. Used to upscale the image restored faces are pasted into.
pub fn resize_lanczos(src: &RgbImage, width: u32, height: u32) -> Result<RgbImage> {
    resize(src, width, height, FilterType::Lanczos3)
}

fn resize(src: &RgbImage, width: u32, height: u32, filter: FilterType) -> Result<RgbImage> {
    if src.dimensions() == (width, height) {
        return Ok(src.clone());
    }

    let src_image = DynamicImage::ImageRgb8(src.clone());
    let mut dst_image = Image::new(width, height, fr::PixelType::U8x3);

    let mut resizer = Resizer::new();
    let options = ResizeOptions::new().resize_alg(ResizeAlg::Convolution(filter));
    resizer.resize(&src_image, &mut dst_image, &options)?;

    RgbImage::from_raw(width, height, dst_image.buffer().to_vec()).ok_or_else(|| {
        ImageError::Parameter(ParameterError::from_kind(
            ParameterErrorKind::DimensionMismatch,
        ))
        .into()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn resize_changes_dimensions() {
        let src = RgbImage::from_pixel(40, 20, Rgb([10, 20, 30]));
        let dst = resize_bilinear(&src, 512, 512).unwrap();
        assert_eq!(dst.dimensions(), (512, 512));

        // A flat colour stays flat.
        assert!(dst.pixels().all(|p| *p == Rgb([10, 20, 30])));
    }

    #[test]
    fn resize_to_same_size_is_a_copy() {
        let mut src = RgbImage::new(8, 8);
        src.put_pixel(3, 4, Rgb([255, 0, 0]));
        let dst = resize_lanczos(&src, 8, 8).unwrap();
        assert_eq!(src, dst);
    }
}
