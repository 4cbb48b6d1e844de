// SPDX-FileCopyrightText: © 2025 David Bliss
//
// SPDX-License-Identifier: GPL-3.0-or-later

use crate::Error::Alignment;
use crate::Result;
use crate::resize;

use super::affine::{face_template, Affine};
use super::detector::FaceDetector;
use super::model::{DetectedFace, Point};

use image::{GrayImage, Luma, Rgb, RgbImage};
use imageproc::filter::gaussian_blur_f32;
use imageproc::geometric_transformations::{warp_into, Interpolation};
use imageproc::morphology::{grayscale_erode, Mask};
use tracing::debug;

/// Fill colour for the parts of a face crop that fall outside the source image.
const BORDER_COLOUR: Rgb<u8> = Rgb([132, 133, 135]);

/// Detects, aligns and crops faces, and pastes restored faces back.
/// Holds no per-image state; that lives in `ImageFaces`.
pub struct FaceHelper {
    detector: Box<dyn FaceDetector>,
    face_size: u32,
    upscale_factor: u32,
    template: [Point; 5],
}

/// Everything known about the faces of one image.
/// A fresh value is created for every image.
#[derive(Debug, Default)]
pub struct ImageFaces {
    /// Source image. Absent when the input was already an aligned face.
    input: Option<RgbImage>,

    detected_faces: Vec<DetectedFace>,

    /// Maps source image coordinates onto face crop coordinates, one per face.
    affine_matrices: Vec<Affine>,

    cropped_faces: Vec<RgbImage>,

    restored_faces: Vec<RgbImage>,
}

impl ImageFaces {
    pub fn detected_faces(&self) -> &[DetectedFace] {
        &self.detected_faces
    }

    pub fn affine_matrices(&self) -> &[Affine] {
        &self.affine_matrices
    }

    pub fn cropped_faces(&self) -> &[RgbImage] {
        &self.cropped_faces
    }

    pub fn add_restored_face(&mut self, face: RgbImage) {
        self.restored_faces.push(face);
    }

    pub fn is_aligned_input(&self) -> bool {
        self.input.is_none()
    }
}

impl FaceHelper {
    pub fn new(detector: Box<dyn FaceDetector>, face_size: u32, upscale_factor: u32) -> Self {
        Self {
            detector,
            face_size,
            upscale_factor: upscale_factor.max(1),
            template: face_template(face_size),
        }
    }

    /// Treat the whole input as a single, already aligned, face.
    pub fn read_aligned(&self, input: &RgbImage) -> Result<ImageFaces> {
        let face = resize::resize_bilinear(input, self.face_size, self.face_size)?;
        Ok(ImageFaces {
            cropped_faces: vec![face],
            ..ImageFaces::default()
        })
    }

    /// Detect faces in `input`, then align and crop each of them.
    pub fn read_image(&self, input: RgbImage, only_center_face: bool) -> Result<ImageFaces> {
        let mut faces = ImageFaces {
            input: Some(input),
            ..ImageFaces::default()
        };
        self.detect_landmarks(&mut faces, only_center_face)?;
        self.align_warp_faces(&mut faces)?;
        Ok(faces)
    }

    fn detect_landmarks(&self, faces: &mut ImageFaces, only_center_face: bool) -> Result<()> {
        let Some(input) = faces.input.as_ref() else {
            return Ok(());
        };

        let mut detected = self.detector.detect(input)?;

        if only_center_face {
            let (width, height) = input.dimensions();
            detected = select_center_face(detected, width, height).into_iter().collect();
        }

        debug!("Keeping {} faces", detected.len());
        faces.detected_faces = detected;
        Ok(())
    }

    fn align_warp_faces(&self, faces: &mut ImageFaces) -> Result<()> {
        let Some(input) = faces.input.as_ref() else {
            return Ok(());
        };

        for face in &faces.detected_faces {
            let affine = Affine::estimate_similarity(&face.landmarks, &self.template)?;
            let mut cropped = RgbImage::new(self.face_size, self.face_size);
            warp_into(
                input,
                &affine.to_projection()?,
                Interpolation::Bilinear,
                BORDER_COLOUR,
                &mut cropped,
            );
            faces.affine_matrices.push(affine);
            faces.cropped_faces.push(cropped);
        }
        Ok(())
    }

    /// Inverse of each face's alignment, mapping face crop coordinates onto
    /// the upscaled source image.
    pub fn inverse_affines(&self, faces: &ImageFaces) -> Result<Vec<Affine>> {
        let factor = self.upscale_factor as f32;
        let extra_offset = if self.upscale_factor > 1 {
            0.5 * factor
        } else {
            0.0
        };

        faces
            .affine_matrices
            .iter()
            .map(|affine| {
                Ok(affine
                    .invert()?
                    .scale(factor)
                    .translate(extra_offset, extra_offset))
            })
            .collect()
    }

    /// Blend every restored face into an upscaled copy of the source image.
    pub fn paste_faces_to_input_image(&self, faces: &ImageFaces) -> Result<RgbImage> {
        let input = faces
            .input
            .as_ref()
            .ok_or_else(|| Alignment("no source image to paste faces into".into()))?;

        let (width, height) = input.dimensions();
        let (width, height) = width
            .checked_mul(self.upscale_factor)
            .zip(height.checked_mul(self.upscale_factor))
            .ok_or_else(|| {
                Alignment(format!(
                    "{}x{} upscaled by {} is too large",
                    width, height, self.upscale_factor
                ))
            })?;
        let upsampled = resize::resize_lanczos(input, width, height)?;

        let mut canvas: Vec<f32> = upsampled.as_raw().iter().map(|&v| v as f32).collect();

        let inverse_affines = self.inverse_affines(faces)?;
        for (restored, inverse) in faces.restored_faces.iter().zip(&inverse_affines) {
            let projection = inverse.to_projection()?;

            let mut inv_restored = RgbImage::new(width, height);
            warp_into(
                restored,
                &projection,
                Interpolation::Bilinear,
                Rgb([0, 0, 0]),
                &mut inv_restored,
            );

            let mask = GrayImage::from_pixel(restored.width(), restored.height(), Luma([255]));
            let mut inv_mask = GrayImage::new(width, height);
            warp_into(
                &mask,
                &projection,
                Interpolation::Bilinear,
                Luma([0]),
                &mut inv_mask,
            );

            // Shave the rim, which mixes face and border.
            let inv_mask_erosion = erode_square(&inv_mask, self.upscale_factor);
            let soft_mask = soft_edges(&inv_mask_erosion);

            let restored_px = inv_restored.as_raw();
            for (i, value) in canvas.iter_mut().enumerate() {
                let pixel = i / 3;
                let erosion = inv_mask_erosion.as_raw()[pixel] as f32 / 255.0;
                let soft = soft_mask.as_raw()[pixel] as f32 / 255.0;
                let pasted = erosion * restored_px[i] as f32;
                *value = soft * pasted + (1.0 - soft) * *value;
            }
        }

        let pixels = canvas
            .into_iter()
            .map(|v| v.clamp(0.0, 255.0) as u8)
            .collect();
        RgbImage::from_raw(width, height, pixels)
            .ok_or_else(|| Alignment("composited image has wrong size".into()))
    }
}

/// The face whose bounding box centre is closest to the centre of the image.
pub fn select_center_face(
    faces: Vec<DetectedFace>,
    width: u32,
    height: u32,
) -> Option<DetectedFace> {
    let centre = Point::new(width as f32 / 2.0, height as f32 / 2.0);
    faces
        .into_iter()
        .min_by(|a, b| {
            let da = a.bounds.centre().distance(&centre);
            let db = b.bounds.centre().distance(&centre);
            da.total_cmp(&db)
        })
}

/// Feather the mask edge in proportion to the size of the face.
fn soft_edges(mask: &GrayImage) -> GrayImage {
    let total_face_area: f32 = mask.pixels().map(|p| p[0] as f32 / 255.0).sum();
    let w_edge = (total_face_area.sqrt() as u32) / 20;
    if w_edge == 0 {
        return mask.clone();
    }

    let centre = erode_square(mask, w_edge);

    // Matches the sigma OpenCV derives for a kernel of 2 * w_edge + 1.
    let sigma = 0.3 * (w_edge as f32 - 1.0) + 0.8;
    gaussian_blur_f32(&centre, sigma)
}

/// Grayscale erosion with a `2 * half` square kernel anchored at `(half, half)`,
/// the window OpenCV uses for an even kernel size.
fn erode_square(mask: &GrayImage, half: u32) -> GrayImage {
    let half = half.clamp(1, 255);
    let kernel = GrayImage::from_pixel(2 * half, 2 * half, Luma([255]));
    let kernel = Mask::from_image(&kernel, half as u8, half as u8);
    grayscale_erode(mask, &kernel)
}
