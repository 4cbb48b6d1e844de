// SPDX-FileCopyrightText: © 2025 David Bliss
//
// SPDX-License-Identifier: GPL-3.0-or-later

use crate::config::RestoreOptions;
use crate::face::FaceHelper;
use crate::output::{ImageName, MemorySink, OutputSink};
use crate::restorer::Restorer;
use crate::Error::Alignment;
use crate::Result;

use std::path::Path;

use image::{DynamicImage, ImageReader, RgbImage};
use tracing::{info, warn};

/// An image received in memory rather than read from disk.
#[derive(Debug, Clone)]
pub struct Upload {
    pub filename: String,
    pub image: DynamicImage,
}

impl Upload {
    pub fn from_bytes(filename: impl Into<String>, bytes: &[u8]) -> Result<Upload> {
        let image = image::load_from_memory(bytes)?;
        Ok(Upload {
            filename: filename.into(),
            image,
        })
    }
}

/// What happened to one image.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RestoreReport {
    /// Faces sent through the restoration network.
    pub faces: usize,

    /// Faces where restoration failed and the crop was kept instead.
    pub fallbacks: usize,

    /// A composited image was produced.
    pub pasted_back: bool,
}

/// Detect, restore and paste back faces, one image at a time.
pub struct Pipeline {
    face_helper: FaceHelper,
    restorer: Box<dyn Restorer>,
    options: RestoreOptions,
}

impl Pipeline {
    pub fn new(
        face_helper: FaceHelper,
        restorer: Box<dyn Restorer>,
        options: RestoreOptions,
    ) -> Self {
        Self {
            face_helper,
            restorer,
            options,
        }
    }

    /// Read an image from disk and restore it into `sink`.
    /// The decoder is chosen from the file contents, not its extension.
    pub fn restore_file(&self, path: &Path, sink: &mut dyn OutputSink) -> Result<RestoreReport> {
        let name = ImageName::from_path(path);
        info!("Processing {} ...", name.file_name);
        let image = ImageReader::open(path)?
            .with_guessed_format()?
            .decode()?
            .into_rgb8();
        self.restore(&name, image, self.options.paste_back, sink)
    }

    /// Restore an uploaded image and return it with restored faces pasted back.
    /// Nothing is written to disk. A pre-aligned upload returns its restored face.
    pub fn restore_upload(&self, upload: &Upload) -> Result<RgbImage> {
        let name = ImageName::new(upload.filename.clone());
        info!("Processing {} ...", name.file_name);

        let mut sink = MemorySink::default();
        self.restore(&name, upload.image.to_rgb8(), true, &mut sink)?;

        sink.restored_image
            .or_else(|| sink.restored_faces.into_iter().next())
            .ok_or_else(|| Alignment(format!("nothing restored for {}", name.file_name)))
    }

    /// The steps shared by every entry point. Only the sink differs.
    pub fn restore(
        &self,
        name: &ImageName,
        image: RgbImage,
        paste_back: bool,
        sink: &mut dyn OutputSink,
    ) -> Result<RestoreReport> {
        let mut faces = if self.options.has_aligned {
            self.face_helper.read_aligned(&image)?
        } else {
            let faces = self
                .face_helper
                .read_image(image, self.options.only_center_face)?;
            for (index, cropped_face) in faces.cropped_faces().iter().enumerate() {
                sink.cropped_face(name, index, cropped_face)?;
            }
            faces
        };

        let mut report = RestoreReport::default();
        let suffix = self.options.suffix.as_deref();

        let cropped_faces = faces.cropped_faces().to_vec();
        for (index, cropped_face) in cropped_faces.iter().enumerate() {
            let restored_face = match self.restorer.restore(cropped_face) {
                Ok(restored_face) => restored_face,
                Err(e) => {
                    warn!(
                        "Failed inference for GFPGAN on {} face {}: {}",
                        name.file_name, index, e
                    );
                    report.fallbacks += 1;
                    cropped_face.clone()
                }
            };
            report.faces += 1;

            sink.restored_face(name, index, suffix, &restored_face)?;

            let cmp = side_by_side(cropped_face, &restored_face);
            sink.comparison(name, index, &cmp)?;

            faces.add_restored_face(restored_face);
        }

        if paste_back && !faces.is_aligned_input() {
            let restored_image = self.face_helper.paste_faces_to_input_image(&faces)?;
            sink.restored_image(name, &restored_image)?;
            report.pasted_back = true;
        }

        Ok(report)
    }
}

/// `left` and `right` next to each other, top aligned.
pub fn side_by_side(left: &RgbImage, right: &RgbImage) -> RgbImage {
    let width = left.width() + right.width();
    let height = left.height().max(right.height());
    let mut out = RgbImage::new(width, height);
    image::imageops::replace(&mut out, left, 0, 0);
    image::imageops::replace(&mut out, right, left.width() as i64, 0);
    out
}
