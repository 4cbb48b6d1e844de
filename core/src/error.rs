// SPDX-FileCopyrightText: © 2024 David Bliss
//
// SPDX-License-Identifier: GPL-3.0-or-later

use std::path::PathBuf;
use thiserror::Error;

/// Bespoke errors
#[derive(Error, Debug)]
pub enum Error {
    /// Restoration network could not be loaded.
    #[error("Model error: {0}")]
    Model(String),

    /// Face detector could not be built or failed to run.
    #[error("Face detection error: {0}")]
    Detection(String),

    /// Landmarks could not be mapped onto the face template.
    #[error("Alignment error: {0}")]
    Alignment(String),

    /// Restoration network failed for a single face.
    #[error("Inference error: {0}")]
    Inference(String),

    #[error("Input directory not found: {0:?}")]
    InputDirectory(PathBuf),

    /// Wraps errors originating from the `image` crate.
    #[error("Image crate error: {0}")]
    Image(#[from] image::ImageError),

    /// Wraps standard I/O errors.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("File persistence error: {0}")]
    Persist(#[from] tempfile::PersistError),

    #[error("Image resize error: {0}")]
    Resize(#[from] fast_image_resize::ResizeError),
}
