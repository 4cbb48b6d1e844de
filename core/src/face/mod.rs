// SPDX-FileCopyrightText: © 2024 David Bliss
//
// SPDX-License-Identifier: GPL-3.0-or-later

pub mod affine;
pub mod detector;
pub mod helper;
pub mod model;
pub mod nms;

pub use affine::Affine;
pub use detector::{DetectorConfig, DetectorKind, FaceDetector, RustFacesDetector};
pub use helper::{FaceHelper, ImageFaces};
pub use model::{DetectedFace, Point, Rect};
