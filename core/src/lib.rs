// SPDX-FileCopyrightText: © 2024 David Bliss
//
// SPDX-License-Identifier: GPL-3.0-or-later

pub mod config;
pub mod error;
pub mod face;
pub mod output;
pub mod pipeline;
pub mod resize;
pub mod restorer;
pub mod scanner;

pub use config::{Device, RestoreOptions};
pub use error::Error;
pub use face::{DetectedFace, DetectorConfig, DetectorKind, FaceDetector, FaceHelper};
pub use output::{DirectorySink, ImageName, MemorySink, OutputSink};
pub use pipeline::{Pipeline, RestoreReport, Upload};
pub use restorer::{GfpGan, GfpGanConfig, Restorer};
pub use scanner::Scanner;

/// A typedef of the result returned by many methods.
pub type Result<T, E = Error> = std::result::Result<T, E>;
