// SPDX-FileCopyrightText: © 2024 David Bliss
//
// SPDX-License-Identifier: GPL-3.0-or-later

use crate::config::Device;
use crate::Error::Detection;
use crate::Result;

use super::model::{DetectedFace, Point, Rect};
use super::nms::Nms;

use std::fmt;

use image::RgbImage;
use rust_faces::{
    BlazeFaceParams, Face as RawFace, FaceDetection, FaceDetectorBuilder, InferParams,
    MtCnnParams, Provider, ToArray3,
};
use strum::{Display, EnumString};
use tracing::{debug, error, warn};

/// Finds faces, and their five landmarks, in an image.
pub trait FaceDetector {
    /// Faces ordered by confidence, most confident first.
    fn detect(&self, image: &RgbImage) -> Result<Vec<DetectedFace>>;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Display, EnumString)]
pub enum DetectorKind {
    /// Both BlazeFace models, merged.
    #[default]
    #[strum(serialize = "blaze_face")]
    BlazeFace,

    /// An alternative model with good results, but much slower than BlazeFace.
    #[strum(serialize = "mtcnn")]
    MtCnn,
}

#[derive(Debug, Clone)]
pub struct DetectorConfig {
    pub kind: DetectorKind,

    /// Minimum confidence for a detection to count as a face.
    pub score_threshold: f32,

    pub device: Device,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            kind: DetectorKind::default(),
            score_threshold: 0.95,
            device: Device::default(),
        }
    }
}

/// Face detection backed by the ONNX models bundled with rust-faces.
pub struct RustFacesDetector {
    models: Vec<(String, Box<dyn rust_faces::FaceDetector>)>,
    score_threshold: f32,
    nms: Nms,
}

impl RustFacesDetector {
    pub fn build(config: &DetectorConfig) -> Result<RustFacesDetector> {
        match config.device {
            Device::Cpu => Self::build_with(config, false),
            Device::Cuda => Self::build_with(config, true),
            Device::Auto => Self::build_with(config, true).or_else(|e| {
                warn!("CUDA unavailable for face detection, using CPU: {}", e);
                Self::build_with(config, false)
            }),
        }
    }

    fn build_with(config: &DetectorConfig, cuda: bool) -> Result<RustFacesDetector> {
        let mut models: Vec<(String, Box<dyn rust_faces::FaceDetector>)> = vec![];

        match config.kind {
            DetectorKind::BlazeFace => {
                let bz_params = BlazeFaceParams {
                    score_threshold: config.score_threshold,
                    ..BlazeFaceParams::default()
                };

                // Trained on photos taken by the back camera of phones.
                let blaze_face_640_model =
                    FaceDetectorBuilder::new(FaceDetection::BlazeFace640(bz_params.clone()))
                        .download()
                        .infer_params(Self::infer_params(cuda))
                        .build()
                        .map_err(|e| Detection(format!("BlazeFace 640: {}", e)))?;
                models.push(("blaze_face_640".into(), blaze_face_640_model));

                // Trained on photos taken by the selfie camera of phones.
                let blaze_face_320_model =
                    FaceDetectorBuilder::new(FaceDetection::BlazeFace320(bz_params))
                        .download()
                        .infer_params(Self::infer_params(cuda))
                        .build()
                        .map_err(|e| Detection(format!("BlazeFace 320: {}", e)))?;
                models.push(("blaze_face_320".into(), blaze_face_320_model));
            }
            DetectorKind::MtCnn => {
                let mtcnn_model =
                    FaceDetectorBuilder::new(FaceDetection::MtCnn(MtCnnParams::default()))
                        .download()
                        .infer_params(Self::infer_params(cuda))
                        .build()
                        .map_err(|e| Detection(format!("MTCNN: {}", e)))?;
                models.push(("mtcnn".into(), mtcnn_model));
            }
        }

        Ok(RustFacesDetector {
            models,
            score_threshold: config.score_threshold,
            nms: Nms::default(),
        })
    }

    fn infer_params(cuda: bool) -> InferParams {
        InferParams {
            provider: if cuda {
                Provider::OrtCuda(0)
            } else {
                Provider::OrtCpu
            },
            intra_threads: Some(5),
            ..Default::default()
        }
    }
}

impl FaceDetector for RustFacesDetector {
    fn detect(&self, image: &RgbImage) -> Result<Vec<DetectedFace>> {
        let array = image.clone().into_array3();

        let results = self
            .models
            .iter()
            .map(|(model_name, model)| {
                (model_name.as_str(), model.detect(array.view().into_dyn()))
            })
            .collect();

        let faces = merge_detections(results, self.score_threshold, &self.nms)?;
        debug!("Found {} faces: {:?}", faces.len(), faces);
        Ok(faces)
    }
}

/// Combine the output of every model into one list of faces, most confident first.
/// A model that failed is logged and skipped. Fails only if every model failed.
fn merge_detections<E: fmt::Debug>(
    results: Vec<(&str, std::result::Result<Vec<RawFace>, E>)>,
    score_threshold: f32,
    nms: &Nms,
) -> Result<Vec<DetectedFace>> {
    let mut faces: Vec<DetectedFace> = vec![];
    let mut failures = 0;
    let model_count = results.len();

    for (model_name, result) in results {
        match result {
            Ok(detected_faces) => {
                faces.extend(
                    detected_faces
                        .into_iter()
                        .filter(|f| f.confidence >= score_threshold)
                        .filter_map(|f| to_detected_face(f, model_name)),
                );
            }
            Err(e) => {
                error!("Failed extracting faces with {} model: {:?}", model_name, e);
                failures += 1;
            }
        }
    }

    if failures == model_count {
        return Err(Detection("every face detection model failed".into()));
    }

    Ok(nms.suppress_non_maxima(faces))
}

/// Faces without a full set of five landmarks cannot be aligned, so are dropped.
fn to_detected_face(face: RawFace, model_name: &str) -> Option<DetectedFace> {
    let landmarks = face.landmarks.filter(|x| x.len() == 5)?;
    let landmarks = [0, 1, 2, 3, 4].map(|i| Point::new(landmarks[i].0, landmarks[i].1));

    Some(DetectedFace {
        bounds: Rect {
            x: face.rect.x,
            y: face.rect.y,
            width: face.rect.width,
            height: face.rect.height,
        },
        confidence: face.confidence,
        landmarks,
        model_name: model_name.into(),
    })
}
