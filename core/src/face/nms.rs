// SPDX-FileCopyrightText: © 2024 David Bliss
// SPDX-FileCopyrightText: © 2023 Rusty Builder Indies
//
// SPDX-License-Identifier: MIT

use super::model::DetectedFace;

/// Non-maximum suppression.
#[derive(Copy, Clone, Debug)]
pub struct Nms {
    pub iou_threshold: f32,
}

impl Default for Nms {
    fn default() -> Self {
        Self { iou_threshold: 0.3 }
    }
}

impl Nms {
    /// Suppress non-maxima faces.
    ///
    /// # Arguments
    ///
    /// * `faces` - Faces to suppress, possibly found by more than one model.
    ///
    /// # Returns
    ///
    /// * `Vec<DetectedFace>` - Surviving faces, most confident first.
    pub fn suppress_non_maxima(&self, mut faces: Vec<DetectedFace>) -> Vec<DetectedFace> {
        faces.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

        let mut nms_faces: Vec<DetectedFace> = Vec::with_capacity(faces.len());
        for face in faces {
            let overlaps = nms_faces
                .iter()
                .any(|kept| kept.bounds.iou(&face.bounds) >= self.iou_threshold);
            if !overlaps {
                nms_faces.push(face);
            }
        }

        nms_faces
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::face::model::{Point, Rect};

    fn face(x: f32, confidence: f32, model_name: &str) -> DetectedFace {
        DetectedFace {
            bounds: Rect {
                x,
                y: 0.0,
                width: 100.0,
                height: 100.0,
            },
            confidence,
            landmarks: [Point::new(0.0, 0.0); 5],
            model_name: model_name.into(),
        }
    }

    #[test]
    fn keeps_most_confident_of_overlapping_faces() {
        let faces = vec![
            face(0.0, 0.96, "blaze_face_320"),
            face(5.0, 0.99, "blaze_face_640"),
            face(500.0, 0.97, "blaze_face_320"),
        ];

        let kept = Nms::default().suppress_non_maxima(faces);

        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0].model_name, "blaze_face_640");
        assert_eq!(kept[0].confidence, 0.99);
        assert_eq!(kept[1].bounds.x, 500.0);
    }

    #[test]
    fn empty_input() {
        assert!(Nms::default().suppress_non_maxima(vec![]).is_empty());
    }
}
