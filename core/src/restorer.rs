// SPDX-FileCopyrightText: © 2025 David Bliss
//
// SPDX-License-Identifier: GPL-3.0-or-later

use crate::config::FACE_SIZE;
use crate::Error::{Inference, Model as ModelError};
use crate::Result;

use std::path::Path;

use image::RgbImage;
use tract_onnx::prelude::tract_ndarray::{Array4, ArrayView4, Ix4};
use tract_onnx::prelude::*;
use tracing::info;

type Model = RunnableModel<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>;

/// Restores a single aligned face crop.
pub trait Restorer {
    /// Restored face, the same size as `face`.
    fn restore(&self, face: &RgbImage) -> Result<RgbImage>;
}

/// Hyperparameters of the GFPGAN v1 network the weights were trained with.
/// Only `out_size` affects inference here; the rest document the exported graph.
#[derive(Debug, Clone)]
pub struct GfpGanConfig {
    pub out_size: u32,
    pub num_style_feat: u32,
    pub channel_multiplier: u32,
    pub fix_decoder: bool,
    pub num_mlp: u32,
    pub input_is_latent: bool,
    pub different_w: bool,
    pub narrow: f32,
    pub sft_half: bool,
}

impl Default for GfpGanConfig {
    fn default() -> Self {
        Self {
            out_size: FACE_SIZE,
            num_style_feat: 512,
            channel_multiplier: 1,
            fix_decoder: true,
            num_mlp: 8,
            input_is_latent: true,
            different_w: true,
            narrow: 1.0,
            sft_half: true,
        }
    }
}

/// GFPGAN generator, exported to ONNX from the checkpoint's `params_ema` weights.
pub struct GfpGan {
    model: Model,
    config: GfpGanConfig,
}

impl GfpGan {
    pub fn load(model_path: &Path, config: GfpGanConfig) -> Result<GfpGan> {
        if !model_path.is_file() {
            return Err(ModelError(format!("no checkpoint at {:?}", model_path)));
        }

        let size = config.out_size as usize;
        let model = tract_onnx::onnx()
            .model_for_path(model_path)
            .and_then(|m| m.with_input_fact(0, f32::fact([1, 3, size, size]).into()))
            .and_then(|m| m.into_optimized())
            .and_then(|m| m.into_runnable())
            .map_err(|e| ModelError(format!("load {:?}: {:#}", model_path, e)))?;

        info!("Loaded restoration model from {:?}", model_path);
        Ok(GfpGan { model, config })
    }
}

impl Restorer for GfpGan {
    fn restore(&self, face: &RgbImage) -> Result<RgbImage> {
        let size = self.config.out_size;
        if face.dimensions() != (size, size) {
            return Err(Inference(format!(
                "face is {:?}, model expects {}x{}",
                face.dimensions(),
                size,
                size
            )));
        }

        let input = to_input_tensor(face);
        let outputs = self
            .model
            .run(tvec!(Tensor::from(input).into()))
            .map_err(|e| Inference(format!("{:#}", e)))?;

        let output = outputs
            .first()
            .ok_or_else(|| Inference("model produced no outputs".into()))?;
        let output = output
            .to_array_view::<f32>()
            .and_then(|view| Ok(view.into_dimensionality::<Ix4>()?))
            .map_err(|e| Inference(format!("{:#}", e)))?;

        from_output_tensor(output)
    }
}

/// RGB pixels to a `(1, 3, H, W)` tensor in `[-1, 1]`.
pub fn to_input_tensor(face: &RgbImage) -> Array4<f32> {
    let (width, height) = face.dimensions();
    Array4::from_shape_fn(
        (1, 3, height as usize, width as usize),
        |(_, c, y, x)| {
            let value = face.get_pixel(x as u32, y as u32)[c] as f32 / 255.0;
            (value - 0.5) / 0.5
        },
    )
}

/// A `(1, 3, H, W)` tensor in `[-1, 1]` back to RGB pixels.
/// Values outside the range are clamped.
pub fn from_output_tensor(output: ArrayView4<f32>) -> Result<RgbImage> {
    let shape = output.shape();
    if shape[0] != 1 || shape[1] != 3 {
        return Err(Inference(format!("unexpected output shape {:?}", shape)));
    }
    let (height, width) = (shape[2] as u32, shape[3] as u32);

    Ok(RgbImage::from_fn(width, height, |x, y| {
        let channel = |c: usize| {
            let value = output[[0, c, y as usize, x as usize]].clamp(-1.0, 1.0);
            ((value + 1.0) / 2.0 * 255.0).round() as u8
        };
        image::Rgb([channel(0), channel(1), channel(2)])
    }))
}
