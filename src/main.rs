// SPDX-FileCopyrightText: © 2024 David Bliss
//
// SPDX-License-Identifier: GPL-3.0-or-later

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use facerestore_core::config::FACE_SIZE;
use facerestore_core::face::RustFacesDetector;
use facerestore_core::{
    Device, DetectorConfig, DetectorKind, DirectorySink, FaceHelper, GfpGan, GfpGanConfig,
    Pipeline, RestoreOptions, RestoreReport, Scanner,
};

/// Restore faces in a directory of photos with GFPGAN.
#[derive(Parser, Debug)]
#[command(name = "facerestore", version, about, long_about = None)]
struct Args {
    /// Scale of the composited image relative to the input image
    #[arg(
        long = "upscale_factor",
        default_value_t = 1,
        value_parser = clap::value_parser!(u32).range(1..)
    )]
    upscale_factor: u32,

    /// GFPGAN generator exported to ONNX
    #[arg(long = "model_path", default_value = "experiments/pretrained_models/GFPGANv1.onnx")]
    model_path: PathBuf,

    /// Directory of images to restore
    #[arg(long = "test_path", default_value = "inputs/whole_imgs")]
    test_path: PathBuf,

    /// Suffix of the restored faces
    #[arg(long)]
    suffix: Option<String>,

    /// Only restore the face closest to the centre of each image
    #[arg(long = "only_center_face")]
    only_center_face: bool,

    /// Inputs are already aligned face crops
    #[arg(long)]
    aligned: bool,

    /// Paste restored faces back into the input image
    #[arg(long = "paste_back")]
    paste_back: bool,

    /// Directory results are written to
    #[arg(long = "save_root", default_value = "results")]
    save_root: PathBuf,

    /// Where face detection runs: auto, cpu or cuda
    #[arg(long, default_value_t = Device::Auto)]
    device: Device,

    /// Face detection model: blaze_face or mtcnn
    #[arg(long = "det_model", default_value_t = DetectorKind::BlazeFace)]
    det_model: DetectorKind,

    /// Minimum confidence for a detection to count as a face
    #[arg(long = "det_threshold", default_value_t = 0.95)]
    det_threshold: f32,
}

fn main() -> Result<()> {
    // Enable logging
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let args = Args::parse();

    let scanner = Scanner::build(&args.test_path)
        .with_context(|| format!("Reading input directory {:?}", args.test_path))?;

    let restorer = GfpGan::load(&args.model_path, GfpGanConfig::default())
        .with_context(|| format!("Loading GFPGAN from {:?}", args.model_path))?;

    let detector = RustFacesDetector::build(&DetectorConfig {
        kind: args.det_model,
        score_threshold: args.det_threshold,
        device: args.device,
    })
    .context("Building face detector")?;

    let face_helper = FaceHelper::new(Box::new(detector), FACE_SIZE, args.upscale_factor);

    let options = RestoreOptions {
        has_aligned: args.aligned,
        only_center_face: args.only_center_face,
        paste_back: args.paste_back,
        upscale_factor: args.upscale_factor,
        suffix: args.suffix,
    };

    let pipeline = Pipeline::new(face_helper, Box::new(restorer), options);

    let mut sink = DirectorySink::build(&args.save_root)
        .with_context(|| format!("Creating results directory {:?}", args.save_root))?;

    let mut total = RestoreReport::default();
    for path in scanner.scan_all()? {
        let report = pipeline
            .restore_file(&path, &mut sink)
            .with_context(|| format!("Restoring {:?}", path))?;
        total.faces += report.faces;
        total.fallbacks += report.fallbacks;
    }

    info!(
        "Restored {} faces ({} kept unrestored after inference failures)",
        total.faces, total.fallbacks
    );
    info!("Results are in the <{}> folder.", args.save_root.display());

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let args = Args::try_parse_from(["facerestore"]).unwrap();
        assert_eq!(args.upscale_factor, 1);
        assert_eq!(
            args.model_path,
            PathBuf::from("experiments/pretrained_models/GFPGANv1.onnx")
        );
        assert_eq!(args.test_path, PathBuf::from("inputs/whole_imgs"));
        assert_eq!(args.save_root, PathBuf::from("results"));
        assert!(args.suffix.is_none());
        assert!(!args.only_center_face);
        assert!(!args.aligned);
        assert!(!args.paste_back);
        assert_eq!(args.device, Device::Auto);
        assert_eq!(args.det_model, DetectorKind::BlazeFace);
    }

    #[test]
    fn flags() {
        let args = Args::try_parse_from([
            "facerestore",
            "--upscale_factor",
            "2",
            "--test_path",
            "inputs/cropped_faces/",
            "--suffix",
            "v1",
            "--only_center_face",
            "--aligned",
            "--paste_back",
            "--device",
            "cpu",
            "--det_model",
            "mtcnn",
        ])
        .unwrap();
        assert_eq!(args.upscale_factor, 2);
        assert_eq!(args.suffix.as_deref(), Some("v1"));
        assert!(args.only_center_face);
        assert!(args.aligned);
        assert!(args.paste_back);
        assert_eq!(args.device, Device::Cpu);
        assert_eq!(args.det_model, DetectorKind::MtCnn);
    }

    #[test]
    fn upscale_factor_must_be_positive() {
        assert!(Args::try_parse_from(["facerestore", "--upscale_factor", "0"]).is_err());
    }
}
