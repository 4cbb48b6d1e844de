// SPDX-FileCopyrightText: © 2024 David Bliss
//
// SPDX-License-Identifier: GPL-3.0-or-later

use strum::{Display, EnumString};

/// Edge length of aligned face crops, and of the restoration network's input and output.
pub const FACE_SIZE: u32 = 512;

/// Where inference runs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum Device {
    /// Use CUDA device 0 when available, otherwise the CPU.
    #[default]
    Auto,
    Cpu,
    Cuda,
}

/// Per-run switches for the restoration pipeline.
#[derive(Debug, Clone)]
pub struct RestoreOptions {
    /// Input images are already aligned face crops.
    pub has_aligned: bool,

    /// Only restore the face closest to the centre of the image.
    pub only_center_face: bool,

    /// Composite restored faces back into the input image.
    pub paste_back: bool,

    /// Scale of the composited image relative to the input image.
    pub upscale_factor: u32,

    /// Tag appended to restored face file names.
    pub suffix: Option<String>,
}

impl Default for RestoreOptions {
    fn default() -> Self {
        Self {
            has_aligned: false,
            only_center_face: false,
            paste_back: false,
            upscale_factor: 1,
            suffix: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn parse_device() {
        assert_eq!(Device::from_str("auto").unwrap(), Device::Auto);
        assert_eq!(Device::from_str("cpu").unwrap(), Device::Cpu);
        assert_eq!(Device::from_str("cuda").unwrap(), Device::Cuda);
        assert!(Device::from_str("tpu").is_err());
        assert_eq!(Device::Cuda.to_string(), "cuda");
    }
}
