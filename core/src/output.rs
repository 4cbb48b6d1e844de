// SPDX-FileCopyrightText: © 2025 David Bliss
//
// SPDX-License-Identifier: GPL-3.0-or-later

use crate::Result;

use std::fs;
use std::path::{Path, PathBuf};

use image::{ImageFormat, RgbImage};
use tracing::debug;

/// Name of an input image, from which output file names are derived.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageName {
    /// File name with extension, e.g. `Sandow.jpg`.
    pub file_name: String,

    /// File name without extension, e.g. `Sandow`.
    pub basename: String,
}

impl ImageName {
    pub fn new(file_name: impl Into<String>) -> Self {
        let file_name = file_name.into();
        let basename = Path::new(&file_name)
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| file_name.clone());
        Self {
            file_name,
            basename,
        }
    }

    pub fn from_path(path: &Path) -> Self {
        let file_name = path
            .file_name()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self::new(file_name)
    }

    /// `{basename}_{index:02}.png`
    pub fn face_file_name(&self, index: usize) -> String {
        format!("{}_{:02}.png", self.basename, index)
    }

    /// `{basename}_{index:02}_{suffix}.png`, or `face_file_name` without a suffix.
    pub fn restored_face_file_name(&self, index: usize, suffix: Option<&str>) -> String {
        match suffix {
            Some(suffix) => format!("{}_{:02}_{}.png", self.basename, index, suffix),
            None => self.face_file_name(index),
        }
    }
}

/// Receives everything the pipeline produces for one image.
pub trait OutputSink {
    /// Aligned face crop, before restoration.
    fn cropped_face(&mut self, name: &ImageName, index: usize, face: &RgbImage) -> Result<()>;

    fn restored_face(
        &mut self,
        name: &ImageName,
        index: usize,
        suffix: Option<&str>,
        face: &RgbImage,
    ) -> Result<()>;

    /// Cropped face and restored face side by side.
    fn comparison(&mut self, name: &ImageName, index: usize, image: &RgbImage) -> Result<()>;

    /// Source image with restored faces pasted back.
    fn restored_image(&mut self, name: &ImageName, image: &RgbImage) -> Result<()>;
}

/// Writes results in the directory layout:
///
/// ```text
/// {base}/cropped_faces/{basename}_{index}.png
/// {base}/restored_faces/{basename}_{index}[_{suffix}].png
/// {base}/cmp/{basename}_{index}.png
/// {base}/restored_imgs/{file_name}
/// ```
#[derive(Debug, Clone)]
pub struct DirectorySink {
    base_path: PathBuf,
}

impl DirectorySink {
    pub fn build(base_path: &Path) -> Result<DirectorySink> {
        fs::create_dir_all(base_path)?;
        Ok(DirectorySink {
            base_path: PathBuf::from(base_path),
        })
    }

    pub fn cropped_faces_dir(&self) -> PathBuf {
        self.base_path.join("cropped_faces")
    }

    pub fn restored_faces_dir(&self) -> PathBuf {
        self.base_path.join("restored_faces")
    }

    pub fn cmp_dir(&self) -> PathBuf {
        self.base_path.join("cmp")
    }

    pub fn restored_imgs_dir(&self) -> PathBuf {
        self.base_path.join("restored_imgs")
    }

    /// Write via a temporary file in the same directory, so a partially written
    /// image is never left at `path`.
    fn save(&self, image: &RgbImage, path: &Path) -> Result<()> {
        let dir = path.parent().unwrap_or(&self.base_path);
        fs::create_dir_all(dir)?;

        let format = ImageFormat::from_path(path).unwrap_or(ImageFormat::Png);

        let named_temp = tempfile::Builder::new()
            .prefix("face-")
            .suffix(".tmp")
            .tempfile_in(dir)?;

        image.save_with_format(named_temp.path(), format)?;
        named_temp.persist(path)?;

        debug!("Wrote {:?}", path);
        Ok(())
    }
}

impl OutputSink for DirectorySink {
    fn cropped_face(&mut self, name: &ImageName, index: usize, face: &RgbImage) -> Result<()> {
        let path = self.cropped_faces_dir().join(name.face_file_name(index));
        self.save(face, &path)
    }

    fn restored_face(
        &mut self,
        name: &ImageName,
        index: usize,
        suffix: Option<&str>,
        face: &RgbImage,
    ) -> Result<()> {
        let path = self
            .restored_faces_dir()
            .join(name.restored_face_file_name(index, suffix));
        self.save(face, &path)
    }

    fn comparison(&mut self, name: &ImageName, index: usize, image: &RgbImage) -> Result<()> {
        let path = self.cmp_dir().join(name.face_file_name(index));
        self.save(image, &path)
    }

    fn restored_image(&mut self, name: &ImageName, image: &RgbImage) -> Result<()> {
        let path = self.restored_imgs_dir().join(&name.file_name);
        self.save(image, &path)
    }
}

/// Keeps results in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    pub cropped_faces: Vec<RgbImage>,
    pub restored_faces: Vec<RgbImage>,
    pub comparisons: Vec<RgbImage>,
    pub restored_image: Option<RgbImage>,
}

impl OutputSink for MemorySink {
    fn cropped_face(&mut self, _name: &ImageName, _index: usize, face: &RgbImage) -> Result<()> {
        self.cropped_faces.push(face.clone());
        Ok(())
    }

    fn restored_face(
        &mut self,
        _name: &ImageName,
        _index: usize,
        _suffix: Option<&str>,
        face: &RgbImage,
    ) -> Result<()> {
        self.restored_faces.push(face.clone());
        Ok(())
    }

    fn comparison(&mut self, _name: &ImageName, _index: usize, image: &RgbImage) -> Result<()> {
        self.comparisons.push(image.clone());
        Ok(())
    }

    fn restored_image(&mut self, _name: &ImageName, image: &RgbImage) -> Result<()> {
        self.restored_image = Some(image.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn file_names() {
        let name = ImageName::new("Sandow.jpg");
        assert_eq!(name.basename, "Sandow");
        assert_eq!(name.face_file_name(0), "Sandow_00.png");
        assert_eq!(name.face_file_name(12), "Sandow_12.png");
        assert_eq!(name.restored_face_file_name(3, None), "Sandow_03.png");
        assert_eq!(
            name.restored_face_file_name(3, Some("v1")),
            "Sandow_03_v1.png"
        );
    }

    #[test]
    fn file_names_keep_inner_dots() {
        let name = ImageName::from_path(Path::new("/tmp/in/a.b.png"));
        assert_eq!(name.file_name, "a.b.png");
        assert_eq!(name.basename, "a.b");
        assert_eq!(name.face_file_name(1), "a.b_01.png");
    }

    #[test]
    fn directory_layout() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = DirectorySink::build(dir.path()).unwrap();
        let name = ImageName::new("Frog.jpg");
        let face = RgbImage::from_pixel(4, 4, Rgb([9, 8, 7]));

        sink.cropped_face(&name, 0, &face).unwrap();
        sink.restored_face(&name, 0, Some("x"), &face).unwrap();
        sink.comparison(&name, 0, &face).unwrap();
        sink.restored_image(&name, &face).unwrap();

        assert!(dir.path().join("cropped_faces/Frog_00.png").is_file());
        assert!(dir.path().join("restored_faces/Frog_00_x.png").is_file());
        assert!(dir.path().join("cmp/Frog_00.png").is_file());
        assert!(dir.path().join("restored_imgs/Frog.jpg").is_file());

        let reloaded = image::open(dir.path().join("restored_faces/Frog_00_x.png"))
            .unwrap()
            .into_rgb8();
        assert_eq!(reloaded, face);

        // No temporary files left behind.
        let leftovers = fs::read_dir(dir.path().join("cmp"))
            .unwrap()
            .filter(|e| {
                e.as_ref()
                    .unwrap()
                    .file_name()
                    .to_string_lossy()
                    .ends_with(".tmp")
            })
            .count();
        assert_eq!(leftovers, 0);
    }
}
