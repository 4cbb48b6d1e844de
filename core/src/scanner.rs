// SPDX-FileCopyrightText: © 2024 David Bliss
//
// SPDX-License-Identifier: GPL-3.0-or-later

use crate::Error::InputDirectory;
use crate::Result;
use itertools::Itertools;
use std::path::{Path, PathBuf};
use walkdir::{DirEntry, WalkDir};

/// Lists the images to restore.
#[derive(Debug, Clone)]
pub struct Scanner {
    /// File system path to scan.
    scan_base: PathBuf,
}

impl Scanner {
    /// A trailing path separator on `scan_base` is tolerated.
    pub fn build(scan_base: &Path) -> Result<Self> {
        if !scan_base.is_dir() {
            return Err(InputDirectory(PathBuf::from(scan_base)));
        }
        let scan_base = scan_base.components().collect::<PathBuf>();
        Ok(Self { scan_base })
    }

    pub fn scan_base(&self) -> &Path {
        &self.scan_base
    }

    /// Every file directly inside the base directory, sorted by path.
    /// Symbolic links to files are followed and hidden files are skipped.
    /// Files are not filtered by type: a file that is not an image fails when decoded.
    pub fn scan_all(&self) -> Result<Vec<PathBuf>> {
        let mut paths = vec![];
        for entry in WalkDir::new(&self.scan_base).min_depth(1).max_depth(1) {
            let entry = entry.map_err(std::io::Error::from)?;
            if is_hidden(&entry) {
                continue;
            }
            if entry.path().is_file() {
                paths.push(entry.into_path());
            }
        }
        Ok(paths.into_iter().sorted().collect())
    }
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry
        .file_name()
        .to_str()
        .is_some_and(|name| name.starts_with('.'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn scan_all_is_sorted_and_skips_directories() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("b.png"), b"b").unwrap();
        fs::write(dir.path().join("a.jpg"), b"a").unwrap();
        fs::write(dir.path().join("c.txt"), b"c").unwrap();
        fs::create_dir(dir.path().join("nested")).unwrap();
        fs::write(dir.path().join("nested/d.png"), b"d").unwrap();

        let s = Scanner::build(dir.path()).unwrap();
        let all = s.scan_all().unwrap();

        assert_eq!(3, all.len());
        assert!(all[0].ends_with("a.jpg"));
        assert!(all[1].ends_with("b.png"));
        assert!(all[2].ends_with("c.txt"));
    }

    #[test]
    fn scan_all_skips_hidden_files() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.png"), b"a").unwrap();
        fs::write(dir.path().join(".DS_Store"), b"junk").unwrap();

        let all = Scanner::build(dir.path()).unwrap().scan_all().unwrap();

        assert_eq!(1, all.len());
        assert!(all[0].ends_with("a.png"));
    }

    #[cfg(unix)]
    #[test]
    fn scan_all_follows_symlinks() {
        let dir = tempfile::tempdir().unwrap();
        let elsewhere = tempfile::tempdir().unwrap();
        let target = elsewhere.path().join("Sandow.png");
        fs::write(&target, b"a").unwrap();
        std::os::unix::fs::symlink(&target, dir.path().join("Sandow.png")).unwrap();
        std::os::unix::fs::symlink(elsewhere.path(), dir.path().join("linked_dir")).unwrap();

        let all = Scanner::build(dir.path()).unwrap().scan_all().unwrap();

        assert_eq!(1, all.len());
        assert!(all[0].ends_with("Sandow.png"));
    }

    #[test]
    fn trailing_separator() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.png"), b"a").unwrap();
        let with_slash = PathBuf::from(format!("{}/", dir.path().display()));

        let s = Scanner::build(&with_slash).unwrap();

        assert_eq!(s.scan_base(), dir.path());
        assert_eq!(1, s.scan_all().unwrap().len());
    }

    #[test]
    fn missing_directory() {
        let result = Scanner::build(Path::new("/nonexistent/inputs/whole_imgs"));
        assert!(matches!(result, Err(InputDirectory(_))));
    }
}
