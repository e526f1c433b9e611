//! Filesystem helpers for the search front end

use std::path::{Path, PathBuf};

use crate::error::Result;

/// Extensions picked up when scanning a directory
pub const IMAGE_EXTENSIONS: [&str; 2] = ["jpg", "png"];

/// Ensure a directory exists, creating it if necessary
pub fn ensure_dir_exists(path: &Path) -> Result<()> {
    if !path.exists() {
        std::fs::create_dir_all(path)?;
    }
    Ok(())
}

/// Validate that a file has an allowed extension
pub fn validate_file_extension(filename: &Path, allowed_extensions: &[&str]) -> bool {
    if let Some(ext) = filename.extension() {
        if let Some(ext_str) = ext.to_str() {
            return allowed_extensions
                .iter()
                .any(|&e| e.eq_ignore_ascii_case(ext_str));
        }
    }
    false
}

/// `.jpg` and `.png` files directly inside `dir`, sorted by path
pub fn list_images(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut images = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && validate_file_extension(&path, &IMAGE_EXTENSIONS) {
            images.push(path);
        }
    }
    images.sort();
    log::debug!("Found {} images in {}", images.len(), dir.display());
    Ok(images)
}

/// Base name for output files, e.g. `5_most_similar_image_0268`
pub fn output_stem(k: usize, query: &Path) -> String {
    let name = query
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("query");
    let stem = name.split('.').next().unwrap_or(name);
    format!("{}_most_similar_{}", k, stem)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_fs::prelude::*;

    #[test]
    fn test_validate_file_extension() {
        let allowed = ["jpg", "jpeg", "png"];
        assert!(validate_file_extension(Path::new("test.jpg"), &allowed));
        assert!(validate_file_extension(Path::new("test.JPEG"), &allowed));
        assert!(!validate_file_extension(Path::new("test.txt"), &allowed));
        assert!(!validate_file_extension(Path::new("test"), &allowed));
    }

    #[test]
    fn test_list_images_filters_and_sorts() {
        let dir = assert_fs::TempDir::new().unwrap();
        dir.child("b.png").touch().unwrap();
        dir.child("a.jpg").touch().unwrap();
        dir.child("notes.txt").touch().unwrap();
        dir.child("nested").create_dir_all().unwrap();
        dir.child("nested/c.png").touch().unwrap();

        let images = list_images(dir.path()).unwrap();
        let names: Vec<_> = images
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.jpg", "b.png"]);
    }

    #[test]
    fn test_ensure_dir_exists() {
        let dir = assert_fs::TempDir::new().unwrap();
        let out = dir.path().join("out/deeper");
        ensure_dir_exists(&out).unwrap();
        assert!(out.is_dir());
        ensure_dir_exists(&out).unwrap();
    }

    #[test]
    fn test_output_stem() {
        assert_eq!(
            output_stem(5, Path::new("data/flowers/image_0268.jpg")),
            "5_most_similar_image_0268"
        );
        assert_eq!(output_stem(3, Path::new("a.b.png")), "3_most_similar_a");
    }
}
