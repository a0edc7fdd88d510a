use image::DynamicImage;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Extensions indexed by default. HEIC is listed but not yet decodable by the
/// `image` crate, so such files are counted as failures.
pub const DEFAULT_FORMATS: &[&str] = &["jpg", "jpeg", "png", "heic", "tiff", "bmp"];

/// Pixel dimensions and byte length of a file at index time. Any field that
/// could not be read stays 0.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageProbe {
    pub width: u32,
    pub height: u32,
    pub file_size: u64,
}

impl ImageProbe {
    /// Probe a file whose bytes have already been decoded.
    pub fn from_decoded(path: &Path, img: &DynamicImage, byte_len: usize) -> Self {
        let file_size = match std::fs::metadata(path) {
            Ok(metadata) => metadata.len(),
            Err(e) => {
                log::warn!("Could not stat {}: {}", path.display(), e);
                byte_len as u64
            }
        };

        Self {
            width: img.width(),
            height: img.height(),
            file_size,
        }
    }

    /// Probe without a full decode; used when only the header is needed.
    pub fn from_path(path: &Path) -> Self {
        let (width, height) = match image::image_dimensions(path) {
            Ok(dimensions) => dimensions,
            Err(e) => {
                log::warn!("Could not read dimensions for {}: {}", path.display(), e);
                (0, 0)
            }
        };
        let file_size = std::fs::metadata(path).map(|m| m.len()).unwrap_or(0);

        Self {
            width,
            height,
            file_size,
        }
    }

    pub fn area(&self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }
}

/// Case-insensitive extension check against an allow-list.
pub fn is_supported_format<S: AsRef<str>>(path: &Path, formats: &[S]) -> bool {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some(ext) => formats
            .iter()
            .any(|allowed| allowed.as_ref().eq_ignore_ascii_case(ext)),
        None => false,
    }
}

/// Dotfiles and dot-directories are treated as hidden.
pub fn is_hidden(name: &std::ffi::OsStr) -> bool {
    name.to_str().map(|s| s.starts_with('.')).unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::test_support::write_wave;
    use std::ffi::OsStr;
    use tempfile::TempDir;

    #[test]
    fn test_supported_format_detection() {
        assert!(is_supported_format(Path::new("a/test.jpg"), DEFAULT_FORMATS));
        assert!(is_supported_format(Path::new("test.JPEG"), DEFAULT_FORMATS));
        assert!(is_supported_format(Path::new("test.Png"), DEFAULT_FORMATS));
        assert!(is_supported_format(Path::new("test.heic"), DEFAULT_FORMATS));
        assert!(is_supported_format(Path::new("test.bmp"), DEFAULT_FORMATS));
        assert!(!is_supported_format(Path::new("test.tif"), DEFAULT_FORMATS));
        assert!(!is_supported_format(Path::new("test.txt"), DEFAULT_FORMATS));
        assert!(!is_supported_format(Path::new("test"), DEFAULT_FORMATS));
    }

    #[test]
    fn test_hidden_names() {
        assert!(is_hidden(OsStr::new(".DS_Store")));
        assert!(is_hidden(OsStr::new(".thumbnails")));
        assert!(!is_hidden(OsStr::new("holiday.jpg")));
    }

    #[test]
    fn test_probe_reads_dimensions_and_size() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("probe.png");
        write_wave(&path, 40, 30, 1.0, 0.0);

        let probe = ImageProbe::from_path(&path);
        assert_eq!((probe.width, probe.height), (40, 30));
        assert_eq!(probe.file_size, std::fs::metadata(&path).unwrap().len());
        assert_eq!(probe.area(), 1200);
    }

    #[test]
    fn test_probe_of_unreadable_file_defaults_to_zero() {
        let temp_dir = TempDir::new().unwrap();
        let probe = ImageProbe::from_path(&temp_dir.path().join("missing.png"));
        assert_eq!(probe, ImageProbe::default());
    }
}
