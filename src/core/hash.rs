use image::imageops::{self, FilterType};
use image::DynamicImage;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

/// Width of the resampled grid: 9 columns give 8 comparisons per row.
const GRID_WIDTH: u32 = 9;
const GRID_HEIGHT: u32 = 8;

#[derive(Debug, Error)]
pub enum HashError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image could not be decoded: {0}")]
    Decode(#[from] image::ImageError),

    #[error("Image has no pixels")]
    EmptyImage,

    #[error("Image hashed to the reserved zero value")]
    Sentinel,
}

/// 64-bit difference hash. Zero is reserved as the "absent" sentinel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PerceptualHash(pub u64);

impl PerceptualHash {
    pub const SENTINEL: PerceptualHash = PerceptualHash(0);

    pub fn is_sentinel(self) -> bool {
        self.0 == 0
    }

    /// Hamming distance, always in `0..=64`.
    pub fn distance(self, other: PerceptualHash) -> u32 {
        (self.0 ^ other.0).count_ones()
    }

    /// SQLite has no unsigned 64-bit integer, so the bits are stored as i64.
    pub fn to_stored(self) -> Option<i64> {
        if self.is_sentinel() {
            None
        } else {
            Some(self.0 as i64)
        }
    }

    pub fn from_stored(value: Option<i64>) -> Option<PerceptualHash> {
        value
            .map(|v| PerceptualHash(v as u64))
            .filter(|h| !h.is_sentinel())
    }
}

impl fmt::Display for PerceptualHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

impl FromStr for PerceptualHash {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        u64::from_str_radix(s.trim_start_matches("0x"), 16).map(PerceptualHash)
    }
}

/// Service for computing perceptual hashes of images
pub struct HashService;

impl HashService {
    pub fn new() -> Self {
        Self
    }

    /// Decode raw bytes, guessing the format from the content
    pub fn decode(&self, bytes: &[u8]) -> Result<DynamicImage, HashError> {
        let img = image::load_from_memory(bytes)?;
        if img.width() == 0 || img.height() == 0 {
            return Err(HashError::EmptyImage);
        }
        Ok(img)
    }

    /// dHash: grayscale, nearest-neighbour resample to 9x8, then one bit per
    /// adjacent pair (left brighter than right). Bit 0 is the first comparison
    /// of the top row, bit 63 the last comparison of the bottom row.
    pub fn hash_image(&self, img: &DynamicImage) -> PerceptualHash {
        let gray = img.to_luma8();
        let grid = imageops::resize(&gray, GRID_WIDTH, GRID_HEIGHT, FilterType::Nearest);

        let mut bits = 0u64;
        let mut bit = 0;
        for y in 0..GRID_HEIGHT {
            for x in 0..GRID_WIDTH - 1 {
                let left = grid.get_pixel(x, y)[0];
                let right = grid.get_pixel(x + 1, y)[0];
                if left > right {
                    bits |= 1 << bit;
                }
                bit += 1;
            }
        }

        PerceptualHash(bits)
    }

    pub fn hash_bytes(&self, bytes: &[u8]) -> Result<PerceptualHash, HashError> {
        let img = self.decode(bytes)?;
        Ok(self.hash_image(&img))
    }

    pub fn hash_file(&self, path: &Path) -> Result<PerceptualHash, HashError> {
        let bytes = fs::read(path)?;
        self.hash_bytes(&bytes)
    }
}

impl Default for HashService {
    fn default() -> Self {
        Self::new()
    }
}
