//! Image file scanner
//!
//! Enumerates candidate photographs in a directory: sequential traversal
//! with symlink-loop detection, then parallel magic-byte verification so
//! stray files with image extensions don't reach the pipeline.

use chrono::{DateTime, Utc};
use rayon::prelude::*;
use std::collections::HashSet;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::{DirEntry, WalkDir};

/// Scanner errors; all of these are fatal to the batch (the directory
/// itself is unusable), unlike per-image analysis failures.
#[derive(Debug, Error)]
pub enum ScanError {
    /// Specified path does not exist
    #[error("Image directory not found: {0}")]
    PathNotFound(PathBuf),

    /// Path exists but is not a directory
    #[error("Not a directory: {0}")]
    NotADirectory(PathBuf),

    /// Cannot access file
    #[error("File access error {0}: {1}")]
    FileAccessError(PathBuf, String),
}

/// A photograph queued for analysis
#[derive(Debug, Clone)]
pub struct ImageCandidate {
    pub path: PathBuf,
    pub filename: String,
    /// Capture time, taken from the file's modification time
    pub captured_at: DateTime<Utc>,
}

/// Image file scanner
pub struct ImageScanner {
    ignore_patterns: Vec<String>,
    max_depth: Option<usize>,
}

impl ImageScanner {
    /// Create new scanner with default ignore patterns
    pub fn new() -> Self {
        Self {
            ignore_patterns: vec![
                ".DS_Store".to_string(),
                "Thumbs.db".to_string(),
                ".git".to_string(),
            ],
            max_depth: None,
        }
    }

    /// Scan directory for image files, sorted by filename.
    ///
    /// Two phases: sequential traversal (symlink_visited is mutable),
    /// then parallel magic-byte verification.
    pub fn scan(&self, root_path: &Path) -> Result<Vec<ImageCandidate>, ScanError> {
        if !root_path.exists() {
            return Err(ScanError::PathNotFound(root_path.to_path_buf()));
        }
        if !root_path.is_dir() {
            return Err(ScanError::NotADirectory(root_path.to_path_buf()));
        }

        let mut candidate_files = Vec::new();
        let mut symlink_visited = HashSet::new();

        let walker = WalkDir::new(root_path)
            .follow_links(false)
            .max_depth(self.max_depth.unwrap_or(usize::MAX))
            .into_iter()
            .filter_entry(|e| self.should_process_entry(e, &mut symlink_visited));

        for entry in walker {
            match entry {
                Ok(entry) => {
                    if entry.file_type().is_file() {
                        candidate_files.push(entry.path().to_path_buf());
                    }
                }
                Err(e) => {
                    tracing::warn!("Error accessing entry: {}", e);
                    // Continue scanning, don't abort
                }
            }
        }

        // Parallel verification: each thread reads a different file
        let mut candidates: Vec<ImageCandidate> = candidate_files
            .par_iter()
            .filter_map(|path| match self.is_image_file(path) {
                Ok(true) => Some(self.to_candidate(path)),
                Ok(false) => None,
                Err(e) => {
                    tracing::warn!("Error verifying {}: {}", path.display(), e);
                    None
                }
            })
            .collect();

        candidates.sort_by(|a, b| a.filename.cmp(&b.filename));

        tracing::debug!(
            "Scan complete: {} images from {} candidate files",
            candidates.len(),
            candidate_files.len()
        );

        Ok(candidates)
    }

    fn to_candidate(&self, path: &Path) -> ImageCandidate {
        let captured_at = std::fs::metadata(path)
            .and_then(|m| m.modified())
            .map(DateTime::<Utc>::from)
            .unwrap_or_else(|_| Utc::now());

        ImageCandidate {
            path: path.to_path_buf(),
            filename: path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default(),
            captured_at,
        }
    }

    /// Check if entry should be processed
    fn should_process_entry(
        &self,
        entry: &DirEntry,
        symlink_visited: &mut HashSet<PathBuf>,
    ) -> bool {
        let path = entry.path();
        let file_name = entry.file_name().to_string_lossy();

        for pattern in &self.ignore_patterns {
            if file_name.contains(pattern) {
                return false;
            }
        }

        if entry.file_type().is_symlink() {
            if let Ok(canonical) = path.canonicalize() {
                if !symlink_visited.insert(canonical) {
                    tracing::warn!("Symlink loop detected: {}", path.display());
                    return false;
                }
            }
        }

        true
    }

    /// Extension check first (fast), then magic bytes (reliable)
    fn is_image_file(&self, path: &Path) -> Result<bool, ScanError> {
        if let Some(ext) = path.extension() {
            let ext_lower = ext.to_string_lossy().to_lowercase();
            if self.is_image_extension(&ext_lower) {
                return self.verify_magic_bytes(path);
            }
        }
        Ok(false)
    }

    fn is_image_extension(&self, ext: &str) -> bool {
        matches!(ext, "jpg" | "jpeg" | "png")
    }

    fn verify_magic_bytes(&self, path: &Path) -> Result<bool, ScanError> {
        let mut file = File::open(path)
            .map_err(|e| ScanError::FileAccessError(path.to_path_buf(), e.to_string()))?;

        let mut buffer = [0u8; 8];
        let bytes_read = file
            .read(&mut buffer)
            .map_err(|e| ScanError::FileAccessError(path.to_path_buf(), e.to_string()))?;

        if bytes_read < 4 {
            return Ok(false);
        }

        let is_image = match &buffer[..bytes_read] {
            // JPEG
            [0xFF, 0xD8, 0xFF, ..] => true,
            // PNG
            [0x89, b'P', b'N', b'G', ..] => true,
            _ => false,
        };

        Ok(is_image)
    }
}

impl Default for ImageScanner {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_image_extension_detection() {
        let scanner = ImageScanner::new();
        assert!(scanner.is_image_extension("jpg"));
        assert!(scanner.is_image_extension("jpeg"));
        assert!(scanner.is_image_extension("png"));
        assert!(!scanner.is_image_extension("mp3"));
        assert!(!scanner.is_image_extension("txt"));
    }

    #[test]
    fn test_scan_nonexistent_path() {
        let scanner = ImageScanner::new();
        let result = scanner.scan(Path::new("/nonexistent/path"));
        assert!(matches!(result, Err(ScanError::PathNotFound(_))));
    }

    #[test]
    fn test_scan_filters_by_magic_bytes() {
        let dir = tempfile::tempdir().unwrap();

        // Real PNG signature
        fs::write(
            dir.path().join("Plant_00.png"),
            [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A],
        )
        .unwrap();
        // JPEG extension over non-image bytes
        fs::write(dir.path().join("fake.jpg"), b"not an image").unwrap();
        // Non-image file
        fs::write(dir.path().join("notes.txt"), b"hello").unwrap();

        let scanner = ImageScanner::new();
        let candidates = scanner.scan(dir.path()).unwrap();
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].filename, "Plant_00.png");
    }

    #[test]
    fn test_candidates_sorted_by_filename() {
        let dir = tempfile::tempdir().unwrap();
        let jpeg = [0xFF, 0xD8, 0xFF, 0xE0];
        fs::write(dir.path().join("Plant_02.jpg"), jpeg).unwrap();
        fs::write(dir.path().join("Plant_00.jpg"), jpeg).unwrap();
        fs::write(dir.path().join("Plant_01.jpg"), jpeg).unwrap();

        let scanner = ImageScanner::new();
        let candidates = scanner.scan(dir.path()).unwrap();
        let names: Vec<_> = candidates.iter().map(|c| c.filename.as_str()).collect();
        assert_eq!(names, vec!["Plant_00.jpg", "Plant_01.jpg", "Plant_02.jpg"]);
    }

    #[test]
    fn test_scan_empty_directory() {
        let dir = tempfile::tempdir().unwrap();
        let scanner = ImageScanner::new();
        let result = scanner.scan(dir.path()).unwrap();
        assert_eq!(result.len(), 0);
    }
}
