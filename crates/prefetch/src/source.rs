//! Interfaces to the data model and the codecs
//!
//! The engine never parses files or owns row storage itself. The row
//! model (filtered, sorted view over the files being browsed) implements
//! [`RowSource`]; the format codecs implement [`Decoder`]. Both are
//! called from multiple threads.

use gallery_cache::ImagePixels;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Per-row load-state flags exposed by the row model.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RowFlags {
    /// Light metadata (dimensions, preview location) has been written.
    pub metadata_loaded: bool,

    /// A thumbnail has been written.
    pub icon_loaded: bool,

    /// Videos get metadata and icons but are never decoded full-size.
    pub is_video: bool,
}

/// Location of an embedded preview inside an image file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PreviewLocator {
    /// Byte offset of the preview stream.
    pub offset: u64,

    /// Length of the preview stream in bytes.
    pub length: u64,
}

/// Light metadata parsed from an image header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowMetadata {
    /// Full image width in pixels.
    pub width: u32,

    /// Full image height in pixels.
    pub height: u32,

    /// Embedded preview, when the format carries one.
    pub preview: Option<PreviewLocator>,
}

impl RowMetadata {
    /// Estimated size of the decoded full image (RGBA).
    ///
    /// Used for target-range budgeting before the row is decoded.
    pub fn estimated_full_bytes(&self) -> u64 {
        self.width as u64 * self.height as u64 * 4
    }
}

/// A decoded thumbnail (RGBA).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IconPixels {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

/// Per-unit decode failures.
///
/// These are per-row values, recorded and absorbed by the dispatcher.
/// They never abort sibling units or a generation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// The file exists but could not be decoded (corrupt data,
    /// unsupported codec, permission denied).
    #[error("failed to decode {}: {reason}", .path.display())]
    DecodeFailed { path: PathBuf, reason: String },

    /// The file could not be read at all, e.g. removable media ejected
    /// mid-scan.
    #[error("file unavailable: {}", .path.display())]
    IoUnavailable { path: PathBuf },
}

/// The ordered, filtered/sorted view over the files being browsed.
///
/// `generation()` increments whenever the active file set changes (new
/// folder, filter, or sort). The write methods carry the generation the
/// result was produced under so the model can double-check staleness;
/// the dispatcher already discards results whose stamp no longer matches
/// the live generation.
///
/// Only the dispatcher writes; the UI reads.
pub trait RowSource: Send + Sync {
    /// Number of rows in the current view.
    fn row_count(&self) -> usize;

    /// Path of the file at `key`, or `None` if the key is out of range.
    fn path_at(&self, key: usize) -> Option<PathBuf>;

    /// Load-state flags for the row at `key`.
    fn flags_at(&self, key: usize) -> RowFlags;

    /// Version tag of the current file set.
    fn generation(&self) -> u64;

    /// Store parsed metadata for a row.
    fn write_metadata(&self, key: usize, generation: u64, metadata: &RowMetadata);

    /// Store a thumbnail for a row, or drop it with `None`.
    fn write_icon(&self, key: usize, generation: u64, icon: Option<IconPixels>);
}

/// Format codecs, treated as opaque decode functions.
///
/// Implementations block on IO and CPU; they are only ever called from
/// worker threads, never the coordinator.
pub trait Decoder: Send + Sync {
    /// Parse light metadata from a file header.
    fn read_metadata(&self, path: &Path) -> Result<RowMetadata, DecodeError>;

    /// Decode a thumbnail no larger than `max_side` on its long edge.
    fn read_icon(&self, path: &Path, max_side: u32) -> Result<IconPixels, DecodeError>;

    /// Decode the full-size image.
    fn read_full(&self, path: &Path, metadata: &RowMetadata)
        -> Result<ImagePixels, DecodeError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_estimated_full_bytes() {
        let metadata = RowMetadata {
            width: 6000,
            height: 4000,
            preview: None,
        };
        assert_eq!(metadata.estimated_full_bytes(), 96_000_000);
    }

    #[test]
    fn test_decode_error_display() {
        let err = DecodeError::DecodeFailed {
            path: PathBuf::from("/photos/broken.cr2"),
            reason: "truncated header".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "failed to decode /photos/broken.cr2: truncated header"
        );

        let err = DecodeError::IoUnavailable {
            path: PathBuf::from("/mnt/card/img.jpg"),
        };
        assert_eq!(err.to_string(), "file unavailable: /mnt/card/img.jpg");
    }

    #[test]
    fn test_row_flags_default() {
        let flags = RowFlags::default();
        assert!(!flags.metadata_loaded);
        assert!(!flags.icon_loaded);
        assert!(!flags.is_video);
    }
}
