//! Stored photo files and their untouched originals.
//!
//! ```text
//! <dir>/
//! ├── a1b2c3….jpg               # current (display) file, overwritten by edits
//! ├── _original_a1b2c3….jpg     # pristine copy, created on the first edit
//! └── thumbs/
//!     └── a1b2c3….jpg           # thumbnail of the current file
//! ```
//!
//! Once `_original_` exists, every edit starts from it and replaces only the
//! current file, so edits never stack on each other's lossy output.

use super::backend::ImagingError;
use super::editor::ImageEditor;
use crate::files::copy_atomic;
use std::path::{Path, PathBuf};

pub const ORIGINAL_PREFIX: &str = "_original_";
pub const THUMBS_DIR: &str = "thumbs";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageAsset {
    dir: PathBuf,
    filename: String,
}

impl ImageAsset {
    pub fn new(dir: impl Into<PathBuf>, filename: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            filename: filename.into(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn current_path(&self) -> PathBuf {
        self.dir.join(&self.filename)
    }

    pub fn original_path(&self) -> PathBuf {
        self.dir.join(format!("{ORIGINAL_PREFIX}{}", self.filename))
    }

    pub fn thumbnail_path(&self) -> PathBuf {
        self.dir.join(THUMBS_DIR).join(&self.filename)
    }

    pub fn has_original(&self) -> bool {
        self.original_path().is_file()
    }

    /// The file edits should read from: the original if one exists.
    pub fn edit_source(&self) -> PathBuf {
        if self.has_original() {
            self.original_path()
        } else {
            self.current_path()
        }
    }

    /// Copy the current file to the original slot unless it is already there.
    pub fn ensure_original(&self) -> Result<PathBuf, ImagingError> {
        let original = self.original_path();
        if !original.is_file() {
            copy_atomic(&self.current_path(), &original)?;
        }
        Ok(original)
    }

    /// Open the original for a persistent edit, targeting the current file.
    pub fn open_for_edit(&self) -> Result<ImageEditor, ImagingError> {
        let original = self.ensure_original()?;
        Ok(ImageEditor::open(&original)?.with_target(self.current_path()))
    }

    /// Remove the current file, its original and its thumbnail. Missing
    /// files are ignored.
    pub fn remove_files(&self) -> Result<(), ImagingError> {
        for path in [
            self.current_path(),
            self.original_path(),
            self.thumbnail_path(),
        ] {
            match std::fs::remove_file(&path) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }
}
