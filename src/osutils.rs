//! Filesystem access used at plan time.

use std::path::Path;

use crate::error::{PlanError, Result};

/// Reads files referenced by resources.
#[cfg_attr(test, mockall::automock)]
pub trait FileReader {
    /// Returns the raw contents of a file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read.
    fn get_file_contents(&self, path: &Path) -> Result<Vec<u8>>;
}

/// [`FileReader`] backed by the local filesystem.
#[derive(Debug, Default, Clone, Copy)]
pub struct OsFileReader;

impl FileReader for OsFileReader {
    fn get_file_contents(&self, path: &Path) -> Result<Vec<u8>> {
        std::fs::read(path).map_err(|e| {
            PlanError::FileReadFailed {
                path: path.to_path_buf(),
                message: e.to_string(),
            }
            .into()
        })
    }
}
