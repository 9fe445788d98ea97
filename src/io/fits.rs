//! FITS output for simulated images.
//!
//! Writes a 2-D grid as a single double-precision primary HDU. Refusing to
//! overwrite an existing file is deliberate: students save their practice
//! frames from an interactive session, and a typo should not clobber an
//! earlier exercise. The collision is reported as a skipped write, not an
//! error.

use std::path::Path;

use fitsio::images::{ImageDescription, ImageType};
use fitsio::FitsFile;
use ndarray::Array2;
use thiserror::Error;

/// Errors that can occur while writing FITS files.
#[derive(Error, Debug)]
pub enum FitsError {
    #[error("FITS I/O error: {0}")]
    FitsIo(#[from] fitsio::errors::Error),
}

/// Result of a write attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// The file was created and the image written.
    Written,
    /// The destination already existed; nothing was written.
    SkippedExisting,
}

/// Write a 2-D image to a new FITS file.
///
/// Returns [`WriteOutcome::SkippedExisting`] without touching the file when
/// the destination already exists; pick another filename and write again.
///
/// # Arguments
/// * `data` - Image grid, `(rows, cols)`
/// * `path` - Destination path; must not exist yet
pub fn write_image<P: AsRef<Path>>(
    data: &Array2<f64>,
    path: P,
) -> Result<WriteOutcome, FitsError> {
    let path = path.as_ref();
    if path.exists() {
        log::warn!(
            "file {} already exists; choose another filename to save",
            path.display()
        );
        return Ok(WriteOutcome::SkippedExisting);
    }

    let (rows, cols) = data.dim();
    let description = ImageDescription {
        data_type: ImageType::Double,
        dimensions: &[rows, cols],
    };

    let mut fptr = FitsFile::create(path)
        .with_custom_primary(&description)
        .open()?;
    let hdu = fptr.primary_hdu()?;
    let flat: Vec<f64> = data.iter().copied().collect();
    hdu.write_image(&mut fptr, &flat)?;
    Ok(WriteOutcome::Written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_write_and_read_back() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("frame.fits");

        let mut image = Array2::<f64>::zeros((4, 6));
        image[[0, 0]] = 1.5;
        image[[3, 5]] = 42.0;

        let outcome = write_image(&image, &path).unwrap();
        assert_eq!(outcome, WriteOutcome::Written);
        assert!(path.exists());

        let mut fptr = FitsFile::open(&path).unwrap();
        let hdu = fptr.primary_hdu().unwrap();
        let read: Vec<f64> = hdu.read_image(&mut fptr).unwrap();
        assert_eq!(read.len(), 24);
        assert_relative_eq!(read[0], 1.5, epsilon = 1e-12);
        assert_relative_eq!(read[23], 42.0, epsilon = 1e-12);
    }

    #[test]
    fn test_existing_file_is_skipped_untouched() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("frame.fits");
        fs::write(&path, b"do not clobber").unwrap();

        let image = Array2::<f64>::from_elem((3, 3), 7.0);
        let outcome = write_image(&image, &path).unwrap();

        assert_eq!(outcome, WriteOutcome::SkippedExisting);
        assert_eq!(fs::read(&path).unwrap(), b"do not clobber");
    }
}
