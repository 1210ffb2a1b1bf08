// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum UvfitsWriteError {
    /// An error when trying to write to an unexpected row.
    #[error("Tried to write to row number {row_num}, but only {num_rows} rows are expected")]
    BadRowNum {
        /// The row number (0-indexed)
        row_num: usize,
        /// Total number of rows expected.
        num_rows: usize,
    },

    /// An error when less rows were written to an HDU than expected.
    #[error("Expected {total} uvfits rows to be written, but only {current} were written")]
    NotEnoughRowsWritten {
        /// Number of rows written
        current: usize,
        /// Total number of rows expected.
        total: usize,
    },

    /// A row's visibilities don't fill the group's data array.
    #[error(transparent)]
    BadShape(#[from] BadBufferLength),

    /// An error converting the array position.
    #[error(transparent)]
    Geodetic(#[from] crate::pos::GeodeticError),

    /// An error associated with fitsio.
    #[error(transparent)]
    Fitsio(#[from] fitsio::errors::Error),

    /// cfitsio needs a UTF-8 path.
    #[error("Path {0} isn't valid UTF-8")]
    NonUtf8Path(std::path::PathBuf),

    /// An error when converting a Rust string to a C string.
    #[error(transparent)]
    BadString(#[from] std::ffi::NulError),

    /// An IO error.
    #[error(transparent)]
    IO(#[from] std::io::Error),
}

/// A buffer handed to a function doesn't have the length the function needs.
#[derive(Error, Debug)]
#[error("bad buffer length supplied to argument {argument} of function {function}. expected {expected}, received {received}")]
pub struct BadBufferLength {
    pub argument: &'static str,
    pub function: &'static str,
    pub expected: usize,
    pub received: usize,
}

impl BadBufferLength {
    /// Check that `received` equals `expected`.
    pub(crate) fn check(
        argument: &'static str,
        function: &'static str,
        expected: usize,
        received: usize,
    ) -> Result<(), BadBufferLength> {
        if expected == received {
            Ok(())
        } else {
            Err(BadBufferLength {
                argument,
                function,
                expected,
                received,
            })
        }
    }
}
