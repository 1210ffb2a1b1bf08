// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Error types for a conversion run.
//!
//! Fatal errors are grouped by class; each class maps to a process exit code
//! through [`ConvertError::exit_code`]. Per-file problems that only cause a
//! dump file to be skipped are [`SkippedFile`]s and never abort a run.

use std::path::PathBuf;

use thiserror::Error;

use crate::io::{error::BadBufferLength, GlobError, UvfitsWriteError};

/// A problem with the observation descriptor or the command line.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Observation descriptor {file} is missing required key '{key}'")]
    MissingKey { key: &'static str, file: PathBuf },

    #[error("Observation descriptor {file} has an invalid value for '{key}': {reason}")]
    InvalidValue {
        key: &'static str,
        file: PathBuf,
        reason: String,
    },

    #[error("Couldn't parse observation descriptor {file} as JSON: {err}")]
    Parse {
        file: PathBuf,
        err: serde_json::Error,
    },

    #[error("Couldn't read observation descriptor {file}: {err}")]
    Read { file: PathBuf, err: std::io::Error },

    #[error("Descriptor says there are {num_baselines} baselines, but {num_ants} antennas make {expected}")]
    BaselineMismatch {
        num_baselines: usize,
        num_ants: usize,
        expected: usize,
    },

    #[error("Couldn't understand the timestamp '{0}'; expected RFC 3339 or 'YYYY-MM-DD HH:MM:SS'")]
    BadTimestamp(String),

    #[error("Object '{0}' isn't in the source catalogue and the descriptor has no object_ra/object_dec")]
    UnresolvablePhaseCentre(String),
}

/// A problem finding or reading files.
#[derive(Error, Debug)]
pub enum FileIoError {
    #[error("Input directory {0} doesn't exist")]
    InputDirMissing(PathBuf),

    #[error("Output directory {0} doesn't exist")]
    OutputDirMissing(PathBuf),

    #[error("No dump files matching {pattern} were found")]
    NoDumpFiles { pattern: String },

    #[error("Data file {0} for its metadata file doesn't exist")]
    MissingDataFile(PathBuf),

    #[error("Couldn't read antenna coordinate table {file}: {err}")]
    CoordinateTable { file: PathBuf, err: std::io::Error },

    #[error("Antenna coordinate table {0} has no usable rows")]
    EmptyCoordinateTable(PathBuf),

    #[error(transparent)]
    Glob(#[from] GlobError),

    #[error("Couldn't read UVW file {file}: {err}")]
    UvwFile { file: PathBuf, err: std::io::Error },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// A problem with one dump file. The file is skipped and the run continues.
#[derive(Error, Debug)]
pub enum PerFileDataError {
    #[error("Metadata file {file} is missing required key '{key}'")]
    MissingKey { key: &'static str, file: PathBuf },

    #[error("Couldn't parse metadata file {file}: {err}")]
    Parse {
        file: PathBuf,
        err: serde_json::Error,
    },

    #[error("Couldn't read {file}: {err}")]
    Read { file: PathBuf, err: std::io::Error },

    #[error("Metadata file {file} has an invalid value for '{key}': {reason}")]
    InvalidValue {
        key: &'static str,
        file: PathBuf,
        reason: String,
    },

    #[error("Metadata file {file} has {bytes_per_block} bytes per block, too few for {samples_per_block} samples")]
    BlockSize {
        file: PathBuf,
        bytes_per_block: usize,
        samples_per_block: usize,
    },

    #[error(transparent)]
    BadBuffer(#[from] BadBufferLength),
}

/// The data disagree with themselves or with the descriptor.
#[derive(Error, Debug)]
pub enum ConsistencyError {
    #[error("{file} has {got} channels, but the first file had {expected}")]
    ChannelMismatch {
        file: PathBuf,
        expected: usize,
        got: usize,
    },

    #[error("{file} starts at channel {got}, but the first file started at {expected}")]
    FirstChannelMismatch {
        file: PathBuf,
        expected: u64,
        got: u64,
    },

    #[error("{file} has {got} polarisations, but the first file had {expected}")]
    PolarisationMismatch {
        file: PathBuf,
        expected: usize,
        got: usize,
    },

    #[error("{file} has {got} baselines, but the descriptor has {expected}")]
    BaselineMismatch {
        file: PathBuf,
        expected: usize,
        got: usize,
    },

    #[error("Antenna '{name}' isn't in the coordinate table; valid names are: {valid}")]
    UnknownAntenna { name: String, valid: String },

    #[error("{file} starts at {got}, which is before the previous block at {previous}")]
    TimeWentBackwards {
        file: PathBuf,
        previous: hifitime::Epoch,
        got: hifitime::Epoch,
    },

    #[error("UVW file {file} holds {got} values, but {expected} ({rows} rows x 3) are needed")]
    UvwFileShape {
        file: PathBuf,
        rows: usize,
        expected: usize,
        got: usize,
    },

    #[error("No usable data were assembled")]
    NoUsableData,

    #[error(transparent)]
    BadShape(#[from] BadBufferLength),

    #[error("Couldn't grow the dataset: {0}")]
    Append(#[from] ndarray::ShapeError),
}

/// The dataset couldn't be exported.
#[derive(Error, Debug)]
pub enum ExportError {
    #[error(transparent)]
    Uvfits(#[from] UvfitsWriteError),

    #[error("Dataset failed validation: {0}")]
    Validation(String),

    #[error("Couldn't move the finished file into place at {dest}: {err}")]
    Persist { dest: PathBuf, err: std::io::Error },

    #[error("UVFITS export supports 1 or 2 polarisations, but the data have {0}")]
    UnsupportedPolarisations(usize),
}

/// Why a dump file was left out of the dataset.
#[derive(Error, Debug)]
pub enum SkippedFile {
    #[error(transparent)]
    FileIo(#[from] FileIoError),

    #[error(transparent)]
    PerFileData(#[from] PerFileDataError),
}

/// The result of offering a dump file to the assembler when it isn't used.
#[derive(Error, Debug)]
pub enum AddFileError {
    /// The file was left out; the run continues.
    #[error(transparent)]
    Skipped(#[from] SkippedFile),

    /// The run can't continue.
    #[error(transparent)]
    Fatal(#[from] ConsistencyError),
}

impl From<PerFileDataError> for AddFileError {
    fn from(e: PerFileDataError) -> Self {
        AddFileError::Skipped(e.into())
    }
}

/// Every error that ends a conversion run.
#[derive(Error, Debug)]
pub enum ConvertError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    FileIo(#[from] FileIoError),

    #[error(transparent)]
    Consistency(#[from] ConsistencyError),

    #[error(transparent)]
    Export(#[from] ExportError),
}

impl ConvertError {
    /// The process exit code for this class of error.
    pub fn exit_code(&self) -> i32 {
        match self {
            ConvertError::Config(_) => 1,
            ConvertError::FileIo(_) => 2,
            ConvertError::Consistency(_) => 3,
            ConvertError::Export(_) => 4,
        }
    }
}
