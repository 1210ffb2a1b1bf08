// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Correlator dump files.
//!
//! Each dump is a pair of files: `{name}.json` describing the dump, and
//! `{name}` holding fixed-size blocks of little-endian complex64 samples, one
//! block per integration. A trailing partial block is ignored.

use std::{
    fs::File,
    io::{BufReader, ErrorKind, Seek, SeekFrom},
    path::{Path, PathBuf},
    time::SystemTime,
};

use byteorder::{LittleEndian, ReadBytesExt};
use log::{debug, trace, warn};

use crate::{
    c32,
    constants::BYTES_PER_SAMPLE,
    descriptor::{FieldError, JsonFields},
    error::{FileIoError, PerFileDataError, SkippedFile},
    io::glob::{get_all_matches_from_glob, prefix_pattern},
    reorder::BlockLayout,
};

const REQUIRED_KEYS: [&str; 9] = [
    "first_seq_num",
    "num_baselines",
    "first_channel",
    "channels",
    "polarizations",
    "antennas",
    "ntime",
    "samples_per_block",
    "bytes_per_block",
];

/// How to put dump files into chronological order.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FileOrder {
    /// By the modification time of each metadata file.
    #[default]
    ModificationTime,
    /// By each file's `first_seq_num`.
    SequenceNumber,
}

/// The contents of a dump's metadata file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DumpMetadata {
    pub first_seq_num: u64,
    pub num_baselines: usize,
    pub first_channel: u64,
    pub channels: usize,
    pub polarizations: usize,
    pub antennas: usize,
    /// The number of correlator integrations in each block.
    pub ntime: u64,
    pub samples_per_block: usize,
    pub bytes_per_block: usize,
}

impl DumpMetadata {
    fn parse(text: &str, file: &Path) -> Result<DumpMetadata, PerFileDataError> {
        let fields = JsonFields::parse(text).map_err(|err| PerFileDataError::Parse {
            file: file.to_path_buf(),
            err,
        })?;
        if let Some(key) = fields.first_missing(&REQUIRED_KEYS) {
            return Err(PerFileDataError::MissingKey {
                key,
                file: file.to_path_buf(),
            });
        }
        let e = |fe: FieldError| match fe {
            FieldError::Missing(key) => PerFileDataError::MissingKey {
                key,
                file: file.to_path_buf(),
            },
            FieldError::Invalid { key, reason } => PerFileDataError::InvalidValue {
                key,
                file: file.to_path_buf(),
                reason,
            },
        };

        let meta = DumpMetadata {
            first_seq_num: fields.required("first_seq_num").map_err(e)?,
            num_baselines: fields.required("num_baselines").map_err(e)?,
            first_channel: fields.required("first_channel").map_err(e)?,
            channels: fields.required("channels").map_err(e)?,
            polarizations: fields.required("polarizations").map_err(e)?,
            antennas: fields.required("antennas").map_err(e)?,
            ntime: fields.required("ntime").map_err(e)?,
            samples_per_block: fields.required("samples_per_block").map_err(e)?,
            bytes_per_block: fields.required("bytes_per_block").map_err(e)?,
        };

        let layout = meta.layout();
        let num_samples =
            layout
                .checked_num_samples()
                .ok_or_else(|| PerFileDataError::InvalidValue {
                    key: "samples_per_block",
                    file: file.to_path_buf(),
                    reason: format!(
                        "{} baselines x {} channels x {}² products is too large",
                        meta.num_baselines, meta.channels, meta.polarizations
                    ),
                })?;
        if num_samples == 0 {
            return Err(PerFileDataError::InvalidValue {
                key: "samples_per_block",
                file: file.to_path_buf(),
                reason: "blocks must hold at least one sample".to_string(),
            });
        }
        if meta.samples_per_block != num_samples {
            return Err(PerFileDataError::InvalidValue {
                key: "samples_per_block",
                file: file.to_path_buf(),
                reason: format!(
                    "{} baselines x {} channels x {} products is {}, not {}",
                    meta.num_baselines,
                    meta.channels,
                    layout.num_pol_products(),
                    num_samples,
                    meta.samples_per_block
                ),
            });
        }
        let min_bytes = meta.samples_per_block.checked_mul(BYTES_PER_SAMPLE);
        if meta.bytes_per_block == 0 || min_bytes.map_or(true, |min| meta.bytes_per_block < min) {
            return Err(PerFileDataError::BlockSize {
                file: file.to_path_buf(),
                bytes_per_block: meta.bytes_per_block,
                samples_per_block: meta.samples_per_block,
            });
        }
        Ok(meta)
    }

    /// The shape of one block.
    pub fn layout(&self) -> BlockLayout {
        BlockLayout {
            num_baselines: self.num_baselines,
            num_chans: self.channels,
            num_pols: self.polarizations,
        }
    }
}

/// One correlator dump, validated and ready to read.
#[derive(Clone, Debug)]
pub struct DumpFile {
    pub metadata_path: PathBuf,
    pub data_path: PathBuf,
    pub meta: DumpMetadata,
    /// The number of whole blocks in the data file.
    pub num_blocks: usize,
    /// The modification time of the metadata file.
    pub modified: SystemTime,
}

/// One integration's worth of samples in correlator order.
#[derive(Clone, Debug)]
pub struct RawBlock {
    /// The block's position within its file.
    pub index: usize,
    pub samples: Vec<c32>,
}

impl DumpFile {
    /// Read and validate the metadata file at `metadata_path` and find its
    /// data file.
    pub fn open<P: AsRef<Path>>(metadata_path: P) -> Result<DumpFile, SkippedFile> {
        let metadata_path = metadata_path.as_ref();
        let read_err = |err| PerFileDataError::Read {
            file: metadata_path.to_path_buf(),
            err,
        };
        let text = std::fs::read_to_string(metadata_path).map_err(read_err)?;
        let modified = std::fs::metadata(metadata_path)
            .and_then(|m| m.modified())
            .map_err(read_err)?;
        let meta = DumpMetadata::parse(&text, metadata_path)?;

        let data_path = metadata_path.with_extension("");
        let data_len = match std::fs::metadata(&data_path) {
            Ok(m) if m.is_file() => m.len(),
            Ok(_) => return Err(FileIoError::MissingDataFile(data_path).into()),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(FileIoError::MissingDataFile(data_path).into())
            }
            Err(err) => {
                return Err(PerFileDataError::Read {
                    file: data_path,
                    err,
                }
                .into())
            }
        };
        let num_blocks = (data_len / meta.bytes_per_block as u64) as usize;
        let leftover = data_len % meta.bytes_per_block as u64;
        if leftover != 0 {
            debug!(
                "{} has {leftover} bytes past its last whole block; ignoring them",
                data_path.display()
            );
        }

        Ok(DumpFile {
            metadata_path: metadata_path.to_path_buf(),
            data_path,
            meta,
            num_blocks,
            modified,
        })
    }

    /// A fresh iterator over the file's whole blocks. Each call starts again
    /// from the beginning of the file.
    pub fn blocks(&self) -> Result<BlockIter, PerFileDataError> {
        let file = File::open(&self.data_path).map_err(|err| PerFileDataError::Read {
            file: self.data_path.clone(),
            err,
        })?;
        let samples = self.meta.samples_per_block;
        Ok(BlockIter {
            reader: BufReader::new(file),
            path: self.data_path.clone(),
            padding: (self.meta.bytes_per_block - samples * BYTES_PER_SAMPLE) as i64,
            num_blocks: self.num_blocks,
            next_index: 0,
            buffer: vec![0.0; samples * 2],
        })
    }
}

/// Yields the blocks of one data file in order.
pub struct BlockIter {
    reader: BufReader<File>,
    path: PathBuf,
    /// Bytes after each block's samples.
    padding: i64,
    num_blocks: usize,
    next_index: usize,
    buffer: Vec<f32>,
}

impl Iterator for BlockIter {
    type Item = Result<RawBlock, PerFileDataError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next_index >= self.num_blocks {
            return None;
        }
        let index = self.next_index;
        self.next_index += 1;

        if let Err(err) = self.reader.read_f32_into::<LittleEndian>(&mut self.buffer) {
            // The file shrank underneath us; there are no more whole blocks.
            if err.kind() == ErrorKind::UnexpectedEof {
                self.next_index = self.num_blocks;
                return None;
            }
            return Some(Err(PerFileDataError::Read {
                file: self.path.clone(),
                err,
            }));
        }
        if self.padding > 0 {
            if let Err(err) = self.reader.seek(SeekFrom::Current(self.padding)) {
                return Some(Err(PerFileDataError::Read {
                    file: self.path.clone(),
                    err,
                }));
            }
        }
        trace!("Read block {index} of {}", self.path.display());

        let samples = self
            .buffer
            .chunks_exact(2)
            .map(|re_im| c32::new(re_im[0], re_im[1]))
            .collect();
        Some(Ok(RawBlock { index, samples }))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.num_blocks - self.next_index))
    }
}

/// Find every dump in `input_dir` whose metadata file starts with
/// `base_name` and put them in chronological order. `exclude` (usually the
/// observation descriptor) is never treated as a dump.
///
/// Dumps that can't be used are returned alongside the good ones, with the
/// reason.
#[allow(clippy::type_complexity)]
pub fn discover_dumps(
    input_dir: &Path,
    base_name: &str,
    exclude: Option<&Path>,
    order: FileOrder,
) -> Result<(Vec<DumpFile>, Vec<(PathBuf, SkippedFile)>), FileIoError> {
    let pattern = prefix_pattern(input_dir, base_name, ".json");
    debug!("Looking for dumps matching {pattern}");
    let exclude = exclude.and_then(|p| p.canonicalize().ok());

    let mut dumps = vec![];
    let mut skipped = vec![];
    let mut num_matches = 0;
    for path in get_all_matches_from_glob(&pattern)? {
        if exclude.is_some() && path.canonicalize().ok() == exclude {
            continue;
        }
        num_matches += 1;
        match DumpFile::open(&path) {
            Ok(dump) => dumps.push(dump),
            Err(e) => {
                warn!("Skipping {}: {e}", path.display());
                skipped.push((path, e));
            }
        }
    }
    if num_matches == 0 {
        return Err(FileIoError::NoDumpFiles { pattern });
    }

    match order {
        FileOrder::ModificationTime => dumps.sort_by(|a, b| {
            a.modified
                .cmp(&b.modified)
                .then_with(|| a.metadata_path.cmp(&b.metadata_path))
        }),
        FileOrder::SequenceNumber => dumps.sort_by(|a, b| {
            a.meta
                .first_seq_num
                .cmp(&b.meta.first_seq_num)
                .then_with(|| a.metadata_path.cmp(&b.metadata_path))
        }),
    }
    Ok((dumps, skipped))
}
