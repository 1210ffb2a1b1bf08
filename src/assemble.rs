// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Fold dump files into a single visibility dataset.
//!
//! Files are offered to the [`VisibilityAssembler`] one at a time, in
//! chronological order. The first usable file fixes the frequency and
//! polarisation axes; every later file must agree. Once every file has been
//! offered, [`VisibilityAssembler::finalise`] works out UVWs (fringe-stopping
//! if asked) and hands back a [`FinalisedDataset`] ready for export.

use std::path::Path;

use byteorder::{ByteOrder, LittleEndian};
use hifitime::{Duration, Epoch};
use log::{debug, info, trace, warn};
use ndarray::prelude::*;

use crate::{
    antenna::AntennaPosition,
    c32,
    descriptor::ObservationDescriptor,
    dump::DumpFile,
    error::{AddFileError, ConsistencyError, ConvertError, FileIoError, PerFileDataError},
    fringe::{ArrayGeometry, Band},
    reorder::reorder_block,
    Baseline, LatLngHeight, RADec, XyzGeocentric, UVW,
};

/// The visibilities of a whole observation.
///
/// Rows are (time, baseline) pairs in time-major order, so row `r` is
/// timestep `r / B` and baseline `r % B`.
#[derive(Clone, Debug)]
pub struct VisibilityDataset {
    pub antennas: Vec<AntennaPosition>,
    pub baselines: Vec<Baseline>,
    /// Polarisations per antenna; there are `num_pols²` products.
    pub num_pols: usize,
    pub first_channel: u64,
    /// Centre frequency of each channel \[Hz\]
    pub freqs_hz: Vec<f64>,
    pub channel_width_hz: f64,
    /// The start of each timestep, from the start of its block.
    pub timestamps: Vec<Epoch>,
    /// \[seconds\], one per timestep
    pub integration_times: Vec<f64>,
    /// `[time][baseline][chan][pol product]`
    pub flags: Array4<bool>,
    /// `[time][baseline][chan][pol product]`
    pub nsamples: Array4<f32>,
    /// `[time][baseline][chan][pol product]`, products ordered XX, YY, XY,
    /// YX for dual-linear data.
    pub vis: Array4<c32>,
    /// `[time][baseline]` \[metres\]; zero until the dataset is finalised.
    pub uvws: Array2<UVW>,
}

impl VisibilityDataset {
    fn empty(
        antennas: Vec<AntennaPosition>,
        baselines: Vec<Baseline>,
        num_pols: usize,
        first_channel: u64,
        freqs_hz: Vec<f64>,
        channel_width_hz: f64,
    ) -> Self {
        let num_bls = baselines.len();
        let num_chans = freqs_hz.len();
        let shape = (0, num_bls, num_chans, num_pols * num_pols);
        VisibilityDataset {
            antennas,
            baselines,
            num_pols,
            first_channel,
            freqs_hz,
            channel_width_hz,
            timestamps: vec![],
            integration_times: vec![],
            flags: Array4::from_elem(shape, false),
            nsamples: Array4::zeros(shape),
            vis: Array4::zeros(shape),
            uvws: Array2::default((0, num_bls)),
        }
    }

    pub fn num_times(&self) -> usize {
        self.timestamps.len()
    }

    pub fn num_baselines(&self) -> usize {
        self.baselines.len()
    }

    pub fn num_chans(&self) -> usize {
        self.freqs_hz.len()
    }

    pub fn num_pol_products(&self) -> usize {
        self.num_pols * self.num_pols
    }

    /// The number of (time, baseline) rows.
    pub fn num_rows(&self) -> usize {
        self.num_times() * self.num_baselines()
    }

    /// The baseline index of `row`.
    #[inline]
    pub fn row_baseline_index(&self, row: usize) -> usize {
        row % self.num_baselines()
    }

    /// The timestep of `row`.
    #[inline]
    pub fn row_time_index(&self, row: usize) -> usize {
        row / self.num_baselines()
    }

    /// The antenna indices of `row`.
    pub fn row_antennas(&self, row: usize) -> (usize, usize) {
        let bl = self.baselines[self.row_baseline_index(row)];
        (bl.ant1, bl.ant2)
    }

    /// The Julian date (UTC) of `row`.
    pub fn row_jd(&self, row: usize) -> f64 {
        self.timestamps[self.row_time_index(row)].to_jde_utc_days()
    }

    /// Append one file's worth of timesteps.
    fn append(
        &mut self,
        timestamps: &[Epoch],
        integration_time: f64,
        nsamples: f32,
        vis: ArrayView4<c32>,
    ) -> Result<(), ConsistencyError> {
        let shape = vis.dim();
        let num_times = shape.0;
        let num_bls = shape.1;
        self.vis.append(Axis(0), vis)?;
        self.flags
            .append(Axis(0), Array4::from_elem(shape, false).view())?;
        self.nsamples
            .append(Axis(0), Array4::from_elem(shape, nsamples).view())?;
        self.uvws
            .append(Axis(0), Array2::default((num_times, num_bls)).view())?;
        self.timestamps.extend_from_slice(timestamps);
        self.integration_times
            .extend(std::iter::repeat(integration_time).take(num_times));
        Ok(())
    }
}

/// Where the assembler is in its life.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AssemblerState {
    /// No file has been accepted yet.
    Empty,
    /// At least one file has fixed the axes.
    Accumulating,
}

/// How to turn the assembled dataset into its final form.
#[derive(Clone, Copy, Debug)]
pub struct FinaliseOptions {
    pub phase_centre: RADec,
    pub fringe_stop: bool,
}

/// Where the exported UVWs came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UvwSource {
    File,
    FringeStop,
    Descriptor,
    Geometric,
}

impl std::fmt::Display for UvwSource {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                UvwSource::File => "the UVW file",
                UvwSource::FringeStop => "fringe-stopping",
                UvwSource::Descriptor => "the descriptor's baseline vectors",
                UvwSource::Geometric => "antenna positions",
            }
        )
    }
}

/// A complete dataset plus the observation context an exporter needs.
#[derive(Clone, Debug)]
pub struct FinalisedDataset {
    pub data: VisibilityDataset,
    pub phase_centre: RADec,
    pub telescope_name: String,
    pub instrument: String,
    pub telescope_location: LatLngHeight,
    pub telescope_xyz: XyzGeocentric,
    pub object_name: String,
    /// UT1 - UTC
    pub dut1: Duration,
    pub fringe_stopped: bool,
    pub uvw_source: UvwSource,
}

/// Builds a [`VisibilityDataset`] from dump files offered in time order.
pub struct VisibilityAssembler<'a> {
    desc: &'a ObservationDescriptor,
    antennas: Vec<AntennaPosition>,
    baselines: Vec<Baseline>,
    obs_start: Epoch,
    dataset: Option<VisibilityDataset>,
    /// The time of the latest block accepted.
    last_time: Option<Epoch>,
}

impl<'a> VisibilityAssembler<'a> {
    /// `antennas` must be in descriptor order. Block times are counted from
    /// `obs_start`.
    pub fn new(
        desc: &'a ObservationDescriptor,
        antennas: Vec<AntennaPosition>,
        obs_start: Epoch,
    ) -> Self {
        Self {
            desc,
            antennas,
            baselines: desc.baselines(),
            obs_start,
            dataset: None,
            last_time: None,
        }
    }

    pub fn state(&self) -> AssemblerState {
        match self.dataset {
            None => AssemblerState::Empty,
            Some(_) => AssemblerState::Accumulating,
        }
    }

    /// The dataset so far, if any file has been accepted.
    pub fn dataset(&self) -> Option<&VisibilityDataset> {
        self.dataset.as_ref()
    }

    /// Check a file's axes against the descriptor and the first accepted
    /// file.
    fn check_axes(&self, dump: &DumpFile) -> Result<(), ConsistencyError> {
        let meta = &dump.meta;
        let file = || dump.metadata_path.clone();
        if meta.num_baselines != self.desc.num_baselines {
            return Err(ConsistencyError::BaselineMismatch {
                file: file(),
                expected: self.desc.num_baselines,
                got: meta.num_baselines,
            });
        }
        if meta.antennas != self.desc.num_ants() {
            warn!(
                "{} says it has {} antennas, but the descriptor lists {}",
                dump.metadata_path.display(),
                meta.antennas,
                self.desc.num_ants()
            );
        }

        let (expected_pols, expected_chans, expected_first) = match &self.dataset {
            Some(d) => (d.num_pols, Some(d.num_chans()), Some(d.first_channel)),
            None => (self.desc.num_pols, None, None),
        };
        if meta.polarizations != expected_pols {
            return Err(ConsistencyError::PolarisationMismatch {
                file: file(),
                expected: expected_pols,
                got: meta.polarizations,
            });
        }
        if let Some(expected) = expected_chans {
            if meta.channels != expected {
                return Err(ConsistencyError::ChannelMismatch {
                    file: file(),
                    expected,
                    got: meta.channels,
                });
            }
        }
        if let Some(expected) = expected_first {
            if meta.first_channel != expected {
                return Err(ConsistencyError::FirstChannelMismatch {
                    file: file(),
                    expected,
                    got: meta.first_channel,
                });
            }
        }
        Ok(())
    }

    /// The start time of each of a file's blocks.
    fn block_times(&self, dump: &DumpFile, num_blocks: usize) -> Vec<Epoch> {
        let file_start = self.obs_start
            + Duration::from_seconds(dump.meta.first_seq_num as f64 / self.desc.channel_width_hz);
        (0..num_blocks)
            .map(|k| {
                file_start + Duration::from_seconds(k as f64 * self.desc.integration_time_seconds)
            })
            .collect()
    }

    /// Read every block of `dump` and fold it into the dataset, returning
    /// the number of timesteps added.
    ///
    /// Nothing from the file enters the dataset unless the whole file reads
    /// cleanly. [`AddFileError::Skipped`] means the run can carry on without
    /// this file; [`AddFileError::Fatal`] means it can't.
    pub fn add_file(&mut self, dump: &DumpFile) -> Result<usize, AddFileError> {
        self.check_axes(dump)?;

        let times = self.block_times(dump, dump.num_blocks);
        if let (Some(previous), Some(&got)) = (self.last_time, times.first()) {
            if got < previous {
                return Err(ConsistencyError::TimeWentBackwards {
                    file: dump.metadata_path.clone(),
                    previous,
                    got,
                }
                .into());
            }
        }

        let layout = dump.meta.layout();
        let num_samples = layout.num_samples();
        let mut buffer = vec![c32::default(); dump.num_blocks * num_samples];
        let mut num_read = 0;
        for (block, out) in dump.blocks()?.zip(buffer.chunks_exact_mut(num_samples)) {
            let block = block?;
            reorder_block(&block.samples, layout, out).map_err(PerFileDataError::from)?;
            trace!("Reordered block {} of {}", block.index, dump.data_path.display());
            num_read += 1;
        }
        if num_read < dump.num_blocks {
            warn!(
                "{} ended after {num_read} of {} blocks",
                dump.data_path.display(),
                dump.num_blocks
            );
            buffer.truncate(num_read * num_samples);
        }
        let vis = Array4::from_shape_vec(
            (
                num_read,
                layout.num_baselines,
                layout.num_chans,
                layout.num_pol_products(),
            ),
            buffer,
        )
        .map_err(ConsistencyError::from)?;

        let dataset = self.dataset.get_or_insert_with(|| {
            debug!(
                "{} fixes the axes: {} channels from channel {}, {} polarisations",
                dump.metadata_path.display(),
                dump.meta.channels,
                dump.meta.first_channel,
                dump.meta.polarizations
            );
            VisibilityDataset::empty(
                self.antennas.clone(),
                self.baselines.clone(),
                dump.meta.polarizations,
                dump.meta.first_channel,
                self.desc.channel_freqs_hz(dump.meta.channels),
                self.desc.channel_width_hz,
            )
        });
        dataset.append(
            &times[..num_read],
            self.desc.integration_time_seconds,
            dump.meta.ntime as f32,
            vis.view(),
        )?;
        if num_read > 0 {
            self.last_time = Some(times[num_read - 1]);
        }
        info!(
            "Added {num_read} timesteps from {}",
            dump.metadata_path.display()
        );
        Ok(num_read)
    }

    /// Work out UVWs, fringe-stopping if asked, and package the dataset for
    /// export.
    ///
    /// UVWs come from, in order of preference: the descriptor's `uvw_file`,
    /// fringe-stopping, the descriptor's per-baseline vectors, and finally
    /// the antenna positions.
    pub fn finalise(self, options: FinaliseOptions) -> Result<FinalisedDataset, ConvertError> {
        let desc = self.desc;
        let mut data = match self.dataset {
            Some(d) if d.num_times() > 0 => d,
            _ => return Err(ConsistencyError::NoUsableData.into()),
        };

        let from_file = match &desc.uvw_file {
            Some(path) => Some(read_uvw_file(path, data.num_times(), data.num_baselines())?),
            None => None,
        };

        let geometry = ArrayGeometry {
            antennas: &data.antennas,
            baselines: &data.baselines,
            phase_centre: options.phase_centre,
            dut1: desc.dut1,
        };
        let band = Band {
            first_freq_hz: desc.first_channel_center_freq_hz,
            channel_width_hz: data.channel_width_hz,
            num_chans: data.num_chans(),
        };
        let (uvws, uvw_source) = if options.fringe_stop {
            let uvws = geometry
                .fringe_stop(&data.timestamps, band, data.vis.view_mut())
                .map_err(ConsistencyError::from)?;
            (uvws, UvwSource::FringeStop)
        } else if let Some(vectors) = &desc.baseline_uvw_vectors {
            let row = ArrayView1::from(vectors.as_slice());
            let uvws = row
                .broadcast((data.num_times(), vectors.len()))
                .map(|b| b.to_owned())
                .ok_or(ConsistencyError::BadShape(
                    crate::io::error::BadBufferLength {
                        argument: "baseline_uvw_vectors",
                        function: "VisibilityAssembler::finalise",
                        expected: data.num_baselines(),
                        received: vectors.len(),
                    },
                ))?;
            (uvws, UvwSource::Descriptor)
        } else {
            (geometry.compute_uvws(&data.timestamps), UvwSource::Geometric)
        };
        let (uvws, uvw_source) = match from_file {
            Some(uvws) => (uvws, UvwSource::File),
            None => (uvws, uvw_source),
        };
        data.uvws = uvws;
        debug!("UVWs come from {uvw_source}");

        Ok(FinalisedDataset {
            data,
            phase_centre: options.phase_centre,
            telescope_name: desc.telescope_name.clone(),
            instrument: desc.instrument.clone(),
            telescope_location: desc.telescope_location,
            telescope_xyz: desc.telescope_xyz,
            object_name: desc.object_name.clone(),
            dut1: desc.dut1,
            fringe_stopped: options.fringe_stop,
            uvw_source,
        })
    }
}

/// Read `num_times × num_baselines` UVWs \[metres\] from a raw little-endian
/// f64 file laid out as `[row][u, v, w]`.
pub fn read_uvw_file(
    path: &Path,
    num_times: usize,
    num_baselines: usize,
) -> Result<Array2<UVW>, ConvertError> {
    let bytes = std::fs::read(path).map_err(|err| FileIoError::UvwFile {
        file: path.to_path_buf(),
        err,
    })?;
    let rows = num_times * num_baselines;
    let expected = rows * 3;
    let got = bytes.len() / 8;
    if bytes.len() % 8 != 0 || got != expected {
        return Err(ConsistencyError::UvwFileShape {
            file: path.to_path_buf(),
            rows,
            expected,
            got,
        }
        .into());
    }
    let mut values = vec![0.0; expected];
    LittleEndian::read_f64_into(&bytes, &mut values);
    let uvws = values
        .chunks_exact(3)
        .map(|c| UVW {
            u: c[0],
            v: c[1],
            w: c[2],
        })
        .collect::<Vec<_>>();
    Ok(Array2::from_shape_vec((num_times, num_baselines), uvws).map_err(ConsistencyError::from)?)
}
