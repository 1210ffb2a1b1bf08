// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Synthetic observations for tests.

use std::{
    fs::File,
    path::{Path, PathBuf},
    time::{Duration as StdDuration, SystemTime},
};

use hifitime::{Duration, Epoch};
use ndarray::prelude::*;
use serde_json::{json, Value};
use tempfile::TempDir;

use crate::{
    antenna::AntennaPosition,
    assemble::{FinalisedDataset, UvwSource, VisibilityDataset},
    c32,
    constants::BYTES_PER_SAMPLE,
    math::{num_baselines, triangular_baselines},
    reorder::BlockLayout,
    LatLngHeight, RADec, XyzGeocentric, UVW,
};

pub(crate) const CHANNEL_WIDTH_HZ: f64 = 40e3;
pub(crate) const INTEGRATION_TIME_S: f64 = 2.0;
pub(crate) const NTIME: u64 = 4;

pub(crate) fn write_file(dir: &Path, name: &str, contents: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, contents).unwrap();
    path
}

/// Per-file metadata for a dump with this layout.
pub(crate) fn dump_json(layout: BlockLayout, first_seq_num: u64, bytes_per_block: usize) -> String {
    json!({
        "first_seq_num": first_seq_num,
        "num_baselines": layout.num_baselines,
        "first_channel": 0,
        "channels": layout.num_chans,
        "polarizations": layout.num_pols,
        "antennas": crate::math::num_ants_from_num_baselines(layout.num_baselines).unwrap_or(0),
        "ntime": NTIME,
        "samples_per_block": layout.num_samples(),
        "bytes_per_block": bytes_per_block,
    })
    .to_string()
}

/// Write `{name}` and `{name}.json` into `dir`, with `padding` bytes after
/// each block. Returns the metadata path.
pub(crate) fn write_dump(
    dir: &Path,
    name: &str,
    layout: BlockLayout,
    first_seq_num: u64,
    blocks: &[Vec<c32>],
    padding: usize,
) -> PathBuf {
    let bytes_per_block = layout.num_samples() * BYTES_PER_SAMPLE + padding;
    let mut bytes = Vec::with_capacity(blocks.len() * bytes_per_block);
    for block in blocks {
        assert_eq!(block.len(), layout.num_samples());
        for v in block {
            bytes.extend_from_slice(&v.re.to_le_bytes());
            bytes.extend_from_slice(&v.im.to_le_bytes());
        }
        bytes.extend(std::iter::repeat(0xff).take(padding));
    }
    std::fs::write(dir.join(name), bytes).unwrap();
    write_file(
        dir,
        &format!("{name}.json"),
        &dump_json(layout, first_seq_num, bytes_per_block),
    )
}

fn descriptor_value(dir: &Path, num_ants: usize, num_pols: usize) -> Value {
    let names: Vec<String> = (0..num_ants).map(|i| format!("ant{i}")).collect();
    let offsets: Vec<[f64; 3]> = (0..num_ants)
        .map(|i| {
            let i = i as f64;
            [35.0 * i, -20.0 * i * i, 3.0 * i]
        })
        .collect();
    json!({
        "antenna_names": names,
        "num_baselines": num_baselines(num_ants),
        "instrument": "TestCorrelator",
        "telescope_name": "TestScope",
        "telescope_location": [40.817431, -121.470736, 1019.222],
        "object_name": "TestField",
        "object_ra": 60.0,
        "object_dec": 30.0,
        "channel_width": CHANNEL_WIDTH_HZ,
        "first_channel_center_freq": 150e6,
        "integration_time_seconds": INTEGRATION_TIME_S,
        "polarizations": num_pols,
        "input_dir": dir,
        "output_dir": dir,
        "observation_base_name": "obs",
        "observation_start": "2023-06-01T12:00:00Z",
        "antenna_coord_relative_telescope_itrf_m": offsets,
    })
}

/// A descriptor for `num_ants` antennas with everything in `dir`. `extra`
/// is spliced in as additional `"key": value,` pairs.
pub(crate) fn descriptor_json(dir: &Path, num_ants: usize, num_pols: usize, extra: &str) -> String {
    let body = descriptor_value(dir, num_ants, num_pols).to_string();
    format!("{{{extra}{}", &body[1..])
}

/// A whole observation on disk: descriptor, input and output directories and
/// dumps.
pub(crate) struct SyntheticObs {
    pub(crate) dir: TempDir,
    pub(crate) descriptor: PathBuf,
    pub(crate) dumps: Vec<PathBuf>,
    layout: BlockLayout,
}

impl SyntheticObs {
    pub(crate) fn new(num_ants: usize, num_chans: usize, num_pols: usize) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("input");
        let output = dir.path().join("output");
        std::fs::create_dir(&input).unwrap();
        std::fs::create_dir(&output).unwrap();

        let mut v = descriptor_value(&input, num_ants, num_pols);
        v["output_dir"] = json!(output);
        // The descriptor sits among the dumps and matches their pattern.
        let descriptor = write_file(&input, "obs_descriptor.json", &v.to_string());
        SyntheticObs {
            dir,
            descriptor,
            dumps: vec![],
            layout: BlockLayout {
                num_baselines: num_baselines(num_ants),
                num_chans,
                num_pols,
            },
        }
    }

    pub(crate) fn input_dir(&self) -> PathBuf {
        self.dir.path().join("input")
    }

    pub(crate) fn output_dir(&self) -> PathBuf {
        self.dir.path().join("output")
    }

    pub(crate) fn with_descriptor_edit(self, edit: impl FnOnce(&mut Value)) -> Self {
        let text = std::fs::read_to_string(&self.descriptor).unwrap();
        let mut v: Value = serde_json::from_str(&text).unwrap();
        edit(&mut v);
        std::fs::write(&self.descriptor, v.to_string()).unwrap();
        self
    }

    /// Write one dump per entry of `blocks_per_file`, in chronological order
    /// by both sequence number and modification time.
    pub(crate) fn with_dumps(mut self, blocks_per_file: &[usize]) -> Self {
        let input = self.input_dir();
        let base = SystemTime::UNIX_EPOCH + StdDuration::from_secs(1_700_000_000);
        for (i, &num_blocks) in blocks_per_file.iter().enumerate() {
            let blocks: Vec<Vec<c32>> = (0..num_blocks)
                .map(|t| {
                    (0..self.layout.num_samples())
                        .map(|s| c32::new((i * 100 + t) as f32, s as f32))
                        .collect()
                })
                .collect();
            // 100 seconds apart.
            let seq = (i as f64 * 100.0 * CHANNEL_WIDTH_HZ) as u64;
            let json = write_dump(&input, &format!("obs_{i:04}"), self.layout, seq, &blocks, 0);
            File::options()
                .write(true)
                .open(&json)
                .unwrap()
                .set_modified(base + StdDuration::from_secs(60 * i as u64))
                .unwrap();
            self.dumps.push(json);
        }
        self
    }
}

/// A small finalised dataset with made-up but self-consistent values.
pub(crate) fn finalised_dataset(
    num_ants: usize,
    num_chans: usize,
    num_pols: usize,
    num_times: usize,
) -> FinalisedDataset {
    let location = LatLngHeight::from_degrees(40.817431, -121.470736, 1019.222);
    let centre = location.to_geocentric_wgs84().unwrap();
    let antennas: Vec<AntennaPosition> = (0..num_ants)
        .map(|i| AntennaPosition {
            name: format!("ANT{i}"),
            position: centre
                + XyzGeocentric {
                    x: 10.0 * i as f64,
                    y: -7.0 * i as f64,
                    z: 2.0 * i as f64,
                },
            delay_ns: 0.0,
        })
        .collect();
    let baselines = triangular_baselines(num_ants);
    let num_bls = baselines.len();
    let num_prods = num_pols * num_pols;
    let t0 = Epoch::from_gregorian_utc(2023, 6, 1, 12, 0, 0, 0);

    let uvws = Array2::from_shape_fn((num_times, num_bls), |(t, b)| {
        if baselines[b].is_auto() {
            UVW::default()
        } else {
            UVW {
                u: 10.0 * b as f64 + t as f64,
                v: -5.0 * b as f64,
                w: b as f64,
            }
        }
    });
    let data = VisibilityDataset {
        antennas,
        baselines,
        num_pols,
        first_channel: 0,
        freqs_hz: (0..num_chans)
            .map(|c| 150e6 + c as f64 * CHANNEL_WIDTH_HZ)
            .collect(),
        channel_width_hz: CHANNEL_WIDTH_HZ,
        timestamps: (0..num_times)
            .map(|t| t0 + Duration::from_seconds(t as f64 * INTEGRATION_TIME_S))
            .collect(),
        integration_times: vec![INTEGRATION_TIME_S; num_times],
        flags: Array4::from_elem((num_times, num_bls, num_chans, num_prods), false),
        nsamples: Array4::from_elem((num_times, num_bls, num_chans, num_prods), NTIME as f32),
        vis: Array4::from_shape_fn((num_times, num_bls, num_chans, num_prods), |(t, b, c, p)| {
            c32::new((t * 10 + b) as f32, (c * 10 + p) as f32)
        }),
        uvws,
    };
    FinalisedDataset {
        data,
        phase_centre: RADec::from_degrees(60.0, 30.0),
        telescope_name: "TestScope".to_string(),
        instrument: "TestCorrelator".to_string(),
        telescope_location: location,
        telescope_xyz: centre,
        object_name: "TestField".to_string(),
        dut1: Duration::from_seconds(0.0),
        fringe_stopped: false,
        uvw_source: UvwSource::Geometric,
    }
}
