// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Integration tests.
//!
//! Some help for laying out these tests was taken from:
//! https://matklad.github.io/2021/02/27/delete-cargo-integration-tests.html

mod cli;
mod ordering;

use std::{
    fs::File,
    path::{Path, PathBuf},
    process::Output,
    str::from_utf8,
    time::{Duration, SystemTime},
};

use assert_cmd::{output::OutputError, Command};
use fitsio::FitsFile;
use serde_json::{json, Value};
use tempfile::TempDir;

use xengine_vis::math::{num_ants_from_num_baselines, num_baselines};

const CHANNEL_WIDTH_HZ: f64 = 40e3;

fn xengine_vis() -> Command {
    Command::cargo_bin("xengine-vis").unwrap()
}

fn get_cmd_output(result: Result<Output, OutputError>) -> (String, String) {
    let output = match result {
        Ok(o) => o,
        Err(o) => o.as_output().unwrap().clone(),
    };
    (
        from_utf8(&output.stdout).unwrap().to_string(),
        from_utf8(&output.stderr).unwrap().to_string(),
    )
}

/// One observation on disk, built up dump by dump.
struct Obs {
    dir: TempDir,
    descriptor: PathBuf,
    num_baselines: usize,
    num_pols: usize,
}

impl Obs {
    fn new(num_ants: usize, num_pols: usize) -> Obs {
        Obs::with_descriptor(num_ants, num_pols, |_| ())
    }

    fn with_descriptor(num_ants: usize, num_pols: usize, edit: impl FnOnce(&mut Value)) -> Obs {
        let dir = TempDir::new().expect("couldn't make tmp dir");
        let input = dir.path().join("input");
        let output = dir.path().join("output");
        std::fs::create_dir(&input).unwrap();
        std::fs::create_dir(&output).unwrap();

        let names: Vec<String> = (0..num_ants).map(|i| format!("ant{i}")).collect();
        let offsets: Vec<[f64; 3]> = (0..num_ants)
            .map(|i| [25.0 * i as f64, -12.0 * (i * i) as f64, 4.0 * i as f64])
            .collect();
        let mut v = json!({
            "antenna_names": names,
            "num_baselines": num_baselines(num_ants),
            "instrument": "TestCorrelator",
            "telescope_name": "TestScope",
            "telescope_location": [40.817431, -121.470736, 1019.222],
            "object_name": "Field A",
            "object_ra": 150.0,
            "object_dec": 45.0,
            "channel_width": CHANNEL_WIDTH_HZ,
            "first_channel_center_freq": 1.42e9,
            "integration_time_seconds": 2.0,
            "polarizations": num_pols,
            "input_dir": input,
            "output_dir": output,
            "observation_base_name": "obs",
            "observation_start": "2024-02-01T03:00:00Z",
            "antenna_coord_relative_telescope_itrf_m": offsets,
        });
        edit(&mut v);
        let descriptor = input.join("obs_descriptor.json");
        std::fs::write(&descriptor, v.to_string()).unwrap();
        Obs {
            dir,
            descriptor,
            num_baselines: num_baselines(num_ants),
            num_pols,
        }
    }

    fn input_dir(&self) -> PathBuf {
        self.dir.path().join("input")
    }

    fn default_output(&self) -> PathBuf {
        self.dir.path().join("output").join("obs.uvfits")
    }

    /// Write a dump of `num_blocks` blocks (plus `extra_bytes` of a
    /// truncated block) and stamp its metadata file with `mtime_s` seconds
    /// past an arbitrary epoch. Returns the metadata path.
    fn add_dump(
        &self,
        name: &str,
        first_seq_num: u64,
        num_chans: usize,
        num_blocks: usize,
        extra_bytes: usize,
        mtime_s: u64,
    ) -> PathBuf {
        let num_samples = self.num_baselines * num_chans * self.num_pols * self.num_pols;
        let bytes_per_block = num_samples * 8;
        let mut bytes = Vec::with_capacity(num_blocks * bytes_per_block + extra_bytes);
        for i in 0..num_blocks * num_samples {
            bytes.extend_from_slice(&(i as f32).to_le_bytes());
            bytes.extend_from_slice(&(-1.0f32).to_le_bytes());
        }
        bytes.resize(num_blocks * bytes_per_block + extra_bytes, 0);
        let input = self.input_dir();
        std::fs::write(input.join(name), bytes).unwrap();

        let meta = json!({
            "first_seq_num": first_seq_num,
            "num_baselines": self.num_baselines,
            "first_channel": 0,
            "channels": num_chans,
            "polarizations": self.num_pols,
            "antennas": num_ants_from_num_baselines(self.num_baselines),
            "ntime": 4,
            "samples_per_block": num_samples,
            "bytes_per_block": bytes_per_block,
        });
        let json_path = input.join(format!("{name}.json"));
        std::fs::write(&json_path, meta.to_string()).unwrap();
        File::options()
            .write(true)
            .open(&json_path)
            .unwrap()
            .set_modified(SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000 + mtime_s))
            .unwrap();
        json_path
    }

    fn convert_cmd(&self) -> Command {
        let mut cmd = xengine_vis();
        cmd.args(["convert", "--input"]).arg(&self.descriptor);
        cmd
    }
}

/// The sequence number `seconds` into the observation.
fn seq(seconds: f64) -> u64 {
    (seconds * CHANNEL_WIDTH_HZ) as u64
}

fn read_gcount(path: &Path) -> i64 {
    let mut f = FitsFile::open(path).unwrap();
    let hdu = f.hdu(0).unwrap();
    hdu.read_key(&mut f, "GCOUNT").unwrap()
}

/// The Julian date of every row.
fn read_row_dates(path: &Path) -> Vec<f64> {
    let num_rows = read_gcount(path);
    let mut f = FitsFile::open(path).unwrap();
    let mut dates = Vec::with_capacity(num_rows as usize);
    for group in 1..=num_rows {
        let mut params = [0.0f64; 7];
        let mut status = 0;
        unsafe {
            // ffggpd = fits_read_grppar_dbl
            fitsio_sys::ffggpd(f.as_raw(), group, 1, 7, params.as_mut_ptr(), &mut status);
        }
        assert_eq!(status, 0, "cfitsio status {status}");
        dates.push(params[4] + params[5]);
    }
    dates
}
