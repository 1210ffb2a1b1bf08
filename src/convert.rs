// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Run the whole pipeline: descriptor to uvfits.

use std::path::{Path, PathBuf};

use hifitime::Epoch;
use log::{info, warn};

use crate::{
    antenna::resolve_antennas,
    assemble::{FinaliseOptions, UvwSource, VisibilityAssembler},
    catalog::resolve_phase_centre,
    descriptor::{epoch_from_system_time, load_descriptor},
    dump::{discover_dumps, FileOrder},
    error::{AddFileError, ConvertError, FileIoError, SkippedFile},
    io::export_uvfits,
};

/// What a conversion run should do.
#[derive(Clone, Debug)]
pub struct ConvertParams {
    /// The observation descriptor.
    pub descriptor: PathBuf,
    /// Where to write; `{output_dir}/{observation_base_name}.uvfits` if not
    /// given.
    pub output: Option<PathBuf>,
    /// Run the stricter checks before exporting.
    pub validate: bool,
    /// Force fringe-stopping on or off. By default it's on when the
    /// descriptor supplies antenna delays.
    pub fringe_stop: Option<bool>,
    pub order: FileOrder,
}

/// What a successful run did.
#[derive(Debug)]
pub struct ConvertSummary {
    pub output: PathBuf,
    pub files_used: usize,
    pub files_skipped: Vec<(PathBuf, SkippedFile)>,
    pub num_timesteps: usize,
    pub num_baselines: usize,
    pub num_chans: usize,
    pub num_pols: usize,
    pub fringe_stopped: bool,
    pub uvw_source: UvwSource,
}

fn require_dir(dir: &Path, missing: fn(PathBuf) -> FileIoError) -> Result<(), FileIoError> {
    if dir.is_dir() {
        Ok(())
    } else {
        Err(missing(dir.to_path_buf()))
    }
}

/// Convert one observation's correlator dumps to uvfits.
pub fn convert(params: &ConvertParams) -> Result<ConvertSummary, ConvertError> {
    let (desc, baselines) = load_descriptor(&params.descriptor)?;
    info!(
        "Observation {}: {} antennas, {} baselines, {} polarisations",
        desc.observation_base_name,
        desc.num_ants(),
        baselines.len(),
        desc.num_pols
    );
    require_dir(&desc.input_dir, FileIoError::InputDirMissing)?;
    let output = params
        .output
        .clone()
        .unwrap_or_else(|| desc.default_output());
    match output.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => require_dir(dir, FileIoError::OutputDirMissing)?,
        _ => require_dir(Path::new("."), FileIoError::OutputDirMissing)?,
    }

    let phase_centre = resolve_phase_centre(&desc)?;
    let antennas = resolve_antennas(&desc)?;

    let (dumps, mut files_skipped) = discover_dumps(
        &desc.input_dir,
        &desc.observation_base_name,
        Some(&desc.path),
        params.order,
    )?;
    info!(
        "Found {} dump files ({} unusable)",
        dumps.len() + files_skipped.len(),
        files_skipped.len()
    );

    let obs_start: Epoch = match (desc.observation_start, dumps.first()) {
        (Some(start), _) => start,
        (None, Some(first)) => {
            let start = epoch_from_system_time(first.modified);
            warn!(
                "The descriptor has no observation_start; using the modification time of {} ({start})",
                first.metadata_path.display()
            );
            start
        }
        (None, None) => {
            warn!("The descriptor has no observation_start and there are no usable dumps");
            epoch_from_system_time(std::time::SystemTime::now())
        }
    };

    let mut assembler = VisibilityAssembler::new(&desc, antennas, obs_start);
    let mut files_used = 0;
    for dump in &dumps {
        match assembler.add_file(dump) {
            Ok(_) => files_used += 1,
            Err(AddFileError::Skipped(e)) => {
                warn!("Skipping {}: {e}", dump.metadata_path.display());
                files_skipped.push((dump.metadata_path.clone(), e));
            }
            Err(AddFileError::Fatal(e)) => return Err(e.into()),
        }
    }

    let fringe_stop = params
        .fringe_stop
        .unwrap_or(desc.antenna_delays_ns.is_some());
    let dataset = assembler.finalise(FinaliseOptions {
        phase_centre,
        fringe_stop,
    })?;

    let d = &dataset.data;
    info!("Assembled {files_used} files; skipped {}", files_skipped.len());
    for (path, reason) in &files_skipped {
        info!("  skipped {}: {reason}", path.display());
    }
    info!(
        "{} timesteps x {} baselines x {} channels x {} polarisations",
        d.num_times(),
        d.num_baselines(),
        d.num_chans(),
        d.num_pols
    );
    info!(
        "Fringe-stopping {}; UVWs from {}",
        if fringe_stop { "on" } else { "off" },
        dataset.uvw_source
    );

    export_uvfits(&dataset, &output, params.validate)?;
    info!("Wrote {}", output.display());

    Ok(ConvertSummary {
        output,
        files_used,
        files_skipped,
        num_timesteps: d.num_times(),
        num_baselines: d.num_baselines(),
        num_chans: d.num_chans(),
        num_pols: d.num_pols,
        fringe_stopped: dataset.fringe_stopped,
        uvw_source: dataset.uvw_source,
    })
}
